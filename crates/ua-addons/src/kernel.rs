use std::cmp::Ordering;
use std::fmt;

/// Numeric prefix of a kernel release string, e.g. `4.4.0` out of `4.4.0-89-generic`.
///
/// Comparison pads the shorter side with zeros, so `4.4` == `4.4.0`.
#[derive(Debug, Clone)]
pub struct KernelVersion {
    parts: Vec<u32>,
}

impl KernelVersion {
    pub fn parse(raw: &str) -> Option<Self> {
        let numeric = raw.trim().split(['-', '+', '~', ' ']).next()?;
        let mut parts = Vec::new();
        for piece in numeric.split('.') {
            let digits: String = piece.chars().take_while(char::is_ascii_digit).collect();
            if digits.is_empty() {
                break;
            }
            parts.push(digits.parse().ok()?);
        }
        if parts.is_empty() {
            None
        } else {
            Some(Self { parts })
        }
    }

    fn component(&self, idx: usize) -> u32 {
        self.parts.get(idx).copied().unwrap_or(0)
    }
}

impl PartialEq for KernelVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KernelVersion {}

impl PartialOrd for KernelVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KernelVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.parts.iter().map(u32::to_string).collect();
        f.write_str(&joined.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> KernelVersion {
        KernelVersion::parse(s).expect("parse kernel version")
    }

    #[test]
    fn parses_release_strings() {
        assert_eq!(v("4.4.0-89-generic").to_string(), "4.4.0");
        assert_eq!(v("4.15.0-1010-kvm").to_string(), "4.15.0");
        assert_eq!(v("5.4").to_string(), "5.4");
        assert!(KernelVersion::parse("generic").is_none());
        assert!(KernelVersion::parse("").is_none());
    }

    #[test]
    fn ordering_pads_missing_components() {
        assert_eq!(v("4.4"), v("4.4.0-89-generic"));
        assert!(v("3.10.0-30-generic") < v("4.4"));
        assert!(v("4.15.0-1010-kvm") > v("4.4"));
        assert!(v("4.4.1") > v("4.4"));
    }
}
