//! Ordered signature tables that turn free-form tool output into tagged
//! verdicts. First match wins.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::outcome::TokenRejection;
use crate::system::Receipt;

pub struct Signature<T> {
    pub name: &'static str,
    pattern: Regex,
    build: fn(&Captures<'_>) -> T,
}

impl<T> Signature<T> {
    fn new(name: &'static str, pattern: &str, build: fn(&Captures<'_>) -> T) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("static regex is valid"),
            build,
        }
    }
}

pub fn first_match<T>(signatures: &[Signature<T>], text: &str) -> Option<T> {
    signatures.iter().find_map(|sig| {
        sig.pattern.captures(text).map(|caps| {
            tracing::debug!(signature = sig.name, "output matched");
            (sig.build)(&caps)
        })
    })
}

fn token_check_signatures() -> &'static [Signature<TokenRejection>] {
    static SIGS: OnceLock<Vec<Signature<TokenRejection>>> = OnceLock::new();
    SIGS.get_or_init(|| {
        vec![
            Signature::new("http_401", r"\b401\s+Unauthorized\b|HttpError401", |_| {
                TokenRejection::Invalid
            }),
            Signature::new("fetch_failed", r"Failed to fetch \S+\s+(?P<detail>[^\r\n]+)", |c| {
                TokenRejection::CheckFailed(c["detail"].trim().to_string())
            }),
        ]
    })
}

/// Classifies a failed entitlement check.
pub fn classify_token_check(receipt: &Receipt) -> TokenRejection {
    let output = receipt.combined();
    first_match(token_check_signatures(), &output).unwrap_or_else(|| {
        let detail = output
            .lines()
            .map(str::trim)
            .rfind(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| match receipt.exit_code {
                Some(code) => format!("exit status {code}"),
                None => "terminated by signal".to_string(),
            });
        TokenRejection::CheckFailed(detail)
    })
}

/// Result of the live-patch enabler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationVerdict {
    Enabled { machine_token: Option<String> },
    KernelUnsupported,
    Unknown,
}

fn activation_failure_signatures() -> &'static [Signature<ActivationVerdict>] {
    static SIGS: OnceLock<Vec<Signature<ActivationVerdict>>> = OnceLock::new();
    SIGS.get_or_init(|| {
        vec![
            Signature::new(
                "kernel_not_eligible",
                r"(?i)kernel\s+\S+\s+is\s+not\s+(eligible|supported)",
                |_| ActivationVerdict::KernelUnsupported,
            ),
            Signature::new(
                "unsupported_kernel",
                r"(?i)unsupported\s+kernel|kernel\s+(is\s+)?not\s+supported",
                |_| ActivationVerdict::KernelUnsupported,
            ),
        ]
    })
}

fn machine_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"machine-token:\s*(?P<token>[0-9A-Za-z]+)").expect("static regex is valid")
    })
}

/// Machine-token identifier mentioned in enabler output, if any.
pub fn machine_token(output: &str) -> Option<String> {
    machine_token_regex()
        .captures(output)
        .map(|c| c["token"].to_string())
}

pub fn classify_activation(receipt: &Receipt) -> ActivationVerdict {
    let output = receipt.combined();
    if receipt.success() {
        return ActivationVerdict::Enabled {
            machine_token: machine_token(&output),
        };
    }
    first_match(activation_failure_signatures(), &output).unwrap_or(ActivationVerdict::Unknown)
}
