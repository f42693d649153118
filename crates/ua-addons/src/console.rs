use std::io::{BufRead, Write};

/// Operator-facing output. Progress goes to stdout as it happens; terminal
/// diagnostics go to stderr.
pub trait Console {
    /// A full line on stdout.
    fn notice(&mut self, line: &str);
    /// A line fragment on stdout, completed by a later `notice`.
    fn progress(&mut self, fragment: &str);
    /// A full line on stderr.
    fn error(&mut self, line: &str);
    /// Asks a yes/no question; anything but an explicit yes is a no.
    fn confirm(&mut self, question: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct Terminal;

impl Console for Terminal {
    fn notice(&mut self, line: &str) {
        println!("{line}");
    }

    fn progress(&mut self, fragment: &str) {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "{fragment}");
        let _ = out.flush();
    }

    fn error(&mut self, line: &str) {
        eprintln!("{line}");
    }

    fn confirm(&mut self, question: &str) -> bool {
        self.progress(&format!("{question} (y/N) "));
        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(_) => false,
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// In-memory console for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct Transcript {
    pub stdout: String,
    pub stderr: String,
    pub answer: bool,
    pub questions: Vec<String>,
}

#[cfg(test)]
impl Console for Transcript {
    fn notice(&mut self, line: &str) {
        self.stdout.push_str(line);
        self.stdout.push('\n');
    }

    fn progress(&mut self, fragment: &str) {
        self.stdout.push_str(fragment);
    }

    fn error(&mut self, line: &str) {
        self.stderr.push_str(line);
        self.stderr.push('\n');
    }

    fn confirm(&mut self, question: &str) -> bool {
        self.questions.push(question.to_string());
        self.answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }
}
