use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::classify::classify_token_check;
use crate::config::HostLayout;
use crate::console::Console;
use crate::outcome::{Failure, TokenRejection};
use crate::service::{Repository, Service, TokenFormat};
use crate::system::{Invocation, System};

fn hex32_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{32}$").expect("static regex is valid"))
}

/// A credential whose shape has been checked.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    UserPassword { user: String, password: String },
    Token(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::UserPassword { user, .. } => f
                .debug_struct("UserPassword")
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
            Credential::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
        }
    }
}

fn format_error(format: TokenFormat) -> Failure {
    let message = match format {
        TokenFormat::UserPassword => "Invalid token, it must be in the form \"user:password\"",
        TokenFormat::Hex32 => "Invalid or missing Livepatch token",
    };
    Failure::TokenFormat { message }
}

/// Local shape check; never touches the host.
pub fn parse(service: Service, raw: Option<&str>) -> Result<Credential, Failure> {
    let format = service.token_format();
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let Some(raw) = raw else {
        return Err(format_error(format));
    };
    match format {
        TokenFormat::UserPassword => match raw.split_once(':') {
            Some((user, password))
                if user.starts_with(|c: char| c.is_ascii_alphanumeric())
                    && !password.is_empty()
                    && !raw.chars().any(char::is_whitespace) =>
            {
                Ok(Credential::UserPassword {
                    user: user.to_string(),
                    password: password.to_string(),
                })
            }
            _ => Err(format_error(format)),
        },
        TokenFormat::Hex32 => {
            if hex32_regex().is_match(raw) {
                Ok(Credential::Token(raw.to_string()))
            } else {
                Err(format_error(format))
            }
        }
    }
}

fn escape_userinfo(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn release_file_url(repo: &Repository, user: &str, password: &str, release: &str) -> String {
    let base = repo.url();
    let host_path = base.trim_start_matches("https://");
    format!(
        "https://{}:{}@{host_path}/dists/{release}/Release",
        escape_userinfo(user),
        escape_userinfo(password)
    )
}

/// Confirms a credential against the private archive by fetching its
/// `Release` file through apt-helper.
///
/// Services without a repository are confirmed by their activator instead.
/// A host without apt-helper skips the check.
pub async fn confirm<S: System, C: Console>(
    system: &S,
    layout: &HostLayout,
    console: &mut C,
    service: Service,
    credential: &Credential,
    release: &str,
) -> Result<(), Failure> {
    let (Some(repo), Credential::UserPassword { user, password }) =
        (service.repository(), credential)
    else {
        return Ok(());
    };

    console.progress("Checking token... ");
    let helper = layout.apt_helper();
    if !system.exists(&helper) {
        tracing::info!(helper = %helper.display(), "apt-helper not found, skipping token check");
        console.notice("SKIPPED");
        return Ok(());
    }

    let scratch = tempfile::tempdir().map_err(|e| Failure::io("create", std::env::temp_dir(), e))?;
    let invocation = Invocation::new(helper.to_string_lossy())
        .arg("download-file")
        .arg(release_file_url(&repo, user, password, release))
        .arg(scratch.path().join("Release").to_string_lossy());

    let rejection = match system.run(&invocation).await {
        Ok(receipt) if receipt.success() => None,
        Ok(receipt) => Some(classify_token_check(&receipt)),
        Err(e) => Some(TokenRejection::CheckFailed(e.to_string())),
    };
    match rejection {
        None => {
            console.notice("OK");
            Ok(())
        }
        Some(rejection) => {
            console.notice("ERROR");
            Err(Failure::TokenRejected(rejection))
        }
    }
}
