use std::fmt;
use std::path::PathBuf;

use crate::config::ConfigError;
use crate::console::Console;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_TOKEN: i32 = 3;
pub const EXIT_RELEASE: i32 = 4;
pub const EXIT_KERNEL_TOO_OLD: i32 = 5;
pub const EXIT_ALREADY_ENABLED: i32 = 6;
pub const EXIT_ARCH: i32 = 7;
pub const EXIT_NOT_ENABLED: i32 = 8;
pub const EXIT_KERNEL_INCOMPATIBLE: i32 = 9;

/// Command name printed in operator guidance.
pub const PROGRAM: &str = "ua-addons";

/// Why the remote side refused a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRejection {
    Invalid,
    CheckFailed(String),
}

impl fmt::Display for TokenRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenRejection::Invalid => f.write_str("Invalid token"),
            TokenRejection::CheckFailed(detail) => write!(f, "Failed checking token ({detail})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Every way an invocation can end other than success.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    #[error("{message}")]
    Usage { message: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Unable to determine {what}: {detail}")]
    HostProbe { what: &'static str, detail: String },
    #[error("Sorry, but {title} is not supported on {release}")]
    UnsupportedRelease { title: &'static str, release: String },
    #[error("Sorry, but {title} is not supported on {arch}")]
    UnsupportedArchitecture { title: &'static str, arch: String },
    #[error("{subject} requires {requirement}")]
    UnsupportedCapability {
        subject: &'static str,
        requirement: String,
    },
    #[error(
        "Your currently running kernel ({running}) is too old for {title}. The minimum supported kernel version is {minimum}."
    )]
    KernelTooOld {
        title: &'static str,
        running: String,
        minimum: String,
    },
    #[error("{message}")]
    TokenFormat { message: &'static str },
    #[error("{0}")]
    TokenRejected(TokenRejection),
    #[error("{}", already_enabled_message(.title, .pending_reboot))]
    AlreadyEnabled {
        title: &'static str,
        pending_reboot: bool,
    },
    #[error("{title} is not enabled")]
    NotEnabled { title: &'static str },
    #[error("Disabling {subject} is currently not supported.")]
    PolicyForbidsDisable { subject: &'static str },
    #[error("Operation cancelled.")]
    Cancelled,
    #[error("{}", .output.trim_end())]
    DependencyInstallFailed {
        package: String,
        output: String,
        exit_code: Option<i32>,
    },
    #[error("Failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}", kernel_incompatible_message(.kernel, .token, .fallback_installed))]
    KernelIncompatible {
        kernel: String,
        token: String,
        fallback_installed: bool,
    },
    #[error("{}", .output.trim_end())]
    ActivationFailed { output: String },
}

fn already_enabled_message(title: &str, pending_reboot: &bool) -> String {
    if *pending_reboot {
        "FIPS is already installed. Please reboot into the FIPS kernel to enable it.".to_string()
    } else {
        format!("{title} is already enabled")
    }
}

fn kernel_incompatible_message(kernel: &str, token: &str, fallback_installed: &bool) -> String {
    if *fallback_installed {
        format!(
            "A new kernel was installed to support Livepatch. Please reboot into it and then run:\n    sudo {PROGRAM} enable-livepatch {token}"
        )
    } else {
        format!(
            "Your running kernel {kernel} is not supported by Livepatch.\nIf you want to automatically install a Livepatch supported kernel please run:\n    sudo {PROGRAM} enable-livepatch {token} --allow-kernel-change"
        )
    }
}

impl Failure {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Failure::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Failure::TokenFormat { .. } | Failure::TokenRejected(_) => EXIT_TOKEN,
            Failure::UnsupportedRelease { .. } => EXIT_RELEASE,
            Failure::KernelTooOld { .. } => EXIT_KERNEL_TOO_OLD,
            Failure::AlreadyEnabled { .. } => EXIT_ALREADY_ENABLED,
            Failure::UnsupportedArchitecture { .. } | Failure::UnsupportedCapability { .. } => {
                EXIT_ARCH
            }
            Failure::NotEnabled { .. } => EXIT_NOT_ENABLED,
            Failure::KernelIncompatible { .. } => EXIT_KERNEL_INCOMPATIBLE,
            Failure::Usage { .. }
            | Failure::Config(_)
            | Failure::HostProbe { .. }
            | Failure::PolicyForbidsDisable { .. }
            | Failure::Cancelled
            | Failure::DependencyInstallFailed { .. }
            | Failure::Io { .. }
            | Failure::ActivationFailed { .. } => EXIT_FAILURE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Failure::Usage { .. } => "usage",
            Failure::Config(e) => e.code(),
            Failure::HostProbe { .. } => "host.probe_failed",
            Failure::UnsupportedRelease { .. } => "compat.release",
            Failure::UnsupportedArchitecture { .. } => "compat.architecture",
            Failure::UnsupportedCapability { .. } => "compat.capability",
            Failure::KernelTooOld { .. } => "compat.kernel_too_old",
            Failure::TokenFormat { .. } => "token.format",
            Failure::TokenRejected(TokenRejection::Invalid) => "token.invalid",
            Failure::TokenRejected(TokenRejection::CheckFailed(_)) => "token.check_failed",
            Failure::AlreadyEnabled { .. } => "state.already_enabled",
            Failure::NotEnabled { .. } => "state.not_enabled",
            Failure::PolicyForbidsDisable { .. } => "state.disable_forbidden",
            Failure::Cancelled => "cancelled",
            Failure::DependencyInstallFailed { .. } => "deps.install_failed",
            Failure::Io { .. } => "io",
            Failure::KernelIncompatible { .. } => "activate.kernel_incompatible",
            Failure::ActivationFailed { .. } => "activate.failed",
        }
    }

    /// Kernel guidance is operator instructions, not a diagnostic.
    pub fn stream(&self) -> Stream {
        match self {
            Failure::KernelTooOld { .. } | Failure::KernelIncompatible { .. } => Stream::Stdout,
            _ => Stream::Stderr,
        }
    }
}

/// Prints the terminal message for `result` and returns the process exit code.
pub fn conclude<C: Console>(console: &mut C, result: Result<(), Failure>) -> i32 {
    match result {
        Ok(()) => EXIT_OK,
        Err(failure) => {
            tracing::debug!(code = failure.code(), exit = failure.exit_code(), "pipeline failed");
            let message = failure.to_string();
            match failure.stream() {
                Stream::Stdout => console.notice(&message),
                Stream::Stderr => console.error(&message),
            }
            failure.exit_code()
        }
    }
}
