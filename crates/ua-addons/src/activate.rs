//! Final step of enable and disable: run the service's own tooling and turn
//! its output into a verdict.

use crate::classify::{ActivationVerdict, classify_activation, machine_token};
use crate::console::Console;
use crate::deps::apt_install;
use crate::outcome::Failure;
use crate::profile::PlatformProfile;
use crate::service::{FIPS_PACKAGES, LIVEPATCH_SNAP, Service};
use crate::state::{ServiceState, package_installed};
use crate::system::{Invocation, Receipt, System};
use crate::token::Credential;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnableOptions {
    pub assume_yes: bool,
    pub allow_kernel_change: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisableOptions {
    pub remove_package: bool,
}

/// Runs `invocation`, turning a spawn error into a failed receipt so callers
/// see one shape.
async fn capture<S: System>(system: &S, invocation: Invocation) -> Receipt {
    match system.run(&invocation).await {
        Ok(receipt) => receipt,
        Err(e) => {
            tracing::warn!(program = %invocation.program, error = %e, "spawn failed");
            Receipt {
                program: invocation.program.clone(),
                exit_code: None,
                stdout: String::new(),
                stderr: format!("{}: {e}\n", invocation.program),
            }
        }
    }
}

fn last_line(output: &str) -> &str {
    output.lines().map(str::trim).rfind(|l| !l.is_empty()).unwrap_or("")
}

async fn enable_fips<S: System, C: Console>(
    system: &S,
    console: &mut C,
    service: Service,
) -> Result<(), Failure> {
    let updating = service == Service::FipsUpdates;
    console.notice(if updating {
        "Updating FIPS packages..."
    } else {
        "Installing FIPS packages (this may take a while)..."
    });

    let update = capture(system, Invocation::new("apt-get").arg("update")).await;
    if !update.success() {
        return Err(Failure::ActivationFailed {
            output: update.combined(),
        });
    }
    apt_install(system, FIPS_PACKAGES)
        .await
        .map_err(|failure| match failure {
            Failure::DependencyInstallFailed { output, .. } => Failure::ActivationFailed { output },
            other => other,
        })?;

    if updating {
        console.notice("Successfully updated FIPS packages.");
        console.notice("Please reboot into the new FIPS kernel.");
    } else {
        console.notice("Successfully configured FIPS. Please reboot into the FIPS kernel to enable it.");
    }
    Ok(())
}

async fn enable_livepatch<S: System, C: Console>(
    system: &S,
    console: &mut C,
    profile: &PlatformProfile,
    token: &str,
    state: ServiceState,
    options: EnableOptions,
    fallback_kernel: &str,
) -> Result<(), Failure> {
    if state == ServiceState::NotInstalled {
        console.notice("Installing the canonical-livepatch snap");
        let install = capture(system, Invocation::new("snap").args(["install", LIVEPATCH_SNAP])).await;
        if !install.success() {
            return Err(Failure::ActivationFailed {
                output: install.combined(),
            });
        }
    }

    let receipt = capture(system, Invocation::new(LIVEPATCH_SNAP).args(["enable", token])).await;
    match classify_activation(&receipt) {
        ActivationVerdict::Enabled { machine_token } => {
            let id = machine_token.unwrap_or_else(|| last_line(&receipt.combined()).to_string());
            console.notice(&format!("Successfully enabled device. Using machine-token: {id}"));
            Ok(())
        }
        ActivationVerdict::KernelUnsupported if options.allow_kernel_change => {
            console.notice(&format!(
                "Your running kernel {} is not supported by Livepatch.",
                profile.kernel
            ));
            if !package_installed(system, fallback_kernel).await? {
                console.notice("A Livepatch compatible kernel will be installed.");
                console.notice(&format!("Installing {fallback_kernel}"));
                apt_install(system, &[fallback_kernel]).await?;
            }
            Err(Failure::KernelIncompatible {
                kernel: profile.kernel.clone(),
                token: token.to_string(),
                fallback_installed: true,
            })
        }
        ActivationVerdict::KernelUnsupported => Err(Failure::KernelIncompatible {
            kernel: profile.kernel.clone(),
            token: token.to_string(),
            fallback_installed: false,
        }),
        ActivationVerdict::Unknown => Err(Failure::ActivationFailed {
            output: receipt.combined(),
        }),
    }
}

/// Installs or enables the service; provisioning has already happened.
#[allow(clippy::too_many_arguments)]
pub async fn enable<S: System, C: Console>(
    system: &S,
    console: &mut C,
    profile: &PlatformProfile,
    service: Service,
    credential: &Credential,
    state: ServiceState,
    options: EnableOptions,
    fallback_kernel: &str,
) -> Result<(), Failure> {
    tracing::info!(service = %service, "activating");
    match (service, credential) {
        (Service::Fips | Service::FipsUpdates, _) => enable_fips(system, console, service).await,
        (Service::Livepatch, Credential::Token(token)) => {
            enable_livepatch(system, console, profile, token, state, options, fallback_kernel).await
        }
        (Service::Livepatch, Credential::UserPassword { .. }) => Err(Failure::TokenFormat {
            message: "Invalid or missing Livepatch token",
        }),
    }
}

/// Turns off an enabled service.
pub async fn disable<S: System, C: Console>(
    system: &S,
    console: &mut C,
    service: Service,
    options: DisableOptions,
) -> Result<(), Failure> {
    if service != Service::Livepatch {
        return Err(Failure::PolicyForbidsDisable {
            subject: service.subject(),
        });
    }

    let receipt = capture(system, Invocation::new(LIVEPATCH_SNAP).arg("disable")).await;
    if !receipt.success() {
        return Err(Failure::ActivationFailed {
            output: receipt.combined(),
        });
    }
    let output = receipt.combined();
    let id = machine_token(&output).unwrap_or_else(|| last_line(&output).to_string());
    console.notice(&format!("Successfully disabled device. Removed machine-token: {id}"));

    if options.remove_package {
        let remove = capture(system, Invocation::new("snap").args(["remove", LIVEPATCH_SNAP])).await;
        if !remove.success() {
            return Err(Failure::ActivationFailed {
                output: remove.combined(),
            });
        }
        let said = remove.combined();
        let said = said.trim_end();
        if said.is_empty() {
            console.notice(&format!("{LIVEPATCH_SNAP} removed"));
        } else {
            console.notice(said);
        }
    } else {
        console.notice(&format!(
            "Note: the {LIVEPATCH_SNAP} snap is still installed. To remove it, run\n    sudo snap remove {LIVEPATCH_SNAP}"
        ));
    }
    Ok(())
}
