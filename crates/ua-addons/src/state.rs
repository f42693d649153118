use std::fmt;
use std::io;

use crate::config::HostLayout;
use crate::outcome::Failure;
use crate::service::{FIPS_PACKAGES, LIVEPATCH_SNAP, Service};
use crate::system::{Invocation, System};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    NotInstalled,
    InstalledNotEnabled,
    Enabled,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServiceState::NotInstalled => "not installed",
            ServiceState::InstalledNotEnabled => "installed, not enabled",
            ServiceState::Enabled => "enabled",
        })
    }
}

/// Runs a status query; a missing tool reads as "no".
async fn query<S: System>(system: &S, invocation: Invocation) -> Result<bool, Failure> {
    match system.run(&invocation).await {
        Ok(receipt) => Ok(receipt.success()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(program = %invocation.program, "status tool not found");
            Ok(false)
        }
        Err(e) => Err(Failure::HostProbe {
            what: "service state",
            detail: format!("{}: {e}", invocation.display()),
        }),
    }
}

pub async fn package_installed<S: System>(system: &S, package: &str) -> Result<bool, Failure> {
    query(system, Invocation::new("dpkg-query").args(["-s", package])).await
}

async fn fips_packages_installed<S: System>(system: &S) -> Result<bool, Failure> {
    for package in FIPS_PACKAGES {
        if !package_installed(system, package).await? {
            tracing::debug!(package, "fips package missing");
            return Ok(false);
        }
    }
    Ok(true)
}

fn fips_kernel_active<S: System>(system: &S, layout: &HostLayout) -> Result<bool, Failure> {
    let path = layout.fips_enabled();
    let raw = system
        .read_text(&path)
        .map_err(|e| Failure::io("read", &path, e))?;
    Ok(raw.is_some_and(|s| s.trim() == "1"))
}

/// Fresh read of the service lifecycle state; nothing is cached.
pub async fn current_state<S: System>(
    system: &S,
    layout: &HostLayout,
    service: Service,
) -> Result<ServiceState, Failure> {
    let installed = match service {
        Service::Fips => fips_packages_installed(system).await?,
        Service::FipsUpdates => {
            let configured = service
                .repository()
                .is_some_and(|repo| system.exists(&layout.sources_dir().join(repo.list_file_name())));
            configured && fips_packages_installed(system).await?
        }
        Service::Livepatch => {
            query(system, Invocation::new("snap").args(["list", LIVEPATCH_SNAP])).await?
        }
    };
    if !installed {
        return Ok(ServiceState::NotInstalled);
    }
    let enabled = match service {
        Service::Fips | Service::FipsUpdates => fips_kernel_active(system, layout)?,
        Service::Livepatch => query(system, Invocation::new(LIVEPATCH_SNAP).arg("status")).await?,
    };
    let state = if enabled {
        ServiceState::Enabled
    } else {
        ServiceState::InstalledNotEnabled
    };
    tracing::info!(service = %service, state = %state, "service state");
    Ok(state)
}
