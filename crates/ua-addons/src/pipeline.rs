//! The enable/disable state machine. Every precondition runs before the first
//! host mutation; the first failure ends the invocation.

use crate::activate::{self, DisableOptions, EnableOptions};
use crate::boot::apply_boot_flag;
use crate::compat;
use crate::config::Settings;
use crate::console::Console;
use crate::deps;
use crate::outcome::Failure;
use crate::profile::PlatformProfile;
use crate::repo;
use crate::service::Service;
use crate::state::{ServiceState, current_state};
use crate::system::System;
use crate::token::{self, Credential};


const UPDATES_QUESTION: &str =
    "FIPS-UPDATES contains security fixes that are not FIPS certified. Do you want to proceed?";

/// Maps the pre-enable state to the guard outcome, if any.
fn enable_guard(service: Service, state: ServiceState) -> Result<(), Failure> {
    match state {
        ServiceState::Enabled => Err(Failure::AlreadyEnabled {
            title: service.title(),
            pending_reboot: false,
        }),
        ServiceState::InstalledNotEnabled if service.activates_on_reboot() => {
            Err(Failure::AlreadyEnabled {
                title: service.title(),
                pending_reboot: true,
            })
        }
        ServiceState::InstalledNotEnabled | ServiceState::NotInstalled => Ok(()),
    }
}

pub async fn enable<S: System, C: Console>(
    system: &S,
    console: &mut C,
    settings: &Settings,
    service: Service,
    raw_token: Option<&str>,
    options: EnableOptions,
) -> Result<(), Failure> {
    let layout = &settings.layout;
    let profile = PlatformProfile::probe(system, layout).await?;
    compat::check(service, &profile, &settings.kernel_floors)?;

    let credential = token::parse(service, raw_token)?;
    token::confirm(system, layout, console, service, &credential, &profile.release).await?;

    let state = current_state(system, layout, service).await?;
    enable_guard(service, state)?;

    if service == Service::FipsUpdates && !options.assume_yes && !console.confirm(UPDATES_QUESTION) {
        return Err(Failure::Cancelled);
    }

    for dependency in service.dependencies() {
        deps::ensure(system, layout, console, dependency).await?;
    }

    if let (Some(repository), Credential::UserPassword { user, password }) =
        (service.repository(), &credential)
    {
        repo::provision(system, layout, &repository, user, password, &profile.release)?;
        console.notice(&format!("Ubuntu {} PPA repository enabled.", repository.label));
    }

    if let Some(flag) = service.boot_flag() {
        console.notice("Configuring FIPS...");
        apply_boot_flag(system, layout, &profile, flag)?;
    }

    activate::enable(
        system,
        console,
        &profile,
        service,
        &credential,
        state,
        options,
        &settings.fallback_kernel,
    )
    .await
}

pub async fn disable<S: System, C: Console>(
    system: &S,
    console: &mut C,
    settings: &Settings,
    service: Service,
    options: DisableOptions,
) -> Result<(), Failure> {
    let layout = &settings.layout;
    let profile = PlatformProfile::probe(system, layout).await?;
    compat::check_release(service, &profile)?;

    let state = current_state(system, layout, service).await?;
    if state != ServiceState::Enabled {
        return Err(Failure::NotEnabled {
            title: service.title(),
        });
    }
    activate::disable(system, console, service, options).await
}

pub async fn is_enabled<S: System>(
    system: &S,
    settings: &Settings,
    service: Service,
) -> Result<bool, Failure> {
    Ok(current_state(system, &settings.layout, service).await? == ServiceState::Enabled)
}

/// One `<service>: <state>` line per known service.
pub async fn status<S: System, C: Console>(
    system: &S,
    console: &mut C,
    settings: &Settings,
) -> Result<(), Failure> {
    for service in Service::ALL {
        let state = current_state(system, &settings.layout, service).await?;
        console.notice(&format!("{service}: {state}"));
    }
    Ok(())
}
