use crate::config::KernelFloors;
use crate::outcome::Failure;
use crate::profile::PlatformProfile;
use crate::service::Service;

/// Extra CPU requirement attached to a supported architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Any,
    /// A token that must appear in the cpuinfo `flags` line.
    CpuFlag {
        flag: &'static str,
        label: &'static str,
    },
    /// Minimum IBM POWER processor generation.
    PowerGeneration { minimum: u32 },
}

impl Capability {
    fn holds(&self, profile: &PlatformProfile) -> bool {
        match self {
            Capability::Any => true,
            Capability::CpuFlag { flag, .. } => profile.has_cpu_flag(flag),
            Capability::PowerGeneration { minimum } => profile
                .power_generation()
                .is_some_and(|generation| generation >= *minimum),
        }
    }

    fn requirement(&self) -> String {
        match self {
            Capability::Any => String::new(),
            Capability::CpuFlag { label, .. } => (*label).to_string(),
            Capability::PowerGeneration { minimum } => format!("POWER{minimum} or later"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchSupport {
    pub arch: &'static str,
    pub requires: Capability,
}

#[derive(Debug, Clone, Copy)]
pub struct CompatibilityPolicy {
    pub releases: &'static [&'static str],
    pub arches: &'static [ArchSupport],
}

pub fn check_release(service: Service, profile: &PlatformProfile) -> Result<(), Failure> {
    if service.policy().releases.contains(&profile.release.as_str()) {
        Ok(())
    } else {
        Err(Failure::UnsupportedRelease {
            title: service.title(),
            release: profile.release.clone(),
        })
    }
}

/// Release, then architecture, then CPU capability, then kernel floor.
pub fn check(
    service: Service,
    profile: &PlatformProfile,
    floors: &KernelFloors,
) -> Result<(), Failure> {
    check_release(service, profile)?;

    let policy = service.policy();
    let support = policy
        .arches
        .iter()
        .find(|a| a.arch == profile.architecture)
        .ok_or_else(|| Failure::UnsupportedArchitecture {
            title: service.title(),
            arch: profile.architecture.clone(),
        })?;

    if !support.requires.holds(profile) {
        return Err(Failure::UnsupportedCapability {
            subject: service.subject(),
            requirement: support.requires.requirement(),
        });
    }

    if let Some(minimum) = floors.minimum(service, &profile.release) {
        let too_old = match profile.kernel_version() {
            Some(running) => running < *minimum,
            None => true,
        };
        if too_old {
            return Err(Failure::KernelTooOld {
                title: service.title(),
                running: profile.kernel.clone(),
                minimum: minimum.to_string(),
            });
        }
    }
    Ok(())
}
