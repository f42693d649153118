//! Static catalog of the add-on services this tool knows how to manage.

use std::fmt;

use crate::compat::{ArchSupport, Capability, CompatibilityPolicy};

const PPA_HOST: &str = "private-ppa.launchpad.net/ubuntu-advantage";

pub const LIVEPATCH_SNAP: &str = "canonical-livepatch";
pub const DEFAULT_FALLBACK_KERNEL: &str = "linux-image-generic";

/// Packages making up the FIPS module set; all of them must be installed for
/// FIPS to count as installed.
pub const FIPS_PACKAGES: &[&str] = &[
    "openssh-client",
    "openssh-client-hmac",
    "openssh-server",
    "openssh-server-hmac",
    "strongswan",
    "strongswan-hmac",
    "openssl",
    "libssl1.0.0",
    "libssl1.0.0-hmac",
    "fips-initramfs",
    "linux-fips",
];

const FIPS_DEPENDENCIES: &[Dependency] = &[
    Dependency {
        package: "apt-transport-https",
        marker: "usr/lib/apt/methods/https",
    },
    Dependency {
        package: "ca-certificates",
        marker: "usr/sbin/update-ca-certificates",
    },
];

const LIVEPATCH_DEPENDENCIES: &[Dependency] = &[Dependency {
    package: "snapd",
    marker: "usr/lib/snapd/snapd",
}];

const FIPS_ARCHES: &[ArchSupport] = &[
    ArchSupport {
        arch: "x86_64",
        requires: Capability::CpuFlag {
            flag: "aes",
            label: "AES CPU extensions",
        },
    },
    ArchSupport {
        arch: "ppc64le",
        requires: Capability::PowerGeneration { minimum: 8 },
    },
    ArchSupport {
        arch: "s390x",
        requires: Capability::Any,
    },
];

const LIVEPATCH_ARCHES: &[ArchSupport] = &[ArchSupport {
    arch: "x86_64",
    requires: Capability::Any,
}];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Service {
    Fips,
    FipsUpdates,
    Livepatch,
}

/// An auxiliary package whose presence is detected through a file it ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub package: &'static str,
    /// Path relative to the host root.
    pub marker: &'static str,
}

/// Private package archive backing a repository-based service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repository {
    pub slug: &'static str,
    pub label: &'static str,
    pub keyring: &'static str,
    pub pin_priority: u32,
}

impl Repository {
    /// `host/path/` form used as the credentials-store key.
    pub fn auth_path(&self) -> String {
        format!("{PPA_HOST}/{}/ubuntu/", self.slug)
    }

    pub fn url(&self) -> String {
        format!("https://{PPA_HOST}/{}/ubuntu", self.slug)
    }

    pub fn origin(&self) -> String {
        format!("LP-PPA-ubuntu-advantage-{}", self.slug)
    }

    pub fn list_file_name(&self) -> String {
        format!("ubuntu-{}.list", self.slug)
    }

    pub fn preferences_file_name(&self) -> String {
        format!("ubuntu-{}", self.slug)
    }
}

/// Shape a credential must have before anything else looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFormat {
    UserPassword,
    Hex32,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::Fips, Service::FipsUpdates, Service::Livepatch];

    pub fn name(self) -> &'static str {
        match self {
            Service::Fips => "fips",
            Service::FipsUpdates => "fips-updates",
            Service::Livepatch => "livepatch",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Product name used in operator-facing messages.
    pub fn title(self) -> &'static str {
        match self {
            Service::Fips | Service::FipsUpdates => "Canonical FIPS 140-2 Modules",
            Service::Livepatch => "Canonical Livepatch",
        }
    }

    /// Short subject used in capability and policy messages.
    pub fn subject(self) -> &'static str {
        match self {
            Service::Fips | Service::FipsUpdates => "FIPS",
            Service::Livepatch => "Livepatch",
        }
    }

    pub fn token_format(self) -> TokenFormat {
        match self {
            Service::Fips | Service::FipsUpdates => TokenFormat::UserPassword,
            Service::Livepatch => TokenFormat::Hex32,
        }
    }

    pub fn repository(self) -> Option<Repository> {
        match self {
            Service::Fips => Some(Repository {
                slug: "fips",
                label: "FIPS",
                keyring: "ubuntu-fips-keyring.gpg",
                pin_priority: 1001,
            }),
            Service::FipsUpdates => Some(Repository {
                slug: "fips-updates",
                label: "FIPS-UPDATES",
                keyring: "ubuntu-fips-updates-keyring.gpg",
                pin_priority: 1001,
            }),
            Service::Livepatch => None,
        }
    }

    pub fn dependencies(self) -> &'static [Dependency] {
        match self {
            Service::Fips | Service::FipsUpdates => FIPS_DEPENDENCIES,
            Service::Livepatch => LIVEPATCH_DEPENDENCIES,
        }
    }

    /// Kernel command-line token the service needs at next boot.
    pub fn boot_flag(self) -> Option<&'static str> {
        match self {
            Service::Fips | Service::FipsUpdates => Some("fips=1"),
            Service::Livepatch => None,
        }
    }

    /// Installed-but-not-active means "waiting for a reboot into the new kernel".
    pub fn activates_on_reboot(self) -> bool {
        matches!(self, Service::Fips | Service::FipsUpdates)
    }

    pub fn policy(self) -> CompatibilityPolicy {
        match self {
            Service::Fips | Service::FipsUpdates => CompatibilityPolicy {
                releases: &["xenial"],
                arches: FIPS_ARCHES,
            },
            Service::Livepatch => CompatibilityPolicy {
                releases: &["trusty", "xenial", "bionic"],
                arches: LIVEPATCH_ARCHES,
            },
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
