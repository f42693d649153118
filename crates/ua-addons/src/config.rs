use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::kernel::KernelVersion;
use crate::service::{DEFAULT_FALLBACK_KERNEL, Service};

pub const ROOT_ENV: &str = "UA_ADDONS_ROOT";
pub const CONFIG_ENV: &str = "UA_ADDONS_CONFIG";
pub const LOG_ENV: &str = "UA_ADDONS_LOG";

const REL_CONFIG_PATH: &str = "etc/ua-addons/config.toml";

/// Livepatch needs at least this kernel on every release it supports.
const BUILTIN_KERNEL_MINIMUMS: &[(Service, &str, &str)] = &[
    (Service::Livepatch, "trusty", "4.4"),
    (Service::Livepatch, "xenial", "4.4"),
    (Service::Livepatch, "bionic", "4.4"),
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("unknown service in kernel_minimum: {service} ({path})")]
    UnknownService { path: PathBuf, service: String },
    #[error("invalid kernel version in kernel_minimum: {version} ({path})")]
    InvalidKernelVersion { path: PathBuf, version: String },
    #[error("fallback_kernel must be non-empty ({path})")]
    EmptyFallbackKernel { path: PathBuf },
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "config.read_failed",
            ConfigError::Parse { .. } => "config.parse_failed",
            ConfigError::UnknownService { .. } => "config.unknown_service",
            ConfigError::InvalidKernelVersion { .. } => "config.invalid_kernel_version",
            ConfigError::EmptyFallbackKernel { .. } => "config.empty_fallback_kernel",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    fallback_kernel: Option<String>,
    #[serde(default)]
    kernel_minimum: Vec<KernelMinimumEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct KernelMinimumEntry {
    service: String,
    release: String,
    version: String,
}

/// Where every host artifact lives, relative to a root prefix.
#[derive(Debug, Clone)]
pub struct HostLayout {
    root: PathBuf,
}

impl HostLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, rel: &str) -> PathBuf {
        self.root.join(rel.trim_start_matches('/'))
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.resolve("etc/apt/sources.list.d")
    }

    pub fn preferences_dir(&self) -> PathBuf {
        self.resolve("etc/apt/preferences.d")
    }

    pub fn auth_file(&self) -> PathBuf {
        self.resolve("etc/apt/auth.conf")
    }

    pub fn trusted_keyrings_dir(&self) -> PathBuf {
        self.resolve("etc/apt/trusted.gpg.d")
    }

    /// Keyrings shipped with the tool, copied into the trusted dir on enable.
    pub fn keyring_source_dir(&self) -> PathBuf {
        self.resolve("usr/share/keyrings")
    }

    pub fn cpuinfo(&self) -> PathBuf {
        self.resolve("proc/cpuinfo")
    }

    pub fn fstab(&self) -> PathBuf {
        self.resolve("etc/fstab")
    }

    pub fn fips_enabled(&self) -> PathBuf {
        self.resolve("proc/sys/crypto/fips_enabled")
    }

    pub fn grub_fips_cfg(&self) -> PathBuf {
        self.resolve("etc/default/grub.d/99-fips.cfg")
    }

    pub fn zipl_conf(&self) -> PathBuf {
        self.resolve("etc/zipl.conf")
    }

    pub fn apt_helper(&self) -> PathBuf {
        self.resolve("usr/lib/apt/apt-helper")
    }
}

/// Minimum running kernel per (service, release).
#[derive(Debug, Clone)]
pub struct KernelFloors {
    floors: BTreeMap<(Service, String), KernelVersion>,
}

impl KernelFloors {
    pub fn builtin() -> Self {
        let mut floors = BTreeMap::new();
        for (service, release, version) in BUILTIN_KERNEL_MINIMUMS {
            if let Some(v) = KernelVersion::parse(version) {
                floors.insert((*service, release.to_string()), v);
            }
        }
        Self { floors }
    }

    pub fn empty() -> Self {
        Self {
            floors: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, service: Service, release: &str, minimum: KernelVersion) {
        self.floors.insert((service, release.to_string()), minimum);
    }

    pub fn minimum(&self, service: Service, release: &str) -> Option<&KernelVersion> {
        self.floors.get(&(service, release.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub layout: HostLayout,
    pub kernel_floors: KernelFloors,
    pub fallback_kernel: String,
}

impl Settings {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: HostLayout::new(root),
            kernel_floors: KernelFloors::builtin(),
            fallback_kernel: DEFAULT_FALLBACK_KERNEL.to_string(),
        }
    }

    /// Resolves settings from `UA_ADDONS_ROOT` / `UA_ADDONS_CONFIG`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let root = std::env::var(ROOT_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "/".to_string());
        let config_path = std::env::var(CONFIG_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        Self::load(Path::new(&root), config_path)
    }

    /// An explicit config path must exist; the default one is optional.
    pub fn load(root: &Path, config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut settings = Self::with_root(root);
        let (path, required) = match config_path {
            Some(p) => (p, true),
            None => (settings.layout.resolve(REL_CONFIG_PATH), false),
        };
        if !required && !path.exists() {
            return Ok(settings);
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let parsed: ConfigFile = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        settings.apply(parsed, &path)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(settings)
    }

    fn apply(&mut self, file: ConfigFile, path: &Path) -> Result<(), ConfigError> {
        if let Some(kernel) = file.fallback_kernel {
            let kernel = kernel.trim().to_string();
            if kernel.is_empty() {
                return Err(ConfigError::EmptyFallbackKernel {
                    path: path.to_path_buf(),
                });
            }
            self.fallback_kernel = kernel;
        }
        for entry in file.kernel_minimum {
            let service =
                Service::from_name(entry.service.trim()).ok_or_else(|| ConfigError::UnknownService {
                    path: path.to_path_buf(),
                    service: entry.service.clone(),
                })?;
            let version = KernelVersion::parse(&entry.version).ok_or_else(|| {
                ConfigError::InvalidKernelVersion {
                    path: path.to_path_buf(),
                    version: entry.version.clone(),
                }
            })?;
            self.kernel_floors.set(service, entry.release.trim(), version);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
