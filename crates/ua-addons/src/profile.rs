use regex::Regex;
use std::sync::OnceLock;

use crate::config::HostLayout;
use crate::kernel::KernelVersion;
use crate::outcome::Failure;
use crate::system::{Invocation, System};

fn power_model_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bPOWER(\d+)").expect("static regex is valid"))
}

/// Host facts gathered once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    pub release: String,
    pub architecture: String,
    /// Raw `/proc/cpuinfo` text.
    pub cpu_info: String,
    pub kernel: String,
    /// Device mounted at `/boot`, if it is a separate partition.
    pub boot_device: Option<String>,
}

impl PlatformProfile {
    pub async fn probe<S: System>(system: &S, layout: &HostLayout) -> Result<Self, Failure> {
        let release = probe_command(system, "release", Invocation::new("lsb_release").arg("-cs")).await?;
        let architecture = probe_command(system, "architecture", Invocation::new("uname").arg("-m")).await?;
        let kernel = probe_command(system, "kernel version", Invocation::new("uname").arg("-r")).await?;

        let cpuinfo_path = layout.cpuinfo();
        let cpu_info = system
            .read_text(&cpuinfo_path)
            .map_err(|e| Failure::io("read", &cpuinfo_path, e))?
            .unwrap_or_default();

        let fstab_path = layout.fstab();
        let boot_device = system
            .read_text(&fstab_path)
            .map_err(|e| Failure::io("read", &fstab_path, e))?
            .as_deref()
            .and_then(boot_device_from_fstab);

        let profile = Self {
            release,
            architecture,
            cpu_info,
            kernel,
            boot_device,
        };
        tracing::info!(
            release = %profile.release,
            arch = %profile.architecture,
            kernel = %profile.kernel,
            boot_device = ?profile.boot_device,
            "platform profile"
        );
        Ok(profile)
    }

    /// Tokens of the x86 `flags` line.
    pub fn cpu_flags(&self) -> impl Iterator<Item = &str> {
        self.cpu_info
            .lines()
            .filter_map(|line| line.split_once(':'))
            .filter(|(key, _)| key.trim() == "flags")
            .flat_map(|(_, value)| value.split_whitespace())
    }

    pub fn has_cpu_flag(&self, flag: &str) -> bool {
        self.cpu_flags().any(|f| f == flag)
    }

    /// POWER generation from the ppc `cpu` line, e.g. 8 for `POWER8 (raw)`.
    pub fn power_generation(&self) -> Option<u32> {
        power_model_regex()
            .captures(&self.cpu_info)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    pub fn kernel_version(&self) -> Option<KernelVersion> {
        KernelVersion::parse(&self.kernel)
    }
}

async fn probe_command<S: System>(
    system: &S,
    what: &'static str,
    invocation: Invocation,
) -> Result<String, Failure> {
    let receipt = system
        .run(&invocation)
        .await
        .map_err(|e| Failure::HostProbe {
            what,
            detail: format!("{}: {e}", invocation.program),
        })?;
    let value = receipt.stdout.trim().to_string();
    if !receipt.success() || value.is_empty() {
        return Err(Failure::HostProbe {
            what,
            detail: format!("`{}` failed: {}", invocation.display(), receipt.combined().trim()),
        });
    }
    Ok(value)
}

/// Device of the `/boot` entry, skipping comments.
pub fn boot_device_from_fstab(fstab: &str) -> Option<String> {
    fstab
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .find_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mount_point = fields.next()?;
            (mount_point == "/boot").then(|| device.to_string())
        })
}
