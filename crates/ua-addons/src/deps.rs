use crate::config::HostLayout;
use crate::console::Console;
use crate::outcome::Failure;
use crate::service::Dependency;
use crate::system::{Invocation, Receipt, System};

/// `apt-get install` that never prompts and keeps existing conffiles.
pub fn apt_install_invocation(packages: &[&str]) -> Invocation {
    Invocation::new("apt-get")
        .args(["-y", "-o", "Dpkg::Options::=--force-confold", "install"])
        .args(packages.iter().copied())
        .env("DEBIAN_FRONTEND", "noninteractive")
}

/// Runs an install, folding a spawn failure into the error output.
pub async fn apt_install<S: System>(system: &S, packages: &[&str]) -> Result<(), Failure> {
    let invocation = apt_install_invocation(packages);
    let receipt = match system.run(&invocation).await {
        Ok(receipt) => receipt,
        Err(e) => Receipt {
            program: invocation.program.clone(),
            exit_code: None,
            stdout: String::new(),
            stderr: format!("{}: {e}\n", invocation.program),
        },
    };
    if receipt.success() {
        return Ok(());
    }
    tracing::warn!(packages = ?packages, exit_code = ?receipt.exit_code, "apt-get install failed");
    Err(Failure::DependencyInstallFailed {
        package: packages.join(" "),
        output: receipt.combined(),
        exit_code: receipt.exit_code,
    })
}

/// Installs `dependency` unless its marker file is already on the host.
pub async fn ensure<S: System, C: Console>(
    system: &S,
    layout: &HostLayout,
    console: &mut C,
    dependency: &Dependency,
) -> Result<(), Failure> {
    if system.exists(&layout.resolve(dependency.marker)) {
        tracing::debug!(package = dependency.package, "dependency present");
        return Ok(());
    }
    console.notice(&format!("Installing missing dependency {}", dependency.package));
    apt_install(system, &[dependency.package]).await
}
