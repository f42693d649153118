#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub const FIPS_PACKAGES_INSTALLED: &str = "exit 0";
pub const NOTHING_INSTALLED: &str = "exit 1";

/// A throwaway host: `root/` is what the binary sees as `/`, `bin/` is the
/// only directory on its PATH.
pub struct Sandbox {
    _dir: tempfile::TempDir,
    pub root: PathBuf,
    bin: PathBuf,
    pub release: String,
    pub arch: String,
    pub kernel: String,
}

impl Sandbox {
    pub fn new(release: &str, arch: &str) -> Self {
        let dir = tempfile::tempdir().expect("sandbox tempdir");
        let root = dir.path().join("root");
        let bin = dir.path().join("bin");
        fs::create_dir_all(&root).expect("mkdir root");
        fs::create_dir_all(&bin).expect("mkdir bin");
        let sandbox = Self {
            _dir: dir,
            root,
            bin,
            release: release.to_string(),
            arch: arch.to_string(),
            kernel: "4.4.0-89-generic".to_string(),
        };
        sandbox.write("etc/fstab", "");
        sandbox.write("proc/cpuinfo", "");
        sandbox
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir parent");
        }
        fs::write(&path, contents).expect("write sandbox file");
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).expect("read sandbox file")
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.path(rel)).expect("remove sandbox file");
    }

    pub fn mode(&self, rel: &str) -> u32 {
        fs::metadata(self.path(rel))
            .expect("stat sandbox file")
            .permissions()
            .mode()
            & 0o7777
    }

    fn executable(path: &Path, body: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir parent");
        }
        fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod script");
    }

    /// Fake tool on PATH.
    pub fn tool(&self, name: &str, body: &str) {
        Self::executable(&self.bin.join(name), body);
    }

    /// Fake executable at a host path.
    pub fn host_tool(&self, rel: &str, body: &str) {
        Self::executable(&self.path(rel), body);
    }

    /// Log file path usable from inside a fake tool.
    pub fn log(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn platform_tools(&self) {
        self.tool("lsb_release", &format!("echo {}", self.release));
        self.tool(
            "uname",
            &format!(
                "case \"$1\" in\n  -m) echo {} ;;\n  *) echo {} ;;\nesac",
                self.arch, self.kernel
            ),
        );
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.platform_tools();
        Command::new(env!("CARGO_BIN_EXE_ua-addons"))
            .args(args)
            .env_clear()
            .env("PATH", &self.bin)
            .env("UA_ADDONS_ROOT", &self.root)
            .output()
            .expect("run ua-addons")
    }

    /// Repository-family host: dependencies present, keyrings shipped,
    /// token check passing, FIPS packages absent.
    pub fn setup_fips(&self) {
        self.write("usr/lib/apt/methods/https", "");
        self.write("usr/sbin/update-ca-certificates", "");
        self.write("usr/share/keyrings/ubuntu-fips-keyring.gpg", "GPG key");
        self.write("usr/share/keyrings/ubuntu-fips-updates-keyring.gpg", "GPG key");
        self.write("proc/cpuinfo", "flags\t\t: fpu aes apic");
        self.host_tool("usr/lib/apt/apt-helper", "exit 0");
        self.tool("dpkg-query", NOTHING_INSTALLED);
        self.tool("apt-get", "exit 0");
    }

    /// FIPS packages installed; `enabled` is whether the FIPS kernel is running.
    pub fn fips_installed(&self, enabled: bool) {
        self.tool("dpkg-query", FIPS_PACKAGES_INSTALLED);
        self.write(
            "proc/sys/crypto/fips_enabled",
            if enabled { "1\n" } else { "0\n" },
        );
    }

    pub fn setup_livepatch(&self, installed: bool, enabled: bool) {
        self.write("usr/lib/snapd/snapd", "");
        self.tool("apt-get", "exit 0");
        self.tool("dpkg-query", "exit 0");
        self.tool(
            "snap",
            &format!(
                "case \"$1\" in\n  list) exit {} ;;\n  remove) echo \"$2 removed\" ;;\n  *) exit 0 ;;\nesac",
                if installed { 0 } else { 1 }
            ),
        );
        self.livepatch_tool(
            enabled,
            "echo 'Successfully enabled device. Using machine-token: deadbeefdeadbeefdeadbeefdeadbeef'",
        );
    }

    pub fn livepatch_tool(&self, enabled: bool, on_enable: &str) {
        self.tool(
            "canonical-livepatch",
            &format!(
                "case \"$1\" in\n  status) exit {} ;;\n  enable) {on_enable} ;;\n  disable) echo 'Successfully disabled device. Removed machine-token: deadbeefdeadbeefdeadbeefdeadbeef' ;;\nesac",
                if enabled { 0 } else { 1 }
            ),
        );
    }
}

pub fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

pub fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

pub fn code(out: &Output) -> i32 {
    out.status.code().expect("exit code")
}
