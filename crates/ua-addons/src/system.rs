//! The host as seen by the pipeline: files it reads and writes, and the
//! external tools it runs. Everything host-global goes through [`System`] so
//! tests can swap in an in-memory fake.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::runner::run_command;

#[cfg(test)]
pub(crate) mod fake;

/// One external command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub program: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Receipt {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Both streams, informational first.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !out.is_empty() && !out.ends_with('\n') && !self.stderr.is_empty() {
            out.push('\n');
        }
        out.push_str(&self.stderr);
        out
    }
}

#[allow(async_fn_in_trait)]
pub trait System {
    async fn run(&self, invocation: &Invocation) -> io::Result<Receipt>;
    /// `Ok(None)` when the file does not exist.
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>>;
    /// Replaces the file, creating parent directories as needed.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
    /// Like [`System::write`], but the new file is owner-only from creation.
    fn write_private(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;

    fn read_text(&self, path: &Path) -> io::Result<Option<String>> {
        Ok(self
            .read(path)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }
}

/// The real host.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostSystem;

impl System for HostSystem {
    async fn run(&self, invocation: &Invocation) -> io::Result<Receipt> {
        run_command(invocation).await
    }

    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        tracing::debug!(path = %path.display(), bytes = contents.len(), "writing");
        atomic_write(path, contents)
    }

    fn write_private(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        tracing::debug!(path = %path.display(), bytes = contents.len(), "writing private");
        let parent = prepare_parent(path)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

fn prepare_parent(path: &Path) -> io::Result<&Path> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::other(format!("path has no parent dir: {}", path.display())))?;
    fs::create_dir_all(parent)?;

    if path.is_dir() {
        return Err(io::Error::other(format!(
            "refusing to overwrite directory with file: {}",
            path.display()
        )));
    }
    Ok(parent)
}

fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = prepare_parent(path)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{file_name}.tmp.{}", std::process::id()));
    if tmp.exists() {
        let _ = fs::remove_file(&tmp);
    }
    fs::write(&tmp, contents)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
