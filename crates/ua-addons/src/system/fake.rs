use super::{Invocation, Receipt, System};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

type Responder = Box<dyn Fn(&Invocation) -> Receipt + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FakeFile {
    pub bytes: Vec<u8>,
    pub mode: u32,
}

/// In-memory host: a file map plus canned command responses keyed by program
/// basename. Unregistered programs behave like missing binaries.
#[derive(Default)]
pub(crate) struct FakeSystem {
    files: Mutex<BTreeMap<PathBuf, FakeFile>>,
    responders: BTreeMap<String, Responder>,
    runs: Mutex<Vec<Invocation>>,
    writes: Mutex<Vec<PathBuf>>,
}

pub(crate) fn reply(exit_code: i32, stdout: &str, stderr: &str) -> Receipt {
    Receipt {
        program: String::new(),
        exit_code: Some(exit_code),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

fn basename(program: &str) -> String {
    Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string())
}

impl FakeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.put(path, contents.as_bytes(), 0o644);
        self
    }

    pub fn on<F>(mut self, program: &str, responder: F) -> Self
    where
        F: Fn(&Invocation) -> Receipt + Send + Sync + 'static,
    {
        self.responders
            .insert(program.to_string(), Box::new(responder));
        self
    }

    pub fn put(&self, path: impl Into<PathBuf>, contents: &[u8], mode: u32) {
        self.files.lock().expect("files lock").insert(
            path.into(),
            FakeFile {
                bytes: contents.to_vec(),
                mode,
            },
        );
    }

    pub fn remove(&self, path: &Path) {
        self.files.lock().expect("files lock").remove(path);
    }

    pub fn file(&self, path: &Path) -> Option<FakeFile> {
        self.files.lock().expect("files lock").get(path).cloned()
    }

    pub fn text(&self, path: &Path) -> Option<String> {
        self.file(path)
            .map(|f| String::from_utf8_lossy(&f.bytes).into_owned())
    }

    pub fn runs(&self) -> Vec<Invocation> {
        self.runs.lock().expect("runs lock").clone()
    }

    pub fn ran(&self, program: &str) -> bool {
        self.runs().iter().any(|inv| basename(&inv.program) == program)
    }

    pub fn writes(&self) -> Vec<PathBuf> {
        self.writes.lock().expect("writes lock").clone()
    }
}

impl System for FakeSystem {
    async fn run(&self, invocation: &Invocation) -> io::Result<Receipt> {
        self.runs
            .lock()
            .expect("runs lock")
            .push(invocation.clone());
        let name = basename(&invocation.program);
        let responder = self.responders.get(&name).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{name}: not found"))
        })?;
        let mut receipt = responder(invocation);
        receipt.program = invocation.program.clone();
        Ok(receipt)
    }

    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        Ok(self.file(path).map(|f| f.bytes))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.writes
            .lock()
            .expect("writes lock")
            .push(path.to_path_buf());
        self.put(path, contents, 0o644);
        Ok(())
    }

    fn write_private(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.writes
            .lock()
            .expect("writes lock")
            .push(path.to_path_buf());
        self.put(path, contents, 0o600);
        Ok(())
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut files = self.files.lock().expect("files lock");
        let file = files
            .get_mut(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))?;
        file.mode = mode;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().expect("files lock").contains_key(path)
    }
}
