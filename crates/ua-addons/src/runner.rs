use crate::system::{Invocation, Receipt};
use std::process::Stdio;
use tokio::io::AsyncReadExt;

/// Per-stream capture cap. Older output is dropped from the front and the
/// capture is prefixed with a marker saying how much.
const MAX_CAPTURE_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Default)]
struct TailBuffer {
    max: usize,
    buf: Vec<u8>,
    dropped: usize,
}

impl TailBuffer {
    fn new(max: usize) -> Self {
        Self {
            max,
            buf: vec![],
            dropped: 0,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
        if self.buf.len() > self.max {
            let excess = self.buf.len() - self.max;
            self.buf.drain(0..excess);
            self.dropped += excess;
        }
    }

    fn into_string(self) -> String {
        let tail = String::from_utf8_lossy(&self.buf);
        if self.dropped == 0 {
            return tail.into_owned();
        }
        format!("<{} earlier bytes truncated>\n{tail}", self.dropped)
    }
}

async fn read_stream<R: tokio::io::AsyncRead + Unpin>(
    mut r: R,
    max_tail: usize,
) -> std::io::Result<String> {
    let mut tail = TailBuffer::new(max_tail);
    let mut buf = vec![0u8; 8 * 1024];
    loop {
        let n = r.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        tail.push(&buf[..n]);
    }
    Ok(tail.into_string())
}

async fn join_capture(
    task: tokio::task::JoinHandle<std::io::Result<String>>,
    stream_name: &str,
) -> std::io::Result<String> {
    match task.await {
        Ok(res) => res,
        Err(_join_err) => Ok(format!("<{stream_name} join error>")),
    }
}

/// Runs `invocation` to completion with stdin closed, capturing both streams.
///
/// A missing program surfaces as `ErrorKind::NotFound`.
pub async fn run_command(invocation: &Invocation) -> std::io::Result<Receipt> {
    tracing::debug!(command = %invocation.display(), "spawning");
    let mut cmd = tokio::process::Command::new(&invocation.program);
    cmd.args(&invocation.args);
    if !invocation.env.is_empty() {
        cmd.envs(invocation.env.clone());
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn()?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("stdout is not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("stderr is not captured"))?;

    let stdout_task = tokio::spawn(read_stream(stdout, MAX_CAPTURE_BYTES));
    let stderr_task = tokio::spawn(read_stream(stderr, MAX_CAPTURE_BYTES));

    let status = child.wait().await?;
    let stdout = join_capture(stdout_task, "stdout").await?;
    let stderr = join_capture(stderr_task, "stderr").await?;

    tracing::debug!(command = %invocation.display(), exit_code = ?status.code(), "finished");
    Ok(Receipt {
        program: invocation.program.clone(),
        exit_code: status.code(),
        stdout,
        stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn read_stream_keeps_the_tail() {
        let payload = b"abcdef".to_vec();
        let (mut tx, rx) = tokio::io::duplex(64);
        tokio::spawn(async move {
            tx.write_all(&payload).await.expect("write payload");
        });

        let tail = read_stream(rx, 3).await.expect("capture stream");
        assert_eq!(tail, "<3 earlier bytes truncated>\ndef");
    }

    #[test]
    fn tail_buffer_counts_every_dropped_byte() {
        let mut tail = TailBuffer::new(4);
        tail.push(b"ab");
        tail.push(b"cdef");
        tail.push(b"0123456789");
        assert_eq!(tail.dropped, 12);
        assert_eq!(tail.into_string(), "<12 earlier bytes truncated>\n6789");

        let mut short = TailBuffer::new(4);
        short.push(b"ok\n");
        assert_eq!(short.into_string(), "ok\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_both_streams_and_exit_code() {
        let inv = Invocation::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);
        let receipt = run_command(&inv).await.expect("receipt");
        assert_eq!(receipt.exit_code, Some(3));
        assert!(!receipt.success());
        assert_eq!(receipt.stdout, "out\n");
        assert_eq!(receipt.stderr, "err\n");
        assert_eq!(receipt.combined(), "out\nerr\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn passes_environment_overrides() {
        let inv = Invocation::new("sh")
            .args(["-c", "echo \"$DEBIAN_FRONTEND\""])
            .env("DEBIAN_FRONTEND", "noninteractive");
        let receipt = run_command(&inv).await.expect("receipt");
        assert!(receipt.success());
        assert_eq!(receipt.stdout.trim(), "noninteractive");
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let inv = Invocation::new("ua-addons-test-no-such-program");
        let err = run_command(&inv).await.expect_err("spawn must fail");
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
