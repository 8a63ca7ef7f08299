//! Launching project entry points.
//!
//! [`ProcessRunner::spawn`] returns as soon as the OS has created the child.
//! The returned [`ProcessHandle`] owns the child's piped output streams;
//! reading them (or waiting) is up to the caller.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::debug;

/// Starts an entry-point script as an independent child process.
pub trait ProcessRunner: Send + Sync {
    /// Spawn `script` with `working_dir` as its current directory.
    ///
    /// Never waits for the child. Launch failures (missing interpreter,
    /// permission denied) are returned immediately.
    fn spawn(&self, script: &Path, working_dir: &Path) -> io::Result<ProcessHandle>;
}

/// Collected result of a finished process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Standard output (lossy UTF-8).
    pub stdout: String,
    /// Standard error (lossy UTF-8).
    pub stderr: String,
    /// Exit code, or `-1` when terminated by a signal.
    pub exit_code: i32,
}

/// A running entry-point process.
///
/// Dropping the handle does not kill the child.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    script: PathBuf,
}

impl ProcessHandle {
    /// OS process id, or `None` once the child has been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// The script this process runs.
    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Take ownership of the child's stdout pipe.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the child's stderr pipe.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Poll for completion without blocking.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit.
    ///
    /// Output pipes that were not taken are not drained; a child that fills a
    /// pipe buffer can block. Use [`Self::wait_with_output`] to collect output.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Wait for exit while collecting whatever output pipes are still attached.
    pub async fn wait_with_output(self) -> io::Result<ProcessOutput> {
        let output = self.child.wait_with_output().await?;
        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    /// Kill the process and wait for it to exit.
    pub async fn kill(&mut self) -> io::Result<()> {
        self.child.kill().await
    }
}

/// Process runner backed by `tokio::process::Command`.
///
/// By default scripts run through `bash`. Spawning requires a Tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioProcessRunner {
    interpreter: Option<OsString>,
}

impl TokioProcessRunner {
    /// Run scripts with `bash <script>`.
    pub fn new() -> Self {
        Self::with_interpreter("bash")
    }

    /// Run scripts with `<interpreter> <script>`.
    pub fn with_interpreter(interpreter: impl Into<OsString>) -> Self {
        Self {
            interpreter: Some(interpreter.into()),
        }
    }

    /// Execute scripts directly; they must be executable.
    pub fn direct() -> Self {
        Self { interpreter: None }
    }
}

impl Default for TokioProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner for TokioProcessRunner {
    fn spawn(&self, script: &Path, working_dir: &Path) -> io::Result<ProcessHandle> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(io::Error::other("spawning a process requires a Tokio runtime"));
        }

        let mut cmd = match &self.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                let _ = cmd.arg(script);
                cmd
            }
            None => Command::new(script),
        };
        let _ = cmd
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        let child = cmd.spawn()?;
        debug!(
            script = %script.display(),
            working_dir = %working_dir.display(),
            pid = child.id(),
            "process spawned"
        );
        Ok(ProcessHandle {
            child,
            script: script.to_path_buf(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("run.sh");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(dir.path(), "echo hello\necho oops >&2\nexit 3\n");
        let handle = TokioProcessRunner::new().spawn(&path, dir.path()).unwrap();
        assert!(handle.id().is_some());
        let output = handle.wait_with_output().await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
        assert_eq!(output.exit_code, 3);
    }

    #[tokio::test]
    async fn runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(dir.path(), "pwd\n");
        let output = TokioProcessRunner::new()
            .spawn(&path, dir.path())
            .unwrap()
            .wait_with_output()
            .await
            .unwrap();
        assert_eq!(
            PathBuf::from(output.stdout.trim()).canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn spawn_returns_before_completion() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(dir.path(), "sleep 5\n");
        let mut handle = TokioProcessRunner::new().spawn(&path, dir.path()).unwrap();
        assert!(handle.try_wait().unwrap().is_none());
        handle.kill().await.unwrap();
        assert!(handle.try_wait().unwrap().is_some());
    }

    #[tokio::test]
    async fn streams_can_be_taken() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(dir.path(), "echo streamed\n");
        let mut handle = TokioProcessRunner::new().spawn(&path, dir.path()).unwrap();
        let mut stdout = handle.take_stdout().unwrap();
        assert!(handle.take_stdout().is_none());
        let mut text = String::new();
        let _ = stdout.read_to_string(&mut text).await.unwrap();
        assert_eq!(text, "streamed\n");
        assert!(handle.wait().await.unwrap().success());
    }

    #[tokio::test]
    async fn missing_interpreter_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(dir.path(), "echo hi\n");
        let runner = TokioProcessRunner::with_interpreter("archon-no-such-interpreter");
        let err = runner.spawn(&path, dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn direct_requires_executable_bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(dir.path(), "#!/bin/sh\necho direct\n");
        let err = TokioProcessRunner::direct().spawn(&path, dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

        crate::scaffold::make_executable(&path).unwrap();
        let output = TokioProcessRunner::direct()
            .spawn(&path, dir.path())
            .unwrap()
            .wait_with_output()
            .await
            .unwrap();
        assert_eq!(output.stdout, "direct\n");
    }

    #[test]
    fn spawn_outside_runtime_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(dir.path(), "echo hi\n");
        let err = TokioProcessRunner::new().spawn(&path, dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
