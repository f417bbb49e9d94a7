//! External process execution
//!
//! Spawns build tools and relays their output live. Two modes exist:
//!
//! - **streaming**: stdout/stderr are piped and copied chunk by chunk to the
//!   configured [`OutputTarget`] as soon as bytes arrive. Nothing is decoded,
//!   so color codes and cursor movement pass through untouched.
//! - **interactive**: the child inherits the terminal (stdin, stdout and
//!   stderr) so curses tools like `menuconfig` can draw full screen.
//!
//! Every run observes a [`CancellationToken`]; when it fires the child is
//! killed and the result is marked cancelled. On unix a streaming child
//! leads its own process group, so the kill also reaches everything it
//! started (compilers under `make`, for instance).

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::{BuildError, NtxError, ProcessError};

/// Read size used when relaying child output
const RELAY_CHUNK: usize = 1024;

/// How long a cancelled run waits for its output relays to finish
const RELAY_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A command line plus the context it runs in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute
    pub program: String,
    /// Arguments, passed verbatim
    pub args: Vec<String>,
    /// Working directory
    pub working_dir: PathBuf,
    /// Environment overrides on top of the inherited environment
    pub env: BTreeMap<String, String>,
    /// Hand the terminal to the child instead of relaying its output
    pub interactive: bool,
}

impl CommandSpec {
    /// Create a command running `program` in `working_dir`
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            env: BTreeMap::new(),
            interactive: false,
        }
    }

    /// Command from a whitespace-separated line such as `bear -- make`
    pub fn from_line(line: &str, working_dir: impl Into<PathBuf>) -> Self {
        let mut words = line.split_whitespace();
        let program = words.next().unwrap_or_default();
        Self::new(program, working_dir).args(words)
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment override
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Run with direct terminal ownership
    #[must_use]
    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.working_dir)
            .envs(&self.env);
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Why a run did not reach a clean exit status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum RunFault {
    /// Process could not be started
    Launch(String),
    /// Output relay or wait failed
    Stream(String),
}

/// Outcome of one external process run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    /// Directory the command ran in (primary workspace or a copy)
    pub location: PathBuf,
    /// Command line that was run
    pub command: String,
    /// Exit code; `128 + signal` when killed by a signal
    pub exit_code: i32,
    /// Wall-clock time from spawn to exit
    pub duration: Duration,
    /// Zero exit code and no fault
    pub succeeded: bool,
    /// Killed by cancellation
    #[serde(default)]
    pub cancelled: bool,
    /// Launch or stream failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<RunFault>,
}

impl BuildResult {
    /// Result for a slot whose process never started
    pub fn launch_failed(location: &Path, command: String, error: &ProcessError) -> Self {
        Self {
            location: location.to_path_buf(),
            command,
            exit_code: crate::config::defaults::LAUNCH_FAILURE_CODE,
            duration: Duration::ZERO,
            succeeded: false,
            cancelled: false,
            fault: Some(RunFault::Launch(error.to_string())),
        }
    }

    /// The error this result stands for, if it is not a success
    pub fn failure(&self) -> Option<NtxError> {
        if self.succeeded {
            return None;
        }
        if self.cancelled {
            return Some(BuildError::Cancelled.into());
        }
        match &self.fault {
            Some(RunFault::Launch(error)) => Some(
                ProcessError::LaunchError {
                    command: self.command.clone(),
                    error: error.clone(),
                }
                .into(),
            ),
            Some(RunFault::Stream(error)) => Some(
                ProcessError::StreamError {
                    command: self.command.clone(),
                    error: error.clone(),
                }
                .into(),
            ),
            None => Some(
                BuildError::BuildFailed {
                    location: self.location.clone(),
                    exit_code: self.exit_code,
                }
                .into(),
            ),
        }
    }
}

/// In-memory sink, mostly for tests and captured runs
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.0.lock() {
            Ok(mut inner) => {
                inner.extend_from_slice(buf);
                Poll::Ready(Ok(buf.len()))
            }
            Err(_) => Poll::Ready(Err(io::Error::other("output buffer poisoned"))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Where relayed output goes
#[derive(Debug, Clone, Default)]
pub enum OutputTarget {
    /// The caller's own stdout/stderr
    #[default]
    Console,
    /// Separate in-memory buffers
    Buffer {
        stdout: SharedBuffer,
        stderr: SharedBuffer,
    },
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

impl OutputTarget {
    /// Fresh pair of buffers
    pub fn buffered() -> Self {
        Self::Buffer {
            stdout: SharedBuffer::new(),
            stderr: SharedBuffer::new(),
        }
    }

    fn stdout_writer(&self) -> BoxedWriter {
        match self {
            Self::Console => Box::new(tokio::io::stdout()),
            Self::Buffer { stdout, .. } => Box::new(stdout.clone()),
        }
    }

    fn stderr_writer(&self) -> BoxedWriter {
        match self {
            Self::Console => Box::new(tokio::io::stderr()),
            Self::Buffer { stderr, .. } => Box::new(stderr.clone()),
        }
    }
}

/// Copy `reader` into `writer` chunk by chunk, flushing after each chunk
///
/// A write failure does not stop the reading side: the rest of the stream is
/// drained and discarded so the child never blocks on a full pipe. The first
/// error is returned once the reader hits EOF.
pub async fn relay<R, W>(mut reader: R, mut writer: W) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_CHUNK];
    let mut relayed = 0u64;
    let mut failure: Option<io::Error> = None;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                failure.get_or_insert(e);
                break;
            }
        };

        if failure.is_none() {
            let written = async {
                writer.write_all(&buf[..n]).await?;
                writer.flush().await
            }
            .await;
            match written {
                Ok(()) => relayed += n as u64,
                Err(e) => failure = Some(e),
            }
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(relayed),
    }
}

/// Exit code for a finished process, `128 + signal` for signal deaths
fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Runs external commands
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    output: OutputTarget,
    cancel: CancellationToken,
}

impl ProcessRunner {
    /// Runner relaying to the console
    pub fn new() -> Self {
        Self::default()
    }

    /// Relay output somewhere other than the console
    #[must_use]
    pub fn with_output(mut self, output: OutputTarget) -> Self {
        self.output = output;
        self
    }

    /// Observe an external cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token observed by every run
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run a command to completion
    ///
    /// Non-zero exit codes are reported in the result, not as errors. Only a
    /// failure to start the process is an `Err`.
    pub async fn run(&self, spec: &CommandSpec) -> Result<BuildResult, ProcessError> {
        let command_line = spec.to_string();
        debug!(
            "Running '{command_line}' in {} (interactive: {})",
            spec.working_dir.display(),
            spec.interactive
        );

        let mut cmd = spec.to_command();
        if spec.interactive {
            cmd.stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        } else {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            #[cfg(unix)]
            cmd.process_group(0);
        }
        cmd.kill_on_drop(true);

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|e| ProcessError::LaunchError {
            command: command_line.clone(),
            error: e.to_string(),
        })?;

        let stdout_relay = child
            .stdout
            .take()
            .map(|out| tokio::spawn(relay(out, self.output.stdout_writer())));
        let stderr_relay = child
            .stderr
            .take()
            .map(|err| tokio::spawn(relay(err, self.output.stderr_writer())));

        let (status, cancelled) = self.wait(&mut child, !spec.interactive).await;

        let mut fault = None;
        for mut handle in [stdout_relay, stderr_relay].into_iter().flatten() {
            let joined = if cancelled {
                // Anything that escaped the group kill may still hold the pipe
                match tokio::time::timeout(RELAY_DRAIN_TIMEOUT, &mut handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!("Output relay for '{command_line}' did not drain, abandoning it");
                        handle.abort();
                        continue;
                    }
                }
            } else {
                handle.await
            };
            let outcome = match joined {
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(e) => e.to_string(),
            };
            warn!("Output relay for '{command_line}' failed: {outcome}");
            fault.get_or_insert(RunFault::Stream(outcome));
        }

        let exit_code = match status {
            Ok(status) => status_code(status),
            Err(e) => {
                fault.get_or_insert(RunFault::Stream(format!("wait failed: {e}")));
                -1
            }
        };

        let duration = started.elapsed();
        let succeeded = exit_code == 0 && fault.is_none() && !cancelled;
        if succeeded {
            debug!("'{command_line}' finished in {duration:?}");
        } else {
            error!("'{command_line}' failed with exit code {exit_code}");
        }

        Ok(BuildResult {
            location: spec.working_dir.clone(),
            command: command_line,
            exit_code,
            duration,
            succeeded,
            cancelled,
            fault,
        })
    }

    /// Wait for exit or cancellation, killing the child on the latter
    async fn wait(&self, child: &mut Child, group: bool) -> (io::Result<ExitStatus>, bool) {
        tokio::select! {
            status = child.wait() => (status, false),
            () = self.cancel.cancelled() => {
                warn!("Cancellation requested, killing child process");
                terminate(child, group);
                (child.wait().await, true)
            }
        }
    }
}

/// Kill the child, and its whole process group when it leads one
fn terminate(child: &mut Child, group: bool) {
    #[cfg(unix)]
    if group {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) {
            match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                Ok(()) => return,
                Err(e) => warn!("Failed to kill process group {pid}: {e}"),
            }
        }
    }
    #[cfg(not(unix))]
    let _ = group;

    if let Err(e) = child.start_kill() {
        warn!("Failed to kill child process: {e}");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str, dir: &Path) -> CommandSpec {
        CommandSpec::new("sh", dir).arg("-c").arg(script)
    }

    fn buffers(target: &OutputTarget) -> (Vec<u8>, Vec<u8>) {
        match target {
            OutputTarget::Buffer { stdout, stderr } => (stdout.contents(), stderr.contents()),
            OutputTarget::Console => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_run_relays_raw_bytes_and_exit_code() {
        let dir = TempDir::new().unwrap();
        let output = OutputTarget::buffered();
        let runner = ProcessRunner::new().with_output(output.clone());

        let spec = sh(
            r"printf '\033[31mred\033[0m\r\n'; printf 'oops' >&2; exit 3",
            dir.path(),
        );
        let result = runner.run(&spec).await.unwrap();

        let (stdout, stderr) = buffers(&output);
        assert_eq!(stdout, b"\x1b[31mred\x1b[0m\r\n");
        assert_eq!(stderr, b"oops");
        assert_eq!(result.exit_code, 3);
        assert!(!result.succeeded);
        assert!(!result.cancelled);
        assert!(result.fault.is_none());
        assert_eq!(result.location, dir.path());
    }

    #[tokio::test]
    async fn test_run_preserves_order_of_large_output() {
        let dir = TempDir::new().unwrap();
        let output = OutputTarget::buffered();
        let runner = ProcessRunner::new().with_output(output.clone());

        let result = runner
            .run(&sh("i=0; while [ $i -lt 5000 ]; do echo line$i; i=$((i+1)); done", dir.path()))
            .await
            .unwrap();
        assert!(result.succeeded);

        let expected: String = (0..5000).map(|i| format!("line{i}\n")).collect();
        let (stdout, _) = buffers(&output);
        assert_eq!(String::from_utf8(stdout).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_run_passes_env_overrides_and_cwd() {
        let dir = TempDir::new().unwrap();
        let output = OutputTarget::buffered();
        let runner = ProcessRunner::new().with_output(output.clone());

        let spec = sh("printf '%s:%s' \"$NTX_TEST\" \"$(basename \"$PWD\")\"", dir.path())
            .env("NTX_TEST", "hello");
        let result = runner.run(&spec).await.unwrap();
        assert!(result.succeeded);

        let name = dir.path().file_name().unwrap().to_string_lossy().to_string();
        let (stdout, _) = buffers(&output);
        assert_eq!(String::from_utf8(stdout).unwrap(), format!("hello:{name}"));
    }

    #[tokio::test]
    async fn test_run_missing_program_is_launch_error() {
        let dir = TempDir::new().unwrap();
        let runner = ProcessRunner::new().with_output(OutputTarget::buffered());

        let spec = CommandSpec::new("ntxbuild-definitely-missing-tool", dir.path());
        let err = runner.run(&spec).await.unwrap_err();
        assert!(matches!(err, ProcessError::LaunchError { .. }));
    }

    #[tokio::test]
    async fn test_run_signal_death_is_indicative_code() {
        let dir = TempDir::new().unwrap();
        let runner = ProcessRunner::new().with_output(OutputTarget::buffered());

        let result = runner.run(&sh("kill -9 $$", dir.path())).await.unwrap();
        assert_eq!(result.exit_code, 128 + 9);
        assert!(!result.succeeded);
    }

    #[tokio::test]
    async fn test_cancellation_kills_child() {
        let dir = TempDir::new().unwrap();
        let token = CancellationToken::new();
        let runner = ProcessRunner::new()
            .with_output(OutputTarget::buffered())
            .with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            token.cancel();
        });

        let result = runner.run(&sh("exec sleep 30", dir.path())).await.unwrap();
        canceller.await.unwrap();

        assert!(result.cancelled);
        assert!(!result.succeeded);
        assert!(result.duration < Duration::from_secs(10));
        assert!(matches!(
            result.failure(),
            Some(NtxError::Build(BuildError::Cancelled))
        ));
    }

    fn cancel_after(token: &CancellationToken, delay: Duration) -> tokio::task::JoinHandle<()> {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            token.cancel();
        })
    }

    #[tokio::test]
    async fn test_cancellation_does_not_wait_for_grandchildren() {
        let dir = TempDir::new().unwrap();
        let token = CancellationToken::new();
        let runner = ProcessRunner::new()
            .with_output(OutputTarget::buffered())
            .with_cancellation(token.clone());

        // No exec: sleep runs as a grandchild holding the output pipes
        let canceller = cancel_after(&token, Duration::from_millis(200));
        let result = runner.run(&sh("sleep 6; true", dir.path())).await.unwrap();
        canceller.await.unwrap();

        assert!(result.cancelled);
        assert!(result.duration < Duration::from_secs(3), "{:?}", result.duration);
    }

    #[tokio::test]
    async fn test_cancellation_kills_background_descendants() {
        let dir = TempDir::new().unwrap();
        let token = CancellationToken::new();
        let runner = ProcessRunner::new()
            .with_output(OutputTarget::buffered())
            .with_cancellation(token.clone());

        let canceller = cancel_after(&token, Duration::from_millis(200));
        let result = runner
            .run(&sh("(sleep 2; touch late.txt) & wait", dir.path()))
            .await
            .unwrap();
        canceller.await.unwrap();
        assert!(result.cancelled);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!dir.path().join("late.txt").exists());
    }

    #[tokio::test]
    async fn test_relay_write_failure_still_drains_reader() {
        struct Broken;
        impl AsyncWrite for Broken {
            fn poll_write(
                self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
                _buf: &[u8],
            ) -> Poll<io::Result<usize>> {
                Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed")))
            }
            fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
                Poll::Ready(Ok(()))
            }
            fn poll_shutdown(
                self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
            ) -> Poll<io::Result<()>> {
                Poll::Ready(Ok(()))
            }
        }

        let data = vec![b'x'; RELAY_CHUNK * 4];
        let mut reader = &data[..];
        let err = relay(&mut reader, Broken).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_failure_maps_to_build_failed() {
        let result = BuildResult {
            location: PathBuf::from("/ws/nuttx"),
            command: "make".to_string(),
            exit_code: 2,
            duration: Duration::from_secs(1),
            succeeded: false,
            cancelled: false,
            fault: None,
        };
        assert!(matches!(
            result.failure(),
            Some(NtxError::Build(BuildError::BuildFailed { exit_code: 2, .. }))
        ));
    }

    #[test]
    fn test_command_spec_display() {
        let spec = CommandSpec::new("make", "/ws/nuttx").args(["-j4", "all"]);
        assert_eq!(spec.to_string(), "make -j4 all");
    }

    #[test]
    fn test_command_spec_from_line() {
        let spec = CommandSpec::from_line("  bear --  make ", "/ws/nuttx").arg("-j2");
        assert_eq!(spec.program, "bear");
        assert_eq!(spec.args, vec!["--", "make", "-j2"]);
    }
}
