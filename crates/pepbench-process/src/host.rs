//! The process host seam.
//!
//! A [`ProcessHost`] runs a command "on" an emulated endpoint, either
//! foreground with an optional hard deadline or background with later
//! termination. Output lines are delivered to an optional callback in
//! per-stream production order. The benchmark runner only ever talks
//! to this trait, which is what the scripted test hosts stand in for.

use crate::terminate;
use crate::watcher::{watch_lines, WatchEnd};
use async_trait::async_trait;
use pepbench_common::{BenchError, BenchResult};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long a process gets between SIGTERM and SIGKILL.
const GRACEFUL_EXIT_TIMEOUT: Duration = Duration::from_secs(2);

/// How long reader tasks get to drain after termination.
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Callback invoked once per complete output line.
pub type LineCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Options for a foreground run.
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Hard wall-clock deadline; on expiry the process is terminated,
    /// not abandoned.
    pub timeout: Option<Duration>,
    /// Per-line output callback (stdout and stderr).
    pub on_line: Option<LineCallback>,
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("timeout", &self.timeout)
            .field("on_line", &self.on_line.is_some())
            .finish()
    }
}

/// Result of a foreground run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatus {
    /// Exit code, if the process exited on its own with one.
    pub exit_code: Option<i32>,
    /// Whether the deadline expired and the process was terminated.
    pub timed_out: bool,
}

/// Runs commands on emulated endpoints.
#[async_trait]
pub trait ProcessHost: Send + Sync {
    /// Run a command in the foreground until it exits or the deadline
    /// expires. All output lines have been delivered to `on_line` by
    /// the time this returns.
    async fn run(
        &self,
        endpoint: &str,
        command: &[String],
        options: RunOptions,
    ) -> BenchResult<RunStatus>;

    /// Launch a command in the background, delivering output lines to
    /// `on_line` as they appear. The returned handle owns the process.
    async fn spawn(
        &self,
        endpoint: &str,
        command: &[String],
        on_line: Option<LineCallback>,
    ) -> BenchResult<Box<dyn BackgroundProcess>>;
}

/// Handle to a background-launched process.
#[async_trait]
pub trait BackgroundProcess: Send {
    /// PID of the process, if it was spawned successfully.
    fn pid(&self) -> Option<u32>;

    /// Terminate the process (SIGTERM, bounded wait, SIGKILL) and
    /// drain its output readers. Idempotent.
    async fn terminate(&mut self) -> BenchResult<()>;
}

/// Process host executing commands on the local machine.
///
/// With `use_netns` enabled, commands are wrapped in
/// `ip netns exec <endpoint>` so each endpoint name addresses one
/// emulated network namespace. With it disabled the endpoint is
/// advisory, which is what single-host tests use.
#[derive(Debug, Clone)]
pub struct LocalProcessHost {
    use_netns: bool,
}

impl LocalProcessHost {
    /// Host that runs commands directly, ignoring the endpoint name.
    pub fn new() -> Self {
        Self { use_netns: false }
    }

    /// Host that runs each command inside the network namespace named
    /// by the endpoint.
    pub fn with_netns() -> Self {
        Self { use_netns: true }
    }

    fn build_command(&self, endpoint: &str, command: &[String]) -> BenchResult<Command> {
        let (program, args): (&str, Vec<&str>) = if self.use_netns {
            let mut args = vec!["netns", "exec", endpoint];
            args.extend(command.iter().map(String::as_str));
            ("ip", args)
        } else {
            (
                command[0].as_str(),
                command[1..].iter().map(String::as_str).collect(),
            )
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            // Safety net: a handle dropped without terminate() must not
            // leak the process into the next scenario.
            .kill_on_drop(true);
        Ok(cmd)
    }

    fn spawn_child(&self, endpoint: &str, command: &[String]) -> BenchResult<Child> {
        if command.is_empty() {
            return Err(BenchError::configuration("empty command"));
        }

        debug!(endpoint, command = %command.join(" "), "Spawning process");
        let mut cmd = self.build_command(endpoint, command)?;
        cmd.spawn()
            .map_err(|e| BenchError::spawn_failed(endpoint, e.to_string()))
    }

    /// Attach line readers to the child's stdout and stderr.
    ///
    /// Both streams are always drained, even without a callback, so a
    /// chatty process can never block on a full pipe.
    fn spawn_line_readers(
        child: &mut Child,
        on_line: Option<LineCallback>,
        cancel: &CancellationToken,
    ) -> Vec<JoinHandle<WatchEnd>> {
        let mut tasks = Vec::with_capacity(2);

        if let Some(stdout) = child.stdout.take() {
            let callback = on_line.clone();
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                watch_lines(
                    stdout,
                    |line| {
                        if let Some(cb) = &callback {
                            cb(line);
                        }
                    },
                    None,
                    &cancel,
                )
                .await
            }));
        }

        if let Some(stderr) = child.stderr.take() {
            let callback = on_line;
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                watch_lines(
                    stderr,
                    |line| {
                        if let Some(cb) = &callback {
                            cb(line);
                        }
                    },
                    None,
                    &cancel,
                )
                .await
            }));
        }

        tasks
    }

    /// SIGTERM, bounded wait, SIGKILL, reap.
    async fn shutdown_child(child: &mut Child) {
        let pid = match child.id() {
            Some(pid) => pid,
            None => {
                // Already reaped.
                return;
            }
        };

        if let Err(e) = terminate::terminate_gracefully(pid) {
            warn!(pid, error = %e, "SIGTERM failed");
        }

        match tokio::time::timeout(GRACEFUL_EXIT_TIMEOUT, child.wait()).await {
            Ok(_) => {
                debug!(pid, "Process exited after SIGTERM");
            }
            Err(_) => {
                warn!(pid, "Graceful shutdown timed out, force killing");
                if let Err(e) = terminate::force_kill(pid) {
                    error!(pid, error = %e, "SIGKILL failed");
                }
                let _ = child.wait().await;
            }
        }
    }

    async fn join_readers(tasks: Vec<JoinHandle<WatchEnd>>) {
        for task in tasks {
            let _ = tokio::time::timeout(READER_JOIN_TIMEOUT, task).await;
        }
    }
}

impl Default for LocalProcessHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessHost for LocalProcessHost {
    async fn run(
        &self,
        endpoint: &str,
        command: &[String],
        options: RunOptions,
    ) -> BenchResult<RunStatus> {
        let mut child = self.spawn_child(endpoint, command)?;
        let cancel = CancellationToken::new();
        let readers = Self::spawn_line_readers(&mut child, options.on_line, &cancel);

        let (exit_status, timed_out) = match options.timeout {
            Some(bound) => match tokio::time::timeout(bound, child.wait()).await {
                Ok(status) => (Some(status?), false),
                Err(_) => {
                    info!(endpoint, bound_s = bound.as_secs_f64(), "Run deadline expired, terminating");
                    Self::shutdown_child(&mut child).await;
                    (None, true)
                }
            },
            None => (Some(child.wait().await?), false),
        };

        // The child is gone either way, so the streams are at EOF;
        // join the readers to guarantee every line was delivered
        // before the caller classifies the output.
        Self::join_readers(readers).await;

        let status = RunStatus {
            exit_code: exit_status.and_then(|s| s.code()),
            timed_out,
        };
        debug!(endpoint, ?status, "Foreground run finished");
        Ok(status)
    }

    async fn spawn(
        &self,
        endpoint: &str,
        command: &[String],
        on_line: Option<LineCallback>,
    ) -> BenchResult<Box<dyn BackgroundProcess>> {
        let mut child = self.spawn_child(endpoint, command)?;
        let cancel = CancellationToken::new();
        let readers = Self::spawn_line_readers(&mut child, on_line, &cancel);
        let pid = child.id();
        info!(endpoint, pid, "Background process started");

        Ok(Box::new(LocalBackgroundProcess {
            endpoint: endpoint.to_string(),
            child: Some(child),
            pid,
            cancel,
            readers,
        }))
    }
}

/// Background process spawned by [`LocalProcessHost`].
struct LocalBackgroundProcess {
    endpoint: String,
    child: Option<Child>,
    pid: Option<u32>,
    cancel: CancellationToken,
    readers: Vec<JoinHandle<WatchEnd>>,
}

#[async_trait]
impl BackgroundProcess for LocalBackgroundProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    async fn terminate(&mut self) -> BenchResult<()> {
        if let Some(mut child) = self.child.take() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(endpoint = %self.endpoint, ?status, "Background process already exited");
                }
                _ => {
                    LocalProcessHost::shutdown_child(&mut child).await;
                    info!(endpoint = %self.endpoint, pid = self.pid, "Background process terminated");
                }
            }
        }

        self.cancel.cancel();
        LocalProcessHost::join_readers(std::mem::take(&mut self.readers)).await;
        Ok(())
    }
}
