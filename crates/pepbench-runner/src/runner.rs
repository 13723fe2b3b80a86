//! The benchmark runner state machine.
//!
//! States: `Idle → ServerStarting → ServerReady → ClientRunning →
//! Completed`, with an error edge from every non-terminal state to
//! `Completed`. The runner owns the server process for the duration of
//! one request and terminates it (best effort) on every exit path, so
//! an aborted run cannot leak ports or namespaces into the next
//! scenario.

use crate::extract::ResultExtractor;
use crate::outcome::{FailureReason, Outcome};
use crate::request::RunRequest;
use crate::transport::Transport;
use parking_lot::Mutex;
use pepbench_common::BenchResult;
use pepbench_process::{BackgroundProcess, LineCallback, ProcessHost, ReadinessGate, RunOptions};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runner lifecycle state for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    ServerStarting,
    ServerReady,
    ClientRunning,
    Completed,
}

impl RunnerState {
    /// Whether `self → target` is a legal transition.
    ///
    /// Every non-terminal state may fail directly to `Completed`.
    pub fn can_transition_to(self, target: RunnerState) -> bool {
        use RunnerState::*;
        matches!(
            (self, target),
            (Idle, ServerStarting)
                | (ServerStarting, ServerReady)
                | (ServerReady, ClientRunning)
                | (ServerStarting, Completed)
                | (ServerReady, Completed)
                | (ClientRunning, Completed)
                | (Completed, Idle)
        )
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerState::Idle => write!(f, "idle"),
            RunnerState::ServerStarting => write!(f, "server_starting"),
            RunnerState::ServerReady => write!(f, "server_ready"),
            RunnerState::ClientRunning => write!(f, "client_running"),
            RunnerState::Completed => write!(f, "completed"),
        }
    }
}

/// Executes one [`RunRequest`] at a time to completion.
///
/// The runner is reusable: `Completed` transitions back to `Idle` when
/// the next request begins. It must never be driven concurrently; the
/// server endpoint and process host belong exclusively to the active
/// request.
pub struct BenchmarkRunner {
    host: Arc<dyn ProcessHost>,
    transport: Arc<dyn Transport>,
    state: RunnerState,
}

impl BenchmarkRunner {
    pub fn new(host: Arc<dyn ProcessHost>, transport: Arc<dyn Transport>) -> Self {
        Self {
            host,
            transport,
            state: RunnerState::Idle,
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    fn transition(&mut self, target: RunnerState) {
        debug_assert!(
            self.state.can_transition_to(target),
            "illegal runner transition {} -> {}",
            self.state,
            target
        );
        debug!(from = %self.state, to = %target, "Runner state transition");
        self.state = target;
    }

    /// Run one (server-start → client-run → classify) cycle.
    ///
    /// Returns `Err` only for infrastructure faults (spawn failures
    /// and the like); every completed cycle, including timeouts and
    /// empty output, is expressed as an [`Outcome`].
    pub async fn execute(&mut self, request: &RunRequest) -> BenchResult<Outcome> {
        if self.state == RunnerState::Completed {
            self.transition(RunnerState::Idle);
        }
        info!(
            label = %request.label(),
            transport = self.transport.name(),
            pep = request.pep_enabled,
            "Starting benchmark run"
        );

        // Server startup, synchronized on the readiness line.
        self.transition(RunnerState::ServerStarting);
        let gate = ReadinessGate::new();
        let marker = self.transport.readiness_marker().to_lowercase();
        let readiness =
            gate.line_callback(move |line| line.to_lowercase().contains(marker.as_str()));

        let server_command = self.transport.server_command(request);
        let mut server = match self
            .host
            .spawn(&request.server_endpoint, &server_command, Some(readiness))
            .await
        {
            Ok(server) => server,
            Err(e) => {
                self.transition(RunnerState::Completed);
                return Err(e);
            }
        };

        if let Err(e) = gate.wait_ready(request.startup_timeout).await {
            warn!(
                label = %request.label(),
                error = %e,
                "Server did not become ready, aborting run"
            );
            Self::teardown_server(&mut server).await;
            self.transition(RunnerState::Completed);
            return Ok(Outcome::Failure {
                reason: FailureReason::ServerStartTimeout,
            });
        }
        self.transition(RunnerState::ServerReady);

        // Client-endpoint setup (scratch dirs, connectivity probe).
        // Failures are logged and the run proceeds.
        for command in self.transport.client_setup_commands(request) {
            match self
                .host
                .run(
                    &request.client_endpoint,
                    &command,
                    RunOptions {
                        timeout: Some(request.startup_timeout),
                        on_line: None,
                    },
                )
                .await
            {
                Ok(status) if status.exit_code == Some(0) => {}
                Ok(status) => {
                    warn!(
                        label = %request.label(),
                        command = %command.join(" "),
                        exit_code = ?status.exit_code,
                        "Client setup command did not succeed"
                    );
                }
                Err(e) => {
                    warn!(
                        label = %request.label(),
                        command = %command.join(" "),
                        error = %e,
                        "Client setup command failed to run"
                    );
                }
            }
        }

        // Client run under the hard deadline, extractor attached.
        self.transition(RunnerState::ClientRunning);
        let extractor = Arc::new(Mutex::new(ResultExtractor::new(
            self.transport.extractor_markers(),
        )));
        let sink = Arc::clone(&extractor);
        let on_line: LineCallback = Arc::new(move |line: &str| sink.lock().observe_line(line));

        let client_command = self.transport.client_command(request);
        let status = self
            .host
            .run(
                &request.client_endpoint,
                &client_command,
                RunOptions {
                    timeout: Some(request.run_timeout),
                    on_line: Some(on_line),
                },
            )
            .await;

        // The server is torn down on every path out of the client run.
        Self::teardown_server(&mut server).await;

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                self.transition(RunnerState::Completed);
                return Err(e);
            }
        };

        let outcome = extractor
            .lock()
            .classify(status.timed_out, request.run_timeout);

        if outcome.is_success() && status.exit_code != Some(0) {
            // External binaries are noisy; one valid measurement wins.
            warn!(
                label = %request.label(),
                exit_code = ?status.exit_code,
                "Client exited non-zero but produced a measurement"
            );
        }

        info!(
            label = %request.label(),
            outcome = outcome.kind(),
            "Benchmark run completed"
        );
        self.transition(RunnerState::Completed);
        Ok(outcome)
    }

    async fn teardown_server(server: &mut Box<dyn BackgroundProcess>) {
        if let Err(e) = server.terminate().await {
            warn!(error = %e, "Server teardown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractorMarkers;
    use async_trait::async_trait;
    use pepbench_common::{BenchError, ScenarioId};
    use pepbench_process::RunStatus;
    use pepbench_scenario::{Scenario, Strategy};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Process host replaying scripted output without real processes.
    ///
    /// Server lines are delivered synchronously inside `spawn`, before
    /// the runner ever starts waiting. That is the notify-before-wait
    /// ordering the readiness gate must survive.
    struct ScriptedHost {
        server_lines: Vec<String>,
        client_lines: Vec<String>,
        client_exit_code: Option<i32>,
        client_hangs: bool,
        server_terminated: Arc<AtomicBool>,
        client_ran: Arc<AtomicBool>,
        commands_run: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl ScriptedHost {
        fn new(server_lines: &[&str], client_lines: &[&str]) -> Self {
            Self {
                server_lines: server_lines.iter().map(|s| s.to_string()).collect(),
                client_lines: client_lines.iter().map(|s| s.to_string()).collect(),
                client_exit_code: Some(0),
                client_hangs: false,
                server_terminated: Arc::new(AtomicBool::new(false)),
                client_ran: Arc::new(AtomicBool::new(false)),
                commands_run: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    struct ScriptedServer {
        terminated: Arc<AtomicBool>,
    }

    #[async_trait]
    impl BackgroundProcess for ScriptedServer {
        fn pid(&self) -> Option<u32> {
            Some(4242)
        }

        async fn terminate(&mut self) -> BenchResult<()> {
            self.terminated.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl ProcessHost for ScriptedHost {
        async fn run(
            &self,
            _endpoint: &str,
            command: &[String],
            options: RunOptions,
        ) -> BenchResult<RunStatus> {
            self.commands_run.lock().push(command.to_vec());
            self.client_ran.store(true, Ordering::SeqCst);
            if let Some(on_line) = &options.on_line {
                for line in &self.client_lines {
                    on_line(line);
                }
            }
            if self.client_hangs {
                // The deadline expired and the client was killed.
                return Ok(RunStatus {
                    exit_code: None,
                    timed_out: true,
                });
            }
            Ok(RunStatus {
                exit_code: self.client_exit_code,
                timed_out: false,
            })
        }

        async fn spawn(
            &self,
            _endpoint: &str,
            _command: &[String],
            on_line: Option<LineCallback>,
        ) -> BenchResult<Box<dyn BackgroundProcess>> {
            if let Some(on_line) = &on_line {
                for line in &self.server_lines {
                    on_line(line);
                }
            }
            Ok(Box::new(ScriptedServer {
                terminated: Arc::clone(&self.server_terminated),
            }))
        }
    }

    struct StubTransport;

    impl Transport for StubTransport {
        fn name(&self) -> &str {
            "stub"
        }

        fn server_command(&self, _request: &RunRequest) -> Vec<String> {
            vec!["stub-server".to_string()]
        }

        fn client_command(&self, _request: &RunRequest) -> Vec<String> {
            vec!["stub-client".to_string()]
        }

        fn readiness_marker(&self) -> &str {
            "listening"
        }

        fn extractor_markers(&self) -> ExtractorMarkers {
            ExtractorMarkers::default()
        }
    }

    fn request() -> RunRequest {
        RunRequest {
            scenario: Scenario {
                id: ScenarioId::from("s1"),
                delay1_ms: 10.0,
                delay2_ms: 10.0,
                loss1_pct: 0.0,
                loss2_pct: 0.0,
                bw1_mbps: 10.0,
                bw2_mbps: 10.0,
                congestion_control: "cubic".to_string(),
            },
            strategy: Strategy::NoSplit,
            pep_enabled: false,
            transfer_bytes: 1000,
            server_endpoint: "server".to_string(),
            client_endpoint: "client".to_string(),
            server_addr: "10.0.0.2:4433".to_string(),
            startup_timeout: Duration::from_millis(100),
            run_timeout: Duration::from_secs(60),
        }
    }

    fn runner(host: ScriptedHost) -> (BenchmarkRunner, Arc<AtomicBool>, Arc<AtomicBool>) {
        let server_terminated = Arc::clone(&host.server_terminated);
        let client_ran = Arc::clone(&host.client_ran);
        let runner = BenchmarkRunner::new(Arc::new(host), Arc::new(StubTransport));
        (runner, server_terminated, client_ran)
    }

    #[tokio::test]
    async fn test_successful_run() {
        let host = ScriptedHost::new(
            &["loading cert", "listening on 10.0.0.2:4433"],
            &["connecting", "1 response(s) received in 1.234s, closing"],
        );
        let (mut runner, server_terminated, _) = runner(host);

        let outcome = runner.execute(&request()).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Success {
                status_code: 200,
                elapsed_seconds: 1.234
            }
        );
        assert_eq!(runner.state(), RunnerState::Completed);
        assert!(server_terminated.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_readiness_line_before_wait_is_observed() {
        // ScriptedHost delivers the readiness line synchronously inside
        // spawn(), strictly before wait_ready() is entered.
        let host = ScriptedHost::new(&["listening"], &["received in 500ms"]);
        let (mut runner, _, _) = runner(host);

        let outcome = runner.execute(&request()).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Success {
                status_code: 200,
                elapsed_seconds: 0.5
            }
        );
    }

    #[tokio::test]
    async fn test_server_start_timeout() {
        let host = ScriptedHost::new(&["still warming up"], &["received in 1.0s"]);
        let (mut runner, server_terminated, client_ran) = runner(host);

        let outcome = runner.execute(&request()).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Failure {
                reason: FailureReason::ServerStartTimeout
            }
        );
        // The run was aborted before the client, and the orphaned
        // server was still torn down.
        assert!(!client_ran.load(Ordering::SeqCst));
        assert!(server_terminated.load(Ordering::SeqCst));
        assert_eq!(runner.state(), RunnerState::Completed);
    }

    #[tokio::test]
    async fn test_client_run_timeout() {
        let mut host = ScriptedHost::new(&["listening"], &["connecting"]);
        host.client_hangs = true;
        let (mut runner, server_terminated, _) = runner(host);

        let outcome = runner.execute(&request()).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Timeout {
                bound_seconds: 60.0
            }
        );
        assert!(server_terminated.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_no_result_folds_in_nonzero_exit() {
        let mut host = ScriptedHost::new(&["listening"], &["something broke"]);
        host.client_exit_code = Some(1);
        let (mut runner, _, _) = runner(host);

        let outcome = runner.execute(&request()).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Failure {
                reason: FailureReason::NoResult
            }
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_with_measurement_is_success() {
        let mut host = ScriptedHost::new(&["listening"], &["received in 2.0s"]);
        host.client_exit_code = Some(101);
        let (mut runner, _, _) = runner(host);

        let outcome = runner.execute(&request()).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Success {
                status_code: 200,
                elapsed_seconds: 2.0
            }
        );
    }

    #[tokio::test]
    async fn test_client_setup_runs_after_ready_and_before_client() {
        struct SetupTransport;

        impl Transport for SetupTransport {
            fn name(&self) -> &str {
                "setup"
            }

            fn server_command(&self, _request: &RunRequest) -> Vec<String> {
                vec!["setup-server".to_string()]
            }

            fn client_setup_commands(&self, _request: &RunRequest) -> Vec<Vec<String>> {
                vec![vec![
                    "mkdir".to_string(),
                    "-p".to_string(),
                    "/tmp/scratch".to_string(),
                ]]
            }

            fn client_command(&self, _request: &RunRequest) -> Vec<String> {
                vec!["setup-client".to_string()]
            }

            fn readiness_marker(&self) -> &str {
                "listening"
            }
        }

        let host = ScriptedHost::new(&["listening"], &["received in 1.0s"]);
        let commands = Arc::clone(&host.commands_run);
        let mut runner = BenchmarkRunner::new(Arc::new(host), Arc::new(SetupTransport));

        let outcome = runner.execute(&request()).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(
            *commands.lock(),
            vec![
                vec![
                    "mkdir".to_string(),
                    "-p".to_string(),
                    "/tmp/scratch".to_string()
                ],
                vec!["setup-client".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn test_runner_is_reusable() {
        let host = ScriptedHost::new(&["listening"], &["received in 1.0s"]);
        let (mut runner, _, _) = runner(host);

        let first = runner.execute(&request()).await.unwrap();
        let second = runner.execute(&request()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(runner.state(), RunnerState::Completed);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_an_error() {
        struct FailingHost;

        #[async_trait]
        impl ProcessHost for FailingHost {
            async fn run(
                &self,
                _endpoint: &str,
                _command: &[String],
                _options: RunOptions,
            ) -> BenchResult<RunStatus> {
                unreachable!("client must not run when the server fails to spawn")
            }

            async fn spawn(
                &self,
                endpoint: &str,
                _command: &[String],
                _on_line: Option<LineCallback>,
            ) -> BenchResult<Box<dyn BackgroundProcess>> {
                Err(BenchError::spawn_failed(endpoint, "missing binary"))
            }
        }

        let mut runner = BenchmarkRunner::new(Arc::new(FailingHost), Arc::new(StubTransport));
        let err = runner.execute(&request()).await.unwrap_err();
        assert!(matches!(err, BenchError::SpawnFailed { .. }));
        assert_eq!(runner.state(), RunnerState::Completed);
    }
}
