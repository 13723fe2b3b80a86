//! The transport capability seam.
//!
//! One benchmark "flavor" per transport variant, expressed as data the
//! generic runner consumes: how to launch the server and client for a
//! [`RunRequest`], which log line means the server is ready, and which
//! markers gate measurement extraction.

use crate::extract::ExtractorMarkers;
use crate::request::RunRequest;
use std::path::PathBuf;

/// A transport variant under benchmark.
pub trait Transport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Command launching the server on the server endpoint.
    fn server_command(&self, request: &RunRequest) -> Vec<String>;

    /// Commands run on the client endpoint before the transfer, once
    /// the server is ready. Used for scratch-directory creation and
    /// connectivity checks; failures are logged, not fatal.
    fn client_setup_commands(&self, _request: &RunRequest) -> Vec<Vec<String>> {
        Vec::new()
    }

    /// Command running the client transfer on the client endpoint.
    fn client_command(&self, request: &RunRequest) -> Vec<String>;

    /// Substring (matched case-insensitively) of the server log line
    /// that signals readiness to accept connections.
    fn readiness_marker(&self) -> &str;

    /// Markers for measurement extraction from client output.
    fn extractor_markers(&self) -> ExtractorMarkers {
        ExtractorMarkers::default()
    }
}

/// The quiche HTTP/3 client/server pair.
///
/// The server log is forced to `RUST_LOG=info` so the readiness line
/// is present without debug spam. Responses are dumped to a scratch
/// directory instead of stdout, which keeps the transfer body out of
/// the stream the measurement line arrives on.
#[derive(Debug, Clone)]
pub struct QuicheTransport {
    binary_dir: PathBuf,
    cert_path: PathBuf,
    key_path: PathBuf,
}

impl QuicheTransport {
    pub fn new(
        binary_dir: impl Into<PathBuf>,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            binary_dir: binary_dir.into(),
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }

    fn binary(&self, name: &str) -> String {
        self.binary_dir.join(name).to_string_lossy().into_owned()
    }

    fn dump_dir(request: &RunRequest) -> String {
        format!("/tmp/quiche_dump_{}", request.label())
    }

    fn server_host(request: &RunRequest) -> &str {
        match request.server_addr.rsplit_once(':') {
            Some((host, _port)) => host,
            None => request.server_addr.as_str(),
        }
    }
}

impl Transport for QuicheTransport {
    fn name(&self) -> &str {
        "quiche"
    }

    fn server_command(&self, request: &RunRequest) -> Vec<String> {
        vec![
            "env".to_string(),
            "RUST_LOG=info".to_string(),
            self.binary("quiche-server"),
            format!("--cert={}", self.cert_path.display()),
            format!("--key={}", self.key_path.display()),
            "--cc-algorithm".to_string(),
            request.scenario.congestion_control.clone(),
            "--listen".to_string(),
            request.server_addr.clone(),
        ]
    }

    fn client_setup_commands(&self, request: &RunRequest) -> Vec<Vec<String>> {
        vec![
            // quiche-client writes each response into this directory
            // and fails the dump when it is missing.
            vec![
                "mkdir".to_string(),
                "-p".to_string(),
                Self::dump_dir(request),
            ],
            // Connectivity probe, logged for run diagnostics.
            vec![
                "ping".to_string(),
                "-c".to_string(),
                "2".to_string(),
                Self::server_host(request).to_string(),
            ],
        ]
    }

    fn client_command(&self, request: &RunRequest) -> Vec<String> {
        let dump_dir = Self::dump_dir(request);
        vec![
            "env".to_string(),
            "RUST_LOG=info".to_string(),
            self.binary("quiche-client"),
            "--no-verify".to_string(),
            "--method".to_string(),
            "GET".to_string(),
            "--dump-responses".to_string(),
            dump_dir,
            "--cc-algorithm".to_string(),
            request.scenario.congestion_control.clone(),
            "--".to_string(),
            format!(
                "https://{}/{}",
                request.server_addr, request.transfer_bytes
            ),
        ]
    }

    fn readiness_marker(&self) -> &str {
        "listening"
    }
}
