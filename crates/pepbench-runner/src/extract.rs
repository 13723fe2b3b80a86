//! Tolerant extraction of one measurement from client output.
//!
//! Client output is an unstructured, versioned, human-readable log.
//! The extractor is forward-tolerant: lines without the measurement
//! marker are ignored and malformed duration matches are discarded.
//! It never guesses. Zero candidates and multiple candidates are both
//! classified as failures, so a misbehaving pattern or protocol shows
//! up in the results instead of vanishing into an average.

use crate::outcome::{FailureReason, Outcome};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

/// Duration value with a seconds or milliseconds suffix, e.g.
/// `1.234s`, `1.234567s`, `500ms`.
const DURATION_PATTERN: &str = r"([0-9.]+)\s*(ms|s)";

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(DURATION_PATTERN).expect("duration pattern is valid"))
}

/// Literal markers gating measurement extraction, configured per
/// transport variant.
#[derive(Debug, Clone)]
pub struct ExtractorMarkers {
    /// A line must contain this to be a measurement candidate.
    pub candidate: String,
    /// A candidate line containing this is a non-match (e.g. the
    /// server answered with a 404 body).
    pub reject: String,
    /// A candidate line containing any of these (case-insensitive)
    /// marks the run as a client idle timeout.
    pub idle_timeout: Vec<String>,
}

impl Default for ExtractorMarkers {
    fn default() -> Self {
        Self {
            candidate: "received in".to_string(),
            reject: "Not found".to_string(),
            idle_timeout: vec!["timed out".to_string(), "timeout".to_string()],
        }
    }
}

/// Scans client output lines and classifies them into one [`Outcome`].
///
/// Feed lines with [`observe_line`](Self::observe_line) as they arrive
/// or buffered after the fact; only the ordering within the scan
/// matters. Call [`classify`](Self::classify) once the client has
/// exited or been terminated.
#[derive(Debug)]
pub struct ResultExtractor {
    markers: ExtractorMarkers,
    candidates: Vec<f64>,
    idle_timeout_seen: bool,
    lines_scanned: u64,
}

impl ResultExtractor {
    pub fn new(markers: ExtractorMarkers) -> Self {
        Self {
            markers,
            candidates: Vec::new(),
            idle_timeout_seen: false,
            lines_scanned: 0,
        }
    }

    /// Scan one output line.
    pub fn observe_line(&mut self, line: &str) {
        self.lines_scanned += 1;

        let Some(marker_at) = line.find(&self.markers.candidate) else {
            return;
        };
        if line.contains(&self.markers.reject) {
            debug!(line, "Candidate line carries reject marker, skipping");
            return;
        }

        let lower = line.to_lowercase();
        if self
            .markers
            .idle_timeout
            .iter()
            .any(|marker| lower.contains(marker))
        {
            warn!(line, "Client reported idle timeout");
            self.idle_timeout_seen = true;
            return;
        }

        // Only look for the duration after the marker, so numbers
        // earlier in the line (counts, addresses) cannot match.
        let tail = &line[marker_at + self.markers.candidate.len()..];
        match self.parse_duration(tail) {
            Some(seconds) => {
                debug!(line, seconds, "Measurement candidate extracted");
                self.candidates.push(seconds);
            }
            None => {
                // Malformed or missing duration: a non-match, never fatal.
                debug!(line, "Candidate line without parsable duration, discarding");
            }
        }
    }

    fn parse_duration(&self, text: &str) -> Option<f64> {
        let captures = duration_pattern().captures(text)?;
        let value: f64 = captures[1].parse().ok()?;
        let seconds = match &captures[2] {
            "ms" => value / 1000.0,
            _ => value,
        };
        Some(seconds)
    }

    /// Number of valid measurement candidates seen so far.
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Classify the scanned output into exactly one outcome.
    ///
    /// `run_timed_out` is the orchestration-level deadline flag from
    /// the process host; `bound` is that deadline. The client's own
    /// idle timeout takes precedence over it: a silent connection is
    /// a different defect than a transfer too slow for the bound.
    pub fn classify(&self, run_timed_out: bool, bound: Duration) -> Outcome {
        if self.idle_timeout_seen {
            warn!(
                lines = self.lines_scanned,
                "Run classified as client idle timeout"
            );
            return Outcome::Failure {
                reason: FailureReason::IdleTimeout,
            };
        }

        if run_timed_out {
            return Outcome::Timeout {
                bound_seconds: bound.as_secs_f64(),
            };
        }

        match self.candidates.as_slice() {
            [] => {
                warn!(
                    lines = self.lines_scanned,
                    "Client produced no measurement"
                );
                Outcome::Failure {
                    reason: FailureReason::NoResult,
                }
            }
            [elapsed] => Outcome::Success {
                status_code: 200,
                elapsed_seconds: *elapsed,
            },
            multiple => {
                warn!(
                    candidates = ?multiple,
                    "Client produced multiple measurements; refusing to pick one"
                );
                Outcome::Failure {
                    reason: FailureReason::AmbiguousResult,
                }
            }
        }
    }
}

impl Default for ResultExtractor {
    fn default() -> Self {
        Self::new(ExtractorMarkers::default())
    }
}
