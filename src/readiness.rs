//! Readiness gate for transcript files.
//!
//! Transcript files are written by a separate, asynchronous stage and there is
//! no completion signal. The gate re-reads a file with exponential backoff
//! until it holds a complete transcript document, so the pipeline never
//! embeds a truncated or half-flushed file.

use crate::config::ReadinessSettings;
use crate::transcript::TranscriptDocument;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// A transcript file that parsed into a recognized document.
#[derive(Debug, Clone)]
pub struct ReadyArtifact {
    /// Raw file content, trimmed.
    pub raw: String,
    /// The resolved document.
    pub document: TranscriptDocument,
}

/// Why a single attempt did not find a ready transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotReadyReason {
    Missing,
    Empty,
    InvalidJson(String),
    UnexpectedShape,
    Io(String),
}

impl std::fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotReadyReason::Missing => write!(f, "file does not exist yet"),
            NotReadyReason::Empty => write!(f, "file is empty"),
            NotReadyReason::InvalidJson(e) => write!(f, "JSON parse error ({})", e),
            NotReadyReason::UnexpectedShape => write!(f, "unexpected transcript structure"),
            NotReadyReason::Io(e) => write!(f, "read error ({})", e),
        }
    }
}

/// Failures reported by the gate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("{path:?} not ready after {attempts} attempts: {last_reason}")]
    NotReady {
        path: PathBuf,
        attempts: u32,
        last_reason: NotReadyReason,
    },

    #[error("{path:?} not ready within {deadline:?}")]
    DeadlineExceeded { path: PathBuf, deadline: Duration },
}

/// Polls transcript files until they are complete.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    max_attempts: u32,
    initial_wait: Duration,
    backoff_factor: f64,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::from_settings(&ReadinessSettings::default())
    }
}

impl ReadinessGate {
    /// Create a gate with an explicit backoff schedule.
    ///
    /// A factor below 1.0, or one that is not finite, is treated as 1.0.
    pub fn new(max_attempts: u32, initial_wait: Duration, backoff_factor: f64) -> Self {
        let backoff_factor = if backoff_factor.is_finite() {
            backoff_factor.max(1.0)
        } else {
            warn!("Invalid backoff factor {}, using 1.0", backoff_factor);
            1.0
        };

        Self {
            max_attempts: max_attempts.max(1),
            initial_wait,
            backoff_factor,
        }
    }

    pub fn from_settings(settings: &ReadinessSettings) -> Self {
        Self::new(
            settings.max_attempts,
            settings.initial_wait(),
            settings.backoff_factor,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after the given (0-based) failed attempt.
    ///
    /// Saturates at [`Duration::MAX`] instead of overflowing.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scale = self.backoff_factor.powi(attempt.min(i32::MAX as u32) as i32);
        Duration::try_from_secs_f64(self.initial_wait.as_secs_f64() * scale)
            .unwrap_or(Duration::MAX)
    }

    /// Total time spent sleeping when every attempt fails.
    pub fn total_backoff(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.delay_for(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    /// Wait until `path` holds a complete transcript, or give up after the
    /// configured number of attempts.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn await_ready(&self, path: &Path) -> Result<ReadyArtifact, GateError> {
        let mut attempt = 0;
        loop {
            let reason = match self.probe(path).await {
                Ok(artifact) => {
                    debug!("File ready after {} attempts", attempt + 1);
                    return Ok(artifact);
                }
                Err(reason) => reason,
            };

            debug!("Attempt {}: {}", attempt + 1, reason);
            attempt += 1;

            if attempt >= self.max_attempts {
                warn!("File not ready after {} attempts: {}", attempt, reason);
                return Err(GateError::NotReady {
                    path: path.to_path_buf(),
                    attempts: attempt,
                    last_reason: reason,
                });
            }

            tokio::time::sleep(self.delay_for(attempt - 1)).await;
        }
    }

    /// Like [`await_ready`](Self::await_ready), bounded by a wall-clock deadline.
    pub async fn await_ready_within(
        &self,
        path: &Path,
        deadline: Duration,
    ) -> Result<ReadyArtifact, GateError> {
        match tokio::time::timeout(deadline, self.await_ready(path)).await {
            Ok(result) => result,
            Err(_) => Err(GateError::DeadlineExceeded {
                path: path.to_path_buf(),
                deadline,
            }),
        }
    }

    /// Make a single readiness check without waiting.
    pub async fn probe(&self, path: &Path) -> Result<ReadyArtifact, NotReadyReason> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(NotReadyReason::Missing)
            }
            Err(e) => return Err(NotReadyReason::Io(e.to_string())),
        };

        if metadata.len() == 0 {
            return Err(NotReadyReason::Empty);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| NotReadyReason::Io(e.to_string()))?;
        let raw = content.trim();
        if raw.is_empty() {
            return Err(NotReadyReason::Empty);
        }

        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| NotReadyReason::InvalidJson(e.to_string()))?;

        let document =
            TranscriptDocument::from_value(&value).ok_or(NotReadyReason::UnexpectedShape)?;

        Ok(ReadyArtifact {
            raw: raw.to_string(),
            document,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_gate(max_attempts: u32) -> ReadinessGate {
        ReadinessGate::new(max_attempts, Duration::from_millis(1), 1.5)
    }

    #[test]
    fn test_backoff_schedule() {
        let gate = ReadinessGate::default();
        assert_eq!(gate.max_attempts(), 10);
        assert_eq!(gate.delay_for(0), Duration::from_millis(500));
        assert_eq!(gate.delay_for(1), Duration::from_millis(750));
        assert_eq!(gate.delay_for(2), Duration::from_micros(1_125_000));

        let gate = ReadinessGate::new(3, Duration::from_millis(500), 1.5);
        assert_eq!(gate.total_backoff(), Duration::from_millis(1250));
    }

    #[test]
    fn test_invalid_backoff_factor_is_clamped() {
        for factor in [-1.5, 0.0, 0.5, f64::NAN, f64::INFINITY] {
            let gate = ReadinessGate::new(4, Duration::from_millis(100), factor);
            assert_eq!(gate.delay_for(0), Duration::from_millis(100), "{factor}");
            assert_eq!(gate.delay_for(3), Duration::from_millis(100), "{factor}");
        }
    }

    #[test]
    fn test_huge_delay_saturates() {
        let gate = ReadinessGate::new(10, Duration::from_secs(1), 1e100);
        assert_eq!(gate.delay_for(9), Duration::MAX);
        assert_eq!(gate.total_backoff(), Duration::MAX);
    }

    #[tokio::test]
    async fn test_ready_keyed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meeting.json");
        std::fs::write(
            &path,
            r#"{"transcript": [{"speaker": "A", "text": "hi"}], "original_language": "en"}"#,
        )
        .unwrap();

        let artifact = fast_gate(3).await_ready(&path).await.unwrap();
        assert!(artifact.raw.starts_with('{'));
        assert_eq!(artifact.document.utterances().len(), 1);
    }

    #[tokio::test]
    async fn test_probe_reasons() {
        let dir = tempfile::tempdir().unwrap();
        let gate = fast_gate(1);

        let missing = dir.path().join("missing.json");
        assert_eq!(gate.probe(&missing).await.unwrap_err(), NotReadyReason::Missing);

        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, "").unwrap();
        assert_eq!(gate.probe(&empty).await.unwrap_err(), NotReadyReason::Empty);

        let blank = dir.path().join("blank.json");
        std::fs::write(&blank, "  \n ").unwrap();
        assert_eq!(gate.probe(&blank).await.unwrap_err(), NotReadyReason::Empty);

        let truncated = dir.path().join("truncated.json");
        std::fs::write(&truncated, r#"{"transcript": [{"text": "hel"#).unwrap();
        assert!(matches!(
            gate.probe(&truncated).await.unwrap_err(),
            NotReadyReason::InvalidJson(_)
        ));

        let wrong_keys = dir.path().join("summary.json");
        std::fs::write(&wrong_keys, r#"{"summary": "notes"}"#).unwrap();
        assert_eq!(
            gate.probe(&wrong_keys).await.unwrap_err(),
            NotReadyReason::UnexpectedShape
        );

        let no_text = dir.path().join("no_text.json");
        std::fs::write(&no_text, r#"[{"speaker": "A"}]"#).unwrap();
        assert_eq!(
            gate.probe(&no_text).await.unwrap_err(),
            NotReadyReason::UnexpectedShape
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_configured_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let gate = ReadinessGate::new(4, Duration::from_millis(500), 1.5);
        let started = tokio::time::Instant::now();
        let err = gate.await_ready(&path).await.unwrap_err();
        let elapsed = started.elapsed();

        match err {
            GateError::NotReady {
                attempts,
                last_reason,
                ..
            } => {
                assert_eq!(attempts, 4);
                assert!(matches!(last_reason, NotReadyReason::InvalidJson(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // 500 + 750 + 1125 ms
        let expected = gate.total_backoff();
        assert_eq!(expected, Duration::from_millis(2375));
        assert!(elapsed >= expected);
        assert!(elapsed < expected + Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_becomes_ready_while_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.json");
        let gate = ReadinessGate::new(20, Duration::from_millis(10), 1.5);

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            tokio::fs::write(&writer_path, r#"[{"speaker": "A", "text"#)
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(30)).await;
            tokio::fs::write(&writer_path, r#"[{"speaker": "A", "text": "done"}]"#)
                .await
                .unwrap();
        });

        let artifact = gate.await_ready(&path).await.unwrap();
        writer.await.unwrap();
        assert!(matches!(artifact.document, TranscriptDocument::Bare(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_variant() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.json");

        let gate = ReadinessGate::default();
        let err = gate
            .await_ready_within(&path, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::DeadlineExceeded { .. }));
    }
}
