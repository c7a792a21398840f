use super::traits::{Observer, ObserverEvent};
use chrono::Utc;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// Append-only JSON-lines sink. A sink failure must never take down a run,
/// so write errors are logged at debug and swallowed.
pub struct JsonlObserver {
    path: PathBuf,
    // Serializes appends so concurrent call-attempt events from one run
    // cannot interleave partial lines.
    write_lock: Mutex<()>,
}

impl JsonlObserver {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    fn append(&self, event: &ObserverEvent) -> std::io::Result<()> {
        let mut record = match serde_json::to_value(event) {
            Ok(Value::Object(map)) => map,
            _ => return Ok(()),
        };
        record.insert("ts".into(), Value::from(Utc::now().to_rfc3339()));

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = Value::Object(record).to_string();
        writeln!(file, "{line}")
    }
}

impl Observer for JsonlObserver {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn record_event(&self, event: &ObserverEvent) {
        if let Err(error) = self.append(event) {
            tracing::debug!(
                path = %self.path.display(),
                "failed to append observer event: {error}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::{CallKind, CallOutcome};
    use uuid::Uuid;

    #[test]
    fn appends_one_line_per_event_with_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let observer = JsonlObserver::new(path.clone());

        let run_id = Uuid::new_v4();
        observer.record_event(&ObserverEvent::CallAttempt {
            run_id,
            kind: CallKind::Generation,
            target: "openai".into(),
            outcome: CallOutcome::Succeeded,
            elapsed_ms: 1200,
        });
        observer.record_event(&ObserverEvent::RunFailed {
            run_id,
            reason: "no provider returned a usable candidate".into(),
            elapsed_ms: 1500,
        });

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "call_attempt");
        assert_eq!(first["target"], "openai");
        assert_eq!(first["outcome"], "succeeded");
        assert!(first["ts"].as_str().is_some());

        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "run_failed");
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("events.jsonl");
        let observer = JsonlObserver::new(path.clone());
        observer.record_event(&ObserverEvent::RunFailed {
            run_id: Uuid::new_v4(),
            reason: "x".into(),
            elapsed_ms: 1,
        });
        assert!(path.exists());
    }
}
