//! An append-only audit event stream in JSON-lines form,
//! suitable for downstream IHE ATNA integration.
use std::io::Write;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::warn;

/// One audit event, with the moment it was recorded.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuditRecord {
    /// when the event occurred, RFC 3339 in UTC
    pub at: String,
    /// the event itself
    #[serde(flatten)]
    pub event: AuditEvent,
}

/// The audited events of the networking services.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// an association was established
    AssociationOpened {
        /// the local AE title
        calling_ae_title: String,
        /// the remote AE title
        called_ae_title: String,
        /// the remote address
        peer: String,
    },
    /// an association concluded
    AssociationClosed {
        /// the remote address
        peer: String,
        /// whether it concluded with an orderly release
        orderly: bool,
    },
    /// a C-STORE concluded
    StoreCompleted {
        /// the stored SOP instance
        sop_instance_uid: String,
        /// the remote address
        peer: String,
        /// whether the store succeeded
        success: bool,
        /// the DIMSE status code
        status: u16,
    },
    /// a C-FIND query was issued
    QueryIssued {
        /// the query/retrieve SOP class
        sop_class_uid: String,
        /// the remote address
        peer: String,
    },
    /// a retrieval is in progress
    RetrieveInProgress {
        /// the remote address
        peer: String,
        /// completed sub-operations so far
        completed: u16,
        /// remaining sub-operations
        remaining: u16,
        /// failed sub-operations so far
        failed: u16,
    },
    /// a storage commitment transaction was requested
    CommitmentRequested {
        /// the transaction UID
        transaction_uid: String,
        /// the number of referenced instances
        instance_count: usize,
        /// the remote address
        peer: String,
    },
    /// a storage commitment transaction concluded
    CommitmentCompleted {
        /// the transaction UID
        transaction_uid: String,
        /// the number of committed instances
        committed: usize,
        /// the number of failed instances
        failed: usize,
    },
}

/// An append-only audit stream over any byte sink.
///
/// Each event is written as one JSON line.
/// Emission never fails the calling operation:
/// sink errors are logged and swallowed.
pub struct AuditStream {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl AuditStream {
    /// Create an audit stream over the given sink.
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        AuditStream {
            sink: Mutex::new(Box::new(sink)),
        }
    }

    /// Record one event with the current time.
    pub fn emit(&self, event: AuditEvent) {
        self.emit_at(Utc::now(), event)
    }

    fn emit_at(&self, at: DateTime<Utc>, event: AuditEvent) {
        let record = AuditRecord {
            at: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
        };
        let mut line = match serde_json::to_vec(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!("could not serialize audit record: {}", e);
                return;
            }
        };
        line.push(b'\n');
        let mut sink = self.sink.lock().expect("audit sink lock poisoned");
        if let Err(e) = sink.write_all(&line).and_then(|_| sink.flush()) {
            warn!("could not append audit record: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn events_append_as_json_lines() {
        let buffer = SharedBuffer::default();
        let stream = AuditStream::new(buffer.clone());

        stream.emit(AuditEvent::AssociationOpened {
            calling_ae_title: "SCU".to_string(),
            called_ae_title: "SCP".to_string(),
            peer: "127.0.0.1:104".to_string(),
        });
        stream.emit(AuditEvent::StoreCompleted {
            sop_instance_uid: "1.2.3".to_string(),
            peer: "127.0.0.1:104".to_string(),
            success: true,
            status: 0,
        });

        let bytes = buffer.0.lock().unwrap().clone();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "association_opened");
        assert_eq!(first["called_ae_title"], "SCP");
        assert!(first["at"].as_str().unwrap().contains('T'));

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "store_completed");
        assert_eq!(second["success"], true);
    }
}
