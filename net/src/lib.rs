//! DIMSE services over the DICOM Upper Layer.
//!
//! This crate layers the DICOM Message Service Element on top of
//! [`medicom_ul`] associations and exposes the service classes
//! a PACS client or server needs:
//!
//! - [`echo`]: verification (C-ECHO) as a service user;
//! - [`find`]: query (C-FIND) with per-match streaming;
//! - [`retrieve`]: retrieval via C-MOVE and C-GET;
//! - [`store`]: storage (C-STORE), single instance and batched;
//! - [`scp`]: a storage service class provider with an
//!   acceptance policy, delegate hooks and an event stream;
//! - [`commitment`]: storage commitment push model
//!   (N-ACTION requests and N-EVENT-REPORT correlation);
//! - [`reliability`]: retry policies, circuit breaking and
//!   connection pooling;
//! - [`audit`]: an append-only JSON-lines audit event stream.
pub mod audit;
pub mod command;
pub mod commitment;
pub mod dimse;
pub mod echo;
mod error;
pub mod find;
pub mod peer;
pub mod reliability;
pub mod retrieve;
pub mod scp;
pub mod store;

pub use crate::command::{CommandField, Priority, Status, StatusClass};
pub use crate::error::{Error, ErrorClass, Result};
pub use crate::peer::Peer;

/// Generate a unique identifier under the 2.25 (UUID-derived) root.
pub(crate) fn generate_uid() -> String {
    let value: u128 = rand::random();
    format!("2.25.{}", value)
}
