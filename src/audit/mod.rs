//! Audit logging
//!
//! Every committed changeset appends one entry per created, updated or
//! deleted document to `audit.log`, one JSON object per line. Updates carry
//! the before/after documents and a short summary of the changed fields.

mod diff;
mod entry;
mod logger;

pub use diff::generate_diff;
pub use entry::{AuditEntry, EntityType, Operation};
pub use logger::{AuditFilter, AuditLogger};
