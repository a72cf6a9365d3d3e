//! # fairq-id
//!
//! Identifier types for the fairq monitor.
//!
//! Two families of identifiers exist side by side:
//!
//! - **Queue-assigned IDs** (`JobId`, `QueueId`): minted by the external
//!   queue service and opaque to us. We never generate these; we only
//!   validate, carry, and compare them.
//! - **Monitor-generated IDs** (`ClientId`): minted locally, one per monitor
//!   process, used to correlate log lines across a cluster of clients.
//!
//! Monitor-generated IDs use a prefixed format `{prefix}_{ulid}` so they
//! are sortable, unique, and recognizable in logs. Queue-assigned IDs are
//! kept verbatim; the only guarantee we enforce is that they are non-empty
//! and free of whitespace, since they travel through a line-oriented wire
//! format.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
