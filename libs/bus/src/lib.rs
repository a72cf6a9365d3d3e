//! # fairq-bus
//!
//! Two-channel, best-effort, at-most-once pub/sub transport.
//!
//! The bus carries two independent channels over fixed local TCP
//! endpoints:
//!
//! - **events**: many publishers, one collector. The collector *binds*
//!   the endpoint; publishers connect and push frames. Exactly one
//!   process per cluster can hold the bind — a second attempt fails with
//!   [`BusError::EndpointOwned`], which callers use as their
//!   leader-election signal rather than treating it as a fault.
//! - **table**: one broadcaster, many subscribers. The broadcaster binds;
//!   subscribers connect and receive whole snapshots.
//!
//! Delivery guarantees are deliberately weak: no replay, no persistence,
//! no backpressure onto publishers. A subscriber that joins late receives
//! nothing retroactively, and a slow subscriber drops frames.
//!
//! ## Framing
//!
//! One JSON object per line: `{"topic": ..., "payload": ...}`. Topics are
//! the literal tokens defined in `fairq_events::topics`.

mod broadcaster;
mod client;
mod collector;
mod endpoints;
mod error;
mod frame;

pub use broadcaster::TableBroadcaster;
pub use client::{EventPublisher, TableSubscriber};
pub use collector::EventCollector;
pub use endpoints::{BusEndpoints, DEFAULT_EVENTS_PORT, DEFAULT_TABLE_PORT};
pub use error::BusError;
pub use frame::Frame;
