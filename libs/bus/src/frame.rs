//! The atomic `(topic, payload)` unit carried on either channel.

use fairq_events::{topics, LifecycleEvent, TableRow};
use serde::{Deserialize, Serialize};

use crate::BusError;

/// One bus message: a topic token plus an opaque JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl Frame {
    /// Wraps a lifecycle event for the events channel.
    pub fn event(event: &LifecycleEvent) -> Result<Self, BusError> {
        Ok(Self {
            topic: topics::EVENT.to_string(),
            payload: serde_json::to_value(event)?,
        })
    }

    /// Wraps a merged-table snapshot for the table channel.
    pub fn table(rows: &[TableRow]) -> Result<Self, BusError> {
        Ok(Self {
            topic: topics::TABLE.to_string(),
            payload: serde_json::to_value(rows)?,
        })
    }

    /// Decodes the payload as a lifecycle event, checking the topic.
    pub fn decode_event(&self) -> Result<LifecycleEvent, BusError> {
        self.expect_topic(topics::EVENT)?;
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Decodes the payload as a table snapshot, checking the topic.
    pub fn decode_table(&self) -> Result<Vec<TableRow>, BusError> {
        self.expect_topic(topics::TABLE)?;
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    fn expect_topic(&self, expected: &'static str) -> Result<(), BusError> {
        if self.topic == expected {
            Ok(())
        } else {
            Err(BusError::Codec(format!(
                "expected topic {expected:?}, got {:?}",
                self.topic
            )))
        }
    }

    /// Serializes the frame as one wire line (no trailing newline).
    pub(crate) fn encode_line(&self) -> Result<String, BusError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses one wire line.
    pub(crate) fn decode_line(line: &str) -> Result<Self, BusError> {
        Ok(serde_json::from_str(line)?)
    }
}
