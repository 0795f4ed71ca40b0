//! Utility functions for identifiers and timestamps.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC time as an RFC 3339 string with microseconds.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Generates a random identifier for a workflow invocation.
#[must_use]
pub fn generate_workflow_id() -> Uuid {
    Uuid::new_v4()
}
