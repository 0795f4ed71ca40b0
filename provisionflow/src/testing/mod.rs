//! Testing utilities for provisioning workflows.
//!
//! This module provides:
//! - Undo actions that record, fail, or stall
//! - Forward operations that fail a set number of times

mod mocks;

pub use mocks::{FlakyOperation, RecordingUndo, SleepingUndo};
