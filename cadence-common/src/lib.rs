//! # Cadence Common Library
//!
//! Shared code for the Cadence crates:
//! - Event types (EngineEvent enum) and the EventBus
//! - Error types
//! - Configuration file resolution
//! - Time helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{EngineEvent, EngineStatus, EventBus};
