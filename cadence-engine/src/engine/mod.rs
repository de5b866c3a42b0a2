//! Playback engine
//!
//! **Module Structure:**
//! - `core.rs`: Engine state, construction, requests, accessors
//! - `control.rs`: The control loop step and session teardown
//! - `shutdown.rs`: Last loop and final resource collection

mod control;
mod core;
mod shutdown;

pub use self::core::{Engine, EngineOptions, PlayRequest};
