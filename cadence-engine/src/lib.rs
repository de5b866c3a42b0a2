//! # Cadence playback engine
//!
//! Orchestrates one playback session at a time on behalf of a playlist.
//!
//! **Parts:**
//! - [`engine`]: control loop, requests and shutdown sequence
//! - [`gc`]: debounced collection of output resources left over by sessions
//! - [`enrichment`]: primary (parse) and secondary (fetch) metadata workers
//! - [`activity`]: counter that throttles the primary worker while playing
//! - [`runtime`]: thread wiring and ordered shutdown
//!
//! Observers subscribe to the [`cadence_common::events::EventBus`].

pub mod activity;
pub mod config;
pub mod engine;
pub mod enrichment;
pub mod entry;
pub mod error;
pub mod gc;
pub mod local;
pub mod playlist;
pub mod runtime;
pub mod session;
pub mod sim;
pub mod terminator;

pub use engine::{Engine, EngineOptions, PlayRequest};
pub use entry::{Entry, EntryId, EntryRef};
pub use error::{Error, Result};
pub use runtime::{EngineRuntime, RuntimeTimings};
pub use terminator::Terminator;
