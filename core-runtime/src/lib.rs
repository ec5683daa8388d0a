//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the playback engine:
//! - Logging and tracing infrastructure
//! - Player settings and bridge configuration
//! - Event bus system
//!
//! ## Overview
//!
//! Every other engine crate depends on this one for its configuration types,
//! its logging conventions and the typed events it publishes.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, PlayerSettings};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream};
