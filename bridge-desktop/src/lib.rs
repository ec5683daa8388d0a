//! # Desktop Bridge Implementations
//!
//! Default implementations of the host bridge traits for desktop and headless
//! hosts (macOS, Windows, Linux, CI).
//!
//! ## Overview
//!
//! - [`SqliteRecordStore`] - durable playback records in a SQLite file
//! - [`MemoryRecordStore`] - volatile records for tests and kiosks
//! - [`LocalBroadcastHub`] - cross-instance channels inside one process
//! - [`HeadlessMediaPlatform`] - scriptable media elements and document frames
//! - [`HeadlessContainer`] - presentation container with recordable markers
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{HeadlessMediaPlatform, LocalBroadcastHub, SqliteRecordStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = SqliteRecordStore::in_memory().await.unwrap();
//!     let platform = HeadlessMediaPlatform::new();
//!     let channels = LocalBroadcastHub::global();
//!
//!     // Use in core configuration
//! }
//! ```

mod broadcast;
mod headless;
mod memory;
mod records;

pub use broadcast::{LocalBroadcastHub, LocalBroadcastPort};
pub use headless::{
    HeadlessContainer, HeadlessDocument, HeadlessDocumentFrame, HeadlessMarker,
    HeadlessMediaElement, HeadlessMediaPlatform,
};
pub use memory::MemoryRecordStore;
pub use records::{open_record_store, SqliteRecordStore};
