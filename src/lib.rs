//! Clip Capture Library
//!
//! Text-capture engine with a bounded, per-user history of copied snippets.
//! The host embeds it behind a content-tree adapter and key-value storage,
//! so the same pipeline runs against a real page or an in-memory fixture.

pub mod capture;
pub mod config;
pub mod extract;
pub mod history;
pub mod identity;
pub mod marker;
pub mod normalize;
pub mod point;
pub mod settings;
pub mod store;
pub mod tier;
pub mod tree;
pub mod types;
pub mod ui;

pub use capture::CaptureEngine;
pub use config::CaptureConfig;
pub use history::HistoryList;
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
pub use tree::ContentTree;
pub use types::{CaptureError, CapturedItem};
