//! Browser (`wasm32`) implementations of [`platform_host`] service contracts.
//!
//! The desktop core needs durable preference storage, backed by `window.localStorage`, and
//! one-shot timers, backed by `window.setTimeout`. On other targets the storage adapter degrades
//! to an empty no-op store and no timers are armed, so the runtime stays usable headless.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod storage;
pub mod timers;

pub use storage::local_prefs::{prefs_store, WebPrefsStore};
pub use timers::{host_timers_available, set_host_timeout};
