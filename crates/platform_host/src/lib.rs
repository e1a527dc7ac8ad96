//! Typed host-domain contracts shared by the desktop runtime and browser adapters.
//!
//! This crate is the boundary between the headless desktop core and whatever environment hosts
//! it. It exposes the wall clock used for persistence timestamps and the synchronous durable
//! key/value storage contract the runtime [`Store`](../desktop_runtime/store/index.html)
//! persists through. Concrete browser adapters live in `platform_host_web`.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod storage;
pub mod time;

pub use storage::prefs::{
    load_pref_with, save_pref_with, MemoryPrefsStore, NoopPrefsStore, PrefsStore,
};
pub use time::{unix_time_ms_now, DAY_MS};
