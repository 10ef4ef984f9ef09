//! Persisted settings for the Tillguard screen lock.
//!
//! The settings collaborator owns a small JSON document on disk; the lock
//! configuration lives under one fixed key. A malformed or missing entry is
//! never an error here, it simply falls back to "disabled".

pub mod store;

pub use store::{SCREEN_LOCK_KEY, SettingsStore};
