//! Inactivity screen-lock core for the Tillguard point-of-sale shell.
//!
//! The host shell forwards user activity into a [`LockService`], renders a
//! blocking overlay whenever the `locked` observable is true, and feeds PIN
//! entries back through [`LockService::attempt_unlock`]. Configuration comes
//! from the settings collaborator and is re-applied via
//! [`LockService::configure`] whenever it changes.

pub mod activity;
pub mod config;
pub mod controller;
pub mod service;

// Re-export commonly used types for easier access
pub use activity::ActivityEvent;
pub use config::LockConfig;
pub use controller::{LockController, LockPhase, MAX_UNLOCK_ATTEMPTS, UnlockResult};
pub use service::{LockService, SessionTerminator};
