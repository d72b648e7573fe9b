//! Nullable infrastructure for deterministic testing.
//!
//! External dependencies (clock, storage) are abstracted behind traits.
//! This crate provides test-friendly implementations that return
//! deterministic values, can be controlled programmatically, and never
//! touch the filesystem.

pub mod clock;
pub mod store;

pub use clock::NullClock;
pub use store::NullStore;
