//! scout daemon library - exposes modules for testing.

pub mod config;
pub mod fetcher;
pub mod judge;
pub mod probe;
pub mod updater;
