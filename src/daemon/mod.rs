//! Daemon lifecycle management.

pub mod shutdown;
