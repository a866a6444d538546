//! Torrent Relay Watcher
//!
//! Watches a directory for finished torrent files and relays each one to a
//! set of remote hosts over SSH, retrying until delivery succeeds.

pub mod api;
pub mod config;
pub mod daemon;
pub mod relay;
pub mod state;
pub mod utils;
pub mod watch;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::RelayError;
pub type Result<T> = std::result::Result<T, RelayError>;
