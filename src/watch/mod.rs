//! Directory watching and sleep/wake detection.

pub mod power;
pub mod watcher;

pub use power::PowerMonitor;
pub use watcher::Watcher;
