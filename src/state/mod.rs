//! Persistent run state: processed-file ledger, run counter, start time.

pub mod recorder;
pub mod trash;

pub use recorder::StateRecorder;
