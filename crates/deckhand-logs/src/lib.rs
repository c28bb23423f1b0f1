//! Deckhand Logs - per-app log management, rotation, and streaming

mod reader;
mod rotation;
mod stream;
mod topic;
mod writer;

pub use reader::LogReader;
pub use rotation::RotationConfig;
pub use stream::{AppLog, LogCapture};
pub use topic::{LogHub, LogTopic};
pub use writer::{LogSource, LogWriter};
