//! Deckhand Daemon - application supervisor and deployment pipeline

pub mod daemon;
pub mod handlers;
pub mod pipeline;
pub mod ports;
pub mod supervisor;
pub mod webhook;

pub use daemon::Daemon;
pub use pipeline::{DeployPipeline, DeploySource};
pub use ports::PortAllocator;
pub use supervisor::Supervisor;
pub use webhook::WebhookRedeployer;
