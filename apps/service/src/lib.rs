//! ServerTracker - polls TCP, HTTP and Minecraft services and sends SMS alerts
//! when they go offline or come back.

pub mod alert;
pub mod cli;
pub mod config;
pub mod console;
pub mod error;
pub mod monitoring;
pub mod orchestrator;
pub mod registry;

pub use orchestrator::Orchestrator;
