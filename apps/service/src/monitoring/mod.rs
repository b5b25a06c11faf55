/// Monitoring engine module - probes services and tracks their reachability
///
/// This module is responsible for:
/// - Executing TCP/HTTP/Minecraft checks under a deadline
/// - Tracking the online/offline state of every service
/// - Scheduling check cycles and forwarding transitions to the alert dispatcher
pub mod checker;
pub mod executor;
pub mod minecraft;
pub mod scheduler;
pub mod tracker;
pub mod types;

pub use executor::{ProbeExecutor, ServiceProbe};
pub use scheduler::{Scheduler, SchedulerState};
pub use tracker::StatusTracker;
pub use types::{AlertEvent, ProbeResult, Protocol, Status};
