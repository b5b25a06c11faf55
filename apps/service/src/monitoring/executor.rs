use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use super::checker::{Checker, GameChecker, HttpChecker, TcpChecker};
use super::types::{Protocol, ProbeResult};
use crate::registry::Service;

/// Capability the scheduler uses to check a service
///
/// Implementations must return within `timeout` and report every kind of
/// trouble (refusal, DNS, deadline, protocol mismatch) as a failed result.
#[async_trait::async_trait]
pub trait ServiceProbe: Send + Sync {
    async fn check(&self, service: &Service, timeout: Duration) -> ProbeResult;
}

/// Probe executor - runs the checker matching a service's protocol under a deadline
pub struct ProbeExecutor {
    tcp_checker: Arc<TcpChecker>,
    http_checker: Arc<HttpChecker>,
    game_checker: Arc<GameChecker>,
}

impl ProbeExecutor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            tcp_checker: Arc::new(TcpChecker),
            http_checker: Arc::new(HttpChecker::new()?),
            game_checker: Arc::new(GameChecker),
        })
    }

    fn checker_for(&self, protocol: Protocol) -> &dyn Checker {
        match protocol {
            Protocol::Tcp => self.tcp_checker.as_ref(),
            Protocol::Http => self.http_checker.as_ref(),
            Protocol::Game => self.game_checker.as_ref(),
        }
    }
}

#[async_trait::async_trait]
impl ServiceProbe for ProbeExecutor {
    async fn check(&self, service: &Service, deadline: Duration) -> ProbeResult {
        let start = Instant::now();
        let checker = self.checker_for(service.protocol);

        // Dropping the checker future on timeout closes its socket.
        let result = match timeout(deadline, checker.check(service)).await {
            Ok(Ok(observation)) => ProbeResult::success().with_message(observation),
            Ok(Err(e)) => ProbeResult::failure(e.to_string()),
            Err(_) => ProbeResult::failure(format!(
                "{} check timed out after {}ms",
                service.protocol,
                deadline.as_millis()
            )),
        };

        result.with_elapsed(start.elapsed())
    }
}
