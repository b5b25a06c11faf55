use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use super::executor::ServiceProbe;
use super::tracker::StatusTracker;
use super::types::ProbeResult;
use crate::alert::AlertDispatcher;
use crate::error::SchedulerError;
use crate::registry::{Service, ServiceRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Everything a single check needs, cloned into each service worker
#[derive(Clone)]
struct CheckContext {
    probe: Arc<dyn ServiceProbe>,
    tracker: Arc<StatusTracker>,
    dispatcher: Arc<AlertDispatcher>,
    timeout: Duration,
}

impl CheckContext {
    /// Probe, record, and announce the transition if there is one
    async fn check_once(self, service: Arc<Service>, cycle: u64) {
        let result = self.probe.check(&service, self.timeout).await;
        debug!(
            service = %service.name,
            cycle,
            success = result.success,
            elapsed_ms = result.elapsed.as_millis() as u64,
            detail = result.message.as_deref().unwrap_or(""),
            "Check finished"
        );

        if let Some(event) = self.tracker.record(&service.name, &result) {
            self.dispatcher.dispatch(&event).await;
        }
    }
}

/// Monitoring scheduler - fans each tick out to one worker per service
///
/// Each service has a dedicated worker task that runs its checks one after
/// another, so results for a service reach the tracker in the order the checks
/// were issued. A worker that is still busy when the next tick arrives keeps
/// at most one tick queued; further ticks for that service are skipped while
/// every other service carries on.
pub struct Scheduler {
    registry: Arc<ServiceRegistry>,
    context: CheckContext,
    interval: Duration,
    running: AtomicBool,
}

impl Scheduler {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        probe: Arc<dyn ServiceProbe>,
        tracker: Arc<StatusTracker>,
        dispatcher: Arc<AlertDispatcher>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            context: CheckContext { probe, tracker, dispatcher, timeout },
            interval,
            running: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.running.load(Ordering::SeqCst) {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// Run check cycles until `shutdown` turns true or its sender is dropped
    ///
    /// The first cycle starts one interval after the call. Can only be
    /// started once per scheduler.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), SchedulerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!(
            services = self.registry.len(),
            interval_s = self.interval.as_secs_f64(),
            timeout_ms = self.context.timeout.as_millis() as u64,
            "Scheduler started"
        );

        let (triggers, workers): (Vec<_>, Vec<_>) =
            self.registry.iter().map(|service| self.spawn_worker(service.clone())).unzip();

        let mut timer = interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cycle: u64 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = timer.tick() => {
                    cycle += 1;
                    debug!(cycle, "Starting check cycle");
                    fan_out(cycle, &triggers);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(cycles = cycle, "Scheduler stopping, waiting for in-flight checks");
        drop(triggers);
        for worker in workers {
            if let Err(e) = worker.await {
                error!("Service worker ended abnormally: {}", e);
            }
        }

        Ok(())
    }

    /// Probe every service once, concurrently, without touching the tracker
    pub async fn probe_all(&self) -> Vec<(Arc<Service>, ProbeResult)> {
        let checks = self.registry.iter().map(|service| {
            let probe = self.context.probe.clone();
            let timeout = self.context.timeout;
            async move {
                let result = probe.check(service, timeout).await;
                (service.clone(), result)
            }
        });

        join_all(checks).await
    }

    fn spawn_worker(&self, service: Arc<Service>) -> ((String, mpsc::Sender<u64>), JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<u64>(1);
        let context = self.context.clone();
        let name = service.name.clone();

        let handle = tokio::spawn(async move {
            while let Some(cycle) = rx.recv().await {
                // A panic inside one check must not take the worker down with it.
                let job = tokio::spawn(context.clone().check_once(service.clone(), cycle));
                if let Err(e) = job.await {
                    error!(service = %service.name, cycle, "Check aborted: {}", e);
                }
            }
            debug!(service = %service.name, "Worker stopped");
        });

        ((name, tx), handle)
    }
}

fn fan_out(cycle: u64, triggers: &[(String, mpsc::Sender<u64>)]) {
    for (name, trigger) in triggers {
        match trigger.try_send(cycle) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(service = %name, cycle, "Previous check still running, skipping this cycle");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(service = %name, cycle, "Service worker is gone");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::SmsTransport;
    use crate::config::ServerEntry;
    use crate::error::SendError;
    use crate::monitoring::tracker::AlertPolicy;
    use crate::monitoring::types::Status;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Plays back a scripted list of outcomes per service; `true` means reachable
    struct ScriptedProbe {
        scripts: Mutex<HashMap<String, VecDeque<bool>>>,
        delays: HashMap<String, Duration>,
        panics_for: Option<String>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl ScriptedProbe {
        fn new(scripts: &[(&str, &[bool])]) -> Self {
            Self {
                scripts: Mutex::new(
                    scripts
                        .iter()
                        .map(|(n, s)| (n.to_string(), s.iter().copied().collect()))
                        .collect(),
                ),
                delays: HashMap::new(),
                panics_for: None,
                calls: Mutex::new(HashMap::new()),
            }
        }

        fn calls(&self, name: &str) -> usize {
            self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
        }
    }

    #[async_trait::async_trait]
    impl ServiceProbe for ScriptedProbe {
        async fn check(&self, service: &Service, _timeout: Duration) -> ProbeResult {
            *self.calls.lock().unwrap().entry(service.name.clone()).or_default() += 1;
            if self.panics_for.as_deref() == Some(service.name.as_str()) {
                panic!("probe blew up");
            }
            if let Some(delay) = self.delays.get(&service.name) {
                tokio::time::sleep(*delay).await;
            }
            let next =
                self.scripts.lock().unwrap().get_mut(&service.name).and_then(|s| s.pop_front());
            match next {
                Some(false) => ProbeResult::failure("scripted failure"),
                _ => ProbeResult::success(),
            }
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait::async_trait]
    impl SmsTransport for RecordingTransport {
        async fn send(&self, to: &str, body: &str) -> Result<(), SendError> {
            self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn registry(names: &[&str]) -> Arc<ServiceRegistry> {
        let entries: Vec<ServerEntry> = names
            .iter()
            .map(|name| ServerEntry {
                name: Some((*name).into()),
                hostname: Some("127.0.0.1".into()),
                port: Some(1),
                send_alert_to: Some(vec!["+15550000001".into()]),
                ..Default::default()
            })
            .collect();
        Arc::new(ServiceRegistry::from_entries(&entries).unwrap())
    }

    struct Harness {
        scheduler: Arc<Scheduler>,
        tracker: Arc<StatusTracker>,
        transport: Arc<RecordingTransport>,
        probe: Arc<ScriptedProbe>,
    }

    fn harness(names: &[&str], probe: ScriptedProbe, interval: Duration) -> Harness {
        let registry = registry(names);
        let probe = Arc::new(probe);
        let tracker = Arc::new(StatusTracker::new(registry.clone(), AlertPolicy::default()));
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Arc::new(AlertDispatcher::new(transport.clone()));
        let scheduler = Arc::new(Scheduler::new(
            registry,
            probe.clone(),
            tracker.clone(),
            dispatcher,
            interval,
            Duration::from_millis(500),
        ));
        Harness { scheduler, tracker, transport, probe }
    }

    #[tokio::test]
    async fn test_transitions_are_dispatched_in_order() {
        let probe = ScriptedProbe::new(&[("web", &[true, false, false, true])]);
        let h = harness(&["web"], probe, Duration::from_millis(30));

        let (tx, rx) = watch::channel(false);
        let scheduler = h.scheduler.clone();
        let run = tokio::spawn(async move { scheduler.run(rx).await });

        tokio::time::sleep(Duration::from_millis(250)).await;
        tx.send(true).unwrap();
        run.await.unwrap().unwrap();

        let sent = h.transport.sent.lock().unwrap();
        let bodies: Vec<&str> = sent.iter().map(|(_, body)| body.as_str()).collect();
        assert_eq!(bodies.len(), 2, "{bodies:?}");
        assert!(bodies[0].contains("is DOWN"));
        assert!(bodies[1].contains("back UP"));
        assert_eq!(h.tracker.status("web"), Some(Status::Online));
    }

    #[tokio::test]
    async fn test_slow_service_does_not_block_others() {
        let mut probe = ScriptedProbe::new(&[]);
        probe.delays.insert("slow".into(), Duration::from_secs(5));
        let h = harness(&["fast", "slow"], probe, Duration::from_millis(20));

        let (tx, rx) = watch::channel(false);
        let scheduler = h.scheduler.clone();
        let run = tokio::spawn(async move { scheduler.run(rx).await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(h.probe.calls("fast") >= 4, "fast checked {} times", h.probe.calls("fast"));
        assert_eq!(h.probe.calls("slow"), 1);
        assert_eq!(h.tracker.status("fast"), Some(Status::Online));
        assert_eq!(h.tracker.status("slow"), Some(Status::Unknown));

        drop(tx);
        run.abort();
    }

    #[tokio::test]
    async fn test_panicking_check_is_isolated() {
        let mut probe = ScriptedProbe::new(&[("ok", &[false])]);
        probe.panics_for = Some("broken".into());
        let h = harness(&["broken", "ok"], probe, Duration::from_millis(20));

        let (tx, rx) = watch::channel(false);
        let scheduler = h.scheduler.clone();
        let run = tokio::spawn(async move { scheduler.run(rx).await });

        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.send(true).unwrap();
        run.await.unwrap().unwrap();

        // The broken service keeps being retried every cycle
        assert!(h.probe.calls("broken") >= 3);
        assert_eq!(h.tracker.status("broken"), Some(Status::Unknown));
        assert_eq!(h.tracker.status("ok"), Some(Status::Online));
        // "ok" went down on its first check and came back on the second
        assert_eq!(h.transport.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cannot_start_twice() {
        let h = harness(&["web"], ScriptedProbe::new(&[]), Duration::from_secs(60));
        assert_eq!(h.scheduler.state(), SchedulerState::Stopped);

        let (tx, rx) = watch::channel(false);
        let scheduler = h.scheduler.clone();
        let run = tokio::spawn(async move { scheduler.run(rx).await });
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(h.scheduler.state(), SchedulerState::Running);
        let second = h.scheduler.run(tx.subscribe()).await;
        assert!(matches!(second, Err(SchedulerError::AlreadyRunning)));

        tx.send(true).unwrap();
        run.await.unwrap().unwrap();
        assert_eq!(h.scheduler.state(), SchedulerState::Running);
    }

    #[tokio::test]
    async fn test_probe_all_leaves_tracker_untouched() {
        let probe = ScriptedProbe::new(&[("a", &[false]), ("b", &[true])]);
        let h = harness(&["a", "b"], probe, Duration::from_secs(60));

        let results = h.scheduler.probe_all().await;
        assert_eq!(results.len(), 2);
        let a = results.iter().find(|(s, _)| s.name == "a").unwrap();
        assert!(!a.1.success);
        assert_eq!(h.tracker.status("a"), Some(Status::Unknown));
    }
}
