use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;

/// Sink for supervision messages.
///
/// The default forwards to `tracing`; tests inject a capturing sink.
pub trait UnitLog: Send + Sync {
    fn info(&self, message: &str);
    fn exception(&self, message: &str);
}

pub struct TracingLog;

impl UnitLog for TracingLog {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn exception(&self, message: &str) {
        tracing::error!("{message}");
    }
}

/// What the supervision loop does once the work body fails or returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionPolicy {
    /// Restart after every failure, forever. Pause and resume requests
    /// are logged and ignored; the unit can never be made dormant from
    /// outside.
    AlwaysOn,
    /// Stop on the first failure (or return) and honor pause and resume.
    Controllable,
}

pub struct SupervisorOptions {
    /// Unit name used in log lines. Missing names get a generated one.
    pub name: Option<String>,
    /// Sleep between supervision cycles.
    pub interval: Duration,
    /// Suppress all supervision log output for this unit.
    pub quiet: bool,
    pub policy: SupervisionPolicy,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            name: None,
            interval: Duration::from_secs(3),
            quiet: false,
            policy: SupervisionPolicy::AlwaysOn,
        }
    }
}

static UNNAMED_UNITS: AtomicU64 = AtomicU64::new(1);

struct Shared {
    name: String,
    active: AtomicBool,
    alive: AtomicBool,
    policy: SupervisionPolicy,
}

/// Wraps a work body in a dedicated OS thread that survives anything the
/// body does.
///
/// Work is expected to run forever; a body that fails, panics, or even
/// returns cleanly is logged and, under [`SupervisionPolicy::AlwaysOn`],
/// started again on the next cycle. The thread itself never dies.
pub struct Supervisor {
    work: Box<dyn FnMut() -> Result<()> + Send>,
    options: SupervisorOptions,
    log: Arc<dyn UnitLog>,
}

impl Supervisor {
    pub fn new(work: impl FnMut() -> Result<()> + Send + 'static, options: SupervisorOptions) -> Self {
        Self { work: Box::new(work), options, log: Arc::new(TracingLog) }
    }

    pub fn with_log(mut self, log: Arc<dyn UnitLog>) -> Self {
        self.log = log;
        self
    }

    /// Spawn the supervision thread and return immediately.
    ///
    /// The thread is detached; it never blocks shutdown.
    pub fn start(self) -> SupervisorHandle {
        let Supervisor { mut work, options, log } = self;
        let SupervisorOptions { name, interval, quiet, policy } = options;
        let name = name.unwrap_or_else(|| {
            format!("thread-{}", UNNAMED_UNITS.fetch_add(1, Ordering::Relaxed))
        });

        let shared = Arc::new(Shared {
            name,
            active: AtomicBool::new(true),
            alive: AtomicBool::new(false),
            policy,
        });
        let handle = SupervisorHandle { shared: shared.clone(), log: log.clone(), quiet };

        thread::spawn(move || loop {
            if shared.active.load(Ordering::Acquire) {
                if !quiet {
                    log.info(&format!("'{}' thread started", shared.name));
                }
                shared.alive.store(true, Ordering::Release);
                let outcome = catch_unwind(AssertUnwindSafe(|| work()));
                shared.alive.store(false, Ordering::Release);

                match outcome {
                    // Work bodies loop forever; a clean return means the
                    // loop was lost somewhere.
                    Ok(Ok(())) => {
                        if !quiet {
                            log.info(&format!("Bad thread, restarting '{}'", shared.name));
                        }
                    }
                    Ok(Err(err)) => {
                        if !quiet {
                            log.exception(&format!("{err:#}, restarting '{}'", shared.name));
                        }
                    }
                    Err(payload) => {
                        if !quiet {
                            log.exception(&format!(
                                "{}, restarting '{}'",
                                panic_text(payload.as_ref()),
                                shared.name
                            ));
                        }
                    }
                }

                if policy == SupervisionPolicy::Controllable {
                    shared.active.store(false, Ordering::Release);
                }
            }
            thread::sleep(interval);
        });

        handle
    }
}

fn panic_text(payload: &(dyn Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text
    } else {
        "panic with non-text payload"
    }
}

/// Control surface for a started unit. Clones share the same unit.
#[derive(Clone)]
pub struct SupervisorHandle {
    shared: Arc<Shared>,
    log: Arc<dyn UnitLog>,
    quiet: bool,
}

impl SupervisorHandle {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Whether the loop will invoke the work body on its next cycle.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Whether the work body is executing right now.
    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    /// Skip future invocations, starting with the next cycle.
    ///
    /// Work already running is not interrupted, and an always-on unit
    /// ignores the request.
    pub fn pause(&self) {
        match self.shared.policy {
            SupervisionPolicy::AlwaysOn => {
                if !self.quiet {
                    self.log
                        .info(&format!("'{}' thread is always-on, pause ignored", self.shared.name));
                }
            }
            SupervisionPolicy::Controllable => {
                self.shared.active.store(false, Ordering::Release);
                if !self.quiet {
                    self.log.info(&format!("'{}' thread paused", self.shared.name));
                }
            }
        }
    }

    /// Re-arm a paused or stopped unit, starting with the next cycle.
    pub fn resume(&self) {
        match self.shared.policy {
            SupervisionPolicy::AlwaysOn => {
                if !self.quiet {
                    self.log
                        .info(&format!("'{}' thread is always-on, resume ignored", self.shared.name));
                }
            }
            SupervisionPolicy::Controllable => {
                self.shared.active.store(true, Ordering::Release);
                if !self.quiet {
                    self.log.info(&format!("'{}' thread resumed", self.shared.name));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct MemoryLog {
        lines: Mutex<Vec<String>>,
    }

    impl MemoryLog {
        fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl UnitLog for MemoryLog {
        fn info(&self, message: &str) {
            self.lines.lock().unwrap().push(format!("info: {message}"));
        }

        fn exception(&self, message: &str) {
            self.lines.lock().unwrap().push(format!("exception: {message}"));
        }
    }

    fn wait_for(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    fn opts(name: &str, policy: SupervisionPolicy) -> SupervisorOptions {
        SupervisorOptions {
            name: Some(name.to_string()),
            interval: Duration::from_millis(10),
            quiet: false,
            policy,
        }
    }

    fn counting_failure(runs: &Arc<AtomicU32>) -> impl FnMut() -> Result<()> + Send + 'static {
        let runs = runs.clone();
        move || {
            runs.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("boom")
        }
    }

    // ─── Restart policy ─────────────────────────────────────────────────

    #[test]
    fn always_on_restarts_after_failures() {
        let runs = Arc::new(AtomicU32::new(0));
        let handle =
            Supervisor::new(counting_failure(&runs), opts("fail-unit", SupervisionPolicy::AlwaysOn))
                .start();

        assert!(wait_for(|| runs.load(Ordering::SeqCst) >= 3, Duration::from_secs(2)));
        assert!(handle.is_active(), "always-on unit never goes dormant");
    }

    #[test]
    fn controllable_stops_after_first_failure() {
        let runs = Arc::new(AtomicU32::new(0));
        let handle = Supervisor::new(
            counting_failure(&runs),
            opts("one-shot", SupervisionPolicy::Controllable),
        )
        .start();

        assert!(wait_for(|| !handle.is_active(), Duration::from_secs(2)));
        let seen = runs.load(Ordering::SeqCst);
        assert_eq!(seen, 1);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(runs.load(Ordering::SeqCst), seen, "no further invocations once stopped");
    }

    #[test]
    fn clean_return_counts_as_bad_thread() {
        let log = Arc::new(MemoryLog::default());
        let runs = Arc::new(AtomicU32::new(0));
        let runs2 = runs.clone();
        let handle = Supervisor::new(
            move || {
                runs2.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            opts("returner", SupervisionPolicy::Controllable),
        )
        .with_log(log.clone())
        .start();

        assert!(wait_for(|| !handle.is_active(), Duration::from_secs(2)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        let lines = log.lines();
        assert!(
            lines.iter().any(|l| l.contains("Bad thread, restarting 'returner'")),
            "expected bad-thread line, got {lines:?}"
        );
    }

    #[test]
    fn panics_are_contained() {
        let log = Arc::new(MemoryLog::default());
        let runs = Arc::new(AtomicU32::new(0));
        let runs2 = runs.clone();
        let handle = Supervisor::new(
            move || {
                runs2.fetch_add(1, Ordering::SeqCst);
                panic!("kaboom")
            },
            opts("panicky", SupervisionPolicy::AlwaysOn),
        )
        .with_log(log.clone())
        .start();

        assert!(wait_for(|| runs.load(Ordering::SeqCst) >= 2, Duration::from_secs(2)));
        assert!(handle.is_active());
        assert!(log
            .lines()
            .iter()
            .any(|l| l.contains("exception: kaboom, restarting 'panicky'")));
    }

    // ─── Pause and resume ───────────────────────────────────────────────

    #[test]
    fn resume_rearms_a_stopped_unit() {
        let runs = Arc::new(AtomicU32::new(0));
        let handle = Supervisor::new(
            counting_failure(&runs),
            opts("restartable", SupervisionPolicy::Controllable),
        )
        .start();

        assert!(wait_for(|| !handle.is_active(), Duration::from_secs(2)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        handle.resume();
        assert!(handle.is_active());
        assert!(wait_for(|| runs.load(Ordering::SeqCst) >= 2, Duration::from_secs(2)));
        assert!(wait_for(|| !handle.is_active(), Duration::from_secs(2)));
    }

    #[test]
    fn pause_does_not_interrupt_running_work() {
        let runs = Arc::new(AtomicU32::new(0));
        let runs2 = runs.clone();
        let handle = Supervisor::new(
            move || {
                runs2.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(400));
                anyhow::bail!("pass over")
            },
            opts("draining", SupervisionPolicy::Controllable),
        )
        .start();

        assert!(wait_for(|| handle.is_alive(), Duration::from_secs(2)));
        handle.pause();
        // The in-flight invocation keeps running; only the next cycle sees
        // the flag.
        assert!(handle.is_alive());
        assert!(wait_for(|| !handle.is_alive(), Duration::from_secs(2)));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!handle.is_active());
    }

    #[test]
    fn pause_is_ignored_for_always_on_units() {
        let log = Arc::new(MemoryLog::default());
        let runs = Arc::new(AtomicU32::new(0));
        let handle =
            Supervisor::new(counting_failure(&runs), opts("pinned", SupervisionPolicy::AlwaysOn))
                .with_log(log.clone())
                .start();

        assert!(wait_for(|| runs.load(Ordering::SeqCst) >= 1, Duration::from_secs(2)));
        handle.pause();
        assert!(handle.is_active());
        let before = runs.load(Ordering::SeqCst);
        assert!(wait_for(
            || runs.load(Ordering::SeqCst) > before,
            Duration::from_secs(2)
        ));
        assert!(log.lines().iter().any(|l| l.contains("pause ignored")));
    }

    // ─── Flags and naming ───────────────────────────────────────────────

    #[test]
    fn alive_tracks_work_execution_only() {
        let handle = Supervisor::new(
            || {
                thread::sleep(Duration::from_millis(150));
                anyhow::bail!("done sleeping")
            },
            opts("sleeper", SupervisionPolicy::Controllable),
        )
        .start();

        assert!(wait_for(|| handle.is_alive(), Duration::from_secs(2)));
        assert!(wait_for(|| !handle.is_alive(), Duration::from_secs(2)));
        assert!(!handle.is_active());
    }

    #[test]
    fn missing_names_are_generated() {
        let options = SupervisorOptions {
            interval: Duration::from_millis(10),
            policy: SupervisionPolicy::Controllable,
            ..Default::default()
        };
        let handle = Supervisor::new(|| anyhow::bail!("x"), options).start();
        assert!(handle.name().starts_with("thread-"));
    }

    #[test]
    fn quiet_units_log_nothing() {
        let log = Arc::new(MemoryLog::default());
        let runs = Arc::new(AtomicU32::new(0));
        let handle = Supervisor::new(
            counting_failure(&runs),
            SupervisorOptions {
                name: Some("hushed".to_string()),
                interval: Duration::from_millis(10),
                quiet: true,
                policy: SupervisionPolicy::Controllable,
            },
        )
        .with_log(log.clone())
        .start();

        assert!(wait_for(|| !handle.is_active(), Duration::from_secs(2)));
        handle.resume();
        handle.pause();
        assert!(log.lines().is_empty(), "quiet unit wrote {:?}", log.lines());
    }
}
