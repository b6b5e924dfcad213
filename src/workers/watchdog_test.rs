// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::*;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
enum Reply {
    Stale,
    Fresh,
    Hang,
}

struct ScriptedProbe {
    replies: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    fn new(replies: &[Reply]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().copied().collect()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusProbe for ScriptedProbe {
    async fn probe(&self) -> Result<StatusReport, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Fresh);
        let mut report = StatusReport::unknown();
        report.status = "running".to_string();
        match reply {
            Reply::Stale => report.is_stale = true,
            Reply::Fresh => {}
            Reply::Hang => tokio::time::sleep(Duration::from_secs(3600)).await,
        }
        Ok(report)
    }
}

struct FakeProcess {
    started: Instant,
    exit_after: Option<Duration>,
    exit_code: i32,
    ignore_term: bool,
    terminated: bool,
    killed: bool,
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl FakeProcess {
    fn new(exit_after: Option<Duration>, events: Arc<Mutex<Vec<&'static str>>>) -> Self {
        Self {
            started: Instant::now(),
            exit_after,
            exit_code: 0,
            ignore_term: false,
            terminated: false,
            killed: false,
            events,
        }
    }
}

#[async_trait]
impl SupervisedProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    async fn wait_timeout(&mut self, timeout: Duration) -> io::Result<Option<ProcessExit>> {
        if self.killed || (self.terminated && !self.ignore_term) {
            return Ok(Some(ProcessExit { code: None }));
        }
        if let Some(exit_after) = self.exit_after {
            let remaining = exit_after.saturating_sub(self.started.elapsed());
            if remaining <= timeout {
                tokio::time::sleep(remaining).await;
                return Ok(Some(ProcessExit {
                    code: Some(self.exit_code),
                }));
            }
        }
        tokio::time::sleep(timeout).await;
        Ok(None)
    }

    async fn wait(&mut self) -> io::Result<ProcessExit> {
        loop {
            if let Some(exit) = self.wait_timeout(Duration::from_secs(1)).await? {
                return Ok(exit);
            }
        }
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.events.lock().unwrap().push("term");
        self.terminated = true;
        Ok(())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.events.lock().unwrap().push("kill");
        self.killed = true;
        Ok(())
    }
}

fn config(max_stale_count: u32) -> WatchdogConfig {
    WatchdogConfig {
        enabled: true,
        poll: Duration::from_secs(1),
        status_timeout: Duration::from_secs(1),
        startup_grace: Duration::ZERO,
        max_stale_count,
        term_grace: Duration::from_secs(5),
    }
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_stale_polls_trigger_graceful_termination() {
    let probe = ScriptedProbe::new(&[Reply::Stale, Reply::Stale, Reply::Stale]);
    let watchdog = Watchdog::new(probe.clone(), config(3));
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut process = FakeProcess::new(None, events.clone());

    let outcome = watchdog.supervise(&mut process).await.unwrap();

    assert_eq!(outcome, SupervisionOutcome::Terminated { forced: false });
    assert_eq!(probe.calls(), 3);
    assert_eq!(*events.lock().unwrap(), vec!["term"]);
}

#[tokio::test(start_paused = true)]
async fn test_ignored_sigterm_escalates_to_sigkill() {
    let probe = ScriptedProbe::new(&[Reply::Stale]);
    let watchdog = Watchdog::new(probe, config(1));
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut process = FakeProcess::new(None, events.clone());
    process.ignore_term = true;

    let started = Instant::now();
    let outcome = watchdog.supervise(&mut process).await.unwrap();

    assert_eq!(outcome, SupervisionOutcome::Terminated { forced: true });
    assert_eq!(*events.lock().unwrap(), vec!["term", "kill"]);
    assert!(started.elapsed() >= Duration::from_secs(6));
    assert!(!outcome.succeeded());
}

#[tokio::test(start_paused = true)]
async fn test_fresh_heartbeat_resets_stale_count() {
    let probe = ScriptedProbe::new(&[
        Reply::Stale,
        Reply::Stale,
        Reply::Fresh,
        Reply::Stale,
        Reply::Stale,
    ]);
    let watchdog = Watchdog::new(probe.clone(), config(3));
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut process = FakeProcess::new(Some(Duration::from_millis(6500)), events.clone());

    let outcome = watchdog.supervise(&mut process).await.unwrap();

    assert!(outcome.succeeded());
    assert_eq!(probe.calls(), 6);
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_status_timeout_is_not_counted_as_stale() {
    let probe = ScriptedProbe::new(&[Reply::Hang, Reply::Hang, Reply::Hang]);
    let watchdog = Watchdog::new(probe.clone(), config(1));
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut process = FakeProcess::new(Some(Duration::from_millis(5500)), events.clone());

    let outcome = watchdog.supervise(&mut process).await.unwrap();

    assert_eq!(outcome, SupervisionOutcome::Exited(ProcessExit { code: Some(0) }));
    assert!(probe.calls() >= 2);
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_startup_grace_suppresses_checks() {
    let probe = ScriptedProbe::new(&[Reply::Stale; 10]);
    let mut config = config(1);
    config.startup_grace = Duration::from_secs(10);
    let watchdog = Watchdog::new(probe.clone(), config);
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut process = FakeProcess::new(Some(Duration::from_millis(5500)), events);

    let outcome = watchdog.supervise(&mut process).await.unwrap();

    assert!(outcome.succeeded());
    assert_eq!(probe.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_watchdog_only_waits() {
    let probe = ScriptedProbe::new(&[Reply::Stale; 10]);
    let mut config = config(1);
    config.enabled = false;
    let watchdog = Watchdog::new(probe.clone(), config);
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut process = FakeProcess::new(Some(Duration::from_secs(4)), events);

    assert!(watchdog.supervise(&mut process).await.unwrap().succeeded());
    assert_eq!(probe.calls(), 0);
}

struct ScriptedLauncher {
    exit_codes: Mutex<VecDeque<i32>>,
    spawn_failures: AtomicUsize,
    launches: AtomicUsize,
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl ProcessLauncher for ScriptedLauncher {
    fn launch(&self) -> io::Result<Box<dyn SupervisedProcess>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self
            .spawn_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(io::Error::other("sync binary not found"));
        }
        let code = self.exit_codes.lock().unwrap().pop_front().unwrap_or(0);
        let mut process = FakeProcess::new(Some(Duration::from_millis(1500)), self.events.clone());
        process.exit_code = code;
        Ok(Box::new(process))
    }
}

#[tokio::test(start_paused = true)]
async fn test_supervisor_relaunches_after_failure_cooldown() {
    let launcher = Arc::new(ScriptedLauncher {
        exit_codes: Mutex::new(VecDeque::from(vec![1, 0])),
        spawn_failures: AtomicUsize::new(0),
        launches: AtomicUsize::new(0),
        events: Arc::new(Mutex::new(Vec::new())),
    });
    let watchdog = Watchdog::new(ScriptedProbe::new(&[]), config(3));
    let supervisor = SyncSupervisor::new(
        launcher.clone(),
        watchdog,
        Duration::from_secs(3600),
        Duration::from_secs(7),
    );

    let started = Instant::now();
    supervisor.run(Some(2)).await;

    assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(10));
    assert!(elapsed < Duration::from_secs(3600));
}

#[tokio::test(start_paused = true)]
async fn test_supervisor_survives_launch_error() {
    let launcher = Arc::new(ScriptedLauncher {
        exit_codes: Mutex::new(VecDeque::new()),
        spawn_failures: AtomicUsize::new(1),
        launches: AtomicUsize::new(0),
        events: Arc::new(Mutex::new(Vec::new())),
    });
    let watchdog = Watchdog::new(ScriptedProbe::new(&[]), config(3));
    let supervisor = SyncSupervisor::new(
        launcher.clone(),
        watchdog,
        Duration::from_secs(3600),
        Duration::from_secs(7),
    );

    let started = Instant::now();
    supervisor.run(Some(2)).await;

    assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(7));
    assert!(elapsed < Duration::from_secs(3600));
}
