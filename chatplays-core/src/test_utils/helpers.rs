// File: chatplays-core/src/test_utils/helpers.rs

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use chatplays_common::models::{Button, Identity};
use crate::Error;
use crate::clock::{Clock, IdGenerator};
use crate::platforms::{CommandExecutor, IdentityResolver};
use crate::services::chat_service::{ChatPlaysService, PipelineConfig};

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock() += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// `id-1`, `id-2`, ...
#[derive(Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        format!("id-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub buttons: Vec<Button>,
    pub duration_ms: u64,
    /// Tokio time, so paused-clock tests can check spacing.
    pub at: Instant,
}

/// Records every dispatch. Commands containing the `failing` button error out.
pub struct RecordingExecutor {
    dispatches: Mutex<Vec<Dispatch>>,
    failing: Option<Button>,
    hold: bool,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            dispatches: Mutex::new(Vec::new()),
            failing: None,
            hold: false,
        }
    }

    pub fn failing_on(mut self, button: Button) -> Self {
        self.failing = Some(button);
        self
    }

    /// Sleep for the press duration like a real key press would.
    pub fn holding(mut self) -> Self {
        self.hold = true;
        self
    }

    pub fn dispatches(&self) -> Vec<Dispatch> {
        self.dispatches.lock().clone()
    }

    /// Dispatched commands as `a`, `b+right`, ...
    pub fn pressed(&self) -> Vec<String> {
        self.dispatches
            .lock()
            .iter()
            .map(|d| d.buttons.iter().map(Button::as_str).collect::<Vec<_>>().join("+"))
            .collect()
    }
}

impl Default for RecordingExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn execute(&self, buttons: &[Button], duration_ms: u64) -> Result<(), Error> {
        self.dispatches.lock().push(Dispatch {
            buttons: buttons.to_vec(),
            duration_ms,
            at: Instant::now(),
        });
        if self.hold {
            tokio::time::sleep(std::time::Duration::from_millis(duration_ms)).await;
        }
        match self.failing {
            Some(button) if buttons.contains(&button) => {
                Err(Error::Dispatch(format!("{} is unplugged", button)))
            }
            _ => Ok(()),
        }
    }
}

/// Answers lookups from a script, in order; `Ok(None)` once it runs out.
/// With a gate, every lookup waits for a `notify_one` before answering.
pub struct ScriptedResolver {
    script: Mutex<VecDeque<Result<Option<Identity>, String>>>,
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn then_ok(self, identity: Identity) -> Self {
        self.script.lock().push_back(Ok(Some(identity)));
        self
    }

    pub fn then_empty(self) -> Self {
        self.script.lock().push_back(Ok(None));
        self
    }

    pub fn then_err(self, message: &str) -> Self {
        self.script.lock().push_back(Err(message.to_string()));
        self
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityResolver for ScriptedResolver {
    async fn resolve(&self, participant_id: &str) -> Result<Option<Identity>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self.script.lock().pop_front();
        match next {
            Some(Ok(identity)) => Ok(identity),
            Some(Err(message)) => Err(Error::Resolution(format!("{}: {}", participant_id, message))),
            None => Ok(None),
        }
    }
}

pub struct TestPipeline {
    pub service: Arc<ChatPlaysService>,
    pub executor: Arc<RecordingExecutor>,
    pub resolver: Arc<ScriptedResolver>,
    pub clock: Arc<ManualClock>,
}

pub fn test_pipeline(
    config: PipelineConfig,
    executor: RecordingExecutor,
    resolver: ScriptedResolver,
) -> TestPipeline {
    let executor = Arc::new(executor);
    let resolver = Arc::new(resolver);
    let clock = Arc::new(ManualClock::default());
    let service = ChatPlaysService::new(config, executor.clone(), resolver.clone())
        .with_clock(clock.clone())
        .with_id_generator(Arc::new(SequentialIds::default()));
    TestPipeline {
        service: Arc::new(service),
        executor,
        resolver,
        clock,
    }
}

/// Lets spawned tasks run up to their next real wait.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
