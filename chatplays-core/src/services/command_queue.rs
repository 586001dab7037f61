//! Ordered, single-consumer command queue.
//!
//! Item states: `queued → active → done | error`, or `queued → error` when the
//! stored command no longer parses. Only the consumer loop moves items out of
//! `queued`, and it handles one item at a time, so at most one item is ever
//! `active`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use chatplays_common::models::{Identity, ParsedCommand, QueueItem, QueueStatus};
use super::chat_service::ChatPlaysService;
use super::command_parser::parse_command;

pub const DEFAULT_QUEUE_CAPACITY: usize = 25;
pub const COMMAND_DELAY: Duration = Duration::from_millis(200);
pub const REPEAT_DELAY: Duration = Duration::from_millis(500);

/// What the consumer took from the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// Now the active item.
    Dispatch { id: String, command: ParsedCommand },
    /// Stored command no longer parses; already marked `error`.
    Rejected { id: String, command: String },
}

#[derive(Debug)]
pub struct CommandQueue {
    items: VecDeque<QueueItem>,
    capacity: usize,
    active_id: Option<String>,
    consumer_running: bool,
}

impl CommandQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            active_id: None,
            consumer_running: false,
        }
    }

    /// Appends to the tail; past capacity the oldest items are dropped.
    /// Returns how many were dropped.
    pub fn enqueue(&mut self, item: QueueItem) -> usize {
        self.items.push_back(item);
        let mut evicted = 0;
        while self.items.len() > self.capacity {
            if let Some(dropped) = self.items.pop_front() {
                debug!("queue full, dropping {} ('{}', {:?})", dropped.id, dropped.command, dropped.status);
            }
            evicted += 1;
        }
        evicted
    }

    /// Claims the consumer role. False if a consumer is already running.
    pub fn try_claim_consumer(&mut self) -> bool {
        if self.consumer_running {
            return false;
        }
        self.consumer_running = true;
        true
    }

    pub fn release_consumer(&mut self) {
        self.consumer_running = false;
        self.active_id = None;
    }

    pub fn consumer_running(&self) -> bool {
        self.consumer_running
    }

    /// Takes the oldest queued item off the wait list. Its stored command is
    /// parsed again with repeats disabled: on success the item becomes the
    /// active one, otherwise it goes straight to `error`.
    pub fn claim_next(&mut self) -> Option<Claim> {
        debug_assert!(self.active_id.is_none(), "only one item may be active");
        let item = self.items.iter_mut().find(|item| item.status == QueueStatus::Queued)?;
        match parse_command(&item.command, false) {
            Some(command) => {
                item.status = QueueStatus::Active;
                self.active_id = Some(item.id.clone());
                Some(Claim::Dispatch { id: item.id.clone(), command })
            }
            None => {
                item.status = QueueStatus::Error;
                Some(Claim::Rejected { id: item.id.clone(), command: item.command.clone() })
            }
        }
    }

    /// Moves an item to a terminal status and clears the active marker if it
    /// pointed at it. The item may already have been evicted.
    pub fn mark_finished(&mut self, id: &str, status: QueueStatus) {
        debug_assert!(status.is_terminal());
        if let Some(item) = self.find_mut(id) {
            item.status = status;
        }
        if self.active_id.as_deref() == Some(id) {
            self.active_id = None;
        }
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn apply_identity(&mut self, identity: &Identity) -> bool {
        let mut changed = false;
        for item in self.items.iter_mut() {
            changed |= item.apply_identity(identity);
        }
        changed
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.iter()
    }

    pub fn to_vec(&self) -> Vec<QueueItem> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl ChatPlaysService {
    /// Queues a command now, like a freshly arrived chat line would.
    pub(crate) fn enqueue_command(self: &Arc<Self>, participant_id: &str, command: &str) {
        let now = self.clock.now();
        let identity = self.identities.fresh(participant_id, now);
        let item = QueueItem::new(self.ids.next_id(), participant_id, command, now, identity.as_ref());
        {
            let mut state = self.state.lock();
            state.queue.enqueue(item);
            self.publish_locked(&state);
        }
        self.wake_consumer();
    }

    /// Extra presses of an `xN` command go to the back of the queue one
    /// repeat delay apart, so other chatters' commands can land in between.
    pub(crate) fn schedule_repeats(self: &Arc<Self>, participant_id: &str, command: &ParsedCommand) {
        if !command.is_repeated() {
            return;
        }
        let service = Arc::clone(self);
        let participant_id = participant_id.to_string();
        let normalized = command.normalized.clone();
        let extra = command.repeat_count - 1;
        let delay = self.config.repeat_delay;

        tokio::spawn(async move {
            for _ in 0..extra {
                sleep(delay).await;
                service.enqueue_command(&participant_id, &normalized);
            }
        });
    }

    /// Starts the consumer loop unless it is already running.
    pub(crate) fn wake_consumer(self: &Arc<Self>) {
        if !self.state.lock().queue.try_claim_consumer() {
            return;
        }
        let service = Arc::clone(self);
        tokio::spawn(async move { service.run_consumer().await });
    }

    async fn run_consumer(self: Arc<Self>) {
        debug!("queue consumer started");
        loop {
            let claim = {
                let mut state = self.state.lock();
                let claim = state.queue.claim_next();
                match claim {
                    Some(_) => self.publish_locked(&state),
                    None => state.queue.release_consumer(),
                }
                claim
            };
            let (id, parsed) = match claim {
                Some(Claim::Dispatch { id, command }) => (id, command),
                Some(Claim::Rejected { id, command }) => {
                    warn!("queued command {} ('{}') no longer parses", id, command);
                    continue;
                }
                None => {
                    debug!("queue drained, consumer stopped");
                    return;
                }
            };
            let command = &parsed.normalized;

            let status = match self.executor.execute(&parsed.buttons, parsed.duration_ms()).await {
                Ok(()) => {
                    info!("dispatched '{}' ({})", command, id);
                    QueueStatus::Done
                }
                Err(e) => {
                    warn!("dispatch of '{}' ({}) failed: {}", command, id, e);
                    QueueStatus::Error
                }
            };
            self.finish_item(&id, status);

            sleep(self.config.command_delay).await;
        }
    }

    fn finish_item(&self, id: &str, status: QueueStatus) {
        let mut state = self.state.lock();
        state.queue.mark_finished(id, status);
        self.publish_locked(&state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(i: usize) -> QueueItem {
        QueueItem::new(format!("q{}", i), "did:plc:a", "a", Utc::now(), None)
    }

    fn ids(queue: &CommandQueue) -> Vec<String> {
        queue.iter().map(|item| item.id.clone()).collect()
    }

    #[test]
    fn keeps_the_newest_items_in_arrival_order() {
        for capacity in 1..6 {
            for total in 0..12 {
                let mut queue = CommandQueue::new(capacity);
                for i in 0..total {
                    queue.enqueue(item(i));
                }
                let expected: Vec<String> = (total.saturating_sub(capacity)..total)
                    .map(|i| format!("q{}", i))
                    .collect();
                assert_eq!(ids(&queue), expected, "capacity {} total {}", capacity, total);
            }
        }
    }

    fn claimed_id(claim: Option<Claim>) -> String {
        match claim {
            Some(Claim::Dispatch { id, .. }) => id,
            other => panic!("expected a dispatch claim, got {:?}", other),
        }
    }

    #[test]
    fn claim_skips_finished_items() {
        let mut queue = CommandQueue::new(10);
        queue.enqueue(item(0));
        queue.enqueue(item(1));
        queue.enqueue(item(2));

        queue.mark_finished("q0", QueueStatus::Error);
        assert_eq!(claimed_id(queue.claim_next()), "q1");
        assert_eq!(queue.active_id(), Some("q1"));
        assert_eq!(queue.iter().nth(1).unwrap().status, QueueStatus::Active);

        queue.mark_finished("q1", QueueStatus::Done);
        assert_eq!(queue.active_id(), None);
        assert_eq!(queue.iter().filter(|i| i.status == QueueStatus::Active).count(), 0);
        assert_eq!(claimed_id(queue.claim_next()), "q2");
    }

    #[test]
    fn claim_returns_the_reparsed_command() {
        let mut queue = CommandQueue::new(10);
        queue.enqueue(QueueItem::new("q0".into(), "did:plc:a", "b+right-", Utc::now(), None));
        match queue.claim_next() {
            Some(Claim::Dispatch { id, command }) => {
                assert_eq!(id, "q0");
                assert_eq!(command.normalized, "b+right-");
                assert_eq!(command.duration_ms(), 600);
            }
            other => panic!("expected a dispatch claim, got {:?}", other),
        }
    }

    #[test]
    fn unparsable_items_are_rejected_without_activation() {
        let mut queue = CommandQueue::new(10);
        queue.enqueue(QueueItem::new("q0".into(), "did:plc:a", "a+b+up", Utc::now(), None));
        queue.enqueue(item(1));

        assert_eq!(
            queue.claim_next(),
            Some(Claim::Rejected { id: "q0".into(), command: "a+b+up".into() })
        );
        assert_eq!(queue.iter().next().unwrap().status, QueueStatus::Error);
        assert_eq!(queue.active_id(), None);
        assert_eq!(claimed_id(queue.claim_next()), "q1");
    }

    #[test]
    fn terminal_items_cannot_be_reactivated() {
        let mut queue = CommandQueue::new(10);
        queue.enqueue(item(0));
        queue.mark_finished("q0", QueueStatus::Done);
        assert_eq!(queue.claim_next(), None);
        assert_eq!(queue.active_id(), None);
    }

    #[test]
    fn consumer_claim_is_idempotent() {
        let mut queue = CommandQueue::new(10);
        assert!(queue.try_claim_consumer());
        assert!(!queue.try_claim_consumer());
        queue.release_consumer();
        assert!(!queue.consumer_running());
        assert!(queue.try_claim_consumer());
    }

    #[test]
    fn finishing_an_evicted_item_clears_the_marker() {
        let mut queue = CommandQueue::new(1);
        queue.enqueue(item(0));
        assert_eq!(claimed_id(queue.claim_next()), "q0");
        queue.enqueue(item(1));
        queue.mark_finished("q0", QueueStatus::Done);
        assert_eq!(queue.active_id(), None);
        assert_eq!(ids(&queue), vec!["q1"]);
        assert_eq!(queue.iter().next().unwrap().status, QueueStatus::Queued);
    }

    #[tokio::test(start_paused = true)]
    async fn unparsable_item_errors_and_the_next_one_runs_at_once() {
        use crate::test_utils::helpers::*;
        use crate::services::chat_service::PipelineConfig;

        let p = test_pipeline(PipelineConfig::default(), RecordingExecutor::new(), ScriptedResolver::new());
        {
            let mut state = p.service.state.lock();
            state.queue.enqueue(QueueItem::new("bad".into(), "did:plc:a", "a+b+up", Utc::now(), None));
            state.queue.enqueue(QueueItem::new("good".into(), "did:plc:a", "up", Utc::now(), None));
        }
        let started = tokio::time::Instant::now();
        p.service.wake_consumer();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let snapshot = p.service.snapshot();
        let statuses: Vec<(&str, QueueStatus)> =
            snapshot.queue.iter().map(|i| (i.id.as_str(), i.status)).collect();
        assert_eq!(statuses, vec![("bad", QueueStatus::Error), ("good", QueueStatus::Done)]);
        assert_eq!(p.executor.pressed(), vec!["up"]);
        assert_eq!(p.executor.dispatches()[0].at, started);
        assert!(!p.service.state.lock().queue.consumer_running());
    }
}
