//! The chat-plays pipeline as one service object.
//!
//! Owns the chat history, command queue, activity window and identity cache.
//! All of them sit behind one short-held lock that is never held across an
//! await; every mutation publishes its snapshot before the lock is released,
//! so listeners never see a half-applied change.

use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use chatplays_common::models::{
    ChatMessage, Identity, InboundChat, OverlaySnapshot, ParsedCommand, QueueItem,
};
use crate::cache::identity_cache::{IdentityCache, IDENTITY_TTL_MINUTES};
use crate::cache::message_cache::{ChatHistory, DEFAULT_CHAT_CAPACITY};
use crate::clock::{Clock, IdGenerator, SystemClock, UuidGenerator};
use crate::eventbus::{ListenerId, OverlayBroadcaster};
use crate::platforms::{CommandExecutor, IdentityResolver};
use super::activity_tracker::{ActivityTracker, ACTIVITY_WINDOW_MINUTES, REPEAT_GATE_THRESHOLD};
use super::command_parser::parse_command;
use super::command_queue::{CommandQueue, COMMAND_DELAY, DEFAULT_QUEUE_CAPACITY, REPEAT_DELAY};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// When set, records posted to any other stream are ignored.
    pub streamer: Option<String>,
    pub chat_capacity: usize,
    pub queue_capacity: usize,
    /// Pause after each dispatched command.
    pub command_delay: Duration,
    /// Spacing between the extra presses of an `xN` command.
    pub repeat_delay: Duration,
    pub activity_window: chrono::Duration,
    pub repeat_gate_threshold: usize,
    pub identity_ttl: chrono::Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            streamer: None,
            chat_capacity: DEFAULT_CHAT_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            command_delay: COMMAND_DELAY,
            repeat_delay: REPEAT_DELAY,
            activity_window: chrono::Duration::minutes(ACTIVITY_WINDOW_MINUTES),
            repeat_gate_threshold: REPEAT_GATE_THRESHOLD,
            identity_ttl: chrono::Duration::minutes(IDENTITY_TTL_MINUTES),
        }
    }
}

/// Everything that ends up on the overlay.
#[derive(Debug)]
pub struct PipelineState {
    pub chat: ChatHistory,
    pub queue: CommandQueue,
    pub activity: ActivityTracker,
}

impl PipelineState {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            chat: ChatHistory::new(config.chat_capacity),
            queue: CommandQueue::new(config.queue_capacity),
            activity: ActivityTracker::new(config.activity_window, config.repeat_gate_threshold),
        }
    }

    pub fn snapshot(&self, now: chrono::DateTime<chrono::Utc>) -> OverlaySnapshot {
        OverlaySnapshot {
            chat: self.chat.to_vec(),
            queue: self.queue.to_vec(),
            active_command_id: self.queue.active_id().map(String::from),
            spam_ability: self.activity.spam_ability(now),
        }
    }

    /// Patches display fields of every stored entry from `identity`.
    pub fn apply_identity(&mut self, identity: &Identity) -> bool {
        let chat_changed = self.chat.apply_identity(identity);
        let queue_changed = self.queue.apply_identity(identity);
        chat_changed || queue_changed
    }
}

pub struct ChatPlaysService {
    pub(crate) config: PipelineConfig,
    pub(crate) state: Mutex<PipelineState>,
    pub(crate) identities: IdentityCache,
    pub(crate) broadcaster: OverlayBroadcaster,
    pub(crate) executor: Arc<dyn CommandExecutor>,
    pub(crate) resolver: Arc<dyn IdentityResolver>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGenerator>,
}

impl ChatPlaysService {
    pub fn new(
        config: PipelineConfig,
        executor: Arc<dyn CommandExecutor>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        debug!("Initializing ChatPlaysService with {:?}", config);
        Self {
            state: Mutex::new(PipelineState::new(&config)),
            identities: IdentityCache::new(config.identity_ttl),
            broadcaster: OverlayBroadcaster::new(),
            executor,
            resolver,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn identity_cache(&self) -> &IdentityCache {
        &self.identities
    }

    /// Handles one chat record:
    ///  1. ignores records for other streams and blank text,
    ///  2. counts the chatter and decides whether `xN` repeats are allowed,
    ///  3. caches any identity the record carried,
    ///  4. stores the chat line and, if it parsed, queues the command,
    ///  5. schedules repeats, wakes the consumer and kicks off identity lookup.
    ///
    /// Returns the parsed command, if any.
    pub fn ingest(self: &Arc<Self>, record: InboundChat) -> Option<ParsedCommand> {
        if let Some(streamer) = self.config.streamer.as_deref() {
            if !record.belongs_to_stream(streamer) {
                trace!("ignoring record for another stream: {:?}", record.streamer);
                return None;
            }
        }
        let text = record.text.trim();
        if text.is_empty() {
            return None;
        }
        let now = self.clock.now();

        if let Some(hint) = record.hint.clone() {
            self.identities.store_hint(hint, now);
        }
        let identity = self.identities.fresh(&record.participant_id, now);

        let parsed = {
            let mut state = self.state.lock();
            let unique_chatters = state.activity.record(&record.participant_id, now);
            let repeats_allowed = state.activity.gate_open(unique_chatters);
            let parsed = parse_command(text, repeats_allowed);

            state.chat.push(ChatMessage::new(
                self.ids.next_id(),
                &record.participant_id,
                text,
                parsed.is_some(),
                now,
                identity.as_ref(),
            ));
            if let Some(command) = &parsed {
                state.queue.enqueue(QueueItem::new(
                    self.ids.next_id(),
                    &record.participant_id,
                    &command.normalized,
                    now,
                    identity.as_ref(),
                ));
            }
            self.publish_locked(&state);
            parsed
        };

        match &parsed {
            Some(command) => {
                debug!(
                    "queued '{}' x{} from {}",
                    command.normalized, command.repeat_count, record.participant_id
                );
                self.schedule_repeats(&record.participant_id, command);
                self.wake_consumer();
            }
            None => trace!("not a command: {:?}", text),
        }

        self.resolve_identity(&record.participant_id);
        parsed
    }

    /// Refreshes display info for `participant_id`. Uses the cache when it
    /// can; otherwise starts one background lookup, unless one is running.
    pub fn resolve_identity(self: &Arc<Self>, participant_id: &str) {
        let now = self.clock.now();
        if let Some(identity) = self.identities.fresh(participant_id, now) {
            self.apply_identity(&identity);
            return;
        }
        let Some(guard) = self.identities.try_begin(participant_id) else {
            trace!("identity lookup for {} already in flight", participant_id);
            return;
        };

        let service = Arc::clone(self);
        tokio::spawn(async move {
            let participant_id = guard.participant_id().to_string();
            match service.resolver.resolve(&participant_id).await {
                Ok(Some(identity)) => {
                    let identity = Identity {
                        participant_id: participant_id.clone(),
                        ..identity
                    };
                    if service.identities.store(identity.clone(), service.clock.now()) {
                        service.apply_identity(&identity);
                    }
                }
                Ok(None) => debug!("no identity found for {}", participant_id),
                Err(e) => warn!("identity lookup for {} failed: {}", participant_id, e),
            }
            drop(guard);
        });
    }

    /// Patches stored entries; publishes only if something changed.
    fn apply_identity(&self, identity: &Identity) -> bool {
        let mut state = self.state.lock();
        let changed = state.apply_identity(identity);
        if changed {
            self.publish_locked(&state);
        }
        changed
    }

    pub fn snapshot(&self) -> OverlaySnapshot {
        self.state.lock().snapshot(self.clock.now())
    }

    /// Registers a listener and returns the state it starts from. Taken under
    /// the state lock so no update can fall between the two.
    pub fn subscribe(
        &self,
        buffer_size: Option<usize>,
    ) -> (ListenerId, OverlaySnapshot, mpsc::Receiver<Arc<OverlaySnapshot>>) {
        let state = self.state.lock();
        let (id, rx) = self.broadcaster.subscribe(buffer_size);
        (id, state.snapshot(self.clock.now()), rx)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.broadcaster.unsubscribe(id)
    }

    pub(crate) fn publish_locked(&self, state: &PipelineState) {
        self.broadcaster.publish(state.snapshot(self.clock.now()));
    }
}
