// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push/poll multiplexer that keeps one ordered, de-duplicated item list.
//!
//! Two producer tasks feed a single reducer over an mpsc channel:
//! - the push task forwards store change events from a [`Subscription`];
//! - the poll task queries the store for items at or after the newest
//!   timestamp it has itself fetched, on an adaptive timer ([`PollBackoff`]).
//!
//! Timestamps are stamped before commit, so a pushed item can be newer than a
//! row that has yet to land. Pushed items never move the poll cursor.
//!
//! Polling runs whether or not push is healthy, so a dead subscription only
//! costs latency. The reducer merges by id and notifies a [`MergeObserver`]
//! with whatever was actually new.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use concierge_config::model::PollProfile;
use concierge_core::{
    ChangeEvent, ChangeFilter, ConciergeError, ConversationStore, Message, Notification,
    Subscription,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::PollBackoff;

/// An immutable record with a unique id and a creation time.
pub trait FeedItem: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
}

impl FeedItem for Message {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl FeedItem for Notification {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Items ordered by `created_at`, unique by id.
///
/// Items sharing a timestamp keep the order in which they were first merged.
#[derive(Debug, Clone)]
pub struct MergedLog<T> {
    items: Vec<T>,
    ids: HashSet<String>,
}

impl<T: FeedItem> Default for MergedLog<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            ids: HashSet::new(),
        }
    }
}

impl<T: FeedItem> MergedLog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
        let mut log = Self::new();
        for item in items {
            log.merge(item);
        }
        log
    }

    /// Inserts `item` unless its id is already present. Returns whether it was new.
    pub fn merge(&mut self, item: T) -> bool {
        if self.ids.contains(item.id()) {
            return false;
        }
        self.ids.insert(item.id().to_string());
        let at = item.created_at();
        let pos = self.items.partition_point(|existing| existing.created_at() <= at);
        self.items.insert(pos, item);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Newest `created_at` held.
    pub fn latest_created_at(&self) -> Option<DateTime<Utc>> {
        self.items.last().map(FeedItem::created_at)
    }
}

/// Which producer delivered a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryChannel {
    Push,
    Poll,
}

/// A store-backed stream of items for one scope (a conversation, a user).
#[async_trait]
pub trait FeedSource: Send + Sync + 'static {
    type Item: FeedItem;

    /// Label used in log lines.
    fn describe(&self) -> String;

    /// Subscribes to the store's push feed for this scope.
    fn subscribe(&self) -> Subscription;

    /// Picks this feed's item out of a change event.
    fn extract(&self, event: ChangeEvent) -> Option<Self::Item>;

    /// Items created at or after `since`; everything when `None`.
    async fn fetch_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Self::Item>, ConciergeError>;
}

/// Messages of one conversation.
pub struct MessageSource {
    store: Arc<dyn ConversationStore>,
    conversation_id: String,
}

impl MessageSource {
    pub fn new(store: Arc<dyn ConversationStore>, conversation_id: impl Into<String>) -> Self {
        Self {
            store,
            conversation_id: conversation_id.into(),
        }
    }
}

#[async_trait]
impl FeedSource for MessageSource {
    type Item = Message;

    fn describe(&self) -> String {
        format!("messages:{}", self.conversation_id)
    }

    fn subscribe(&self) -> Subscription {
        self.store.subscribe(ChangeFilter::Messages {
            conversation_id: self.conversation_id.clone(),
        })
    }

    fn extract(&self, event: ChangeEvent) -> Option<Message> {
        match event {
            ChangeEvent::MessageInserted(msg) if msg.conversation_id == self.conversation_id => {
                Some(msg)
            }
            _ => None,
        }
    }

    async fn fetch_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, ConciergeError> {
        match since {
            Some(since) => self.store.messages_since(&self.conversation_id, since).await,
            None => self.store.messages(&self.conversation_id).await,
        }
    }
}

/// Notifications addressed to one user.
pub struct NotificationSource {
    store: Arc<dyn ConversationStore>,
    user_id: String,
}

impl NotificationSource {
    pub fn new(store: Arc<dyn ConversationStore>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl FeedSource for NotificationSource {
    type Item = Notification;

    fn describe(&self) -> String {
        format!("notifications:{}", self.user_id)
    }

    fn subscribe(&self) -> Subscription {
        self.store.subscribe(ChangeFilter::Notifications {
            user_id: self.user_id.clone(),
        })
    }

    fn extract(&self, event: ChangeEvent) -> Option<Notification> {
        match event {
            ChangeEvent::NotificationInserted(n) if n.user_id == self.user_id => Some(n),
            _ => None,
        }
    }

    async fn fetch_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Notification>, ConciergeError> {
        self.store.notifications_since(&self.user_id, since).await
    }
}

/// Receives every merge that added at least one item.
///
/// Runs on the reducer task; keep it short and never block.
pub trait MergeObserver<T>: Send + 'static {
    fn on_merged(&mut self, fresh: &[T], channel: DeliveryChannel, all: &[T]);
}

impl<T, F> MergeObserver<T> for F
where
    F: FnMut(&[T], DeliveryChannel, &[T]) + Send + 'static,
{
    fn on_merged(&mut self, fresh: &[T], channel: DeliveryChannel, all: &[T]) {
        self(fresh, channel, all)
    }
}

enum Inbound<T> {
    Pushed(T),
    Polled {
        items: Vec<T>,
        /// Number of items that were new, for the poll task's backoff.
        ack: oneshot::Sender<usize>,
    },
}

/// Running push/poll feed. Dropping it cancels and aborts every task.
pub struct ChannelMultiplexer {
    label: String,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ChannelMultiplexer {
    /// Starts the reducer, push and poll tasks.
    ///
    /// `initial` seeds the log (usually the history just loaded) and sets the
    /// first poll cursor. The push subscription is taken before this returns,
    /// so no committed change after `start` is missed by both producers.
    pub fn start<S, O>(
        source: Arc<S>,
        initial: Vec<S::Item>,
        profile: &PollProfile,
        observer: O,
    ) -> Self
    where
        S: FeedSource,
        O: MergeObserver<S::Item>,
    {
        let label = source.describe();
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(64);
        let log = MergedLog::from_items(initial);
        let since = log.latest_created_at();
        let subscription = source.subscribe();

        let tasks = vec![
            tokio::spawn(run_reducer(log, rx, observer, cancel.clone())),
            tokio::spawn(run_push(
                Arc::clone(&source),
                subscription,
                tx.clone(),
                cancel.clone(),
            )),
            tokio::spawn(run_poll(
                source,
                PollBackoff::from_profile(profile),
                since,
                tx,
                cancel.clone(),
            )),
        ];

        debug!(feed = %label, "multiplexer started");
        Self {
            label,
            cancel,
            tasks,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether every task has exited.
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(JoinHandle::is_finished)
    }

    /// Cancels the feed and waits for its tasks to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for handle in self.tasks.drain(..) {
            if let Err(e) = handle.await
                && !e.is_cancelled()
            {
                warn!(feed = %self.label, error = %e, "multiplexer task panicked");
            }
        }
        debug!(feed = %self.label, "multiplexer stopped");
    }
}

impl Drop for ChannelMultiplexer {
    fn drop(&mut self) {
        self.cancel.cancel();
        for handle in &self.tasks {
            handle.abort();
        }
    }
}

async fn run_reducer<T, O>(
    mut log: MergedLog<T>,
    mut rx: mpsc::Receiver<Inbound<T>>,
    mut observer: O,
    cancel: CancellationToken,
) where
    T: FeedItem,
    O: MergeObserver<T>,
{
    loop {
        let inbound = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            inbound = rx.recv() => match inbound {
                Some(inbound) => inbound,
                None => break,
            },
        };

        match inbound {
            Inbound::Pushed(item) => {
                if log.merge(item.clone()) {
                    observer.on_merged(
                        std::slice::from_ref(&item),
                        DeliveryChannel::Push,
                        log.items(),
                    );
                }
            }
            Inbound::Polled { items, ack } => {
                let mut fresh = Vec::new();
                for item in items {
                    if log.merge(item.clone()) {
                        fresh.push(item);
                    }
                }
                if !fresh.is_empty() {
                    observer.on_merged(&fresh, DeliveryChannel::Poll, log.items());
                }
                // The poll task may already be gone during teardown.
                let _ = ack.send(fresh.len());
            }
        }
    }
}

async fn run_push<S: FeedSource>(
    source: Arc<S>,
    mut subscription: Subscription,
    tx: mpsc::Sender<Inbound<S::Item>>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = subscription.recv() => event,
        };
        let Some(event) = event else {
            info!(feed = %source.describe(), "push feed ended; polling continues alone");
            break;
        };
        if let Some(item) = source.extract(event)
            && tx.send(Inbound::Pushed(item)).await.is_err()
        {
            break;
        }
    }
}

async fn run_poll<S: FeedSource>(
    source: Arc<S>,
    mut backoff: PollBackoff,
    mut since: Option<DateTime<Utc>>,
    tx: mpsc::Sender<Inbound<S::Item>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(backoff.current()) => {}
        }

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            fetched = source.fetch_since(since) => fetched,
        };

        let fresh = match fetched {
            Ok(items) if items.is_empty() => 0,
            Ok(items) => {
                since = since.max(items.iter().map(FeedItem::created_at).max());
                let (ack_tx, ack_rx) = oneshot::channel();
                if tx.send(Inbound::Polled { items, ack: ack_tx }).await.is_err() {
                    break;
                }
                match ack_rx.await {
                    Ok(fresh) => fresh,
                    Err(_) => break,
                }
            }
            Err(e) => {
                warn!(feed = %source.describe(), error = %e, "poll failed; backing off");
                0
            }
        };

        let next = backoff.record(fresh > 0);
        debug!(
            feed = %source.describe(),
            fresh,
            next_poll_ms = next.as_millis() as u64,
            "poll complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::TimeZone;
    use concierge_core::SenderType;
    use proptest::prelude::*;
    use tokio::sync::broadcast;

    use super::*;

    /// In-memory source with a switchable push feed and injectable poll failures.
    struct FakeSource {
        items: Mutex<Vec<Message>>,
        changes: broadcast::Sender<ChangeEvent>,
        polls: AtomicUsize,
        fail_polls: AtomicBool,
    }

    impl FakeSource {
        fn new() -> Arc<Self> {
            let (changes, _) = broadcast::channel(16);
            Arc::new(Self {
                items: Mutex::new(Vec::new()),
                changes,
                polls: AtomicUsize::new(0),
                fail_polls: AtomicBool::new(false),
            })
        }

        /// Stores `msg`; publishes it only when `push` is set.
        fn insert(&self, msg: &Message, push: bool) {
            self.items.lock().unwrap().push(msg.clone());
            if push {
                let _ = self.changes.send(ChangeEvent::MessageInserted(msg.clone()));
            }
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FeedSource for FakeSource {
        type Item = Message;

        fn describe(&self) -> String {
            "fake".into()
        }

        fn subscribe(&self) -> Subscription {
            Subscription::new(
                self.changes.subscribe(),
                ChangeFilter::Messages {
                    conversation_id: "c1".into(),
                },
            )
        }

        fn extract(&self, event: ChangeEvent) -> Option<Message> {
            match event {
                ChangeEvent::MessageInserted(m) => Some(m),
                _ => None,
            }
        }

        async fn fetch_since(
            &self,
            since: Option<DateTime<Utc>>,
        ) -> Result<Vec<Message>, ConciergeError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            if self.fail_polls.load(Ordering::SeqCst) {
                return Err(ConciergeError::Internal("store offline".into()));
            }
            let items = self.items.lock().unwrap();
            Ok(items
                .iter()
                .filter(|m| since.is_none_or(|s| m.created_at >= s))
                .cloned()
                .collect())
        }
    }

    type Merge = (Vec<String>, DeliveryChannel, usize);

    fn recording_observer() -> (
        impl MergeObserver<Message>,
        mpsc::UnboundedReceiver<Merge>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = move |fresh: &[Message], channel: DeliveryChannel, all: &[Message]| {
            let ids = fresh.iter().map(|m| m.content.clone()).collect();
            let _ = tx.send((ids, channel, all.len()));
        };
        (observer, rx)
    }

    fn msg(content: &str) -> Message {
        Message::text("c1", SenderType::Guest, None, "Guest", content)
    }

    fn msg_at(content: &str, secs: u32) -> Message {
        let mut m = msg(content);
        m.id = content.to_string();
        m.created_at = Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, secs).unwrap();
        m
    }

    #[tokio::test(start_paused = true)]
    async fn pushed_item_is_merged_without_waiting_for_a_poll() {
        let source = FakeSource::new();
        let (observer, mut merges) = recording_observer();
        let mux = ChannelMultiplexer::start(
            Arc::clone(&source),
            vec![],
            &PollProfile::conversation(),
            observer,
        );

        source.insert(&msg("hello"), true);
        let (ids, channel, total) = merges.recv().await.unwrap();
        assert_eq!(ids, ["hello"]);
        assert_eq!(channel, DeliveryChannel::Push);
        assert_eq!(total, 1);
        assert_eq!(source.polls(), 0);

        mux.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn poll_delivers_what_push_missed() {
        let source = FakeSource::new();
        let (observer, mut merges) = recording_observer();
        let mux = ChannelMultiplexer::start(
            Arc::clone(&source),
            vec![],
            &PollProfile::conversation(),
            observer,
        );

        source.insert(&msg("quiet"), false);
        let (ids, channel, _) = merges.recv().await.unwrap();
        assert_eq!(ids, ["quiet"]);
        assert_eq!(channel, DeliveryChannel::Poll);
        assert_eq!(source.polls(), 1);

        mux.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn item_seen_on_both_channels_is_merged_once() {
        let source = FakeSource::new();
        let (observer, mut merges) = recording_observer();
        let mux = ChannelMultiplexer::start(
            Arc::clone(&source),
            vec![],
            &PollProfile::conversation(),
            observer,
        );

        source.insert(&msg("twice"), true);
        merges.recv().await.unwrap();

        // The next poll returns the same row again.
        tokio::time::sleep(Duration::from_millis(3_100)).await;
        assert_eq!(source.polls(), 1);
        assert!(merges.try_recv().is_err());

        mux.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn empty_polls_back_off_and_new_items_reset_the_interval() {
        let source = FakeSource::new();
        let (observer, mut merges) = recording_observer();
        let mux = ChannelMultiplexer::start(
            Arc::clone(&source),
            vec![msg("seed")],
            &PollProfile::conversation(),
            observer,
        );

        // Polls at 3s, 7.5s, 14.25s, 24.375s, then every 15s.
        tokio::time::sleep(Duration::from_millis(3_010)).await;
        assert_eq!(source.polls(), 1);
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        assert_eq!(source.polls(), 2);
        tokio::time::sleep(Duration::from_millis(6_750)).await;
        assert_eq!(source.polls(), 3);
        tokio::time::sleep(Duration::from_millis(10_125)).await;
        assert_eq!(source.polls(), 4);
        tokio::time::sleep(Duration::from_millis(15_000)).await;
        assert_eq!(source.polls(), 5);
        tokio::time::sleep(Duration::from_millis(15_000)).await;
        assert_eq!(source.polls(), 6);

        // Found on the next capped poll, then back to the 3s base.
        source.insert(&msg("late"), false);
        tokio::time::sleep(Duration::from_millis(15_000)).await;
        assert_eq!(source.polls(), 7);
        let (ids, _, _) = merges.recv().await.unwrap();
        assert_eq!(ids, ["late"]);
        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert_eq!(source.polls(), 8);

        mux.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_polls_count_as_nothing_new() {
        let source = FakeSource::new();
        source.fail_polls.store(true, Ordering::SeqCst);
        let (observer, _merges) = recording_observer();
        let mux = ChannelMultiplexer::start(
            Arc::clone(&source),
            vec![],
            &PollProfile::conversation(),
            observer,
        );

        tokio::time::sleep(Duration::from_millis(7_510)).await;
        assert_eq!(source.polls(), 2, "second poll waits the grown interval");

        // Recovery resets nothing until something is actually found.
        source.fail_polls.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(6_750)).await;
        assert_eq!(source.polls(), 3);

        mux.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn push_loss_falls_back_to_polling() {
        let (observer, mut merges) = recording_observer();
        let source = FakeSource::new();
        let mux = ChannelMultiplexer::start(
            Arc::clone(&source),
            vec![],
            &PollProfile::conversation(),
            observer,
        );

        // Items inserted while "push" is down still arrive.
        for text in ["a", "b"] {
            source.insert(&msg(text), false);
        }
        let (ids, channel, total) = merges.recv().await.unwrap();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(channel, DeliveryChannel::Poll);
        assert_eq!(total, 2);

        mux.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_poll_runs_after_shutdown() {
        let source = FakeSource::new();
        let (observer, _merges) = recording_observer();
        let mux = ChannelMultiplexer::start(
            Arc::clone(&source),
            vec![],
            &PollProfile::conversation(),
            observer,
        );
        tokio::time::sleep(Duration::from_millis(3_010)).await;
        assert_eq!(source.polls(), 1);

        mux.shutdown().await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.polls(), 1);
        assert_eq!(source.changes.receiver_count(), 0, "subscription released");
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_multiplexer_stops_its_tasks() {
        let source = FakeSource::new();
        let (observer, _merges) = recording_observer();
        let mux = ChannelMultiplexer::start(
            Arc::clone(&source),
            vec![],
            &PollProfile::conversation(),
            observer,
        );
        drop(mux);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.polls(), 0);
        assert_eq!(source.changes.receiver_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pushed_item_does_not_hide_an_earlier_row_committed_later() {
        let source = FakeSource::new();
        let (observer, mut merges) = recording_observer();
        let mux = ChannelMultiplexer::start(
            Arc::clone(&source),
            vec![msg_at("seed", 1)],
            &PollProfile::conversation(),
            observer,
        );

        source.insert(&msg_at("later", 10), true);
        let (ids, channel, _) = merges.recv().await.unwrap();
        assert_eq!((ids, channel), (vec!["later".to_string()], DeliveryChannel::Push));

        // Stamped before "later" but committed after it, with no push event.
        source.insert(&msg_at("earlier", 5), false);
        let (ids, channel, total) = merges.recv().await.unwrap();
        assert_eq!(ids, ["earlier"]);
        assert_eq!(channel, DeliveryChannel::Poll);
        assert_eq!(total, 3);

        mux.shutdown().await;
    }

    #[test]
    fn ties_keep_arrival_order() {
        let mut log = MergedLog::new();
        assert!(log.merge(msg_at("b", 5)));
        assert!(log.merge(msg_at("a", 5)));
        assert!(log.merge(msg_at("early", 1)));
        assert!(!log.merge(msg_at("a", 5)));
        let order: Vec<_> = log.items().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(order, ["early", "b", "a"]);
        assert_eq!(log.latest_created_at(), Some(msg_at("b", 5).created_at));
    }

    proptest! {
        #[test]
        fn merged_log_is_sorted_unique_and_idempotent(
            arrivals in proptest::collection::vec(0u8..12, 0..60),
        ) {
            // Each id always carries the same timestamp, as real rows do.
            let items: Vec<Message> = arrivals
                .iter()
                .map(|id| msg_at(&format!("m{id}"), u32::from(*id) % 6))
                .collect();

            let mut log = MergedLog::new();
            for item in &items {
                log.merge(item.clone());
            }

            let ids: HashSet<_> = items.iter().map(|m| m.id.clone()).collect();
            prop_assert_eq!(log.len(), ids.len());
            prop_assert!(log.items().windows(2).all(|w| w[0].created_at <= w[1].created_at));

            let before: Vec<_> = log.items().iter().map(|m| m.id.clone()).collect();
            for item in &items {
                prop_assert!(!log.merge(item.clone()));
            }
            let after: Vec<_> = log.items().iter().map(|m| m.id.clone()).collect();
            prop_assert_eq!(before, after);
        }
    }
}
