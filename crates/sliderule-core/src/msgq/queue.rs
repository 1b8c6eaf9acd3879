//! `QueueState`: the shared, named queue behind every `Publisher`/`Subscriber`
//! pair (spec §3.3–§3.5, §4.3.1–§4.3.5).
//!
//! Payload sharing uses `Arc<[u8]>` rather than the original's `data`
//! pointer plus caller-supplied `free_func`: cloning the `Arc` for a
//! `receive_ref` is the zero-copy fan-out the spec asks for, and Rust's
//! `Drop` is the free hook, so there is no separate teardown callback to
//! thread through `QueueState`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::dictionary::Dictionary;

use super::error::{QState, Timeout};

const DEFAULT_MAX_SUBSCRIBERS: usize = 8;
const FREE_STACK_CAP: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberType {
    Unsubscribed,
    /// Never skipped: a full queue blocks/`Timeout`s the publisher until a
    /// confidence subscriber has consumed room.
    Confidence,
    /// Fast-forwarded past undelivered nodes when the queue is full and a
    /// confidence subscriber still needs room (spec §4.3.4's "opportunistic
    /// subscriber" fast-forward).
    Opportunity,
}

struct QueueNode {
    payload: Arc<[u8]>,
    refs: i32,
}

struct Inner {
    nodes: VecDeque<QueueNode>,
    /// Global post-ordinal of `nodes.front()`. `base_index + nodes.len() ==
    /// next_index` always holds.
    base_index: u64,
    next_index: u64,
    subscriber_type: Vec<SubscriberType>,
    curr_index: Vec<u64>,
    soo_count: usize,
    subscriptions: usize,
    attachments: usize,
}

impl Inner {
    fn node_at(&self, global_index: u64) -> Option<usize> {
        if global_index < self.base_index || global_index >= self.next_index {
            return None;
        }
        Some((global_index - self.base_index) as usize)
    }
}

/// `depth == 0` means unbounded (spec §3.4, §6.4's `DEFAULT_STANDARD_QUEUE_DEPTH`),
/// so a capacity/reclaim test only applies when `depth` is a real bound.
fn at_capacity(len: usize, depth: usize) -> bool {
    depth != 0 && len >= depth
}

/// A named, ref-counted queue. Reached through `Arc<QueueState>` handles
/// held by `Publisher`/`Subscriber`; the last handle to drop removes the
/// queue from the process registry (spec §3.1: "constructing with a name
/// already present increments attachments ... dropping decrements it").
pub struct QueueState {
    name: String,
    depth: usize,
    max_data_size: usize,
    inner: Mutex<Inner>,
    ready_to_recv: Condvar,
    ready_to_post: Condvar,
}

impl QueueState {
    fn new(name: String, depth: usize, max_data_size: usize) -> Self {
        Self {
            name,
            depth,
            max_data_size,
            inner: Mutex::new(Inner {
                nodes: VecDeque::new(),
                base_index: 0,
                next_index: 0,
                subscriber_type: vec![SubscriberType::Unsubscribed; DEFAULT_MAX_SUBSCRIBERS],
                curr_index: vec![0; DEFAULT_MAX_SUBSCRIBERS],
                soo_count: 0,
                subscriptions: 0,
                attachments: 0,
            }),
            ready_to_recv: Condvar::new(),
            ready_to_post: Condvar::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `0` means unbounded — `post` never blocks or returns `Full` on this
    /// queue.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn max_data_size(&self) -> usize {
        self.max_data_size
    }

    #[must_use]
    pub fn depth_used(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    #[must_use]
    pub fn subscriptions(&self) -> usize {
        self.inner.lock().subscriptions
    }

    pub(crate) fn subscribe(&self, kind: SubscriberType) -> usize {
        let mut inner = self.inner.lock();
        let slot = inner
            .subscriber_type
            .iter()
            .position(|t| *t == SubscriberType::Unsubscribed);
        let index = match slot {
            Some(i) => i,
            None => {
                // Table exhausted: double it (spec §4.3.5).
                let old_len = inner.subscriber_type.len();
                inner.subscriber_type.resize(old_len * 2, SubscriberType::Unsubscribed);
                inner.curr_index.resize(old_len * 2, inner.next_index);
                old_len
            }
        };
        inner.subscriber_type[index] = kind;
        inner.curr_index[index] = inner.next_index;
        inner.subscriptions += 1;
        if kind == SubscriberType::Opportunity {
            inner.soo_count += 1;
        }
        tracing::debug!(queue = %self.name, index, ?kind, "subscriber attached");
        index
    }

    pub(crate) fn subscriber_kind(&self, index: usize) -> SubscriberType {
        self.inner.lock().subscriber_type[index]
    }

    pub(crate) fn unsubscribe(&self, index: usize) {
        let mut inner = self.inner.lock();
        if inner.subscriber_type[index] == SubscriberType::Opportunity {
            inner.soo_count = inner.soo_count.saturating_sub(1);
        }
        // Release this subscriber's hold on every node it never reached,
        // mirroring the original's destructor walking curr_nodes[id] to the
        // tail before unregistering — otherwise those nodes' refs stay
        // inflated by one and never reclaim.
        let curr = inner.curr_index[index];
        let next_index = inner.next_index;
        for idx in curr..next_index {
            if let Some(pos) = inner.node_at(idx) {
                inner.nodes[pos].refs -= 1;
            }
        }
        inner.subscriber_type[index] = SubscriberType::Unsubscribed;
        inner.subscriptions = inner.subscriptions.saturating_sub(1);
        reclaim_nodes(&mut inner, self.depth);
        tracing::debug!(queue = %self.name, index, "subscriber detached");
        drop(inner);
        self.ready_to_post.notify_one();
    }

    /// The six-step post contract of spec §4.3.2.
    ///
    /// `swallow_no_subscribers` is the copy-vs-ref distinction from spec §7/§9:
    /// a copy post has nothing for the caller to clean up, so `NoSubscribers`
    /// is promoted to `Ok`; a ref post hands the queue a reference the caller
    /// otherwise owns, so the caller needs the real `NoSubscribers` status
    /// back in order to decide what to do with it.
    pub(crate) fn post(
        &self,
        payload: Arc<[u8]>,
        timeout: Timeout,
        swallow_no_subscribers: bool,
    ) -> Result<(), QState> {
        if payload.len() > self.max_data_size {
            return Err(QState::SizeError);
        }

        let mut inner = self.inner.lock();
        if inner.subscriptions == 0 {
            return if swallow_no_subscribers {
                Ok(())
            } else {
                Err(QState::NoSubscribers)
            };
        }

        let deadline = match timeout {
            Timeout::After(d) => Some(Instant::now() + d),
            _ => None,
        };
        loop {
            if !at_capacity(inner.nodes.len(), self.depth) {
                break;
            }
            reclaim_nodes(&mut inner, self.depth);
            if !at_capacity(inner.nodes.len(), self.depth) {
                break;
            }
            match timeout {
                Timeout::Check => return Err(QState::Full),
                Timeout::Pend => {
                    self.ready_to_post.wait(&mut inner);
                }
                Timeout::After(_) => {
                    let Some(deadline) = deadline else { unreachable!() };
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(QState::Timeout);
                    }
                    let timed_out = self
                        .ready_to_post
                        .wait_for(&mut inner, deadline - now)
                        .timed_out();
                    if timed_out && at_capacity(inner.nodes.len(), self.depth) {
                        return Err(QState::Timeout);
                    }
                }
            }
        }

        let refs = inner.subscriptions as i32;
        inner.nodes.push_back(QueueNode { payload, refs });
        inner.next_index += 1;

        self.ready_to_recv.notify_all();
        if !at_capacity(inner.nodes.len(), self.depth) {
            self.ready_to_post.notify_one();
        }
        Ok(())
    }

    /// Pops the next undelivered node for `subscriber`, returning its
    /// global post-ordinal (used by ref-mode receivers to later call
    /// `dereference`) and a cheap `Arc` clone of its bytes.
    pub(crate) fn receive(
        &self,
        subscriber: usize,
        timeout: Timeout,
    ) -> Result<(u64, Arc<[u8]>), QState> {
        let deadline = match timeout {
            Timeout::After(d) => Some(Instant::now() + d),
            _ => None,
        };
        let mut inner = self.inner.lock();
        loop {
            let idx = inner.curr_index[subscriber].max(inner.base_index);
            if idx < inner.next_index {
                let pos = inner.node_at(idx).expect("index within live node range");
                let payload = inner.nodes[pos].payload.clone();
                inner.curr_index[subscriber] = idx + 1;
                return Ok((idx, payload));
            }
            match timeout {
                Timeout::Check => return Err(QState::Empty),
                Timeout::Pend => {
                    self.ready_to_recv.wait(&mut inner);
                }
                Timeout::After(_) => {
                    let Some(deadline) = deadline else { unreachable!() };
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(QState::Timeout);
                    }
                    let timed_out = self
                        .ready_to_recv
                        .wait_for(&mut inner, deadline - now)
                        .timed_out();
                    if timed_out && inner.curr_index[subscriber] >= inner.next_index {
                        return Err(QState::Timeout);
                    }
                }
            }
        }
    }

    /// Immediately decrements the node's ref count (copy-mode receive, spec
    /// §4.3.3).
    pub(crate) fn dereference(&self, global_index: u64) {
        let mut inner = self.inner.lock();
        if let Some(pos) = inner.node_at(global_index) {
            inner.nodes[pos].refs -= 1;
        }
        reclaim_nodes(&mut inner, self.depth);
        drop(inner);
        self.ready_to_post.notify_one();
    }

    /// Consumes every undelivered node for `subscriber` without processing
    /// it, optionally dereferencing each as it goes (spec §4.3.3's
    /// `drain(with_delete)`). Returns how many nodes were skipped.
    pub(crate) fn drain(&self, subscriber: usize, with_delete: bool) -> usize {
        let mut inner = self.inner.lock();
        let mut count = 0;
        while inner.curr_index[subscriber] < inner.next_index {
            let idx = inner.curr_index[subscriber];
            inner.curr_index[subscriber] = idx + 1;
            if with_delete {
                if let Some(pos) = inner.node_at(idx) {
                    inner.nodes[pos].refs -= 1;
                }
            }
            count += 1;
        }
        reclaim_nodes(&mut inner, self.depth);
        count
    }
}

/// Two-phase reclaim (spec §4.3.4):
/// 1. If an opportunity subscriber exists and the queue is at capacity,
///    fast-forward every opportunity subscriber still sitting on the
///    oldest node, freeing its ref.
/// 2. Pop every node at the front with `refs <= 0`, up to `FREE_STACK_CAP`
///    per call — their `Arc<[u8]>` payload is simply dropped, standing in
///    for the original's deferred `free_func` batch.
fn reclaim_nodes(inner: &mut Inner, depth: usize) {
    if inner.soo_count > 0 && at_capacity(inner.nodes.len(), depth) {
        if let Some(front) = inner.nodes.front() {
            if front.refs > 0 {
                let base = inner.base_index;
                for sub_idx in 0..inner.subscriber_type.len() {
                    if inner.subscriber_type[sub_idx] == SubscriberType::Opportunity
                        && inner.curr_index[sub_idx] == base
                    {
                        inner.curr_index[sub_idx] = base + 1;
                        inner.nodes.front_mut().unwrap().refs -= 1;
                    }
                }
            }
        }
    }

    let mut freed = 0;
    while freed < FREE_STACK_CAP {
        match inner.nodes.front() {
            Some(front) if front.refs <= 0 => {
                inner.nodes.pop_front();
                inner.base_index += 1;
                freed += 1;
            }
            _ => break,
        }
    }
    if freed > 0 {
        tracing::trace!(freed, "reclaimed queue nodes");
    }
}

type QueueRegistry = Mutex<Dictionary<Arc<QueueState>>>;

fn registry() -> &'static QueueRegistry {
    static REGISTRY: OnceLock<QueueRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Dictionary::new()))
}

/// Global, process-unique counter backing `QueueDisplay`'s diagnostic
/// ordering — not part of the wire protocol, purely a stable sort key for
/// `list_queues` (spec §6.3).
static NEXT_LIST_SEQ: AtomicU64 = AtomicU64::new(0);

/// Looks up `name` in the process-wide queue registry, creating it with
/// `depth`/`max_data_size` if absent, and bumping its attachment count
/// either way (spec §3.1).
pub(crate) fn attach(name: &str, depth: usize, max_data_size: usize) -> Arc<QueueState> {
    let mut reg = registry().lock();
    if let Some(existing) = reg.find(name) {
        existing.inner.lock().attachments += 1;
        return existing.clone();
    }
    let state = Arc::new(QueueState::new(name.to_string(), depth, max_data_size));
    state.inner.lock().attachments = 1;
    reg.add(name, state.clone(), true);
    tracing::info!(queue = name, depth, max_data_size, "queue created");
    state
}

/// Decrements `state`'s attachment count; removes it from the registry once
/// the last handle detaches.
pub(crate) fn detach(state: &Arc<QueueState>) {
    let mut reg = registry().lock();
    let remaining = {
        let mut inner = state.inner.lock();
        inner.attachments = inner.attachments.saturating_sub(1);
        inner.attachments
    };
    if remaining == 0 {
        reg.remove(&state.name);
        tracing::info!(queue = %state.name, "queue destroyed");
    }
}

/// A snapshot row for `sliderule-harness`'s queue-introspection CLI (spec
/// §6.3, ambient).
#[derive(Debug, Clone)]
pub struct QueueDisplay {
    pub name: String,
    pub depth_used: usize,
    pub depth: usize,
    pub subscriptions: usize,
}

#[must_use]
pub fn list_queues() -> Vec<QueueDisplay> {
    let _seq = NEXT_LIST_SEQ.fetch_add(1, Ordering::Relaxed);
    let reg = registry().lock();
    let it = reg.iter();
    let mut out = Vec::with_capacity(it.length());
    for i in 0..it.length() {
        if let Some((name, state)) = it.get(i) {
            out.push(QueueDisplay {
                name: name.to_string(),
                depth_used: state.depth_used(),
                depth: state.depth,
                subscriptions: state.subscriptions(),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_shares_state_and_detach_removes_when_last() {
        let a = attach("q1", 4, 64);
        let b = attach("q1", 4, 64);
        assert!(Arc::ptr_eq(&a, &b));
        detach(&a);
        assert_eq!(list_queues().iter().filter(|q| q.name == "q1").count(), 1);
        detach(&b);
        assert_eq!(list_queues().iter().filter(|q| q.name == "q1").count(), 0);
    }

    #[test]
    fn post_without_subscribers_is_not_an_error_when_swallowed() {
        let q = attach("q2", 2, 64);
        assert!(q.post(Arc::from(vec![1u8, 2, 3]), Timeout::Check, true).is_ok());
        detach(&q);
    }

    #[test]
    fn post_without_subscribers_is_reported_when_not_swallowed() {
        let q = attach("q2b", 2, 64);
        assert_eq!(
            q.post(Arc::from(vec![1u8, 2, 3]), Timeout::Check, false),
            Err(QState::NoSubscribers)
        );
        detach(&q);
    }

    #[test]
    fn post_over_max_data_size_is_rejected() {
        let q = attach("q3", 2, 2);
        let sub = q.subscribe(SubscriberType::Confidence);
        assert_eq!(
            q.post(Arc::from(vec![1u8, 2, 3]), Timeout::Check, true),
            Err(QState::SizeError)
        );
        q.unsubscribe(sub);
        detach(&q);
    }

    #[test]
    fn full_queue_with_check_timeout_returns_full() {
        let q = attach("q4", 1, 64);
        let sub = q.subscribe(SubscriberType::Confidence);
        q.post(Arc::from(vec![1u8]), Timeout::Check, true).unwrap();
        assert_eq!(
            q.post(Arc::from(vec![2u8]), Timeout::Check, true),
            Err(QState::Full)
        );
        q.unsubscribe(sub);
        detach(&q);
    }

    #[test]
    fn receive_then_dereference_frees_room() {
        let q = attach("q5", 1, 64);
        let sub = q.subscribe(SubscriberType::Confidence);
        q.post(Arc::from(vec![9u8]), Timeout::Check, true).unwrap();
        let (idx, bytes) = q.receive(sub, Timeout::Check).unwrap();
        assert_eq!(&*bytes, &[9u8]);
        q.dereference(idx);
        assert!(q.post(Arc::from(vec![10u8]), Timeout::Check, true).is_ok());
        q.unsubscribe(sub);
        detach(&q);
    }

    #[test]
    fn opportunity_subscriber_is_fast_forwarded_when_full() {
        let q = attach("q6", 1, 64);
        let confidence = q.subscribe(SubscriberType::Confidence);
        let opportunity = q.subscribe(SubscriberType::Opportunity);
        q.post(Arc::from(vec![1u8]), Timeout::Check, true).unwrap();
        // The opportunity subscriber never reads; the confidence subscriber
        // hasn't read either, but reclaim should still advance the
        // opportunistic cursor so a second post can proceed once the
        // confidence subscriber also catches up is not required here.
        let _ = q.receive(confidence, Timeout::Check).unwrap();
        assert!(q.post(Arc::from(vec![2u8]), Timeout::Check, true).is_ok());
        q.unsubscribe(confidence);
        q.unsubscribe(opportunity);
        detach(&q);
    }

    #[test]
    fn zero_depth_queue_is_unbounded() {
        let q = attach("q7", 0, 64);
        let sub = q.subscribe(SubscriberType::Confidence);
        for seq in 0u8..50 {
            q.post(Arc::from(vec![seq]), Timeout::Check, true).unwrap();
        }
        for expected in 0u8..50 {
            let (idx, bytes) = q.receive(sub, Timeout::Check).unwrap();
            assert_eq!(&*bytes, &[expected]);
            q.dereference(idx);
        }
        q.unsubscribe(sub);
        detach(&q);
    }

    #[test]
    fn unsubscribe_releases_undelivered_node_refs() {
        let q = attach("q8", 1, 64);
        let sub_a = q.subscribe(SubscriberType::Confidence);
        let sub_b = q.subscribe(SubscriberType::Confidence);
        q.post(Arc::from(vec![1u8]), Timeout::Check, true).unwrap();

        // sub_b never reads the node it's holding a ref against; dropping its
        // subscription must release that ref so the queue isn't pinned full
        // forever once sub_a also catches up.
        q.unsubscribe(sub_b);
        let (idx, _) = q.receive(sub_a, Timeout::Check).unwrap();
        q.dereference(idx);
        assert!(q.post(Arc::from(vec![2u8]), Timeout::Check, true).is_ok());
        q.unsubscribe(sub_a);
        detach(&q);
    }
}
