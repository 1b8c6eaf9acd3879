//! `RecordDispatcher`: an N-worker fan-out node that turns a `Subscriber`
//! into a routed `(key, record) -> handler[]` pipeline stage (spec §3.5,
//! §4.4).

pub mod error;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::dictionary::Dictionary;
use crate::msgq::{Publisher, QState, QueueSize, Subscriber, SubscriberType, Timeout};
use crate::record::{RecordError, RecordObject, RecordRegistry};

pub use error::DispatchError;

/// Constructs the `RecordObject` a worker hands to its handlers, given the
/// bytes received off the input queue (spec §4.4.2 step 2: "a subclass may
/// override [this] to choose a specific record class"). The default,
/// [`default_create_record`], is an ordinary `RecordObject::from_buffer_owned`;
/// a caller that needs a specialized record type for some inputs supplies its
/// own function via [`RecordDispatcher::with_create_record`].
pub type CreateRecordFn =
    fn(&Arc<RecordRegistry>, Vec<u8>) -> Result<RecordObject<'static>, RecordError>;

/// The default [`CreateRecordFn`]: aliases nothing, just parses the header
/// and looks up the definition by name.
pub fn default_create_record(
    registry: &Arc<RecordRegistry>,
    bytes: Vec<u8>,
) -> Result<RecordObject<'static>, RecordError> {
    RecordObject::from_buffer_owned(registry, bytes)
}

/// How long a worker's `receiveRef` waits before treating the input queue as
/// idle and ticking `timeout_list` handlers (spec §4.4.2, named from the
/// original's `RecordDispatcher::DISPATCH_TIMEOUT`).
pub const DISPATCH_TIMEOUT: Duration = Duration::from_millis(1000);

/// A record type name that, when received, causes every worker to terminate
/// after delivering `processTermination()` to its handlers — the "sentinel
/// record" of spec §4.4.2 step 8.
pub const TERMINATION_SENTINEL: &str = "__dispatcher_terminate__";

/// Pure function of `(buffer, size) -> key`, registered by name so a
/// dispatcher can be configured with `KeyMode::Calculated` by string (spec
/// §4.4.4: readers/plugins register these at process init).
pub type KeyCalcFn = fn(&[u8]) -> u64;

fn key_calc_registry() -> &'static Mutex<Dictionary<KeyCalcFn>> {
    static REGISTRY: OnceLock<Mutex<Dictionary<KeyCalcFn>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Dictionary::new()))
}

/// Registers `func` under `name` for later reference by
/// [`KeyMode::Calculated`]. Re-registering a name overwrites the previous
/// function, matching the registry's non-unique `add`.
pub fn register_key_calc(name: &str, func: KeyCalcFn) {
    key_calc_registry().lock().add(name, func, false);
}

#[must_use]
pub fn lookup_key_calc(name: &str) -> Option<KeyCalcFn> {
    key_calc_registry().lock().find(name).copied()
}

/// How a dispatcher derives the monotone ordering key for each record (spec
/// §3.5, §4.4.2 step 3).
#[derive(Clone)]
pub enum KeyMode {
    /// `getValueInteger(field)` on the record's own fields.
    Field(String),
    /// An atomic fetch-add counter local to the dispatcher.
    Receipt,
    /// A named function from the process-wide key-calculator registry,
    /// resolved once at dispatcher construction.
    Calculated(KeyCalcFn),
}

/// A record a handler wants posted downstream, destined for a named queue
/// (spec §4.4.2 step 4: "downstream records ... are posted on the handler's
/// output queue").
pub struct OutgoingRecord {
    pub queue_name: String,
    pub bytes: Arc<[u8]>,
}

impl OutgoingRecord {
    #[must_use]
    pub fn new(queue_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            queue_name: queue_name.into(),
            bytes: Arc::from(bytes),
        }
    }
}

/// A downstream consumer of dispatched records (spec §6.2's "Dispatcher
/// handler").
pub trait DispatchHandler: Send + Sync {
    /// Processes one record, appending any derived records to `out`.
    /// Returning `false` signals a processing error to the caller; the
    /// dispatcher logs it and continues (workers never stop on a handler
    /// error, only on queue termination).
    fn process_record(&self, record: &RecordObject<'_>, key: u64, out: &mut Vec<OutgoingRecord>) -> bool;

    /// Called when a worker's receive times out with no data waiting,
    /// for handlers that registered interest in idle ticks.
    fn process_timeout(&self) {}

    /// Called once per worker thread when the dispatcher terminates.
    fn process_termination(&self) {}
}

type HandlerTable = HashMap<String, Vec<Arc<dyn DispatchHandler>>>;

struct DispatchState {
    registry: Arc<RecordRegistry>,
    table: RwLock<Arc<HandlerTable>>,
    timeout_list: RwLock<Arc<Vec<Arc<dyn DispatchHandler>>>>,
    key_mode: KeyMode,
    key_counter: AtomicU64,
    abort_on_timeout: AtomicBool,
    active: AtomicBool,
    subscriber: Subscriber,
    create_record: CreateRecordFn,
}

impl DispatchState {
    fn compute_key(&self, record: &RecordObject<'_>, raw: &[u8]) -> Option<u64> {
        match &self.key_mode {
            KeyMode::Field(field_name) => {
                let field = record.resolve_field(field_name).ok()?;
                Some(record.get_value_integer(&field, 0).ok()? as u64)
            }
            KeyMode::Receipt => Some(self.key_counter.fetch_add(1, Ordering::Relaxed)),
            KeyMode::Calculated(func) => Some(func(raw)),
        }
    }

    fn handlers_for(&self, type_name: &str) -> Vec<Arc<dyn DispatchHandler>> {
        self.table.read().get(type_name).cloned().unwrap_or_default()
    }

    fn all_handlers(&self) -> Vec<Arc<dyn DispatchHandler>> {
        let table = self.table.read().clone();
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for handlers in table.values() {
            for h in handlers {
                let ptr = Arc::as_ptr(h) as *const () as usize;
                if seen.insert(ptr) {
                    out.push(h.clone());
                }
            }
        }
        for h in self.timeout_list.read().iter() {
            let ptr = Arc::as_ptr(h) as *const () as usize;
            if seen.insert(ptr) {
                out.push(h.clone());
            }
        }
        out
    }
}

fn worker_loop(state: Arc<DispatchState>) {
    tracing::debug!(queue = state.subscriber.name(), "dispatcher worker started");
    let mut has_received = false;
    loop {
        if !state.active.load(Ordering::Acquire) {
            break;
        }
        match state.subscriber.receive_ref(Timeout::After(DISPATCH_TIMEOUT)) {
            Ok(bytes) => {
                has_received = true;
                if let Err(e) = dispatch_one(&state, &bytes) {
                    tracing::warn!(error = %e, "dispatcher failed to process record");
                }
                let terminate = matches!(
                    parse_type_name(&bytes),
                    Some(name) if name == TERMINATION_SENTINEL
                );
                state.subscriber.dereference(&bytes);
                if terminate {
                    break;
                }
            }
            Err(QState::Timeout) | Err(QState::Empty) => {
                for handler in state.timeout_list.read().iter() {
                    handler.process_timeout();
                }
                if state.abort_on_timeout.load(Ordering::Relaxed) && has_received {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    for handler in state.all_handlers() {
        handler.process_termination();
    }
    tracing::debug!(queue = state.subscriber.name(), "dispatcher worker stopped");
}

fn parse_type_name(buf: &[u8]) -> Option<String> {
    // Mirrors the header layout in `record::object`: version/type_size/
    // data_size, then the NUL-terminated type name.
    if buf.len() < 8 {
        return None;
    }
    let type_size = u32::from(u16::from_be_bytes(buf[2..4].try_into().ok()?)) as usize;
    let name_start = 8;
    let name_end = name_start + type_size;
    if name_end > buf.len() || type_size == 0 {
        return None;
    }
    let name_bytes = &buf[name_start..name_end - 1];
    Some(String::from_utf8_lossy(name_bytes).into_owned())
}

fn dispatch_one(state: &Arc<DispatchState>, bytes: &Arc<[u8]>) -> Result<(), String> {
    let record = (state.create_record)(&state.registry, bytes.to_vec()).map_err(|e| e.to_string())?;
    let key = state.compute_key(&record, bytes).unwrap_or(0);
    let handlers = state.handlers_for(record.type_name());
    if handlers.is_empty() {
        return Ok(());
    }

    let mut outgoing = Vec::new();
    for handler in &handlers {
        if !handler.process_record(&record, key, &mut outgoing) {
            tracing::warn!(record_type = record.type_name(), "handler reported a processing error");
        }
    }
    for out in outgoing {
        let publisher = Publisher::new(&out.queue_name, QueueSize::Standard, QueueSize::Standard);
        let _ = publisher.post_ref(out.bytes, Timeout::Check);
    }
    Ok(())
}

/// A worker-pool consumer that routes each record received on its input
/// queue to the handlers attached for that record's type (spec §4.4).
pub struct RecordDispatcher {
    state: Arc<DispatchState>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl RecordDispatcher {
    /// Creates a dispatcher subscribed to `input_queue` and spawns
    /// `num_workers` long-lived worker threads (spec §4.4.1).
    pub fn new(
        registry: Arc<RecordRegistry>,
        input_queue: &str,
        key_mode: KeyMode,
        num_workers: usize,
        subscriber_type: SubscriberType,
    ) -> Self {
        Self::with_create_record(
            registry,
            input_queue,
            key_mode,
            num_workers,
            subscriber_type,
            default_create_record,
        )
    }

    /// Like [`RecordDispatcher::new`], but with a caller-supplied
    /// [`CreateRecordFn`] in place of [`default_create_record`] — the "a
    /// subclass may override" hook of spec §4.4.2 step 2, expressed as a
    /// constructor parameter (rather than a post-construction setter) since
    /// worker threads start reading it immediately and it carries no interior
    /// mutability.
    pub fn with_create_record(
        registry: Arc<RecordRegistry>,
        input_queue: &str,
        key_mode: KeyMode,
        num_workers: usize,
        subscriber_type: SubscriberType,
        create_record: CreateRecordFn,
    ) -> Self {
        let subscriber = Subscriber::new(input_queue, subscriber_type, QueueSize::Standard, QueueSize::Standard);
        let state = Arc::new(DispatchState {
            registry,
            table: RwLock::new(Arc::new(HashMap::new())),
            timeout_list: RwLock::new(Arc::new(Vec::new())),
            key_mode,
            key_counter: AtomicU64::new(0),
            abort_on_timeout: AtomicBool::new(false),
            active: AtomicBool::new(true),
            subscriber,
            create_record,
        });
        let workers = spawn_workers(&state, num_workers.max(1));
        Self {
            state,
            workers: Mutex::new(workers),
        }
    }

    /// Builds a dispatcher whose key is the named registered calculator
    /// (spec §4.4.1's `CALCULATED_KEY_MODE`).
    pub fn with_calculated_key(
        registry: Arc<RecordRegistry>,
        input_queue: &str,
        calc_name: &str,
        num_workers: usize,
        subscriber_type: SubscriberType,
    ) -> Result<Self, DispatchError> {
        let func =
            lookup_key_calc(calc_name).ok_or_else(|| DispatchError::UnknownKeyCalc(calc_name.to_string()))?;
        Ok(Self::new(
            registry,
            input_queue,
            KeyMode::Calculated(func),
            num_workers,
            subscriber_type,
        ))
    }

    /// Whether a receive timeout after at least one successful receive
    /// should terminate the dispatcher (spec §4.4.3).
    #[must_use]
    pub fn with_abort_on_timeout(self, abort: bool) -> Self {
        self.state.abort_on_timeout.store(abort, Ordering::Relaxed);
        self
    }

    /// Registers `handler` to receive every record of `record_type` (spec
    /// §4.4.3). The dispatch table is copy-on-write: workers read an `Arc`
    /// snapshot with no lock held across `process_record`.
    pub fn attach(&self, record_type: &str, handler: Arc<dyn DispatchHandler>) {
        let mut table = self.state.table.write();
        let mut next: HandlerTable = (**table).clone();
        next.entry(record_type.to_string()).or_default().push(handler);
        *table = Arc::new(next);
    }

    /// Also registers `handler` to receive `processTimeout()` ticks.
    pub fn attach_timeout(&self, handler: Arc<dyn DispatchHandler>) {
        let mut list = self.state.timeout_list.write();
        let mut next = (**list).clone();
        next.push(handler);
        *list = Arc::new(next);
    }

    /// Drains every undelivered node on the input queue without processing
    /// it (spec §4.4.3).
    pub fn drain(&self) -> usize {
        self.state.subscriber.drain(true)
    }

    #[must_use]
    pub fn input_queue_name(&self) -> &str {
        self.state.subscriber.name()
    }

    /// Signals every worker to stop after its current receive and joins
    /// them, running `processTermination()` on every attached handler.
    pub fn shutdown(&self) {
        self.state.active.store(false, Ordering::Release);
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for RecordDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_workers(state: &Arc<DispatchState>, num_workers: usize) -> Vec<JoinHandle<()>> {
    (0..num_workers)
        .map(|i| {
            let state = state.clone();
            std::thread::Builder::new()
                .name(format!("sliderule-dispatch-{}-{i}", state.subscriber.name()))
                .spawn(move || worker_loop(state))
                .expect("failed to spawn dispatcher worker thread")
        })
        .collect()
}
