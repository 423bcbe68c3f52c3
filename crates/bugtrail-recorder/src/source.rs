//! Event-source boundary
//!
//! Sources observe the host (DOM listeners, fetch hooks, console patches, ...)
//! and push normalized actions into an [`ActionSink`]. The recorder only sees
//! the [`ActionSource`] trait: attach hands over a [`SourceContext`] and gets
//! back an [`Unregister`] callback.

use crate::buffer::HistoryBuffer;
use crate::events::{Action, ActionKind, ConsoleLevel, InputKind, Position};
use crate::normalize::{ActionFactory, NetworkOutcome};
use crate::recorder::SourceOptions;
use bugtrail_core::identify::identify;
use bugtrail_core::{ElementSnapshot, EmbeddedComponents};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// The `onAction` callback handed to sources.
#[derive(Clone)]
pub struct ActionSink {
    buffer: Arc<Mutex<HistoryBuffer<Action>>>,
    running: Arc<AtomicBool>,
    capacity: usize,
}

impl ActionSink {
    pub(crate) fn new(buffer: Arc<Mutex<HistoryBuffer<Action>>>, running: Arc<AtomicBool>) -> Self {
        let capacity = buffer.lock().capacity();
        Self {
            buffer,
            running,
            capacity,
        }
    }

    /// Capacity of the history behind this sink.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append to the history. Refused once the recorder has stopped.
    pub fn push(&self, action: Action) -> bool {
        let mut buffer = self.buffer.lock();
        if !self.running.load(Ordering::SeqCst) {
            tracing::debug!(kind = %action.kind(), "dropping action delivered after stop");
            return false;
        }
        buffer.add(action);
        true
    }
}

impl std::fmt::Debug for ActionSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSink")
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}

/// Everything a source needs while attached.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub sink: ActionSink,
    pub factory: Arc<ActionFactory>,
    pub options: SourceOptions,
}

/// Detach callback; only the first call has an effect.
pub struct Unregister(Option<Box<dyn FnOnce() + Send>>);

impl Unregister {
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    pub fn noop() -> Self {
        Self(None)
    }

    pub fn call(&mut self) {
        if let Some(f) = self.0.take() {
            if catch_unwind(AssertUnwindSafe(f)).is_err() {
                tracing::warn!("event source panicked while unregistering");
            }
        }
    }

    pub fn is_spent(&self) -> bool {
        self.0.is_none()
    }
}

impl std::fmt::Debug for Unregister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Unregister").field(&!self.is_spent()).finish()
    }
}

pub trait ActionSource: Send {
    fn kind(&self) -> ActionKind;

    fn attach(&mut self, ctx: SourceContext) -> Unregister;
}

fn default_input_kind() -> InputKind {
    InputKind::Change
}

fn default_method() -> String {
    "GET".to_string()
}

/// Unnormalized observation, as a host or the CLI reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RawEvent {
    Click {
        element: ElementSnapshot,
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
    },
    Input {
        element: ElementSnapshot,
        #[serde(default)]
        value: String,
        #[serde(default = "default_input_kind")]
        event: InputKind,
    },
    Navigation {
        #[serde(default)]
        from: Option<String>,
        to: String,
    },
    #[serde(rename_all = "camelCase")]
    Network {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default)]
        status: Option<u16>,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        duration_ms: Option<u64>,
    },
    Console {
        level: ConsoleLevel,
        #[serde(default)]
        args: Vec<serde_json::Value>,
    },
}

impl RawEvent {
    pub fn kind(&self) -> ActionKind {
        match self {
            RawEvent::Click { .. } => ActionKind::Click,
            RawEvent::Input { .. } => ActionKind::Input,
            RawEvent::Navigation { .. } => ActionKind::Navigation,
            RawEvent::Network { .. } => ActionKind::Network,
            RawEvent::Console { .. } => ActionKind::Console,
        }
    }
}

/// Keeps one shared handle per distinct input element while a source is
/// attached, so repeated observations of a field hit the same weak-table entry.
/// Holds at most `limit` elements; the least recently seen one is released
/// first, which lets its weak-table entry expire.
#[derive(Debug, Default)]
struct ElementInterner {
    elements: HashMap<String, (Arc<ElementSnapshot>, u64)>,
    tick: u64,
}

impl ElementInterner {
    fn intern(&mut self, element: ElementSnapshot, limit: usize) -> Arc<ElementSnapshot> {
        let key = serde_json::to_string(&element)
            .unwrap_or_else(|_| identify::<_, EmbeddedComponents>(&element, false, None).identifier);
        self.tick += 1;
        let tick = self.tick;

        if let Some((handle, seen)) = self.elements.get_mut(&key) {
            *seen = tick;
            return Arc::clone(handle);
        }

        while self.elements.len() >= limit.max(1) {
            let Some(oldest) = self
                .elements
                .iter()
                .min_by_key(|(_, (_, seen))| *seen)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            self.elements.remove(&oldest);
        }

        let handle = Arc::new(element);
        self.elements.insert(key, (Arc::clone(&handle), tick));
        handle
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.elements.len()
    }

    fn clear(&mut self) {
        self.elements.clear();
    }
}

/// Normalize `raw` with the context's factory and push it.
fn deliver(ctx: &SourceContext, raw: RawEvent, elements: &mut ElementInterner) -> bool {
    let factory = &ctx.factory;
    let action = match raw {
        RawEvent::Click { element, x, y } => {
            Some(factory.click(&element, Position { x, y }, Some(&EmbeddedComponents)))
        }
        RawEvent::Input { element, value, event } => {
            let element = elements.intern(element, ctx.sink.capacity());
            Some(factory.input(&element, event, &value, Some(&EmbeddedComponents)))
        }
        RawEvent::Navigation { from, to } => {
            let from = from.unwrap_or_else(|| factory.environment().url());
            let action = factory.navigation(&from, &to, ctx.options.navigation.include_hash);
            if action.is_some() {
                factory.environment().navigated(&to);
            }
            action
        }
        RawEvent::Network {
            url,
            method,
            status,
            error,
            duration_ms,
        } => {
            if ctx.options.network.ignores(&url) {
                None
            } else {
                let outcome = match (error, status) {
                    (Some(message), _) => Some(NetworkOutcome::Failed(message)),
                    (None, Some(code)) => Some(NetworkOutcome::Status(code)),
                    (None, None) => None,
                };
                Some(factory.network(&url, &method, outcome, duration_ms))
            }
        }
        RawEvent::Console { level, args } => ctx
            .options
            .console
            .levels
            .contains(&level)
            .then(|| factory.console(level, &args)),
    };

    match action {
        Some(action) => ctx.sink.push(action),
        None => false,
    }
}

#[derive(Debug, Default)]
struct ManualState {
    ctx: Option<SourceContext>,
    elements: ElementInterner,
}

/// In-process source; the host calls [`emit`](ManualSource::emit).
#[derive(Debug, Clone)]
pub struct ManualSource {
    kind: ActionKind,
    state: Arc<Mutex<ManualState>>,
}

impl ManualSource {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(ManualState::default())),
        }
    }

    /// Returns true when an action was recorded.
    pub fn emit(&self, raw: RawEvent) -> bool {
        if raw.kind() != self.kind {
            tracing::debug!(expected = %self.kind, got = %raw.kind(), "ignoring event for another source");
            return false;
        }
        let mut state = self.state.lock();
        let ManualState { ctx, elements } = &mut *state;
        match ctx {
            Some(ctx) => deliver(ctx, raw, elements),
            None => false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock().ctx.is_some()
    }
}

impl ActionSource for ManualSource {
    fn kind(&self) -> ActionKind {
        self.kind
    }

    fn attach(&mut self, ctx: SourceContext) -> Unregister {
        self.state.lock().ctx = Some(ctx);
        let state = Arc::clone(&self.state);
        Unregister::new(move || {
            let mut state = state.lock();
            state.ctx = None;
            state.elements.clear();
        })
    }
}

/// Source fed from another thread through a channel.
///
/// Attaching spawns a forwarding thread; unregistering stops and joins it, so
/// nothing is recorded after the unregister call returns. Events still queued
/// at that point stay in the channel.
#[derive(Debug)]
pub struct ChannelSource {
    kind: ActionKind,
    rx: Receiver<RawEvent>,
    poll: Duration,
}

impl ChannelSource {
    pub fn new(kind: ActionKind) -> (Self, Sender<RawEvent>) {
        let (tx, rx) = unbounded();
        let source = Self {
            kind,
            rx,
            poll: Duration::from_millis(50),
        };
        (source, tx)
    }

    pub fn poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }
}

impl ActionSource for ChannelSource {
    fn kind(&self) -> ActionKind {
        self.kind
    }

    fn attach(&mut self, ctx: SourceContext) -> Unregister {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let rx = self.rx.clone();
        let kind = self.kind;
        let poll = self.poll;

        let handle = thread::spawn(move || {
            let mut elements = ElementInterner::default();
            while !stop_flag.load(Ordering::SeqCst) {
                match rx.recv_timeout(poll) {
                    Ok(raw) if raw.kind() == kind => {
                        deliver(&ctx, raw, &mut elements);
                    }
                    Ok(raw) => {
                        tracing::debug!(expected = %kind, got = %raw.kind(), "ignoring event for another source");
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Unregister::new(move || {
            stop.store(true, Ordering::SeqCst);
            if handle.join().is_err() {
                tracing::warn!(kind = %kind, "channel source thread panicked");
            }
        })
    }
}
