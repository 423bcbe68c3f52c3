//! Recorder controller
//!
//! Owns the history buffer and the attached event sources. Two states:
//! stopped (initial) and running. Capturing works in either state.

use crate::buffer::HistoryBuffer;
use crate::env::{EnvironmentProvider, StaticEnvironment};
use crate::events::{Action, ActionKind, ConsoleLevel};
use crate::normalize::ActionFactory;
use crate::report::{assemble_report, ErrorInput, ErrorReport};
use crate::sanitize::Sanitizer;
use crate::source::{ActionSink, ActionSource, SourceContext, Unregister};
use bugtrail_core::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const DEFAULT_MAX_ACTIONS: usize = 50;

/// `true`/`false`, or an options object (which implies enabled).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Toggle<T> {
    Enabled(bool),
    Configured(T),
}

impl<T: Clone + Default> Toggle<T> {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Toggle::Enabled(false))
    }

    pub fn options(&self) -> T {
        match self {
            Toggle::Configured(options) => options.clone(),
            Toggle::Enabled(_) => T::default(),
        }
    }
}

impl<T> Default for Toggle<T> {
    fn default() -> Self {
        Toggle::Enabled(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigationOptions {
    pub include_hash: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkOptions {
    /// Requests whose URL contains any of these are not recorded.
    pub ignore_urls: Vec<String>,
}

impl NetworkOptions {
    pub fn ignores(&self, url: &str) -> bool {
        self.ignore_urls.iter().any(|p| !p.is_empty() && url.contains(p.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsoleOptions {
    pub levels: Vec<ConsoleLevel>,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            levels: vec![ConsoleLevel::Error, ConsoleLevel::Warn],
        }
    }
}

/// Per-category options handed to every attached source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceOptions {
    pub navigation: NavigationOptions,
    pub network: NetworkOptions,
    pub console: ConsoleOptions,
}

/// Recorder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    /// History capacity
    pub max_actions: usize,
    /// Extra sanitize patterns: selectors (`.x`, `#x`, `[x]`) or regexes
    pub sanitize: Vec<String>,
    /// Attach component names to click/input records
    pub capture_components: bool,
    pub track_clicks: bool,
    pub track_inputs: bool,
    pub track_navigation: Toggle<NavigationOptions>,
    pub track_network: Toggle<NetworkOptions>,
    pub track_console: Toggle<ConsoleOptions>,
    /// Opaque user block copied into every report
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<serde_json::Value>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_actions: DEFAULT_MAX_ACTIONS,
            sanitize: Vec::new(),
            capture_components: true,
            track_clicks: true,
            track_inputs: true,
            track_navigation: Toggle::default(),
            track_network: Toggle::default(),
            track_console: Toggle::default(),
            user: None,
        }
    }
}

impl RecorderConfig {
    pub fn tracks(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Click => self.track_clicks,
            ActionKind::Input => self.track_inputs,
            ActionKind::Navigation => self.track_navigation.is_enabled(),
            ActionKind::Network => self.track_network.is_enabled(),
            ActionKind::Console => self.track_console.is_enabled(),
        }
    }

    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            navigation: self.track_navigation.options(),
            network: self.track_network.options(),
            console: self.track_console.options(),
        }
    }
}

pub type ErrorCallback = Arc<dyn Fn(&ErrorReport) + Send + Sync>;

/// The recorder
pub struct Recorder {
    config: RecorderConfig,
    buffer: Arc<Mutex<HistoryBuffer<Action>>>,
    running: Arc<AtomicBool>,
    env: Arc<dyn EnvironmentProvider>,
    factory: Arc<ActionFactory>,
    sources: Vec<Box<dyn ActionSource>>,
    active: Vec<Unregister>,
    on_error: Option<ErrorCallback>,
}

impl Recorder {
    /// Fails with `InvalidConfiguration` when `max_actions` is 0.
    pub fn new(config: RecorderConfig) -> Result<Self> {
        Self::with_environment(config, Arc::new(StaticEnvironment::default()))
    }

    pub fn with_environment(config: RecorderConfig, env: Arc<dyn EnvironmentProvider>) -> Result<Self> {
        let buffer = HistoryBuffer::new(config.max_actions)?;
        let sanitizer = Sanitizer::new(&config.sanitize);
        let factory = ActionFactory::new(Arc::clone(&env), sanitizer, config.capture_components);

        Ok(Self {
            buffer: Arc::new(Mutex::new(buffer)),
            running: Arc::new(AtomicBool::new(false)),
            factory: Arc::new(factory),
            env,
            config,
            sources: Vec::new(),
            active: Vec::new(),
            on_error: None,
        })
    }

    /// Register the event source for a category, replacing any previous one.
    /// Takes effect on the next `start()`.
    pub fn with_source(mut self, source: impl ActionSource + 'static) -> Self {
        self.register_source(Box::new(source));
        self
    }

    pub fn register_source(&mut self, source: Box<dyn ActionSource>) {
        let kind = source.kind();
        self.sources.retain(|s| s.kind() != kind);
        self.sources.push(source);
    }

    pub fn on_error(mut self, callback: impl Fn(&ErrorReport) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn factory(&self) -> &Arc<ActionFactory> {
        &self.factory
    }

    pub fn start(&mut self) {
        if self.is_active() {
            let err = Error::already_running();
            tracing::warn!(code = ?err.code, "{}", err.message);
            return;
        }

        self.running.store(true, Ordering::SeqCst);
        let options = self.config.source_options();

        for kind in ActionKind::ALL {
            if !self.config.tracks(kind) {
                continue;
            }
            let Some(source) = self.sources.iter_mut().find(|s| s.kind() == kind) else {
                tracing::debug!(kind = %kind, "no event source registered");
                continue;
            };
            let ctx = SourceContext {
                sink: ActionSink::new(Arc::clone(&self.buffer), Arc::clone(&self.running)),
                factory: Arc::clone(&self.factory),
                options: options.clone(),
            };
            self.active.push(source.attach(ctx));
            tracing::debug!(kind = %kind, "event source attached");
        }

        tracing::info!(sources = self.active.len(), capacity = self.config.max_actions, "recorder started");
    }

    pub fn stop(&mut self) {
        if !self.is_active() {
            let err = Error::already_stopped();
            tracing::debug!(code = ?err.code, "{}", err.message);
            return;
        }

        {
            let _guard = self.buffer.lock();
            self.running.store(false, Ordering::SeqCst);
        }
        for mut unregister in self.active.drain(..) {
            unregister.call();
        }
        tracing::info!(actions = self.action_count(), "recorder stopped");
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }

    /// Stop and clear. Safe to call repeatedly.
    pub fn cleanup(&mut self) {
        self.stop();
        self.clear();
    }

    pub fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn action_count(&self) -> usize {
        self.buffer.lock().size()
    }

    pub fn get_actions(&self) -> Vec<Action> {
        self.buffer.lock().get_all()
    }

    pub fn get_last(&self, n: usize) -> Vec<Action> {
        self.buffer.lock().get_last(n)
    }

    /// Build a report over whatever is buffered. Never mutates the recorder.
    pub fn capture(&self, error: impl Into<ErrorInput>) -> ErrorReport {
        let error = error.into();
        let actions = self.buffer.lock().get_all();
        let report = assemble_report(actions, &error, self.env.as_ref(), self.config.user.as_ref());
        tracing::info!(report_id = %report.report_id, actions = report.actions.len(), "error report captured");
        report
    }

    /// Uncaught-error route: capture and hand the report to `on_error`.
    pub fn report_uncaught(&self, error: impl Into<ErrorInput>) -> ErrorReport {
        let report = self.capture(error);
        if let Some(callback) = &self.on_error {
            callback(&report);
        }
        report
    }

    /// Unhandled-rejection route; same delivery as [`report_uncaught`](Self::report_uncaught).
    pub fn report_rejection(&self, reason: impl Into<ErrorInput>) -> ErrorReport {
        self.report_uncaught(reason)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("running", &self.is_active())
            .field("actions", &self.action_count())
            .field("sources", &self.sources.iter().map(|s| s.kind()).collect::<Vec<_>>())
            .finish()
    }
}
