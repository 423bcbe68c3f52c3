//! Raw observation -> action record
//!
//! Every event source funnels through [`ActionFactory`] so truncation,
//! sanitization and URL stripping are applied the same way everywhere.

use crate::env::EnvironmentProvider;
use crate::events::{Action, ActionData, ConsoleLevel, InputKind, Position};
use crate::sanitize::Sanitizer;
use bugtrail_core::identify::{identify, truncate_chars};
use bugtrail_core::{ComponentResolver, Element};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

pub const MAX_CONSOLE_ARGS: usize = 5;
pub const MAX_CONSOLE_ARG_LEN: usize = 100;
pub const MAX_CONSOLE_MESSAGE_LEN: usize = 500;

const SENSITIVE_QUERY_KEYS: &[&str] = &[
    "token",
    "access_token",
    "refresh_token",
    "id_token",
    "key",
    "api_key",
    "apikey",
    "password",
    "secret",
    "auth",
    "session",
    "sig",
    "signature",
    "code",
];

/// How a network request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkOutcome {
    Status(u16),
    Failed(String),
}

/// Previous input length per element, held without owning the element.
#[derive(Default)]
pub struct WeakValueTable {
    entries: HashMap<usize, (Weak<dyn Any + Send + Sync>, usize)>,
}

impl WeakValueTable {
    /// Record `len` for `element` and return the previous length, if any.
    pub fn swap<T: Any + Send + Sync>(&mut self, element: &Arc<T>, len: usize) -> Option<usize> {
        self.entries.retain(|_, (weak, _)| weak.strong_count() > 0);

        let key = Arc::as_ptr(element) as *const () as usize;
        let weak = Arc::downgrade(element);
        let weak: Weak<dyn Any + Send + Sync> = weak;
        self.entries.insert(key, (weak, len)).map(|(_, prev)| prev)
    }

    /// Entries whose element is still alive.
    pub fn live(&self) -> usize {
        self.entries.values().filter(|(w, _)| w.strong_count() > 0).count()
    }
}

impl std::fmt::Debug for WeakValueTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakValueTable").field("live", &self.live()).finish()
    }
}

pub struct ActionFactory {
    env: Arc<dyn EnvironmentProvider>,
    sanitizer: Sanitizer,
    capture_components: bool,
    previous: Mutex<WeakValueTable>,
}

impl ActionFactory {
    pub fn new(env: Arc<dyn EnvironmentProvider>, sanitizer: Sanitizer, capture_components: bool) -> Self {
        Self {
            env,
            sanitizer,
            capture_components,
            previous: Mutex::new(WeakValueTable::default()),
        }
    }

    pub fn environment(&self) -> &Arc<dyn EnvironmentProvider> {
        &self.env
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    /// Input elements whose previous value is still remembered.
    pub fn tracked_inputs(&self) -> usize {
        self.previous.lock().live()
    }

    fn stamp(&self, page: String, data: ActionData) -> Action {
        Action {
            timestamp: self.env.now().timestamp_millis(),
            page,
            data,
        }
    }

    pub fn click<E, R>(&self, element: &E, position: Position, resolver: Option<&R>) -> Action
    where
        E: Element,
        R: ComponentResolver<E> + ?Sized,
    {
        let identity = identify(element, self.capture_components, resolver);
        self.stamp(
            self.env.page(),
            ActionData::Click {
                element: identity.identifier,
                component: identity.component,
                component_path: identity.component_path,
                text: identity.text,
                position,
            },
        )
    }

    pub fn input<E, R>(&self, element: &Arc<E>, kind: InputKind, raw: &str, resolver: Option<&R>) -> Action
    where
        E: Element + Send + Sync + 'static,
        R: ComponentResolver<E> + ?Sized,
    {
        let identity = identify(element.as_ref(), self.capture_components, resolver);
        let sanitized = self.sanitizer.sanitize(element.as_ref(), raw);
        let previous = self.previous.lock().swap(element, sanitized.length);
        let was_cleared = raw.is_empty() && previous.is_some_and(|len| len > 0);

        self.stamp(
            self.env.page(),
            ActionData::Input {
                element: identity.identifier,
                component: identity.component,
                input_kind: kind,
                value: sanitized.value,
                value_length: sanitized.length,
                was_cleared,
                is_sanitized: sanitized.is_sanitized,
            },
        )
    }

    /// `None` when the location did not change.
    pub fn navigation(&self, from: &str, to: &str, include_hash: bool) -> Option<Action> {
        let from = self.location(from, include_hash);
        let to = self.location(to, include_hash);
        if from == to {
            return None;
        }
        Some(self.stamp(to.clone(), ActionData::Navigation { from, to }))
    }

    pub fn network(
        &self,
        url: &str,
        method: &str,
        outcome: Option<NetworkOutcome>,
        duration_ms: Option<u64>,
    ) -> Action {
        let (status, error) = match outcome {
            Some(NetworkOutcome::Status(code)) => (Some(code), None),
            Some(NetworkOutcome::Failed(message)) => (None, Some(message)),
            None => (None, None),
        };
        self.stamp(
            self.env.page(),
            ActionData::Network {
                url: strip_sensitive_query(&self.location(url, false)),
                method: method.to_ascii_uppercase(),
                status,
                duration_ms,
                error,
            },
        )
    }

    pub fn console(&self, level: ConsoleLevel, args: &[serde_json::Value]) -> Action {
        let rendered: Vec<String> = args.iter().map(stringify).collect();
        let message = truncate_chars(&rendered.join(" "), MAX_CONSOLE_MESSAGE_LEN);
        let args = rendered
            .iter()
            .take(MAX_CONSOLE_ARGS)
            .map(|a| truncate_chars(a, MAX_CONSOLE_ARG_LEN))
            .collect();
        self.stamp(self.env.page(), ActionData::Console { level, message, args })
    }

    /// Path + query (+ hash) of `raw`, resolved against the current URL.
    fn location(&self, raw: &str, include_hash: bool) -> String {
        let resolved = url::Url::parse(&self.env.url())
            .and_then(|base| base.join(raw))
            .or_else(|_| url::Url::parse(raw));
        match resolved {
            Ok(u) => {
                let mut out = u.path().to_string();
                if let Some(q) = u.query() {
                    out.push('?');
                    out.push_str(q);
                }
                if include_hash {
                    if let Some(h) = u.fragment() {
                        out.push('#');
                        out.push_str(h);
                    }
                }
                out
            }
            Err(_) if include_hash => raw.to_string(),
            Err(_) => raw.split('#').next().unwrap_or_default().to_string(),
        }
    }
}

impl std::fmt::Debug for ActionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionFactory")
            .field("capture_components", &self.capture_components)
            .field("sanitizer", &self.sanitizer)
            .finish()
    }
}

/// Drop query parameters whose name is sensitive; keeps the rest verbatim.
pub fn strip_sensitive_query(location: &str) -> String {
    let Some((path, query)) = location.split_once('?') else {
        return location.to_string();
    };
    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default().to_ascii_lowercase();
            !SENSITIVE_QUERY_KEYS.contains(&key.as_str())
        })
        .collect();
    if kept.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, kept.join("&"))
    }
}

fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StaticEnvironment;
    use bugtrail_core::{ElementSnapshot, EmbeddedComponents};
    use serde_json::json;

    fn factory() -> ActionFactory {
        let env = StaticEnvironment::new("https://shop.test/cart?step=1");
        ActionFactory::new(Arc::new(env), Sanitizer::new(&["balance"]), true)
    }

    const NO_RESOLVER: Option<&EmbeddedComponents> = None;

    #[test]
    fn click_records_identity_and_page() {
        let f = factory();
        let el = ElementSnapshot::new("button").with_text(" Pay now ");
        let action = f.click(&el, Position { x: 4.0, y: 8.0 }, Some(&EmbeddedComponents));
        assert_eq!(action.page, "/cart?step=1");
        match action.data {
            ActionData::Click { element, text, position, .. } => {
                assert_eq!(element, "button \"Pay now\"");
                assert_eq!(text.as_deref(), Some("Pay now"));
                assert_eq!(position.y, 8.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn input_sanitizes_and_detects_clear() {
        let f = factory();
        let el = Arc::new(ElementSnapshot::new("input").with_attr("name", "nickname"));

        let first = f.input(&el, InputKind::Change, "bob", NO_RESOLVER);
        let cleared = f.input(&el, InputKind::Change, "", NO_RESOLVER);
        let again = f.input(&el, InputKind::Blur, "", NO_RESOLVER);

        let was_cleared = |a: &Action| match &a.data {
            ActionData::Input { was_cleared, .. } => *was_cleared,
            _ => unreachable!(),
        };
        assert!(!was_cleared(&first));
        assert!(was_cleared(&cleared));
        assert!(!was_cleared(&again));

        let balance = Arc::new(ElementSnapshot::new("input").with_attr("name", "accountBalance"));
        match f.input(&balance, InputKind::Change, "1000", NO_RESOLVER).data {
            ActionData::Input { value, value_length, is_sanitized, .. } => {
                assert_eq!(value, "[SANITIZED]");
                assert_eq!(value_length, 4);
                assert!(is_sanitized);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn weak_table_forgets_dropped_elements() {
        let mut table = WeakValueTable::default();
        let a = Arc::new(ElementSnapshot::new("input"));
        let b = Arc::new(ElementSnapshot::new("input"));
        assert_eq!(table.swap(&a, 3), None);
        assert_eq!(table.swap(&a, 0), Some(3));
        assert_eq!(table.swap(&b, 1), None);
        drop(a);
        assert_eq!(table.live(), 1);
        assert_eq!(table.swap(&b, 2), Some(1));
        assert_eq!(table.entries.len(), 1);
    }

    #[test]
    fn navigation_dedups_and_strips_hash() {
        let f = factory();
        assert!(f.navigation("/a", "/a", false).is_none());
        assert!(f.navigation("/a#x", "/a#y", false).is_none());

        let action = f.navigation("/a#x", "/a#y", true).unwrap();
        assert_eq!(
            action.data,
            ActionData::Navigation {
                from: "/a#x".into(),
                to: "/a#y".into()
            }
        );

        let action = f.navigation("https://shop.test/cart", "https://shop.test/pay?x=1", false).unwrap();
        assert_eq!(action.page, "/pay?x=1");
    }

    #[test]
    fn network_strips_origin_and_secrets() {
        let f = factory();
        let action = f.network(
            "https://api.shop.test/v1/orders?page=2&token=abc&API_KEY=k",
            "post",
            Some(NetworkOutcome::Status(502)),
            Some(87),
        );
        assert_eq!(
            action.data,
            ActionData::Network {
                url: "/v1/orders?page=2".into(),
                method: "POST".into(),
                status: Some(502),
                duration_ms: Some(87),
                error: None,
            }
        );

        let failed = f.network("/api/ping?session=1", "get", Some(NetworkOutcome::Failed("offline".into())), None);
        match failed.data {
            ActionData::Network { url, status, error, .. } => {
                assert_eq!(url, "/api/ping");
                assert_eq!(status, None);
                assert_eq!(error.as_deref(), Some("offline"));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn console_caps_args_and_message() {
        let f = factory();
        let long = "y".repeat(700);
        let args = vec![
            json!("failed:"),
            json!({"code": 7}),
            json!(long),
            json!(1),
            json!(null),
            json!(true),
        ];
        match f.console(ConsoleLevel::Error, &args).data {
            ActionData::Console { level, message, args } => {
                assert_eq!(level, ConsoleLevel::Error);
                assert_eq!(args.len(), MAX_CONSOLE_ARGS);
                assert_eq!(args[1], r#"{"code":7}"#);
                assert_eq!(args[2].chars().count(), MAX_CONSOLE_ARG_LEN);
                assert_eq!(message.chars().count(), MAX_CONSOLE_MESSAGE_LEN);
                assert!(message.starts_with("failed: {\"code\":7} yyy"));
            }
            _ => unreachable!(),
        }
    }
}
