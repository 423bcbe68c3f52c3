//! Environment context provider
//!
//! URL, user agent, viewport and clock are injected rather than read from
//! globals, so reports can be assembled against any host (or a fake).

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

pub trait EnvironmentProvider: Send + Sync {
    /// Full current URL.
    fn url(&self) -> String;

    /// Current route: path and query of [`url`](Self::url).
    fn page(&self) -> String {
        page_of(&self.url())
    }

    fn user_agent(&self) -> String;

    fn viewport(&self) -> Viewport;

    fn platform(&self) -> String {
        "web".to_string()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Called after a navigation to `to` was recorded. Hosts that read the
    /// live location can ignore it.
    fn navigated(&self, _to: &str) {}
}

/// Path plus query of an absolute or relative URL, without the fragment.
pub fn page_of(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(parsed) => match parsed.query() {
            Some(q) => format!("{}?{}", parsed.path(), q),
            None => parsed.path().to_string(),
        },
        Err(_) => {
            let without_hash = raw.split('#').next().unwrap_or_default();
            if without_hash.is_empty() {
                "/".to_string()
            } else {
                without_hash.to_string()
            }
        }
    }
}

/// Environment with fixed values and a settable location.
#[derive(Debug)]
pub struct StaticEnvironment {
    url: RwLock<String>,
    user_agent: String,
    viewport: Viewport,
    platform: String,
    frozen_at: RwLock<Option<DateTime<Utc>>>,
}

impl StaticEnvironment {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: RwLock::new(url.into()),
            user_agent: format!("bugtrail/{}", env!("CARGO_PKG_VERSION")),
            viewport: Viewport {
                width: 1280,
                height: 720,
            },
            platform: "web".to_string(),
            frozen_at: RwLock::new(None),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Viewport { width, height };
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Follow a navigation.
    pub fn set_url(&self, url: impl Into<String>) {
        *self.url.write() = url.into();
    }

    /// Follow a navigation to `to`, resolved against the current URL.
    pub fn navigate(&self, to: &str) {
        let mut url = self.url.write();
        match url::Url::parse(&url).and_then(|base| base.join(to)) {
            Ok(next) => *url = next.to_string(),
            Err(_) => *url = to.to_string(),
        }
    }

    /// Pin the clock; `None` returns to wall-clock time.
    pub fn freeze_at(&self, at: Option<DateTime<Utc>>) {
        *self.frozen_at.write() = at;
    }
}

impl Default for StaticEnvironment {
    fn default() -> Self {
        Self::new("http://localhost/")
    }
}

impl EnvironmentProvider for StaticEnvironment {
    fn url(&self) -> String {
        self.url.read().clone()
    }

    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn platform(&self) -> String {
        self.platform.clone()
    }

    fn now(&self) -> DateTime<Utc> {
        self.frozen_at.read().unwrap_or_else(Utc::now)
    }

    fn navigated(&self, to: &str) {
        self.navigate(to);
    }
}
