//! Normalized action records
//!
//! Every event source emits the same flat shape: a timestamp, the page it
//! happened on, and one tagged variant. Records serialize to camelCase JSON.

use serde::{Deserialize, Serialize};

/// Single recorded action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Route path at capture time
    pub page: String,
    #[serde(flatten)]
    pub data: ActionData,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        self.data.kind()
    }
}

/// Action payload - tagged union keyed by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActionData {
    #[serde(rename_all = "camelCase")]
    Click {
        element: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        component: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        component_path: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        position: Position,
    },

    #[serde(rename_all = "camelCase")]
    Input {
        element: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        component: Option<String>,
        input_kind: InputKind,
        value: String,
        value_length: usize,
        was_cleared: bool,
        is_sanitized: bool,
    },

    Navigation { from: String, to: String },

    /// `status` and `error` are never both set.
    #[serde(rename_all = "camelCase")]
    Network {
        url: String,
        method: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    Console {
        level: ConsoleLevel,
        message: String,
        args: Vec<String>,
    },
}

impl ActionData {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionData::Click { .. } => ActionKind::Click,
            ActionData::Input { .. } => ActionKind::Input,
            ActionData::Navigation { .. } => ActionKind::Navigation,
            ActionData::Network { .. } => ActionKind::Network,
            ActionData::Console { .. } => ActionKind::Console,
        }
    }
}

/// Action categories, one event source each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Click,
    Input,
    Navigation,
    Network,
    Console,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::Click,
        ActionKind::Input,
        ActionKind::Navigation,
        ActionKind::Network,
        ActionKind::Console,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Input => "input",
            ActionKind::Navigation => "navigation",
            ActionKind::Network => "network",
            ActionKind::Console => "console",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Committed-value transitions only; keystrokes are never recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Change,
    Blur,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Error,
    Warn,
}
