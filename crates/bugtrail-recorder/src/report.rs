//! Error report assembly
//!
//! A report bundles the normalized error, a fresh environment snapshot and the
//! buffered actions, each annotated with its age relative to the capture.

use crate::env::{EnvironmentProvider, Viewport};
use crate::events::Action;
use bugtrail_core::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anything that can be captured.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorInput {
    Structured {
        type_name: String,
        message: String,
        stack: Option<String>,
        component_stack: Option<String>,
    },
    Text(String),
    Other(serde_json::Value),
}

impl ErrorInput {
    pub fn structured(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorInput::Structured {
            type_name: type_name.into(),
            message: message.into(),
            stack: None,
            component_stack: None,
        }
    }

    pub fn with_stack(mut self, trace: impl Into<String>) -> Self {
        if let ErrorInput::Structured { stack, .. } = &mut self {
            *stack = Some(trace.into());
        }
        self
    }

    pub fn with_component_stack(mut self, trace: impl Into<String>) -> Self {
        if let ErrorInput::Structured { component_stack, .. } = &mut self {
            *component_stack = Some(trace.into());
        }
        self
    }

    /// Type tag is the concrete error type's name; the source chain becomes the stack.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(format!("Caused by: {}", cause));
            source = cause.source();
        }
        ErrorInput::Structured {
            type_name: short_type_name(std::any::type_name::<E>()),
            message: err.to_string(),
            stack: (!causes.is_empty()).then(|| causes.join("\n")),
            component_stack: None,
        }
    }

    pub fn normalize(&self) -> ErrorInfo {
        match self {
            ErrorInput::Structured {
                type_name,
                message,
                stack,
                component_stack,
            } => ErrorInfo {
                message: message.clone(),
                error_type: if type_name.is_empty() {
                    "Error".to_string()
                } else {
                    type_name.clone()
                },
                stack: stack.clone(),
                component_stack: component_stack.clone(),
            },
            ErrorInput::Text(message) => ErrorInfo {
                message: message.clone(),
                error_type: "Error".to_string(),
                stack: None,
                component_stack: None,
            },
            ErrorInput::Other(value) => {
                let err = Error::unrecognized_error_shape(value);
                tracing::debug!(code = ?err.code, "{}", err.message);
                ErrorInfo {
                    message: js_string(value),
                    error_type: "Unknown".to_string(),
                    stack: None,
                    component_stack: None,
                }
            }
        }
    }
}

impl From<&str> for ErrorInput {
    fn from(s: &str) -> Self {
        ErrorInput::Text(s.to_string())
    }
}

impl From<String> for ErrorInput {
    fn from(s: String) -> Self {
        ErrorInput::Text(s)
    }
}

impl From<serde_json::Value> for ErrorInput {
    fn from(value: serde_json::Value) -> Self {
        let text = |v: &serde_json::Value, key: &str| v.get(key).and_then(|s| s.as_str()).map(str::to_string);
        match value {
            serde_json::Value::String(s) => ErrorInput::Text(s),
            serde_json::Value::Object(_) if value.get("message").is_some_and(|m| m.is_string()) => {
                ErrorInput::Structured {
                    type_name: text(&value, "name").unwrap_or_else(|| "Error".to_string()),
                    message: text(&value, "message").unwrap_or_default(),
                    stack: text(&value, "stack"),
                    component_stack: text(&value, "componentStack"),
                }
            }
            other => ErrorInput::Other(other),
        }
    }
}

impl From<anyhow::Error> for ErrorInput {
    fn from(err: anyhow::Error) -> Self {
        let causes: Vec<String> = err.chain().skip(1).map(|c| format!("Caused by: {}", c)).collect();
        ErrorInput::Structured {
            type_name: "Error".to_string(),
            message: err.to_string(),
            stack: (!causes.is_empty()).then(|| causes.join("\n")),
            component_stack: None,
        }
    }
}

fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).trim().to_string()
}

/// String coercion with JavaScript semantics.
fn js_string(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.abs() >= 1e21 => js_exponent(f),
            Some(f) if n.is_f64() && f == 0.0 => "0".to_string(),
            Some(f) if n.is_f64() && f.fract() == 0.0 => format!("{}", f),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| if v.is_null() { String::new() } else { js_string(v) })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// `1e+21` style, as JavaScript prints magnitudes of 1e21 and above.
fn js_exponent(f: f64) -> String {
    let formatted = format!("{:e}", f);
    match formatted.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
        _ => formatted,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_stack: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportContext {
    pub url: String,
    pub user_agent: String,
    pub viewport: Viewport,
    pub platform: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedAction {
    #[serde(flatten)]
    pub action: Action,
    pub relative_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub report_id: String,
    pub timestamp: DateTime<Utc>,
    pub error: ErrorInfo,
    pub context: ReportContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<serde_json::Value>,
    pub actions: Vec<ReportedAction>,
}

/// `"0s"`, `"-45s"`, `"-2m 5s"`, `"-2m"`, `"-1h 0m"`; whole units, truncated.
pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms).max(0);
    let seconds = diff / 1000;
    if seconds == 0 {
        return "0s".to_string();
    }
    if seconds < 60 {
        return format!("-{}s", seconds);
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        let rem = seconds % 60;
        return if rem == 0 {
            format!("-{}m", minutes)
        } else {
            format!("-{}m {}s", minutes, rem)
        };
    }
    format!("-{}h {}m", minutes / 60, minutes % 60)
}

/// Time-derived prefix plus a random suffix.
pub fn generate_report_id(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("err_{:x}_{}", now.timestamp_millis(), &suffix[..12])
}

/// Build a report from a buffer snapshot. Pure apart from the id and clock.
pub fn assemble_report(
    actions: Vec<Action>,
    error: &ErrorInput,
    env: &dyn EnvironmentProvider,
    user: Option<&serde_json::Value>,
) -> ErrorReport {
    let now = env.now();
    let now_ms = now.timestamp_millis();

    let actions = actions
        .into_iter()
        .map(|action| ReportedAction {
            relative_time: format_relative_time(action.timestamp, now_ms),
            action,
        })
        .collect();

    ErrorReport {
        report_id: generate_report_id(now),
        timestamp: now,
        error: error.normalize(),
        context: ReportContext {
            url: env.url(),
            user_agent: env.user_agent(),
            viewport: env.viewport(),
            platform: env.platform(),
            timestamp: now,
        },
        user: user.cloned(),
        actions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StaticEnvironment;
    use crate::events::{ActionData, ConsoleLevel};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn relative_time_tiers() {
        assert_eq!(format_relative_time(0, 0), "0s");
        assert_eq!(format_relative_time(0, 45_000), "-45s");
        assert_eq!(format_relative_time(0, 125_000), "-2m 5s");
        assert_eq!(format_relative_time(0, 120_000), "-2m");
        assert_eq!(format_relative_time(0, 3_600_000), "-1h 0m");
        assert_eq!(format_relative_time(0, 3_600_000 + 61_999), "-1h 1m");
        assert_eq!(format_relative_time(0, 59_999), "-59s");
        assert_eq!(format_relative_time(10, 5), "0s");
    }

    #[test]
    fn string_errors_are_generic_errors() {
        let info = ErrorInput::from("plain string error").normalize();
        assert_eq!(info.error_type, "Error");
        assert_eq!(info.message, "plain string error");
        assert_eq!(info.stack, None);
    }

    #[test]
    fn unknown_shapes_are_coerced() {
        let cases = [
            (json!(42), "42"),
            (json!(1.5), "1.5"),
            (json!(1e21), "1e+21"),
            (json!(-2.5e22), "-2.5e+22"),
            (json!(1e20), "100000000000000000000"),
            (json!(3.0), "3"),
            (json!(null), "null"),
            (json!([1, null, "a"]), "1,,a"),
            (json!({"code": 1}), "[object Object]"),
        ];
        for (value, expected) in cases {
            let info = ErrorInput::from(value).normalize();
            assert_eq!(info.error_type, "Unknown");
            assert_eq!(info.message, expected);
        }
    }

    #[test]
    fn error_like_objects_are_structured() {
        let info = ErrorInput::from(json!({
            "name": "TypeError",
            "message": "x is undefined",
            "stack": "at render (app.js:1)"
        }))
        .normalize();
        assert_eq!(info.error_type, "TypeError");
        assert_eq!(info.stack.as_deref(), Some("at render (app.js:1)"));
    }

    #[test]
    fn rust_errors_use_concrete_type() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let info = ErrorInput::from_error(&err).normalize();
        assert_eq!(info.error_type, "Error");
        assert_eq!(info.message, "disk full");

        let parse = "x".parse::<i32>().unwrap_err();
        assert_eq!(ErrorInput::from_error(&parse).normalize().error_type, "ParseIntError");

        let chained = anyhow::anyhow!("root").context("while saving");
        let info = ErrorInput::from(chained).normalize();
        assert_eq!(info.message, "while saving");
        assert_eq!(info.stack.as_deref(), Some("Caused by: root"));
    }

    #[test]
    fn assembles_report_with_relative_times() {
        let env = StaticEnvironment::new("https://app.test/settings")
            .with_user_agent("test-agent")
            .with_viewport(800, 600);
        let now = Utc.timestamp_millis_opt(1_000_000).unwrap();
        env.freeze_at(Some(now));

        let actions = vec![
            Action {
                timestamp: 1_000_000 - 125_000,
                page: "/settings".into(),
                data: ActionData::Navigation {
                    from: "/".into(),
                    to: "/settings".into(),
                },
            },
            Action {
                timestamp: 1_000_000,
                page: "/settings".into(),
                data: ActionData::Console {
                    level: ConsoleLevel::Warn,
                    message: "slow".into(),
                    args: vec!["slow".into()],
                },
            },
        ];

        let report = assemble_report(actions, &"boom".into(), &env, None);
        assert!(report.report_id.starts_with("err_"));
        assert_eq!(report.timestamp, now);
        assert_eq!(report.context.url, "https://app.test/settings");
        assert_eq!(report.context.viewport, Viewport { width: 800, height: 600 });
        let times: Vec<&str> = report.actions.iter().map(|a| a.relative_time.as_str()).collect();
        assert_eq!(times, vec!["-2m 5s", "0s"]);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("user").is_none());
        assert_eq!(json["error"], json!({"message": "boom", "type": "Error"}));
        assert_eq!(json["context"]["userAgent"], "test-agent");
        assert_eq!(json["actions"][0]["relativeTime"], "-2m 5s");
        assert_eq!(json["actions"][0]["kind"], "navigation");
    }

    #[test]
    fn report_ids_are_unique() {
        let now = Utc::now();
        let a = generate_report_id(now);
        let b = generate_report_id(now);
        assert_ne!(a, b);
    }
}
