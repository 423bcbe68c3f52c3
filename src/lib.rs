//! # bugtrail
//!
//! What happened right before it broke.
//!
//! Records user actions into a bounded history and turns it into a
//! privacy-sanitized error report when something fails.
//!
//! ## Features
//!
//! - **Recording**: clicks, committed input values, navigation, network calls, console warnings
//! - **Privacy**: sensitive fields and card/SSN-shaped values are redacted before storage
//! - **Reports**: error + environment + recent actions with relative timing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bugtrail::prelude::*;
//!
//! let nav = ManualSource::new(ActionKind::Navigation);
//! let mut recorder = Recorder::new(RecorderConfig::default())?
//!     .with_source(nav.clone())
//!     .on_error(|report| println!("{}", report.report_id));
//! recorder.start();
//!
//! nav.emit(RawEvent::Navigation { from: None, to: "/checkout".into() });
//!
//! let report = recorder.report_uncaught("payment failed");
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! # Ok::<(), anyhow::Error>(())
//! ```

// Re-export core element identification
pub use bugtrail_core as core;
pub use bugtrail_core::{Error, ErrorCode, Result};

// Re-export recorder
pub use bugtrail_recorder as recorder;
pub use bugtrail_recorder::{
    Action, ActionData, ActionKind, ErrorInput, ErrorReport, Recorder, RecorderConfig, ReportStorage,
};

/// Prelude - import everything you need
pub mod prelude {
    pub use bugtrail_core::prelude::*;
    pub use bugtrail_recorder::prelude::*;
}
