//! bugtrail-recorder - bounded action history and error reports
//!
//! Event sources push normalized [`Action`]s into a fixed-capacity ring owned
//! by a [`Recorder`]. On error, the recorder assembles an [`ErrorReport`] from
//! the buffered actions, the environment and the error itself.
//!
//! Sensitive input values never reach the buffer: they are replaced with
//! `[SANITIZED]` before the action is built.

pub mod buffer;
pub mod env;
pub mod events;
pub mod normalize;
pub mod recorder;
pub mod report;
pub mod sanitize;
pub mod source;
pub mod storage;

pub use buffer::HistoryBuffer;
pub use env::{EnvironmentProvider, StaticEnvironment, Viewport};
pub use events::*;
pub use normalize::{ActionFactory, NetworkOutcome};
pub use recorder::{Recorder, RecorderConfig, Toggle};
pub use report::{format_relative_time, ErrorInput, ErrorReport};
pub use sanitize::{Sanitizer, SANITIZED_MARKER};
pub use source::{ActionSink, ActionSource, ChannelSource, ManualSource, RawEvent, SourceContext, Unregister};
pub use storage::ReportStorage;

pub mod prelude {
    pub use crate::env::{EnvironmentProvider, StaticEnvironment};
    pub use crate::events::*;
    pub use crate::recorder::{Recorder, RecorderConfig, Toggle};
    pub use crate::report::{ErrorInput, ErrorReport};
    pub use crate::source::{ActionSource, ChannelSource, ManualSource, RawEvent};
    pub use crate::storage::ReportStorage;
}
