//! Event timeline and console projection for workflow generation and runs.
//!
//! Stream items, errors and run lifecycle markers are appended to an
//! [`EventTimeline`]; [`to_rows`] turns a sorted snapshot into display rows
//! with phase separators, and [`summarize`] / [`stringify`] produce the text
//! each row shows.

pub mod errors;
pub mod events;
pub mod format;
pub mod payload;
pub mod recorder;
pub mod rows;
pub mod signals;
pub mod stringify;

pub use errors::{SignalClosed, StringifyError};
pub use events::{EventEntry, EventKind, EventTimeline};
pub use format::{KindMeta, Palette, copy_text, fmt_time, inline_snippet, kind_meta};
pub use payload::{JsonConvertible, Payload, SharedPayload};
pub use recorder::TimelineRecorder;
pub use rows::{Row, summarize, to_rows};
pub use signals::{RunOutcome, RunSignal, RunSignalReceiver, RunSignalSender, run_channel};
pub use stringify::{stringify, stringify_checked};
