//! Log multiplexing.
//!
//! - [`LogSplitter`] turns two output channels into stdout, stderr and
//!   combined line sources
//! - [`LogPrinter`] drains one source into a [`LineOutput`] and/or a listener
//! - [`LineListenerProxy`] fans the combined stream out with history replay
//! - [`LogCapture`] runs all of the above against a live container

mod capture;
mod output;
mod printer;
mod proxy;
mod splitter;

pub use capture::{CaptureOptions, LogCapture};
pub use output::{BufferOutput, LineOutput, StderrOutput, StdoutOutput, TracingOutput};
pub use printer::LogPrinter;
pub use proxy::LineListenerProxy;
pub use splitter::{LineSource, LogSink, LogSplitter, LogStream, MAX_PARTIAL_LINE};
