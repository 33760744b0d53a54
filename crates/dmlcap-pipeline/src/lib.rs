//! Capture decoding runs.
//!
//! [`run_sequential`] reads, decodes and dispatches on one thread.
//! [`run_pipelined`] moves frame reading onto a producer thread connected to
//! the decoding thread by a [`bounded`] queue. Either way, messages reach the
//! router's middleware in capture order and exactly once.

pub mod cancel;
pub mod config;
pub mod error;
pub mod queue;
pub mod runner;
pub mod stats;

pub use cancel::CancellationToken;
pub use config::{Mode, PipelineConfig, ReadErrorPolicy, DEFAULT_QUEUE_CAPACITY};
pub use error::{PipelineError, Result};
pub use queue::{bounded, QueueError, QueueReceiver, QueueSender};
pub use runner::{run, run_pipelined, run_sequential};
pub use stats::RunStats;
