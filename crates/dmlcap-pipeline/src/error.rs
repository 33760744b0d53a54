use dmlcap_dml::DmlError;
use dmlcap_frame::FrameError;

use crate::queue::QueueError;

/// Errors that end a decoding run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The configured queue capacity cannot hold a frame.
    #[error("invalid queue capacity {0} (must be at least 1)")]
    InvalidCapacity(usize),

    /// The capture could not be read or framed.
    #[error("error reading frame {index}: {source}")]
    Frame {
        /// 1-based index of the frame that failed.
        index: u64,
        #[source]
        source: FrameError,
    },

    /// A data frame could not be routed.
    #[error(transparent)]
    Route(#[from] DmlError),

    /// The run was cancelled before the capture ended.
    #[error("decoding cancelled")]
    Cancelled,

    /// The queue was closed while a stage still expected it open.
    #[error("frame queue closed unexpectedly")]
    QueueClosed,

    /// The producer thread could not be started.
    #[error("failed to spawn frame producer: {0}")]
    Spawn(#[source] std::io::Error),

    /// The producer thread panicked.
    #[error("frame producer panicked")]
    ProducerPanicked,
}

impl From<QueueError> for PipelineError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Cancelled => Self::Cancelled,
            QueueError::Closed => Self::QueueClosed,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
