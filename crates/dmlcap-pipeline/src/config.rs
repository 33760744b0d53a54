/// Frames in flight between reader and decoder by default.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4;

/// How frames get from the reader to the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Read, decode and dispatch on one thread.
    #[default]
    Sequential,
    /// Read on a producer thread, decode and dispatch on the caller's thread.
    Pipelined,
}

/// What to do when the capture cannot be read or framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadErrorPolicy {
    /// End the run with the frame error, after routing every frame read before it.
    #[default]
    Propagate,
    /// Log the error and end the run as if the capture ended cleanly.
    Truncate,
}

/// Controls a decoding run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub mode: Mode,
    /// Bounded queue size for [`Mode::Pipelined`]. Must be at least 1.
    pub queue_capacity: usize,
    pub on_read_error: ReadErrorPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Sequential,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            on_read_error: ReadErrorPolicy::Propagate,
        }
    }
}

impl PipelineConfig {
    pub fn pipelined() -> Self {
        Self {
            mode: Mode::Pipelined,
            ..Self::default()
        }
    }
}
