/// What the router does when a message cannot be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Abort the run with an error.
    #[default]
    Fail,
    /// Count the message, log it, and continue with the next one.
    Skip,
}

/// Controls message routing behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouterConfig {
    /// Applied when no decoder is registered for a message's pair.
    pub on_unknown: ErrorPolicy,
    /// Applied when an envelope or record is structurally invalid.
    pub on_malformed: ErrorPolicy,
}

impl RouterConfig {
    /// Fail on every undeliverable message.
    pub fn strict() -> Self {
        Self::default()
    }

    /// Skip undeliverable messages and keep decoding.
    pub fn lenient() -> Self {
        Self {
            on_unknown: ErrorPolicy::Skip,
            on_malformed: ErrorPolicy::Skip,
        }
    }
}

/// Limits for loading service definitions from a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Maximum number of definition files loaded from a directory.
    pub max_services: usize,
    /// Maximum bytes allowed per definition file.
    pub max_file_size: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_services: 256,
            max_file_size: 1024 * 1024,
        }
    }
}
