/// Error returned by a middleware observer.
pub type MiddlewareError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from splitting a data frame into its envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// The frame payload cannot hold the envelope header.
    #[error("envelope too short ({len} bytes, need at least 4)")]
    TooShort { len: usize },
}

/// Errors from decoding a typed payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    /// The payload ended before a field could be read.
    #[error("field `{field}` needs {needed} bytes, {available} left")]
    Truncated {
        field: String,
        needed: usize,
        available: usize,
    },

    /// Any other structural problem reported by a decoder.
    #[error("{0}")]
    Malformed(String),
}

/// Errors from building dispatch tables and routing messages.
#[derive(Debug, thiserror::Error)]
pub enum DmlError {
    /// A decoder is already registered for this pair.
    #[error("duplicate registration for service {service_id}, order {order_number}: {attempted} conflicts with {existing}")]
    DuplicateEntry {
        service_id: u8,
        order_number: u8,
        existing: String,
        attempted: String,
    },

    /// A service definition cannot be turned into dispatch entries.
    #[error("invalid service {service}: {message}")]
    InvalidService { service: String, message: String },

    /// No decoder is registered for this pair.
    #[error("unknown message (service {service_id}, order {order_number})")]
    UnknownMessage { service_id: u8, order_number: u8 },

    /// The frame payload is not a valid envelope.
    #[error("bad envelope: {0}")]
    Envelope(#[from] EnvelopeError),

    /// A registered decoder rejected the payload.
    #[error("failed to decode {name} (service {service_id}, order {order_number}): {source}")]
    Decode {
        service_id: u8,
        order_number: u8,
        name: String,
        #[source]
        source: DecodeError,
    },

    /// A middleware observer failed.
    #[error("middleware #{index} failed on {name}: {source}")]
    Middleware {
        index: usize,
        name: String,
        #[source]
        source: MiddlewareError,
    },

    /// A middleware observer failed while finishing the run.
    #[error("middleware #{index} failed to finish: {source}")]
    MiddlewareFinish {
        index: usize,
        #[source]
        source: MiddlewareError,
    },
}

/// Errors from loading service definitions.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A definition file or directory could not be read.
    #[error("failed to load service definitions: {0}")]
    LoadFailed(String),

    /// A definition is not valid JSON or does not match the expected shape.
    #[error("invalid service definition JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A definition parsed but is inconsistent.
    #[error("invalid service definition {service}: {message}")]
    Invalid { service: String, message: String },
}

pub type Result<T> = std::result::Result<T, DmlError>;
