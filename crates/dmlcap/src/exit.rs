use std::fmt;
use std::io;

use dmlcap_dml::{CatalogError, DmlError};
use dmlcap_frame::FrameError;
use dmlcap_pipeline::PipelineError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;
/// 128 + SIGINT.
pub const CANCELLED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_code(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => USAGE,
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => DATA_INVALID,
        io::ErrorKind::BrokenPipe => FAILURE,
        _ => INTERNAL,
    }
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(io_code(err.kind()), format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn dml_error(context: &str, err: DmlError) -> CliError {
    let code = match &err {
        DmlError::UnknownMessage { .. } | DmlError::Envelope(_) | DmlError::Decode { .. } => {
            DATA_INVALID
        }
        DmlError::DuplicateEntry { .. } | DmlError::InvalidService { .. } => USAGE,
        DmlError::Middleware { source, .. } | DmlError::MiddlewareFinish { source, .. } => source
            .downcast_ref::<io::Error>()
            .map(|err| io_code(err.kind()))
            .unwrap_or(FAILURE),
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn catalog_error(context: &str, err: CatalogError) -> CliError {
    let code = match &err {
        CatalogError::LoadFailed(_) => USAGE,
        CatalogError::Json(_) | CatalogError::Invalid { .. } => DATA_INVALID,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn pipeline_error(context: &str, err: PipelineError) -> CliError {
    match err {
        PipelineError::InvalidCapacity(_) => CliError::new(USAGE, format!("{context}: {err}")),
        PipelineError::Frame { index, source } => {
            frame_error(&format!("{context}: frame {index}"), source)
        }
        PipelineError::Route(err) => dml_error(context, err),
        PipelineError::Cancelled => CliError::new(CANCELLED, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
