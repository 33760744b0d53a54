//! Decode recorded DML game protocol captures into structured messages.
//!
//! # Crate Structure
//!
//! - [`frame`]: length-prefixed framing of the capture stream
//! - [`dml`]: envelopes, dispatch tables, routing and JSON service catalogs
//! - [`pipeline`]: sequential and pipelined decoding runs

/// Re-export frame types.
pub mod frame {
    pub use dmlcap_frame::*;
}

/// Re-export DML decoding types.
pub mod dml {
    pub use dmlcap_dml::*;
}

/// Re-export pipeline types.
pub mod pipeline {
    pub use dmlcap_pipeline::*;
}
