//! DML message decoding: envelopes, dispatch tables and routing.
//!
//! A data frame's payload is an [`Envelope`] naming a service and an order
//! number. The [`DispatchTable`] maps each `(service_id, order_number)` pair
//! to a decoder; the [`Router`] runs that decoder and hands the resulting
//! [`Message`] to every registered [`Middleware`].
//!
//! Service tables come from outside the core, either as [`Service`]
//! implementations or as JSON definitions loaded into a [`Catalog`].

pub mod catalog;
pub mod config;
pub mod envelope;
pub mod error;
pub mod field;
pub mod message;
pub mod router;
pub mod table;

pub use catalog::{Catalog, MessageDefinition, ServiceDefinition};
pub use config::{CatalogConfig, ErrorPolicy, RouterConfig};
pub use envelope::{Envelope, ENVELOPE_HEADER_SIZE};
pub use error::{CatalogError, DecodeError, DmlError, EnvelopeError, MiddlewareError, Result};
pub use field::{decode_record, FieldSpec, FieldType, FieldValue};
pub use message::{Fields, Message};
pub use router::{Middleware, Outcome, Router, RouterStats};
pub use table::{DecodeFn, DispatchEntry, DispatchTable, DispatchTableBuilder, Service};
