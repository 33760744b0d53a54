use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;

use crate::config::{ErrorPolicy, RouterConfig};
use crate::envelope::Envelope;
use crate::error::{DmlError, MiddlewareError, Result};
use crate::message::Message;
use crate::table::DispatchTable;

/// Observer notified of every delivered message.
pub trait Middleware: Send {
    fn observe(&mut self, message: &Message) -> std::result::Result<(), MiddlewareError>;

    /// Called once after the last message of a run. Buffered sinks flush here.
    fn finish(&mut self) -> std::result::Result<(), MiddlewareError> {
        Ok(())
    }
}

impl<F> Middleware for F
where
    F: FnMut(&Message) -> std::result::Result<(), MiddlewareError> + Send,
{
    fn observe(&mut self, message: &Message) -> std::result::Result<(), MiddlewareError> {
        self(message)
    }
}

/// What happened to a routed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Decoded and observed by every middleware.
    Delivered,
    /// No decoder registered; skipped by policy.
    SkippedUnknown,
    /// Envelope or record malformed; skipped by policy.
    SkippedMalformed,
}

/// Running counts of routing outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub delivered: u64,
    pub skipped_unknown: u64,
    pub skipped_malformed: u64,
}

/// Routes envelopes to their decoder and fans decoded messages out to middleware.
pub struct Router {
    table: Arc<DispatchTable>,
    middleware: Vec<Box<dyn Middleware>>,
    config: RouterConfig,
    stats: RouterStats,
    reported_unknown: HashSet<(u8, u8)>,
}

impl Router {
    /// Create a router with default (fail-fast) config.
    pub fn new(table: Arc<DispatchTable>) -> Self {
        Self::with_config(table, RouterConfig::default())
    }

    pub fn with_config(table: Arc<DispatchTable>, config: RouterConfig) -> Self {
        Self {
            table,
            middleware: Vec::new(),
            config,
            stats: RouterStats::default(),
            reported_unknown: HashSet::new(),
        }
    }

    /// Append an observer. Observers run in registration order.
    pub fn register_middleware(&mut self, middleware: impl Middleware + 'static) {
        self.middleware.push(Box::new(middleware));
    }

    /// Decode a data frame payload and route it.
    pub fn route_frame(&mut self, payload: Bytes) -> Result<Outcome> {
        match Envelope::decode(payload) {
            Ok(envelope) => self.handle(envelope),
            Err(err) => match self.config.on_malformed {
                ErrorPolicy::Fail => Err(DmlError::Envelope(err)),
                ErrorPolicy::Skip => {
                    tracing::warn!(error = %err, "skipping malformed envelope");
                    self.stats.skipped_malformed += 1;
                    Ok(Outcome::SkippedMalformed)
                }
            },
        }
    }

    /// Decode an envelope's record and deliver it to every middleware.
    pub fn handle(&mut self, envelope: Envelope) -> Result<Outcome> {
        let Envelope {
            service_id,
            order_number,
            payload,
            ..
        } = envelope;

        let Some(entry) = self.table.lookup(service_id, order_number) else {
            return match self.config.on_unknown {
                ErrorPolicy::Fail => Err(DmlError::UnknownMessage {
                    service_id,
                    order_number,
                }),
                ErrorPolicy::Skip => {
                    if self.reported_unknown.insert((service_id, order_number)) {
                        tracing::warn!(service_id, order_number, "skipping unknown message");
                    } else {
                        tracing::debug!(service_id, order_number, "skipping unknown message");
                    }
                    self.stats.skipped_unknown += 1;
                    Ok(Outcome::SkippedUnknown)
                }
            };
        };

        let fields = match entry.decode(&payload) {
            Ok(fields) => fields,
            Err(source) => {
                return match self.config.on_malformed {
                    ErrorPolicy::Fail => Err(DmlError::Decode {
                        service_id,
                        order_number,
                        name: entry.name.to_string(),
                        source,
                    }),
                    ErrorPolicy::Skip => {
                        tracing::warn!(
                            service_id,
                            order_number,
                            name = %entry.name,
                            error = %source,
                            "skipping malformed message"
                        );
                        self.stats.skipped_malformed += 1;
                        Ok(Outcome::SkippedMalformed)
                    }
                };
            }
        };

        let message = Message {
            service_id,
            order_number,
            service: Arc::clone(&entry.service),
            name: Arc::clone(&entry.name),
            fields,
        };
        tracing::trace!(service_id, order_number, name = %message.name, "delivering message");

        for (index, middleware) in self.middleware.iter_mut().enumerate() {
            middleware
                .observe(&message)
                .map_err(|source| DmlError::Middleware {
                    index,
                    name: message.name.to_string(),
                    source,
                })?;
        }

        self.stats.delivered += 1;
        Ok(Outcome::Delivered)
    }

    /// Tell every middleware that no more messages will arrive.
    pub fn finish(&mut self) -> Result<()> {
        for (index, middleware) in self.middleware.iter_mut().enumerate() {
            middleware
                .finish()
                .map_err(|source| DmlError::MiddlewareFinish { index, source })?;
        }
        Ok(())
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }
}
