use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::{DecodeError, DmlError, Result};
use crate::message::Fields;

/// Decoder for one message kind's record bytes.
pub type DecodeFn = Arc<dyn Fn(&[u8]) -> std::result::Result<Fields, DecodeError> + Send + Sync>;

/// One `(service_id, order_number)` registration.
#[derive(Clone)]
pub struct DispatchEntry {
    pub service_id: u8,
    pub order_number: u8,
    pub service: Arc<str>,
    pub name: Arc<str>,
    decode: DecodeFn,
}

impl DispatchEntry {
    /// Run this entry's decoder.
    pub fn decode(&self, payload: &[u8]) -> std::result::Result<Fields, DecodeError> {
        (self.decode)(payload)
    }
}

impl fmt::Debug for DispatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEntry")
            .field("service_id", &self.service_id)
            .field("order_number", &self.order_number)
            .field("service", &self.service)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A protocol service that contributes decoders to a dispatch table.
pub trait Service {
    /// Service name, carried into every message it decodes.
    fn name(&self) -> &str;

    /// Register this service's message kinds.
    fn register(&self, builder: &mut DispatchTableBuilder) -> Result<()>;
}

/// Collects registrations during startup.
///
/// Registering a pair twice is rejected, so configuration mistakes surface
/// before any capture is decoded.
#[derive(Default)]
pub struct DispatchTableBuilder {
    entries: HashMap<(u8, u8), DispatchEntry>,
}

impl DispatchTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder for `(service_id, order_number)`.
    pub fn register<F>(
        &mut self,
        service_id: u8,
        order_number: u8,
        service: &str,
        name: &str,
        decode: F,
    ) -> Result<()>
    where
        F: Fn(&[u8]) -> std::result::Result<Fields, DecodeError> + Send + Sync + 'static,
    {
        match self.entries.entry((service_id, order_number)) {
            Entry::Occupied(existing) => Err(DmlError::DuplicateEntry {
                service_id,
                order_number,
                existing: format!("{}.{}", existing.get().service, existing.get().name),
                attempted: format!("{service}.{name}"),
            }),
            Entry::Vacant(slot) => {
                slot.insert(DispatchEntry {
                    service_id,
                    order_number,
                    service: Arc::from(service),
                    name: Arc::from(name),
                    decode: Arc::new(decode),
                });
                Ok(())
            }
        }
    }

    /// Let a service register all of its message kinds.
    pub fn register_service(&mut self, service: &dyn Service) -> Result<()> {
        let before = self.entries.len();
        service.register(self)?;
        tracing::debug!(
            service = service.name(),
            entries = self.entries.len() - before,
            "registered service"
        );
        Ok(())
    }

    /// Number of registrations so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze the registrations.
    pub fn build(self) -> DispatchTable {
        DispatchTable {
            entries: self.entries,
        }
    }
}

/// Immutable mapping from `(service_id, order_number)` to decoder.
#[derive(Debug, Default)]
pub struct DispatchTable {
    entries: HashMap<(u8, u8), DispatchEntry>,
}

impl DispatchTable {
    pub fn builder() -> DispatchTableBuilder {
        DispatchTableBuilder::new()
    }

    pub fn lookup(&self, service_id: u8, order_number: u8) -> Option<&DispatchEntry> {
        self.entries.get(&(service_id, order_number))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, sorted by service then order.
    pub fn entries(&self) -> Vec<&DispatchEntry> {
        let mut entries: Vec<&DispatchEntry> = self.entries.values().collect();
        entries.sort_unstable_by_key(|entry| (entry.service_id, entry.order_number));
        entries
    }

    /// Registered services as `(service_id, name, message count)`, sorted by id.
    pub fn services(&self) -> Vec<(u8, Arc<str>, usize)> {
        let mut services: BTreeMap<u8, (Arc<str>, usize)> = BTreeMap::new();
        for entry in self.entries.values() {
            services
                .entry(entry.service_id)
                .or_insert_with(|| (Arc::clone(&entry.service), 0))
                .1 += 1;
        }
        services
            .into_iter()
            .map(|(id, (name, count))| (id, name, count))
            .collect()
    }
}
