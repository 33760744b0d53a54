//! Service definitions loaded from JSON files.
//!
//! Each `*.service.json` file describes one service and the record layout of
//! each message it can carry:
//!
//! ```json
//! {
//!   "service_id": 5,
//!   "name": "GAME",
//!   "messages": [
//!     { "order": 2, "name": "MSG_POSITION", "fields": [ { "name": "x", "type": "INT" } ] }
//!   ]
//! }
//! ```
//!
//! `order` may be left out of every message in a service, in which case
//! messages are numbered from 1 in name order.

use std::collections::{BTreeSet, HashSet};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::config::CatalogConfig;
use crate::error::{CatalogError, DmlError, Result};
use crate::field::{decode_record, FieldSpec};
use crate::table::{DispatchTable, DispatchTableBuilder, Service};

const DEFINITION_SUFFIX: &str = ".service.json";

/// One service's message table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDefinition {
    pub service_id: u8,
    pub name: String,
    #[serde(default)]
    pub messages: Vec<MessageDefinition>,
}

/// One message kind within a service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageDefinition {
    #[serde(default)]
    pub order: Option<u8>,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl ServiceDefinition {
    /// Parse and check a definition.
    pub fn from_json(json: &str) -> std::result::Result<Self, CatalogError> {
        let definition: Self = serde_json::from_str(json)?;
        definition.resolved_messages()?;
        Ok(definition)
    }

    /// Messages paired with their order numbers, in order-number order.
    pub fn resolved_messages(
        &self,
    ) -> std::result::Result<Vec<(u8, &MessageDefinition)>, CatalogError> {
        let explicit = self.messages.iter().filter(|m| m.order.is_some()).count();

        let mut resolved: Vec<(u8, &MessageDefinition)> = if explicit == self.messages.len() {
            self.messages
                .iter()
                .filter_map(|m| m.order.map(|order| (order, m)))
                .collect()
        } else if explicit == 0 {
            let mut by_name: Vec<&MessageDefinition> = self.messages.iter().collect();
            by_name.sort_by(|a, b| a.name.cmp(&b.name));
            let mut numbered = Vec::with_capacity(by_name.len());
            for (index, message) in by_name.into_iter().enumerate() {
                let order = u8::try_from(index + 1).map_err(|_| self.invalid(format!(
                    "{} messages exceed the 255 implicit order numbers",
                    self.messages.len()
                )))?;
                numbered.push((order, message));
            }
            numbered
        } else {
            return Err(self.invalid(format!(
                "{explicit} of {} messages set `order`; set it on all or none",
                self.messages.len()
            )));
        };

        resolved.sort_by_key(|(order, _)| *order);
        for pair in resolved.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(self.invalid(format!(
                    "order {} used by both {} and {}",
                    pair[0].0, pair[0].1.name, pair[1].1.name
                )));
            }
        }

        let mut names = HashSet::new();
        for (_, message) in &resolved {
            if !names.insert(message.name.as_str()) {
                return Err(self.invalid(format!("message {} defined twice", message.name)));
            }
            let mut fields = HashSet::new();
            for field in &message.fields {
                if !fields.insert(field.name.as_str()) {
                    return Err(self.invalid(format!(
                        "field {} appears twice in message {}",
                        field.name, message.name
                    )));
                }
            }
        }

        Ok(resolved)
    }

    fn invalid(&self, message: String) -> CatalogError {
        CatalogError::Invalid {
            service: self.name.clone(),
            message,
        }
    }
}

impl Service for ServiceDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&self, builder: &mut DispatchTableBuilder) -> Result<()> {
        let messages = self
            .resolved_messages()
            .map_err(|err| DmlError::InvalidService {
                service: self.name.clone(),
                message: err.to_string(),
            })?;

        for (order, message) in messages {
            let fields: Arc<[FieldSpec]> = Arc::from(message.fields.clone());
            builder.register(
                self.service_id,
                order,
                &self.name,
                &message.name,
                move |payload: &[u8]| decode_record(&fields, payload),
            )?;
        }
        Ok(())
    }
}

/// A set of service definitions, one per service id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    services: Vec<ServiceDefinition>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition. Service ids and names must be unique within a catalog.
    pub fn add(&mut self, definition: ServiceDefinition) -> std::result::Result<(), CatalogError> {
        definition.resolved_messages()?;
        if let Some(existing) = self
            .services
            .iter()
            .find(|s| s.service_id == definition.service_id || s.name == definition.name)
        {
            return Err(CatalogError::Invalid {
                service: definition.name.clone(),
                message: format!(
                    "conflicts with service {} (id {})",
                    existing.name, existing.service_id
                ),
            });
        }
        self.services.push(definition);
        Ok(())
    }

    /// Load from embedded definition strings.
    pub fn from_embedded(definitions: &[&str]) -> std::result::Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for json in definitions {
            catalog.add(ServiceDefinition::from_json(json)?)?;
        }
        Ok(catalog)
    }

    /// Load every `*.service.json` file in a directory.
    pub fn from_directory(path: &Path) -> std::result::Result<Self, CatalogError> {
        Self::from_directory_with_config(path, CatalogConfig::default())
    }

    /// Load every `*.service.json` file in a directory with explicit limits.
    ///
    /// Files are loaded in name order. Symlinked definitions are refused;
    /// files without the definition suffix are ignored.
    pub fn from_directory_with_config(
        path: &Path,
        config: CatalogConfig,
    ) -> std::result::Result<Self, CatalogError> {
        let entries = std::fs::read_dir(path)
            .map_err(|err| CatalogError::LoadFailed(format!("{}: {err}", path.display())))?;

        let mut files = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|err| CatalogError::LoadFailed(err.to_string()))?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !file_name.to_ascii_lowercase().ends_with(DEFINITION_SUFFIX) {
                continue;
            }
            files.insert(file_name);
        }

        if files.len() > config.max_services {
            return Err(CatalogError::LoadFailed(format!(
                "definition count exceeds configured max ({}): {}",
                config.max_services,
                files.len()
            )));
        }

        let mut catalog = Self::new();
        for file_name in files {
            let json = read_definition(&path.join(&file_name), &file_name, &config)?;
            let definition = ServiceDefinition::from_json(&json).map_err(|err| match err {
                CatalogError::Json(err) => {
                    CatalogError::LoadFailed(format!("{file_name}: {err}"))
                }
                other => other,
            })?;
            tracing::debug!(
                file = %file_name,
                service = %definition.name,
                service_id = definition.service_id,
                messages = definition.messages.len(),
                "loaded service definition"
            );
            catalog.add(definition)?;
        }

        Ok(catalog)
    }

    pub fn services(&self) -> &[ServiceDefinition] {
        &self.services
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Register every service into a table under construction.
    pub fn register_into(&self, builder: &mut DispatchTableBuilder) -> Result<()> {
        for service in &self.services {
            builder.register_service(service)?;
        }
        Ok(())
    }

    /// Build a dispatch table holding exactly this catalog's services.
    pub fn build_table(&self) -> Result<DispatchTable> {
        let mut builder = DispatchTable::builder();
        self.register_into(&mut builder)?;
        Ok(builder.build())
    }
}

fn read_definition(
    path: &Path,
    file_name: &str,
    config: &CatalogConfig,
) -> std::result::Result<String, CatalogError> {
    let path_metadata =
        std::fs::symlink_metadata(path).map_err(|err| CatalogError::LoadFailed(err.to_string()))?;
    if path_metadata.file_type().is_symlink() {
        return Err(CatalogError::LoadFailed(format!(
            "refusing to load definition symlink: {file_name}"
        )));
    }
    if !path_metadata.is_file() {
        return Err(CatalogError::LoadFailed(format!(
            "definition is not a regular file: {file_name}"
        )));
    }

    let file = std::fs::File::open(path).map_err(|err| {
        CatalogError::LoadFailed(format!("failed opening {}: {err}", path.display()))
    })?;
    let opened_metadata = file
        .metadata()
        .map_err(|err| CatalogError::LoadFailed(err.to_string()))?;

    #[cfg(unix)]
    {
        if !same_file_identity(&path_metadata, &opened_metadata) {
            return Err(CatalogError::LoadFailed(format!(
                "definition changed during load: {file_name}"
            )));
        }
    }

    if opened_metadata.len() > config.max_file_size as u64 {
        return Err(CatalogError::LoadFailed(format!(
            "definition too large ({} bytes): {file_name}",
            opened_metadata.len()
        )));
    }

    let read_limit = u64::try_from(config.max_file_size.saturating_add(1)).unwrap_or(u64::MAX);
    let mut content = String::new();
    file.take(read_limit)
        .read_to_string(&mut content)
        .map_err(|err| {
            CatalogError::LoadFailed(format!("failed reading {}: {err}", path.display()))
        })?;
    if content.len() > config.max_file_size {
        return Err(CatalogError::LoadFailed(format!(
            "definition too large while reading: {file_name}"
        )));
    }
    Ok(content)
}

#[cfg(unix)]
fn same_file_identity(
    path_metadata: &std::fs::Metadata,
    opened_metadata: &std::fs::Metadata,
) -> bool {
    use std::os::unix::fs::MetadataExt;
    path_metadata.dev() == opened_metadata.dev() && path_metadata.ino() == opened_metadata.ino()
}
