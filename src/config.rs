//! Entity and pass configuration.
//!
//! One TOML file describes one entity kind:
//!
//! ```toml
//! [entity]
//! tag = "activity"
//! natural_keys = ["ticket_id", "task_no"]
//! modified_field = "modified_at"
//! source_table = "service_activities"
//!
//! [sync]
//! safety_margin = "1d"
//! store_timeout = "30s"
//!
//! [[lookups]]
//! field = "technician_id"
//! target_field = "technician_name"
//! table = "technicians"
//! key_column = "id"
//! value_column = "name"
//!
//! [destination]
//! table = "synced_records"
//! ```

mod duration;

pub use duration::{parse_chrono_duration, parse_duration_to_secs, parse_std_duration};

use crate::reference::Lookup;
use crate::sync::{PassConfig, DEFAULT_CIRCUIT_BREAKER_THRESHOLD};
use crate::PassOverrides;
use anyhow::{bail, Context, Result};
use checkpoint::{Checkpoint, Watermark, DEFAULT_EPOCH_RFC3339};
use serde::Deserialize;
use std::path::Path;
use sync_core::{EntityTag, IdentityResolver, DEFAULT_MAX_DIAGNOSTICS};
use watermark_sync_postgresql_sink::DestinationTable;
use watermark_sync_postgresql_source::SourceTable;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub entity: EntityConfig,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub lookups: Vec<Lookup>,
    pub destination: DestinationSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityConfig {
    pub tag: String,
    /// Natural key fields, in identity order.
    pub natural_keys: Vec<String>,
    pub modified_field: String,
    pub source_table: String,
    #[serde(default)]
    pub source_schema: Option<String>,
    #[serde(default)]
    pub payload_columns: Vec<String>,
    /// Static SQL predicate excluding rows outside the entity's domain.
    #[serde(default)]
    pub exclusion_predicate: Option<String>,
    /// IANA zone for source timestamps stored without a time zone.
    #[serde(default = "default_timezone")]
    pub source_timezone: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SyncSection {
    pub safety_margin: String,
    pub store_timeout: Option<String>,
    pub circuit_breaker_threshold: usize,
    pub max_diagnostics: usize,
    pub default_epoch: String,
    pub dry_run: bool,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            safety_margin: "1d".to_string(),
            store_timeout: None,
            circuit_breaker_threshold: DEFAULT_CIRCUIT_BREAKER_THRESHOLD,
            max_diagnostics: DEFAULT_MAX_DIAGNOSTICS,
            default_epoch: DEFAULT_EPOCH_RFC3339.to_string(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DestinationSection {
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl FileConfig {
    /// Load and parse a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.entity.modified_field.trim().is_empty() {
            bail!("entity.modified_field must not be empty");
        }
        if self.entity.source_table.trim().is_empty() {
            bail!("entity.source_table must not be empty");
        }
        if self.destination.table.trim().is_empty() {
            bail!("destination.table must not be empty");
        }
        for lookup in &self.lookups {
            if self.entity.natural_keys.contains(&lookup.target_field) {
                bail!(
                    "lookup target '{}' collides with a natural key field",
                    lookup.target_field
                );
            }
        }
        Ok(())
    }

    pub fn source_table(&self) -> SourceTable {
        SourceTable {
            schema: self.entity.source_schema.clone(),
            table: self.entity.source_table.clone(),
            columns: self.extraction_columns(),
            modified_column: self.entity.modified_field.clone(),
            exclusion_predicate: self.entity.exclusion_predicate.clone(),
        }
    }

    pub fn destination_table(&self) -> DestinationTable {
        DestinationTable::new(self.destination.schema.clone(), self.destination.table.clone())
    }

    /// Build the pass configuration, with command-line overrides applied.
    pub fn pass_config(&self, overrides: &PassOverrides) -> Result<PassConfig> {
        let tag = EntityTag::new(self.entity.tag.clone()).context("Invalid entity.tag")?;
        let identity = IdentityResolver::new(tag, self.entity.natural_keys.clone())
            .context("Invalid entity.natural_keys")?;

        let mut config = PassConfig::new(identity, self.entity.modified_field.clone());
        config.payload_columns = self.entity.payload_columns.clone();
        config.lookups = self.lookups.clone();

        let margin = overrides
            .safety_margin
            .as_deref()
            .unwrap_or(&self.sync.safety_margin);
        config.safety_margin =
            parse_chrono_duration(margin).context("Invalid safety margin")?;

        let timeout = overrides
            .store_timeout
            .as_deref()
            .or(self.sync.store_timeout.as_deref());
        config.store_timeout = timeout
            .map(parse_std_duration)
            .transpose()
            .context("Invalid store timeout")?;

        config.circuit_breaker_threshold = overrides
            .circuit_breaker_threshold
            .unwrap_or(self.sync.circuit_breaker_threshold);
        if config.circuit_breaker_threshold == 0 {
            bail!("circuit_breaker_threshold must be at least 1");
        }
        config.max_diagnostics = self.sync.max_diagnostics;
        config.default_epoch =
            Watermark::parse(&self.sync.default_epoch).context("Invalid sync.default_epoch")?;
        config.dry_run = overrides.dry_run || self.sync.dry_run;
        config.incremental_from = overrides
            .incremental_from
            .as_deref()
            .map(Watermark::from_cli_string)
            .transpose()
            .context("Invalid --incremental-from")?;

        Ok(config)
    }

    /// Columns the extraction query must select; empty selects all.
    pub fn extraction_columns(&self) -> Vec<String> {
        if self.entity.payload_columns.is_empty() {
            return Vec::new();
        }
        let mut columns = self.entity.natural_keys.clone();
        columns.push(self.entity.modified_field.clone());
        columns.extend(self.entity.payload_columns.iter().cloned());
        columns.extend(self.lookups.iter().map(|l| l.field.clone()));
        let mut seen = std::collections::HashSet::new();
        columns.retain(|c| seen.insert(c.clone()));
        columns
    }
}
