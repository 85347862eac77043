use std::fs;
use std::path::Path;
use std::sync::Arc;

use papaya::HashMap as PapayaMap;
use serde_json::Value;

use crate::error::{ElementModelError, Result};
use crate::storage::SchemaRepository;
use crate::types::StructureDefinition;

/// In-memory schema repository.
///
/// Definitions keep their insertion order, which is the order root lookups
/// scan them in. Snapshots missing from a definition are produced on demand
/// by promoting its differential and cached per canonical URL.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    definitions: Vec<Arc<StructureDefinition>>,
    by_url: PapayaMap<String, usize>,
    snapshots: PapayaMap<String, Arc<StructureDefinition>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Adds a definition. A later definition with the same URL replaces the
    /// earlier one in the URL index but both stay in scan order.
    pub fn add(&mut self, definition: StructureDefinition) -> Arc<StructureDefinition> {
        let definition = Arc::new(definition);
        let index = self.definitions.len();
        self.definitions.push(Arc::clone(&definition));
        if let Some(url) = definition.url_str() {
            self.by_url.pin().insert(url.to_string(), index);
        }
        definition
    }

    pub fn with_definition(mut self, definition: StructureDefinition) -> Self {
        self.add(definition);
        self
    }

    /// Loads a StructureDefinition, or every StructureDefinition entry of a Bundle.
    pub fn load_json(&mut self, value: Value) -> Result<usize> {
        match value.get("resourceType").and_then(Value::as_str) {
            Some("StructureDefinition") => {
                let definition: StructureDefinition = serde_json::from_value(value)?;
                self.add(definition);
                Ok(1)
            }
            Some("Bundle") => {
                let mut loaded = 0;
                let entries = value
                    .get("entry")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                for entry in entries {
                    let Some(resource) = entry.get("resource") else {
                        continue;
                    };
                    if resource.get("resourceType").and_then(Value::as_str)
                        == Some("StructureDefinition")
                    {
                        let definition: StructureDefinition =
                            serde_json::from_value(resource.clone())?;
                        self.add(definition);
                        loaded += 1;
                    }
                }
                Ok(loaded)
            }
            other => Err(ElementModelError::definition(format!(
                "Expected a StructureDefinition or Bundle, found {}",
                other.unwrap_or("no resourceType")
            ))),
        }
    }

    pub fn load_str(&mut self, json: &str) -> Result<usize> {
        let value: Value = serde_json::from_str(json)?;
        self.load_json(value)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        let content = fs::read_to_string(path)?;
        self.load_str(&content)
    }

    /// Loads every `*.json` file of a directory in file-name order.
    ///
    /// Files that are not definitions or bundles are skipped with a warning.
    pub fn load_directory(&mut self, dir: &Path) -> Result<usize> {
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            match self.load_file(&path) {
                Ok(count) => loaded += count,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                }
            }
        }
        tracing::info!(
            "Loaded {} structure definitions from {}",
            loaded,
            dir.display()
        );
        Ok(loaded)
    }

    fn snapshot_key(definition: &StructureDefinition) -> String {
        definition
            .url_str()
            .map(str::to_string)
            .unwrap_or_else(|| format!("type:{}", definition.type_name))
    }
}

impl SchemaRepository for MemoryRepository {
    fn all_structures(&self) -> Vec<Arc<StructureDefinition>> {
        self.definitions.clone()
    }

    fn fetch_structure(&self, url: &str) -> Option<Arc<StructureDefinition>> {
        let url = url.split('|').next().unwrap_or(url);
        let index = *self.by_url.pin().get(url)?;
        self.definitions.get(index).cloned()
    }

    fn generate_snapshot(
        &self,
        definition: &Arc<StructureDefinition>,
    ) -> Result<Arc<StructureDefinition>> {
        if definition.has_snapshot() {
            return Ok(Arc::clone(definition));
        }
        let key = Self::snapshot_key(definition);
        if let Some(cached) = self.snapshots.pin().get(&key) {
            return Ok(Arc::clone(cached));
        }
        tracing::debug!("Generating snapshot for {}", key);
        let generated = Arc::new(definition.promote_differential()?);
        self.snapshots.pin().insert(key, Arc::clone(&generated));
        Ok(generated)
    }
}
