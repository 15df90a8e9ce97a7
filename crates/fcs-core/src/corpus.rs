// fcs-gateway is a federated corpus search gateway.
// Copyright (C) 2024 fcs-gateway contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Per-corpus resource descriptions and the process-wide registry.
//! Populated once at startup from a directory of per-corpus config files;
//! read-only afterwards.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

pub use fcsql::resource::{Layer, PosAttr, StructureMapping};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown corpus: {0}")]
    NotFound(String),

    #[error("no corpora selected")]
    NoCorpora,
}

/// Everything the gateway knows about one searchable corpus.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusResource {
    pub name: String,
    /// Path the corpus manager resolves the corpus under; opaque here, it
    /// travels verbatim in job payloads.
    pub registry_path: String,
    #[serde(default)]
    pub pos_attrs: Vec<PosAttr>,
    #[serde(default)]
    pub structure_mapping: StructureMapping,
    /// Persistent identifier reported back as the `ref` of every row.
    pub uri: String,
}

/// Ordered, immutable corpus lookup. Order is the configuration order and
/// determines job publishing and merge order.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: Vec<CorpusResource>,
}

impl ResourceRegistry {
    pub fn new(resources: Vec<CorpusResource>) -> Self {
        ResourceRegistry { resources }
    }

    pub fn get(&self, name: &str) -> Result<&CorpusResource, RegistryError> {
        self.resources
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn list_all(&self) -> Vec<String> {
        self.resources.iter().map(|r| r.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CorpusResource> {
        self.resources.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// The ordered intersection of positional attribute names across the
    /// given corpora. Order comes from the first corpus; used as the
    /// retrieval attribute list of a federated search.
    pub fn common_pos_attr_names(&self, names: &[String]) -> Result<Vec<String>, RegistryError> {
        let mut corpora = names.iter();
        let first = corpora.next().ok_or(RegistryError::NoCorpora)?;

        let mut common: Vec<String> = self
            .get(first)?
            .pos_attrs
            .iter()
            .map(|a| a.name.clone())
            .collect();

        for name in corpora {
            let rsc = self.get(name)?;
            common.retain(|attr| rsc.pos_attrs.iter().any(|a| &a.name == attr));
        }
        Ok(common)
    }
}

/// Loads every `*.toml` file in `dir` as one corpus resource. Files are
/// visited in file-name order so the registry order is stable across runs.
pub fn load_resources(dir: impl AsRef<Path>) -> crate::Result<ResourceRegistry> {
    let dir = dir.as_ref();
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list resource dir '{}'", dir.display()))?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    let mut resources = Vec::with_capacity(paths.len());
    for path in paths {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read resource config '{}'", path.display()))?;
        let resource: CorpusResource = toml::from_str(&raw)
            .with_context(|| format!("failed to parse resource config '{}'", path.display()))?;
        tracing::info!(corpus = %resource.name, "loaded corpus resource");
        resources.push(resource);
    }

    Ok(ResourceRegistry::new(resources))
}
