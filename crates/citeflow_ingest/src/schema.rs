//! Record schemas: versionable configuration describing one record shape.
//!
//! A schema is plain TOML. The built-in PubMed schema is embedded from
//! `schemas/pubmed.toml`; `citeflow schema` prints it so it can be edited and
//! passed back with `--schema`.

use crate::error::SchemaError;
use crate::extract::FieldDecl;
use crate::xml::ElementPath;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const PUBMED_SCHEMA: &str = include_str!("../schemas/pubmed.toml");

/// Keys the canonical record always carries at top level.
pub const RESERVED_KEYS: [&str; 4] = ["identifier", "version", "source_file", "schema"];

/// Where the record's natural key and its revision number live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierDecl {
    pub path: ElementPath,
    /// Attribute on the identifier element holding the version.
    #[serde(default = "default_version_attribute")]
    pub version_attribute: String,
    /// Version assumed when the attribute is absent or not an integer.
    #[serde(default = "default_version")]
    pub default_version: i64,
}

fn default_version_attribute() -> String {
    "Version".to_string()
}

fn default_version() -> i64 {
    1
}

/// A repeating nested entity (authors, grants, ...) with its own field list,
/// evaluated relative to each matched entity element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDecl {
    pub key: String,
    pub path: ElementPath,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

/// Complete description of one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub name: String,
    pub version: u32,
    /// Tag of the repeating record element inside the container.
    pub record_tag: String,
    pub identifier: IdentifierDecl,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub entities: Vec<EntityDecl>,
}

impl RecordSchema {
    /// The built-in PubMed citation schema.
    pub fn pubmed() -> Result<Self, SchemaError> {
        Self::from_toml_str(PUBMED_SCHEMA)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SchemaError> {
        let schema: RecordSchema = toml::from_str(content)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load and validate a schema from a TOML file.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, SchemaError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// `name@version`, stored alongside every record for provenance.
    pub fn tag(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::invalid("schema name is empty"));
        }
        if self.record_tag.trim().is_empty() {
            return Err(SchemaError::invalid("record_tag is empty"));
        }
        if self.identifier.version_attribute.trim().is_empty() {
            return Err(SchemaError::invalid("identifier.version_attribute is empty"));
        }

        let mut seen = HashSet::new();
        let top_level_keys = self
            .fields
            .iter()
            .map(|field| field.key.as_str())
            .chain(self.entities.iter().map(|entity| entity.key.as_str()));
        for key in top_level_keys {
            if RESERVED_KEYS.contains(&key) {
                return Err(SchemaError::invalid(format!("field key '{}' is reserved", key)));
            }
            check_key(key, &mut seen, "record")?;
        }

        for field in &self.fields {
            check_attribute(field, "record")?;
        }
        for entity in &self.entities {
            let mut entity_keys = HashSet::new();
            for field in &entity.fields {
                check_key(&field.key, &mut entity_keys, &entity.key)?;
                check_attribute(field, &entity.key)?;
            }
        }
        Ok(())
    }
}

fn check_key<'a>(key: &'a str, seen: &mut HashSet<&'a str>, scope: &str) -> Result<(), SchemaError> {
    if key.trim().is_empty() {
        return Err(SchemaError::invalid(format!("empty field key in {}", scope)));
    }
    if !seen.insert(key) {
        return Err(SchemaError::invalid(format!(
            "duplicate field key '{}' in {}",
            key, scope
        )));
    }
    Ok(())
}

fn check_attribute(field: &FieldDecl, scope: &str) -> Result<(), SchemaError> {
    let has_attribute = field
        .attribute
        .as_deref()
        .is_some_and(|attr| !attr.trim().is_empty());
    if field.mode.needs_attribute() && !has_attribute {
        return Err(SchemaError::invalid(format!(
            "field '{}' in {} uses mode {:?} but names no attribute",
            field.key, scope, field.mode
        )));
    }
    Ok(())
}
