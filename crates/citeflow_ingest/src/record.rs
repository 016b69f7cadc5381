//! Record assembly: one record element in, one canonical record out.

use crate::extract::{extract, Entity, FieldValue};
use crate::schema::{EntityDecl, RecordSchema};
use crate::xml::Element;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The assembled, schema-shaped value for one record.
///
/// Serializes as a flat JSON object: the four fixed keys followed by the
/// schema's fields in key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub identifier: String,
    pub version: i64,
    /// Ledger name of the input file this record was read from.
    pub source_file: String,
    /// `name@version` of the schema that produced the record.
    pub schema: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl CanonicalRecord {
    pub fn has_identifier(&self) -> bool {
        !self.identifier.is_empty()
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Text of a scalar field, `""` when absent or not text.
    pub fn text(&self, key: &str) -> &str {
        self.field(key).and_then(FieldValue::as_text).unwrap_or_default()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode without a schema. An empty entity list has no JSON shape of
    /// its own and comes back as an empty `List`; use [`Self::from_json_for`]
    /// when the schema is known.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Decode and restore the field types declared by `schema`.
    pub fn from_json_for(json: &str, schema: &RecordSchema) -> Result<Self, serde_json::Error> {
        let mut record = Self::from_json(json)?;
        record.conform(schema);
        Ok(record)
    }

    /// Retype empty entity groups that decoded as empty lists.
    pub fn conform(&mut self, schema: &RecordSchema) {
        for entity in &schema.entities {
            if let Some(value) = self.fields.get_mut(&entity.key) {
                if matches!(value, FieldValue::List(items) if items.is_empty()) {
                    *value = FieldValue::Entities(Vec::new());
                }
            }
        }
    }
}

/// Applies a [`RecordSchema`] to record elements.
#[derive(Debug, Clone)]
pub struct RecordAssembler {
    schema: Arc<RecordSchema>,
    schema_tag: String,
}

impl RecordAssembler {
    pub fn new(schema: Arc<RecordSchema>) -> Self {
        let schema_tag = schema.tag();
        Self { schema, schema_tag }
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub fn record_tag(&self) -> &str {
        &self.schema.record_tag
    }

    /// Assemble one record. Never fails: missing fields are empty, and a
    /// missing identifier yields an empty `identifier` for the reconciler to
    /// reject.
    pub fn assemble(&self, element: &Element, source_file: &str) -> CanonicalRecord {
        let (identifier, version) = self.identity(element);

        let mut fields = BTreeMap::new();
        for decl in &self.schema.fields {
            fields.insert(decl.key.clone(), extract(element, decl));
        }
        for entity in &self.schema.entities {
            fields.insert(entity.key.clone(), assemble_entities(element, entity));
        }

        CanonicalRecord {
            identifier,
            version,
            source_file: source_file.to_string(),
            schema: self.schema_tag.clone(),
            fields,
        }
    }

    fn identity(&self, element: &Element) -> (String, i64) {
        let decl = &self.schema.identifier;
        let Some(id_element) = decl.path.first(element) else {
            return (String::new(), decl.default_version);
        };

        let identifier = id_element.joined_text();
        let version = match id_element.attribute(&decl.version_attribute) {
            Some(raw) => raw.trim().parse::<i64>().unwrap_or_else(|_| {
                tracing::debug!(
                    identifier = %identifier,
                    raw_version = raw,
                    "Non-numeric version, using default"
                );
                decl.default_version
            }),
            None => decl.default_version,
        };
        (identifier, version)
    }
}

fn assemble_entities(record: &Element, decl: &EntityDecl) -> FieldValue {
    let entities = decl
        .path
        .resolve(record)
        .into_iter()
        .map(|element| {
            decl.fields
                .iter()
                .map(|field| (field.key.clone(), extract(element, field)))
                .collect::<Entity>()
        })
        .collect();
    FieldValue::Entities(entities)
}
