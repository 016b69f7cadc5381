//! Declarative field extraction.
//!
//! A [`FieldDecl`] names an output key, a path relative to the element being
//! extracted, and a [`FieldMode`]. [`extract`] interprets one declaration;
//! adding a field to a record shape is a schema edit, never new code.

use crate::xml::{Element, ElementPath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How matched elements are turned into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMode {
    /// Joined text of the first match, trimmed.
    Scalar,
    /// Like `Scalar`, with interior whitespace runs collapsed.
    JoinedText,
    /// One joined-text entry per match, in document order.
    List,
    /// `attribute value -> joined text` per match; later matches overwrite.
    AttributeMap,
    /// Value of `attribute` on the first match.
    Attribute,
    /// `Year-Month-Day` children of the first match, empty parts skipped.
    Date,
}

impl FieldMode {
    /// Modes that read the declaration's `attribute`.
    pub fn needs_attribute(self) -> bool {
        matches!(self, Self::AttributeMap | Self::Attribute)
    }
}

/// One `{output key, path, mode}` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub key: String,
    pub path: ElementPath,
    pub mode: FieldMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl FieldDecl {
    pub fn new(key: impl Into<String>, path: ElementPath, mode: FieldMode) -> Self {
        Self {
            key: key.into(),
            path,
            mode,
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}

/// A nested entity: a small fixed-shape mapping.
pub type Entity = BTreeMap<String, FieldValue>;

/// An extracted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
    Entities(Vec<Entity>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_entities(&self) -> Option<&[Entity]> {
        match self {
            Self::Entities(entities) => Some(entities),
            _ => None,
        }
    }

    /// Absent and empty are the same thing for every field.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Map(map) => map.is_empty(),
            Self::Entities(entities) => entities.is_empty(),
        }
    }
}

/// Apply one declaration to `root`. Missing paths give empty values, never
/// errors.
pub fn extract(root: &Element, decl: &FieldDecl) -> FieldValue {
    let attribute = decl.attribute.as_deref().unwrap_or_default();
    match decl.mode {
        FieldMode::Scalar => FieldValue::Text(
            decl.path
                .first(root)
                .map(Element::joined_text)
                .unwrap_or_default(),
        ),
        FieldMode::JoinedText => FieldValue::Text(
            decl.path
                .first(root)
                .map(Element::normalized_text)
                .unwrap_or_default(),
        ),
        FieldMode::List => FieldValue::List(
            decl.path
                .resolve(root)
                .into_iter()
                .map(Element::joined_text)
                .collect(),
        ),
        FieldMode::AttributeMap => {
            let mut map = BTreeMap::new();
            for element in decl.path.resolve(root) {
                let key = element.attribute(attribute).unwrap_or_default().to_string();
                map.insert(key, element.joined_text());
            }
            FieldValue::Map(map)
        }
        FieldMode::Attribute => FieldValue::Text(
            decl.path
                .first(root)
                .and_then(|element| element.attribute(attribute))
                .unwrap_or_default()
                .trim()
                .to_string(),
        ),
        FieldMode::Date => FieldValue::Text(decl.path.first(root).map(date_text).unwrap_or_default()),
    }
}

fn date_text(element: &Element) -> String {
    ["Year", "Month", "Day"]
        .iter()
        .filter_map(|part| element.children().find(|child| child.name() == *part))
        .map(Element::joined_text)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(key: &str, path: &str, mode: FieldMode) -> FieldDecl {
        FieldDecl::new(key, path.parse().unwrap(), mode)
    }

    fn citation() -> Element {
        Element::parse(
            r#"<MedlineCitation Status="MEDLINE">
                 <Article>
                   <ArticleTitle>Binding   of <i>cadmium</i>
                     to carbonic anhydrase</ArticleTitle>
                   <Abstract>
                     <AbstractText Label="BACKGROUND">First.</AbstractText>
                     <AbstractText Label="RESULTS">Second <sub>2</sub>.</AbstractText>
                   </Abstract>
                   <PublicationTypeList>
                     <PublicationType UI="D016428">Journal Article</PublicationType>
                     <PublicationType UI="D013487">Research Support</PublicationType>
                     <PublicationType>Untyped</PublicationType>
                   </PublicationTypeList>
                 </Article>
                 <DateCompleted><Year>2001</Year><Month>03</Month><Day>15</Day></DateCompleted>
                 <DateRevised><Year>2019</Year><Month></Month></DateRevised>
               </MedlineCitation>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_scalar_takes_first_match_joined_text() {
        let root = citation();
        let value = extract(&root, &decl("abstract", "Article/Abstract/AbstractText", FieldMode::Scalar));
        assert_eq!(value, FieldValue::Text("First.".to_string()));
    }

    #[test]
    fn test_missing_path_is_empty_not_error() {
        let root = citation();
        for mode in [FieldMode::Scalar, FieldMode::JoinedText, FieldMode::Attribute, FieldMode::Date] {
            let value = extract(&root, &decl("x", "Article/Nope", mode).with_attribute("UI"));
            assert_eq!(value, FieldValue::Text(String::new()));
        }
        assert!(extract(&root, &decl("x", "Nope", FieldMode::List)).is_empty());
        assert!(extract(&root, &decl("x", "Nope", FieldMode::AttributeMap).with_attribute("UI")).is_empty());
    }

    #[test]
    fn test_joined_text_collapses_interior_whitespace() {
        let root = citation();
        let value = extract(&root, &decl("title", "Article/ArticleTitle", FieldMode::JoinedText));
        assert_eq!(value.as_text(), Some("Binding of cadmium to carbonic anhydrase"));
    }

    #[test]
    fn test_list_preserves_document_order() {
        let root = citation();
        let value = extract(&root, &decl("abstract", "Article/Abstract/AbstractText", FieldMode::List));
        assert_eq!(value.as_list().unwrap(), ["First.", "Second 2."]);
    }

    #[test]
    fn test_attribute_map_keys_and_missing_attribute() {
        let root = citation();
        let value = extract(
            &root,
            &decl("publication_types", "Article/PublicationTypeList/PublicationType", FieldMode::AttributeMap)
                .with_attribute("UI"),
        );
        let map = value.as_map().unwrap();
        assert_eq!(map.get("D016428").map(String::as_str), Some("Journal Article"));
        assert_eq!(map.get("D013487").map(String::as_str), Some("Research Support"));
        assert_eq!(map.get("").map(String::as_str), Some("Untyped"));
    }

    #[test]
    fn test_attribute_map_last_write_wins() {
        let root = Element::parse(r#"<r><v k="K">a</v><v k="J">c</v><v k="K">b</v></r>"#).unwrap();
        let value = extract(&root, &decl("m", "v", FieldMode::AttributeMap).with_attribute("k"));
        let map = value.as_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["K"], "b");
        assert_eq!(map["J"], "c");
    }

    #[test]
    fn test_attribute_mode_reads_first_match() {
        let root = citation();
        let status = extract(&root, &decl("status", ".", FieldMode::Attribute).with_attribute("Status"));
        assert_eq!(status.as_text(), Some("MEDLINE"));
        let label = extract(
            &root,
            &decl("label", "Article/Abstract/AbstractText", FieldMode::Attribute).with_attribute("Label"),
        );
        assert_eq!(label.as_text(), Some("BACKGROUND"));
    }

    #[test]
    fn test_date_mode_skips_empty_parts() {
        let root = citation();
        assert_eq!(
            extract(&root, &decl("d", "DateCompleted", FieldMode::Date)).as_text(),
            Some("2001-03-15")
        );
        assert_eq!(
            extract(&root, &decl("d", "DateRevised", FieldMode::Date)).as_text(),
            Some("2019")
        );
    }

    #[test]
    fn test_field_value_serializes_untagged() {
        let mut entity = Entity::new();
        entity.insert("lastname".into(), FieldValue::Text("Curie".into()));
        let json = serde_json::to_value(FieldValue::Entities(vec![entity])).unwrap();
        assert_eq!(json, serde_json::json!([{ "lastname": "Curie" }]));

        let list: FieldValue = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(list, FieldValue::List(vec!["a".into(), "b".into()]));
        let map: FieldValue = serde_json::from_str(r#"{"K":"v"}"#).unwrap();
        assert_eq!(map.as_map().unwrap()["K"], "v");
    }
}
