//! Component schemas: the properties and methods known for each custom tag.
//!
//! Schemas come from an external analyzer as JSON and are frozen into a
//! `SchemaTable` before any document is walked.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::RenameError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInfo {
    /// The schema key is a plain identifier (not computed, not inherited).
    #[serde(default)]
    pub is_renameable: bool,
    /// Declared with a function type.
    #[serde(default)]
    pub is_method: bool,
}

impl PropertyInfo {
    pub fn renameable() -> Self {
        Self {
            is_renameable: true,
            is_method: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MethodInfo {
    #[serde(default)]
    pub is_renameable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSchema {
    pub tag_name: String,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, PropertyInfo>,
    #[serde(default)]
    pub methods: HashMap<String, MethodInfo>,
}

impl ComponentSchema {
    pub fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, name: &str, info: PropertyInfo) -> Self {
        self.properties.insert(name.to_string(), info);
        self
    }

    pub fn with_method(mut self, name: &str, is_renameable: bool) -> Self {
        self.methods
            .insert(name.to_string(), MethodInfo { is_renameable });
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.get(name)
    }

    /// Methods first; a function-typed property is accepted as a fallback.
    pub fn method_renameable(&self, name: &str) -> Option<bool> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.is_renameable);
        }
        self.properties
            .get(name)
            .filter(|p| p.is_method)
            .map(|p| p.is_renameable)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPE NAMES
// ═══════════════════════════════════════════════════════════════════════════════

/// `foo-bar-baz` -> `FooBarBazElement`. Tags without a hyphen have no type.
pub fn default_type_name(tag_name: &str) -> Option<String> {
    match tag_name {
        "dom-if" => return Some("Polymer.DomIf".to_string()),
        "dom-repeat" => return Some("Polymer.DomRepeat".to_string()),
        _ => {}
    }
    if !tag_name.contains('-') {
        return None;
    }
    let mut name = String::with_capacity(tag_name.len() + 7);
    for part in tag_name.split('-').filter(|p| !p.is_empty()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
    }
    name.push_str("Element");
    Some(name)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCHEMA TABLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Write-once table of schemas, keyed by tag name.
#[derive(Debug, Clone, Default)]
pub struct SchemaTable {
    schemas: HashMap<String, ComponentSchema>,
    type_name_overrides: HashMap<String, String>,
}

impl SchemaTable {
    /// Builds the table. A tag defined twice aborts the whole run.
    pub fn build(
        schemas: Vec<ComponentSchema>,
        type_name_overrides: HashMap<String, String>,
    ) -> Result<Self, RenameError> {
        let mut table = HashMap::with_capacity(schemas.len());
        for schema in schemas {
            if table.contains_key(&schema.tag_name) {
                return Err(RenameError::DuplicateComponent {
                    tag_name: schema.tag_name,
                });
            }
            table.insert(schema.tag_name.clone(), schema);
        }
        Ok(Self {
            schemas: table,
            type_name_overrides,
        })
    }

    pub fn from_json(
        json: &str,
        type_name_overrides: HashMap<String, String>,
    ) -> Result<Self, RenameError> {
        let schemas: Vec<ComponentSchema> = serde_json::from_str(json)?;
        Self::build(schemas, type_name_overrides)
    }

    pub fn get(&self, tag_name: &str) -> Option<&ComponentSchema> {
        self.schemas.get(tag_name)
    }

    pub fn contains(&self, tag_name: &str) -> bool {
        self.schemas.contains_key(tag_name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Override, then the schema's own type name, then the derived default.
    pub fn type_name(&self, tag_name: &str) -> Option<String> {
        if let Some(name) = self.type_name_overrides.get(tag_name) {
            return Some(name.clone());
        }
        if let Some(name) = self.schemas.get(tag_name).and_then(|s| s.type_name.clone()) {
            return Some(name);
        }
        default_type_name(tag_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_type_name() {
        assert_eq!(default_type_name("foo-bar").as_deref(), Some("FooBarElement"));
        assert_eq!(default_type_name("x-a-b").as_deref(), Some("XABElement"));
        assert_eq!(default_type_name("dom-repeat").as_deref(), Some("Polymer.DomRepeat"));
        assert_eq!(default_type_name("dom-if").as_deref(), Some("Polymer.DomIf"));
        assert_eq!(default_type_name("div"), None);
    }

    #[test]
    fn test_duplicate_tag_is_fatal() {
        let result = SchemaTable::build(
            vec![ComponentSchema::new("foo-bar"), ComponentSchema::new("foo-bar")],
            HashMap::new(),
        );
        match result {
            Err(RenameError::DuplicateComponent { tag_name }) => assert_eq!(tag_name, "foo-bar"),
            other => panic!("expected duplicate error, got {:?}", other),
        }
    }

    #[test]
    fn test_type_name_precedence() {
        let mut overrides = HashMap::new();
        overrides.insert("foo-bar".to_string(), "App.FooBar".to_string());
        let mut typed = ComponentSchema::new("baz-qux");
        typed.type_name = Some("Custom.BazQux".to_string());
        let table = SchemaTable::build(
            vec![ComponentSchema::new("foo-bar"), typed, ComponentSchema::new("a-b")],
            overrides,
        )
        .unwrap();
        assert_eq!(table.type_name("foo-bar").as_deref(), Some("App.FooBar"));
        assert_eq!(table.type_name("baz-qux").as_deref(), Some("Custom.BazQux"));
        assert_eq!(table.type_name("a-b").as_deref(), Some("ABElement"));
        assert_eq!(table.type_name("unknown-tag").as_deref(), Some("UnknownTagElement"));
    }

    #[test]
    fn test_method_lookup_falls_back_to_function_property() {
        let schema = ComponentSchema::new("foo-bar")
            .with_method("compute", true)
            .with_property(
                "callback",
                PropertyInfo {
                    is_renameable: false,
                    is_method: true,
                },
            )
            .with_property("value", PropertyInfo::renameable());
        assert_eq!(schema.method_renameable("compute"), Some(true));
        assert_eq!(schema.method_renameable("callback"), Some(false));
        assert_eq!(schema.method_renameable("value"), None, "plain properties are not methods");
        assert_eq!(schema.method_renameable("missing"), None);
    }

    #[test]
    fn test_schema_json() {
        let json = r#"[{
            "tagName": "foo-bar",
            "properties": {"bar": {"isRenameable": true}, "baz": {"isRenameable": false, "isMethod": true}},
            "methods": {"go": {"isRenameable": true}}
        }]"#;
        let table = SchemaTable::from_json(json, HashMap::new()).unwrap();
        let schema = table.get("foo-bar").unwrap();
        assert!(schema.property("bar").unwrap().is_renameable);
        assert!(schema.property("baz").unwrap().is_method);
        assert_eq!(schema.method_renameable("go"), Some(true));
        assert_eq!(table.len(), 1);
    }
}
