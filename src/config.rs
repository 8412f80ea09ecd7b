//! Run configuration.
//!
//! Every field has a default so callers may pass `{}` (or nothing at all).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::RenameError;

pub const DEFAULT_NAMESPACE: &str = "polymerRename";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RenameOptions {
    /// Global object the recording calls are made on.
    pub namespace: String,
    /// Tag name -> type name, consulted before any derived name.
    pub type_name_overrides: HashMap<String, String>,
    /// Elements whose content is never scanned for bindings.
    pub raw_text_tags: Vec<String>,
    /// Emit `as` / `index-as` attribute values as renameable references.
    pub rename_repeat_aliases: bool,
    /// Path fragments skipped during discovery.
    pub excluded_paths: Vec<String>,
    /// Extensions (without the dot) treated as template documents.
    pub file_extensions: Vec<String>,
}

impl Default for RenameOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            type_name_overrides: HashMap::new(),
            raw_text_tags: vec!["style".to_string(), "script".to_string()],
            rename_repeat_aliases: false,
            excluded_paths: vec!["node_modules".to_string(), "bower_components".to_string()],
            file_extensions: vec!["html".to_string()],
        }
    }
}

impl RenameOptions {
    pub fn from_json(json: &str) -> Result<Self, RenameError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, RenameError> {
        let json = std::fs::read_to_string(path).map_err(|source| RenameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn is_raw_text_tag(&self, tag_name: &str) -> bool {
        self.raw_text_tags
            .iter()
            .any(|t| t.eq_ignore_ascii_case(tag_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let opts = RenameOptions::from_json("{}").unwrap();
        assert_eq!(opts, RenameOptions::default());
        assert_eq!(opts.namespace, "polymerRename");
        assert!(opts.is_raw_text_tag("STYLE"));
    }

    #[test]
    fn test_partial_json() {
        let opts = RenameOptions::from_json(
            r#"{"namespace": "rn", "typeNameOverrides": {"x-app": "App.Main"}, "renameRepeatAliases": true}"#,
        )
        .unwrap();
        assert_eq!(opts.namespace, "rn");
        assert_eq!(opts.type_name_overrides.get("x-app").map(String::as_str), Some("App.Main"));
        assert!(opts.rename_repeat_aliases);
        assert_eq!(opts.file_extensions, vec!["html".to_string()]);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = RenameOptions::from_json("{\"namespace\": 3}").unwrap_err();
        assert_eq!(err.code(), crate::error::ERR_CONFIG);
    }
}
