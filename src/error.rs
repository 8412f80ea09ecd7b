use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_DUPLICATE_COMPONENT: &str = "PR-ERR-SCHEMA-001";
pub const ERR_UNKNOWN_TYPE: &str = "PR-ERR-SCHEMA-002";
pub const ERR_MISSING_MODULE_ID: &str = "PR-ERR-MODULE-001";
pub const ERR_MALFORMED_LOCATION: &str = "PR-ERR-LOCATION-001";
pub const ERR_MARKUP: &str = "PR-ERR-MARKUP-001";
pub const ERR_FRAGMENT_SYNTAX: &str = "PR-ERR-RECOVER-001";
pub const ERR_CONTRACT: &str = "PR-ERR-RECOVER-002";
pub const ERR_UNSUPPORTED_REFERENCE: &str = "PR-ERR-RECOVER-003";
pub const ERR_INVALID_RANGE: &str = "PR-ERR-SPLICE-001";
pub const ERR_OVERLAPPING_RANGE: &str = "PR-ERR-SPLICE-002";
pub const ERR_SOURCE_MAP: &str = "PR-ERR-SOURCEMAP-001";
pub const ERR_IO: &str = "PR-ERR-IO-001";
pub const ERR_CONFIG: &str = "PR-ERR-CONFIG-001";

// ═══════════════════════════════════════════════════════════════════════════════
// FATAL ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Conditions that abort a run, or abort the affected document.
#[derive(Debug, Error)]
pub enum RenameError {
    #[error("Multiple component definitions found for tag '{tag_name}'")]
    DuplicateComponent { tag_name: String },

    #[error("Unable to determine type of tag '{tag_name}'")]
    UnknownType { tag_name: String },

    #[error("{document_id}:{line}:{column}: dom-module is missing an id attribute")]
    MissingModuleId {
        document_id: String,
        line: u32,
        column: u32,
    },

    #[error(
        "{document_id}:{line}:{column}: location of attribute '{attribute}' on <{tag_name}> does not match the source text"
    )]
    MalformedLocation {
        document_id: String,
        tag_name: String,
        attribute: String,
        line: u32,
        column: u32,
    },

    #[error("{document_id}:{line}:{column}: {message}")]
    Markup {
        document_id: String,
        message: String,
        line: u32,
        column: u32,
    },

    #[error("Unable to parse renamed fragment: {message}")]
    FragmentSyntax { message: String },

    #[error(
        "{document_id} [{start}, {end}): renamed reference '{found}' does not begin with base '{base}'"
    )]
    Contract {
        document_id: String,
        start: u32,
        end: u32,
        found: String,
        base: String,
    },

    #[error("{document_id} [{start}, {end}): unsupported reference expression in '{kind}' call")]
    UnsupportedReference {
        document_id: String,
        start: u32,
        end: u32,
        kind: String,
    },

    #[error("{document_id}: replacement range [{start}, {end}) is outside the document (length {len})")]
    InvalidRange {
        document_id: String,
        start: u32,
        end: u32,
        len: usize,
    },

    #[error("{document_id}: replacement [{start}, {end}) overlaps a replacement starting at {next_start}")]
    OverlappingRange {
        document_id: String,
        start: u32,
        end: u32,
        next_start: u32,
    },

    #[error("Invalid source map: {message}")]
    SourceMap { message: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid options: {0}")]
    Config(#[from] serde_json::Error),
}

impl RenameError {
    pub fn code(&self) -> &'static str {
        match self {
            RenameError::DuplicateComponent { .. } => ERR_DUPLICATE_COMPONENT,
            RenameError::UnknownType { .. } => ERR_UNKNOWN_TYPE,
            RenameError::MissingModuleId { .. } => ERR_MISSING_MODULE_ID,
            RenameError::MalformedLocation { .. } => ERR_MALFORMED_LOCATION,
            RenameError::Markup { .. } => ERR_MARKUP,
            RenameError::FragmentSyntax { .. } => ERR_FRAGMENT_SYNTAX,
            RenameError::Contract { .. } => ERR_CONTRACT,
            RenameError::UnsupportedReference { .. } => ERR_UNSUPPORTED_REFERENCE,
            RenameError::InvalidRange { .. } => ERR_INVALID_RANGE,
            RenameError::OverlappingRange { .. } => ERR_OVERLAPPING_RANGE,
            RenameError::SourceMap { .. } => ERR_SOURCE_MAP,
            RenameError::Io { .. } => ERR_IO,
            RenameError::Config(_) => ERR_CONFIG,
        }
    }

    /// The document this error is scoped to, if it is not run-wide.
    pub fn document_id(&self) -> Option<&str> {
        match self {
            RenameError::MissingModuleId { document_id, .. }
            | RenameError::MalformedLocation { document_id, .. }
            | RenameError::Markup { document_id, .. }
            | RenameError::Contract { document_id, .. }
            | RenameError::UnsupportedReference { document_id, .. }
            | RenameError::InvalidRange { document_id, .. }
            | RenameError::OverlappingRange { document_id, .. } => Some(document_id),
            _ => None,
        }
    }
}

/// Serializable view of a `RenameError` for JSON / NAPI consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub document_id: Option<String>,
}

impl From<&RenameError> for Diagnostic {
    fn from(err: &RenameError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            document_id: err.document_id().map(str::to_string),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WARNINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// A recoverable problem. Recorded and reported, never interrupts processing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub document_id: String,
    /// Owning component tag (or the element tag the problem was found on).
    pub tag_name: String,
    pub message: String,
}

impl Warning {
    pub fn new(document_id: &str, tag_name: &str, message: impl Into<String>) -> Self {
        Self {
            document_id: document_id.to_string(),
            tag_name: tag_name.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>: {}", self.document_id, self.tag_name, self.message)
    }
}

/// 1-based line and column (in chars) of a byte offset.
pub fn line_column(source: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(source.len());
    let mut line = 1u32;
    let mut column = 1u32;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_column() {
        let src = "ab\ncd\n\nef";
        assert_eq!(line_column(src, 0), (1, 1));
        assert_eq!(line_column(src, 1), (1, 2));
        assert_eq!(line_column(src, 3), (2, 1));
        assert_eq!(line_column(src, 7), (4, 1));
        assert_eq!(line_column(src, 100), (4, 3));
    }

    #[test]
    fn test_error_codes_and_scope() {
        let dup = RenameError::DuplicateComponent {
            tag_name: "foo-bar".into(),
        };
        assert_eq!(dup.code(), ERR_DUPLICATE_COMPONENT);
        assert!(dup.document_id().is_none(), "duplicate schema is run-wide");

        let contract = RenameError::Contract {
            document_id: "a.html".into(),
            start: 1,
            end: 4,
            found: "x.y".into(),
            base: "row".into(),
        };
        let diag = Diagnostic::from(&contract);
        assert_eq!(diag.code, ERR_CONTRACT);
        assert_eq!(diag.document_id.as_deref(), Some("a.html"));
        assert!(diag.message.contains("'x.y'"));
    }

    #[test]
    fn test_warning_display() {
        let w = Warning::new("a.html", "foo-bar", "Unable to find property 'x'");
        assert_eq!(w.to_string(), "a.html <foo-bar>: Unable to find property 'x'");
    }
}
