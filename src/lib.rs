//! # Polymer Template Rename
//!
//! Lets a whole-program JavaScript renamer see, and rename, the property
//! references that live inside Polymer-style HTML templates.
//!
//! ## Passes
//!
//! 1. **Extract**: parse each document, resolve every `[[...]]` / `{{...}}`
//!    binding against the owning component's schema and the enclosing
//!    `dom-repeat` scopes, and emit a JavaScript fragment with one recording
//!    call per renameable reference.
//! 2. The external tool compiles the fragment along with the application and
//!    renames the references inside the recording calls.
//! 3. **Replace**: parse the renamed fragment, recover `(start, end, name)`
//!    records, and splice them into the original documents, highest offset
//!    first, keeping source maps in step.
//! 4. **Remove**: strip the fragments from the compiled output.
//!
//! ## Recording Call Shape
//!
//! ```text
//! <ns>.<kind>("<documentId>", <start>, <end>, <reference>[, <base>, "<base>"]);
//! ```
//!
//! The offsets are byte offsets into the original document and must survive
//! the external tool untouched. When present, the base is an iteration alias;
//! its quoted copy is the name the template actually uses.

#[cfg(feature = "napi")]
use napi_derive::napi;

pub mod codegen;
pub mod config;
pub mod discovery;
pub mod document;
pub mod error;
pub mod expression;
pub mod grammar;
pub mod parse;
pub mod pipeline;
pub mod recovery;
pub mod remove;
pub mod schema;
pub mod scope;
pub mod source_map;
pub mod splice;
pub mod visitor;
pub mod walker;


pub use codegen::{externs, Fragment, RecordKind};
pub use config::RenameOptions;
pub use document::SourceDocument;
pub use error::{Diagnostic, RenameError, Warning};
pub use pipeline::{
    combine_fragments, extract_documents, replace_documents, ExtractOutput, ReplaceOutput,
    ReplacedDocument,
};
pub use recovery::BindingRecord;
pub use remove::{remove_fragments, Removal};
pub use schema::{ComponentSchema, SchemaTable};
pub use source_map::SourceMap;

// ═══════════════════════════════════════════════════════════════════════════════
// NODE BRIDGE
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
fn napi_options(options_json: Option<String>) -> napi::Result<RenameOptions> {
    match options_json {
        Some(json) => RenameOptions::from_json(&json)
            .map_err(|e| napi::Error::from_reason(format!("Invalid options: {}", e))),
        None => Ok(RenameOptions::default()),
    }
}

#[cfg(feature = "napi")]
fn napi_error(err: RenameError) -> napi::Error {
    napi::Error::from_reason(format!("[{}] {}", err.code(), err))
}

#[cfg(feature = "napi")]
fn napi_value<T: serde::Serialize>(value: &T) -> napi::Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| napi::Error::from_reason(format!("Serialize error: {}", e)))
}

/// `{ fragments, warnings }` for the given documents and schemas.
#[cfg(feature = "napi")]
#[napi]
pub fn extract_native(
    documents_json: String,
    schemas_json: String,
    options_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let options = napi_options(options_json)?;
    let documents: Vec<SourceDocument> = serde_json::from_str(&documents_json)
        .map_err(|e| napi::Error::from_reason(format!("Documents parse error: {}", e)))?;
    let schemas = SchemaTable::from_json(&schemas_json, options.type_name_overrides.clone())
        .map_err(napi_error)?;
    let output = extract_documents(&documents, &schemas, &options).map_err(napi_error)?;
    napi_value(&output)
}

/// `{ documents, errors }` after applying the renamed fragment.
#[cfg(feature = "napi")]
#[napi]
pub fn replace_native(
    documents_json: String,
    renamed_fragment: String,
    options_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let options = napi_options(options_json)?;
    let documents: Vec<SourceDocument> = serde_json::from_str(&documents_json)
        .map_err(|e| napi::Error::from_reason(format!("Documents parse error: {}", e)))?;
    let output = replace_documents(&documents, &renamed_fragment, &options).map_err(napi_error)?;
    napi_value(&output)
}

/// `{ code, sourceMap, removed }` with every fragment statement stripped.
#[cfg(feature = "napi")]
#[napi]
pub fn remove_native(
    file_name: String,
    code: String,
    source_map_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let source_map = source_map_json
        .map(|json| SourceMap::from_json(&json))
        .transpose()
        .map_err(napi_error)?;
    let removal = remove_fragments(&file_name, &code, source_map.as_ref()).map_err(napi_error)?;
    Ok(serde_json::json!({
        "code": removal.code,
        "sourceMap": removal.source_map,
        "removed": removal.removed,
    }))
}

#[cfg(feature = "napi")]
#[napi]
pub fn externs_native(namespace: Option<String>) -> String {
    externs(namespace.as_deref().unwrap_or(config::DEFAULT_NAMESPACE))
}
