//! End-to-end passes.
//!
//! Extraction: documents + schemas -> one fragment per document + warnings.
//! Replacement: documents + the fragment after the external tool ran ->
//! rewritten documents + per-document errors.
//!
//! Documents are independent, so both passes fan out with rayon over a
//! shared, read-only `SchemaTable`. Results keep input order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::codegen::{emit_document, Fragment};
use crate::config::RenameOptions;
use crate::document::SourceDocument;
use crate::error::{Diagnostic, RenameError, Warning};
use crate::parse::parse_document;
use crate::recovery::{recover_records, BindingRecord};
use crate::schema::SchemaTable;
use crate::source_map::SourceMap;
use crate::splice::splice_document;
use crate::walker::{extract_document, DocumentExtraction};

pub use crate::codegen::combine_fragments;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractOutput {
    pub fragments: Vec<Fragment>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplacedDocument {
    pub document_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_map: Option<SourceMap>,
    pub replacements: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceOutput {
    /// Every document that was not abandoned, in input order.
    pub documents: Vec<ReplacedDocument>,
    pub errors: Vec<Diagnostic>,
}

/// Parses and walks one document.
pub fn extract_one(
    document: &SourceDocument,
    schemas: &SchemaTable,
    options: &RenameOptions,
) -> Result<DocumentExtraction, RenameError> {
    let tree = parse_document(&document.id, &document.content)?;
    extract_document(&tree, &document.content, schemas, options)
}

/// Extracts every document in parallel.
///
/// Any fatal extraction error fails the run; the first one in input order is
/// returned.
pub fn extract_documents(
    documents: &[SourceDocument],
    schemas: &SchemaTable,
    options: &RenameOptions,
) -> Result<ExtractOutput, RenameError> {
    let results: Vec<Result<DocumentExtraction, RenameError>> = documents
        .par_iter()
        .map(|doc| extract_one(doc, schemas, options))
        .collect();

    let mut output = ExtractOutput::default();
    for result in results {
        let extraction = result?;
        if let Some(fragment) = emit_document(&extraction, &options.namespace) {
            output.fragments.push(fragment);
        }
        output.warnings.extend(extraction.warnings);
    }

    info!(
        documents = documents.len(),
        fragments = output.fragments.len(),
        records = output.fragments.iter().map(|f| f.record_count).sum::<usize>(),
        warnings = output.warnings.len(),
        "extraction complete"
    );
    Ok(output)
}

/// Applies the renamed fragment to the original documents.
///
/// A fragment that cannot be parsed fails the run. Anything else only
/// abandons the affected document, which is reported in `errors` and left
/// out of `documents`.
pub fn replace_documents(
    documents: &[SourceDocument],
    renamed_fragment: &str,
    options: &RenameOptions,
) -> Result<ReplaceOutput, RenameError> {
    let records = recover_records(renamed_fragment, &options.namespace)?;

    let results: Vec<Result<ReplacedDocument, Diagnostic>> = documents
        .par_iter()
        .map(|doc| {
            let doc_records: &[BindingRecord] = match records.get(&doc.id) {
                Some(Ok(found)) => found.as_slice(),
                Some(Err(err)) => return Err(Diagnostic::from(err)),
                None => &[],
            };
            let (content, source_map) =
                splice_document(doc, doc_records).map_err(|e| Diagnostic::from(&e))?;
            Ok(ReplacedDocument {
                document_id: doc.id.clone(),
                content,
                source_map,
                replacements: doc_records.len(),
            })
        })
        .collect();

    let mut output = ReplaceOutput::default();
    for result in results {
        match result {
            Ok(doc) => output.documents.push(doc),
            Err(diagnostic) => {
                warn!(code = %diagnostic.code, "{}", diagnostic.message);
                output.errors.push(diagnostic);
            }
        }
    }
    for id in records.keys() {
        if !documents.iter().any(|d| &d.id == id) {
            warn!(document = %id, "renamed fragment references an unknown document");
        }
    }

    info!(
        documents = output.documents.len(),
        replacements = output.documents.iter().map(|d| d.replacements).sum::<usize>(),
        errors = output.errors.len(),
        "replacement complete"
    );
    Ok(output)
}
