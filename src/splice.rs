//! Splice engine.
//!
//! Applies byte-range replacements to a document from the highest offset to
//! the lowest, so the offsets of the remaining edits stay valid, and moves the
//! source map along with the text.

use tracing::debug;

use crate::document::SourceDocument;
use crate::error::RenameError;
use crate::recovery::BindingRecord;
use crate::source_map::{Mappings, Position, SourceMap};

/// Replace `start..end` (bytes) with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: u32,
    pub end: u32,
    pub text: String,
}

impl Edit {
    pub fn new(start: u32, end: u32, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

impl From<&BindingRecord> for Edit {
    fn from(record: &BindingRecord) -> Self {
        Edit::new(record.start, record.end, record.resolved_name.clone())
    }
}

/// Sorts edits by descending start and rejects anything that cannot be applied.
fn ordered_edits(document_id: &str, content: &str, mut edits: Vec<Edit>) -> Result<Vec<Edit>, RenameError> {
    edits.sort_by(|a, b| b.start.cmp(&a.start).then(b.end.cmp(&a.end)));
    edits.dedup();

    for edit in &edits {
        let (start, end) = (edit.start as usize, edit.end as usize);
        if start > end
            || end > content.len()
            || !content.is_char_boundary(start)
            || !content.is_char_boundary(end)
        {
            return Err(RenameError::InvalidRange {
                document_id: document_id.to_string(),
                start: edit.start,
                end: edit.end,
                len: content.len(),
            });
        }
    }
    for pair in edits.windows(2) {
        let (later, earlier) = (&pair[0], &pair[1]);
        if earlier.end > later.start || (earlier.start == later.start && earlier.end == later.end) {
            return Err(RenameError::OverlappingRange {
                document_id: document_id.to_string(),
                start: earlier.start,
                end: earlier.end,
                next_start: later.start,
            });
        }
    }
    Ok(edits)
}

/// Applies `edits` to `content`, updating `source_map` when one is given.
pub fn splice(
    document_id: &str,
    content: &str,
    source_map: Option<&SourceMap>,
    edits: Vec<Edit>,
) -> Result<(String, Option<SourceMap>), RenameError> {
    let edits = ordered_edits(document_id, content, edits)?;
    let mut mappings = source_map.map(|m| Mappings::decode(&m.mappings)).transpose()?;

    let mut working = content.to_string();
    for edit in &edits {
        let (start, end) = (edit.start as usize, edit.end as usize);
        if let Some(mappings) = mappings.as_mut() {
            let start_pos = Position::of_offset(&working, start);
            let end_pos = Position::of_offset(&working, end);
            mappings.apply_edit(start_pos, end_pos, start_pos.advance(&edit.text));
        }
        working.replace_range(start..end, &edit.text);
    }
    debug!(document = document_id, edits = edits.len(), "spliced document");

    let updated = match (source_map, mappings) {
        (Some(map), Some(mappings)) => Some(SourceMap {
            mappings: mappings.encode(),
            ..map.clone()
        }),
        _ => None,
    };
    Ok((working, updated))
}

/// Applies a document's binding records.
pub fn splice_document(
    document: &SourceDocument,
    records: &[BindingRecord],
) -> Result<(String, Option<SourceMap>), RenameError> {
    let edits = records
        .iter()
        .filter(|r| r.document_id == document.id)
        .map(Edit::from)
        .collect();
    splice(&document.id, &document.content, document.source_map.as_ref(), edits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(start: u32, end: u32, name: &str) -> BindingRecord {
        BindingRecord {
            document_id: "a.html".into(),
            start,
            end,
            resolved_name: name.into(),
        }
    }

    #[test]
    fn test_replacements_apply_from_the_end() {
        let doc = SourceDocument::new("a.html", "[[foo]] and [[barBaz]]");
        let records = vec![record(2, 5, "a"), record(14, 20, "longerName")];
        let (out, map) = splice_document(&doc, &records).unwrap();
        assert_eq!(out, "[[a]] and [[longerName]]");
        assert!(map.is_none());

        let mut reversed = records.clone();
        reversed.reverse();
        assert_eq!(splice_document(&doc, &reversed).unwrap().0, out, "order independent");
    }

    #[test]
    fn test_no_records_is_identity() {
        let doc = SourceDocument::new("a.html", "<div>ünïcödé</div>");
        assert_eq!(splice_document(&doc, &[]).unwrap().0, doc.content);
    }

    #[test]
    fn test_identical_replacement_keeps_length() {
        let doc = SourceDocument::new("a.html", "x [[keep]] y");
        let (out, _) = splice_document(&doc, &[record(4, 8, "keep")]).unwrap();
        assert_eq!(out, doc.content);
    }

    #[test]
    fn test_records_of_other_documents_ignored() {
        let doc = SourceDocument::new("a.html", "[[foo]]");
        let mut other = record(2, 5, "zzz");
        other.document_id = "b.html".into();
        assert_eq!(splice_document(&doc, &[other]).unwrap().0, "[[foo]]");
    }

    #[test]
    fn test_invalid_and_overlapping_ranges() {
        let doc = SourceDocument::new("a.html", "héllo");
        let err = splice_document(&doc, &[record(2, 3, "x")]).unwrap_err();
        assert_eq!(err.code(), crate::error::ERR_INVALID_RANGE, "inside a multi-byte char");
        let err = splice_document(&doc, &[record(3, 40, "x")]).unwrap_err();
        assert_eq!(err.code(), crate::error::ERR_INVALID_RANGE);
        let err = splice_document(&doc, &[record(0, 4, "x"), record(3, 5, "y")]).unwrap_err();
        assert_eq!(err.code(), crate::error::ERR_OVERLAPPING_RANGE);
    }

    #[test]
    fn test_source_map_shifts_after_edit() {
        // Two mappings on line 0 at columns 0 and 10, one on line 1 at column 2.
        let map = SourceMap {
            version: 3,
            file: None,
            source_root: None,
            sources: vec!["a.html".into()],
            sources_content: None,
            names: Vec::new(),
            mappings: "AAAA,UAAU;EACE".into(),
        };
        let doc = SourceDocument::new("a.html", "<p>[[ab]] <b>x</b>\n  y").with_source_map(map);
        let (out, updated) = splice_document(&doc, &[record(5, 7, "abcd")]).unwrap();
        assert_eq!(out, "<p>[[abcd]] <b>x</b>\n  y");

        let mappings = Mappings::decode(&updated.unwrap().mappings).unwrap();
        let columns: Vec<Vec<u32>> = mappings
            .lines
            .iter()
            .map(|l| l.iter().map(|s| s.generated_column).collect())
            .collect();
        assert_eq!(columns, vec![vec![0, 12], vec![2]]);
    }
}
