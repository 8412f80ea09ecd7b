//! Recovery parser.
//!
//! Reads the fragment back after the external tool has renamed it and turns
//! every recording call into a `BindingRecord`: the original byte range plus
//! the name that should now appear there.

use oxc_allocator::Allocator;
use oxc_ast::ast::{Argument, CallExpression, Expression};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::SourceType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::codegen::RecordKind;
use crate::error::RenameError;
use crate::grammar::camel_case_to_hyphenated;

/// One replacement to apply to a template document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BindingRecord {
    pub document_id: String,
    pub start: u32,
    pub end: u32,
    pub resolved_name: String,
}

/// Records of one document, or the error that abandoned it.
pub type DocumentRecords = Result<Vec<BindingRecord>, RenameError>;

/// Parses the renamed fragment and groups its records by document.
///
/// A fragment that does not parse, or a recording call whose location
/// arguments are gone, fails the whole run. A reference that breaks the
/// base contract only fails its own document.
pub fn recover_records(
    fragment: &str,
    namespace: &str,
) -> Result<HashMap<String, DocumentRecords>, RenameError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, fragment, SourceType::default()).parse();
    if ret.panicked || !ret.errors.is_empty() {
        let message = ret
            .errors
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "parser aborted".to_string());
        return Err(RenameError::FragmentSyntax { message });
    }

    let mut finder = RecordFinder {
        namespace,
        documents: HashMap::new(),
        fatal: None,
    };
    finder.visit_program(&ret.program);
    if let Some(err) = finder.fatal {
        return Err(err);
    }

    for (document_id, records) in &finder.documents {
        match records {
            Ok(records) => debug!(document = %document_id, records = records.len(), "recovered records"),
            Err(err) => warn!(document = %document_id, "{}", err),
        }
    }
    Ok(finder.documents)
}

// ═══════════════════════════════════════════════════════════════════════════════
// VISITOR
// ═══════════════════════════════════════════════════════════════════════════════

struct RecordFinder<'n> {
    namespace: &'n str,
    documents: HashMap<String, DocumentRecords>,
    fatal: Option<RenameError>,
}

/// Location arguments shared by every recording call.
struct CallSite {
    document_id: String,
    start: u32,
    end: u32,
}

impl CallSite {
    fn contract(&self, found: &str, base: &str) -> RenameError {
        RenameError::Contract {
            document_id: self.document_id.clone(),
            start: self.start,
            end: self.end,
            found: found.to_string(),
            base: base.to_string(),
        }
    }

    fn unsupported(&self, kind: RecordKind) -> RenameError {
        RenameError::UnsupportedReference {
            document_id: self.document_id.clone(),
            start: self.start,
            end: self.end,
            kind: kind.as_str().to_string(),
        }
    }

    fn record(self, resolved_name: String) -> BindingRecord {
        BindingRecord {
            document_id: self.document_id,
            start: self.start,
            end: self.end,
            resolved_name,
        }
    }
}

impl RecordFinder<'_> {
    fn record_kind(&self, call: &CallExpression) -> Option<RecordKind> {
        let Expression::StaticMemberExpression(member) = &call.callee else {
            return None;
        };
        match &member.object {
            Expression::Identifier(object) if object.name.as_str() == self.namespace => {
                RecordKind::from_name(&member.property.name)
            }
            _ => None,
        }
    }

    /// Location arguments of a recording call, or a description of what is
    /// wrong with them.
    fn call_site(call: &CallExpression) -> Result<CallSite, String> {
        let document_id = match call.arguments.first() {
            Some(Argument::StringLiteral(s)) => s.value.to_string(),
            _ => return Err("lost its document id".to_string()),
        };
        let offset = |i: usize, name: &str| match call.arguments.get(i) {
            Some(Argument::NumericLiteral(n)) => {
                let value = n.value;
                if value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
                    Err(format!("has invalid {} offset {}", name, value))
                } else {
                    Ok(value as u32)
                }
            }
            _ => Err(format!("lost its {} offset", name)),
        };
        Ok(CallSite {
            document_id,
            start: offset(1, "start")?,
            end: offset(2, "end")?,
        })
    }

    fn recover(&self, kind: RecordKind, site: CallSite, call: &CallExpression) -> Result<BindingRecord, RenameError> {
        let args = &call.arguments;
        let reference_at = |i: usize| -> Result<Vec<String>, RenameError> {
            args.get(i)
                .and_then(|a| a.as_expression())
                .and_then(reference_path)
                .ok_or_else(|| site.unsupported(kind))
        };

        let resolved = match kind {
            RecordKind::Attribute => {
                let element = identifier_at(args, 3).ok_or_else(|| site.unsupported(kind))?;
                let parts = reference_at(4)?;
                if parts.len() < 2 || parts[0] != element {
                    return Err(site.contract(&parts.join("."), &element));
                }
                camel_case_to_hyphenated(&parts[1..].join("."))
            }
            RecordKind::DomRepeatProperty => {
                let base = match args.get(3).and_then(|a| a.as_expression()) {
                    Some(Expression::CallExpression(item)) => identifier_at(&item.arguments, 0),
                    _ => None,
                }
                .ok_or_else(|| site.unsupported(kind))?;
                let mut parts = reference_at(4)?;
                let quoted = string_at(args, 5).ok_or_else(|| site.unsupported(kind))?;
                if parts[0] != base {
                    return Err(site.contract(&parts.join("."), &base));
                }
                parts[0] = quoted;
                parts.join(".")
            }
            RecordKind::DomRepeatObserve => {
                let mut parts = reference_at(3)?;
                match (identifier_at(args, 4), string_at(args, 5)) {
                    (Some(base), Some(_)) => {
                        if parts[0] != base {
                            return Err(site.contract(&parts.join("."), &base));
                        }
                        parts.remove(0);
                    }
                    _ => strip_this(&mut parts),
                }
                parts.join(".")
            }
            RecordKind::Identifier | RecordKind::Method | RecordKind::EventListener => {
                let mut parts = reference_at(3)?;
                match (identifier_at(args, 4), string_at(args, 5)) {
                    (Some(base), Some(quoted)) => {
                        if parts[0] != base {
                            return Err(site.contract(&parts.join("."), &base));
                        }
                        parts[0] = quoted;
                    }
                    _ => strip_this(&mut parts),
                }
                parts.join(".")
            }
        };
        Ok(site.record(resolved))
    }
}

impl<'a> Visit<'a> for RecordFinder<'_> {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if self.fatal.is_none() {
            if let Some(kind) = self.record_kind(call) {
                match Self::call_site(call) {
                    Ok(site) => {
                        let document_id = site.document_id.clone();
                        let result = self.recover(kind, site, call);
                        let entry = self
                            .documents
                            .entry(document_id)
                            .or_insert_with(|| Ok(Vec::new()));
                        match result {
                            Ok(record) => {
                                if let Ok(records) = entry {
                                    records.push(record);
                                }
                            }
                            Err(err) => {
                                if entry.is_ok() {
                                    *entry = Err(err);
                                }
                            }
                        }
                    }
                    Err(problem) => {
                        self.fatal = Some(RenameError::FragmentSyntax {
                            message: format!("{} call at offset {} {}", kind.as_str(), call.span.start, problem),
                        });
                    }
                }
            }
        }
        walk::walk_call_expression(self, call);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REFERENCE HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Dotted segments of a member chain, or `None` for anything else.
fn reference_path(expr: &Expression) -> Option<Vec<String>> {
    match expr {
        Expression::ThisExpression(_) => Some(vec!["this".to_string()]),
        Expression::Identifier(id) => Some(vec![id.name.to_string()]),
        Expression::StaticMemberExpression(member) => {
            let mut parts = reference_path(&member.object)?;
            parts.push(member.property.name.to_string());
            Some(parts)
        }
        Expression::ComputedMemberExpression(member) => match &member.expression {
            Expression::StringLiteral(s) => {
                let mut parts = reference_path(&member.object)?;
                parts.push(s.value.to_string());
                Some(parts)
            }
            _ => None,
        },
        Expression::ParenthesizedExpression(paren) => reference_path(&paren.expression),
        _ => None,
    }
}

fn identifier_at(args: &[Argument], index: usize) -> Option<String> {
    match args.get(index)? {
        Argument::Identifier(id) => Some(id.name.to_string()),
        _ => None,
    }
}

fn string_at(args: &[Argument], index: usize) -> Option<String> {
    match args.get(index)? {
        Argument::StringLiteral(s) => Some(s.value.to_string()),
        _ => None,
    }
}

fn strip_this(parts: &mut Vec<String>) {
    if parts.len() > 1 && parts[0] == "this" {
        parts.remove(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recover(fragment: &str) -> HashMap<String, DocumentRecords> {
        recover_records(fragment, "polymerRename").unwrap()
    }

    fn records(fragment: &str, document_id: &str) -> Vec<BindingRecord> {
        match recover(fragment).remove(document_id) {
            Some(Ok(records)) => records,
            other => panic!("expected records for {}, got {:?}", document_id, other),
        }
    }

    #[test]
    fn test_instance_reference_strips_this() {
        let found = records(
            r#"window["polymer-rename:a.html"] = function() {
                polymerRename.identifier("a.html", 18, 21, this.a);
                polymerRename.method("a.html", 30, 36, this.b.c);
            };"#,
            "a.html",
        );
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].resolved_name, "a");
        assert_eq!((found[0].start, found[0].end), (18, 21));
        assert_eq!(found[1].resolved_name, "b.c");
    }

    #[test]
    fn test_base_is_replaced_by_quoted_name() {
        let found = records(
            r#"polymerRename.identifier("a.html", 5, 13, r.n, r, "row");
               polymerRename.domRepeatProperty("a.html", 20, 29, polymerRename.domRepeatItem(i), i.x, "item");"#,
            "a.html",
        );
        assert_eq!(found[0].resolved_name, "row.n");
        assert_eq!(found[1].resolved_name, "item.x");
    }

    #[test]
    fn test_observe_and_attribute() {
        let found = records(
            r#"polymerRename.domRepeatObserve("a.html", 1, 4, r.q, r, "row");
               { let e = document.createElement("x-y");
                 polymerRename.attribute("a.html", 7, 15, e, e.dataFoo); }"#,
            "a.html",
        );
        assert_eq!(found[0].resolved_name, "q");
        assert_eq!(found[1].resolved_name, "data-foo");
    }

    #[test]
    fn test_computed_and_parenthesized_references() {
        let found = records(
            r#"polymerRename.identifier("a.html", 0, 3, (this)["foo"].bar);"#,
            "a.html",
        );
        assert_eq!(found[0].resolved_name, "foo.bar");
    }

    #[test]
    fn test_contract_violation_abandons_document_only() {
        let all = recover(
            r#"polymerRename.identifier("a.html", 5, 13, other.n, r, "row");
               polymerRename.identifier("a.html", 20, 23, this.ok);
               polymerRename.identifier("b.html", 1, 2, this.fine);"#,
        );
        match &all["a.html"] {
            Err(err) => assert_eq!(err.code(), crate::error::ERR_CONTRACT),
            Ok(records) => panic!("expected contract error, got {:?}", records),
        }
        assert!(matches!(&all["b.html"], Ok(r) if r.len() == 1));
    }

    #[test]
    fn test_unsupported_reference() {
        let all = recover(r#"polymerRename.identifier("a.html", 0, 3, f());"#);
        match &all["a.html"] {
            Err(RenameError::UnsupportedReference { kind, .. }) => assert_eq!(kind, "identifier"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_helpers_and_other_namespaces_ignored() {
        let all = recover(
            r#"polymerRename.domRepeatSort(this.s(a[0], a[1]));
               polymerRename.sink(renameFn);
               other.identifier("a.html", 0, 1, this.x);"#,
        );
        assert!(all.is_empty(), "got {:?}", all);
    }

    #[test]
    fn test_syntax_error_is_fatal() {
        let err = recover_records("polymerRename.identifier(", "polymerRename").unwrap_err();
        assert_eq!(err.code(), crate::error::ERR_FRAGMENT_SYNTAX);
        let err = recover_records(r#"polymerRename.identifier(x, 0, 1, this.a);"#, "polymerRename")
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ERR_FRAGMENT_SYNTAX);
    }

    #[test]
    fn test_out_of_range_offsets_report_fragment_value() {
        for (fragment, expected) in [
            (r#"polymerRename.identifier("a.html", 4294967296, 4294967300, this.a);"#, "start offset 4294967296"),
            (r#"polymerRename.identifier("a.html", 3, 4.5, this.a);"#, "end offset 4.5"),
            (r#"polymerRename.identifier("a.html", -1, 4, this.a);"#, "start offset"),
        ] {
            let err = recover_records(fragment, "polymerRename").unwrap_err();
            assert_eq!(err.code(), crate::error::ERR_FRAGMENT_SYNTAX, "{}", fragment);
            assert!(err.to_string().contains(expected), "{} -> {}", fragment, err);
        }
    }
}
