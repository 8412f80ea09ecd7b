//! Strips emitted fragments from compiled output.
//!
//! Once the external tool has run over the application together with the
//! fragments, the `window["polymer-rename:<id>"] = function() {...};`
//! statements are dead weight. They are removed in place, and the source map
//! follows the splice.

use oxc_allocator::Allocator;
use oxc_ast::ast::{AssignmentTarget, Expression, ExpressionStatement};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::{SourceType, Span};
use tracing::debug;

use crate::error::RenameError;
use crate::source_map::SourceMap;
use crate::splice::{splice, Edit};

const FRAGMENT_KEY_PREFIX: &str = "polymer-rename:";

/// Compiled output with the fragments removed.
#[derive(Debug, Clone)]
pub struct Removal {
    pub code: String,
    pub source_map: Option<SourceMap>,
    pub removed: usize,
}

#[derive(Default)]
struct FragmentFinder {
    spans: Vec<Span>,
}

fn is_fragment_key(expr: &Expression) -> bool {
    matches!(expr, Expression::StringLiteral(s) if s.value.starts_with(FRAGMENT_KEY_PREFIX))
}

impl<'a> Visit<'a> for FragmentFinder {
    fn visit_expression_statement(&mut self, stmt: &ExpressionStatement<'a>) {
        if let Expression::AssignmentExpression(assign) = &stmt.expression {
            if let AssignmentTarget::ComputedMemberExpression(member) = &assign.left {
                let on_window =
                    matches!(&member.object, Expression::Identifier(id) if id.name.as_str() == "window");
                if on_window && is_fragment_key(&member.expression) {
                    self.spans.push(stmt.span);
                    return;
                }
            }
        }
        walk::walk_expression_statement(self, stmt);
    }
}

/// Removes every fragment assignment statement from `code`.
pub fn remove_fragments(
    file_name: &str,
    code: &str,
    source_map: Option<&SourceMap>,
) -> Result<Removal, RenameError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, SourceType::default()).parse();
    if ret.panicked || !ret.errors.is_empty() {
        let message = ret
            .errors
            .first()
            .map(|e| format!("{}: {}", file_name, e))
            .unwrap_or_else(|| format!("{}: parser aborted", file_name));
        return Err(RenameError::FragmentSyntax { message });
    }

    let mut finder = FragmentFinder::default();
    finder.visit_program(&ret.program);
    if finder.spans.is_empty() {
        return Ok(Removal {
            code: code.to_string(),
            source_map: source_map.cloned(),
            removed: 0,
        });
    }

    let edits: Vec<Edit> = finder
        .spans
        .iter()
        .map(|span| Edit::new(span.start, span.end, ""))
        .collect();
    let removed = edits.len();
    let (code, source_map) = splice(file_name, code, source_map, edits)?;
    debug!(file = file_name, removed, "removed fragments");
    Ok(Removal {
        code,
        source_map,
        removed,
    })
}
