//! Binding expression grammar.
//!
//! Recognizes `[[...]]` (one-way) and `{{...}}` (two-way) bindings inside
//! attribute values and text, and splits the inner expression into either an
//! identifier path, a literal, or a single-level method call. All offsets are
//! absolute byte offsets into the enclosing document.

use lazy_static::lazy_static;
use oxc_span::Span;
use regex::Regex;

lazy_static! {
    static ref BINDING_START_RE: Regex = Regex::new(r"(\[\[|\{\{)\s*(!?)\s*").unwrap();
    static ref METHOD_CALL_RE: Regex =
        Regex::new(r"(?s)^([A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*)\s*\((.*)\)$").unwrap();
    static ref LITERAL_RE: Regex = Regex::new(
        r#"^(?:'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*"|[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)$"#
    )
    .unwrap();
}

/// Suffixes that observe a whole subtree rather than naming a property.
const PATH_SUFFIXES: [&str; 2] = [".*", ".splices"];

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// A piece of document text together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub text: String,
    pub span: Span,
}

impl Spanned {
    pub fn new(text: impl Into<String>, start: u32) -> Self {
        let text = text.into();
        let end = start + text.len() as u32;
        Self {
            text,
            span: Span::new(start, end),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    OneWay,
    TwoWay,
}

impl BindingKind {
    fn closing(self) -> &'static str {
        match self {
            BindingKind::OneWay => "]]",
            BindingKind::TwoWay => "}}",
        }
    }
}

/// One delimited binding found in a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub kind: BindingKind,
    pub negated: bool,
    /// Trimmed expression, without delimiters or event suffix.
    pub expression: Spanned,
    /// Event named after `::`, if any.
    pub event: Option<Spanned>,
    /// From the opening delimiter through the closing one.
    pub outer: Span,
}

impl Binding {
    pub fn is_two_way(&self) -> bool {
        self.kind == BindingKind::TwoWay
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Literal(Spanned),
    Path(Spanned),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedExpression {
    Path(Spanned),
    Literal(Spanned),
    Call { method: Spanned, args: Vec<Argument> },
}

// ═══════════════════════════════════════════════════════════════════════════════
// DELIMITERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Finds the first binding in `value`, which starts at `base` in the document.
///
/// Returns `None` when there is no complete delimited binding.
pub fn find_binding(value: &str, base: u32) -> Option<Binding> {
    find_binding_from(value, base, 0).map(|(binding, _)| binding)
}

/// Finds every binding in `value`, scanning left to right.
pub fn find_bindings(value: &str, base: u32) -> Vec<Binding> {
    let mut bindings = Vec::new();
    let mut from = 0;
    while let Some((binding, next)) = find_binding_from(value, base, from) {
        bindings.push(binding);
        from = next;
    }
    bindings
}

fn find_binding_from(value: &str, base: u32, from: usize) -> Option<(Binding, usize)> {
    let mut search = from;
    loop {
        let caps = BINDING_START_RE.captures_at(value, search)?;
        let whole = caps.get(0)?;
        let kind = if &caps[1] == "[[" {
            BindingKind::OneWay
        } else {
            BindingKind::TwoWay
        };
        let inner_start = whole.end();
        let Some(rel_close) = value[inner_start..].find(kind.closing()) else {
            // Unterminated: try the next opening delimiter.
            search = whole.start() + 2;
            continue;
        };
        let close = inner_start + rel_close;
        let raw = &value[inner_start..close];

        let (expr_raw, event) = match raw.find("::") {
            Some(idx) => {
                let event_raw = &raw[idx + 2..];
                let event_trimmed = event_raw.trim();
                let lead = event_raw.len() - event_raw.trim_start().len();
                let event_start = base + (inner_start + idx + 2 + lead) as u32;
                (&raw[..idx], Some(Spanned::new(event_trimmed, event_start)))
            }
            None => (raw, None),
        };
        let expr_text = expr_raw.trim_end();

        let binding = Binding {
            kind,
            negated: &caps[2] == "!",
            expression: Spanned::new(expr_text, base + inner_start as u32),
            event,
            outer: Span::new(
                base + whole.start() as u32,
                base + (close + kind.closing().len()) as u32,
            ),
        };
        return Some((binding, close + kind.closing().len()));
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn is_literal(text: &str) -> bool {
    LITERAL_RE.is_match(text)
}

/// Classifies a trimmed binding expression.
pub fn parse_expression(expression: &Spanned) -> ParsedExpression {
    let text = expression.text.as_str();
    let start = expression.span.start;

    if is_literal(text) {
        return ParsedExpression::Literal(expression.clone());
    }

    if let Some(caps) = METHOD_CALL_RE.captures(text) {
        if let (Some(name), Some(args)) = (caps.get(1), caps.get(2)) {
            let method = Spanned::new(name.as_str(), start + name.start() as u32);
            let args = split_arguments(args.as_str(), start + args.start() as u32)
                .into_iter()
                .map(|arg| {
                    if is_literal(&arg.text) {
                        Argument::Literal(arg)
                    } else {
                        Argument::Path(strip_path_suffix(arg))
                    }
                })
                .collect();
            return ParsedExpression::Call { method, args };
        }
    }

    ParsedExpression::Path(strip_path_suffix(expression.clone()))
}

/// Splits a method argument list on top-level commas, trimming each piece.
///
/// Commas inside quoted literals do not split.
pub fn split_arguments(args: &str, base: u32) -> Vec<Spanned> {
    let mut pieces = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut piece_start = 0usize;

    for (i, ch) in args.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            ',' => {
                push_trimmed(&mut pieces, &args[piece_start..i], base + piece_start as u32);
                piece_start = i + 1;
            }
            _ => {}
        }
    }
    push_trimmed(&mut pieces, &args[piece_start..], base + piece_start as u32);
    pieces
}

fn push_trimmed(pieces: &mut Vec<Spanned>, raw: &str, start: u32) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    let lead = raw.len() - raw.trim_start().len();
    pieces.push(Spanned::new(trimmed, start + lead as u32));
}

/// Removes a trailing `.*` or `.splices`, shrinking the span to match.
pub fn strip_path_suffix(path: Spanned) -> Spanned {
    for suffix in PATH_SUFFIXES {
        if let Some(stripped) = path.text.strip_suffix(suffix) {
            return Spanned::new(stripped, path.span.start);
        }
    }
    path
}

/// `data-foo-bar` -> `dataFooBar`
pub fn hyphenated_to_camel_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut upper_next = false;
    for ch in input.chars() {
        if ch == '-' {
            upper_next = true;
        } else if upper_next && ch.is_ascii_lowercase() {
            out.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            if upper_next {
                out.push('-');
            }
            out.push(ch);
            upper_next = false;
        }
    }
    if upper_next {
        out.push('-');
    }
    out
}

/// `dataFooBar` -> `data-foo-bar`
pub fn camel_case_to_hyphenated(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    for ch in input.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(doc: &str, span: Span) -> &str {
        &doc[span.start as usize..span.end as usize]
    }

    #[test]
    fn test_no_binding_is_none() {
        assert!(find_binding("plain text", 0).is_none());
        assert!(find_binding("[[unterminated", 0).is_none());
        assert!(find_binding("{{mismatched]]", 0).is_none());
    }

    #[test]
    fn test_one_way_offsets() {
        let doc = "<p>Hi [[  user.name ]]!</p>";
        let binding = find_binding(&doc[3..], 3).expect("binding");
        assert_eq!(binding.kind, BindingKind::OneWay);
        assert_eq!(binding.expression.text, "user.name");
        assert_eq!(slice(doc, binding.expression.span), "user.name");
        assert_eq!(slice(doc, binding.outer), "[[  user.name ]]");
    }

    #[test]
    fn test_two_way_with_event_and_negation() {
        let doc = "{{ !checked::change }}";
        let binding = find_binding(doc, 0).unwrap();
        assert!(binding.is_two_way());
        assert!(binding.negated);
        assert_eq!(binding.expression.text, "checked");
        assert_eq!(slice(doc, binding.expression.span), "checked");
        let event = binding.event.unwrap();
        assert_eq!(event.text, "change");
        assert_eq!(slice(doc, event.span), "change");
    }

    #[test]
    fn test_find_bindings_left_to_right() {
        let doc = "[[a]] and {{b.c}} then [[d]]";
        let found = find_bindings(doc, 0);
        let texts: Vec<_> = found.iter().map(|b| b.expression.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b.c", "d"]);
        for b in &found {
            assert_eq!(slice(doc, b.expression.span), b.expression.text);
        }
    }

    #[test]
    fn test_method_call_arguments() {
        let doc = "[[compute( foo.bar , 'a,b', 12, -3.5e2,baz.* )]]";
        let binding = find_binding(doc, 0).unwrap();
        match parse_expression(&binding.expression) {
            ParsedExpression::Call { method, args } => {
                assert_eq!(method.text, "compute");
                assert_eq!(slice(doc, method.span), "compute");
                assert_eq!(args.len(), 5);
                assert!(matches!(&args[0], Argument::Path(p) if p.text == "foo.bar"));
                assert!(matches!(&args[1], Argument::Literal(l) if l.text == "'a,b'"));
                assert!(matches!(&args[2], Argument::Literal(l) if l.text == "12"));
                assert!(matches!(&args[3], Argument::Literal(l) if l.text == "-3.5e2"));
                match &args[4] {
                    Argument::Path(p) => {
                        assert_eq!(p.text, "baz", "whole-subtree suffix stripped");
                        assert_eq!(slice(doc, p.span), "baz");
                    }
                    other => panic!("expected path, got {:?}", other),
                }
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_call_has_no_arguments() {
        let expr = Spanned::new("now()", 10);
        match parse_expression(&expr) {
            ParsedExpression::Call { method, args } => {
                assert_eq!(method.span, Span::new(10, 13));
                assert!(args.is_empty());
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_literal_and_path() {
        assert!(matches!(
            parse_expression(&Spanned::new("'text'", 0)),
            ParsedExpression::Literal(_)
        ));
        match parse_expression(&Spanned::new("items.splices", 4)) {
            ParsedExpression::Path(p) => {
                assert_eq!(p.text, "items");
                assert_eq!(p.span, Span::new(4, 9));
            }
            other => panic!("expected path, got {:?}", other),
        }
    }

    #[test]
    fn test_case_conversion() {
        assert_eq!(hyphenated_to_camel_case("data-foo-bar"), "dataFooBar");
        assert_eq!(hyphenated_to_camel_case("plain"), "plain");
        assert_eq!(camel_case_to_hyphenated("dataFooBar"), "data-foo-bar");
        assert_eq!(camel_case_to_hyphenated(&hyphenated_to_camel_case("x-y")), "x-y");
    }
}
