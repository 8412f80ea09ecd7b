//! Intermediate emitter.
//!
//! Serializes expression nodes into a JavaScript fragment for the external
//! renaming tool. Every renameable reference becomes a recording call:
//!
//! ```text
//! polymerRename.identifier("doc.html", 60, 63, this.bar);
//! polymerRename.identifier("doc.html", 90, 98, row.name, row, "row");
//! ```
//!
//! The numeric arguments are never touched by the tool; the reference
//! argument is whatever the tool renamed it to.

use serde::{Deserialize, Serialize};

use crate::expression::{
    AttributeRef, CallbackKind, DataBindingEffect, EventListenerRef, ExpressionNode, IdentifierRef,
    Location, MethodCall, Qualifier, RecordRole, RepeatCallback, RepeatNode,
};
use crate::walker::{DocumentExtraction, TemplateExtraction};

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDING KINDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Recording calls the recovery pass understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Identifier,
    Method,
    EventListener,
    Attribute,
    DomRepeatObserve,
    DomRepeatProperty,
}

impl RecordKind {
    pub const ALL: [RecordKind; 6] = [
        RecordKind::Identifier,
        RecordKind::Method,
        RecordKind::EventListener,
        RecordKind::Attribute,
        RecordKind::DomRepeatObserve,
        RecordKind::DomRepeatProperty,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Identifier => "identifier",
            RecordKind::Method => "method",
            RecordKind::EventListener => "eventListener",
            RecordKind::Attribute => "attribute",
            RecordKind::DomRepeatObserve => "domRepeatObserve",
            RecordKind::DomRepeatProperty => "domRepeatProperty",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

/// Emitted program for one document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub document_id: String,
    pub code: String,
    pub record_count: usize,
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

/// `Polymer.DomRepeat` -> `polymerRename_Polymer$DomRepeat`
fn element_variable(type_name: &str) -> String {
    let mut name = String::from("polymerRename_");
    for ch in type_name.chars() {
        match ch {
            '.' => name.push('$'),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '$' => name.push(c),
            _ => name.push('_'),
        }
    }
    name
}

// ═══════════════════════════════════════════════════════════════════════════════
// WRITER
// ═══════════════════════════════════════════════════════════════════════════════

struct FragmentWriter<'n> {
    namespace: &'n str,
    out: String,
    indent: usize,
    records: usize,
}

impl<'n> FragmentWriter<'n> {
    fn new(namespace: &'n str) -> Self {
        Self {
            namespace,
            out: String::new(),
            indent: 0,
            records: 0,
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn open(&mut self, text: &str) {
        self.line(text);
        self.indent += 1;
    }

    fn close(&mut self, text: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    fn record(&mut self, kind: RecordKind, location: &Location, args: &[String]) {
        let mut call = format!(
            "{}.{}({}, {}, {}",
            self.namespace,
            kind.as_str(),
            js_string(&location.document_id),
            location.span.start,
            location.span.end
        );
        for arg in args {
            call.push_str(", ");
            call.push_str(arg);
        }
        call.push_str(");");
        self.line(&call);
        self.records += 1;
    }

    /// Reference plus the base arguments, or `None` when nothing is renameable.
    fn reference_args(qualifier: &Qualifier, reference: String, path: &str) -> Option<Vec<String>> {
        match qualifier {
            Qualifier::Instance { renameable: true } => Some(vec![reference]),
            Qualifier::Instance { renameable: false } => None,
            Qualifier::Local { renameable: true, .. } => Some(vec![reference]),
            Qualifier::Local { base, .. } | Qualifier::RepeatItem { base } => {
                if path == base {
                    None
                } else {
                    Some(vec![reference, base.clone(), js_string(base)])
                }
            }
        }
    }

    fn node(&mut self, node: &ExpressionNode) {
        match node {
            ExpressionNode::Identifier(n) => self.identifier(n),
            ExpressionNode::Method(n) => self.method(n),
            ExpressionNode::Literal(_) => {}
            ExpressionNode::Repeat(n) => self.repeat(n),
            ExpressionNode::Attribute(n) => self.attribute(n),
            ExpressionNode::EventListener(n) => self.event_listener(n),
            ExpressionNode::DataBinding(n) => self.data_binding(n),
            ExpressionNode::RepeatCallback(n) => self.repeat_callback(n),
        }
    }

    fn identifier(&mut self, n: &IdentifierRef) {
        let statement = n.statement();
        if n.role == RecordRole::Observe {
            let mut args = vec![statement];
            if let Some(base) = n.qualifier.base() {
                args.push(base.to_string());
                args.push(js_string(base));
            }
            self.record(RecordKind::DomRepeatObserve, &n.location, &args);
            return;
        }
        match &n.qualifier {
            Qualifier::RepeatItem { base } => {
                if n.path != *base {
                    let item = format!("{}.domRepeatItem({})", self.namespace, base);
                    self.record(
                        RecordKind::DomRepeatProperty,
                        &n.location,
                        &[item, statement, js_string(base)],
                    );
                }
            }
            qualifier => {
                if let Some(args) = Self::reference_args(qualifier, statement, &n.path) {
                    self.record(RecordKind::Identifier, &n.location, &args);
                }
            }
        }
    }

    fn method(&mut self, n: &MethodCall) {
        self.line(&format!("{};", n.statement()));
        if let Some(args) = Self::reference_args(&n.qualifier, n.callee(), &n.name) {
            self.record(RecordKind::Method, &n.location, &args);
        }
        for arg in &n.args {
            self.node(arg);
        }
    }

    fn event_listener(&mut self, n: &EventListenerRef) {
        self.line(&format!("{}(new CustomEvent(\"event\"));", n.callee()));
        if let Some(args) = Self::reference_args(&n.qualifier, n.callee(), &n.method) {
            self.record(RecordKind::EventListener, &n.location, &args);
        }
    }

    fn element_block(&mut self, tag_name: &str, type_name: &str) -> String {
        let var = element_variable(type_name);
        self.open("{");
        self.line(&format!(
            "let {} = /** @type {{!{}}} */ (document.createElement({}));",
            var,
            type_name,
            js_string(tag_name)
        ));
        var
    }

    fn attribute(&mut self, n: &AttributeRef) {
        let var = self.element_block(&n.tag_name, &n.type_name);
        let property = format!("{}.{}", var, n.property);
        self.record(RecordKind::Attribute, &n.location, &[var, property]);
        self.close("}");
    }

    fn data_binding(&mut self, n: &DataBindingEffect) {
        let var = self.element_block(&n.tag_name, &n.type_name);
        self.line(&format!("{}.{} = {};", var, n.property, n.source_statement));
        if n.two_way {
            self.line(&format!("{} = {}.{};", n.source_statement, var, n.property));
        }
        self.close("}");
    }

    fn repeat_callback(&mut self, n: &RepeatCallback) {
        let call = match n.kind {
            CallbackKind::Sort => format!(
                "{}.domRepeatSort({}({}[0], {}[1]));",
                self.namespace, n.function_statement, n.items_statement, n.items_statement
            ),
            CallbackKind::Filter => format!(
                "{}.domRepeatFilter({}({}[0]));",
                self.namespace, n.function_statement, n.items_statement
            ),
        };
        self.line(&call);
    }

    fn repeat(&mut self, n: &RepeatNode) {
        let Some(items) = n.items.statement() else {
            return;
        };
        let index = &n.index.name;
        self.open(&format!(
            "for (let {index} = 0; {index} < {items}.length; {index}++) {{"
        ));
        self.line(&format!("let {} = {}[{}];", n.item.name, items, index));
        for child in &n.children {
            self.node(child);
        }
        self.close("}");
    }

    fn template(&mut self, template: &TemplateExtraction) {
        if template.nodes.is_empty() {
            return;
        }
        let type_name = &template.type_name;
        self.open("{");
        self.line(&format!("/** @this {{{}}} @suppress {{visibility}} */", type_name));
        self.open("let renameFn = function() {");
        for node in &template.nodes {
            self.node(node);
        }
        self.close("};");
        self.line(&format!("{}.sink(renameFn);", self.namespace));
        self.line(&format!(
            "renameFn.call(/** @type {{!{}}} */ ({}.createElement({})));",
            type_name,
            self.namespace,
            js_string(&template.owner_tag_name)
        ));
        self.close("}");
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════════

/// Global slot each document's fragment is assigned to.
pub fn fragment_key(document_id: &str) -> String {
    format!("polymer-rename:{}", document_id)
}

/// Emits one document's fragment. Returns `None` when nothing was recorded
/// and no type-check statements were produced.
pub fn emit_document(extraction: &DocumentExtraction, namespace: &str) -> Option<Fragment> {
    let mut writer = FragmentWriter::new(namespace);
    writer.open(&format!(
        "window[{}] = function() {{",
        js_string(&fragment_key(&extraction.document_id))
    ));
    let header_len = writer.out.len();
    for template in &extraction.templates {
        writer.template(template);
    }
    if writer.out.len() == header_len {
        return None;
    }
    writer.close("};");
    Some(Fragment {
        document_id: extraction.document_id.clone(),
        code: writer.out,
        record_count: writer.records,
    })
}

/// Joins fragments into the single batch handed to the external tool.
pub fn combine_fragments(fragments: &[Fragment]) -> String {
    fragments
        .iter()
        .map(|f| f.code.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Externs declaring the recording namespace for the external tool.
pub fn externs(namespace: &str) -> String {
    let mut out = String::new();
    out.push_str("/**\n * @fileoverview Recording functions for template renaming\n * @externs\n */\n\n");
    out.push_str(&format!("/** @const */\nvar {} = {{}};\n\n", namespace));

    let recorders: [(&str, &str); 6] = [
        ("identifier", "@param {*} reference"),
        ("method", "@param {!Function} reference"),
        ("eventListener", "@param {!Function} reference"),
        ("attribute", "@param {!Element} element\n * @param {*} reference"),
        ("domRepeatObserve", "@param {*} reference"),
        ("domRepeatProperty", "@param {*} item\n * @param {*} reference"),
    ];
    for (name, params) in recorders {
        out.push_str(&format!(
            "/**\n * @param {{string}} documentId\n * @param {{number}} start\n * @param {{number}} end\n * {}\n * @param {{...*}} base\n */\n{}.{} = function(documentId, start, end, {}) {{}};\n\n",
            params,
            namespace,
            name,
            if params.contains("item") { "item, reference, base" } else if params.contains("element") { "element, reference, base" } else { "reference, base" }
        ));
    }
    out.push_str(&format!(
        "/**\n * @param {{T}} item\n * @return {{T}}\n * @template T\n */\n{ns}.domRepeatItem = function(item) {{}};\n\n\
         /** @param {{number}} result */\n{ns}.domRepeatSort = function(result) {{}};\n\n\
         /** @param {{*}} result */\n{ns}.domRepeatFilter = function(result) {{}};\n\n\
         /** @param {{!Function}} fn */\n{ns}.sink = function(fn) {{}};\n\n\
         /**\n * @param {{string}} tagName\n * @return {{!Element}}\n */\n{ns}.createElement = function(tagName) {{}};\n",
        ns = namespace
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenameOptions;
    use crate::document::TemplateNode;
    use crate::parse::parse_document;
    use crate::schema::{ComponentSchema, PropertyInfo, SchemaTable};
    use crate::walker::extract_template;
    use std::collections::HashMap;

    fn schemas() -> SchemaTable {
        SchemaTable::build(
            vec![
                ComponentSchema::new("foo-bar")
                    .with_property("bar", PropertyInfo::renameable())
                    .with_property("list", PropertyInfo::renameable())
                    .with_property("fixed", PropertyInfo::default())
                    .with_method("format", true)
                    .with_method("byName", true),
                ComponentSchema::new("x-child").with_property("value", PropertyInfo::renameable()),
            ],
            HashMap::new(),
        )
        .unwrap()
    }

    fn emit(source: &str) -> Fragment {
        let doc = parse_document("a.html", source).unwrap();
        let root = match &doc.children[0] {
            TemplateNode::Element(el) => el,
            other => panic!("expected element, got {:?}", other),
        };
        let schemas = schemas();
        let (template, warnings) =
            extract_template("a.html", source, root, "foo-bar", &schemas, &RenameOptions::default()).unwrap();
        let extraction = DocumentExtraction {
            document_id: "a.html".into(),
            templates: vec![template],
            warnings,
        };
        emit_document(&extraction, "polymerRename").expect("fragment")
    }

    fn span_of(source: &str, needle: &str) -> (usize, usize) {
        let start = source.find(needle).unwrap();
        (start, start + needle.len())
    }

    #[test]
    fn test_single_identifier() {
        let source = r#"<template><div data-foo="{{bar}}"></div></template>"#;
        let fragment = emit(source);
        let (s, e) = span_of(source, "bar}}");
        let expected = format!("polymerRename.identifier(\"a.html\", {}, {}, this.bar);", s, e - 2);
        assert!(fragment.code.contains(&expected), "missing {} in\n{}", expected, fragment.code);
        assert_eq!(fragment.record_count, 1);
        assert!(fragment.code.starts_with("window[\"polymer-rename:a.html\"] = function() {"));
        assert!(fragment.code.contains("polymerRename.sink(renameFn);"));
        assert!(fragment
            .code
            .contains("renameFn.call(/** @type {!FooBarElement} */ (polymerRename.createElement(\"foo-bar\")));"));
    }

    #[test]
    fn test_repeat_alias_records_base() {
        let source = r#"<template><template is="dom-repeat" items="[[list]]" as="row"><span>[[row.name]]</span></template></template>"#;
        let fragment = emit(source);
        assert!(fragment.code.contains("this.list);"), "{}", fragment.code);
        assert!(
            fragment.code.contains("row.name, row, \"row\");"),
            "aliased reference carries its base:\n{}",
            fragment.code
        );
        assert!(fragment
            .code
            .contains("for (let index = 0; index < this.list.length; index++) {"));
        assert!(fragment.code.contains("let row = this.list[index];"));
    }

    #[test]
    fn test_default_item_becomes_repeat_property() {
        let source = r#"<template><dom-repeat items="[[list]]"><template>[[item.name]]</template></dom-repeat></template>"#;
        let fragment = emit(source);
        assert!(
            fragment.code.contains(
                "polymerRename.domRepeatProperty(\"a.html\", "
            ),
            "{}",
            fragment.code
        );
        assert!(fragment
            .code
            .contains("polymerRename.domRepeatItem(item), item.name, \"item\");"));
    }

    #[test]
    fn test_method_invocation_precedes_record() {
        let source = r#"<template><span>[[format(bar, 'x', 3)]]</span></template>"#;
        let fragment = emit(source);
        let invocation = fragment.code.find("this.format(this.bar, 'x', 3);").expect("invocation");
        let record = fragment.code.find("polymerRename.method(").expect("record");
        let argument = fragment.code.find("this.bar);").expect("argument record");
        assert!(invocation < record && record < argument, "{}", fragment.code);
        assert_eq!(fragment.record_count, 2);
    }

    #[test]
    fn test_attribute_and_data_binding() {
        let source = r#"<template><x-child value="{{bar}}"></x-child></template>"#;
        let fragment = emit(source);
        let (s, e) = span_of(source, "value");
        assert!(fragment.code.contains(&format!(
            "polymerRename.attribute(\"a.html\", {}, {}, polymerRename_XChildElement, polymerRename_XChildElement.value);",
            s, e
        )));
        assert!(fragment.code.contains("polymerRename_XChildElement.value = this.bar;"));
        assert!(fragment.code.contains("this.bar = polymerRename_XChildElement.value;"));
    }

    #[test]
    fn test_non_renameable_instance_is_silent() {
        let source = r#"<template><span>[[fixed]]</span></template>"#;
        let doc = parse_document("a.html", source).unwrap();
        let TemplateNode::Element(root) = &doc.children[0] else {
            panic!("expected element");
        };
        let schemas = schemas();
        let (template, _) =
            extract_template("a.html", source, root, "foo-bar", &schemas, &RenameOptions::default()).unwrap();
        assert_eq!(template.nodes.len(), 1);
        let extraction = DocumentExtraction {
            document_id: "a.html".into(),
            templates: vec![template],
            warnings: Vec::new(),
        };
        let fragment = emit_document(&extraction, "ns").unwrap();
        assert_eq!(fragment.record_count, 0);
        assert!(!fragment.code.contains("ns.identifier"));
    }

    #[test]
    fn test_empty_document_has_no_fragment() {
        let extraction = DocumentExtraction {
            document_id: "a.html".into(),
            templates: vec![TemplateExtraction {
                owner_tag_name: "foo-bar".into(),
                type_name: "FooBarElement".into(),
                nodes: Vec::new(),
            }],
            warnings: Vec::new(),
        };
        assert!(emit_document(&extraction, "polymerRename").is_none());
    }

    #[test]
    fn test_record_kinds_and_externs() {
        for kind in RecordKind::ALL {
            assert_eq!(RecordKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(RecordKind::from_name("domRepeatItem"), None);

        let externs = externs("polymerRename");
        for kind in RecordKind::ALL {
            assert!(
                externs.contains(&format!("polymerRename.{} = function(", kind.as_str())),
                "externs missing {}",
                kind.as_str()
            );
        }
        assert!(externs.contains("polymerRename.sink = function(fn) {};"));
    }

    #[test]
    fn test_element_variable() {
        assert_eq!(element_variable("Polymer.DomRepeat"), "polymerRename_Polymer$DomRepeat");
        assert_eq!(element_variable("XChildElement"), "polymerRename_XChildElement");
    }
}
