//! Document walker: turns a template tree into expression nodes.
//!
//! One `ExpressionWalker` owns the scope stack for one template scan, so
//! documents can be walked in parallel while each walk stays sequential.

use oxc_span::Span;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::RenameOptions;
use crate::document::{
    check_attribute_location, Attribute, ElementNode, TemplateDocument, TemplateNode, TextNode,
};
use crate::error::{line_column, RenameError, Warning};
use crate::expression::{
    rescope_default_item, AttributeRef, CallbackKind, DataBindingEffect, EventListenerRef,
    ExpressionNode, IdentifierRef, Location, MethodCall, Qualifier, RecordRole, RepeatCallback,
    RepeatNode,
};
use crate::grammar::{
    find_binding, find_bindings, hyphenated_to_camel_case, parse_expression, Argument, Binding,
    ParsedExpression, Spanned,
};
use crate::schema::SchemaTable;
use crate::scope::{
    LocalBinding, LocalKind, Resolution, ScopeStack, DEFAULT_INDEX_ALIAS, DEFAULT_ITEM_ALIAS,
};
use crate::visitor::{walk_element, TemplateVisitor};

/// Expressions of one component template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateExtraction {
    pub owner_tag_name: String,
    pub type_name: String,
    pub nodes: Vec<ExpressionNode>,
}

/// Everything extracted from one document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentExtraction {
    pub document_id: String,
    pub templates: Vec<TemplateExtraction>,
    pub warnings: Vec<Warning>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Extracts every `<dom-module id=...>` template whose id has a schema.
pub fn extract_document(
    document: &TemplateDocument,
    source: &str,
    schemas: &SchemaTable,
    options: &RenameOptions,
) -> Result<DocumentExtraction, RenameError> {
    let mut templates = Vec::new();
    let mut warnings = Vec::new();

    for module in document.find_elements("dom-module") {
        let Some(id) = module.attribute_value("id").filter(|id| !id.is_empty()) else {
            let (line, column) = line_column(source, module.span.start as usize);
            return Err(RenameError::MissingModuleId {
                document_id: document.id.clone(),
                line,
                column,
            });
        };
        if !schemas.contains(id) {
            debug!(document = %document.id, module = id, "no schema for dom-module, skipping");
            continue;
        }
        let Some(template) = module.child_elements().find(|c| c.tag_name == "template") else {
            continue;
        };
        let (extraction, template_warnings) =
            extract_template(&document.id, source, template, id, schemas, options)?;
        templates.push(extraction);
        warnings.extend(template_warnings);
    }

    Ok(DocumentExtraction {
        document_id: document.id.clone(),
        templates,
        warnings,
    })
}

/// Extracts a standalone template document: its first top-level
/// `<template>` is the template of `owner_tag_name`.
pub fn extract_root_template(
    document: &TemplateDocument,
    source: &str,
    owner_tag_name: &str,
    schemas: &SchemaTable,
    options: &RenameOptions,
) -> Result<DocumentExtraction, RenameError> {
    let root = document.children.iter().find_map(|node| match node {
        TemplateNode::Element(el) if el.tag_name == "template" => Some(el),
        _ => None,
    });
    let mut extraction = DocumentExtraction {
        document_id: document.id.clone(),
        templates: Vec::new(),
        warnings: Vec::new(),
    };
    if let Some(root) = root {
        let (template, warnings) =
            extract_template(&document.id, source, root, owner_tag_name, schemas, options)?;
        extraction.templates.push(template);
        extraction.warnings = warnings;
    }
    Ok(extraction)
}

/// Walks the children of `root` as the template of `owner_tag_name`.
///
/// The root element itself is not scanned; its attributes belong to the
/// host document, not the template.
pub fn extract_template(
    document_id: &str,
    source: &str,
    root: &ElementNode,
    owner_tag_name: &str,
    schemas: &SchemaTable,
    options: &RenameOptions,
) -> Result<(TemplateExtraction, Vec<Warning>), RenameError> {
    let type_name = schemas
        .type_name(owner_tag_name)
        .ok_or_else(|| RenameError::UnknownType {
            tag_name: owner_tag_name.to_string(),
        })?;

    let mut walker = ExpressionWalker::new(document_id, source, owner_tag_name, schemas, options);
    walker.visit_children(&root.children);
    if let Some(err) = walker.error {
        return Err(err);
    }
    debug!(
        document = document_id,
        owner = owner_tag_name,
        nodes = walker.root_nodes.len(),
        warnings = walker.warnings.len(),
        "extracted template"
    );

    Ok((
        TemplateExtraction {
            owner_tag_name: owner_tag_name.to_string(),
            type_name,
            nodes: walker.root_nodes,
        },
        walker.warnings,
    ))
}

// ═══════════════════════════════════════════════════════════════════════════════
// WALKER
// ═══════════════════════════════════════════════════════════════════════════════

struct ExpressionWalker<'a> {
    document_id: &'a str,
    source: &'a str,
    schemas: &'a SchemaTable,
    options: &'a RenameOptions,
    scope: ScopeStack<'a>,
    root_nodes: Vec<ExpressionNode>,
    /// Iteration constructs currently open, innermost last.
    repeats: Vec<RepeatNode>,
    warnings: Vec<Warning>,
    error: Option<RenameError>,
}

impl<'a> ExpressionWalker<'a> {
    fn new(
        document_id: &'a str,
        source: &'a str,
        owner_tag_name: &str,
        schemas: &'a SchemaTable,
        options: &'a RenameOptions,
    ) -> Self {
        Self {
            document_id,
            source,
            schemas,
            options,
            scope: ScopeStack::new(owner_tag_name, schemas.get(owner_tag_name)),
            root_nodes: Vec::new(),
            repeats: Vec::new(),
            warnings: Vec::new(),
            error: None,
        }
    }

    fn owner(&self) -> &str {
        self.scope.root_tag_name()
    }

    fn warn(&mut self, tag_name: &str, message: String) {
        warn!(document = self.document_id, tag = tag_name, "{}", message);
        self.warnings
            .push(Warning::new(self.document_id, tag_name, message));
    }

    fn location(&self, span: Span) -> Location {
        Location::new(self.document_id, span)
    }

    fn add(&mut self, nodes: impl IntoIterator<Item = ExpressionNode>) {
        let sink = match self.repeats.last_mut() {
            Some(repeat) => &mut repeat.children,
            None => &mut self.root_nodes,
        };
        sink.extend(nodes);
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Resolution
    // ───────────────────────────────────────────────────────────────────────────

    fn resolves(&self, path: &str) -> bool {
        self.scope.lookup(path).is_some() || self.scope.lookup_method(path).is_some()
    }

    /// Identifier path. Unknown names fall back to a renameable instance
    /// property of the owner, with a warning.
    fn path_expression(&mut self, path: &Spanned, role: RecordRole) -> ExpressionNode {
        let qualifier = match self.scope.lookup(&path.text) {
            Some(resolution) => Qualifier::from_resolution(&resolution),
            None => match self.scope.lookup_method(&path.text) {
                Some(renameable) => Qualifier::Instance { renameable },
                None => {
                    let owner = self.owner().to_string();
                    self.warn(
                        &owner,
                        format!("Unable to find property '{}' in element {}", path.text, owner),
                    );
                    Qualifier::Instance { renameable: true }
                }
            },
        };
        ExpressionNode::Identifier(IdentifierRef {
            location: self.location(path.span),
            path: path.text.clone(),
            qualifier,
            role,
        })
    }

    fn method_qualifier(&mut self, name: &str) -> Option<Qualifier> {
        if let Some(resolution @ Resolution::Local { .. }) = self.scope.lookup(name) {
            return Some(Qualifier::from_resolution(&resolution));
        }
        self.scope
            .lookup_method(name)
            .map(|renameable| Qualifier::Instance { renameable })
    }

    fn call_expression(&mut self, method: &Spanned, args: &[Argument]) -> ExpressionNode {
        let qualifier = match self.method_qualifier(&method.text) {
            Some(q) => q,
            None => {
                let owner = self.owner().to_string();
                self.warn(
                    &owner,
                    format!("Unable to find method '{}' in element {}", method.text, owner),
                );
                Qualifier::Instance { renameable: true }
            }
        };
        let args = args
            .iter()
            .map(|arg| match arg {
                Argument::Literal(lit) => ExpressionNode::Literal(lit.text.clone()),
                Argument::Path(path) => self.path_expression(path, RecordRole::Identifier),
            })
            .collect();
        ExpressionNode::Method(MethodCall {
            location: self.location(method.span),
            name: method.text.clone(),
            qualifier,
            args,
        })
    }

    fn binding_expression(&mut self, binding: &Binding) -> Option<ExpressionNode> {
        match parse_expression(&binding.expression) {
            ParsedExpression::Path(path) if !path.text.is_empty() => {
                Some(self.path_expression(&path, RecordRole::Identifier))
            }
            ParsedExpression::Call { method, args } => Some(self.call_expression(&method, &args)),
            ParsedExpression::Path(_) | ParsedExpression::Literal(_) => None,
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Attributes
    // ───────────────────────────────────────────────────────────────────────────

    fn attribute_renameable(&self, tag_name: &str, property: &str) -> bool {
        self.schemas
            .get(tag_name)
            .and_then(|s| s.property(property))
            .is_some_and(|p| p.is_renameable)
    }

    fn attribute_expressions(&mut self, element: &ElementNode, attr: &Attribute) -> Vec<ExpressionNode> {
        let tag_name = element.effective_tag_name().to_string();
        let mut nodes = Vec::new();

        // `name$=` binds the attribute rather than the property.
        let (attr_name, is_property_binding) = match attr.name.strip_suffix('$') {
            Some(stripped) => (stripped, false),
            None => (attr.name.as_str(), true),
        };
        let property = hyphenated_to_camel_case(&attr_name.to_ascii_lowercase());
        let attribute_renameable = self.attribute_renameable(&tag_name, &property);

        if attribute_renameable {
            if let Some(type_name) = self.schemas.type_name(&tag_name) {
                let start = attr.name_span.start;
                nodes.push(ExpressionNode::Attribute(AttributeRef {
                    location: self.location(Span::new(start, start + attr_name.len() as u32)),
                    tag_name: tag_name.clone(),
                    type_name,
                    property: property.clone(),
                }));
            }
        }

        let Some(value) = attr.value.as_ref().filter(|v| v.text.len() >= 3) else {
            return nodes;
        };
        let bindings = find_bindings(&value.text, value.span.start);
        let mut bound = Vec::with_capacity(bindings.len());
        for binding in &bindings {
            if let Some(node) = self.binding_expression(binding) {
                bound.push(node);
            }
        }

        // Only a value that is exactly one binding flows into the property.
        let whole_value = bindings.len() == 1 && {
            let trimmed = value.text.trim();
            let lead = (value.text.len() - value.text.trim_start().len()) as u32;
            bindings[0].outer
                == Span::new(value.span.start + lead, value.span.start + lead + trimmed.len() as u32)
        };
        let effect = match bound.first() {
            Some(primary) if whole_value && (is_property_binding || attribute_renameable) => {
                self.schemas.type_name(&tag_name).and_then(|type_name| {
                    primary.statement().map(|source_statement| {
                        ExpressionNode::DataBinding(DataBindingEffect {
                            location: self.location(value.span),
                            tag_name: tag_name.clone(),
                            type_name,
                            property: property.clone(),
                            source_statement,
                            two_way: bindings[0].is_two_way() && primary.is_assignable(),
                        })
                    })
                })
            }
            _ => None,
        };

        nodes.extend(bound);
        nodes.extend(effect);
        nodes
    }

    /// `on-*` attributes: the value names a listener method.
    fn event_attribute_expressions(&mut self, element: &ElementNode, attr: &Attribute) -> Vec<ExpressionNode> {
        let tag_name = element.effective_tag_name().to_string();
        let mut nodes = Vec::new();
        let attr_name = attr.name.strip_suffix('$').unwrap_or(&attr.name);
        let event = &attr_name[3..];

        if let Some(value) = attr.value.as_ref() {
            let method = value.text.trim();
            if !method.is_empty() && find_binding(&value.text, value.span.start).is_none() {
                let lead = (value.text.len() - value.text.trim_start().len()) as u32;
                let start = value.span.start + lead;
                let qualifier = match self.method_qualifier(method) {
                    Some(q) => q,
                    None => {
                        let owner = self.owner().to_string();
                        self.warn(
                            &tag_name,
                            format!(
                                "Unable to find event listener '{}' on tag '{}' in element {}",
                                method, tag_name, owner
                            ),
                        );
                        Qualifier::Instance { renameable: true }
                    }
                };
                nodes.push(ExpressionNode::EventListener(EventListenerRef {
                    location: self.location(Span::new(start, start + method.len() as u32)),
                    method: method.to_string(),
                    qualifier,
                }));
            }
        }

        if let Some(changed) = event.strip_suffix("-changed") {
            let property = hyphenated_to_camel_case(&changed.to_ascii_lowercase());
            let schemas = self.schemas;
            if let Some(schema) = schemas.get(&tag_name) {
                match schema.property(&property) {
                    Some(info) if info.is_renameable => {
                        if let Some(type_name) = schemas.type_name(&tag_name) {
                            let start = attr.name_span.start + 3;
                            nodes.push(ExpressionNode::Attribute(AttributeRef {
                                location: self.location(Span::new(start, start + changed.len() as u32)),
                                tag_name: tag_name.clone(),
                                type_name,
                                property,
                            }));
                        }
                    }
                    Some(_) => {}
                    // dom-repeat fires `dom-changed` without a `dom` property.
                    None if element.is_repeat() && property == "dom" => {}
                    None => {
                        let owner = self.owner().to_string();
                        self.warn(
                            &tag_name,
                            format!(
                                "Unable to find property '{}' on tag '{}' in element {}",
                                property, tag_name, owner
                            ),
                        );
                    }
                }
            }
        }
        nodes
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Iteration constructs
    // ───────────────────────────────────────────────────────────────────────────

    fn local_binding(&self, element: &ElementNode, attr_name: &str, default: &str) -> (LocalBinding, Option<Spanned>) {
        let Some(value) = element.attribute(attr_name).and_then(|a| a.value.as_ref()) else {
            return (LocalBinding::new(default, true, false), None);
        };
        let renameable = self.options.rename_repeat_aliases;
        match find_binding(&value.text, value.span.start) {
            Some(binding) => (LocalBinding::new(&binding.expression.text, false, false), None),
            None => {
                let name = value.text.trim();
                if name.is_empty() {
                    return (LocalBinding::new(default, true, false), None);
                }
                let lead = (value.text.len() - value.text.trim_start().len()) as u32;
                let spanned = Spanned::new(name, value.span.start + lead);
                (LocalBinding::new(name, false, renameable), Some(spanned))
            }
        }
    }

    /// Implicit `sort="fn"` / `filter="fn"`: a bare method name.
    fn implicit_callback(&mut self, element: &ElementNode, attr_name: &str) -> Option<ExpressionNode> {
        let value = element.attribute(attr_name)?.value.as_ref()?;
        let name = value.text.trim();
        if name.is_empty() {
            return None;
        }
        let lead = (value.text.len() - value.text.trim_start().len()) as u32;
        let span = Span::new(value.span.start + lead, value.span.start + lead + name.len() as u32);
        match self.scope.lookup_method(name) {
            Some(renameable) => Some(ExpressionNode::Identifier(IdentifierRef {
                location: self.location(span),
                path: name.to_string(),
                qualifier: Qualifier::Instance { renameable },
                role: RecordRole::Identifier,
            })),
            None => {
                let owner = self.owner().to_string();
                self.warn(
                    &owner,
                    format!("Unable to find dom-repeat {} function '{}' in element {}", attr_name, name, owner),
                );
                None
            }
        }
    }

    fn callback(
        &mut self,
        element: &ElementNode,
        attr_name: &str,
        kind: CallbackKind,
        explicit: Option<&ExpressionNode>,
        items_statement: &str,
    ) -> Vec<ExpressionNode> {
        if element.attribute(attr_name).is_none() {
            return Vec::new();
        }
        let mut nodes = Vec::new();
        let function = match explicit {
            Some(node) => node.clone(),
            None => match self.implicit_callback(element, attr_name) {
                Some(node) => {
                    nodes.push(node.clone());
                    node
                }
                None => return nodes,
            },
        };
        if let (Some(location), Some(function_statement)) = (function.location(), function.statement()) {
            nodes.push(ExpressionNode::RepeatCallback(RepeatCallback {
                kind,
                location: location.clone(),
                function_statement,
                items_statement: items_statement.to_string(),
            }));
        }
        nodes
    }

    /// Opens an iteration construct. Returns false when its subtree must be
    /// skipped.
    ///
    /// The construct's own attribute expressions are evaluated in the
    /// enclosing scope and are kept even when `items` is missing.
    fn enter_repeat(
        &mut self,
        element: &ElementNode,
        attribute_nodes: Vec<ExpressionNode>,
        by_attribute: &HashMap<String, Vec<ExpressionNode>>,
    ) -> bool {
        self.add(attribute_nodes);

        let items = match by_attribute.get("items").and_then(|nodes| nodes.first()) {
            None => {
                let owner = self.owner().to_string();
                self.warn(
                    &owner,
                    format!("Unable to locate dom-repeat items property 'items' in template {}", owner),
                );
                return false;
            }
            // Resolution already warned about the unknown name.
            Some(ExpressionNode::Identifier(id)) if !self.resolves(&id.path) => return false,
            Some(node) => node.clone(),
        };
        let Some(items_statement) = items.statement() else {
            return false;
        };

        let first = |name: &str| by_attribute.get(name).and_then(|nodes| nodes.first());
        let sort = self.callback(element, "sort", CallbackKind::Sort, first("sort"), &items_statement);
        self.add(sort);
        let filter = self.callback(element, "filter", CallbackKind::Filter, first("filter"), &items_statement);
        self.add(filter);

        let (item, item_value) = self.local_binding(element, "as", DEFAULT_ITEM_ALIAS);
        let (index, index_value) = self.local_binding(element, "index-as", DEFAULT_INDEX_ALIAS);
        let depth = self.scope.push_repeat(item.clone(), index.clone());

        self.repeats.push(RepeatNode {
            location: self.location(element.start_tag),
            items: Box::new(items),
            item: item.clone(),
            index: index.clone(),
            depth,
            children: Vec::new(),
        });

        for (binding, value, kind) in [
            (&item, item_value, LocalKind::Item),
            (&index, index_value, LocalKind::Index),
        ] {
            let Some(value) = value.filter(|_| binding.renameable) else {
                continue;
            };
            let node = ExpressionNode::Identifier(IdentifierRef {
                location: self.location(value.span),
                path: value.text.clone(),
                qualifier: Qualifier::Local {
                    base: binding.name.clone(),
                    kind,
                    depth,
                    is_default: false,
                    renameable: true,
                },
                role: RecordRole::Identifier,
            });
            self.add([node]);
        }

        self.observe_list(element, &item);
        true
    }

    /// `observe="a b.c"`: each entry is a property of the iteration item.
    /// An explicit binding here was already handled by the attribute pass.
    fn observe_list(&mut self, element: &ElementNode, item: &LocalBinding) {
        let Some(value) = element.attribute("observe").and_then(|a| a.value.as_ref()) else {
            return;
        };
        if find_binding(&value.text, value.span.start).is_some() {
            return;
        }
        let mut entries = Vec::new();
        let mut start = None;
        for (i, ch) in value.text.char_indices().chain([(value.text.len(), ' ')]) {
            match (ch.is_whitespace(), start) {
                (true, Some(s)) => {
                    entries.push(Spanned::new(&value.text[s..i], value.span.start + s as u32));
                    start = None;
                }
                (false, None) => start = Some(i),
                _ => {}
            }
        }
        for entry in entries {
            let path = Spanned {
                text: format!("{}.{}", item.name, entry.text),
                span: entry.span,
            };
            let node = self.path_expression(&path, RecordRole::Observe);
            self.add([node]);
        }
    }

    fn exit_repeat(&mut self) {
        let Some(mut repeat) = self.repeats.pop() else {
            return;
        };
        if repeat.item.is_default {
            rescope_default_item(&mut repeat.children, repeat.depth);
        }
        self.scope.pop();
        self.add([ExpressionNode::Repeat(repeat)]);
    }

    fn is_raw_text(&self, element: &ElementNode) -> bool {
        self.options.is_raw_text_tag(&element.tag_name)
    }
}

impl TemplateVisitor for ExpressionWalker<'_> {
    fn visit_element(&mut self, element: &ElementNode) {
        if self.error.is_some() {
            return;
        }

        let mut attribute_nodes = Vec::new();
        let mut by_attribute: HashMap<String, Vec<ExpressionNode>> = HashMap::new();
        for attr in &element.attributes {
            if let Err(err) = check_attribute_location(self.document_id, self.source, element, attr) {
                self.error = Some(err);
                return;
            }
            let mut nodes = self.attribute_expressions(element, attr);
            if attr.name.to_ascii_lowercase().starts_with("on-") {
                nodes.retain(|n| !matches!(n, ExpressionNode::DataBinding(_)));
                nodes.extend(self.event_attribute_expressions(element, attr));
            }
            let key = attr.name.trim_end_matches('$').to_ascii_lowercase();
            by_attribute.insert(
                key,
                nodes
                    .iter()
                    .filter(|n| !matches!(n, ExpressionNode::Attribute(_)))
                    .cloned()
                    .collect(),
            );
            attribute_nodes.extend(nodes);
        }

        if element.is_repeat() {
            if !self.enter_repeat(element, attribute_nodes, &by_attribute) {
                return;
            }
            if !self.is_raw_text(element) {
                walk_element(self, element);
            }
            self.exit_repeat();
            return;
        }

        self.add(attribute_nodes);
        if !self.is_raw_text(element) {
            walk_element(self, element);
        }
    }

    fn visit_text(&mut self, text: &TextNode) {
        if self.error.is_some() {
            return;
        }
        for binding in find_bindings(&text.text, text.span.start) {
            if let Some(node) = self.binding_expression(&binding) {
                self.add([node]);
            }
        }
    }
}
