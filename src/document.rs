//! Location-aware template tree.
//!
//! Every element, attribute name, attribute value and text node keeps the byte
//! span it occupies in the original document so later passes can splice the
//! original text without re-serializing markup.

use oxc_span::Span;
use serde::{Deserialize, Serialize};

use crate::error::{line_column, RenameError};
use crate::source_map::SourceMap;

/// A document as handed to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    /// Stable id (original path or URL). Recorded in the emitted fragment.
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_map: Option<SourceMap>,
}

impl SourceDocument {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            source_map: None,
        }
    }

    pub fn with_source_map(mut self, source_map: SourceMap) -> Self {
        self.source_map = Some(source_map);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDocument {
    pub id: String,
    pub children: Vec<TemplateNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    Element(ElementNode),
    Text(TextNode),
    /// Comments, doctypes and processing instructions.
    Comment(Span),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeValue {
    /// Raw text between the quotes (no entity decoding).
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub name_span: Span,
    pub value: Option<AttributeValue>,
}

impl Attribute {
    pub fn value_text(&self) -> &str {
        self.value.as_ref().map(|v| v.text.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    /// Lower-cased tag name.
    pub tag_name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<TemplateNode>,
    /// `<` of the start tag through the end of the end tag (or start tag).
    pub span: Span,
    pub start_tag: Span,
}

impl ElementNode {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attribute(name).map(|a| a.value_text())
    }

    /// `<template is="x">` behaves as `<x>`.
    pub fn effective_tag_name(&self) -> &str {
        if self.tag_name == "template" {
            if let Some(is) = self.attribute_value("is") {
                return is;
            }
        }
        &self.tag_name
    }

    pub fn is_repeat(&self) -> bool {
        self.effective_tag_name() == "dom-repeat"
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &ElementNode> {
        self.children.iter().filter_map(|c| match c {
            TemplateNode::Element(el) => Some(el),
            _ => None,
        })
    }
}

impl TemplateDocument {
    /// Depth-first search for elements with the given tag.
    pub fn find_elements<'a>(&'a self, tag_name: &str) -> Vec<&'a ElementNode> {
        fn collect<'a>(nodes: &'a [TemplateNode], tag: &str, out: &mut Vec<&'a ElementNode>) {
            for node in nodes {
                if let TemplateNode::Element(el) = node {
                    if el.tag_name.eq_ignore_ascii_case(tag) {
                        out.push(el);
                    }
                    collect(&el.children, tag, out);
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.children, tag_name, &mut out);
        out
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOCATION CHECKS
// ═══════════════════════════════════════════════════════════════════════════════

fn span_text(source: &str, span: Span) -> Option<&str> {
    source.get(span.start as usize..span.end as usize)
}

/// Verifies the attribute's recorded spans against the document text.
///
/// Every offset downstream is derived from these spans, so a mismatch is fatal.
pub fn check_attribute_location(
    document_id: &str,
    source: &str,
    element: &ElementNode,
    attribute: &Attribute,
) -> Result<(), RenameError> {
    let name_ok = span_text(source, attribute.name_span) == Some(attribute.name.as_str());
    let value_ok = match &attribute.value {
        Some(value) => span_text(source, value.span) == Some(value.text.as_str()),
        None => true,
    };
    if name_ok && value_ok {
        return Ok(());
    }
    let (line, column) = line_column(source, attribute.name_span.start as usize);
    Err(RenameError::MalformedLocation {
        document_id: document_id.to_string(),
        tag_name: element.tag_name.clone(),
        attribute: attribute.name.clone(),
        line,
        column,
    })
}
