use oxc_span::Span;

use crate::document::{ElementNode, TemplateDocument, TemplateNode, TextNode};

/// The TemplateVisitor trait defines the traversal order for template trees.
///
/// Rules:
/// 1. Traversal is depth-first in document order.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers call the matching `walk_*` function to continue traversal,
///    or skip it to prune the subtree.
pub trait TemplateVisitor {
    fn visit_document(&mut self, document: &TemplateDocument) {
        walk_document(self, document);
    }

    fn visit_node(&mut self, node: &TemplateNode) {
        walk_node(self, node);
    }

    fn visit_element(&mut self, element: &ElementNode) {
        walk_element(self, element);
    }

    fn visit_text(&mut self, _text: &TextNode) {
        // Leaf node
    }

    fn visit_comment(&mut self, _span: Span) {
        // Leaf node
    }

    fn visit_children(&mut self, children: &[TemplateNode]) {
        walk_children(self, children);
    }
}

pub fn walk_document<V: TemplateVisitor + ?Sized>(visitor: &mut V, document: &TemplateDocument) {
    visitor.visit_children(&document.children);
}

pub fn walk_children<V: TemplateVisitor + ?Sized>(visitor: &mut V, children: &[TemplateNode]) {
    for node in children {
        visitor.visit_node(node);
    }
}

pub fn walk_node<V: TemplateVisitor + ?Sized>(visitor: &mut V, node: &TemplateNode) {
    match node {
        TemplateNode::Element(el) => visitor.visit_element(el),
        TemplateNode::Text(t) => visitor.visit_text(t),
        TemplateNode::Comment(span) => visitor.visit_comment(*span),
    }
}

pub fn walk_element<V: TemplateVisitor + ?Sized>(visitor: &mut V, element: &ElementNode) {
    visitor.visit_children(&element.children);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_document;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl TemplateVisitor for Recorder {
        fn visit_element(&mut self, element: &ElementNode) {
            self.events.push(format!("<{}>", element.tag_name));
            if element.tag_name != "skip" {
                walk_element(self, element);
            }
            self.events.push(format!("</{}>", element.tag_name));
        }

        fn visit_text(&mut self, text: &TextNode) {
            self.events.push(text.text.clone());
        }
    }

    #[test]
    fn test_document_order_and_pruning() {
        let doc = parse_document("a.html", "<a>1<b>2</b><skip>3</skip>4</a>").unwrap();
        let mut rec = Recorder::default();
        rec.visit_document(&doc);
        assert_eq!(
            rec.events,
            vec!["<a>", "1", "<b>", "2", "</b>", "<skip>", "</skip>", "4", "</a>"]
        );
    }
}
