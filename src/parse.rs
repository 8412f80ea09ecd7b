//! Template markup parser.
//!
//! A small tokenizer and tree builder that keeps byte-exact spans for every
//! node and attribute. It is deliberately forgiving about structure (unclosed
//! elements are closed implicitly, stray end tags are ignored) and only fails
//! on input it cannot tokenize at all.

use oxc_span::Span;

use crate::document::{Attribute, AttributeValue, ElementNode, TemplateDocument, TemplateNode, TextNode};
use crate::error::{line_column, RenameError};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is raw text up to the matching end tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn parse_document(id: &str, source: &str) -> Result<TemplateDocument, RenameError> {
    let mut parser = MarkupParser::new(id, source);
    parser.run()?;
    Ok(TemplateDocument {
        id: id.to_string(),
        children: parser.finish(),
    })
}

struct MarkupParser<'s> {
    id: &'s str,
    source: &'s str,
    bytes: &'s [u8],
    pos: usize,
    roots: Vec<TemplateNode>,
    open: Vec<ElementNode>,
}

impl<'s> MarkupParser<'s> {
    fn new(id: &'s str, source: &'s str) -> Self {
        Self {
            id,
            source,
            bytes: source.as_bytes(),
            pos: 0,
            roots: Vec::new(),
            open: Vec::new(),
        }
    }

    fn error(&self, at: usize, message: &str) -> RenameError {
        let (line, column) = line_column(self.source, at);
        RenameError::Markup {
            document_id: self.id.to_string(),
            message: message.to_string(),
            line,
            column,
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.bytes[self.pos..].starts_with(s.as_bytes())
    }

    fn peek_at(&self, idx: usize) -> Option<u8> {
        self.bytes.get(idx).copied()
    }

    fn find_from(&self, from: usize, needle: &str) -> Option<usize> {
        self.source[from..].find(needle).map(|i| from + i)
    }

    fn push_node(&mut self, node: TemplateNode) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn close_top(&mut self, end: u32) {
        if let Some(mut el) = self.open.pop() {
            el.span = Span::new(el.span.start, end);
            self.push_node(TemplateNode::Element(el));
        }
    }

    fn finish(mut self) -> Vec<TemplateNode> {
        let end = self.source.len() as u32;
        while !self.open.is_empty() {
            self.close_top(end);
        }
        self.roots
    }

    fn run(&mut self) -> Result<(), RenameError> {
        while self.pos < self.bytes.len() {
            if self.starts_with("<!--") {
                self.comment()?;
            } else if self.starts_with("</") && self.peek_at(self.pos + 2).is_some_and(|b| b.is_ascii_alphabetic()) {
                self.end_tag()?;
            } else if self.starts_with("<!") || self.starts_with("<?") {
                self.declaration()?;
            } else if self.bytes[self.pos] == b'<' && self.peek_at(self.pos + 1).is_some_and(|b| b.is_ascii_alphabetic()) {
                self.start_tag()?;
            } else {
                self.text();
            }
        }
        Ok(())
    }

    fn comment(&mut self) -> Result<(), RenameError> {
        let start = self.pos;
        let end = self
            .find_from(start + 4, "-->")
            .ok_or_else(|| self.error(start, "unterminated comment"))?
            + 3;
        self.push_node(TemplateNode::Comment(Span::new(start as u32, end as u32)));
        self.pos = end;
        Ok(())
    }

    fn declaration(&mut self) -> Result<(), RenameError> {
        let start = self.pos;
        let end = self
            .find_from(start + 2, ">")
            .ok_or_else(|| self.error(start, "unterminated declaration"))?
            + 1;
        self.push_node(TemplateNode::Comment(Span::new(start as u32, end as u32)));
        self.pos = end;
        Ok(())
    }

    fn text(&mut self) {
        let start = self.pos;
        let mut i = start + 1;
        while i < self.bytes.len() {
            if self.bytes[i] == b'<'
                && self
                    .peek_at(i + 1)
                    .is_some_and(|b| b.is_ascii_alphabetic() || b == b'/' || b == b'!' || b == b'?')
            {
                break;
            }
            i += 1;
        }
        self.push_node(TemplateNode::Text(TextNode {
            text: self.source[start..i].to_string(),
            span: Span::new(start as u32, i as u32),
        }));
        self.pos = i;
    }

    fn read_name(&mut self) -> (String, usize) {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b.is_ascii_whitespace() || b == b'>' || b == b'/' || b == b'=' {
                break;
            }
            self.pos += 1;
        }
        (self.source[start..self.pos].to_string(), start)
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn end_tag(&mut self) -> Result<(), RenameError> {
        let start = self.pos;
        self.pos += 2;
        let (name, _) = self.read_name();
        let end = self
            .find_from(self.pos, ">")
            .ok_or_else(|| self.error(start, "unterminated end tag"))?
            + 1;
        self.pos = end;

        let name = name.to_ascii_lowercase();
        let Some(depth) = self.open.iter().rposition(|el| el.tag_name == name) else {
            return Ok(());
        };
        // Elements left open inside the matched one end where this end tag starts.
        while self.open.len() > depth + 1 {
            self.close_top(start as u32);
        }
        self.close_top(end as u32);
        Ok(())
    }

    fn start_tag(&mut self) -> Result<(), RenameError> {
        let start = self.pos;
        self.pos += 1;
        let (raw_name, _) = self.read_name();
        let tag_name = raw_name.to_ascii_lowercase();
        let mut attributes = Vec::new();
        let self_closing;

        loop {
            self.skip_whitespace();
            if self.pos >= self.bytes.len() {
                return Err(self.error(start, &format!("unterminated start tag <{}>", tag_name)));
            }
            match self.bytes[self.pos] {
                b'>' => {
                    self.pos += 1;
                    self_closing = false;
                    break;
                }
                b'/' if self.peek_at(self.pos + 1) == Some(b'>') => {
                    self.pos += 2;
                    self_closing = true;
                    break;
                }
                b'/' | b'=' => {
                    self.pos += 1;
                }
                _ => attributes.push(self.attribute()?),
            }
        }

        let element = ElementNode {
            tag_name,
            attributes,
            children: Vec::new(),
            span: Span::new(start as u32, self.pos as u32),
            start_tag: Span::new(start as u32, self.pos as u32),
        };

        if self_closing || VOID_ELEMENTS.contains(&element.tag_name.as_str()) {
            self.push_node(TemplateNode::Element(element));
            return Ok(());
        }

        let raw_text = RAW_TEXT_ELEMENTS.contains(&element.tag_name.as_str());
        let closing = format!("</{}", element.tag_name);
        self.open.push(element);

        if raw_text {
            let content_start = self.pos;
            let content_end = find_ignore_case(self.source, content_start, &closing)
                .unwrap_or(self.source.len());
            if content_end > content_start {
                self.push_node(TemplateNode::Text(TextNode {
                    text: self.source[content_start..content_end].to_string(),
                    span: Span::new(content_start as u32, content_end as u32),
                }));
            }
            self.pos = content_end;
        }
        Ok(())
    }

    fn attribute(&mut self) -> Result<Attribute, RenameError> {
        let (name, name_start) = self.read_name();
        let name_span = Span::new(name_start as u32, self.pos as u32);

        let after_name = self.pos;
        self.skip_whitespace();
        if self.pos >= self.bytes.len() || self.bytes[self.pos] != b'=' {
            self.pos = after_name;
            return Ok(Attribute {
                name,
                name_span,
                value: None,
            });
        }
        self.pos += 1;
        self.skip_whitespace();

        let value = match self.peek_at(self.pos) {
            Some(quote @ (b'"' | b'\'')) => {
                let value_start = self.pos + 1;
                let close = self.bytes[value_start..]
                    .iter()
                    .position(|&b| b == quote)
                    .map(|i| value_start + i)
                    .ok_or_else(|| self.error(self.pos, &format!("unterminated value for attribute '{}'", name)))?;
                self.pos = close + 1;
                AttributeValue {
                    text: self.source[value_start..close].to_string(),
                    span: Span::new(value_start as u32, close as u32),
                }
            }
            _ => {
                let value_start = self.pos;
                while self.pos < self.bytes.len() {
                    let b = self.bytes[self.pos];
                    if b.is_ascii_whitespace() || b == b'>' {
                        break;
                    }
                    self.pos += 1;
                }
                AttributeValue {
                    text: self.source[value_start..self.pos].to_string(),
                    span: Span::new(value_start as u32, self.pos as u32),
                }
            }
        };

        Ok(Attribute {
            name,
            name_span,
            value: Some(value),
        })
    }
}

fn find_ignore_case(haystack: &str, from: usize, needle: &str) -> Option<usize> {
    let hay = &haystack.as_bytes()[from..];
    let needle = needle.as_bytes();
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len())
        .find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
        .map(|i| from + i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(src: &str, span: Span) -> &str {
        &src[span.start as usize..span.end as usize]
    }

    fn first_element(doc: &TemplateDocument) -> &ElementNode {
        doc.children
            .iter()
            .find_map(|n| match n {
                TemplateNode::Element(el) => Some(el),
                _ => None,
            })
            .expect("an element")
    }

    #[test]
    fn test_attribute_spans() {
        let src = r#"<foo-bar data-foo="{{bar}}" hidden title='x y' count=3></foo-bar>"#;
        let doc = parse_document("a.html", src).unwrap();
        let el = first_element(&doc);
        assert_eq!(el.tag_name, "foo-bar");
        assert_eq!(el.attributes.len(), 4);
        for attr in &el.attributes {
            assert_eq!(slice(src, attr.name_span), attr.name);
            if let Some(v) = &attr.value {
                assert_eq!(slice(src, v.span), v.text);
            }
        }
        assert_eq!(el.attribute_value("data-foo"), Some("{{bar}}"));
        assert!(el.attribute("hidden").unwrap().value.is_none());
        assert_eq!(el.attribute_value("title"), Some("x y"));
        assert_eq!(el.attribute_value("count"), Some("3"));
        assert_eq!(slice(src, el.span), src);
    }

    #[test]
    fn test_nesting_void_and_text() {
        let src = "<div>a<br>b<span>[[c]]</span></div>";
        let doc = parse_document("a.html", src).unwrap();
        let div = first_element(&doc);
        assert_eq!(div.children.len(), 4);
        let span_el = div.child_elements().nth(1).unwrap();
        assert_eq!(span_el.tag_name, "span");
        match &span_el.children[0] {
            TemplateNode::Text(t) => {
                assert_eq!(t.text, "[[c]]");
                assert_eq!(slice(src, t.span), "[[c]]");
            }
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_raw_text_elements() {
        let src = "<style>a < b { color: red }</style><script>if (a<b) {}</script>";
        let doc = parse_document("a.html", src).unwrap();
        assert_eq!(doc.children.len(), 2);
        for node in &doc.children {
            match node {
                TemplateNode::Element(el) => {
                    assert_eq!(el.children.len(), 1, "raw text is a single child");
                }
                other => panic!("expected element, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_implicit_close_and_stray_end_tag() {
        let src = "<!doctype html><ul><li>one<li>two</ul></p><!-- c -->";
        let doc = parse_document("a.html", src).unwrap();
        assert!(matches!(doc.children[0], TemplateNode::Comment(_)));
        let ul = doc.find_elements("ul");
        assert_eq!(ul.len(), 1);
        assert_eq!(slice(src, ul[0].span), "<ul><li>one<li>two</ul>");
        assert_eq!(doc.find_elements("li").len(), 2);
        assert!(matches!(doc.children.last(), Some(TemplateNode::Comment(_))));
    }

    #[test]
    fn test_unterminated_value_is_error() {
        let src = "<div>\n<a href=\"oops></a>";
        match parse_document("a.html", src) {
            Err(RenameError::Markup { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected markup error, got {:?}", other),
        }
    }
}
