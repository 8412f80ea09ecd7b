//! Expression nodes built by the document walker.
//!
//! A closed set of binding kinds. Every node except `Literal` knows the byte
//! range it came from, and each knows how to express itself as a JavaScript
//! expression for the emitted fragment.

use oxc_span::Span;

use crate::scope::{LocalBinding, LocalKind, Resolution};

/// Where a node came from in the original document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub document_id: String,
    pub span: Span,
}

impl Location {
    pub fn new(document_id: &str, span: Span) -> Self {
        Self {
            document_id: document_id.to_string(),
            span,
        }
    }
}

/// How a reference is qualified in the emitted fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Qualifier {
    /// `this.<path>`.
    Instance { renameable: bool },
    /// `<path>`, where the leading segment is an iteration alias.
    Local {
        base: String,
        kind: LocalKind,
        depth: usize,
        is_default: bool,
        renameable: bool,
    },
    /// Property of an iteration variable that only has the synthetic
    /// default name. The base is never renamed, only the tail.
    RepeatItem { base: String },
}

impl Qualifier {
    pub fn from_resolution(resolution: &Resolution) -> Self {
        match resolution {
            Resolution::Instance { renameable, .. } => Qualifier::Instance {
                renameable: *renameable,
            },
            Resolution::Local {
                base,
                depth,
                kind,
                is_default,
                renameable,
                ..
            } => Qualifier::Local {
                base: base.clone(),
                kind: *kind,
                depth: *depth,
                is_default: *is_default,
                renameable: *renameable,
            },
        }
    }

    pub fn base(&self) -> Option<&str> {
        match self {
            Qualifier::Instance { .. } => None,
            Qualifier::Local { base, .. } | Qualifier::RepeatItem { base } => Some(base),
        }
    }

    fn qualify(&self, path: &str) -> String {
        match self {
            Qualifier::Instance { .. } => format!("this.{}", path),
            _ => path.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRole {
    Identifier,
    /// An entry of a construct's `observe` list.
    Observe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierRef {
    pub location: Location,
    pub path: String,
    pub qualifier: Qualifier,
    pub role: RecordRole,
}

impl IdentifierRef {
    pub fn statement(&self) -> String {
        self.qualifier.qualify(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    /// Span of the method name only.
    pub location: Location,
    pub name: String,
    pub qualifier: Qualifier,
    /// `Literal` or `Identifier` nodes, in call order.
    pub args: Vec<ExpressionNode>,
}

impl MethodCall {
    pub fn callee(&self) -> String {
        self.qualifier.qualify(&self.name)
    }

    pub fn statement(&self) -> String {
        let args: Vec<String> = self.args.iter().filter_map(|a| a.statement()).collect();
        format!("{}({})", self.callee(), args.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatNode {
    /// Start tag of the construct.
    pub location: Location,
    pub items: Box<ExpressionNode>,
    pub item: LocalBinding,
    pub index: LocalBinding,
    pub depth: usize,
    pub children: Vec<ExpressionNode>,
}

/// An attribute whose name is itself a renameable property of the target tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRef {
    pub location: Location,
    pub tag_name: String,
    pub type_name: String,
    /// Camel-cased property name.
    pub property: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventListenerRef {
    pub location: Location,
    pub method: String,
    pub qualifier: Qualifier,
}

impl EventListenerRef {
    pub fn callee(&self) -> String {
        self.qualifier.qualify(&self.method)
    }
}

/// Assignment of a bound value into a child element's property (and back,
/// for two-way bindings), so the type checker sees the data flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBindingEffect {
    pub location: Location,
    pub tag_name: String,
    pub type_name: String,
    pub property: String,
    pub source_statement: String,
    /// Write back into the source. Only set when the source is assignable.
    pub two_way: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    Sort,
    Filter,
}

/// `sort` / `filter` function of an iteration construct, called the way
/// the construct would call it. Never recorded; the function reference
/// itself is a separate node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatCallback {
    pub kind: CallbackKind,
    pub location: Location,
    pub function_statement: String,
    pub items_statement: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionNode {
    Identifier(IdentifierRef),
    Method(MethodCall),
    Literal(String),
    Repeat(RepeatNode),
    Attribute(AttributeRef),
    EventListener(EventListenerRef),
    DataBinding(DataBindingEffect),
    RepeatCallback(RepeatCallback),
}

impl ExpressionNode {
    pub fn location(&self) -> Option<&Location> {
        match self {
            ExpressionNode::Identifier(n) => Some(&n.location),
            ExpressionNode::Method(n) => Some(&n.location),
            ExpressionNode::Literal(_) => None,
            ExpressionNode::Repeat(n) => Some(&n.location),
            ExpressionNode::Attribute(n) => Some(&n.location),
            ExpressionNode::EventListener(n) => Some(&n.location),
            ExpressionNode::DataBinding(n) => Some(&n.location),
            ExpressionNode::RepeatCallback(n) => Some(&n.location),
        }
    }

    /// The node as a JavaScript expression, where it has a value.
    pub fn statement(&self) -> Option<String> {
        match self {
            ExpressionNode::Identifier(n) => Some(n.statement()),
            ExpressionNode::Method(n) => Some(n.statement()),
            ExpressionNode::Literal(text) => Some(text.clone()),
            _ => None,
        }
    }

    /// Whether the statement can be assigned to.
    pub fn is_assignable(&self) -> bool {
        matches!(self, ExpressionNode::Identifier(_))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESCOPING
// ═══════════════════════════════════════════════════════════════════════════════

fn rescope_qualifier(qualifier: &mut Qualifier, depth: usize) {
    let base = match qualifier {
        Qualifier::Local {
            base,
            kind: LocalKind::Item,
            depth: d,
            is_default: true,
            ..
        } if *d == depth => std::mem::take(base),
        _ => return,
    };
    *qualifier = Qualifier::RepeatItem { base };
}

/// Rewrites references to the default item alias of the frame at `depth`
/// into iteration-variable properties.
///
/// References are matched by the depth they resolved to, so aliases of
/// nested constructs are left alone.
pub fn rescope_default_item(nodes: &mut [ExpressionNode], depth: usize) {
    for node in nodes {
        match node {
            ExpressionNode::Identifier(n) => rescope_qualifier(&mut n.qualifier, depth),
            ExpressionNode::Method(n) => {
                rescope_qualifier(&mut n.qualifier, depth);
                rescope_default_item(&mut n.args, depth);
            }
            ExpressionNode::EventListener(n) => rescope_qualifier(&mut n.qualifier, depth),
            ExpressionNode::Repeat(n) => {
                rescope_default_item(std::slice::from_mut(n.items.as_mut()), depth);
                rescope_default_item(&mut n.children, depth);
            }
            ExpressionNode::Literal(_)
            | ExpressionNode::Attribute(_)
            | ExpressionNode::DataBinding(_)
            | ExpressionNode::RepeatCallback(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(path: &str, base: &str, depth: usize, is_default: bool) -> ExpressionNode {
        ExpressionNode::Identifier(IdentifierRef {
            location: Location::new("a.html", Span::new(0, path.len() as u32)),
            path: path.to_string(),
            qualifier: Qualifier::Local {
                base: base.to_string(),
                kind: LocalKind::Item,
                depth,
                is_default,
                renameable: false,
            },
            role: RecordRole::Identifier,
        })
    }

    #[test]
    fn test_statements() {
        let call = MethodCall {
            location: Location::new("a.html", Span::new(2, 9)),
            name: "compute".into(),
            qualifier: Qualifier::Instance { renameable: true },
            args: vec![
                ExpressionNode::Literal("'x'".into()),
                local("row.name", "row", 1, false),
            ],
        };
        assert_eq!(call.statement(), "this.compute('x', row.name)");
        assert!(!ExpressionNode::Method(call).is_assignable());
    }

    #[test]
    fn test_rescope_matches_depth_and_default_only() {
        let mut nodes = vec![
            local("item.a", "item", 1, true),
            local("item.b", "item", 2, true),
            local("row.c", "row", 1, false),
            ExpressionNode::Method(MethodCall {
                location: Location::new("a.html", Span::new(0, 1)),
                name: "f".into(),
                qualifier: Qualifier::Instance { renameable: true },
                args: vec![local("item.d", "item", 1, true)],
            }),
        ];
        rescope_default_item(&mut nodes, 1);

        let qualifier = |n: &ExpressionNode| match n {
            ExpressionNode::Identifier(i) => i.qualifier.clone(),
            ExpressionNode::Method(m) => match &m.args[0] {
                ExpressionNode::Identifier(i) => i.qualifier.clone(),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(qualifier(&nodes[0]), Qualifier::RepeatItem { base: "item".into() });
        assert!(matches!(qualifier(&nodes[1]), Qualifier::Local { depth: 2, .. }));
        assert!(matches!(qualifier(&nodes[2]), Qualifier::Local { .. }));
        assert_eq!(qualifier(&nodes[3]), Qualifier::RepeatItem { base: "item".into() });
    }
}
