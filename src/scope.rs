//! Lexical scopes for template expressions.
//!
//! The root frame exposes the owning component's schema. Each iteration
//! construct pushes a frame that exposes only its item and index aliases.
//! Frames live in an arena indexed by depth and link to their parent, so a
//! lookup is a plain walk up the parent chain.

use tracing::debug;

use crate::schema::ComponentSchema;

pub const DEFAULT_ITEM_ALIAS: &str = "item";
pub const DEFAULT_INDEX_ALIAS: &str = "index";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    Item,
    Index,
}

/// A name introduced by an iteration construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalBinding {
    pub name: String,
    /// No alias attribute was given; `name` is the synthetic default.
    pub is_default: bool,
    pub renameable: bool,
}

impl LocalBinding {
    pub fn new(name: &str, is_default: bool, renameable: bool) -> Self {
        Self {
            name: name.to_string(),
            is_default,
            renameable,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FrameSchema<'s> {
    /// Root: the component instance. `None` when the owner has no schema.
    Component(Option<&'s ComponentSchema>),
    Repeat {
        item: LocalBinding,
        index: LocalBinding,
    },
}

#[derive(Debug, Clone)]
pub struct ScopeFrame<'s> {
    pub owner_tag_name: String,
    pub schema: FrameSchema<'s>,
    pub parent: Option<usize>,
}

impl<'s> ScopeFrame<'s> {
    fn local(&self, leading: &str) -> Option<(LocalKind, &LocalBinding)> {
        match &self.schema {
            FrameSchema::Repeat { item, index } => {
                if item.name == leading {
                    Some((LocalKind::Item, item))
                } else if index.name == leading {
                    Some((LocalKind::Index, index))
                } else {
                    None
                }
            }
            FrameSchema::Component(_) => None,
        }
    }
}

/// Where a name resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A property of the root component instance.
    Instance {
        name: String,
        renameable: bool,
        owner_tag_name: String,
    },
    /// Claimed by an iteration frame's alias.
    Local {
        name: String,
        base: String,
        depth: usize,
        kind: LocalKind,
        is_default: bool,
        renameable: bool,
    },
}

impl Resolution {
    pub fn name(&self) -> &str {
        match self {
            Resolution::Instance { name, .. } | Resolution::Local { name, .. } => name,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Resolution::Local { .. })
    }
}

pub fn leading_segment(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCOPE STACK
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct ScopeStack<'s> {
    frames: Vec<ScopeFrame<'s>>,
}

impl<'s> ScopeStack<'s> {
    /// Opens the root frame for one template scan.
    pub fn new(owner_tag_name: &str, schema: Option<&'s ComponentSchema>) -> Self {
        Self {
            frames: vec![ScopeFrame {
                owner_tag_name: owner_tag_name.to_string(),
                schema: FrameSchema::Component(schema),
                parent: None,
            }],
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn root_tag_name(&self) -> &str {
        &self.frames[0].owner_tag_name
    }

    pub fn root_schema(&self) -> Option<&'s ComponentSchema> {
        match self.frames[0].schema {
            FrameSchema::Component(schema) => schema,
            FrameSchema::Repeat { .. } => None,
        }
    }

    pub fn innermost(&self) -> &ScopeFrame<'s> {
        &self.frames[self.frames.len() - 1]
    }

    /// Enters an iteration construct. Returns the new frame's depth.
    pub fn push_repeat(&mut self, item: LocalBinding, index: LocalBinding) -> usize {
        let parent = self.frames.len() - 1;
        debug!(item = %item.name, index = %index.name, depth = parent + 1, "push repeat frame");
        self.frames.push(ScopeFrame {
            owner_tag_name: "dom-repeat".to_string(),
            schema: FrameSchema::Repeat { item, index },
            parent: Some(parent),
        });
        parent + 1
    }

    /// Leaves the innermost iteration construct. The root frame is never popped.
    pub fn pop(&mut self) -> Option<ScopeFrame<'s>> {
        if self.frames.len() == 1 {
            return None;
        }
        let frame = self.frames.pop();
        debug!(depth = self.frames.len(), "pop repeat frame");
        frame
    }

    /// Resolves an identifier path, innermost frame first.
    pub fn lookup(&self, name: &str) -> Option<Resolution> {
        let leading = leading_segment(name);
        let mut current = Some(self.frames.len() - 1);
        while let Some(depth) = current {
            let frame = &self.frames[depth];
            match &frame.schema {
                FrameSchema::Repeat { .. } => {
                    if let Some((kind, binding)) = frame.local(leading) {
                        return Some(Resolution::Local {
                            name: name.to_string(),
                            base: binding.name.clone(),
                            depth,
                            kind,
                            is_default: binding.is_default,
                            renameable: binding.renameable,
                        });
                    }
                }
                FrameSchema::Component(schema) => {
                    let info = schema.and_then(|s| s.property(leading))?;
                    return Some(Resolution::Instance {
                        name: name.to_string(),
                        renameable: info.is_renameable,
                        owner_tag_name: frame.owner_tag_name.clone(),
                    });
                }
            }
            current = frame.parent;
        }
        None
    }

    /// Resolves a method on the root component. Returns its renameability.
    pub fn lookup_method(&self, name: &str) -> Option<bool> {
        self.root_schema()
            .and_then(|s| s.method_renameable(leading_segment(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PropertyInfo;

    fn schema() -> ComponentSchema {
        ComponentSchema::new("foo-bar")
            .with_property("list", PropertyInfo::renameable())
            .with_property("row", PropertyInfo::renameable())
            .with_property("computed", PropertyInfo::default())
            .with_method("format", true)
    }

    #[test]
    fn test_root_lookup() {
        let schema = schema();
        let scope = ScopeStack::new("foo-bar", Some(&schema));
        assert_eq!(
            scope.lookup("list.length"),
            Some(Resolution::Instance {
                name: "list.length".into(),
                renameable: true,
                owner_tag_name: "foo-bar".into(),
            })
        );
        match scope.lookup("computed") {
            Some(Resolution::Instance { renameable, name, .. }) => {
                assert!(!renameable);
                assert_eq!(name, "computed", "non-renameable keeps its name");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(scope.lookup("missing"), None);
        assert_eq!(scope.lookup_method("format"), Some(true));
        assert_eq!(scope.lookup_method("list"), None);
    }

    #[test]
    fn test_alias_shadows_schema_property() {
        let schema = schema();
        let mut scope = ScopeStack::new("foo-bar", Some(&schema));
        scope.push_repeat(
            LocalBinding::new("row", false, false),
            LocalBinding::new("i", false, false),
        );
        match scope.lookup("row.name") {
            Some(Resolution::Local { base, depth, kind, .. }) => {
                assert_eq!(base, "row");
                assert_eq!(depth, 1);
                assert_eq!(kind, LocalKind::Item);
            }
            other => panic!("expected local, got {:?}", other),
        }
        assert!(matches!(scope.lookup("i"), Some(Resolution::Local { kind: LocalKind::Index, .. })));
        assert!(matches!(scope.lookup("list"), Some(Resolution::Instance { .. })));
    }

    #[test]
    fn test_innermost_alias_wins() {
        let schema = schema();
        let mut scope = ScopeStack::new("foo-bar", Some(&schema));
        scope.push_repeat(LocalBinding::new("x", false, false), LocalBinding::new("i", false, false));
        scope.push_repeat(LocalBinding::new("x", false, false), LocalBinding::new("j", false, false));
        assert!(matches!(scope.lookup("x.y"), Some(Resolution::Local { depth: 2, .. })));
        assert!(matches!(scope.lookup("i"), Some(Resolution::Local { depth: 1, .. })));

        scope.pop();
        assert!(matches!(scope.lookup("x.y"), Some(Resolution::Local { depth: 1, .. })));
        assert_eq!(scope.lookup("j"), None);
        scope.pop();
        assert!(scope.pop().is_none(), "root frame stays");
        assert_eq!(scope.depth(), 0);
    }

    #[test]
    fn test_without_schema_nothing_resolves() {
        let scope = ScopeStack::new("x-y", None);
        assert_eq!(scope.lookup("anything"), None);
        assert_eq!(scope.lookup_method("anything"), None);
        assert_eq!(scope.root_tag_name(), "x-y");
    }
}
