//! The RELAX NG abstract syntax tree.
//!
//! The tree is a flat arena: every node lives in [`PatternTree::nodes`] and
//! refers to its children by index. Simplifier passes mutate nodes in place
//! and replace whole subtrees by swapping arena slots, so detached nodes
//! simply become unreachable from the root. Between passes the tree is
//! single-owner; the validator only reads it.

use std::fmt;

/// Value of the `combine` attribute on `start` and `define`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combine {
    Choice,
    Interleave,
}

impl Combine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Combine::Choice => "choice",
            Combine::Interleave => "interleave",
        }
    }
}

/// Discriminant of an AST node.
///
/// Covers the three disjoint node families: patterns, grammar content and
/// name classes. `Element(Some(name))` and `Attribute(Some(name))` are the
/// named shorthands of the full syntax; the simplifier's first pass lifts
/// the scalar into a `Name` child and leaves `None` behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    // patterns
    Empty,
    Text,
    Value(Box<str>),
    Data(Box<str>),
    NotAllowed,
    Ref(Box<str>),
    ParentRef(Box<str>),
    Element(Option<Box<str>>),
    Attribute(Option<Box<str>>),
    Group,
    Interleave,
    Choice,
    Optional,
    ZeroOrMore,
    OneOrMore,
    Mixed,
    Grammar,
    // grammar content
    Start(Option<Combine>),
    Define {
        name: Box<str>,
        combine: Option<Combine>,
    },
    // name classes
    Name(Box<str>),
    AnyName,
    NameChoice,
    ExceptNameClass,
}

impl NodeKind {
    /// The wire-form element name of this node kind.
    pub fn kind_name(&self) -> &'static str {
        use NodeKind::*;

        match self {
            Empty => "empty",
            Text => "text",
            Value(_) => "value",
            Data(_) => "data",
            NotAllowed => "notAllowed",
            Ref(_) => "ref",
            ParentRef(_) => "parentRef",
            Element(_) => "element",
            Attribute(_) => "attribute",
            Group => "group",
            Interleave => "interleave",
            Choice => "choice",
            Optional => "optional",
            ZeroOrMore => "zeroOrMore",
            OneOrMore => "oneOrMore",
            Mixed => "mixed",
            Grammar => "grammar",
            Start(_) => "start",
            Define { .. } => "define",
            Name(_) => "name",
            AnyName => "anyName",
            NameChoice => "choice",
            ExceptNameClass => "except",
        }
    }

    pub fn is_name_class(&self) -> bool {
        use NodeKind::*;

        matches!(self, Name(_) | AnyName | NameChoice | ExceptNameClass)
    }

    pub fn is_grammar_content(&self) -> bool {
        use NodeKind::*;

        matches!(self, Start(_) | Define { .. })
    }

    pub fn is_pattern(&self) -> bool {
        !self.is_name_class() && !self.is_grammar_content()
    }
}

/// A single arena node: its kind plus the indices of its children.
#[derive(Debug, Clone)]
pub struct RngNode {
    pub kind: NodeKind,
    pub children: Vec<usize>,
}

/// The grammar tree. `root` designates the top node; everything unreachable
/// from it is garbage left behind by simplifier rewrites.
#[derive(Debug, Clone, Default)]
pub struct PatternTree {
    pub(crate) nodes: Vec<RngNode>,
    pub(crate) root: usize,
}

impl PatternTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn set_root(&mut self, id: usize) {
        assert!(id < self.nodes.len());
        self.root = id;
    }

    pub fn node(&self, id: usize) -> &RngNode {
        &self.nodes[id]
    }

    pub fn kind(&self, id: usize) -> &NodeKind {
        &self.nodes[id].kind
    }

    pub fn children(&self, id: usize) -> &[usize] {
        &self.nodes[id].children
    }

    pub(crate) fn push_node(&mut self, kind: NodeKind, children: Vec<usize>) -> usize {
        let id = self.nodes.len();
        self.nodes.push(RngNode { kind, children });
        id
    }

    /// Deep structural copy of the subtree at `src`; returns the copy's root.
    pub(crate) fn deep_copy(&mut self, src: usize) -> usize {
        let kind = self.nodes[src].kind.clone();
        let children = self.nodes[src]
            .children
            .clone()
            .into_iter()
            .map(|ch| self.deep_copy(ch))
            .collect();
        self.push_node(kind, children)
    }
}

// Builder constructors. Each pushes one node and returns its index, applying
// the syntactic defaults of the full syntax: an element with no content
// pattern carries an implicit `empty`.
impl PatternTree {
    pub fn empty(&mut self) -> usize {
        self.push_node(NodeKind::Empty, vec![])
    }

    pub fn text(&mut self) -> usize {
        self.push_node(NodeKind::Text, vec![])
    }

    pub fn value(&mut self, value: &str) -> usize {
        self.push_node(NodeKind::Value(value.into()), vec![])
    }

    pub fn data(&mut self, data_type: &str) -> usize {
        self.push_node(NodeKind::Data(data_type.into()), vec![])
    }

    pub fn not_allowed(&mut self) -> usize {
        self.push_node(NodeKind::NotAllowed, vec![])
    }

    pub fn ref_to(&mut self, name: &str) -> usize {
        self.push_node(NodeKind::Ref(name.into()), vec![])
    }

    pub fn parent_ref(&mut self, name: &str) -> usize {
        self.push_node(NodeKind::ParentRef(name.into()), vec![])
    }

    pub fn element_named(&mut self, name: &str, mut patterns: Vec<usize>) -> usize {
        if patterns.is_empty() {
            patterns.push(self.empty());
        }
        self.push_node(NodeKind::Element(Some(name.into())), patterns)
    }

    pub fn element(&mut self, name_class: usize, mut patterns: Vec<usize>) -> usize {
        if patterns.is_empty() {
            patterns.push(self.empty());
        }
        let mut children = vec![name_class];
        children.append(&mut patterns);
        self.push_node(NodeKind::Element(None), children)
    }

    pub fn attribute_named(&mut self, name: &str, pattern: Option<usize>) -> usize {
        self.push_node(
            NodeKind::Attribute(Some(name.into())),
            pattern.into_iter().collect(),
        )
    }

    pub fn attribute(&mut self, name_class: usize, pattern: Option<usize>) -> usize {
        let mut children = vec![name_class];
        children.extend(pattern);
        self.push_node(NodeKind::Attribute(None), children)
    }

    pub fn group(&mut self, patterns: Vec<usize>) -> usize {
        self.push_node(NodeKind::Group, patterns)
    }

    pub fn interleave(&mut self, patterns: Vec<usize>) -> usize {
        self.push_node(NodeKind::Interleave, patterns)
    }

    pub fn choice(&mut self, patterns: Vec<usize>) -> usize {
        self.push_node(NodeKind::Choice, patterns)
    }

    pub fn optional(&mut self, patterns: Vec<usize>) -> usize {
        self.push_node(NodeKind::Optional, patterns)
    }

    pub fn zero_or_more(&mut self, patterns: Vec<usize>) -> usize {
        self.push_node(NodeKind::ZeroOrMore, patterns)
    }

    pub fn one_or_more(&mut self, patterns: Vec<usize>) -> usize {
        self.push_node(NodeKind::OneOrMore, patterns)
    }

    pub fn mixed(&mut self, patterns: Vec<usize>) -> usize {
        self.push_node(NodeKind::Mixed, patterns)
    }

    pub fn grammar(&mut self, content: Vec<usize>) -> usize {
        self.push_node(NodeKind::Grammar, content)
    }

    pub fn start(&mut self, combine: Option<Combine>, pattern: usize) -> usize {
        self.push_node(NodeKind::Start(combine), vec![pattern])
    }

    pub fn define(&mut self, name: &str, combine: Option<Combine>, patterns: Vec<usize>) -> usize {
        self.push_node(
            NodeKind::Define {
                name: name.into(),
                combine,
            },
            patterns,
        )
    }

    pub fn name(&mut self, name: &str) -> usize {
        self.push_node(NodeKind::Name(name.into()), vec![])
    }

    pub fn any_name(&mut self, except: Option<usize>) -> usize {
        self.push_node(NodeKind::AnyName, except.into_iter().collect())
    }

    pub fn name_choice(&mut self, left: usize, right: usize) -> usize {
        self.push_node(NodeKind::NameChoice, vec![left, right])
    }

    pub fn except_name_class(&mut self, name_class: usize) -> usize {
        self.push_node(NodeKind::ExceptNameClass, vec![name_class])
    }
}

impl PatternTree {
    fn display_node(&self, f: &mut fmt::Formatter<'_>, id: usize, top: bool) -> fmt::Result {
        let node = &self.nodes[id];
        let tag = node.kind.kind_name();
        write!(f, "<{tag}")?;
        if top && matches!(node.kind, NodeKind::Grammar) {
            write!(f, " xmlns=\"{}\"", crate::XML_RELAX_NG_NAMESPACE)?;
        }
        match &node.kind {
            NodeKind::Data(data_type) => write!(f, " type=\"{data_type}\"")?,
            NodeKind::Ref(name) | NodeKind::ParentRef(name) => write!(f, " name=\"{name}\"")?,
            NodeKind::Element(Some(name)) | NodeKind::Attribute(Some(name)) => {
                write!(f, " name=\"{name}\"")?
            }
            NodeKind::Start(Some(combine)) => write!(f, " combine=\"{}\"", combine.as_str())?,
            NodeKind::Define { name, combine } => {
                write!(f, " name=\"{name}\"")?;
                if let Some(combine) = combine {
                    write!(f, " combine=\"{}\"", combine.as_str())?;
                }
            }
            _ => {}
        }

        match &node.kind {
            NodeKind::Value(value) => write!(f, ">{value}</{tag}>"),
            NodeKind::Name(name) => write!(f, ">{name}</{tag}>"),
            _ if node.children.is_empty() => write!(f, "/>"),
            _ => {
                write!(f, ">")?;
                for &ch in &node.children {
                    self.display_node(f, ch, false)?;
                }
                write!(f, "</{tag}>")
            }
        }
    }
}

impl fmt::Display for PatternTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nodes.is_empty() {
            return Ok(());
        }
        self.display_node(f, self.root, true)
    }
}
