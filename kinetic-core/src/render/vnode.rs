//! Virtual Nodes
//!
//! A [`VNode`] describes one node of the tree a component wants on screen.
//! Trees are plain data: they are rebuilt on every render and compared
//! against the previously mounted tree.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::Serialize;

/// Bit set describing a vnode's shape, so the renderer can branch without
/// inspecting the node in detail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ShapeFlags(u16);

impl ShapeFlags {
    pub const EMPTY: Self = Self(0);
    /// A host element such as `div`.
    pub const ELEMENT: Self = Self(1);
    /// Children are a single text string.
    pub const TEXT_CHILDREN: Self = Self(1 << 3);
    /// Children are a list of vnodes.
    pub const ARRAY_CHILDREN: Self = Self(1 << 4);

    pub fn bits(self) -> u16 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: ShapeFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ShapeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ShapeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// What a vnode renders as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "tag")]
pub enum NodeType {
    /// A host element with the given tag.
    Element(String),
    /// A text node. Its content is carried in [`Children::Text`].
    Text,
    /// A transparent group of children.
    Fragment,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Element(tag) => write!(f, "<{tag}>"),
            NodeType::Text => f.write_str("#text"),
            NodeType::Fragment => f.write_str("#fragment"),
        }
    }
}

/// Children of a vnode.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Children {
    #[default]
    None,
    Text(String),
    Array(Vec<VNode>),
}

impl From<&str> for Children {
    fn from(text: &str) -> Self {
        Children::Text(text.to_string())
    }
}

impl From<String> for Children {
    fn from(text: String) -> Self {
        Children::Text(text)
    }
}

impl From<Vec<VNode>> for Children {
    fn from(nodes: Vec<VNode>) -> Self {
        Children::Array(nodes)
    }
}

impl From<VNode> for Children {
    fn from(node: VNode) -> Self {
        Children::Array(vec![node])
    }
}

/// Element attributes, ordered by name.
pub type Props = BTreeMap<String, String>;

/// A virtual node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VNode {
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(skip_serializing_if = "Props::is_empty")]
    pub props: Props,
    pub children: Children,
    pub shape_flags: ShapeFlags,
}

impl VNode {
    /// Build a vnode, deriving its shape flags from the type and children.
    pub fn new(node_type: NodeType, props: Props, children: Children) -> Self {
        let mut shape_flags = match node_type {
            NodeType::Element(_) => ShapeFlags::ELEMENT,
            NodeType::Text | NodeType::Fragment => ShapeFlags::EMPTY,
        };
        match children {
            Children::None => {}
            Children::Text(_) => shape_flags |= ShapeFlags::TEXT_CHILDREN,
            Children::Array(_) => shape_flags |= ShapeFlags::ARRAY_CHILDREN,
        }

        Self {
            node_type,
            props,
            children,
            shape_flags,
        }
    }

    /// A text node.
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(NodeType::Text, Props::new(), Children::Text(content.into()))
    }

    /// A fragment grouping `children`.
    pub fn fragment(children: Vec<VNode>) -> Self {
        Self::new(NodeType::Fragment, Props::new(), Children::Array(children))
    }

    /// Set one prop. Useful for values computed at render time.
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Whether two vnodes can be patched in place rather than replaced.
    pub fn same_type(&self, other: &VNode) -> bool {
        self.node_type == other.node_type
    }

    /// Text content of a text node or of an element with text children.
    pub fn text_content(&self) -> Option<&str> {
        match &self.children {
            Children::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }
}

/// Build an element vnode.
///
/// ```rust
/// use kinetic_core::render::{h, ShapeFlags};
///
/// let node = h("ul", [("class", "list")], vec![h("li", [], "one"), h("li", [], "two")]);
/// assert!(node.shape_flags.contains(ShapeFlags::ELEMENT | ShapeFlags::ARRAY_CHILDREN));
/// ```
pub fn h<'a, P>(tag: &str, props: P, children: impl Into<Children>) -> VNode
where
    P: IntoIterator<Item = (&'a str, &'a str)>,
{
    let props = props
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    VNode::new(NodeType::Element(tag.to_string()), props, children.into())
}
