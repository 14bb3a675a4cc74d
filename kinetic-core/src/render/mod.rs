//! Rendering
//!
//! The renderer turns [`VNode`] trees into host nodes and keeps them up to
//! date. It knows nothing about any concrete output: every host operation
//! goes through the [`HostOps`] trait. [`MemoryHost`] is an in-memory
//! implementation used by tests and tools.
//!
//! # Patching
//!
//! `patch(old, new)` compares the previously mounted tree with a new one:
//!
//! 1. No old tree: mount the new one.
//! 2. Equal trees: nothing to do.
//! 3. Different node type or tag: unmount the old node, mount the new one
//!    in its place.
//! 4. Same element: update changed props, remove dropped props, update text
//!    children. List children are replaced as a whole.
//!
//! # Reactivity
//!
//! [`Renderer::mount_reactive`] runs a component inside a plain effect, so
//! any reactive state the component reads re-renders the container when it
//! changes.

mod memory;
mod renderer;
mod vnode;

use std::fmt::Debug;
use std::hash::Hash;

use thiserror::Error;

use crate::error::Result;

pub use memory::{HostOp, MemoryHost, NodeId};
pub use renderer::{MountedNode, Renderer};
pub use vnode::{h, Children, NodeType, Props, ShapeFlags, VNode};

/// Errors reported by a host while rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// An operation referenced a node the host does not know.
    #[error("unknown host node {0}")]
    UnknownNode(String),

    /// A node was used as a parent but cannot hold children.
    #[error("host node {0} is not an element")]
    NotAnElement(String),
}

/// Platform operations the renderer needs.
pub trait HostOps {
    /// Handle to a host node.
    type Node: Clone + Eq + Hash + Debug;

    fn create_element(&mut self, tag: &str) -> Self::Node;

    fn create_text(&mut self, text: &str) -> Self::Node;

    /// Replace the content of `node` with `text`. On an element this removes
    /// every child.
    fn set_element_text(&mut self, node: &Self::Node, text: &str) -> Result<(), RenderError>;

    /// Insert `node` into `parent` before `anchor`, or at the end.
    fn insert(
        &mut self,
        node: &Self::Node,
        parent: &Self::Node,
        anchor: Option<&Self::Node>,
    ) -> Result<(), RenderError>;

    /// Detach `node` from its parent.
    fn remove(&mut self, node: &Self::Node) -> Result<(), RenderError>;

    /// Set (`next` is `Some`) or remove (`next` is `None`) a prop.
    fn patch_prop(
        &mut self,
        node: &Self::Node,
        key: &str,
        prev: Option<&str>,
        next: Option<&str>,
    ) -> Result<(), RenderError>;

    /// The node following `node` in its parent, if any.
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;
}
