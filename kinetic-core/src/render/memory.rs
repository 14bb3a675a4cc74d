//! In-memory host.
//!
//! [`MemoryHost`] keeps its nodes in an arena and records every host
//! operation, so tests can assert on both the resulting tree and the exact
//! operations a patch performed.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::json;

use super::{HostOps, RenderError};
use crate::error::Result;

/// Handle to a node in a [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// Get the raw index.
    pub fn raw(&self) -> usize {
        self.0
    }
}

impl From<usize> for NodeId {
    fn from(id: usize) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// One recorded host operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostOp {
    CreateElement {
        node: NodeId,
        tag: String,
    },
    CreateText {
        node: NodeId,
        text: String,
    },
    SetText {
        node: NodeId,
        text: String,
    },
    Insert {
        node: NodeId,
        parent: NodeId,
        anchor: Option<NodeId>,
    },
    Remove {
        node: NodeId,
    },
    PatchProp {
        node: NodeId,
        key: String,
        prev: Option<String>,
        next: Option<String>,
    },
}

#[derive(Debug)]
enum NodeData {
    Element {
        tag: String,
        props: BTreeMap<String, String>,
        children: Vec<NodeId>,
    },
    Text(String),
}

#[derive(Debug)]
struct MemoryNode {
    data: NodeData,
    parent: Option<NodeId>,
}

/// An arena-backed host that records what the renderer asked of it.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<MemoryNode>,
    ops: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached `root` element to render into. Not recorded.
    pub fn create_root(&mut self) -> NodeId {
        self.push(NodeData::Element {
            tag: "root".to_string(),
            props: BTreeMap::new(),
            children: Vec::new(),
        })
    }

    /// Operations recorded so far.
    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    /// Take the recorded operations, leaving the log empty.
    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Number of nodes ever created, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    /// Children of an element. Empty for text nodes and unknown IDs.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.nodes.get(id.0).map(|node| &node.data) {
            Some(NodeData::Element { children, .. }) => children,
            _ => &[],
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.nodes.get(id.0).map(|node| &node.data) {
            Some(NodeData::Element { tag, .. }) => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn prop(&self, id: NodeId, key: &str) -> Option<&str> {
        match self.nodes.get(id.0).map(|node| &node.data) {
            Some(NodeData::Element { props, .. }) => props.get(key).map(String::as_str),
            _ => None,
        }
    }

    /// Concatenated text of the subtree rooted at `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.nodes.get(id.0).map(|node| &node.data) {
            Some(NodeData::Text(text)) => out.push_str(text),
            Some(NodeData::Element { children, .. }) => {
                for child in children {
                    self.collect_text(*child, out);
                }
            }
            None => {}
        }
    }

    /// Dump the subtree rooted at `id` as JSON.
    ///
    /// Empty text nodes (fragment markers, cleared text) are left out.
    pub fn to_json(&self, id: NodeId) -> serde_json::Value {
        match self.nodes.get(id.0).map(|node| &node.data) {
            Some(NodeData::Text(text)) => json!({ "text": text }),
            Some(NodeData::Element {
                tag,
                props,
                children,
            }) => {
                let children: Vec<serde_json::Value> = children
                    .iter()
                    .filter(|child| !self.is_empty_text(**child))
                    .map(|child| self.to_json(*child))
                    .collect();
                json!({ "tag": tag, "props": props, "children": children })
            }
            None => serde_json::Value::Null,
        }
    }

    /// The JSON dump of `id`, pretty-printed.
    pub fn to_json_string(&self, id: NodeId) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_json(id))
    }

    fn is_empty_text(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id.0).map(|node| &node.data),
            Some(NodeData::Text(text)) if text.is_empty()
        )
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(MemoryNode { data, parent: None });
        id
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut MemoryNode, RenderError> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| RenderError::UnknownNode(id.to_string()))
    }

    fn element_children_mut(&mut self, id: NodeId) -> Result<&mut Vec<NodeId>, RenderError> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element { children, .. } => Ok(children),
            NodeData::Text(_) => Err(RenderError::NotAnElement(id.to_string())),
        }
    }

    /// Unlink `id` from its parent, if it has one.
    fn detach(&mut self, id: NodeId) -> Result<(), RenderError> {
        if let Some(parent) = self.node_mut(id)?.parent.take() {
            self.element_children_mut(parent)?.retain(|child| *child != id);
        }
        Ok(())
    }
}

impl HostOps for MemoryHost {
    type Node = NodeId;

    fn create_element(&mut self, tag: &str) -> NodeId {
        let node = self.push(NodeData::Element {
            tag: tag.to_string(),
            props: BTreeMap::new(),
            children: Vec::new(),
        });
        self.ops.push(HostOp::CreateElement {
            node,
            tag: tag.to_string(),
        });
        node
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        let node = self.push(NodeData::Text(text.to_string()));
        self.ops.push(HostOp::CreateText {
            node,
            text: text.to_string(),
        });
        node
    }

    fn set_element_text(&mut self, node: &NodeId, text: &str) -> Result<(), RenderError> {
        let id = *node;
        let old_children = match &mut self.node_mut(id)?.data {
            NodeData::Text(content) => {
                *content = text.to_string();
                Vec::new()
            }
            NodeData::Element { children, .. } => std::mem::take(children),
        };
        for child in old_children {
            self.node_mut(child)?.parent = None;
        }
        if !text.is_empty() && self.tag(id).is_some() {
            let child = self.push(NodeData::Text(text.to_string()));
            self.node_mut(child)?.parent = Some(id);
            self.element_children_mut(id)?.push(child);
        }

        self.ops.push(HostOp::SetText {
            node: id,
            text: text.to_string(),
        });
        Ok(())
    }

    fn insert(
        &mut self,
        node: &NodeId,
        parent: &NodeId,
        anchor: Option<&NodeId>,
    ) -> Result<(), RenderError> {
        let (id, parent_id) = (*node, *parent);
        self.node_mut(id)?;
        self.element_children_mut(parent_id)?;

        self.detach(id)?;
        let children = self.element_children_mut(parent_id)?;
        let index = match anchor {
            Some(anchor) => children
                .iter()
                .position(|child| child == anchor)
                .ok_or_else(|| RenderError::UnknownNode(anchor.to_string()))?,
            None => children.len(),
        };
        children.insert(index, id);
        self.node_mut(id)?.parent = Some(parent_id);

        self.ops.push(HostOp::Insert {
            node: id,
            parent: parent_id,
            anchor: anchor.copied(),
        });
        Ok(())
    }

    fn remove(&mut self, node: &NodeId) -> Result<(), RenderError> {
        self.detach(*node)?;
        self.ops.push(HostOp::Remove { node: *node });
        Ok(())
    }

    fn patch_prop(
        &mut self,
        node: &NodeId,
        key: &str,
        prev: Option<&str>,
        next: Option<&str>,
    ) -> Result<(), RenderError> {
        match &mut self.node_mut(*node)?.data {
            NodeData::Element { props, .. } => match next {
                Some(value) => {
                    props.insert(key.to_string(), value.to_string());
                }
                None => {
                    props.remove(key);
                }
            },
            NodeData::Text(_) => return Err(RenderError::NotAnElement(node.to_string())),
        }

        self.ops.push(HostOp::PatchProp {
            node: *node,
            key: key.to_string(),
            prev: prev.map(str::to_string),
            next: next.map(str::to_string),
        });
        Ok(())
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.parent(*node)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|child| child == node)?;
        siblings.get(index + 1).copied()
    }
}
