//! Tree patching on top of [`HostOps`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use super::vnode::{Children, NodeType, Props, VNode};
use super::{HostOps, RenderError};
use crate::error::Result;
use crate::reactive::{EffectOptions, ReactiveEffect, Runtime};

/// A vnode together with the host node it was mounted as.
///
/// For fragments, `el` is an empty text node marking the end of the
/// fragment; the children are mounted right before it.
#[derive(Clone)]
pub struct MountedNode<N> {
    vnode: VNode,
    el: N,
    children: Vec<MountedNode<N>>,
}

impl<N> MountedNode<N> {
    pub fn vnode(&self) -> &VNode {
        &self.vnode
    }

    pub fn el(&self) -> &N {
        &self.el
    }

    pub fn children(&self) -> &[MountedNode<N>] {
        &self.children
    }
}

impl<N: fmt::Debug> fmt::Debug for MountedNode<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedNode")
            .field("type", &self.vnode.node_type)
            .field("el", &self.el)
            .field("children", &self.children)
            .finish()
    }
}

type Mounted<H> = MountedNode<<H as HostOps>::Node>;

fn child_nodes(vnode: &VNode) -> &[VNode] {
    match &vnode.children {
        Children::Array(nodes) => nodes,
        _ => &[],
    }
}

/// Mounts and patches vnode trees through a host.
pub struct Renderer<H: HostOps> {
    host: H,
    /// Last tree rendered into each container.
    mounted: HashMap<H::Node, Mounted<H>>,
}

impl<H: HostOps> Renderer<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            mounted: HashMap::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The tree currently rendered into `container`.
    pub fn mounted(&self, container: &H::Node) -> Option<&Mounted<H>> {
        self.mounted.get(container)
    }

    /// Render `vnode` into `container`, patching against whatever was
    /// rendered there before. `None` unmounts the current tree.
    ///
    /// The record of the previous tree is only replaced once the host calls
    /// succeed, so a failed render leaves it in place.
    pub fn render(&mut self, vnode: Option<VNode>, container: &H::Node) -> Result<(), RenderError> {
        let old = self.mounted.get(container).cloned();
        match vnode {
            None => {
                if let Some(old) = old {
                    debug!(?container, "unmounting tree");
                    self.unmount(old)?;
                    self.mounted.remove(container);
                }
            }
            Some(vnode) => {
                let mounted = self.patch(old, &vnode, container)?;
                self.mounted.insert(container.clone(), mounted);
            }
        }
        Ok(())
    }

    /// Bring the host in line with `new`, starting from `old`.
    pub fn patch(
        &mut self,
        old: Option<Mounted<H>>,
        new: &VNode,
        container: &H::Node,
    ) -> Result<Mounted<H>, RenderError> {
        let Some(old) = old else {
            return self.mount(new, container, None);
        };
        if old.vnode == *new {
            trace!(node_type = %new.node_type, "vnode unchanged");
            return Ok(old);
        }
        if !old.vnode.same_type(new) {
            trace!(from = %old.vnode.node_type, to = %new.node_type, "replacing node");
            let anchor = self.host.next_sibling(&old.el);
            self.unmount(old)?;
            return self.mount(new, container, anchor.as_ref());
        }

        match new.node_type {
            NodeType::Text => self.patch_text(old, new),
            NodeType::Element(_) => self.patch_element(old, new),
            NodeType::Fragment => self.patch_fragment(old, new, container),
        }
    }

    fn mount(
        &mut self,
        vnode: &VNode,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<Mounted<H>, RenderError> {
        match &vnode.node_type {
            NodeType::Text => {
                let el = self.host.create_text(vnode.text_content().unwrap_or_default());
                self.host.insert(&el, container, anchor)?;
                Ok(MountedNode {
                    vnode: vnode.clone(),
                    el,
                    children: Vec::new(),
                })
            }
            NodeType::Element(tag) => {
                let el = self.host.create_element(tag);
                let children = match &vnode.children {
                    Children::Text(text) => {
                        self.host.set_element_text(&el, text)?;
                        Vec::new()
                    }
                    Children::Array(nodes) => self.mount_children(nodes, &el, None)?,
                    Children::None => Vec::new(),
                };
                for (key, value) in &vnode.props {
                    self.host.patch_prop(&el, key, None, Some(value.as_str()))?;
                }
                self.host.insert(&el, container, anchor)?;
                Ok(MountedNode {
                    vnode: vnode.clone(),
                    el,
                    children,
                })
            }
            NodeType::Fragment => {
                let end = self.host.create_text("");
                self.host.insert(&end, container, anchor)?;
                let children = self.mount_children(child_nodes(vnode), container, Some(&end))?;
                Ok(MountedNode {
                    vnode: vnode.clone(),
                    el: end,
                    children,
                })
            }
        }
    }

    fn mount_children(
        &mut self,
        nodes: &[VNode],
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<Vec<Mounted<H>>, RenderError> {
        nodes
            .iter()
            .map(|node| self.mount(node, container, anchor))
            .collect()
    }

    fn unmount(&mut self, node: Mounted<H>) -> Result<(), RenderError> {
        // An element takes its subtree with it; fragment children sit next
        // to the end marker and must go one by one.
        if node.vnode.node_type == NodeType::Fragment {
            for child in node.children {
                self.unmount(child)?;
            }
        }
        self.host.remove(&node.el)
    }

    fn patch_text(&mut self, mut old: Mounted<H>, new: &VNode) -> Result<Mounted<H>, RenderError> {
        if old.vnode.text_content() != new.text_content() {
            self.host
                .set_element_text(&old.el, new.text_content().unwrap_or_default())?;
        }
        old.vnode = new.clone();
        Ok(old)
    }

    fn patch_element(&mut self, old: Mounted<H>, new: &VNode) -> Result<Mounted<H>, RenderError> {
        let MountedNode {
            vnode: old_vnode,
            el,
            children,
        } = old;

        self.patch_props(&el, &old_vnode.props, &new.props)?;
        let children = self.patch_children(&el, &old_vnode, children, new)?;

        Ok(MountedNode {
            vnode: new.clone(),
            el,
            children,
        })
    }

    fn patch_props(&mut self, el: &H::Node, old: &Props, new: &Props) -> Result<(), RenderError> {
        for (key, next) in new {
            let prev = old.get(key);
            if prev != Some(next) {
                self.host
                    .patch_prop(el, key, prev.map(String::as_str), Some(next.as_str()))?;
            }
        }
        for (key, prev) in old {
            if !new.contains_key(key) {
                self.host.patch_prop(el, key, Some(prev.as_str()), None)?;
            }
        }
        Ok(())
    }

    fn patch_children(
        &mut self,
        el: &H::Node,
        old_vnode: &VNode,
        old_children: Vec<Mounted<H>>,
        new: &VNode,
    ) -> Result<Vec<Mounted<H>>, RenderError> {
        match &new.children {
            Children::Text(text) => {
                if old_vnode.text_content() != Some(text.as_str()) {
                    // Setting the text drops any mounted children too.
                    self.host.set_element_text(el, text)?;
                }
                Ok(Vec::new())
            }
            Children::Array(nodes) => {
                self.clear_children(el, old_vnode, old_children)?;
                self.mount_children(nodes, el, None)
            }
            Children::None => {
                self.clear_children(el, old_vnode, old_children)?;
                Ok(Vec::new())
            }
        }
    }

    fn clear_children(
        &mut self,
        el: &H::Node,
        old_vnode: &VNode,
        old_children: Vec<Mounted<H>>,
    ) -> Result<(), RenderError> {
        match old_vnode.children {
            Children::Text(_) => self.host.set_element_text(el, ""),
            Children::Array(_) | Children::None => {
                for child in old_children {
                    self.unmount(child)?;
                }
                Ok(())
            }
        }
    }

    fn patch_fragment(
        &mut self,
        old: Mounted<H>,
        new: &VNode,
        container: &H::Node,
    ) -> Result<Mounted<H>, RenderError> {
        let MountedNode {
            el: end, children, ..
        } = old;
        for child in children {
            self.unmount(child)?;
        }
        let children = self.mount_children(child_nodes(new), container, Some(&end))?;
        Ok(MountedNode {
            vnode: new.clone(),
            el: end,
            children,
        })
    }
}

impl<H> Renderer<H>
where
    H: HostOps + 'static,
    H::Node: 'static,
{
    /// Render `component` into `container` now and again whenever reactive
    /// state it read changes.
    ///
    /// The returned effect is the render effect: dropping or stopping it
    /// stops updates, leaving the last tree in place.
    #[must_use = "the container stops updating once the effect is dropped"]
    pub fn mount_reactive<F>(
        renderer: &Rc<RefCell<Self>>,
        runtime: &Runtime,
        container: H::Node,
        component: F,
    ) -> ReactiveEffect<()>
    where
        F: Fn() -> VNode + 'static,
    {
        let renderer = Rc::clone(renderer);
        let inner_runtime = runtime.clone();
        runtime.effect(
            move || {
                let vnode = component();
                // Host calls never read reactive state.
                let result = inner_runtime
                    .untracked(|| renderer.borrow_mut().render(Some(vnode), &container));
                if let Err(err) = result {
                    warn!(%err, ?container, "render failed");
                }
            },
            EffectOptions::default(),
        )
    }
}

impl<H: HostOps + fmt::Debug> fmt::Debug for Renderer<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("host", &self.host)
            .field("containers", &self.mounted.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
