//! In-memory host for tests and examples.
//!
//! Nodes live in a shared store keyed by integer id. Every host call is
//! appended to an operation log so tests can assert exactly what a commit
//! did, and [`NoopHost::markup`] renders the visible tree as a string.
//!
//! ```ignore
//! let host = NoopHost::new();
//! let root = create_root(host.clone(), host.container(), &Scheduler::new());
//! root.render(host_el("div", Props::new().with_children("hi")));
//! root.flush()?;
//! assert_eq!(host.markup(), "<div>hi</div>");
//! ```

use std::cell::RefCell;
use std::fmt::Write;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::element::{PropValue, Props};
use crate::error::{FiberError, Result};
use crate::host::HostConfig;

/// Id of a node in the store.
pub type NoopId = u32;

#[derive(Debug, Clone, PartialEq)]
pub enum NoopKind {
    Container,
    Element(Rc<str>),
    Text,
}

#[derive(Debug, Clone)]
pub struct NoopNode {
    pub id: NoopId,
    pub kind: NoopKind,
    pub props: Props,
    pub text: String,
    pub parent: Option<NoopId>,
    pub children: Vec<NoopId>,
    pub hidden: bool,
}

/// One host call, as recorded in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    Create(NoopId),
    CreateText(NoopId),
    AppendInitial { parent: NoopId, child: NoopId },
    Append { parent: NoopId, child: NoopId },
    Insert { parent: NoopId, child: NoopId, before: NoopId },
    Remove { parent: NoopId, child: NoopId },
    Update(NoopId),
    TextUpdate(NoopId),
    Hide(NoopId),
    Unhide(NoopId),
}

impl HostOp {
    /// Whether the op changed an attached tree (everything except creation
    /// and initial appends).
    pub fn is_mutation(&self) -> bool {
        !matches!(self, HostOp::Create(_) | HostOp::CreateText(_) | HostOp::AppendInitial { .. })
    }
}

#[derive(Default)]
struct NoopStore {
    nodes: FxHashMap<NoopId, NoopNode>,
    next_id: NoopId,
    ops: Vec<HostOp>,
}

impl NoopStore {
    fn insert(&mut self, kind: NoopKind, props: Props, text: String) -> NoopId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            id,
            NoopNode {
                id,
                kind,
                props,
                text,
                parent: None,
                children: Vec::new(),
                hidden: false,
            },
        );
        id
    }

    fn node_mut(&mut self, id: NoopId) -> Result<&mut NoopNode> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| FiberError::Host(format!("unknown node {id}")))
    }

    /// Unlink `child` from its current parent, if any.
    fn detach(&mut self, child: NoopId) -> Result<()> {
        let parent = self.node_mut(child)?.parent.take();
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|c| *c != child);
        }
        Ok(())
    }

    fn attach(&mut self, parent: NoopId, child: NoopId, before: Option<NoopId>) -> Result<()> {
        if parent == child {
            return Err(FiberError::Host(format!("node {child} cannot contain itself")));
        }
        self.node_mut(parent)?;
        self.detach(child)?;
        let parent_node = self.node_mut(parent)?;
        match before {
            Some(before) => {
                let position = parent_node
                    .children
                    .iter()
                    .position(|c| *c == before)
                    .ok_or_else(|| FiberError::Host(format!("node {before} is not a child of {parent}")))?;
                parent_node.children.insert(position, child);
            }
            None => parent_node.children.push(child),
        }
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }
}

/// Shared handle to an in-memory tree. Clones see the same store.
#[derive(Clone)]
pub struct NoopHost {
    store: Rc<RefCell<NoopStore>>,
    container: NoopId,
}

impl Default for NoopHost {
    fn default() -> Self {
        Self::new()
    }
}

impl NoopHost {
    pub fn new() -> Self {
        let mut store = NoopStore::default();
        let container = store.insert(NoopKind::Container, Props::new(), String::new());
        Self {
            store: Rc::new(RefCell::new(store)),
            container,
        }
    }

    /// The root container node.
    pub fn container(&self) -> NoopId {
        self.container
    }

    /// Operations recorded since the last [`clear_ops`](Self::clear_ops).
    pub fn ops(&self) -> Vec<HostOp> {
        self.store.borrow().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.store.borrow_mut().ops.clear();
    }

    /// Recorded ops that changed the attached tree.
    pub fn mutations(&self) -> Vec<HostOp> {
        self.store
            .borrow()
            .ops
            .iter()
            .filter(|op| op.is_mutation())
            .cloned()
            .collect()
    }

    pub fn node(&self, id: NoopId) -> Option<NoopNode> {
        self.store.borrow().nodes.get(&id).cloned()
    }

    pub fn children_of(&self, id: NoopId) -> Vec<NoopId> {
        self.store
            .borrow()
            .nodes
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Live nodes, excluding the container.
    pub fn node_count(&self) -> usize {
        self.store.borrow().nodes.len() - 1
    }

    /// Visible tree under the container, e.g. `<div id="a">hi</div>`.
    /// Hidden nodes are left out.
    pub fn markup(&self) -> String {
        let store = self.store.borrow();
        let mut out = String::new();
        if let Some(container) = store.nodes.get(&self.container) {
            for child in &container.children {
                write_markup(&store, *child, &mut out);
            }
        }
        out
    }
}

fn write_markup(store: &NoopStore, id: NoopId, out: &mut String) {
    let Some(node) = store.nodes.get(&id) else {
        return;
    };
    if node.hidden {
        return;
    }
    match &node.kind {
        NoopKind::Text => out.push_str(&node.text),
        NoopKind::Element(kind) => {
            let _ = write!(out, "<{kind}");
            for (name, value) in node.props.iter() {
                match value {
                    PropValue::Str(v) => {
                        let _ = write!(out, " {name}=\"{v}\"");
                    }
                    PropValue::Int(v) => {
                        let _ = write!(out, " {name}=\"{v}\"");
                    }
                    PropValue::Float(v) => {
                        let _ = write!(out, " {name}=\"{v}\"");
                    }
                    PropValue::Bool(v) => {
                        let _ = write!(out, " {name}=\"{v}\"");
                    }
                    _ => {}
                }
            }
            out.push('>');
            for child in &node.children {
                write_markup(store, *child, out);
            }
            let _ = write!(out, "</{kind}>");
        }
        NoopKind::Container => {
            for child in &node.children {
                write_markup(store, *child, out);
            }
        }
    }
}

impl HostConfig for NoopHost {
    type Instance = NoopId;

    fn create_instance(&mut self, kind: &str, props: &Props) -> Result<NoopId> {
        let mut store = self.store.borrow_mut();
        let id = store.insert(NoopKind::Element(kind.into()), props.clone(), String::new());
        store.ops.push(HostOp::Create(id));
        Ok(id)
    }

    fn create_text_instance(&mut self, text: &str) -> Result<NoopId> {
        let mut store = self.store.borrow_mut();
        let id = store.insert(NoopKind::Text, Props::new(), text.to_owned());
        store.ops.push(HostOp::CreateText(id));
        Ok(id)
    }

    fn append_initial_child(&mut self, parent: &NoopId, child: &NoopId) -> Result<()> {
        let mut store = self.store.borrow_mut();
        store.attach(*parent, *child, None)?;
        store.ops.push(HostOp::AppendInitial {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }

    fn append_child(&mut self, parent: &NoopId, child: &NoopId) -> Result<()> {
        let mut store = self.store.borrow_mut();
        store.attach(*parent, *child, None)?;
        store.ops.push(HostOp::Append {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }

    fn insert_before(&mut self, parent: &NoopId, child: &NoopId, before: &NoopId) -> Result<()> {
        let mut store = self.store.borrow_mut();
        store.attach(*parent, *child, Some(*before))?;
        store.ops.push(HostOp::Insert {
            parent: *parent,
            child: *child,
            before: *before,
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: &NoopId, child: &NoopId) -> Result<()> {
        let mut store = self.store.borrow_mut();
        let attached = store.nodes.get(child).and_then(|n| n.parent);
        if attached != Some(*parent) {
            return Err(FiberError::Host(format!("node {child} is not a child of {parent}")));
        }
        store.detach(*child)?;
        // drop the whole detached subtree
        let mut stack = vec![*child];
        while let Some(id) = stack.pop() {
            if let Some(node) = store.nodes.remove(&id) {
                stack.extend(node.children);
            }
        }
        store.ops.push(HostOp::Remove {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }

    fn commit_update(&mut self, instance: &NoopId, _kind: &str, _old: &Props, new: &Props) -> Result<()> {
        let mut store = self.store.borrow_mut();
        store.node_mut(*instance)?.props = new.clone();
        store.ops.push(HostOp::Update(*instance));
        Ok(())
    }

    fn commit_text_update(&mut self, instance: &NoopId, _old: &str, new: &str) -> Result<()> {
        let mut store = self.store.borrow_mut();
        store.node_mut(*instance)?.text = new.to_owned();
        store.ops.push(HostOp::TextUpdate(*instance));
        Ok(())
    }

    fn hide_instance(&mut self, instance: &NoopId) -> Result<()> {
        let mut store = self.store.borrow_mut();
        store.node_mut(*instance)?.hidden = true;
        store.ops.push(HostOp::Hide(*instance));
        Ok(())
    }

    fn unhide_instance(&mut self, instance: &NoopId, _props: &Props) -> Result<()> {
        let mut store = self.store.borrow_mut();
        store.node_mut(*instance)?.hidden = false;
        store.ops.push(HostOp::Unhide(*instance));
        Ok(())
    }

    fn hide_text_instance(&mut self, instance: &NoopId) -> Result<()> {
        self.hide_instance(instance)
    }

    fn unhide_text_instance(&mut self, instance: &NoopId, _text: &str) -> Result<()> {
        let mut store = self.store.borrow_mut();
        store.node_mut(*instance)?.hidden = false;
        store.ops.push(HostOp::Unhide(*instance));
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_moves_existing_child() {
        let mut host = NoopHost::new();
        let root = host.container();
        let a = host.create_text_instance("a").expect("a");
        let b = host.create_text_instance("b").expect("b");
        host.append_child(&root, &a).expect("append a");
        host.append_child(&root, &b).expect("append b");
        host.append_child(&root, &a).expect("move a");
        assert_eq!(host.children_of(root), vec![b, a]);
        assert_eq!(host.markup(), "ba");
    }

    #[test]
    fn test_insert_before_requires_sibling() {
        let mut host = NoopHost::new();
        let root = host.container();
        let a = host.create_text_instance("a").expect("a");
        let b = host.create_text_instance("b").expect("b");
        let err = host.insert_before(&root, &a, &b).unwrap_err();
        assert!(matches!(err, FiberError::Host(_)));
    }

    #[test]
    fn test_remove_drops_subtree_and_hidden_is_skipped() {
        let mut host = NoopHost::new();
        let root = host.container();
        let div = host
            .create_instance("div", &Props::new().with("id", "x"))
            .expect("div");
        let text = host.create_text_instance("hi").expect("text");
        host.append_initial_child(&div, &text).expect("initial");
        host.append_child(&root, &div).expect("append");
        assert_eq!(host.markup(), "<div id=\"x\">hi</div>");

        host.hide_text_instance(&text).expect("hide");
        assert_eq!(host.markup(), "<div id=\"x\"></div>");

        host.remove_child(&root, &div).expect("remove");
        assert_eq!(host.node_count(), 0);
        assert!(host.remove_child(&root, &div).is_err());
    }
}
