//! A single fiber: one node of the work tree.

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use super::{FiberRef, Flags, WorkTag};
use crate::context::ContextKey;
use crate::element::{Element, ElementType, Key, Node, NodeRef, PropValue, Props};
use crate::hooks::{Effect, Hook};
use crate::host::HostConfig;
use crate::lanes::Lanes;
use crate::update_queue::{UpdateQueue, UpdateRing};

/// Rendered state of a HostRoot.
#[derive(Clone, Default)]
pub(crate) struct RootState {
    pub element: Node,
    pub base_state: Node,
    pub base_queue: UpdateRing<Node>,
}

/// Per-tag memoized state.
#[derive(Clone, Default)]
pub(crate) enum MemoizedState {
    #[default]
    None,
    /// Hook list of a component, in call order.
    Hooks(Vec<Hook>),
    Root(RootState),
    Suspense { showing_fallback: bool },
}

impl MemoizedState {
    pub fn hooks(&self) -> &[Hook] {
        match self {
            MemoizedState::Hooks(hooks) => hooks,
            _ => &[],
        }
    }

    pub fn showing_fallback(&self) -> bool {
        matches!(self, MemoizedState::Suspense { showing_fallback: true })
    }
}

/// Per-tag update queue.
#[derive(Clone, Default)]
pub(crate) enum FiberUpdateQueue {
    #[default]
    None,
    /// Element updates of a HostRoot.
    Root(UpdateQueue<Node>),
    /// Effect records of a component from its last render.
    Effects(Rc<[Rc<Effect>]>),
}

impl FiberUpdateQueue {
    pub fn effects(&self) -> Option<&Rc<[Rc<Effect>]>> {
        match self {
            FiberUpdateQueue::Effects(effects) => Some(effects),
            _ => None,
        }
    }
}

/// Contexts read during the last render.
#[derive(Debug, Clone, Default)]
pub(crate) struct Dependencies {
    pub lanes: Lanes,
    pub contexts: SmallVec<[ContextKey; 2]>,
}

/// One generation of a fiber slot.
pub(crate) struct FiberNode<H: HostConfig> {
    pub tag: WorkTag,
    pub key: Option<Key>,
    pub element_type: Option<ElementType>,
    pub pending_props: Props,
    pub memoized_props: Props,
    pub memoized_state: MemoizedState,
    pub update_queue: FiberUpdateQueue,
    pub state_node: Option<H::Instance>,
    pub node_ref: Option<NodeRef>,

    pub flags: Flags,
    pub subtree_flags: Flags,
    pub deletions: SmallVec<[FiberRef; 2]>,

    pub lanes: Lanes,
    pub child_lanes: Lanes,
    pub dependencies: Dependencies,

    pub ret: Option<FiberRef>,
    pub child: Option<FiberRef>,
    pub sibling: Option<FiberRef>,
    pub index: usize,
}

impl<H: HostConfig> Clone for FiberNode<H> {
    fn clone(&self) -> Self {
        Self {
            tag: self.tag,
            key: self.key.clone(),
            element_type: self.element_type.clone(),
            pending_props: self.pending_props.clone(),
            memoized_props: self.memoized_props.clone(),
            memoized_state: self.memoized_state.clone(),
            update_queue: self.update_queue.clone(),
            state_node: self.state_node.clone(),
            node_ref: self.node_ref.clone(),
            flags: self.flags,
            subtree_flags: self.subtree_flags,
            deletions: self.deletions.clone(),
            lanes: self.lanes,
            child_lanes: self.child_lanes,
            dependencies: self.dependencies.clone(),
            ret: self.ret,
            child: self.child,
            sibling: self.sibling,
            index: self.index,
        }
    }
}

impl<H: HostConfig> FiberNode<H> {
    pub fn new(tag: WorkTag, pending_props: Props, key: Option<Key>) -> Self {
        Self {
            tag,
            key,
            element_type: None,
            pending_props,
            memoized_props: Props::new(),
            memoized_state: MemoizedState::None,
            update_queue: FiberUpdateQueue::None,
            state_node: None,
            node_ref: None,
            flags: Flags::empty(),
            subtree_flags: Flags::empty(),
            deletions: SmallVec::new(),
            lanes: Lanes::empty(),
            child_lanes: Lanes::empty(),
            dependencies: Dependencies::default(),
            ret: None,
            child: None,
            sibling: None,
            index: 0,
        }
    }

    pub fn from_element(element: &Element) -> Self {
        let element_type = element.element_type().clone();
        let mut node = Self::new(
            WorkTag::from_element_type(&element_type),
            element.props().clone(),
            element.key().cloned(),
        );
        node.element_type = Some(element_type);
        node.node_ref = element.node_ref().cloned();
        node
    }

    pub fn text(content: &str) -> Self {
        Self::new(WorkTag::HostText, Props::text(content), None)
    }

    pub fn host_root(container: H::Instance) -> Self {
        let mut node = Self::new(WorkTag::HostRoot, Props::new(), None);
        node.state_node = Some(container);
        node.update_queue = FiberUpdateQueue::Root(UpdateQueue::new());
        node.memoized_state = MemoizedState::Root(RootState::default());
        node
    }

    pub fn offscreen(props: Props) -> Self {
        Self::new(WorkTag::Offscreen, props, None)
    }

    pub fn fragment(children: Node) -> Self {
        let mut node = Self::new(WorkTag::Fragment, Props::new().with_children(children), None);
        node.element_type = Some(ElementType::Fragment);
        node
    }

    /// Host kind of a HostComponent.
    pub fn host_kind(&self) -> &str {
        match &self.element_type {
            Some(ElementType::Host(kind)) => kind,
            _ => "",
        }
    }

    /// Whether this fiber renders `element_type`.
    pub fn is_type(&self, element_type: &ElementType) -> bool {
        self.element_type.as_ref() == Some(element_type)
    }
}

impl<H: HostConfig> fmt::Debug for FiberNode<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiberNode")
            .field("tag", &self.tag)
            .field("key", &self.key)
            .field("flags", &self.flags)
            .field("subtree_flags", &self.subtree_flags)
            .field("lanes", &self.lanes)
            .field("child_lanes", &self.child_lanes)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Offscreen Props
// =============================================================================

/// Props of the Offscreen wrapper around a boundary's primary children.
pub(crate) fn offscreen_props(hidden: bool, children: Node) -> Props {
    Props::new()
        .with("mode", if hidden { "hidden" } else { "visible" })
        .with_children(children)
}

pub(crate) fn is_hidden(props: &Props) -> bool {
    matches!(props.get("mode"), Some(PropValue::Str(mode)) if &**mode == "hidden")
}
