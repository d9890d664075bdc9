//! Node descriptions - the declarative tree handed to [`Root::render`](crate::Root::render).
//!
//! A [`Node`] is immutable and cheap to clone. Identity matters: the
//! reconciler compares props and children by pointer first, so reusing the
//! same `Node` or [`Props`] value lets a whole subtree bail out.
//!
//! ```ignore
//! let app = host("div", Props::new().with("id", "main").with_children(vec![
//!     text("Hello"),
//!     counter.element(Props::new().with("start", 1)).with_key("c").into(),
//! ]));
//! root.render(app);
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::context::ContextKey;
use crate::error::RenderResult;
use crate::hooks::Hooks;

/// Key identifying a child among its siblings.
pub type Key = Rc<str>;

/// Callback stored in props.
pub type Callback = Rc<dyn Fn()>;

// =============================================================================
// Prop Values
// =============================================================================

/// A single prop value.
#[derive(Clone)]
pub enum PropValue {
    Str(Rc<str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Callback(Callback),
    Node(Node),
    Any(Rc<dyn Any>),
}

impl PropValue {
    /// Value equality for plain data, identity for callbacks, nodes and opaque values.
    pub fn shallow_eq(&self, other: &PropValue) -> bool {
        match (self, other) {
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::Int(a), PropValue::Int(b)) => a == b,
            (PropValue::Float(a), PropValue::Float(b)) => a.to_bits() == b.to_bits(),
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Callback(a), PropValue::Callback(b)) => Rc::ptr_eq(a, b),
            (PropValue::Node(a), PropValue::Node(b)) => a.same(b),
            (PropValue::Any(a), PropValue::Any(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Str(s) => write!(f, "{s:?}"),
            PropValue::Int(i) => write!(f, "{i}"),
            PropValue::Float(x) => write!(f, "{x}"),
            PropValue::Bool(b) => write!(f, "{b}"),
            PropValue::Callback(_) => f.write_str("<callback>"),
            PropValue::Node(n) => write!(f, "{n:?}"),
            PropValue::Any(_) => f.write_str("<any>"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.into())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value.into())
    }
}

impl From<Rc<str>> for PropValue {
    fn from(value: Rc<str>) -> Self {
        PropValue::Str(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value.into())
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<Callback> for PropValue {
    fn from(value: Callback) -> Self {
        PropValue::Callback(value)
    }
}

impl From<Node> for PropValue {
    fn from(value: Node) -> Self {
        PropValue::Node(value)
    }
}

// =============================================================================
// Props
// =============================================================================

#[derive(Clone, Default)]
struct PropsInner {
    values: BTreeMap<Rc<str>, PropValue>,
    children: Node,
}

/// Immutable prop bag. Cloning shares the same allocation.
#[derive(Clone, Default)]
pub struct Props(Rc<PropsInner>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Props of a text node.
    pub fn text(content: impl Into<Rc<str>>) -> Self {
        Self::new().with("content", PropValue::Str(content.into()))
    }

    /// Set a prop.
    pub fn with(mut self, key: impl Into<Rc<str>>, value: impl Into<PropValue>) -> Self {
        Rc::make_mut(&mut self.0).values.insert(key.into(), value.into());
        self
    }

    /// Set the children.
    pub fn with_children(mut self, children: impl Into<Node>) -> Self {
        Rc::make_mut(&mut self.0).children = children.into();
        self
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.0.values.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(PropValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(PropValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(PropValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn callback(&self, key: &str) -> Option<Callback> {
        match self.get(key) {
            Some(PropValue::Callback(cb)) => Some(cb.clone()),
            _ => None,
        }
    }

    pub fn node(&self, key: &str) -> Option<&Node> {
        match self.get(key) {
            Some(PropValue::Node(n)) => Some(n),
            _ => None,
        }
    }

    /// Text of a text node (`content` prop).
    pub fn content(&self) -> &str {
        self.str("content").unwrap_or("")
    }

    pub fn children(&self) -> &Node {
        &self.0.children
    }

    /// Iterate over non-children props in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.0.values.iter().map(|(k, v)| (k.as_ref(), v))
    }

    /// Same allocation.
    pub fn ptr_eq(&self, other: &Props) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Same keys with shallow-equal values and identical children.
    pub fn shallow_eq(&self, other: &Props) -> bool {
        self.ptr_eq(other) || (self.0.children.same(&other.0.children) && self.attrs_eq(other))
    }

    /// Same keys with shallow-equal values. Children are not compared.
    pub fn attrs_eq(&self, other: &Props) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let (a, b) = (&self.0.values, &other.0.values);
        a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.shallow_eq(w)))
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.iter() {
            map.entry(&k, v);
        }
        if !matches!(self.children(), Node::Empty) {
            map.entry(&"children", self.children());
        }
        map.finish()
    }
}

// =============================================================================
// Components
// =============================================================================

type RenderFn = dyn Fn(&mut Hooks<'_>, &Props) -> RenderResult;

/// A function component. Identity is the allocation, not the name.
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    render: Rc<RenderFn>,
}

impl Component {
    pub fn new(
        name: impl Into<Rc<str>>,
        render: impl Fn(&mut Hooks<'_>, &Props) -> RenderResult + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            render: Rc::new(render),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Describe this component with `props`.
    pub fn element(&self, props: Props) -> Element {
        Element::new(ElementType::Function(self.clone()), props)
    }

    pub(crate) fn call(&self, hooks: &mut Hooks<'_>, props: &Props) -> RenderResult {
        (self.render)(hooks, props)
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.render, &other.render)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

type CompareFn = dyn Fn(&Props, &Props) -> bool;

struct MemoInner {
    component: Component,
    compare: Option<Rc<CompareFn>>,
}

/// A component that skips re-rendering while its props compare equal.
#[derive(Clone)]
pub struct MemoComponent(Rc<MemoInner>);

impl MemoComponent {
    pub fn component(&self) -> &Component {
        &self.0.component
    }

    /// Whether `prev` and `next` count as equal (shallow by default).
    pub fn props_equal(&self, prev: &Props, next: &Props) -> bool {
        match &self.0.compare {
            Some(compare) => compare(prev, next),
            None => prev.shallow_eq(next),
        }
    }

    pub fn element(&self, props: Props) -> Element {
        Element::new(ElementType::Memo(self.clone()), props)
    }

    pub fn ptr_eq(&self, other: &MemoComponent) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MemoComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Memo({})", self.0.component.name)
    }
}

/// Wrap `component` so it bails out when props are shallow-equal.
pub fn memo(component: Component) -> MemoComponent {
    MemoComponent(Rc::new(MemoInner {
        component,
        compare: None,
    }))
}

/// Wrap `component` with a custom props comparison.
pub fn memo_with(
    component: Component,
    compare: impl Fn(&Props, &Props) -> bool + 'static,
) -> MemoComponent {
    MemoComponent(Rc::new(MemoInner {
        component,
        compare: Some(Rc::new(compare)),
    }))
}

// =============================================================================
// Element Types
// =============================================================================

/// What an element describes.
#[derive(Clone, Debug)]
pub enum ElementType {
    /// Host node such as `"div"`.
    Host(Rc<str>),
    Function(Component),
    Fragment,
    Provider(ContextKey),
    /// Boundary with a `fallback` prop.
    Suspense,
    Memo(MemoComponent),
}

impl PartialEq for ElementType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ElementType::Host(a), ElementType::Host(b)) => a == b,
            (ElementType::Function(a), ElementType::Function(b)) => a.ptr_eq(b),
            (ElementType::Fragment, ElementType::Fragment) => true,
            (ElementType::Provider(a), ElementType::Provider(b)) => a.id() == b.id(),
            (ElementType::Suspense, ElementType::Suspense) => true,
            (ElementType::Memo(a), ElementType::Memo(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

// =============================================================================
// Refs
// =============================================================================

/// Handle that receives the host instance of a host element.
#[derive(Clone)]
pub enum NodeRef {
    Object(Rc<RefCell<Option<Rc<dyn Any>>>>),
    Callback(Rc<dyn Fn(Option<&dyn Any>)>),
}

impl NodeRef {
    /// Object ref, filled in during the layout pass.
    pub fn new() -> Self {
        NodeRef::Object(Rc::new(RefCell::new(None)))
    }

    /// Callback ref, called with the instance on attach and `None` on detach.
    pub fn callback(f: impl Fn(Option<&dyn Any>) + 'static) -> Self {
        NodeRef::Callback(Rc::new(f))
    }

    /// Current instance of an object ref.
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        match self {
            NodeRef::Object(cell) => cell.borrow().as_ref()?.downcast_ref::<T>().cloned(),
            NodeRef::Callback(_) => None,
        }
    }

    pub(crate) fn attach(&self, instance: Rc<dyn Any>) {
        match self {
            NodeRef::Object(cell) => *cell.borrow_mut() = Some(instance),
            NodeRef::Callback(f) => f(Some(instance.as_ref())),
        }
    }

    pub(crate) fn detach(&self) {
        match self {
            NodeRef::Object(cell) => *cell.borrow_mut() = None,
            NodeRef::Callback(f) => f(None),
        }
    }

    pub fn ptr_eq(&self, other: &NodeRef) -> bool {
        match (self, other) {
            (NodeRef::Object(a), NodeRef::Object(b)) => Rc::ptr_eq(a, b),
            (NodeRef::Callback(a), NodeRef::Callback(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Default for NodeRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Object(_) => f.write_str("NodeRef::Object"),
            NodeRef::Callback(_) => f.write_str("NodeRef::Callback"),
        }
    }
}

pub(crate) fn same_ref(a: Option<&NodeRef>, b: Option<&NodeRef>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.ptr_eq(b),
        _ => false,
    }
}

// =============================================================================
// Elements
// =============================================================================

#[derive(Clone)]
struct ElementInner {
    element_type: ElementType,
    key: Option<Key>,
    props: Props,
    node_ref: Option<NodeRef>,
}

/// One typed node description.
#[derive(Clone)]
pub struct Element(Rc<ElementInner>);

impl Element {
    pub fn new(element_type: ElementType, props: Props) -> Self {
        Self(Rc::new(ElementInner {
            element_type,
            key: None,
            props,
            node_ref: None,
        }))
    }

    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        Rc::make_mut(&mut self.0).key = Some(key.into());
        self
    }

    pub fn with_ref(mut self, node_ref: &NodeRef) -> Self {
        Rc::make_mut(&mut self.0).node_ref = Some(node_ref.clone());
        self
    }

    pub fn element_type(&self) -> &ElementType {
        &self.0.element_type
    }

    pub fn key(&self) -> Option<&Key> {
        self.0.key.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.0.props
    }

    pub fn node_ref(&self) -> Option<&NodeRef> {
        self.0.node_ref.as_ref()
    }

    pub fn ptr_eq(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Element");
        s.field("type", &self.0.element_type);
        if let Some(key) = &self.0.key {
            s.field("key", key);
        }
        s.field("props", &self.0.props).finish()
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// A node of the declarative tree.
#[derive(Clone, Default)]
pub enum Node {
    #[default]
    Empty,
    Text(Rc<str>),
    Element(Element),
    /// Children given as a list. Nested lists flatten into their parent.
    List(Rc<[Node]>),
}

impl Node {
    /// Identity comparison: same allocation, or equal text.
    pub fn same(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Empty, Node::Empty) => true,
            (Node::Text(a), Node::Text(b)) => a == b,
            (Node::Element(a), Node::Element(b)) => a.ptr_eq(b),
            (Node::List(a), Node::List(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Node::Empty)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Empty => f.write_str("Empty"),
            Node::Text(t) => write!(f, "{t:?}"),
            Node::Element(e) => write!(f, "{e:?}"),
            Node::List(items) => f.debug_list().entries(items.iter()).finish(),
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Text(value.into())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Text(value.into())
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::Text(value.to_string().into())
    }
}

impl From<i32> for Node {
    fn from(value: i32) -> Self {
        Node::Text(value.to_string().into())
    }
}

impl<T: Into<Node>> From<Vec<T>> for Node {
    fn from(items: Vec<T>) -> Self {
        Node::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(value: Option<T>) -> Self {
        value.map_or(Node::Empty, Into::into)
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Host element of `kind`.
pub fn host(kind: impl Into<Rc<str>>, props: Props) -> Element {
    Element::new(ElementType::Host(kind.into()), props)
}

/// Text node.
pub fn text(content: impl Into<Rc<str>>) -> Node {
    Node::Text(content.into())
}

/// Fragment grouping `children` without a host node.
pub fn fragment(children: impl Into<Node>) -> Element {
    Element::new(ElementType::Fragment, Props::new().with_children(children))
}

/// Suspense boundary showing `fallback` while `children` wait on data.
pub fn suspense(fallback: impl Into<Node>, children: impl Into<Node>) -> Element {
    Element::new(
        ElementType::Suspense,
        Props::new()
            .with("fallback", PropValue::Node(fallback.into()))
            .with_children(children),
    )
}

// =============================================================================
// Tests
// =============================================================================
