use crate::element::ElementType;

/// Kind of work a fiber performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkTag {
    FunctionComponent,
    HostRoot,
    HostComponent,
    HostText,
    Fragment,
    ContextProvider,
    Suspense,
    /// Primary children of a Suspense boundary; hidden while the fallback shows.
    Offscreen,
    Memo,
}

impl WorkTag {
    pub fn from_element_type(element_type: &ElementType) -> Self {
        match element_type {
            ElementType::Host(_) => WorkTag::HostComponent,
            ElementType::Function(_) => WorkTag::FunctionComponent,
            ElementType::Fragment => WorkTag::Fragment,
            ElementType::Provider(_) => WorkTag::ContextProvider,
            ElementType::Suspense => WorkTag::Suspense,
            ElementType::Memo(_) => WorkTag::Memo,
        }
    }

    /// Fibers that own a host instance.
    pub fn is_host(self) -> bool {
        matches!(self, WorkTag::HostComponent | WorkTag::HostText)
    }

    /// Fibers whose instance can parent host nodes.
    pub fn is_host_parent(self) -> bool {
        matches!(self, WorkTag::HostComponent | WorkTag::HostRoot)
    }

    /// Fibers that run a component body with hooks.
    pub fn has_hooks(self) -> bool {
        matches!(self, WorkTag::FunctionComponent | WorkTag::Memo)
    }
}
