//! Fiber tree: double-buffered work nodes stored in a generation arena.

mod arena;
mod flags;
mod node;
mod root;
mod tags;

pub use arena::{FiberId, FiberRef};
pub use flags::{Flags, HookFlags};
pub use tags::WorkTag;

pub(crate) use arena::FiberArena;
pub(crate) use node::{
    is_hidden, offscreen_props, FiberNode, FiberUpdateQueue, MemoizedState,
    RootState,
};
pub(crate) use root::FiberRoot;
