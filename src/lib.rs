//! # spark-fiber
//!
//! Incremental, priority-aware tree reconciliation for Rust.
//!
//! Components are plain functions from props to a declarative [`Node`] tree.
//! The engine diffs each new tree against the committed one and applies the
//! minimal set of changes to a host through [`HostConfig`].
//!
//! ## Architecture
//!
//! ```text
//! dispatch / render ──▶ lanes on fibers ──▶ scheduler task or microtask
//!                                              │
//!        ┌─────────────────────────────────────┘
//!        ▼
//!   render phase (begin / complete, interruptible)
//!        │ finished tree
//!        ▼
//!   commit phase (mutation, ref attach) ──▶ passive effects task
//! ```
//!
//! Work is tagged with [`Lanes`]. Urgent lanes preempt in-progress renders of
//! less urgent ones; transitions can be interrupted and restarted. Suspense
//! boundaries show a fallback while a [`Thenable`] is pending and retry when
//! it settles.
//!
//! ## Modules
//!
//! - [`scheduler`] - cooperative task scheduler with sleep and ready heaps
//! - [`lanes`] - priority bitsets
//! - [`element`] - elements, props and component definitions
//! - [`hooks`] - state, effect, memo, ref, context, transition and `use`
//! - [`host`] - the adapter trait a renderer implements
//! - [`noop`] - in-memory host used by tests
//!
//! ## Example
//!
//! ```ignore
//! use spark_fiber::*;
//!
//! let counter = Component::new("Counter", |hooks, _props| {
//!     let (count, set_count) = hooks.use_state(|| 0)?;
//!     let click: Callback = std::rc::Rc::new(move || set_count.update(|n| n + 1));
//!     Ok(host("button", Props::new().with("onclick", click).with_children(count)).into())
//! });
//!
//! let host_tree = NoopHost::new();
//! let root = create_root(host_tree.clone(), host_tree.container(), &Scheduler::new());
//! root.render(counter.element(Props::new()));
//! root.flush()?;
//! assert_eq!(host_tree.markup(), "<button>0</button>");
//! ```

pub mod config;
pub mod context;
pub mod element;
pub mod error;
pub mod fiber;
pub mod hooks;
pub mod host;
pub mod lanes;
pub mod noop;
pub mod scheduler;
pub mod thenable;
pub mod update_queue;

mod commit;
mod reconciler;
mod root;

pub use config::{RootConfig, SchedulerConfig};
pub use context::{create_context, Context, ContextKey};
pub use element::{
    fragment, host, memo, memo_with, suspense, text, Callback, Component, Element, ElementType, Key,
    MemoComponent, Node, NodeRef, PropValue, Props,
};
pub use error::{FiberError, RenderResult, Result, Unwind};
pub use fiber::{Flags, WorkTag};
pub use hooks::{Cleanup, Deps, Dispatch, Hooks, MountHooks, StartTransition, UpdateHooks, Usable};
pub use host::HostConfig;
pub use lanes::{Lane, Lanes};
pub use noop::{HostOp, NoopHost, NoopId};
pub use root::{create_root, create_root_with_config, Root};
pub use scheduler::{ManualClock, Priority, Scheduler};
pub use thenable::{Thenable, ThenableStatus};
