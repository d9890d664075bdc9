//! Error types for the reconciler.
//!
//! Two kinds of failure leave a render pass:
//! - [`FiberError`] - usage errors, rejected awaitables and host failures.
//!   They abort the pass and surface to the caller.
//! - [`Unwind::Suspend`] - a component is waiting on a [`Thenable`](crate::Thenable).
//!   The work loop recovers from it internally and it never reaches the caller.

use thiserror::Error;

use crate::thenable::SuspendHandle;

/// Errors surfaced by the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FiberError {
    /// A component called more or fewer hooks than on its previous render.
    #[error("rendered {found} hooks but the previous render used {expected}")]
    HookCountMismatch { expected: usize, found: usize },

    /// The hook at `index` is a different primitive than on the previous render.
    #[error("hook #{index} changed from {expected} to {found} between renders")]
    HookKindMismatch {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    /// A state or memo slot holds a value of another type than requested.
    #[error("hook #{index} holds a value of a different type")]
    HookTypeMismatch { index: usize },

    /// An awaited value settled as rejected; raised where it is read.
    #[error("awaited value rejected: {0}")]
    Rejected(String),

    /// The host adapter refused an operation.
    #[error("host error: {0}")]
    Host(String),

    /// A component reported its own failure.
    #[error("render error: {0}")]
    Render(String),

    /// Sync renders kept scheduling more sync work.
    #[error("maximum update depth exceeded after {0} nested sync renders")]
    NestedUpdateLimit(usize),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, FiberError>;

/// Why a component body stopped before returning its children.
#[derive(Debug, Clone)]
pub enum Unwind {
    /// Waiting on an unresolved awaitable. Caught by the nearest Suspense boundary.
    Suspend(SuspendHandle),
    /// A real failure that aborts the render pass.
    Fail(FiberError),
}

impl From<FiberError> for Unwind {
    fn from(err: FiberError) -> Self {
        Unwind::Fail(err)
    }
}

/// Result of evaluating a component body.
pub type RenderResult = std::result::Result<crate::element::Node, Unwind>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FiberError::HookCountMismatch {
            expected: 2,
            found: 3,
        };
        assert_eq!(
            err.to_string(),
            "rendered 3 hooks but the previous render used 2"
        );

        let err = FiberError::Rejected("offline".into());
        assert_eq!(err.to_string(), "awaited value rejected: offline");
    }

    #[test]
    fn test_fiber_error_converts_into_unwind() {
        let unwind: Unwind = FiberError::Render("boom".into()).into();
        assert!(matches!(unwind, Unwind::Fail(FiberError::Render(_))));
    }
}
