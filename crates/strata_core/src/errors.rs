//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! Errors are split by how far they are allowed to travel:
//! - [`ConfigError`]: a single state-defining node was configured badly. It is
//!   recovered at node scope (the node falls back to its category's default core).
//! - [`StructuralError`]: the tree or the core stacks are in a state that makes
//!   the current compile pass meaningless. It aborts the pass.
//! - [`BackendError`]: reported by the external rendering backend. Logged, never
//!   inspected further.
//!
//! [`StrataError`] wraps all of them and is what top-level APIs return.
//!
//! ```rust,ignore
//! use strata_core::errors::{StrataError, Result};
//!
//! fn frame() -> Result<()> {
//!     renderer.render_frame(&mut scene, &mut backend)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::category::Category;
use crate::ids::NodeId;

/// The main error type for the Strata engine.
#[derive(Error, Debug)]
pub enum StrataError {
    // ========================================================================
    // Scene construction
    // ========================================================================
    /// A node was configured with invalid or incomplete parameters.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The referenced node does not exist (or was destroyed).
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Sibling SIDs must be unique.
    #[error("A sibling under {parent:?} already uses sid '{sid}'")]
    DuplicateSid {
        /// Parent whose children clash
        parent: NodeId,
        /// Clashing sid
        sid: String,
    },

    /// The root node of a scene cannot be removed or re-parented.
    #[error("The scene root cannot be {0}")]
    RootImmutable(&'static str),

    // ========================================================================
    // Compilation
    // ========================================================================
    /// Fatal error for the current compile pass.
    #[error(transparent)]
    Structural(#[from] StructuralError),

    // ========================================================================
    // Authoring / settings input
    // ========================================================================
    /// JSON parsing error (scene descriptions, settings).
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings failed validation.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

/// A state-defining node could not build its core.
///
/// Returned by core build functions instead of unwinding; the scene records it
/// on the node and the compiler substitutes the category's default core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A field holds a value outside of its supported set or range.
    #[error("{category} node: unsupported value for '{field}': {reason}")]
    InvalidValue {
        /// Category of the node being configured
        category: Category,
        /// Offending field name
        field: &'static str,
        /// Human-readable description of the accepted values
        reason: String,
    },

    /// A mandatory field was not provided.
    #[error("{category} node: missing mandatory field '{field}'")]
    MissingField {
        /// Category of the node being configured
        category: Category,
        /// Missing field name
        field: &'static str,
    },

    /// A node description named a type nobody registered.
    #[error("Unknown node type '{0}'")]
    UnknownType(String),

    /// The parameters of a description could not be decoded.
    #[error("{type_name} node: malformed parameters: {reason}")]
    Malformed {
        /// Node type name from the description
        type_name: String,
        /// Decoder message
        reason: String,
    },
}

/// Errors that abort a compile pass.
///
/// All core stacks are reset before one of these leaves the compiler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    /// Traversal went deeper than the configured maximum. A cyclic tree ends
    /// up here too.
    #[error("Traversal depth {depth} exceeds the supported maximum of {max} (cyclic tree?)")]
    DepthExceeded {
        /// Depth at which the limit was hit
        depth: usize,
        /// Configured maximum
        max: usize,
    },

    /// Attaching would make a node its own ancestor.
    #[error("Attaching {child:?} under {parent:?} would create a cycle")]
    CycleDetected {
        /// Node being attached
        child: NodeId,
        /// Requested new parent
        parent: NodeId,
    },

    /// Push/pop counts diverged for a category at the end of a pass.
    #[error("Unbalanced {category} stack: {pushes} pushes vs {pops} pops")]
    UnbalancedStack {
        /// Category whose stack is unbalanced
        category: Category,
        /// Number of pushes seen in the pass
        pushes: u64,
        /// Number of pops seen in the pass
        pops: u64,
    },

    /// A node reachable from the root references a missing child or core.
    #[error("Corrupted scene: {0}")]
    Corrupted(String),
}

/// Failure reported by the external rendering backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Creating the GPU resource for a core failed.
    #[error("Resource allocation failed: {0}")]
    Allocation(String),

    /// Binding a core's state failed.
    #[error("Bind failed for {category}: {reason}")]
    Bind {
        /// Category being bound
        category: Category,
        /// Backend message
        reason: String,
    },

    /// Issuing a draw failed.
    #[error("Draw failed: {0}")]
    Draw(String),
}

/// Alias for `Result<T, StrataError>`.
pub type Result<T> = std::result::Result<T, StrataError>;
