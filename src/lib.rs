//! # weld
//!
//! Semantic core of a component-description language compiler: symbol
//! resolution, contract validation, and composition graph construction.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! unit     → Translation units, persisted intermediate form
//!   ↓
//! compose  → Composition engine: classification, ordering, wiring
//!   ↓
//! symbols  → Symbol table, discovery, name resolution
//!   ↓
//! entity   → Typed declarations, contracts, parameter binding
//!   ↓
//! tree     → Generic attributed tree (parser boundary)
//!   ↓
//! base     → Primitives (Fqn, Loc, source registry)
//! ```
//!
//! A parsed tree enters through [`unit::TranslationUnit::build`]; closed
//! units merge into a [`compose::Composition`], whose per-target
//! [`compose::CompositionView`] is what an emitter consumes.

/// Foundation types: FQN, source locations, source registry.
pub mod base;

/// Composition graph construction and the per-target view.
pub mod compose;

/// Typed entity model: categories, contracts, expressions, parameters.
pub mod entity;

/// Error taxonomy shared by every pass.
pub mod error;

/// Symbol discovery, storage and resolution.
pub mod symbols;

/// Generic attributed tree and its builders.
pub mod tree;

/// Translation units and caching.
pub mod unit;

// Re-export commonly needed items
pub use base::{Fqn, Loc, SourceId, SourceSet};
pub use compose::{Composition, CompositionView};
pub use error::{Error, Result};
pub use symbols::SymbolTable;
pub use unit::TranslationUnit;
