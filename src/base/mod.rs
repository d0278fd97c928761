//! Foundation types for the weld toolchain.
//!
//! This module provides fundamental types used throughout the compiler:
//! - [`Fqn`] - Fully qualified names, including synthesized private/unique forms
//! - [`SourceId`], [`Loc`] - Source identifiers and byte-offset locations
//! - [`SourceSet`] - Path registry backing [`SourceId`]
//!
//! This module has NO dependencies on other weld modules.

mod fqn;
mod loc;
mod sources;

pub use fqn::Fqn;
pub use loc::{Loc, SourceId};
pub use sources::SourceSet;

// Re-export the offset type for convenience
pub use text_size::TextSize;
