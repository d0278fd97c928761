//! Composition graph construction: classification, dependency ordering,
//! signal wiring and the per-target view handed to emitters.

mod components;
mod connections;
mod engine;
mod entry;
mod view;

pub use components::Components;
pub use connections::{ConnectionGroup, Connections, EndpointId, OutputMetadata};
pub use engine::{Composition, DEFAULT_EXECUTOR};
pub use entry::{entry_identifier, DependencyGroup, EntryType, ExpressionEntry};
pub use view::CompositionView;
