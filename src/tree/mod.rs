//! The generic attributed tree handed to the semantic core.
//!
//! A front end (parser, generator, test fixture) produces [`Element`] trees;
//! the semantic core converts them into the typed entity model in a single
//! pass and never looks back.

mod builder;
mod element;

pub use builder::{symbol_element, ContractBuilder, ElementBuilder, ExpressionBuilder};
pub use element::{Attr, Element};
