//! Symbol discovery, storage and resolution.
//!
//! [`discover`] walks an element tree into a [`SymbolTable`]; the table
//! resolves its entries through [`Resolver`], which implements the
//! [`crate::entity::Lookup`] seam; closed tables merge into composition-wide
//! ones with [`SymbolTable::update`].

mod discover;
mod map;
mod resolver;
mod suggest;

pub use discover::{discover, insert_entity};
pub use map::{SymbolEntry, SymbolTable};
pub use resolver::Resolver;
pub use suggest::MAX_SUGGESTIONS;
