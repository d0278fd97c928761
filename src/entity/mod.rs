//! The typed entity model: categories, contracts, symbols, parameters,
//! expressions, nested declarations and the builtin catalogue.

pub mod builtins;
mod category;
mod contract;
mod expression;
mod literal;
mod model;
mod nested;
mod parameters;
mod symbol;

pub use builtins::{BuiltinDef, BuiltinEntity};
pub use category::{Category, Group, Role};
pub use contract::{Contract, ContractKind, Contracts};
pub use expression::{ExprState, Expression, Fragment};
pub use literal::Literal;
pub use model::{Entity, EntityKind, Lookup, ResolveState};
pub use nested::{EnumDecl, Method, Nested, Using};
pub use parameters::{BoundParameter, BoundParameters, Parameters};
pub use symbol::Symbol;
