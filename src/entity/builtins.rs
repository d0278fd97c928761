//! The builtin catalogue.
//!
//! Builtins are pre-registered in every symbol table: primitive types,
//! container types, the meta operations and the reserved marker components.
//! Each is described by a [`BuiltinDef`]; literal folding is an optional
//! capability on that trait, queried by the expression resolver, never a
//! name-based special case outside this module.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::base::{Fqn, Loc};
use crate::error::Result;

use super::category::Role;
use super::contract::{Contract, ContractKind, Contracts};
use super::expression::Expression;
use super::literal::Literal;
use super::model::{Entity, EntityKind, ResolveState};
use super::parameters::{BoundParameters, Parameters};

/// The reserved marker inherited by execution-context components.
pub const EXECUTOR_MARKER: &str = "Executor";
/// The reserved marker inherited by recorder components.
pub const RECORDER_MARKER: &str = "Recorder";
/// The reserved namespace root for platform declarations.
pub const PLATFORM_NAMESPACE: &str = "platform";

/// The symbol-table image of a builtin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuiltinEntity {
    pub name: SmolStr,
    pub role: Role,
    pub config: Parameters,
    pub template: Parameters,
}

/// A builtin definition: identity, expectations, and optional capabilities.
pub trait BuiltinDef: Sync {
    fn name(&self) -> &'static str;

    fn role(&self) -> Role {
        Role::TYPE
    }

    /// Contracts instances of this builtin impose on their values.
    fn contracts(&self) -> Contracts {
        Contracts::new()
    }

    /// Config declarations an instantiation binds against.
    fn config(&self) -> Parameters {
        Parameters::new()
    }

    /// Template declarations a symbol reference binds against.
    fn template(&self) -> Parameters {
        Parameters::new()
    }

    /// Fold an instantiation into a compile-time literal, when supported.
    fn fold_literal(&self, _args: &BoundParameters, _loc: Loc) -> Result<Option<Literal>> {
        Ok(None)
    }

    /// Assemble the entity registered in the symbol table.
    fn entity(&self) -> Entity {
        let kind = EntityKind::Builtin(BuiltinEntity {
            name: SmolStr::new(self.name()),
            role: self.role(),
            config: self.config(),
            template: self.template(),
        });
        let mut entity = Entity::new(kind, Loc::default());
        entity.name = Some(SmolStr::new(self.name()));
        entity.fqn = Some(Fqn::new(self.name()));
        entity.contracts = self.contracts();
        entity.underlying_type = Some(Fqn::new(self.name()));
        entity.state = ResolveState::Resolved;
        entity
    }
}

/// A value declaration usable as a builtin config or template expectation.
fn decl(name: Option<&str>, varargs: bool, contracts: Contracts) -> Entity {
    let expression = Expression {
        is_varargs: varargs,
        ..Expression::default()
    };
    let mut entity = Entity::new(EntityKind::Expression(expression), Loc::default());
    entity.name = name.map(SmolStr::new);
    entity.contracts = contracts;
    entity.state = ResolveState::Resolved;
    entity
}

fn single_value_config(contract: ContractKind) -> Parameters {
    let mut params = Parameters::new();
    // Construction cannot fail: one unnamed, non-variadic declaration.
    let _ = params.push(decl(
        Some("value"),
        false,
        Contracts::of([Contract::new(contract)]),
    ));
    params
}

fn varargs_params() -> Parameters {
    let mut params = Parameters::new();
    let _ = params.push(decl(None, true, Contracts::new()));
    params
}

/// A scalar builtin: one typed value slot, foldable to its literal.
struct Scalar {
    name: &'static str,
    contract: ContractKind,
}

impl BuiltinDef for Scalar {
    fn name(&self) -> &'static str {
        self.name
    }

    fn contracts(&self) -> Contracts {
        Contracts::of([Contract::new(self.contract)])
    }

    fn config(&self) -> Parameters {
        single_value_config(self.contract)
    }

    fn fold_literal(&self, args: &BoundParameters, _loc: Loc) -> Result<Option<Literal>> {
        let Some(first) = args.at(0) else {
            return Ok(None);
        };
        if first.is_default {
            return Ok(None);
        }
        Ok(first.value.literal.clone())
    }
}

/// A builtin with fixed role and optional variadic config/template slots.
struct Plain {
    name: &'static str,
    role: Role,
    config_varargs: bool,
    template_varargs: bool,
}

impl BuiltinDef for Plain {
    fn name(&self) -> &'static str {
        self.name
    }

    fn role(&self) -> Role {
        self.role
    }

    fn config(&self) -> Parameters {
        if self.config_varargs {
            varargs_params()
        } else {
            Parameters::new()
        }
    }

    fn template(&self) -> Parameters {
        if self.template_varargs {
            varargs_params()
        } else {
            Parameters::new()
        }
    }
}

static INTEGER: Scalar = Scalar {
    name: "Integer",
    contract: ContractKind::Integer,
};
static FLOAT: Scalar = Scalar {
    name: "Float",
    contract: ContractKind::Float,
};
static BOOLEAN: Scalar = Scalar {
    name: "Boolean",
    contract: ContractKind::Boolean,
};
static BYTE: Scalar = Scalar {
    name: "Byte",
    contract: ContractKind::Integer,
};
static STRING: Scalar = Scalar {
    name: "String",
    contract: ContractKind::String,
};

static VOID: Plain = Plain {
    name: "Void",
    role: Role::TYPE,
    config_varargs: false,
    template_varargs: false,
};
static ANY: Plain = Plain {
    name: "Any",
    role: Role::TYPE,
    config_varargs: false,
    template_varargs: false,
};
static RESULT: Plain = Plain {
    name: "Result",
    role: Role::TYPE,
    config_varargs: false,
    template_varargs: true,
};
static ASYNC: Plain = Plain {
    name: "Async",
    role: Role::TYPE,
    config_varargs: false,
    template_varargs: true,
};
static ARRAY: Plain = Plain {
    name: "Array",
    role: Role::TYPE,
    config_varargs: true,
    template_varargs: true,
};
static VECTOR: Plain = Plain {
    name: "Vector",
    role: Role::TYPE,
    config_varargs: true,
    template_varargs: true,
};
static CALLABLE: Plain = Plain {
    name: "Callable",
    role: Role::TYPE,
    config_varargs: false,
    template_varargs: true,
};
static LIST: Plain = Plain {
    name: "list",
    role: Role::META,
    config_varargs: true,
    template_varargs: false,
};
static CONNECT: Plain = Plain {
    name: "connect",
    role: Role::META,
    config_varargs: true,
    template_varargs: false,
};
static EXECUTOR: Plain = Plain {
    name: EXECUTOR_MARKER,
    role: Role::TYPE,
    config_varargs: false,
    template_varargs: false,
};
static RECORDER: Plain = Plain {
    name: RECORDER_MARKER,
    role: Role::TYPE,
    config_varargs: true,
    template_varargs: false,
};

static REGISTRY: [&(dyn BuiltinDef); 16] = [
    &VOID, &INTEGER, &FLOAT, &BOOLEAN, &BYTE, &STRING, &RESULT, &ASYNC, &ARRAY, &VECTOR,
    &CALLABLE, &ANY, &LIST, &CONNECT, &EXECUTOR, &RECORDER,
];

/// Every registered builtin, in registration order.
pub fn all() -> impl Iterator<Item = &'static dyn BuiltinDef> {
    REGISTRY.iter().copied()
}

fn get(name: &str) -> Option<&'static dyn BuiltinDef> {
    REGISTRY.iter().copied().find(|def| def.name() == name)
}

/// Dispatch the fold capability by builtin name.
pub fn fold_literal(name: &str, args: &BoundParameters, loc: Loc) -> Result<Option<Literal>> {
    match get(name) {
        Some(def) => def.fold_literal(args, loc),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names_unique() {
        let mut names: Vec<_> = all().map(|def| def.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 16);
    }

    #[test]
    fn test_scalar_entity_shape() {
        let entity = INTEGER.entity();
        assert_eq!(entity.name.as_deref(), Some("Integer"));
        assert!(entity.is_resolved());
        assert!(entity.contracts.has(ContractKind::Integer));
    }

    #[test]
    fn test_markers_registered() {
        assert!(get(EXECUTOR_MARKER).is_some());
        assert!(get(RECORDER_MARKER).is_some());
    }
}
