//! The typed entity model.
//!
//! The generic tree converts into [`Entity`] values in one pass; everything
//! downstream (resolution, composition, views) works on this closed model
//! and never inspects raw elements again.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::base::{Fqn, Loc, SourceId};
use crate::error::{Error, Result};
use crate::tree::Element;

use super::builtins::{self, BuiltinEntity};
use super::category::{Category, Role};
use super::contract::Contracts;
use super::expression::{ExprState, Expression};
use super::literal::Literal;
use super::nested::{EnumDecl, Method, Nested, Using};
use super::parameters::{BoundParameters, Parameters};
use super::symbol::Symbol;

/// Name resolution as seen from an entity being resolved.
///
/// Implementations carry the scoping context (namespace stack, `this`,
/// per-target substitution, group exclusion); entities only ask for names
/// and resolved entities. This is the seam that lets a different scoping
/// strategy substitute for the default resolver.
pub trait Lookup {
    /// Resolve a written (possibly dotted) name into an FQN chain.
    fn resolve_name(&mut self, name: &str, loc: Loc) -> Result<Vec<Fqn>>;

    /// Fetch an entity by FQN, resolving it on demand and chasing
    /// references.
    fn entity(&mut self, fqn: &Fqn, loc: Loc) -> Result<Entity>;

    /// The config declarations an instantiation of `type_fqn` binds against,
    /// inherited declarations included.
    fn config_expectations(&mut self, type_fqn: &Fqn, loc: Loc) -> Result<Parameters>;
}

/// Resolution memoization state. `InProgress` doubles as the cycle guard.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolveState {
    #[default]
    Unresolved,
    InProgress,
    Resolved,
}

/// The closed set of entity shapes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Namespace { name: Fqn },
    Use { path: SmolStr },
    Nested(Nested),
    Method(Method),
    Using(Using),
    Enum(EnumDecl),
    Expression(Expression),
    Builtin(BuiltinEntity),
    Extern,
    /// Placeholder a closed map leaves where a nested member lived.
    Reference { target: Fqn },
}

/// A declaration with its identity, contracts and resolution state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: Option<SmolStr>,
    /// Assigned at discovery; private and anonymous forms included.
    pub fqn: Option<Fqn>,
    pub loc: Loc,
    pub comment: Option<SmolStr>,
    pub contracts: Contracts,
    /// Flattened transitive inheritance, nearest first.
    pub parents: Vec<Fqn>,
    /// The type behind this entity, once resolved.
    pub underlying_type: Option<Fqn>,
    /// For value aliases, the value ultimately referenced.
    pub underlying_value: Option<Fqn>,
    /// Compile-time value, when one folds out.
    pub literal: Option<Literal>,
    pub state: ResolveState,
    pub kind: EntityKind,
}

impl Entity {
    pub fn new(kind: EntityKind, loc: Loc) -> Self {
        Self {
            name: None,
            fqn: None,
            loc,
            comment: None,
            contracts: Contracts::new(),
            parents: Vec::new(),
            underlying_type: None,
            underlying_value: None,
            literal: None,
            state: ResolveState::Unresolved,
            kind,
        }
    }

    /// Convert a declaration element into its typed form, recursively.
    pub fn from_element(el: &Element, source: Option<SourceId>) -> Result<Self> {
        let loc = el.loc(source);
        let kind = match el.category() {
            "namespace" => EntityKind::Namespace {
                name: Fqn::new(el.attr_value("name").unwrap_or("")),
            },
            "use" => EntityKind::Use {
                path: SmolStr::new(el.attr_value("path").unwrap_or("")),
            },
            "struct" => EntityKind::Nested(Nested::from_element(el, Category::Struct, source)?),
            "interface" => {
                EntityKind::Nested(Nested::from_element(el, Category::Interface, source)?)
            }
            "component" => {
                EntityKind::Nested(Nested::from_element(el, Category::Component, source)?)
            }
            "composition" => {
                EntityKind::Nested(Nested::from_element(el, Category::Composition, source)?)
            }
            "method" => EntityKind::Method(Method::from_element(el, source)?),
            "using" => EntityKind::Using(Using::from_element(el, source)?),
            "enum" => EntityKind::Enum(EnumDecl::from_element(el, source)?),
            "expression" => EntityKind::Expression(Expression::from_element(el, source)?),
            "extern" => EntityKind::Extern,
            other => {
                return Err(Error::contract_violation(
                    loc,
                    format!("unknown declaration category '{other}'"),
                ));
            }
        };
        let mut entity = Entity::new(kind, loc);
        entity.name = el.attr_value("name").map(SmolStr::new);
        entity.comment = el.attr_value("comment").map(SmolStr::new);
        entity.contracts = Contracts::from_element(el, loc)?;
        Ok(entity)
    }

    pub fn category(&self) -> Category {
        match &self.kind {
            EntityKind::Namespace { .. } => Category::Namespace,
            EntityKind::Use { .. } => Category::Use,
            EntityKind::Nested(nested) => nested.category,
            EntityKind::Method(_) => Category::Method,
            EntityKind::Using(_) => Category::Using,
            EntityKind::Enum(_) => Category::Enum,
            EntityKind::Expression(_) => Category::Expression,
            EntityKind::Builtin(_) => Category::Builtin,
            EntityKind::Extern => Category::Extern,
            EntityKind::Reference { .. } => Category::Reference,
        }
    }

    pub fn role(&self) -> Role {
        match &self.kind {
            EntityKind::Namespace { .. } | EntityKind::Use { .. } => Role::META,
            EntityKind::Expression(expr) => {
                if expr
                    .symbol()
                    .is_some_and(|symbol| symbol.role.contains(Role::META))
                {
                    Role::META
                } else {
                    Role::VALUE
                }
            }
            EntityKind::Builtin(builtin) => builtin.role,
            EntityKind::Reference { .. } => Role::NONE,
            _ => Role::TYPE,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state == ResolveState::Resolved
    }

    pub fn is_varargs(&self) -> bool {
        matches!(&self.kind, EntityKind::Expression(expr) if expr.is_varargs)
    }

    pub fn is_const(&self) -> bool {
        matches!(&self.kind, EntityKind::Expression(expr) if expr.is_const)
    }

    pub fn expression(&self) -> Option<&Expression> {
        match &self.kind {
            EntityKind::Expression(expr) => Some(expr),
            _ => None,
        }
    }

    /// Whether a value state settled for this expression entity.
    pub fn is_resolved_value(&self) -> bool {
        matches!(
            &self.kind,
            EntityKind::Expression(expr)
                if matches!(
                    expr.state,
                    ExprState::Literal(_) | ExprState::LValue { .. } | ExprState::RValue { .. }
                )
        )
    }

    /// Own contracts with those of the referenced type merged underneath.
    pub fn effective_contracts(&self, loc: Loc) -> Result<Contracts> {
        let mut contracts = self.contracts.clone();
        if let EntityKind::Expression(expr) = &self.kind {
            if let Some(symbol) = expr.symbol() {
                contracts.merge_base(&symbol.contracts, loc)?;
            }
        }
        Ok(contracts)
    }

    /// Template declarations instantiations of this entity bind against.
    pub fn template_expectations(&self) -> Parameters {
        match &self.kind {
            EntityKind::Builtin(builtin) => builtin.template.clone(),
            _ => Parameters::new(),
        }
    }

    /// Fold an instantiation into a literal, where this entity supports it.
    pub fn fold_literal(&self, bound: &BoundParameters, loc: Loc) -> Result<Option<Literal>> {
        match &self.kind {
            EntityKind::Builtin(builtin) => builtins::fold_literal(&builtin.name, bound, loc),
            _ => Ok(None),
        }
    }

    /// FQNs this entity depends on once resolved.
    pub fn dependencies(&self) -> Vec<Fqn> {
        match &self.kind {
            EntityKind::Expression(expr) => expr.dependencies(),
            EntityKind::Using(using) => using.symbol.dependencies(),
            EntityKind::Nested(nested) => nested
                .inheritance
                .iter()
                .flat_map(Symbol::dependencies)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Forget resolution results, recursively. The entity behaves as freshly
    /// discovered and can resolve again under a different context.
    pub fn reset_resolution(&mut self) {
        self.state = ResolveState::Unresolved;
        self.parents.clear();
        self.underlying_type = None;
        self.underlying_value = None;
        self.literal = None;
        match &mut self.kind {
            EntityKind::Expression(expr) => expr.reset_resolution(),
            EntityKind::Using(using) => using.symbol.reset_resolution(),
            EntityKind::Nested(nested) => {
                for symbol in &mut nested.inheritance {
                    symbol.reset_resolution();
                }
            }
            _ => {}
        }
    }

    /// Resolve this entity against `lookup`. Idempotent once resolved.
    pub fn resolve(&mut self, lookup: &mut dyn Lookup) -> Result<()> {
        if self.state == ResolveState::Resolved {
            return Ok(());
        }
        let loc = self.loc;
        match &mut self.kind {
            EntityKind::Nested(nested) => {
                self.parents = nested.resolve(loc, lookup)?;
            }
            EntityKind::Method(method) => {
                method.resolve(lookup)?;
            }
            EntityKind::Using(using) => {
                using.symbol.resolve(lookup)?;
                self.underlying_type = using.symbol.underlying_type.clone();
                let inherited = using.symbol.contracts.clone();
                self.contracts.merge_base(&inherited, loc)?;
            }
            EntityKind::Expression(expr) => {
                let outcome = expr.resolve(loc, lookup)?;
                self.literal = outcome.literal;
                self.underlying_type = outcome.underlying_type;
                self.underlying_value = outcome.underlying_value;
            }
            EntityKind::Namespace { .. }
            | EntityKind::Use { .. }
            | EntityKind::Enum(_)
            | EntityKind::Builtin(_)
            | EntityKind::Extern
            | EntityKind::Reference { .. } => {}
        }
        if let Some(literal) = self.literal.clone() {
            self.effective_contracts(loc)?.validate(&literal, loc)?;
        }
        self.state = ResolveState::Resolved;
        Ok(())
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.fqn, &self.name) {
            (Some(fqn), _) => write!(f, "{}<{fqn}>", self.category()),
            (None, Some(name)) => write!(f, "{}<{name}>", self.category()),
            (None, None) => write!(f, "{}", self.category()),
        }
    }
}
