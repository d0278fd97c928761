//! Parameter sequences and their binding against declared expectations.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::base::{Fqn, Loc, SourceId};
use crate::error::{Error, Result};
use crate::tree::Element;

use super::category::Category;
use super::contract::Contracts;
use super::model::{Entity, Lookup};

/// An ordered sequence of argument or declaration expressions.
///
/// Supplied arguments must be either all named or all unnamed; a variadic
/// declaration may only close a declaration sequence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters {
    items: Vec<Entity>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a sequence of expression elements.
    pub fn from_elements(els: &[Element], source: Option<SourceId>) -> Result<Self> {
        let mut params = Parameters::new();
        for el in els {
            params.push(Entity::from_element(el, source)?)?;
        }
        Ok(params)
    }

    /// Append an expression, enforcing the naming and variadic rules.
    pub fn push(&mut self, entity: Entity) -> Result<()> {
        let loc = entity.loc;
        if let Some(named) = self.is_named() {
            if named != entity.name.is_some() {
                return Err(Error::contract_violation(
                    loc,
                    "parameters must be either all named or all unnamed",
                ));
            }
        }
        if self.items.last().is_some_and(Entity::is_varargs) {
            return Err(Error::contract_violation(
                loc,
                "a variadic parameter must be the last of its sequence",
            ));
        }
        self.items.push(entity);
        Ok(())
    }

    /// Whether this sequence is named; `None` when empty.
    pub fn is_named(&self) -> Option<bool> {
        self.items.first().map(|e| e.name.is_some())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.items.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.items.iter_mut()
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.items.iter().find(|e| e.name.as_deref() == Some(name))
    }

    /// Resolve every expression of the sequence.
    pub fn resolve(&mut self, lookup: &mut dyn Lookup) -> Result<()> {
        for item in &mut self.items {
            item.resolve(lookup)?;
        }
        Ok(())
    }

    /// Bind this (supplied) sequence against `expected` declarations.
    ///
    /// Output follows declaration order; omitted optional declarations are
    /// filled from their defaults, omitted mandatory ones abort. `callee`
    /// restricts what may flow in: component instances only reach components,
    /// methods and builtins.
    pub fn bind(
        &self,
        expected: &Parameters,
        callee: Category,
        loc: Loc,
        lookup: &mut dyn Lookup,
    ) -> Result<BoundParameters> {
        let named = self.is_named().unwrap_or(false);
        let mut supplied: Vec<Vec<&Entity>> = vec![Vec::new(); expected.len()];

        if named {
            for arg in &self.items {
                let name = arg.name.as_deref().unwrap_or("");
                let index = expected
                    .items
                    .iter()
                    .position(|e| !e.is_varargs() && e.name.as_deref() == Some(name))
                    .ok_or_else(|| {
                        Error::contract_violation(loc, format!("unknown parameter '{name}'"))
                    })?;
                if !supplied[index].is_empty() {
                    return Err(Error::contract_violation(
                        loc,
                        format!("parameter '{name}' is supplied twice"),
                    ));
                }
                supplied[index].push(arg);
            }
        } else {
            let variadic_last = expected.items.last().is_some_and(Entity::is_varargs);
            for (i, arg) in self.items.iter().enumerate() {
                if i < expected.len() && !(i == expected.len() - 1 && variadic_last) {
                    supplied[i].push(arg);
                } else if variadic_last && !expected.is_empty() {
                    supplied[expected.len() - 1].push(arg);
                } else {
                    return Err(Error::contract_violation(
                        loc,
                        format!(
                            "too many arguments: {} supplied, {} expected",
                            self.len(),
                            expected.len()
                        ),
                    ));
                }
            }
        }

        let mut bound = BoundParameters::default();
        for (index, (decl, args)) in expected.items.iter().zip(supplied).enumerate() {
            // Unnamed declarations still bind under a name: their position.
            let slot = match &decl.name {
                Some(name) => name.clone(),
                None => SmolStr::new(index.to_string()),
            };
            let contracts = decl.effective_contracts(loc)?;
            if args.is_empty() {
                if decl.is_varargs() {
                    continue;
                }
                if contracts.is_mandatory() {
                    return Err(Error::contract_violation(
                        loc,
                        format!("missing mandatory parameter '{slot}'"),
                    ));
                }
                bound.items.push(BoundParameter {
                    name: Some(slot),
                    value: decl.clone(),
                    is_default: true,
                });
                continue;
            }
            for arg in args {
                validate_argument(arg, &contracts, callee, loc, lookup)?;
                bound.items.push(BoundParameter {
                    name: Some(slot.clone()),
                    value: arg.clone(),
                    is_default: false,
                });
            }
        }
        Ok(bound)
    }
}

fn validate_argument(
    arg: &Entity,
    contracts: &Contracts,
    callee: Category,
    loc: Loc,
    lookup: &mut dyn Lookup,
) -> Result<()> {
    if let Some(literal) = &arg.literal {
        contracts.validate(literal, loc)?;
    } else if contracts.is_mandatory() && !arg.is_resolved_value() {
        return Err(Error::contract_violation(
            loc,
            "a mandatory parameter requires a resolved value",
        ));
    }

    // Instances of components are execution-graph nodes; they may only be
    // handed to constructs that join the graph themselves.
    if let Some(type_fqn) = &arg.underlying_type {
        let type_entity = lookup.entity(type_fqn, loc)?;
        if type_entity.category() == Category::Component
            && !matches!(
                callee,
                Category::Component | Category::Method | Category::Builtin
            )
        {
            return Err(Error::contract_violation(
                loc,
                format!("a component instance cannot be passed to a {callee}"),
            ));
        }
    }
    Ok(())
}

/// One bound parameter: the declared slot and the value filling it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundParameter {
    pub name: Option<SmolStr>,
    pub value: Entity,
    /// The declaration's default filled this slot.
    pub is_default: bool,
}

/// The outcome of binding: declaration-ordered, defaults merged in.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundParameters {
    items: Vec<BoundParameter>,
}

impl BoundParameters {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundParameter> {
        self.items.iter()
    }

    pub fn get(&self, name: &str) -> Option<&BoundParameter> {
        self.items.iter().find(|p| p.name.as_deref() == Some(name))
    }

    pub fn at(&self, index: usize) -> Option<&BoundParameter> {
        self.items.get(index)
    }

    /// FQNs referenced by the bound values.
    pub fn dependencies(&self) -> Vec<Fqn> {
        self.items
            .iter()
            .flat_map(|p| p.value.dependencies())
            .collect()
    }
}
