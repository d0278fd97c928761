//! Symbol fragments: written names and their resolved FQN chains.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::base::{Fqn, Loc, SourceId};
use crate::error::{Error, Result};
use crate::tree::Element;

use super::category::{Category, Role};
use super::contract::Contracts;
use super::model::{Entity, Lookup};
use super::parameters::Parameters;

/// A reference to another entity as written in source.
///
/// Before resolution only `name` is meaningful. Resolution fills the FQN
/// `chain`: one entry per name segment that crossed an entity boundary, the
/// last being the referenced entity itself. A chain longer than one arises
/// from member access (`instance.member` yields the instance FQN followed by
/// the member's FQN within its defining type).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: SmolStr,
    pub chain: Vec<Fqn>,
    pub template: Parameters,
    pub is_const: bool,
    pub loc: Loc,
    /// Category of the referenced entity, filled at resolution.
    pub category: Option<Category>,
    /// Role of the referenced entity, filled at resolution.
    pub role: Role,
    /// Type behind the referenced entity, filled at resolution.
    pub underlying_type: Option<Fqn>,
    /// Contracts inherited from the referenced entity, filled at resolution.
    pub contracts: Contracts,
}

impl Symbol {
    pub fn from_name(name: impl Into<SmolStr>, loc: Loc) -> Self {
        Self {
            name: name.into(),
            chain: Vec::new(),
            template: Parameters::default(),
            is_const: false,
            loc,
            category: None,
            role: Role::NONE,
            underlying_type: None,
            contracts: Contracts::new(),
        }
    }

    /// Read a `symbol` element (inheritance lists, symbol fragments).
    pub fn from_element(el: &Element, source: Option<SourceId>) -> Result<Self> {
        let loc = el.loc(source);
        let name = el.attr_value("symbol").unwrap_or("").to_string();
        let mut symbol = Self::from_name(name, loc);
        symbol.is_const = el.has_attr("const");
        symbol.template = Parameters::from_elements(el.children("template"), source)?;
        Ok(symbol)
    }

    /// The referenced entity's FQN; meaningful once resolved.
    pub fn fqn(&self) -> Option<&Fqn> {
        self.chain.last()
    }

    /// The head of the chain: the instance for member access, otherwise the
    /// referenced entity itself.
    pub fn head(&self) -> Option<&Fqn> {
        self.chain.first()
    }

    pub fn is_resolved(&self) -> bool {
        !self.chain.is_empty()
    }

    /// Whether the written name reaches through `this`.
    pub fn is_this(&self) -> bool {
        self.name == "this" || self.name.starts_with("this.")
    }

    /// Resolve the written name and pull category, role, underlying type and
    /// contracts from the referenced entity.
    pub fn resolve(&mut self, lookup: &mut dyn Lookup) -> Result<()> {
        self.chain = lookup.resolve_name(&self.name, self.loc)?;
        let fqn = match self.chain.last() {
            Some(fqn) => fqn.clone(),
            None => {
                return Err(Error::UnresolvedSymbol {
                    name: self.name.clone(),
                    loc: self.loc,
                    suggestions: Vec::new(),
                });
            }
        };
        let target = lookup.entity(&fqn, self.loc)?;
        self.category = Some(target.category());
        self.role = target.role();
        self.underlying_type = target.underlying_type.clone().or(Some(fqn));
        self.contracts.merge_base(&target.contracts, self.loc)?;

        self.resolve_template(lookup, &target)?;
        Ok(())
    }

    /// Resolve template arguments and bind them against the referenced
    /// entity's template expectations.
    fn resolve_template(&mut self, lookup: &mut dyn Lookup, target: &Entity) -> Result<()> {
        if self.template.is_empty() {
            return Ok(());
        }
        self.template.resolve(lookup)?;
        let expected = target.template_expectations();
        if expected.is_empty() {
            return Err(Error::contract_violation(
                self.loc,
                format!("'{}' does not accept template parameters", self.name),
            ));
        }
        let target_category = target.category();
        self.template
            .bind(&expected, target_category, self.loc, lookup)?;
        Ok(())
    }

    /// Forget resolution results so the symbol can resolve again under a
    /// different context.
    pub(crate) fn reset_resolution(&mut self) {
        self.chain.clear();
        self.category = None;
        self.role = Role::NONE;
        self.underlying_type = None;
        for param in self.template.iter_mut() {
            param.reset_resolution();
        }
    }

    /// FQNs this symbol pulls into a dependency set.
    pub fn dependencies(&self) -> Vec<Fqn> {
        let mut deps: Vec<Fqn> = self.chain.clone();
        for param in self.template.iter() {
            deps.extend(param.dependencies());
        }
        deps
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.fqn() {
            Some(fqn) => write!(f, "{fqn}"),
            None => write!(f, "{}", self.name),
        }
    }
}
