//! Declaration contracts and their merge/validation rules.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

use crate::base::Loc;
use crate::error::{Error, Result};
use crate::tree::Element;

use super::Literal;

/// The closed set of contract kinds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContractKind {
    /// Numeric lower bound; may only tighten (grow) down an inheritance chain.
    Min,
    /// Numeric upper bound; may only tighten (shrink) down an inheritance chain.
    Max,
    /// The parameter must be supplied explicitly.
    Mandatory,
    /// Interface method to run when the instance starts.
    Init,
    /// Interface method to run when the instance stops.
    Shutdown,
    /// Execution-context assignment; value-less form marks self-ownership.
    Executor,
    /// Value must be an integer literal.
    Integer,
    /// Value must be a float (or integer) literal.
    Float,
    /// Value must be a boolean literal.
    Boolean,
    /// Value must be a string literal.
    String,
}

impl ContractKind {
    pub fn parse(kind: &str, loc: Loc) -> Result<Self> {
        Ok(match kind {
            "min" => ContractKind::Min,
            "max" => ContractKind::Max,
            "mandatory" => ContractKind::Mandatory,
            "init" => ContractKind::Init,
            "shutdown" => ContractKind::Shutdown,
            "executor" => ContractKind::Executor,
            "integer" => ContractKind::Integer,
            "float" => ContractKind::Float,
            "boolean" => ContractKind::Boolean,
            "string" => ContractKind::String,
            other => {
                return Err(Error::contract_violation(
                    loc,
                    format!("unknown contract '{other}'"),
                ));
            }
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContractKind::Min => "min",
            ContractKind::Max => "max",
            ContractKind::Mandatory => "mandatory",
            ContractKind::Init => "init",
            ContractKind::Shutdown => "shutdown",
            ContractKind::Executor => "executor",
            ContractKind::Integer => "integer",
            ContractKind::Float => "float",
            ContractKind::Boolean => "boolean",
            ContractKind::String => "string",
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single contract: kind, optional values, optional comment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub kind: ContractKind,
    pub values: Vec<SmolStr>,
    pub comment: Option<SmolStr>,
}

impl Contract {
    pub fn new(kind: ContractKind) -> Self {
        Self {
            kind,
            values: Vec::new(),
            comment: None,
        }
    }

    pub fn with_value(kind: ContractKind, value: impl Into<SmolStr>) -> Self {
        Self {
            kind,
            values: vec![value.into()],
            comment: None,
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.values.first().map(SmolStr::as_str)
    }

    fn numeric_value(&self, loc: Loc) -> Result<f64> {
        self.value()
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| {
                Error::contract_violation(
                    loc,
                    format!("contract '{}' expects a single numeric value", self.kind),
                )
            })
    }

    /// Check the value arity allowed for this kind.
    fn check_arity(&self, loc: Loc) -> Result<()> {
        let ok = match self.kind {
            ContractKind::Min | ContractKind::Max => self.values.len() == 1,
            ContractKind::Executor => self.values.len() <= 1,
            _ => self.values.is_empty(),
        };
        if !ok {
            return Err(Error::contract_violation(
                loc,
                format!(
                    "contract '{}' does not accept {} value(s)",
                    self.kind,
                    self.values.len()
                ),
            ));
        }
        if matches!(self.kind, ContractKind::Min | ContractKind::Max) {
            self.numeric_value(loc)?;
        }
        Ok(())
    }
}

/// An ordered, duplicate-free-by-kind contract sequence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Contracts {
    entries: Vec<Contract>,
}

impl Contracts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble from already-checked contracts; kinds must be distinct.
    pub fn of(contracts: impl IntoIterator<Item = Contract>) -> Self {
        Self {
            entries: contracts.into_iter().collect(),
        }
    }

    /// Read the `contract` child group of a declaration element.
    pub fn from_element(el: &Element, loc: Loc) -> Result<Self> {
        let mut contracts = Contracts::new();
        for child in el.children("contract") {
            let kind = ContractKind::parse(child.attr_value("kind").unwrap_or(""), loc)?;
            let values = child
                .attr_value("values")
                .map(|v| v.split(';').map(SmolStr::new).collect())
                .unwrap_or_default();
            let comment = child.attr_value("comment").map(SmolStr::new);
            contracts.push(
                Contract {
                    kind,
                    values,
                    comment,
                },
                loc,
            )?;
        }
        Ok(contracts)
    }

    /// Append a contract; a second contract of the same kind is an error.
    pub fn push(&mut self, contract: Contract, loc: Loc) -> Result<()> {
        contract.check_arity(loc)?;
        if self.has(contract.kind) {
            return Err(Error::contract_violation(
                loc,
                format!("contract '{}' is declared twice", contract.kind),
            ));
        }
        self.entries.push(contract);
        Ok(())
    }

    pub fn get(&self, kind: ContractKind) -> Option<&Contract> {
        self.entries.iter().find(|c| c.kind == kind)
    }

    pub fn has(&self, kind: ContractKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn is_mandatory(&self) -> bool {
        self.has(ContractKind::Mandatory)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contract> {
        self.entries.iter()
    }

    /// Merge contracts inherited from `base` underneath the local ones.
    ///
    /// Base contracts with no local counterpart are kept, ahead of the local
    /// sequence. When both sides declare the same kind, bounds may only
    /// tighten: a derived `min` must not sink below the base `min`, a derived
    /// `max` must not rise above the base `max`.
    pub fn merge_base(&mut self, base: &Contracts, loc: Loc) -> Result<()> {
        let mut merged: Vec<Contract> = Vec::with_capacity(base.entries.len() + self.entries.len());
        for inherited in &base.entries {
            match self.get(inherited.kind) {
                None => merged.push(inherited.clone()),
                Some(local) => match inherited.kind {
                    ContractKind::Min => {
                        if local.numeric_value(loc)? < inherited.numeric_value(loc)? {
                            return Err(Error::contract_violation(
                                loc,
                                format!(
                                    "contract 'min({})' is lower than the inherited 'min({})'",
                                    local.numeric_value(loc)?,
                                    inherited.numeric_value(loc)?
                                ),
                            ));
                        }
                    }
                    ContractKind::Max => {
                        if local.numeric_value(loc)? > inherited.numeric_value(loc)? {
                            return Err(Error::contract_violation(
                                loc,
                                format!(
                                    "contract 'max({})' is higher than the inherited 'max({})'",
                                    local.numeric_value(loc)?,
                                    inherited.numeric_value(loc)?
                                ),
                            ));
                        }
                    }
                    // Same-kind markers and type contracts carry no tightening
                    // semantics; the local one wins.
                    _ => {}
                },
            }
        }
        merged.append(&mut self.entries);
        self.entries = merged;
        Ok(())
    }

    /// Validate a literal value against the bound and type contracts.
    pub fn validate(&self, value: &Literal, loc: Loc) -> Result<()> {
        for contract in &self.entries {
            match contract.kind {
                ContractKind::Min => {
                    let bound = contract.numeric_value(loc)?;
                    let actual = value.as_f64().ok_or_else(|| {
                        Error::contract_violation(
                            loc,
                            format!("value {value} is not numeric, required by 'min'"),
                        )
                    })?;
                    if actual < bound {
                        return Err(Error::contract_violation(
                            loc,
                            format!("value {actual} is lower than the required minimum {bound}"),
                        ));
                    }
                }
                ContractKind::Max => {
                    let bound = contract.numeric_value(loc)?;
                    let actual = value.as_f64().ok_or_else(|| {
                        Error::contract_violation(
                            loc,
                            format!("value {value} is not numeric, required by 'max'"),
                        )
                    })?;
                    if actual > bound {
                        return Err(Error::contract_violation(
                            loc,
                            format!("value {actual} is higher than the required maximum {bound}"),
                        ));
                    }
                }
                ContractKind::Integer => {
                    if !matches!(value, Literal::Integer(_)) {
                        return Err(Error::contract_violation(
                            loc,
                            format!("value {value} is not an integer"),
                        ));
                    }
                }
                ContractKind::Float => {
                    if !value.is_numeric() {
                        return Err(Error::contract_violation(
                            loc,
                            format!("value {value} is not a number"),
                        ));
                    }
                }
                ContractKind::Boolean => {
                    if !matches!(value, Literal::Boolean(_)) {
                        return Err(Error::contract_violation(
                            loc,
                            format!("value {value} is not a boolean"),
                        ));
                    }
                }
                ContractKind::String => {
                    if !matches!(value, Literal::String(_)) {
                        return Err(Error::contract_violation(
                            loc,
                            format!("value {value} is not a string"),
                        ));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Contracts {
    type Item = &'a Contract;
    type IntoIter = std::slice::Iter<'a, Contract>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contracts(list: &[(ContractKind, &[&str])]) -> Contracts {
        let mut out = Contracts::new();
        for (kind, values) in list {
            out.push(
                Contract {
                    kind: *kind,
                    values: values.iter().map(|v| SmolStr::new(v)).collect(),
                    comment: None,
                },
                Loc::default(),
            )
            .unwrap();
        }
        out
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        let mut c = contracts(&[(ContractKind::Min, &["1"])]);
        let err = c
            .push(Contract::with_value(ContractKind::Min, "2"), Loc::default())
            .unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_min_requires_numeric_value() {
        let mut c = Contracts::new();
        let err = c
            .push(Contract::with_value(ContractKind::Min, "abc"), Loc::default())
            .unwrap_err();
        assert!(err.to_string().contains("numeric"));
    }

    #[test]
    fn test_merge_keeps_base_front() {
        let mut derived = contracts(&[(ContractKind::Mandatory, &[])]);
        let base = contracts(&[(ContractKind::Min, &["5"])]);
        derived.merge_base(&base, Loc::default()).unwrap();
        let kinds: Vec<_> = derived.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ContractKind::Min, ContractKind::Mandatory]);
    }

    #[test]
    fn test_merge_min_may_tighten() {
        let mut derived = contracts(&[(ContractKind::Min, &["10"])]);
        let base = contracts(&[(ContractKind::Min, &["5"])]);
        derived.merge_base(&base, Loc::default()).unwrap();
        assert_eq!(derived.get(ContractKind::Min).unwrap().value(), Some("10"));
    }

    #[test]
    fn test_merge_min_must_not_loosen() {
        let mut derived = contracts(&[(ContractKind::Min, &["2"])]);
        let base = contracts(&[(ContractKind::Min, &["5"])]);
        let err = derived.merge_base(&base, Loc::default()).unwrap_err();
        assert!(err.to_string().contains("lower than"));
    }

    #[test]
    fn test_merge_max_must_not_loosen() {
        let mut derived = contracts(&[(ContractKind::Max, &["9"])]);
        let base = contracts(&[(ContractKind::Max, &["5"])]);
        assert!(derived.merge_base(&base, Loc::default()).is_err());
    }

    #[test]
    fn test_validate_min() {
        let c = contracts(&[(ContractKind::Min, &["10"])]);
        assert!(c.validate(&Literal::Integer(10), Loc::default()).is_ok());
        let err = c
            .validate(&Literal::Integer(5), Loc::default())
            .unwrap_err();
        assert!(err.to_string().contains("lower than"));
    }

    #[test]
    fn test_validate_type_kinds() {
        let c = contracts(&[(ContractKind::Integer, &[])]);
        assert!(c.validate(&Literal::Integer(1), Loc::default()).is_ok());
        assert!(c.validate(&Literal::Float(1.5), Loc::default()).is_err());

        let c = contracts(&[(ContractKind::Float, &[])]);
        assert!(c.validate(&Literal::Integer(1), Loc::default()).is_ok());
    }
}
