//! Composition entries: lifecycle classification and dependency groups.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::base::{Fqn, Loc};
use crate::entity::{Category, Entity};
use crate::error::{Error, Result};

/// Lifecycle roles of a composition entry, combinable.
#[derive(Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryType(u8);

impl EntryType {
    pub const NONE: EntryType = EntryType(0);
    /// Long-lived instance, created before any task runs.
    pub const REGISTRY: EntryType = EntryType(1 << 0);
    /// Foreground task; the application lives as long as one runs.
    pub const WORKLOAD: EntryType = EntryType(1 << 1);
    /// Background task, stopped once no workload remains.
    pub const SERVICE: EntryType = EntryType(1 << 2);
    /// Declared under the reserved platform namespace.
    pub const PLATFORM: EntryType = EntryType(1 << 3);
    /// Owns an execution context; always also a registry instance.
    pub const EXECUTOR: EntryType = EntryType(1 << 4);

    pub fn contains(self, other: EntryType) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: EntryType) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for EntryType {
    type Output = EntryType;

    fn bitor(self, rhs: EntryType) -> EntryType {
        EntryType(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for EntryType {
    fn bitor_assign(&mut self, rhs: EntryType) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Debug for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = [
            (EntryType::REGISTRY, "registry"),
            (EntryType::WORKLOAD, "workload"),
            (EntryType::SERVICE, "service"),
            (EntryType::PLATFORM, "platform"),
            (EntryType::EXECUTOR, "executor"),
        ];
        let mut set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            set.push("none");
        }
        write!(f, "{}", set.join("|"))
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// The dependency identity of a composition expression: its own FQN when
/// named, the FQN of its type otherwise.
pub fn entry_identifier(expression: &Entity) -> Result<Fqn> {
    if expression.name.is_some() {
        if let Some(fqn) = &expression.fqn {
            return Ok(fqn.clone());
        }
    }
    if let Some(symbol) = expression.expression().and_then(|e| e.symbol()) {
        if let Some(fqn) = symbol.fqn() {
            return Ok(fqn.clone());
        }
    }
    match &expression.fqn {
        Some(fqn) => Ok(fqn.clone()),
        None => Err(Error::contract_violation(
            expression.loc,
            "a composition entry requires an identity",
        )),
    }
}

/// An ordered set of expression dependencies, deduplicated by identity.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DependencyGroup {
    items: Vec<Entity>,
}

impl DependencyGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builtins never join a group; they are available at all times.
    pub fn push(&mut self, expression: Entity) -> Result<()> {
        if expression.category() == Category::Builtin {
            return Ok(());
        }
        let identifier = entry_identifier(&expression)?;
        for existing in &self.items {
            if entry_identifier(existing)? == identifier {
                return Ok(());
            }
        }
        self.items.push(expression);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether every dependency identity is contained in `satisfied`.
    pub fn is_satisfied_by(&self, satisfied: &FxHashSet<Fqn>) -> bool {
        self.items
            .iter()
            .all(|item| matches!(entry_identifier(item), Ok(id) if satisfied.contains(&id)))
    }

    /// The first dependency identity missing from `satisfied`, if any.
    pub fn first_unsatisfied(&self, satisfied: &FxHashSet<Fqn>) -> Option<Fqn> {
        self.items
            .iter()
            .filter_map(|item| entry_identifier(item).ok())
            .find(|id| !satisfied.contains(id))
    }
}

impl<'a> IntoIterator for &'a DependencyGroup {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// A classified composition expression with its lifecycle dependencies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExpressionEntry {
    pub expression: Entity,
    pub entry_type: EntryType,
    /// FQNs of the execution contexts this entry runs under.
    pub executors: FxHashSet<SmolStr>,
    /// First-level dependencies; drive the creation order.
    pub deps: DependencyGroup,
    /// Ran before the entry starts.
    pub init: DependencyGroup,
    /// Nested composition bodies instantiated alongside the entry.
    pub intra: DependencyGroup,
    /// Ran after the last workload stops.
    pub shutdown: DependencyGroup,
}

impl ExpressionEntry {
    pub fn new(expression: Entity, entry_type: EntryType, executor: Option<SmolStr>) -> Self {
        let mut executors = FxHashSet::default();
        if let Some(executor) = executor {
            executors.insert(executor);
        }
        Self {
            expression,
            entry_type,
            executors,
            deps: DependencyGroup::new(),
            init: DependencyGroup::new(),
            intra: DependencyGroup::new(),
            shutdown: DependencyGroup::new(),
        }
    }

    pub fn loc(&self) -> Loc {
        self.expression.loc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityKind, Expression};

    fn named(name: &str) -> Entity {
        let mut entity = Entity::new(
            EntityKind::Expression(Expression::default()),
            Loc::default(),
        );
        entity.name = Some(SmolStr::new(name));
        entity.fqn = Some(Fqn::new(name));
        entity
    }

    #[test]
    fn test_entry_type_flags() {
        let flags = EntryType::REGISTRY | EntryType::EXECUTOR;
        assert!(flags.contains(EntryType::REGISTRY));
        assert!(!flags.contains(EntryType::WORKLOAD));
        assert_eq!(format!("{flags}"), "registry|executor");
    }

    #[test]
    fn test_group_dedupes_by_identity() {
        let mut group = DependencyGroup::new();
        group.push(named("a")).unwrap();
        group.push(named("a")).unwrap();
        group.push(named("b")).unwrap();
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn test_satisfaction() {
        let mut group = DependencyGroup::new();
        group.push(named("a")).unwrap();
        group.push(named("b")).unwrap();
        let mut satisfied = FxHashSet::default();
        satisfied.insert(Fqn::new("a"));
        assert!(!group.is_satisfied_by(&satisfied));
        assert_eq!(group.first_unsatisfied(&satisfied), Some(Fqn::new("b")));
        satisfied.insert(Fqn::new("b"));
        assert!(group.is_satisfied_by(&satisfied));
    }
}
