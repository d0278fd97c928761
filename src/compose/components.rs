//! The composition entry map and its dependency-order fixed point.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::base::Fqn;
use crate::error::{Error, Result};

use super::entry::{entry_identifier, EntryType, ExpressionEntry};
use crate::entity::Entity;

/// Identifier-keyed composition entries, reordered dependency-first at close.
#[derive(Debug, Default)]
pub struct Components {
    map: IndexMap<Fqn, ExpressionEntry>,
}

impl Components {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Fqn, &ExpressionEntry)> {
        self.map.iter()
    }

    pub fn get(&self, identifier: &Fqn) -> Option<&ExpressionEntry> {
        self.map.get(identifier)
    }

    pub fn get_mut(&mut self, identifier: &Fqn) -> Option<&mut ExpressionEntry> {
        self.map.get_mut(identifier)
    }

    pub fn contains(&self, identifier: &Fqn) -> bool {
        self.map.contains_key(identifier)
    }

    /// Insert a classified expression. Returns the identifier when the entry
    /// is new and its dependencies still need processing, `None` when an
    /// equivalent entry already exists.
    ///
    /// Re-inserting the same identifier with the same role requires the same
    /// expression; a service entry may be superseded by a workload one (never
    /// the reverse); any other combination is a conflict.
    pub fn insert(
        &mut self,
        expression: Entity,
        entry_type: EntryType,
        executor: Option<SmolStr>,
    ) -> Result<Option<Fqn>> {
        let identifier = entry_identifier(&expression)?;
        if let Some(existing) = self.map.get(&identifier) {
            if existing.entry_type == entry_type {
                if existing.expression != expression {
                    return Err(Error::SymbolConflict {
                        fqn: SmolStr::new(identifier.as_str()),
                        first: existing.expression.loc,
                        second: expression.loc,
                    });
                }
                return Ok(None);
            }
            let supersedes = |from: EntryType, to: EntryType| {
                from.contains(EntryType::SERVICE) && to.contains(EntryType::WORKLOAD)
            };
            if supersedes(entry_type, existing.entry_type) {
                return Ok(None);
            }
            if !supersedes(existing.entry_type, entry_type) {
                return Err(Error::SymbolConflict {
                    fqn: SmolStr::new(identifier.as_str()),
                    first: existing.expression.loc,
                    second: expression.loc,
                });
            }
        }
        self.map.insert(
            identifier.clone(),
            ExpressionEntry::new(expression, entry_type, executor),
        );
        Ok(Some(identifier))
    }

    /// Walk the dependency closure of `identifier`, the entry itself
    /// included, breadth-first over all four groups.
    pub fn dependency_closure(&self, identifier: &Fqn) -> Vec<Fqn> {
        let mut visited: FxHashSet<Fqn> = FxHashSet::default();
        let mut order = Vec::new();
        let mut queue = vec![identifier.clone()];
        while let Some(current) = queue.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let Some(entry) = self.map.get(&current) else {
                continue;
            };
            order.push(current);
            for group in [&entry.deps, &entry.init, &entry.intra, &entry.shutdown] {
                for dependency in group {
                    if let Ok(id) = entry_identifier(dependency) {
                        queue.push(id);
                    }
                }
            }
        }
        order
    }

    /// Reorder entries so each one's first-level dependencies precede it.
    ///
    /// Repeated satisfiability scans over the remaining entries; a pass with
    /// zero progress means a cycle or a dependency that never got inserted,
    /// reported through the first stalled entry.
    pub fn close(&mut self) -> Result<()> {
        let mut remaining: Vec<(Fqn, ExpressionEntry)> = self.map.drain(..).collect();
        let mut satisfied: FxHashSet<Fqn> = FxHashSet::default();

        while !remaining.is_empty() {
            let before = remaining.len();
            let mut stalled = Vec::new();
            for (identifier, entry) in remaining {
                if entry.deps.is_satisfied_by(&satisfied) {
                    satisfied.insert(identifier.clone());
                    self.map.insert(identifier, entry);
                } else {
                    stalled.push((identifier, entry));
                }
            }
            if stalled.len() == before {
                let (identifier, entry) = &stalled[0];
                let dependency = entry
                    .deps
                    .first_unsatisfied(&satisfied)
                    .map(|fqn| SmolStr::new(fqn.as_str()))
                    .unwrap_or_default();
                return Err(Error::UnsatisfiableDependency {
                    identifier: SmolStr::new(identifier.as_str()),
                    dependency,
                    loc: entry.loc(),
                });
            }
            remaining = stalled;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Loc;
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

    fn insert(components: &mut Components, name: &str, entry_type: EntryType) -> Option<Fqn> {
        components.insert(named(name), entry_type, None).unwrap()
    }

    #[test]
    fn test_identical_reinsertion_is_noop() {
        let mut components = Components::new();
        assert!(insert(&mut components, "a", EntryType::REGISTRY).is_some());
        assert!(insert(&mut components, "a", EntryType::REGISTRY).is_none());
        assert_eq!(components.len(), 1);
    }

    #[test]
    fn test_service_promoted_to_workload() {
        let mut components = Components::new();
        insert(&mut components, "w", EntryType::SERVICE);
        assert!(insert(&mut components, "w", EntryType::WORKLOAD).is_some());
        let entry = components.get(&Fqn::new("w")).unwrap();
        assert!(entry.entry_type.contains(EntryType::WORKLOAD));
    }

    #[test]
    fn test_workload_never_demoted() {
        let mut components = Components::new();
        insert(&mut components, "w", EntryType::WORKLOAD);
        assert!(insert(&mut components, "w", EntryType::SERVICE).is_none());
        let entry = components.get(&Fqn::new("w")).unwrap();
        assert!(entry.entry_type.contains(EntryType::WORKLOAD));
    }

    #[test]
    fn test_role_clash_is_conflict() {
        let mut components = Components::new();
        insert(&mut components, "x", EntryType::REGISTRY);
        let err = components
            .insert(named("x"), EntryType::WORKLOAD, None)
            .unwrap_err();
        assert!(matches!(err, Error::SymbolConflict { .. }));
    }

    #[test]
    fn test_close_orders_dependencies_first() {
        let mut components = Components::new();
        insert(&mut components, "late", EntryType::REGISTRY);
        insert(&mut components, "early", EntryType::REGISTRY);
        components
            .get_mut(&Fqn::new("late"))
            .unwrap()
            .deps
            .push(named("early"))
            .unwrap();
        components.close().unwrap();
        let order: Vec<&Fqn> = components.iter().map(|(fqn, _)| fqn).collect();
        assert_eq!(order, vec![&Fqn::new("early"), &Fqn::new("late")]);
    }

    #[test]
    fn test_close_is_deterministic_without_dependencies() {
        let mut components = Components::new();
        for name in ["c", "a", "b"] {
            insert(&mut components, name, EntryType::REGISTRY);
        }
        components.close().unwrap();
        let order: Vec<String> = components.iter().map(|(fqn, _)| fqn.to_string()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_unsatisfiable_dependency_reported() {
        let mut components = Components::new();
        insert(&mut components, "a", EntryType::REGISTRY);
        components
            .get_mut(&Fqn::new("a"))
            .unwrap()
            .deps
            .push(named("ghost"))
            .unwrap();
        let err = components.close().unwrap_err();
        match err {
            Error::UnsatisfiableDependency {
                identifier,
                dependency,
                ..
            } => {
                assert_eq!(identifier, "a");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
