//! The symbol table: FQN-keyed entities with memoized resolution.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::trace;

use crate::base::{Fqn, Loc};
use crate::entity::builtins;
use crate::entity::{Category, Entity, EntityKind, Group, ResolveState};
use crate::error::{Error, Result};

use super::resolver::Resolver;

/// One table entry: the entity and the groups it was discovered under.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub group: Group,
    pub entity: Entity,
}

/// FQN-keyed symbol storage for one translation unit, or the merged view of
/// many.
///
/// Iteration order is insertion order. Builtins are registered implicitly and
/// never serialized. A table is open until [`SymbolTable::close`] runs; a
/// closed table is immutable and safe to persist.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SymbolTable {
    entries: IndexMap<Fqn, SymbolEntry>,
    #[serde(skip, default = "builtin_entries")]
    builtins: IndexMap<Fqn, SymbolEntry>,
    next_private: u32,
    closed: bool,
}

fn builtin_entries() -> IndexMap<Fqn, SymbolEntry> {
    builtins::all()
        .map(|def| {
            let entity = def.entity();
            let fqn = Fqn::new(def.name());
            (
                fqn,
                SymbolEntry {
                    group: Group::BUILTIN,
                    entity,
                },
            )
        })
        .collect()
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            builtins: builtin_entries(),
            next_private: 0,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Synthesize the FQN an insertion under `group` will use.
    fn make_fqn(&mut self, name: Option<&str>, namespace: &[SmolStr], group: Group) -> Fqn {
        match name {
            Some(name) => Fqn::in_namespace(namespace, name),
            None if group.contains(Group::COMPOSITION) => Fqn::make_unique(namespace),
            None => {
                let fqn = Fqn::make_unique_private(self.next_private);
                self.next_private += 1;
                fqn
            }
        }
    }

    /// Insert an entity, assigning its FQN.
    ///
    /// Re-opening a namespace is not a conflict; any other FQN collision is,
    /// and reports both declaration sites.
    pub fn insert(
        &mut self,
        name: Option<&str>,
        namespace: &[SmolStr],
        mut entity: Entity,
        group: Group,
    ) -> Result<Fqn> {
        if self.closed {
            return Err(Error::contract_violation(
                entity.loc,
                "cannot insert into a closed symbol table",
            ));
        }
        let fqn = self.make_fqn(name, namespace, group);
        if let Some(existing) = self
            .entries
            .get(&fqn)
            .or_else(|| self.builtins.get(&fqn))
        {
            let reopened = existing.entity.category() == Category::Namespace
                && entity.category() == Category::Namespace;
            if reopened {
                return Ok(fqn);
            }
            return Err(Error::SymbolConflict {
                fqn: SmolStr::new(fqn.as_str()),
                first: existing.entity.loc,
                second: entity.loc,
            });
        }
        trace!(fqn = %fqn, category = %entity.category(), "insert");
        entity.fqn = Some(fqn.clone());
        self.entries.insert(fqn.clone(), SymbolEntry { group, entity });
        Ok(fqn)
    }

    /// Whether `fqn` is known, ignoring entries of excluded groups.
    pub fn contains(&self, fqn: &Fqn, exclude: Group) -> bool {
        self.lookup(fqn, exclude).is_some()
    }

    fn lookup(&self, fqn: &Fqn, exclude: Group) -> Option<&SymbolEntry> {
        self.entries
            .get(fqn)
            .or_else(|| self.builtins.get(fqn))
            .filter(|entry| !entry.group.intersects(exclude))
    }

    pub fn get(&self, fqn: &Fqn, exclude: Group) -> Option<&Entity> {
        self.lookup(fqn, exclude).map(|entry| &entry.entity)
    }

    pub(crate) fn entity_mut(&mut self, fqn: &Fqn) -> Option<&mut Entity> {
        self.entries.get_mut(fqn).map(|entry| &mut entry.entity)
    }

    pub fn entry(&self, fqn: &Fqn) -> Option<&SymbolEntry> {
        self.entries.get(fqn).or_else(|| self.builtins.get(fqn))
    }

    /// Ordered iteration over (FQN, entry) pairs; builtins excluded.
    pub fn iter(&self) -> impl Iterator<Item = (&Fqn, &SymbolEntry)> {
        self.entries.iter()
    }

    /// Entries belonging to any of `groups`, in table order.
    pub fn iter_group(&self, groups: Group) -> impl Iterator<Item = (&Fqn, &SymbolEntry)> {
        self.entries
            .iter()
            .filter(move |(_, entry)| entry.group.intersects(groups))
    }

    /// Direct children of `fqn` belonging to any of `groups`, in table order.
    pub fn children_of(&self, fqn: &Fqn, groups: Group) -> Vec<&Fqn> {
        self.entries
            .iter()
            .filter(|(key, entry)| {
                key.parent().as_ref() == Some(fqn) && entry.group.intersects(groups)
            })
            .map(|(key, _)| key)
            .collect()
    }

    /// The nearest strict ancestor entry that is a component; used as `this`.
    pub fn ancestor_component(&self, fqn: &Fqn) -> Option<Fqn> {
        let mut cursor = fqn.parent();
        while let Some(ancestor) = cursor {
            if let Some(entry) = self.entries.get(&ancestor) {
                if entry.entity.category() == Category::Component {
                    return Some(ancestor);
                }
            }
            cursor = ancestor.parent();
        }
        None
    }

    /// Resolve one entry in place, memoized. `InProgress` entries mean a
    /// resolution cycle.
    pub fn resolve_entity(&mut self, fqn: &Fqn, target: Option<&str>) -> Result<()> {
        let Some(entry) = self.entries.get_mut(fqn) else {
            // Builtins are born resolved.
            return Ok(());
        };
        match entry.entity.state {
            ResolveState::Resolved => return Ok(()),
            ResolveState::InProgress => {
                return Err(Error::inheritance(
                    entry.entity.loc,
                    format!("circular resolution of '{fqn}'"),
                ));
            }
            ResolveState::Unresolved => {}
        }
        entry.entity.state = ResolveState::InProgress;
        let group = entry.group;
        let mut entity = entry.entity.clone();
        trace!(fqn = %fqn, "resolve");

        let namespace = fqn.namespace();
        let this = self.ancestor_component(fqn);
        let exclude = if group.contains(Group::COMPOSITION) {
            Group::NONE
        } else {
            Group::COMPOSITION
        };
        let mut resolver = Resolver::new(self, namespace)
            .with_exclude(exclude)
            .with_this(this)
            .with_target(target.map(SmolStr::new));
        let outcome = entity.resolve(&mut resolver);

        if let Some(entry) = self.entries.get_mut(fqn) {
            match outcome {
                Ok(()) => {
                    entry.entity = entity;
                    Ok(())
                }
                Err(err) => {
                    entry.entity.state = ResolveState::Unresolved;
                    Err(err)
                }
            }
        } else {
            outcome
        }
    }

    /// Resolve every declaration in insertion order.
    ///
    /// Composition-group entries stay unresolved: they may reference the
    /// active target and resolve once per composition build instead.
    pub fn resolve_all(&mut self, target: Option<&str>) -> Result<()> {
        let keys: Vec<Fqn> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.group.contains(Group::COMPOSITION))
            .map(|(fqn, _)| fqn.clone())
            .collect();
        for fqn in keys {
            self.resolve_entity(&fqn, target)?;
        }
        Ok(())
    }

    /// Fetch an entity by FQN, resolving on demand and chasing references.
    pub fn entity_resolved(&mut self, fqn: &Fqn, loc: Loc) -> Result<Entity> {
        let mut current = fqn.clone();
        loop {
            if let Some(entry) = self.builtins.get(&current) {
                return Ok(entry.entity.clone());
            }
            let Some(entry) = self.entries.get(&current) else {
                return Err(Error::UnresolvedSymbol {
                    name: SmolStr::new(current.as_str()),
                    loc,
                    suggestions: Vec::new(),
                });
            };
            if let EntityKind::Reference { target } = &entry.entity.kind {
                current = target.clone();
                continue;
            }
            self.resolve_entity(&current, None)?;
            // The entry cannot vanish between the two lookups.
            return match self.entries.get(&current) {
                Some(entry) => Ok(entry.entity.clone()),
                None => Err(Error::UnresolvedSymbol {
                    name: SmolStr::new(current.as_str()),
                    loc,
                    suggestions: Vec::new(),
                }),
            };
        }
    }

    /// Merge the public entries of a closed unit table into this open one.
    ///
    /// The same FQN arriving twice with identical content (diamond imports)
    /// is not a conflict; diverging content is.
    pub fn update(&mut self, other: &SymbolTable) -> Result<()> {
        if self.closed {
            return Err(Error::contract_violation(
                Loc::default(),
                "cannot update a closed symbol table",
            ));
        }
        for (fqn, entry) in &other.entries {
            if fqn.is_private() {
                continue;
            }
            if let Some(existing) = self.entries.get(fqn) {
                let namespaces = existing.entity.category() == Category::Namespace
                    && entry.entity.category() == Category::Namespace;
                if namespaces || existing.entity == entry.entity {
                    continue;
                }
                return Err(Error::SymbolConflict {
                    fqn: SmolStr::new(fqn.as_str()),
                    first: existing.entity.loc,
                    second: entry.entity.loc,
                });
            }
            self.entries.insert(fqn.clone(), entry.clone());
        }
        Ok(())
    }

    /// Close the table: verify every entry resolved, replace nested members
    /// with reference placeholders, inline and drop private entries, and mark
    /// the table immutable.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        for (fqn, entry) in &self.entries {
            // Composition-group entries carry over unresolved; see
            // [`Self::resolve_all`].
            if !entry.entity.is_resolved() && !entry.group.contains(Group::COMPOSITION) {
                return Err(Error::UnresolvedSymbol {
                    name: SmolStr::new(fqn.as_str()),
                    loc: entry.entity.loc,
                    suggestions: Vec::new(),
                });
            }
        }

        // Snapshot private entities before they are dropped; they inline into
        // their owners since nothing else can reach them.
        let privates: IndexMap<Fqn, Entity> = self
            .entries
            .iter()
            .filter(|(fqn, _)| fqn.is_private())
            .map(|(fqn, entry)| (fqn.clone(), entry.entity.clone()))
            .collect();

        for entry in self.entries.values_mut() {
            if let EntityKind::Nested(nested) = &mut entry.entity.kind {
                for members in [
                    &mut nested.config,
                    &mut nested.interface,
                    &mut nested.composition,
                ] {
                    for member in members.iter_mut() {
                        let Some(member_fqn) = member.fqn.clone() else {
                            continue;
                        };
                        if member_fqn.is_private() {
                            if let Some(inlined) = privates.get(&member_fqn) {
                                *member = inlined.clone();
                            }
                        } else {
                            let mut reference = Entity::new(
                                EntityKind::Reference {
                                    target: member_fqn.clone(),
                                },
                                member.loc,
                            );
                            reference.name = member.name.clone();
                            reference.fqn = Some(member_fqn);
                            reference.state = ResolveState::Resolved;
                            *member = reference;
                        }
                    }
                }
            }
        }

        self.entries.retain(|fqn, _| !fqn.is_private());
        self.closed = true;
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
