//! Name resolution against a symbol table.
//!
//! A resolver is created per entity being resolved and carries the lexical
//! context of that entity: its namespace stack, the enclosing component for
//! `this`, the active target name, and the groups its lookups must not see.

use smol_str::SmolStr;

use crate::base::{Fqn, Loc};
use crate::entity::builtins;
use crate::entity::{Entity, EntityKind, Group, Lookup, Parameters};
use crate::error::{Error, Result};

use super::map::SymbolTable;
use super::suggest;

pub struct Resolver<'a> {
    table: &'a mut SymbolTable,
    namespace: Vec<SmolStr>,
    this: Option<Fqn>,
    target: Option<SmolStr>,
    exclude: Group,
}

impl<'a> Resolver<'a> {
    pub fn new(table: &'a mut SymbolTable, namespace: Vec<SmolStr>) -> Self {
        Self {
            table,
            namespace,
            this: None,
            target: None,
            exclude: Group::NONE,
        }
    }

    pub fn with_this(mut self, this: Option<Fqn>) -> Self {
        self.this = this;
        self
    }

    pub fn with_target(mut self, target: Option<SmolStr>) -> Self {
        self.target = target;
        self
    }

    pub fn with_exclude(mut self, exclude: Group) -> Self {
        self.exclude = exclude;
        self
    }

    /// Resolve the leading segment by walking the namespace stack outward,
    /// then greedily consume as many further segments as stay within known
    /// FQNs. Returns the anchored FQN and how many segments it swallowed.
    fn resolve_shallow(&self, segments: &[&str], loc: Loc) -> Result<(Fqn, usize)> {
        let mut namespace = self.namespace.clone();
        loop {
            let candidate = Fqn::in_namespace(&namespace, segments[0]);
            if self.table.contains(&candidate, self.exclude) {
                let mut fqn = candidate;
                let mut consumed = 1;
                while consumed < segments.len() {
                    let extended = fqn.join(segments[consumed]);
                    if !self.table.contains(&extended, self.exclude) {
                        break;
                    }
                    fqn = extended;
                    consumed += 1;
                }
                return Ok((fqn, consumed));
            }
            if namespace.is_empty() {
                return Err(self.unresolved(segments[0], loc));
            }
            namespace.pop();
        }
    }

    /// Resolve one member segment against a resolved base: the base itself,
    /// its underlying type, then the parents of whichever of those applied.
    fn resolve_member(&mut self, base: &Fqn, segment: &str, loc: Loc) -> Result<Fqn> {
        let entity = self.table.entity_resolved(base, loc)?;
        let mut candidates = vec![base.clone()];
        if let Some(underlying) = entity.underlying_type.clone() {
            if underlying != *base {
                let under = self.table.entity_resolved(&underlying, loc)?;
                candidates.push(underlying);
                candidates.extend(under.parents.iter().cloned());
            }
        }
        candidates.extend(entity.parents.iter().cloned());

        for candidate in &candidates {
            let extended = candidate.join(segment);
            if self.table.contains(&extended, self.exclude) {
                return Ok(extended);
            }
        }

        let all = Group::GLOBAL | Group::CONFIG | Group::INTERFACE | Group::COMPOSITION;
        let pool: Vec<SmolStr> = candidates
            .iter()
            .flat_map(|candidate| self.table.children_of(candidate, all))
            .map(|child| SmolStr::new(child.name()))
            .collect();
        Err(Error::UnresolvedSymbol {
            name: SmolStr::new(segment),
            loc,
            suggestions: suggest::rank(segment, pool),
        })
    }

    fn unresolved(&self, written: &str, loc: Loc) -> Error {
        let pool = self
            .table
            .iter()
            .map(|(fqn, _)| SmolStr::new(fqn.name()))
            .chain(builtins::all().map(|def| SmolStr::new(def.name())));
        Error::UnresolvedSymbol {
            name: SmolStr::new(written),
            loc,
            suggestions: suggest::rank(written, pool),
        }
    }

    /// Inherited config declarations of `fqn`, derived-first. A declaration
    /// that overrides an inherited one of the same name keeps its place and
    /// must only tighten the inherited contracts.
    fn inherited_config(&mut self, fqn: &Fqn, loc: Loc) -> Result<Parameters> {
        let entity = self.table.entity_resolved(fqn, loc)?;
        let EntityKind::Nested(nested) = &entity.kind else {
            return Ok(Parameters::default());
        };
        let mut declarations = self.member_entities(&nested.config, loc)?;
        for parent in &entity.parents {
            let parent_entity = self.table.entity_resolved(parent, loc)?;
            let EntityKind::Nested(parent_nested) = &parent_entity.kind else {
                continue;
            };
            for base in self.member_entities(&parent_nested.config, loc)? {
                match declarations
                    .iter_mut()
                    .find(|d| d.name.is_some() && d.name == base.name)
                {
                    Some(derived) => {
                        let derived_loc = derived.loc;
                        derived.contracts.merge_base(&base.contracts, derived_loc)?;
                    }
                    None => declarations.push(base),
                }
            }
        }
        let mut params = Parameters::default();
        for declaration in declarations {
            params.push(declaration)?;
        }
        Ok(params)
    }

    /// Materialize member entities: table entries where one exists (private
    /// members disappear from closed tables and stay inline), the inline copy
    /// otherwise.
    fn member_entities(&mut self, members: &[Entity], loc: Loc) -> Result<Vec<Entity>> {
        let mut out = Vec::with_capacity(members.len());
        for member in members {
            match &member.fqn {
                Some(fqn) if self.table.contains(fqn, Group::NONE) => {
                    out.push(self.table.entity_resolved(fqn, loc)?);
                }
                _ => out.push(member.clone()),
            }
        }
        Ok(out)
    }
}

impl Lookup for Resolver<'_> {
    fn resolve_name(&mut self, name: &str, loc: Loc) -> Result<Vec<Fqn>> {
        let segments: Vec<&str> = name.split('.').collect();
        let (first, consumed) = match segments[0] {
            "this" => match self.this.clone() {
                Some(this) => (this, 1),
                None => return Err(self.unresolved("this", loc)),
            },
            "target" => {
                let Some(target) = self.target.clone() else {
                    return Err(self.unresolved("target", loc));
                };
                let mut rewritten: Vec<&str> = target.split('.').collect();
                rewritten.extend(&segments[1..]);
                let (fqn, consumed) = self.resolve_shallow(&rewritten, loc)?;
                let into_rest = consumed.saturating_sub(rewritten.len() - (segments.len() - 1));
                (fqn, 1 + into_rest)
            }
            _ => self.resolve_shallow(&segments, loc)?,
        };

        let mut chain = vec![first];
        for segment in &segments[consumed..] {
            // resolve_shallow guarantees chain is never empty here.
            let base = chain[chain.len() - 1].clone();
            let next = self.resolve_member(&base, segment, loc)?;
            chain.push(next);
        }
        Ok(chain)
    }

    fn entity(&mut self, fqn: &Fqn, loc: Loc) -> Result<Entity> {
        self.table.entity_resolved(fqn, loc)
    }

    fn config_expectations(&mut self, type_fqn: &Fqn, loc: Loc) -> Result<Parameters> {
        let entity = self.table.entity_resolved(type_fqn, loc)?;
        match &entity.kind {
            EntityKind::Builtin(builtin) => Ok(builtin.config.clone()),
            EntityKind::Method(method) => Ok(method.args.clone()),
            EntityKind::Nested(_) => self.inherited_config(type_fqn, loc),
            EntityKind::Using(_) | EntityKind::Expression(_) => {
                match entity.underlying_type.clone() {
                    Some(underlying) if underlying != *type_fqn => {
                        self.config_expectations(&underlying, loc)
                    }
                    _ => Ok(Parameters::default()),
                }
            }
            _ => Ok(Parameters::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Expression, Nested, ResolveState};

    fn entity_of(kind: EntityKind) -> Entity {
        let mut entity = Entity::new(kind, Loc::default());
        entity.state = ResolveState::Resolved;
        entity
    }

    fn expression() -> Entity {
        entity_of(EntityKind::Expression(Expression::default()))
    }

    fn component() -> Entity {
        entity_of(EntityKind::Nested(Nested::empty(
            crate::entity::Category::Component,
        )))
    }

    fn ns(parts: &[&str]) -> Vec<SmolStr> {
        parts.iter().map(|p| SmolStr::new(p)).collect()
    }

    #[test]
    fn test_namespace_stack_pops_outward() {
        let mut table = SymbolTable::new();
        table
            .insert(Some("value"), &ns(&["a"]), expression(), Group::GLOBAL)
            .unwrap();
        let mut resolver = Resolver::new(&mut table, ns(&["a", "b", "c"]));
        let chain = resolver.resolve_name("value", Loc::default()).unwrap();
        assert_eq!(chain, vec![Fqn::new("a.value")]);
    }

    #[test]
    fn test_inner_namespace_shadows_outer() {
        let mut table = SymbolTable::new();
        table
            .insert(Some("value"), &ns(&["a"]), expression(), Group::GLOBAL)
            .unwrap();
        table
            .insert(Some("value"), &ns(&["a", "b"]), expression(), Group::GLOBAL)
            .unwrap();
        let mut resolver = Resolver::new(&mut table, ns(&["a", "b"]));
        let chain = resolver.resolve_name("value", Loc::default()).unwrap();
        assert_eq!(chain, vec![Fqn::new("a.b.value")]);
    }

    #[test]
    fn test_dotted_name_consumed_greedily() {
        let mut table = SymbolTable::new();
        table
            .insert(Some("comp"), &ns(&["a"]), component(), Group::GLOBAL)
            .unwrap();
        table
            .insert(Some("io"), &ns(&["a", "comp"]), expression(), Group::INTERFACE)
            .unwrap();
        let mut resolver = Resolver::new(&mut table, ns(&["a"]));
        let chain = resolver.resolve_name("comp.io", Loc::default()).unwrap();
        assert_eq!(chain, vec![Fqn::new("a.comp.io")]);
    }

    #[test]
    fn test_this_requires_enclosing_component() {
        let mut table = SymbolTable::new();
        let mut resolver = Resolver::new(&mut table, Vec::new());
        let err = resolver.resolve_name("this", Loc::default()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedSymbol { .. }));
    }

    #[test]
    fn test_this_anchors_member_lookup() {
        let mut table = SymbolTable::new();
        table
            .insert(Some("comp"), &[], component(), Group::GLOBAL)
            .unwrap();
        table
            .insert(Some("send"), &ns(&["comp"]), expression(), Group::INTERFACE)
            .unwrap();
        let mut resolver =
            Resolver::new(&mut table, ns(&["comp"])).with_this(Some(Fqn::new("comp")));
        let chain = resolver.resolve_name("this.send", Loc::default()).unwrap();
        assert_eq!(chain, vec![Fqn::new("comp"), Fqn::new("comp.send")]);
    }

    #[test]
    fn test_target_substitution() {
        let mut table = SymbolTable::new();
        table
            .insert(Some("esp32"), &[], component(), Group::GLOBAL)
            .unwrap();
        table
            .insert(Some("gpio"), &ns(&["esp32"]), expression(), Group::INTERFACE)
            .unwrap();
        let mut resolver =
            Resolver::new(&mut table, Vec::new()).with_target(Some(SmolStr::new("esp32")));
        let chain = resolver.resolve_name("target.gpio", Loc::default()).unwrap();
        assert_eq!(chain.last(), Some(&Fqn::new("esp32.gpio")));
    }

    #[test]
    fn test_unresolved_carries_suggestions() {
        let mut table = SymbolTable::new();
        table
            .insert(Some("timer"), &[], expression(), Group::GLOBAL)
            .unwrap();
        let err = resolver_err(&mut table, "timr");
        match err {
            Error::UnresolvedSymbol { suggestions, .. } => {
                assert!(suggestions.iter().any(|s| s == "timer"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    fn resolver_err(table: &mut SymbolTable, name: &str) -> Error {
        let mut resolver = Resolver::new(table, Vec::new());
        resolver.resolve_name(name, Loc::default()).unwrap_err()
    }

    #[test]
    fn test_composition_entries_hidden_from_plain_lookup() {
        let mut table = SymbolTable::new();
        table
            .insert(Some("inst"), &[], expression(), Group::COMPOSITION)
            .unwrap();
        let mut resolver = Resolver::new(&mut table, Vec::new()).with_exclude(Group::COMPOSITION);
        assert!(resolver.resolve_name("inst", Loc::default()).is_err());
        let mut open = Resolver::new(&mut table, Vec::new());
        assert!(open.resolve_name("inst", Loc::default()).is_ok());
    }
}
