//! First pass over an element tree: convert declarations and populate a
//! symbol table, assigning FQNs top-down.
//!
//! Discovery only inserts; resolution runs afterwards over the table in
//! insertion order, so forward references within a unit are fine.

use smol_str::SmolStr;

use crate::base::{Fqn, SourceId};
use crate::entity::{Category, Entity, EntityKind, Expression, Group, Literal, ResolveState};
use crate::error::{Error, Result};
use crate::tree::Element;

use super::map::SymbolTable;

/// Walk the top-level declarations of a unit tree into `table`.
///
/// Returns the paths named by `use` declarations, in written order; the
/// caller loads those units before resolving this one.
pub fn discover(
    table: &mut SymbolTable,
    root: &Element,
    source: Option<SourceId>,
) -> Result<Vec<SmolStr>> {
    let mut namespace: Vec<SmolStr> = Vec::new();
    let mut uses = Vec::new();
    for el in root.children("children") {
        let entity = Entity::from_element(el, source)?;
        match &entity.kind {
            EntityKind::Namespace { name } => {
                let name = name.clone();
                enter_namespace(table, &name, &entity)?;
                namespace = name.segments().map(SmolStr::new).collect();
            }
            EntityKind::Use { path } => {
                if path.is_empty() {
                    return Err(Error::contract_violation(
                        entity.loc,
                        "a use declaration requires a path",
                    ));
                }
                uses.push(path.clone());
            }
            _ => {
                insert_entity(table, entity, &namespace, Group::GLOBAL)?;
            }
        }
    }
    Ok(uses)
}

/// Register every prefix of a namespace declaration so shallow resolution can
/// anchor on it. Re-declaring a prefix is not a conflict.
fn enter_namespace(table: &mut SymbolTable, name: &Fqn, declared: &Entity) -> Result<()> {
    let mut prefix: Vec<SmolStr> = Vec::new();
    for segment in name.segments() {
        let mut entity = Entity::new(
            EntityKind::Namespace {
                name: Fqn::in_namespace(&prefix, segment),
            },
            declared.loc,
        );
        entity.name = Some(SmolStr::new(segment));
        entity.state = ResolveState::Resolved;
        table.insert(Some(segment), &prefix, entity, Group::GLOBAL)?;
        prefix.push(SmolStr::new(segment));
    }
    Ok(())
}

/// Insert a converted entity and, recursively, its member bodies.
///
/// Members are inserted as their own table entries; the inline copies keep
/// their assigned FQNs so [`SymbolTable::close`] can reconcile the two.
pub fn insert_entity(
    table: &mut SymbolTable,
    entity: Entity,
    namespace: &[SmolStr],
    mut group: Group,
) -> Result<Fqn> {
    // Unnamed composition blocks and their members need identities that
    // survive closing, which private FQNs do not.
    if entity.category() == Category::Composition {
        group = group | Group::COMPOSITION;
    }
    let name = entity.name.clone();
    let fqn = table.insert(name.as_deref(), namespace, entity, group)?;
    let child_namespace: Vec<SmolStr> = fqn.segments().map(SmolStr::new).collect();

    let kind = table
        .entity_mut(&fqn)
        .map(|stored| match &stored.kind {
            EntityKind::Nested(_) => MemberShape::Nested,
            EntityKind::Enum(_) => MemberShape::Enum,
            _ => MemberShape::Leaf,
        })
        .unwrap_or(MemberShape::Leaf);

    match kind {
        MemberShape::Nested => {
            for (group, pick) in [
                (Group::CONFIG, MemberVec::Config),
                (Group::INTERFACE, MemberVec::Interface),
                (Group::COMPOSITION, MemberVec::Composition),
            ] {
                let mut members = take_members(table, &fqn, pick);
                for member in &mut members {
                    let member_fqn =
                        insert_entity(table, member.clone(), &child_namespace, group)?;
                    member.fqn = Some(member_fqn);
                }
                put_members(table, &fqn, pick, members);
            }
        }
        MemberShape::Enum => {
            let values: Vec<SmolStr> = match table.entity_mut(&fqn) {
                Some(stored) => match &stored.kind {
                    EntityKind::Enum(decl) => decl.values.clone(),
                    _ => Vec::new(),
                },
                None => Vec::new(),
            };
            for value in values {
                let loc = table.entity_mut(&fqn).map(|e| e.loc).unwrap_or_default();
                let mut member = Entity::new(EntityKind::Expression(Expression::default()), loc);
                member.name = Some(value.clone());
                member.literal = Some(Literal::String(value.clone()));
                member.underlying_type = Some(fqn.clone());
                member.state = ResolveState::Resolved;
                table.insert(Some(&value), &child_namespace, member, Group::GLOBAL)?;
            }
        }
        MemberShape::Leaf => {}
    }
    Ok(fqn)
}

#[derive(Copy, Clone)]
enum MemberShape {
    Nested,
    Enum,
    Leaf,
}

#[derive(Copy, Clone)]
enum MemberVec {
    Config,
    Interface,
    Composition,
}

fn take_members(table: &mut SymbolTable, fqn: &Fqn, pick: MemberVec) -> Vec<Entity> {
    match table.entity_mut(fqn) {
        Some(stored) => match &mut stored.kind {
            EntityKind::Nested(nested) => std::mem::take(match pick {
                MemberVec::Config => &mut nested.config,
                MemberVec::Interface => &mut nested.interface,
                MemberVec::Composition => &mut nested.composition,
            }),
            _ => Vec::new(),
        },
        None => Vec::new(),
    }
}

fn put_members(table: &mut SymbolTable, fqn: &Fqn, pick: MemberVec, members: Vec<Entity>) {
    if let Some(stored) = table.entity_mut(fqn) {
        if let EntityKind::Nested(nested) = &mut stored.kind {
            *match pick {
                MemberVec::Config => &mut nested.config,
                MemberVec::Interface => &mut nested.interface,
                MemberVec::Composition => &mut nested.composition,
            } = members;
        }
    }
}
