//! The signal wiring graph: typed writer-to-reader connections between
//! instance endpoints.

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::base::{Fqn, Loc};
use crate::entity::builtins::RECORDER_MARKER;
use crate::entity::{Entity, ExprState, Literal, Symbol};
use crate::error::{Error, Result};
use crate::symbols::SymbolTable;

/// A connection endpoint: which instance, which member.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct EndpointId {
    pub instance: Fqn,
    pub member: SmolStr,
}

impl std::fmt::Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.instance, self.member)
    }
}

/// Per-reader transport requirements.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct OutputMetadata {
    /// Sample history the reader needs buffered.
    pub history: u32,
}

impl Default for OutputMetadata {
    fn default() -> Self {
        Self { history: 1 }
    }
}

/// One writer endpoint and everything wired to it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConnectionGroup {
    /// FQN of the signal's value type.
    pub signal: Option<Fqn>,
    pub readers: IndexMap<EndpointId, OutputMetadata>,
}

#[derive(Debug)]
enum RecorderTarget {
    /// Substring pattern matched against writer identifiers at close.
    Pattern(SmolStr),
    Endpoint(EndpointId, Loc),
}

#[derive(Debug)]
struct RecorderEntry {
    member: Fqn,
    loc: Loc,
    targets: Vec<RecorderTarget>,
}

/// The connection map under construction.
///
/// Recorder wirings are deferred: their patterns can only match once every
/// ordinary connection is known, so they materialize in [`Connections::close`].
#[derive(Debug, Default)]
pub struct Connections {
    groups: IndexMap<EndpointId, ConnectionGroup>,
    readers: FxHashSet<EndpointId>,
    recorders: IndexMap<EndpointId, RecorderEntry>,
    /// Member declaration behind each endpoint seen so far.
    members: FxHashMap<EndpointId, Fqn>,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> impl Iterator<Item = (&EndpointId, &ConnectionGroup)> {
        self.groups.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.recorders.is_empty()
    }

    /// Split an LValue expression into its endpoint identity and the member
    /// declaration it reaches.
    fn endpoint_of(&mut self, entity: &Entity, what: &str) -> Result<(EndpointId, Fqn)> {
        let symbol = lvalue_symbol(entity).ok_or_else(|| {
            Error::connection(
                entity.loc,
                format!("the {what} of a connection must be a reference to an endpoint"),
            )
        })?;
        let (Some(instance), Some(member_fqn)) = (symbol.head(), symbol.fqn()) else {
            return Err(Error::connection(
                entity.loc,
                format!("the {what} of a connection is not resolved"),
            ));
        };
        if instance == member_fqn {
            return Err(Error::connection(
                entity.loc,
                format!("'{symbol}' does not name an instance member"),
            ));
        }
        let endpoint = EndpointId {
            instance: instance.clone(),
            member: SmolStr::new(member_fqn.name()),
        };
        self.members.insert(endpoint.clone(), member_fqn.clone());
        Ok((endpoint, member_fqn.clone()))
    }

    /// Register a `connect(writer, reader)` directive.
    pub fn add(&mut self, table: &mut SymbolTable, writer: &Entity, reader: &Entity) -> Result<()> {
        let (writer_endpoint, writer_member) = self.endpoint_of(writer, "first argument")?;

        // A recorder writer defers to pattern matching at close.
        if inherits_recorder(table, writer, &writer_member)? {
            let target = match reader_target(self, table, reader)? {
                Some(target) => target,
                None => {
                    return Err(Error::connection(
                        reader.loc,
                        "a recorder target must be an endpoint or a pattern",
                    ));
                }
            };
            self.recorders
                .entry(writer_endpoint)
                .or_insert_with(|| RecorderEntry {
                    member: writer_member,
                    loc: writer.loc,
                    targets: Vec::new(),
                })
                .targets
                .push(target);
            return Ok(());
        }

        let (reader_endpoint, reader_member) = self.endpoint_of(reader, "second argument")?;

        let writer_type = member_value_type(table, &writer_member, writer.loc)?;
        let reader_type = member_value_type(table, &reader_member, reader.loc)?;
        if writer_type != reader_type {
            return Err(Error::connection(
                writer.loc,
                format!(
                    "connections can only be made between the same types, not '{}' and '{}'",
                    display_type(&writer_type),
                    display_type(&reader_type)
                ),
            ));
        }

        self.link(table, writer_endpoint, reader_endpoint, writer.loc)
    }

    /// Wire one validated writer/reader endpoint pair.
    fn link(
        &mut self,
        table: &mut SymbolTable,
        writer: EndpointId,
        reader: EndpointId,
        loc: Loc,
    ) -> Result<()> {
        if writer == reader {
            return Err(Error::connection(loc, "a connection cannot connect to itself"));
        }
        let writer_decl = self.member_entity(table, &writer, loc)?;
        if writer_decl.is_const() {
            return Err(Error::connection(
                loc,
                format!("the sender '{writer}' must not be marked as const"),
            ));
        }
        let reader_decl = self.member_entity(table, &reader, loc)?;
        if !reader_decl.is_const() {
            return Err(Error::connection(
                loc,
                format!("the receiver '{reader}' must be marked as const"),
            ));
        }
        if let Some(group) = self.groups.get(&writer) {
            if group.readers.contains_key(&reader) {
                return Err(Error::connection(
                    loc,
                    format!("connection between '{writer}' and '{reader}' is defined multiple times"),
                ));
            }
        }
        if self.readers.contains(&writer) {
            return Err(Error::connection(
                loc,
                format!("'{writer}' has already been defined as a receiver"),
            ));
        }
        if self.readers.contains(&reader) && !reader_decl.is_varargs() {
            return Err(Error::connection(
                loc,
                format!("'{reader}' is already connected to a sender"),
            ));
        }

        let signal = reader_decl.underlying_type.clone();
        let group = self.groups.entry(writer).or_insert_with(|| ConnectionGroup {
            signal,
            readers: IndexMap::new(),
        });
        group.readers.insert(reader.clone(), OutputMetadata::default());
        self.readers.insert(reader);
        Ok(())
    }

    fn member_entity(
        &self,
        table: &mut SymbolTable,
        endpoint: &EndpointId,
        loc: Loc,
    ) -> Result<Entity> {
        let Some(member) = self.members.get(endpoint) else {
            return Err(Error::connection(
                loc,
                format!("'{endpoint}' is not a known endpoint"),
            ));
        };
        table.entity_resolved(member, loc)
    }

    /// Materialize recorder wirings: match each target against the known
    /// writers, wire every match, and verify coverage.
    pub fn close(&mut self, table: &mut SymbolTable) -> Result<()> {
        let signals: Vec<EndpointId> = self.groups.keys().cloned().collect();
        let recorders: Vec<(EndpointId, RecorderEntry)> = self.recorders.drain(..).collect();
        let mut recorded: FxHashMap<EndpointId, EndpointId> = FxHashMap::default();

        for (recorder, entry) in recorders {
            self.members.insert(recorder.clone(), entry.member.clone());
            let mut matches: Vec<EndpointId> = Vec::new();
            for target in &entry.targets {
                match target {
                    RecorderTarget::Pattern(pattern) => {
                        matches.extend(
                            signals
                                .iter()
                                .filter(|signal| signal.to_string().contains(pattern.as_str()))
                                .cloned(),
                        );
                    }
                    RecorderTarget::Endpoint(endpoint, loc) => {
                        if !signals.contains(endpoint) {
                            return Err(Error::connection(
                                *loc,
                                format!("a recorder must be connected to a signal sender, '{endpoint}' is not one"),
                            ));
                        }
                        matches.push(endpoint.clone());
                    }
                }
            }
            if matches.is_empty() {
                return Err(Error::connection(
                    entry.loc,
                    format!("recorder '{recorder}' does not match any signal"),
                ));
            }
            for signal in matches {
                if let Some(previous) = recorded.get(&signal) {
                    if *previous != recorder {
                        return Err(Error::connection(
                            entry.loc,
                            format!("signal '{signal}' is recorded twice"),
                        ));
                    }
                    continue;
                }
                recorded.insert(signal.clone(), recorder.clone());
                self.link(table, signal, recorder.clone(), entry.loc)?;
            }
        }
        Ok(())
    }
}

fn lvalue_symbol(entity: &Entity) -> Option<&Symbol> {
    match entity.expression().map(|expr| &expr.state) {
        Some(ExprState::LValue { symbol }) => Some(symbol),
        _ => None,
    }
}

/// Whether the writer's type transitively inherits the recorder marker.
fn inherits_recorder(table: &mut SymbolTable, writer: &Entity, member: &Fqn) -> Result<bool> {
    let marker = Fqn::new(RECORDER_MARKER);
    let Some(symbol) = lvalue_symbol(writer) else {
        return Ok(false);
    };
    let Some(instance) = symbol.head() else {
        return Ok(false);
    };
    // The recorder marker sits on the owning instance's type, not on the
    // member itself.
    let instance_entity = table.entity_resolved(instance, writer.loc)?;
    if let Some(instance_type) = &instance_entity.underlying_type {
        let type_entity = table.entity_resolved(instance_type, writer.loc)?;
        if type_entity.parents.contains(&marker) {
            return Ok(true);
        }
    }
    let member_entity = table.entity_resolved(member, writer.loc)?;
    Ok(member_entity.parents.contains(&marker))
}

fn reader_target(
    connections: &mut Connections,
    _table: &mut SymbolTable,
    reader: &Entity,
) -> Result<Option<RecorderTarget>> {
    if let Some(Literal::String(pattern)) = &reader.literal {
        return Ok(Some(RecorderTarget::Pattern(pattern.clone())));
    }
    if lvalue_symbol(reader).is_some() {
        let (endpoint, _) = connections.endpoint_of(reader, "recorder target")?;
        return Ok(Some(RecorderTarget::Endpoint(endpoint, reader.loc)));
    }
    Ok(None)
}

/// The value type both halves of a connection must agree on.
fn member_value_type(table: &mut SymbolTable, member: &Fqn, loc: Loc) -> Result<Option<Fqn>> {
    let entity = table.entity_resolved(member, loc)?;
    Ok(entity.underlying_type)
}

fn display_type(fqn: &Option<Fqn>) -> String {
    match fqn {
        Some(fqn) => fqn.to_string(),
        None => "<untyped>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Category, EntityKind, Expression, Group, Nested, ResolveState};

    fn member_decl(table: &mut SymbolTable, owner: &str, name: &str, is_const: bool, ty: &str) {
        let mut expr = Expression::default();
        expr.is_const = is_const;
        let mut entity = Entity::new(EntityKind::Expression(expr), Loc::default());
        entity.underlying_type = Some(Fqn::new(ty));
        entity.state = ResolveState::Resolved;
        let namespace: Vec<SmolStr> = vec![SmolStr::new(owner)];
        table
            .insert(Some(name), &namespace, entity, Group::INTERFACE)
            .unwrap();
    }

    fn component_decl(table: &mut SymbolTable, name: &str) {
        let mut entity = Entity::new(
            EntityKind::Nested(Nested::empty(Category::Component)),
            Loc::default(),
        );
        entity.state = ResolveState::Resolved;
        table.insert(Some(name), &[], entity, Group::GLOBAL).unwrap();
    }

    fn instance_decl(table: &mut SymbolTable, name: &str, ty: &str) {
        let mut entity = Entity::new(
            EntityKind::Expression(Expression::default()),
            Loc::default(),
        );
        entity.underlying_type = Some(Fqn::new(ty));
        entity.state = ResolveState::Resolved;
        table
            .insert(Some(name), &[], entity, Group::COMPOSITION)
            .unwrap();
    }

    fn endpoint_expr(instance: &str, member: &str) -> Entity {
        let mut symbol = Symbol::from_name(format!("{instance}.{member}"), Loc::default());
        let owner = instance.to_uppercase();
        symbol.chain = vec![Fqn::new(instance), Fqn::new(format!("{owner}.{member}"))];
        let mut expr = Expression::default();
        expr.state = ExprState::LValue { symbol };
        Entity::new(EntityKind::Expression(expr), Loc::default())
    }

    fn fixture() -> SymbolTable {
        let mut table = SymbolTable::new();
        for (instance, owner) in [("x", "X"), ("y", "Y"), ("z", "Z")] {
            component_decl(&mut table, owner);
            instance_decl(&mut table, instance, owner);
            member_decl(&mut table, owner, "out", false, "Integer");
            member_decl(&mut table, owner, "in", true, "Integer");
            member_decl(&mut table, owner, "level", false, "Float");
        }
        table
    }

    #[test]
    fn test_simple_connection() {
        let mut table = fixture();
        let mut connections = Connections::new();
        connections
            .add(&mut table, &endpoint_expr("x", "out"), &endpoint_expr("y", "in"))
            .unwrap();
        let (writer, group) = connections.groups().next().unwrap();
        assert_eq!(writer.to_string(), "x.out");
        assert_eq!(group.readers.len(), 1);
        assert_eq!(group.signal, Some(Fqn::new("Integer")));
    }

    #[test]
    fn test_self_connection_rejected() {
        let mut table = fixture();
        let mut connections = Connections::new();
        let err = connections
            .add(&mut table, &endpoint_expr("x", "out"), &endpoint_expr("x", "out"))
            .unwrap_err();
        assert!(err.to_string().contains("must be marked as const") || err.to_string().contains("itself"));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut table = fixture();
        let mut connections = Connections::new();
        let err = connections
            .add(&mut table, &endpoint_expr("x", "level"), &endpoint_expr("y", "in"))
            .unwrap_err();
        assert!(err.to_string().contains("same types"));
    }

    #[test]
    fn test_const_sender_rejected() {
        let mut table = fixture();
        let mut connections = Connections::new();
        let err = connections
            .add(&mut table, &endpoint_expr("x", "in"), &endpoint_expr("y", "in"))
            .unwrap_err();
        assert!(err.to_string().contains("must not be marked as const"));
    }

    #[test]
    fn test_duplicate_pair_rejected() {
        let mut table = fixture();
        let mut connections = Connections::new();
        let writer = endpoint_expr("x", "out");
        let reader = endpoint_expr("y", "in");
        connections.add(&mut table, &writer, &reader).unwrap();
        let err = connections.add(&mut table, &writer, &reader).unwrap_err();
        assert!(err.to_string().contains("defined multiple times"));
    }

    #[test]
    fn test_reader_used_twice_rejected() {
        let mut table = fixture();
        let mut connections = Connections::new();
        connections
            .add(&mut table, &endpoint_expr("x", "out"), &endpoint_expr("y", "in"))
            .unwrap();
        let err = connections
            .add(&mut table, &endpoint_expr("z", "out"), &endpoint_expr("y", "in"))
            .unwrap_err();
        assert!(err.to_string().contains("already connected"));
    }

    #[test]
    fn test_non_lvalue_rejected() {
        let mut table = fixture();
        let mut connections = Connections::new();
        let mut literal = Entity::new(
            EntityKind::Expression(Expression::default()),
            Loc::default(),
        );
        literal.literal = Some(Literal::Integer(1));
        let err = connections
            .add(&mut table, &literal, &endpoint_expr("y", "in"))
            .unwrap_err();
        assert!(err.to_string().contains("reference to an endpoint"));
    }
}
