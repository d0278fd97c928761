//! The queryable result of a closed composition build.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::base::Fqn;
use crate::entity::{Entity, Group};
use crate::symbols::SymbolTable;

use super::components::Components;
use super::connections::{ConnectionGroup, Connections, EndpointId};
use super::entry::{EntryType, ExpressionEntry};

/// Everything an emitter needs: dependency-ordered entries per execution
/// context, the wiring graph, and stable small ids for interface entities.
#[derive(Debug)]
pub struct CompositionView {
    symbols: SymbolTable,
    components: Components,
    connections: Connections,
    contexts: Vec<SmolStr>,
}

impl CompositionView {
    pub(crate) fn new(
        symbols: SymbolTable,
        components: Components,
        connections: Connections,
        contexts: Vec<SmolStr>,
    ) -> Self {
        Self {
            symbols,
            components,
            connections,
            contexts,
        }
    }

    /// Execution contexts, sorted; the placeholder context when no executor
    /// was declared.
    pub fn contexts(&self) -> &[SmolStr] {
        &self.contexts
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn entity(&self, fqn: &Fqn) -> Option<&Entity> {
        self.symbols.get(fqn, Group::NONE)
    }

    pub fn entry(&self, identifier: &Fqn) -> Option<&ExpressionEntry> {
        self.components.get(identifier)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Fqn, &ExpressionEntry)> {
        self.components.iter()
    }

    fn in_context<'a>(
        &'a self,
        flag: EntryType,
        context: &'a str,
    ) -> impl Iterator<Item = (&'a Fqn, &'a ExpressionEntry)> {
        self.components.iter().filter(move |(_, entry)| {
            entry.entry_type.contains(flag) && entry.executors.contains(context)
        })
    }

    /// Long-lived instances of one context, creation order.
    pub fn registry<'a>(&'a self, context: &'a str) -> IndexMap<&'a Fqn, &'a ExpressionEntry> {
        self.in_context(EntryType::REGISTRY, context).collect()
    }

    /// Foreground tasks of one context, creation order.
    pub fn workloads<'a>(&'a self, context: &'a str) -> Vec<&'a ExpressionEntry> {
        self.in_context(EntryType::WORKLOAD, context)
            .map(|(_, entry)| entry)
            .collect()
    }

    /// Background tasks of one context, creation order.
    pub fn services<'a>(&'a self, context: &'a str) -> Vec<&'a ExpressionEntry> {
        self.in_context(EntryType::SERVICE, context)
            .map(|(_, entry)| entry)
            .collect()
    }

    pub fn platform(&self) -> Vec<&ExpressionEntry> {
        self.components
            .iter()
            .filter(|(_, entry)| entry.entry_type.contains(EntryType::PLATFORM))
            .map(|(_, entry)| entry)
            .collect()
    }

    /// The whole wiring graph, writer by writer.
    pub fn connections(&self) -> impl Iterator<Item = (&EndpointId, &ConnectionGroup)> {
        self.connections.groups()
    }

    /// Wiring visible from one context: groups whose writer or any reader
    /// belongs to an entry running there.
    pub fn connections_for<'a>(
        &'a self,
        context: &'a str,
    ) -> impl Iterator<Item = (&'a EndpointId, &'a ConnectionGroup)> {
        self.connections.groups().filter(move |(writer, group)| {
            self.endpoint_in_context(writer, context)
                || group
                    .readers
                    .keys()
                    .any(|reader| self.endpoint_in_context(reader, context))
        })
    }

    fn endpoint_in_context(&self, endpoint: &EndpointId, context: &str) -> bool {
        self.components
            .get(&endpoint.instance)
            .is_some_and(|entry| entry.executors.contains(context))
    }

    /// Deterministic small-integer identities for interface-group entities:
    /// alphabetical by FQN, dense from zero.
    pub fn interface_ids(&self) -> IndexMap<Fqn, u32> {
        let mut fqns: Vec<Fqn> = self
            .symbols
            .iter_group(Group::INTERFACE)
            .map(|(fqn, _)| fqn.clone())
            .collect();
        fqns.sort();
        fqns.into_iter()
            .enumerate()
            .map(|(id, fqn)| (fqn, id as u32))
            .collect()
    }
}
