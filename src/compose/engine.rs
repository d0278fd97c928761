//! The composition engine: classifies expressions, expands their implicit
//! lifecycle dependencies and closes the graph into a [`CompositionView`].

use smol_str::SmolStr;
use tracing::{debug, trace};

use crate::base::{Fqn, Loc};
use crate::entity::builtins::{EXECUTOR_MARKER, PLATFORM_NAMESPACE};
use crate::entity::{
    Category, ContractKind, Entity, EntityKind, ExprState, Group, Lookup, Role,
};
use crate::error::{Error, Result};
use crate::symbols::{Resolver, SymbolTable};
use crate::tree::ExpressionBuilder;

use super::components::Components;
use super::connections::Connections;
use super::entry::EntryType;
use super::view::CompositionView;

/// Placeholder context assigned while no executor is known.
pub const DEFAULT_EXECUTOR: &str = "~default";

/// Accumulates closed unit tables and builds per-target composition views.
#[derive(Default)]
pub struct Composition {
    symbols: SymbolTable,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the public entries of a closed unit into the composition scope.
    pub fn add_unit(&mut self, unit: &SymbolTable) -> Result<()> {
        self.symbols.update(unit)
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Process every top-level composition expression for one target.
    ///
    /// Each build works on its own copy of the merged scope; nested
    /// composition bodies materialize as fresh entries per instance and per
    /// target.
    pub fn build(&self, target: Option<&str>) -> Result<CompositionView> {
        let engine = Engine {
            symbols: self.symbols.clone(),
            components: Components::new(),
            connections: Connections::new(),
            target: target.map(SmolStr::new),
        };
        engine.run()
    }
}

struct Engine {
    symbols: SymbolTable,
    components: Components,
    connections: Connections,
    target: Option<SmolStr>,
}

impl Engine {
    fn run(mut self) -> Result<CompositionView> {
        // Plan-level entries: composition-group expressions not owned by a
        // component; component bodies instantiate per instance instead.
        let plan: Vec<Entity> = self
            .symbols
            .iter_group(Group::COMPOSITION)
            .filter(|(fqn, entry)| {
                matches!(entry.entity.kind, EntityKind::Expression(_))
                    && self.symbols.ancestor_component(fqn).is_none()
            })
            .map(|(_, entry)| entry.entity.clone())
            .collect();
        debug!(entries = plan.len(), target = ?self.target, "composition start");
        // Plan entries resolve here, not at unit close, so they can reference
        // the active target. Resolve all of them up front; later entries may
        // be referenced by earlier ones.
        for expression in &plan {
            if let Some(fqn) = &expression.fqn {
                self.symbols.resolve_entity(fqn, self.target.as_deref())?;
            }
        }
        for expression in plan {
            self.add(expression, false, None)?;
        }
        self.close()
    }

    /// Register an expression, recursing into its dependencies.
    fn add(&mut self, expression: Entity, is_dep: bool, executor: Option<SmolStr>) -> Result<()> {
        if !matches!(expression.kind, EntityKind::Expression(_)) {
            return Err(Error::contract_violation(
                expression.loc,
                "only expressions can appear in a composition",
            ));
        }

        // Anonymous fragments contribute their dependencies and nothing else.
        let Some(fqn) = expression.fqn.clone() else {
            for dep in self.expression_dependencies(&expression)? {
                self.add(dep, true, executor.clone())?;
            }
            return Ok(());
        };

        self.symbols.resolve_entity(&fqn, self.target.as_deref())?;
        let expression = self.symbols.entity_resolved(&fqn, expression.loc)?;

        if expression.role().contains(Role::META) {
            self.process_meta(&expression)
        } else if expression.expression().and_then(|e| e.symbol()).is_some() {
            self.process_entry(expression, is_dep, executor)
        } else {
            Ok(())
        }
    }

    /// Meta expressions drive the engine itself; `connect` is the only one.
    fn process_meta(&mut self, expression: &Entity) -> Result<()> {
        let symbol = expression
            .expression()
            .and_then(|e| e.symbol())
            .ok_or_else(|| {
                Error::contract_violation(expression.loc, "a meta expression requires a symbol")
            })?;
        if symbol.fqn().map(Fqn::as_str) == Some("connect") {
            let args: Vec<Entity> = match expression.expression().map(|e| &e.state) {
                Some(ExprState::RValue { args, .. }) => {
                    args.iter().map(|bound| bound.value.clone()).collect()
                }
                _ => Vec::new(),
            };
            if args.len() != 2 {
                return Err(Error::connection(
                    expression.loc,
                    format!("connect takes exactly two endpoints, got {}", args.len()),
                ));
            }
            self.connections.add(&mut self.symbols, &args[0], &args[1])?;
            for arg in args {
                self.add(arg, true, None)?;
            }
            Ok(())
        } else {
            Err(Error::contract_violation(
                expression.loc,
                format!("unsupported meta expression '{symbol}'"),
            ))
        }
    }

    /// Classify one expression and register it with its lifecycle groups.
    fn process_entry(
        &mut self,
        expression: Entity,
        is_dep: bool,
        mut executor: Option<SmolStr>,
    ) -> Result<()> {
        let loc = expression.loc;
        let Some(fqn) = expression.fqn.clone() else {
            return Ok(());
        };
        let Some(underlying) = expression.underlying_type.clone() else {
            return Err(Error::contract_violation(
                loc,
                format!("'{fqn}' has no resolved type to classify"),
            ));
        };
        let type_entity = self.symbols.entity_resolved(&underlying, loc)?;

        let mut entry_type = match type_entity.category() {
            Category::Method => {
                if is_dep {
                    EntryType::SERVICE
                } else {
                    EntryType::WORKLOAD
                }
            }
            Category::Component | Category::Struct | Category::Enum | Category::Using => {
                if expression.name.is_none() {
                    return Err(Error::contract_violation(
                        loc,
                        "all registry expressions must have a name",
                    ));
                }
                EntryType::REGISTRY
            }
            // Builtins are available at all times and never materialize.
            Category::Builtin => return Ok(()),
            other => {
                return Err(Error::contract_violation(
                    loc,
                    format!("unsupported entry of category '{other}' within a composition"),
                ));
            }
        };

        if fqn.namespace().last().map(SmolStr::as_str) == Some(PLATFORM_NAMESPACE) {
            entry_type |= EntryType::PLATFORM;
        }
        if type_entity.parents.contains(&Fqn::new(EXECUTOR_MARKER)) {
            if type_entity.category() != Category::Component {
                return Err(Error::contract_violation(loc, "an executor must be a component"));
            }
            entry_type |= EntryType::EXECUTOR;
            executor = Some(SmolStr::new(fqn.as_str()));
        }

        // Top-level registry declarations wait until something depends on
        // them; workloads, platform objects and executors always materialize.
        let always = EntryType::WORKLOAD | EntryType::PLATFORM | EntryType::EXECUTOR;
        if !is_dep && !entry_type.intersects(always) {
            return Ok(());
        }

        let executor = match executor {
            Some(executor) => executor,
            None => self.assigned_executor(&expression, &fqn, loc)?,
        };

        let Some(identifier) =
            self.components
                .insert(expression.clone(), entry_type, Some(executor.clone()))?
        else {
            return Ok(());
        };
        trace!(identifier = %identifier, entry_type = %entry_type, "entry");

        // First-level dependencies; builtin-typed values are always available
        // and stay out of the ordering problem.
        for dep in self.expression_dependencies(&expression)? {
            if dep.fqn.as_ref() == Some(&fqn) {
                continue;
            }
            if let Some(entry) = self.components.get_mut(&identifier) {
                entry.deps.push(dep)?;
            }
        }

        self.attach_lifecycle(&identifier, &fqn, &underlying)?;
        self.attach_nested_composition(&identifier, &fqn, &underlying)?;

        // Everything the entry pulled in materializes under the same
        // executor.
        let implicit: Vec<Entity> = match self.components.get(&identifier) {
            Some(entry) => entry
                .deps
                .iter()
                .chain(entry.intra.iter())
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        for dependency in implicit {
            self.add(dependency, true, Some(executor.clone()))?;
        }
        Ok(())
    }

    /// The execution context requested through an `executor` contract, or
    /// the default placeholder.
    fn assigned_executor(&mut self, expression: &Entity, fqn: &Fqn, loc: Loc) -> Result<SmolStr> {
        let contracts = expression.effective_contracts(loc)?;
        let Some(contract) = contracts.get(ContractKind::Executor) else {
            return Ok(SmolStr::new(DEFAULT_EXECUTOR));
        };
        match contract.value() {
            Some(name) => {
                let mut resolver =
                    Resolver::new(&mut self.symbols, fqn.namespace()).with_target(self.target.clone());
                let chain = resolver.resolve_name(name, loc)?;
                match chain.last() {
                    Some(executor) => Ok(SmolStr::new(executor.as_str())),
                    None => Ok(SmolStr::new(DEFAULT_EXECUTOR)),
                }
            }
            // A bare executor contract claims the entry itself as context.
            None => Ok(SmolStr::new(fqn.as_str())),
        }
    }

    /// Expression dependencies that participate in the composition graph.
    fn expression_dependencies(&mut self, expression: &Entity) -> Result<Vec<Entity>> {
        let mut out = Vec::new();
        for dep_fqn in expression.dependencies() {
            let Ok(dep) = self.symbols.entity_resolved(&dep_fqn, expression.loc) else {
                continue;
            };
            if !matches!(dep.kind, EntityKind::Expression(_)) {
                continue;
            }
            if let Some(dep_type) = &dep.underlying_type {
                if let Ok(type_entity) = self.symbols.entity_resolved(dep_type, expression.loc) {
                    if type_entity.category() == Category::Builtin {
                        continue;
                    }
                }
            }
            out.push(dep);
        }
        Ok(out)
    }

    /// Interface members carrying init or shutdown contracts become synthetic
    /// `this`-qualified calls bound to the instance.
    fn attach_lifecycle(&mut self, identifier: &Fqn, instance: &Fqn, type_fqn: &Fqn) -> Result<()> {
        let members: Vec<Fqn> = self
            .symbols
            .children_of(type_fqn, Group::INTERFACE)
            .into_iter()
            .cloned()
            .collect();
        for member_fqn in members {
            let member = self.symbols.entity_resolved(&member_fqn, Loc::default())?;
            let is_init = member.contracts.has(ContractKind::Init);
            let is_shutdown = member.contracts.has(ContractKind::Shutdown);
            if !is_init && !is_shutdown {
                continue;
            }
            let Some(name) = member.name.clone() else {
                continue;
            };
            let element = ExpressionBuilder::new()
                .call(&format!("this.{name}"), [])
                .build();
            let call = Entity::from_element(&element, None)?;
            let created =
                self.instantiate(call, instance, member_fqn.namespace(), None)?;
            if let Some(entry) = self.components.get_mut(identifier) {
                if is_init {
                    entry.init.push(created)?;
                } else {
                    entry.shutdown.push(created)?;
                }
            }
        }
        Ok(())
    }

    /// Nested composition bodies of the instantiated type re-resolve with
    /// `this` bound to the instance and join its intra group.
    fn attach_nested_composition(
        &mut self,
        identifier: &Fqn,
        instance: &Fqn,
        type_fqn: &Fqn,
    ) -> Result<()> {
        let members: Vec<Fqn> = self
            .symbols
            .children_of(type_fqn, Group::COMPOSITION)
            .into_iter()
            .cloned()
            .collect();
        for member_fqn in members {
            let member = self.symbols.entity_resolved(&member_fqn, Loc::default())?;
            if !matches!(member.kind, EntityKind::Expression(_)) {
                continue;
            }
            let mut copy = member.clone();
            let name = copy.name.clone();
            copy.fqn = None;
            copy.reset_resolution();
            let created = self.instantiate(
                copy,
                instance,
                member_fqn.namespace(),
                name.as_deref(),
            )?;
            if let Some(entry) = self.components.get_mut(identifier) {
                entry.intra.push(created)?;
            }
        }
        Ok(())
    }

    /// Insert a synthesized expression under an instance and resolve it with
    /// `this` bound to that instance.
    fn instantiate(
        &mut self,
        entity: Entity,
        instance: &Fqn,
        resolve_namespace: Vec<SmolStr>,
        name: Option<&str>,
    ) -> Result<Entity> {
        let namespace: Vec<SmolStr> = instance.segments().map(SmolStr::new).collect();
        let fqn = self
            .symbols
            .insert(name, &namespace, entity, Group::COMPOSITION)?;
        let mut created = match self.symbols.entity_mut(&fqn) {
            Some(stored) => stored.clone(),
            None => {
                return Err(Error::UnresolvedSymbol {
                    name: SmolStr::new(fqn.as_str()),
                    loc: Loc::default(),
                    suggestions: Vec::new(),
                });
            }
        };
        let mut resolver = Resolver::new(&mut self.symbols, resolve_namespace)
            .with_this(Some(instance.clone()))
            .with_target(self.target.clone());
        created.resolve(&mut resolver)?;
        if let Some(stored) = self.symbols.entity_mut(&fqn) {
            *stored = created.clone();
        }
        Ok(created)
    }

    /// Close the graph: materialize recorder wirings, spread executors, and
    /// order the entries dependency-first.
    fn close(mut self) -> Result<CompositionView> {
        self.connections.close(&mut self.symbols)?;

        let executors: Vec<SmolStr> = self
            .components
            .iter()
            .filter(|(_, entry)| entry.entry_type.contains(EntryType::EXECUTOR))
            .map(|(fqn, _)| SmolStr::new(fqn.as_str()))
            .collect();

        // Platform objects serve every context.
        let platform_ids: Vec<Fqn> = self
            .components
            .iter()
            .filter(|(_, entry)| entry.entry_type.contains(EntryType::PLATFORM))
            .map(|(fqn, _)| fqn.clone())
            .collect();
        for platform in &platform_ids {
            for id in self.components.dependency_closure(platform) {
                if let Some(entry) = self.components.get_mut(&id) {
                    entry.executors.extend(executors.iter().cloned());
                }
            }
        }

        // Entries still on the placeholder take the sole executor; several
        // executors make the placeholder ambiguous.
        let ids: Vec<Fqn> = self.components.iter().map(|(fqn, _)| fqn.clone()).collect();
        for id in ids {
            let Some(entry) = self.components.get_mut(&id) else {
                continue;
            };
            let only_default =
                entry.executors.len() == 1 && entry.executors.contains(DEFAULT_EXECUTOR);
            if !only_default {
                continue;
            }
            match executors.len() {
                0 => {}
                1 => {
                    entry.executors.clear();
                    entry.executors.insert(executors[0].clone());
                }
                _ => {
                    return Err(Error::contract_violation(
                        entry.loc(),
                        format!(
                            "no executor is assigned to this expression on a multi-executor ({}) composition",
                            executors
                                .iter()
                                .map(SmolStr::as_str)
                                .collect::<Vec<_>>()
                                .join(", ")
                        ),
                    ));
                }
            }
        }

        self.components.close()?;
        debug!(entries = self.components.len(), "composition closed");

        let mut contexts: Vec<SmolStr> = if executors.is_empty() {
            vec![SmolStr::new(DEFAULT_EXECUTOR)]
        } else {
            executors
        };
        contexts.sort();
        Ok(CompositionView::new(
            self.symbols,
            self.components,
            self.connections,
            contexts,
        ))
    }
}
