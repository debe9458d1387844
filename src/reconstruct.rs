//! Reconstructor
//!
//! Rebuilds a live graph from its flattened form. Variables come first, then
//! identifiers inside the records are replaced by live handles until the root
//! can be constructed or the sweep bound is reached.
//!
//! A record that is being built is evicted from the working set while its
//! dependencies are resolved, so an edge back to an ancestor stays
//! unresolved. Mutually referencing records therefore end in
//! [`PersistError::UnresolvedCycle`], which carries everything that could be
//! built.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{PersistError, Result};
use crate::graph::{Annotations, Attribute, ObjectGraph, ObjectId, Structure, Trust, VariableId};
use crate::identifier::Identifier;
use crate::pool::variables::check_key;
use crate::pool::{Flattened, StructureRecord, VariablePool};
use crate::registry::ClassRegistry;

/// When to stop sweeping over unresolved records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Exactly one retry after the first sweep.
    TwoSweep,
    /// Sweep again only while a sweep lowers the number of unresolved references.
    #[default]
    Fixpoint,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionStrategy::TwoSweep => f.write_str("two_sweep"),
            ResolutionStrategy::Fixpoint => f.write_str("fixpoint"),
        }
    }
}

impl FromStr for ResolutionStrategy {
    type Err = PersistError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "two_sweep" | "twosweep" => Ok(ResolutionStrategy::TwoSweep),
            "fixpoint" => Ok(ResolutionStrategy::Fixpoint),
            other => Err(PersistError::malformed(format!("unknown resolution strategy '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    VariablesPending,
    VariablesResolved,
    RecordsPartiallyResolved,
    RecordsResolved,
    GaveUp,
}

/// A successfully rebuilt graph.
#[derive(Debug)]
pub struct Reconstructed {
    pub graph: ObjectGraph,
    pub root: ObjectId,
    /// Every constructed record, root included.
    pub objects: BTreeMap<Identifier, ObjectId>,
    pub variables: VariablePool,
}

impl Reconstructed {
    pub fn object(&self, id: Identifier) -> Option<ObjectId> {
        self.objects.get(&id).copied()
    }

    pub fn variable(&self, id: Identifier) -> Option<VariableId> {
        self.variables.get(id)
    }
}

/// What was rebuilt before the resolver gave up.
#[derive(Debug)]
pub struct PartialReconstruction {
    pub graph: ObjectGraph,
    pub root: Identifier,
    pub built: BTreeMap<Identifier, ObjectId>,
    pub variables: VariablePool,
    /// Unbuilt record to the identifiers it still waits for.
    pub unresolved: BTreeMap<Identifier, BTreeSet<Identifier>>,
    pub sweeps: usize,
    pub strategy: ResolutionStrategy,
}

pub struct Reconstructor<'r> {
    registry: &'r ClassRegistry,
    trust: Trust,
    strategy: ResolutionStrategy,
    phase: Phase,
}

impl<'r> Reconstructor<'r> {
    pub fn new(registry: &'r ClassRegistry, trust: Trust) -> Self {
        Self { registry, trust, strategy: ResolutionStrategy::default(), phase: Phase::VariablesPending }
    }

    pub fn with_strategy(mut self, strategy: ResolutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> ResolutionStrategy {
        self.strategy
    }

    /// State reached by the last call to [`Reconstructor::reconstruct`].
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn reconstruct(&mut self, flattened: &Flattened) -> Result<Reconstructed> {
        self.phase = Phase::VariablesPending;
        self.trust.require(flattened.functions.len())?;
        self.validate(flattened)?;

        let mut graph = ObjectGraph::new();
        let variables =
            VariablePool::from_persisted(&flattened.variables, &flattened.functions, self.trust, &mut graph)?;
        self.phase = Phase::VariablesResolved;
        info!("Phase {:?}: {} variable(s) live", self.phase, variables.len());

        let root_id = flattened.root.unique_id;
        let mut resolver = Resolver {
            registry: self.registry,
            root: root_id,
            work: BTreeMap::new(),
            built: BTreeMap::new(),
            in_progress: BTreeSet::new(),
            failed: BTreeSet::new(),
            graph,
        };
        for record in std::iter::once(&flattened.root).chain(flattened.records.values()) {
            resolver.work.insert(record.unique_id, WorkRecord::new(record, &variables));
        }

        let ready: Vec<Identifier> = resolver
            .work
            .iter()
            .filter(|(id, record)| **id != root_id && record.pending().is_empty())
            .map(|(id, _)| *id)
            .collect();
        for id in ready {
            resolver.construct(id)?;
        }
        debug!("Constructed {} identifier-free record(s) up front", resolver.built.len());

        let mut sweeps = 0;
        let mut before = resolver.remaining();
        loop {
            sweeps += 1;
            self.phase = Phase::RecordsPartiallyResolved;
            resolver.failed.clear();
            let ids: Vec<Identifier> = resolver.work.keys().copied().filter(|id| *id != root_id).collect();
            for id in ids {
                resolver.resolve(id)?;
            }
            if resolver.resolve(root_id)? {
                break;
            }

            let after = resolver.remaining();
            info!("Sweep {} left {} unresolved reference(s)", sweeps, after);
            let give_up = match self.strategy {
                ResolutionStrategy::TwoSweep => sweeps >= 2,
                ResolutionStrategy::Fixpoint => after >= before,
            };
            if give_up {
                self.phase = Phase::GaveUp;
                warn!(
                    "Giving up after {} sweep(s) ({}): {} record(s) unresolved",
                    sweeps,
                    self.strategy,
                    resolver.work.len()
                );
                let unresolved = resolver.unresolved();
                return Err(PersistError::UnresolvedCycle(Box::new(PartialReconstruction {
                    graph: resolver.graph,
                    root: root_id,
                    built: resolver.built,
                    variables,
                    unresolved,
                    sweeps,
                    strategy: self.strategy,
                })));
            }
            before = after;
        }

        self.phase = Phase::RecordsResolved;
        if !resolver.work.is_empty() {
            warn!(
                "{} record(s) unreachable from the root could not be built: {:?}",
                resolver.work.len(),
                resolver.work.keys().collect::<Vec<_>>()
            );
        }
        let root = resolver.built[&root_id];
        info!(
            "Phase {:?} after {} sweep(s): {} object(s) built",
            self.phase,
            sweeps,
            resolver.built.len()
        );
        Ok(Reconstructed { graph: resolver.graph, root, objects: resolver.built, variables })
    }

    /// Reject anything that would fail halfway through, before the graph is touched.
    fn validate(&self, flattened: &Flattened) -> Result<()> {
        let root = &flattened.root;
        let mut owner: BTreeMap<Identifier, &'static str> = BTreeMap::from([(root.unique_id, "root")]);

        for (key, record) in &flattened.records {
            check_key(*key, record.unique_id, "records")?;
            if owner.insert(*key, "records").is_some() {
                return Err(PersistError::IdentifierCollision(*key));
            }
        }
        for (key, record) in &flattened.variables {
            check_key(*key, record.unique_id, "variable")?;
            if owner.insert(*key, "variables").is_some() {
                return Err(PersistError::IdentifierCollision(*key));
            }
        }
        for (key, record) in &flattened.functions {
            check_key(*key, record.unique_id, "function")?;
            if owner.insert(*key, "functions").is_some() {
                return Err(PersistError::IdentifierCollision(*key));
            }
        }

        for record in std::iter::once(root).chain(flattened.records.values()) {
            if !self.registry.contains(&record.kind) {
                return Err(PersistError::UnknownTag { tag: record.kind.clone(), record: Some(record.unique_id) });
            }
            for reference in record.references() {
                match owner.get(&reference) {
                    Some(&"root") | Some(&"records") | Some(&"variables") => {}
                    _ => {
                        return Err(PersistError::DanglingReference { record: record.unique_id, reference });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Attribute value while references are being resolved.
#[derive(Debug, Clone)]
enum Slot {
    Scalar(Value),
    Pending(Identifier),
    Variable(VariableId),
    Object(ObjectId),
    List(Vec<Slot>),
    Map(BTreeMap<String, Slot>),
}

impl Slot {
    /// Arrays and objects always come back as lists and maps, matching
    /// [`Attribute::from_value`] on the live side.
    fn from_value(value: &Value, variables: &VariablePool) -> Self {
        if let Some(id) = Identifier::from_value(value) {
            return match variables.get(id) {
                Some(variable) => Slot::Variable(variable),
                None => Slot::Pending(id),
            };
        }
        match value {
            Value::Array(items) => Slot::List(items.iter().map(|item| Slot::from_value(item, variables)).collect()),
            Value::Object(entries) => Slot::Map(
                entries
                    .iter()
                    .map(|(key, item)| (key.clone(), Slot::from_value(item, variables)))
                    .collect(),
            ),
            other => Slot::Scalar(other.clone()),
        }
    }

    fn pending(&self, out: &mut Vec<Identifier>) {
        match self {
            Slot::Pending(id) => out.push(*id),
            Slot::List(items) => items.iter().for_each(|item| item.pending(out)),
            Slot::Map(entries) => entries.values().for_each(|item| item.pending(out)),
            _ => {}
        }
    }

    fn substitute(&mut self, built: &BTreeMap<Identifier, ObjectId>) {
        match self {
            Slot::Pending(id) => {
                if let Some(object) = built.get(id) {
                    *self = Slot::Object(*object);
                }
            }
            Slot::List(items) => items.iter_mut().for_each(|item| item.substitute(built)),
            Slot::Map(entries) => entries.values_mut().for_each(|item| item.substitute(built)),
            _ => {}
        }
    }

    fn into_attribute(self) -> Attribute {
        match self {
            Slot::Scalar(value) => Attribute::Scalar(value),
            Slot::Pending(id) => Attribute::Scalar(id.to_value()),
            Slot::Variable(id) => Attribute::Variable(id),
            Slot::Object(id) => Attribute::Object(id),
            Slot::List(items) => Attribute::List(items.into_iter().map(Slot::into_attribute).collect()),
            Slot::Map(entries) => {
                Attribute::Map(entries.into_iter().map(|(k, v)| (k, v.into_attribute())).collect())
            }
        }
    }
}

struct WorkRecord {
    kind: String,
    name: String,
    annotations: Annotations,
    slots: BTreeMap<String, Slot>,
}

impl WorkRecord {
    fn new(record: &StructureRecord, variables: &VariablePool) -> Self {
        Self {
            kind: record.kind.clone(),
            name: record.name.clone(),
            annotations: record.annotations.clone(),
            slots: record
                .structure
                .iter()
                .map(|(key, value)| (key.clone(), Slot::from_value(value, variables)))
                .collect(),
        }
    }

    fn pending(&self) -> Vec<Identifier> {
        let mut out = Vec::new();
        self.slots.values().for_each(|slot| slot.pending(&mut out));
        out
    }
}

struct Resolver<'a> {
    registry: &'a ClassRegistry,
    root: Identifier,
    work: BTreeMap<Identifier, WorkRecord>,
    built: BTreeMap<Identifier, ObjectId>,
    in_progress: BTreeSet<Identifier>,
    failed: BTreeSet<Identifier>,
    graph: ObjectGraph,
}

impl Resolver<'_> {
    /// Build `id` and, first, everything it depends on. `false` means some
    /// dependency is still out of reach in this sweep.
    fn resolve(&mut self, id: Identifier) -> Result<bool> {
        if self.built.contains_key(&id) {
            return Ok(true);
        }
        if self.in_progress.contains(&id) || self.failed.contains(&id) {
            return Ok(false);
        }
        let Some(record) = self.work.get(&id) else {
            return Ok(false);
        };

        let dependencies = record.pending();
        self.in_progress.insert(id);
        for dependency in dependencies {
            // the root is only ever built last
            if dependency != self.root {
                self.resolve(dependency)?;
            }
        }
        self.in_progress.remove(&id);

        let Some(record) = self.work.get_mut(&id) else {
            return Ok(false);
        };
        record.slots.values_mut().for_each(|slot| slot.substitute(&self.built));
        if record.pending().is_empty() {
            self.construct(id)?;
            Ok(true)
        } else {
            self.failed.insert(id);
            Ok(false)
        }
    }

    fn construct(&mut self, id: Identifier) -> Result<ObjectId> {
        let record = self
            .work
            .remove(&id)
            .ok_or_else(|| PersistError::malformed(format!("record {id} is not pending construction")))?;
        let structure: Structure = record.slots.into_iter().map(|(k, slot)| (k, slot.into_attribute())).collect();
        let object = self
            .registry
            .construct(&record.kind, record.annotations, structure, &record.name)
            .map_err(|source| PersistError::Construction {
                kind: record.kind.clone(),
                record: id,
                source: Box::new(source),
            })?;
        let handle = self.graph.insert_object(object);
        debug!("Constructed {} '{}' from record {}", record.kind, record.name, id);
        self.built.insert(id, handle);
        Ok(handle)
    }

    /// References still waiting for a record to be built.
    fn remaining(&self) -> usize {
        self.work
            .values()
            .map(|record| record.pending().iter().filter(|r| !self.built.contains_key(r)).count())
            .sum()
    }

    fn unresolved(&self) -> BTreeMap<Identifier, BTreeSet<Identifier>> {
        self.work
            .iter()
            .map(|(id, record)| {
                let waiting = record.pending().into_iter().filter(|r| !self.built.contains_key(r)).collect();
                (*id, waiting)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{FunctionPoolData, FunctionRecord, StateRecord, VariablePoolData, VariableRecord};
    use crate::registry::Constructible;
    use serde_json::json;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Node {
        name: String,
        structure: Structure,
    }

    impl crate::graph::Persistable for Node {
        fn kind(&self) -> &str {
            "node"
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn structure(&self) -> Structure {
            self.structure.clone()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    impl Constructible for Node {
        fn construct(_: Annotations, structure: Structure, name: &str) -> Result<Self> {
            Ok(Node { name: name.to_string(), structure })
        }
    }

    fn registry() -> ClassRegistry {
        let mut registry = ClassRegistry::new();
        registry.register_type::<Node>("node");
        registry
    }

    fn trusted() -> Trust {
        Trust::new(true, true)
    }

    fn node(name: &str, structure: Vec<(&str, Value)>) -> StructureRecord {
        StructureRecord {
            unique_id: Identifier::generate(),
            kind: "node".to_string(),
            name: name.to_string(),
            annotations: Annotations::new(),
            structure: structure.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    fn flattened(root: StructureRecord, records: Vec<StructureRecord>) -> Flattened {
        Flattened {
            root,
            records: records.into_iter().map(|r| (r.unique_id, r)).collect(),
            variables: VariablePoolData::new(),
            functions: FunctionPoolData::new(),
        }
    }

    fn mutual_cycle() -> (Flattened, Identifier, Identifier) {
        let mut a = node("a", vec![]);
        let b = node("b", vec![("peer", a.unique_id.to_value())]);
        a.structure.insert("peer".to_string(), b.unique_id.to_value());
        let root = node("root", vec![("a", a.unique_id.to_value())]);
        let (a_id, b_id) = (a.unique_id, b.unique_id);
        (flattened(root, vec![a, b]), a_id, b_id)
    }

    #[test]
    fn test_forward_references_resolve_and_root_is_last() {
        let leaf = node("leaf", vec![("value", json!(3))]);
        let middle = node("middle", vec![("leaf", leaf.unique_id.to_value())]);
        let root = node(
            "root",
            vec![("items", json!([middle.unique_id.to_string(), leaf.unique_id.to_string(), 4]))],
        );
        let input = flattened(root, vec![middle, leaf]);
        let registry = registry();
        let mut reconstructor = Reconstructor::new(&registry, trusted());
        let rebuilt = reconstructor.reconstruct(&input).unwrap();

        assert_eq!(reconstructor.phase(), Phase::RecordsResolved);
        assert_eq!(rebuilt.objects.len(), 3);
        assert_eq!(rebuilt.objects.values().max(), Some(&rebuilt.root));

        let root = rebuilt.graph.downcast::<Node>(rebuilt.root).unwrap().unwrap();
        let items = root.structure["items"].as_list().unwrap();
        let middle = items[0].as_object().unwrap();
        let leaf = items[1].as_object().unwrap();
        assert_eq!(items[2], Attribute::scalar(4));
        let middle_node = rebuilt.graph.downcast::<Node>(middle).unwrap().unwrap();
        assert_eq!(middle_node.structure["leaf"], Attribute::Object(leaf));
    }

    #[test]
    fn test_mutual_references_give_up_under_both_strategies() {
        let (input, a, b) = mutual_cycle();
        let registry = registry();

        for (strategy, expected_sweeps) in [(ResolutionStrategy::TwoSweep, 2), (ResolutionStrategy::Fixpoint, 1)] {
            let mut reconstructor = Reconstructor::new(&registry, trusted()).with_strategy(strategy);
            let err = reconstructor.reconstruct(&input).unwrap_err();
            assert_eq!(reconstructor.phase(), Phase::GaveUp);
            let partial = err.partial().expect("give-up carries the partial graph");
            assert_eq!(partial.sweeps, expected_sweeps, "{strategy}");
            assert_eq!(partial.strategy, strategy);
            assert_eq!(partial.unresolved[&a], BTreeSet::from([b]));
            assert_eq!(partial.unresolved[&b], BTreeSet::from([a]));
            assert!(partial.unresolved.contains_key(&input.root.unique_id));
            assert!(partial.built.is_empty());
        }
    }

    #[test]
    fn test_partial_keeps_what_could_be_built() {
        let (mut input, _, _) = mutual_cycle();
        let side = node("side", vec![("x", json!(1))]);
        input.root.structure.insert("side".to_string(), side.unique_id.to_value());
        let side_id = side.unique_id;
        input.records.insert(side_id, side);

        let registry = registry();
        let err = Reconstructor::new(&registry, trusted()).reconstruct(&input).unwrap_err();
        let partial = err.partial().unwrap();
        assert!(partial.built.contains_key(&side_id));
        assert_eq!(partial.graph.object_count(), 1);
    }

    #[test]
    fn test_self_reference_gives_up() {
        let mut selfish = node("selfish", vec![]);
        selfish.structure.insert("me".to_string(), selfish.unique_id.to_value());
        let root = node("root", vec![("child", selfish.unique_id.to_value())]);
        let input = flattened(root, vec![selfish]);
        let registry = registry();
        let err = Reconstructor::new(&registry, trusted()).reconstruct(&input).unwrap_err();
        assert!(matches!(err, PersistError::UnresolvedCycle(_)));
    }

    #[test]
    fn test_unknown_tag_stops_before_any_constructor() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = ClassRegistry::new();
        registry.register("node", move |annotations, structure, name| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Node::construct(annotations, structure, name)?) as Box<dyn crate::graph::Persistable>)
        });

        let mut stranger = node("stranger", vec![]);
        stranger.kind = "shape_Unheard".to_string();
        let stranger_id = stranger.unique_id;
        let plain = node("plain", vec![]);
        let root = node("root", vec![("s", stranger_id.to_value()), ("p", plain.unique_id.to_value())]);
        let input = flattened(root, vec![stranger, plain]);

        let err = Reconstructor::new(&registry, trusted()).reconstruct(&input).unwrap_err();
        match err {
            PersistError::UnknownTag { tag, record } => {
                assert_eq!(tag, "shape_Unheard");
                assert_eq!(record, Some(stranger_id));
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dangling_reference() {
        let missing = Identifier::generate();
        let root = node("root", vec![("x", missing.to_value())]);
        let root_id = root.unique_id;
        let registry = registry();
        let err = Reconstructor::new(&registry, trusted()).reconstruct(&flattened(root, vec![])).unwrap_err();
        assert!(matches!(
            err,
            PersistError::DanglingReference { record, reference } if record == root_id && reference == missing
        ));
    }

    #[test]
    fn test_identifier_collision_across_pools() {
        let shared = node("shared", vec![]);
        let root = node("root", vec![]);
        let mut input = flattened(root, vec![shared.clone()]);
        input.variables.insert(
            shared.unique_id,
            VariableRecord {
                unique_id: shared.unique_id,
                name: "v".to_string(),
                state: StateRecord::Fixed { value: json!(1) },
                transform: None,
            },
        );
        let registry = registry();
        let err = Reconstructor::new(&registry, trusted()).reconstruct(&input).unwrap_err();
        assert!(matches!(err, PersistError::IdentifierCollision(id) if id == shared.unique_id));
    }

    #[test]
    fn test_record_key_mismatch() {
        let child = node("child", vec![]);
        let root = node("root", vec![]);
        let mut input = flattened(root, vec![]);
        input.records.insert(Identifier::generate(), child);
        let registry = registry();
        assert!(matches!(
            Reconstructor::new(&registry, trusted()).reconstruct(&input),
            Err(PersistError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_untrusted_payload_refused_first() {
        let function = FunctionRecord {
            unique_id: Identifier::generate(),
            name: "f".to_string(),
            source: "f(x) = x".to_string(),
            globals: BTreeMap::new(),
            functions: vec!["f".to_string()],
        };
        let mut stranger = node("root", vec![]);
        stranger.kind = "unregistered".to_string();
        let mut input = flattened(stranger, vec![]);
        input.functions.insert(function.unique_id, function);

        let registry = registry();
        let mut reconstructor = Reconstructor::new(&registry, Trust::new(false, true));
        let err = reconstructor.reconstruct(&input).unwrap_err();
        assert!(matches!(err, PersistError::UntrustedSource { .. }));
        assert_eq!(reconstructor.phase(), Phase::VariablesPending);
    }

    #[test]
    fn test_constructor_failure_names_the_record() {
        let mut registry = ClassRegistry::new();
        registry.register("node", |_, structure, _| {
            if structure.contains_key("bad") {
                Err(PersistError::InvalidAttribute {
                    kind: "node".to_string(),
                    attribute: "bad".to_string(),
                    reason: "rejected".to_string(),
                })
            } else {
                Ok(Box::new(Node { name: String::new(), structure }) as Box<dyn crate::graph::Persistable>)
            }
        });
        let bad = node("bad", vec![("bad", json!(true))]);
        let bad_id = bad.unique_id;
        let root = node("root", vec![("child", bad_id.to_value())]);
        let err = Reconstructor::new(&registry, trusted())
            .reconstruct(&flattened(root, vec![bad]))
            .unwrap_err();
        assert!(matches!(err, PersistError::Construction { record, .. } if record == bad_id));
    }

    #[test]
    fn test_variables_are_substituted_everywhere() {
        let var_id = Identifier::generate();
        let child = node("child", vec![("c", var_id.to_value())]);
        let root = node("root", vec![("a", var_id.to_value()), ("b", child.unique_id.to_value())]);
        let mut input = flattened(root, vec![child]);
        input.variables.insert(
            var_id,
            VariableRecord {
                unique_id: var_id,
                name: "x".to_string(),
                state: StateRecord::Variable { value: json!(0.25) },
                transform: None,
            },
        );
        let registry = registry();
        let rebuilt = Reconstructor::new(&registry, Trust::new(false, false)).reconstruct(&input).unwrap();
        let root = rebuilt.graph.downcast::<Node>(rebuilt.root).unwrap().unwrap();
        let child = rebuilt.graph.downcast::<Node>(root.structure["b"].as_object().unwrap()).unwrap().unwrap();
        assert_eq!(root.structure["a"], child.structure["c"]);
        assert_eq!(root.structure["a"].as_variable(), rebuilt.variable(var_id));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("two-sweep".parse::<ResolutionStrategy>().unwrap(), ResolutionStrategy::TwoSweep);
        assert_eq!(" Fixpoint ".parse::<ResolutionStrategy>().unwrap(), ResolutionStrategy::Fixpoint);
        assert!("forever".parse::<ResolutionStrategy>().is_err());
        assert_eq!(ResolutionStrategy::default(), ResolutionStrategy::Fixpoint);
    }
}
