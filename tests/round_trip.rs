//! Round-trip Suite
//!
//! Live graph -> document -> live graph for optical systems built from the
//! stock entities, checked through the identifier-free canonical form.

use std::collections::{BTreeMap, BTreeSet};

use optic_persist::entities::{
    add_element, circular_aperture, conic, constant_index_glass, local_coordinates, optical_element,
    optical_system, surface, Placement,
};
use optic_persist::storage::{from_str, to_string};
use optic_persist::{
    Attribute, ClassRegistry, Entity, EntityKind, Flattener, Format, ObjectGraph, ObjectId, Reconstructor, Trust,
    Variable,
};

fn singlet(graph: &mut ObjectGraph) -> ObjectId {
    let global = local_coordinates(graph, "global", Placement::default());
    let front = local_coordinates(graph, "front", Placement::along_axis(10.0));
    let back = local_coordinates(graph, "back", Placement::along_axis(14.0));

    let air = constant_index_glass(graph, global, 1.0, "air");
    let glass = constant_index_glass(graph, front, 1.5168, "N-BK7");

    let front_shape = conic(graph, front, 0.02, 0.0);
    let front_stop = circular_aperture(graph, front, 12.5);
    let s1 = surface(graph, "front", front, front_shape, front_stop);
    let back_shape = conic(graph, back, -0.01, -1.2);
    let back_stop = circular_aperture(graph, back, 12.5);
    let s2 = surface(graph, "back", back, back_shape, back_stop);

    let lens = optical_element(graph, "lens", global, &[("s1", s1), ("s2", s2)], &[("glass", glass)]);
    let system = optical_system(graph, "singlet", global, air);
    add_element(graph, system, "lens", lens).unwrap();
    system
}

#[test]
fn test_round_trip_preserves_shape_in_both_formats() {
    let mut graph = ObjectGraph::new();
    let root = singlet(&mut graph);
    let registry = ClassRegistry::with_builtins();
    let original = Flattener::new().flatten(&graph, root).unwrap();

    for format in [Format::Json, Format::Yaml] {
        let text = to_string(&original, format, true).unwrap();
        let parsed = from_str(&text, format).unwrap();
        let rebuilt = Reconstructor::new(&registry, Trust::new(false, false)).reconstruct(&parsed).unwrap();

        assert_eq!(rebuilt.graph.object_count(), graph.object_count(), "{format}");
        assert_eq!(rebuilt.graph.variable_count(), graph.variable_count(), "{format}");

        let again = Flattener::new().flatten(&rebuilt.graph, rebuilt.root).unwrap();
        assert_eq!(again.canonical(), original.canonical(), "{format}");
    }
}

#[test]
fn test_flatten_twice_gives_same_canonical_form() {
    let mut graph = ObjectGraph::new();
    let root = singlet(&mut graph);
    let first = Flattener::new().flatten(&graph, root).unwrap();
    let second = Flattener::new().flatten(&graph, root).unwrap();

    assert_eq!(first.records.len(), second.records.len());
    assert_eq!(first.variables.len(), second.variables.len());
    assert_eq!(first.canonical(), second.canonical());
    assert_ne!(first.root.unique_id, second.root.unique_id);
}

#[test]
fn test_identifiers_unique_across_pools() {
    let mut graph = ObjectGraph::new();
    let root = singlet(&mut graph);
    let flattened = Flattener::new().flatten(&graph, root).unwrap();

    let mut all = BTreeSet::from([flattened.root.unique_id]);
    all.extend(flattened.records.keys().copied());
    all.extend(flattened.variables.keys().copied());
    all.extend(flattened.functions.keys().copied());
    assert_eq!(all.len(), flattened.identifier_count());
}

#[test]
fn test_shared_objects_rebuilt_once() {
    let mut graph = ObjectGraph::new();
    let root = singlet(&mut graph);
    let flattened = Flattener::new().flatten(&graph, root).unwrap();
    let registry = ClassRegistry::with_builtins();
    let rebuilt = Reconstructor::new(&registry, Trust::new(false, false)).reconstruct(&flattened).unwrap();

    let system = rebuilt.graph.downcast::<Entity>(rebuilt.root).unwrap().unwrap();
    let global = system.attribute("rootcoordinatesystem").and_then(Attribute::as_object).unwrap();
    let background = system.attribute("material_background").and_then(Attribute::as_object).unwrap();
    let air = rebuilt.graph.downcast::<Entity>(background).unwrap().unwrap();
    assert_eq!(air.attribute("lc").and_then(Attribute::as_object), Some(global));

    let lens_id = system
        .attribute("elements")
        .and_then(Attribute::as_map)
        .and_then(|m| m.get("lens"))
        .and_then(Attribute::as_object)
        .unwrap();
    let lens = rebuilt.graph.downcast::<Entity>(lens_id).unwrap().unwrap();
    assert_eq!(lens.attribute("rootcoordinatesystem").and_then(Attribute::as_object), Some(global));

    let surfaces = lens.attribute("surfaces").and_then(Attribute::as_map).unwrap();
    let s1 = rebuilt.graph.downcast::<Entity>(surfaces["s1"].as_object().unwrap()).unwrap().unwrap();
    let lc = s1.attribute("lc").and_then(Attribute::as_object).unwrap();
    let shape_id = s1.attribute("shape").and_then(Attribute::as_object).unwrap();
    let shape = rebuilt.graph.downcast::<Entity>(shape_id).unwrap().unwrap();
    assert_eq!(shape.entity_kind(), EntityKind::Conic);
    assert_eq!(shape.attribute("lc").and_then(Attribute::as_object), Some(lc));
}

#[test]
fn test_plain_containers_keep_their_live_shape() {
    let mut graph = ObjectGraph::new();
    let global = local_coordinates(&mut graph, "global", Placement::default());
    let air = constant_index_glass(&mut graph, global, 1.0, "air");
    let system = optical_system(&mut graph, "empty", global, air);
    let weights = Attribute::List(vec![Attribute::scalar(0.25), Attribute::scalar(0.75)]);
    let settings = Attribute::scalar(serde_json::json!({"units": "mm", "wavelengths": [486.1, 587.6]}));
    {
        let entity = graph.downcast_mut::<Entity>(system).unwrap().unwrap();
        entity.set_attribute("weights", weights.clone());
        entity.set_attribute("settings", settings.clone());
    }

    let flattened = Flattener::new().flatten(&graph, system).unwrap();
    let text = to_string(&flattened, Format::Json, false).unwrap();
    let parsed = from_str(&text, Format::Json).unwrap();
    let registry = ClassRegistry::with_builtins();
    let rebuilt = Reconstructor::new(&registry, Trust::new(false, false)).reconstruct(&parsed).unwrap();

    let before = graph.downcast::<Entity>(system).unwrap().unwrap();
    let after = rebuilt.graph.downcast::<Entity>(rebuilt.root).unwrap().unwrap();
    assert_eq!(after.attribute("elements"), Some(&Attribute::Map(BTreeMap::new())));
    for name in ["elements", "weights", "settings"] {
        assert_eq!(after.attribute(name), before.attribute(name), "{name}");
    }
    assert_eq!(after.attribute("weights"), Some(&weights));
    let settings = after.attribute("settings").and_then(Attribute::as_map).unwrap();
    assert_eq!(settings["wavelengths"].as_list().map(<[Attribute]>::len), Some(2));
}

#[test]
fn test_variable_shared_between_parent_and_child() {
    let mut graph = ObjectGraph::new();
    let x = graph.add_variable(Variable::free("VarX", 0.5));
    let lc = local_coordinates(&mut graph, "frame", Placement::default());
    let child = graph.add_object(
        Entity::new(EntityKind::Aperture, "Child")
            .with("lc", Attribute::Object(lc))
            .with("c", Attribute::Variable(x)),
    );
    let root = graph.add_object(
        Entity::new(EntityKind::OpticalElement, "root")
            .with("rootcoordinatesystem", Attribute::Object(lc))
            .with("a", Attribute::Variable(x))
            .with("b", Attribute::Object(child)),
    );

    let flattened = Flattener::new().flatten(&graph, root).unwrap();
    // six placement variables of the frame plus VarX; two records besides the root
    assert_eq!(flattened.variables.len(), 7);
    assert_eq!(flattened.records.len(), 2);

    let registry = ClassRegistry::with_builtins();
    let rebuilt = Reconstructor::new(&registry, Trust::new(false, false)).reconstruct(&flattened).unwrap();
    let root = rebuilt.graph.downcast::<Entity>(rebuilt.root).unwrap().unwrap();
    let a = root.attribute("a").and_then(Attribute::as_variable).unwrap();
    let child_id = root.attribute("b").and_then(Attribute::as_object).unwrap();
    let child = rebuilt.graph.downcast::<Entity>(child_id).unwrap().unwrap();
    assert_eq!(child.attribute("c").and_then(Attribute::as_variable), Some(a));
    assert_eq!(rebuilt.graph.variable(a).unwrap().name(), "VarX");
    assert!(rebuilt.graph.variable(a).unwrap().is_free());
}

#[test]
fn test_minimal_scenario_pool_sizes() {
    let mut graph = ObjectGraph::new();
    let x = graph.add_variable(Variable::fixed("VarX", 1.0));
    let child = graph.add_object(Entity::new(EntityKind::OpticalElement, "Child").with("c", Attribute::Variable(x)));
    let root = graph.add_object(
        Entity::new(EntityKind::OpticalSystem, "Root")
            .with("a", Attribute::Variable(x))
            .with("b", Attribute::Object(child)),
    );
    let flattened = Flattener::new().flatten(&graph, root).unwrap();
    assert_eq!(flattened.variables.len(), 1);
    assert_eq!(flattened.records.len(), 1);
    let var_id = *flattened.variables.keys().next().unwrap();
    assert_eq!(flattened.root.structure["a"], var_id.to_value());
}
