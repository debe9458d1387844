//! Helpers assembling the usual optical sub-graphs.

use std::collections::BTreeMap;

use crate::error::{PersistError, Result};
use crate::graph::{Attribute, ObjectGraph, ObjectId, Variable};

use super::{Entity, EntityKind};

/// Decenter and tilt of a coordinate frame relative to its parent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Placement {
    pub decx: f64,
    pub decy: f64,
    pub decz: f64,
    pub tiltx: f64,
    pub tilty: f64,
    pub tiltz: f64,
}

impl Placement {
    pub fn along_axis(decz: f64) -> Self {
        Self { decz, ..Self::default() }
    }
}

/// Coordinate frame with six fixed placement variables.
pub fn local_coordinates(graph: &mut ObjectGraph, name: &str, placement: Placement) -> ObjectId {
    let values = [
        ("decx", placement.decx),
        ("decy", placement.decy),
        ("decz", placement.decz),
        ("tiltx", placement.tiltx),
        ("tilty", placement.tilty),
        ("tiltz", placement.tiltz),
    ];
    let mut entity = Entity::new(EntityKind::LocalCoordinates, name);
    for (attribute, value) in values {
        let variable = graph.add_variable(Variable::fixed(attribute, value));
        entity = entity.with(attribute, Attribute::Variable(variable));
    }
    graph.add_object(entity)
}

/// Link `child` below `parent`. Both frames then reference each other.
pub fn add_child(graph: &mut ObjectGraph, parent: ObjectId, child: ObjectId) -> Result<()> {
    entity_mut(graph, child)?.set_attribute("parent", Attribute::Object(parent));
    let parent_entity = entity_mut(graph, parent)?;
    let mut children = parent_entity
        .attribute("children")
        .and_then(Attribute::as_list)
        .map(<[Attribute]>::to_vec)
        .unwrap_or_default();
    children.push(Attribute::Object(child));
    parent_entity.set_attribute("children", Attribute::List(children));
    Ok(())
}

pub fn conic(graph: &mut ObjectGraph, lc: ObjectId, curvature: f64, conic_constant: f64) -> ObjectId {
    let curvature = graph.add_variable(Variable::fixed("curvature", curvature));
    let conic_constant = graph.add_variable(Variable::fixed("conic constant", conic_constant));
    graph.add_object(
        Entity::new(EntityKind::Conic, "")
            .with("lc", Attribute::Object(lc))
            .with("curvature", Attribute::Variable(curvature))
            .with("conic", Attribute::Variable(conic_constant)),
    )
}

pub fn circular_aperture(graph: &mut ObjectGraph, lc: ObjectId, maxradius: f64) -> ObjectId {
    graph.add_object(
        Entity::new(EntityKind::CircularAperture, "")
            .with("lc", Attribute::Object(lc))
            .with("maxradius", Attribute::scalar(maxradius))
            .with("minradius", Attribute::scalar(0.0)),
    )
}

pub fn rectangular_aperture(graph: &mut ObjectGraph, lc: ObjectId, width: f64, height: f64) -> ObjectId {
    graph.add_object(
        Entity::new(EntityKind::RectangularAperture, "")
            .with("lc", Attribute::Object(lc))
            .with("width", Attribute::scalar(width))
            .with("height", Attribute::scalar(height)),
    )
}

pub fn constant_index_glass(graph: &mut ObjectGraph, lc: ObjectId, index: f64, name: &str) -> ObjectId {
    let index = graph.add_variable(Variable::fixed("refractive index", index));
    graph.add_object(
        Entity::new(EntityKind::ConstantIndexGlass, name)
            .with("lc", Attribute::Object(lc))
            .with("index", Attribute::Variable(index)),
    )
}

pub fn surface(graph: &mut ObjectGraph, name: &str, lc: ObjectId, shape: ObjectId, aperture: ObjectId) -> ObjectId {
    graph.add_object(
        Entity::new(EntityKind::Surface, name)
            .with("lc", Attribute::Object(lc))
            .with("shape", Attribute::Object(shape))
            .with("aperture", Attribute::Object(aperture)),
    )
}

/// Element holding named surfaces and materials, both keyed by name.
pub fn optical_element(
    graph: &mut ObjectGraph,
    name: &str,
    root_lc: ObjectId,
    surfaces: &[(&str, ObjectId)],
    materials: &[(&str, ObjectId)],
) -> ObjectId {
    graph.add_object(
        Entity::new(EntityKind::OpticalElement, name)
            .with("rootcoordinatesystem", Attribute::Object(root_lc))
            .with("surfaces", named_objects(surfaces))
            .with("materials", named_objects(materials)),
    )
}

pub fn optical_system(graph: &mut ObjectGraph, name: &str, root_lc: ObjectId, background: ObjectId) -> ObjectId {
    graph.add_object(
        Entity::new(EntityKind::OpticalSystem, name)
            .with("rootcoordinatesystem", Attribute::Object(root_lc))
            .with("material_background", Attribute::Object(background))
            .with("elements", Attribute::Map(BTreeMap::new())),
    )
}

pub fn add_element(graph: &mut ObjectGraph, system: ObjectId, key: &str, element: ObjectId) -> Result<()> {
    let system = entity_mut(graph, system)?;
    let mut elements = system.attribute("elements").and_then(Attribute::as_map).cloned().unwrap_or_default();
    elements.insert(key.to_string(), Attribute::Object(element));
    system.set_attribute("elements", Attribute::Map(elements));
    Ok(())
}

fn named_objects(entries: &[(&str, ObjectId)]) -> Attribute {
    Attribute::Map(
        entries
            .iter()
            .map(|(key, id)| (key.to_string(), Attribute::Object(*id)))
            .collect(),
    )
}

fn entity_mut(graph: &mut ObjectGraph, id: ObjectId) -> Result<&mut Entity> {
    let kind = graph.object(id)?.kind().to_string();
    graph.downcast_mut::<Entity>(id)?.ok_or_else(|| PersistError::InvalidAttribute {
        kind,
        attribute: "<self>".to_string(),
        reason: format!("{id} is not a built-in entity"),
    })
}
