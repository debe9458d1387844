//! Built-in Optical Entities
//!
//! Data-only stand-ins for the classes a persisted optical system is made
//! of. They carry a tag, a name, annotations and a structure, and check on
//! construction that the attributes their kind depends on are present.

mod builders;

use std::any::Any;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{PersistError, Result};
use crate::graph::{Annotations, Attribute, Persistable, Structure};

pub use builders::{
    add_child, add_element, circular_aperture, conic, constant_index_glass, local_coordinates, optical_element,
    optical_system, rectangular_aperture, surface, Placement,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Conic,
    Cylinder,
    Asphere,
    Biconic,
    XyPolynomials,
    GridSag,
    ZernikeFringe,
    ZernikeAnsi,
    LocalCoordinates,
    ConstantIndexGlass,
    OpticalElement,
    OpticalSystem,
    Surface,
    CatalogMaterial,
    Aperture,
    CircularAperture,
    RectangularAperture,
}

/// What a required attribute must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Object,
    Variable,
    /// A variable or a plain number.
    Number,
}

impl EntityKind {
    pub const ALL: [EntityKind; 17] = [
        EntityKind::Conic,
        EntityKind::Cylinder,
        EntityKind::Asphere,
        EntityKind::Biconic,
        EntityKind::XyPolynomials,
        EntityKind::GridSag,
        EntityKind::ZernikeFringe,
        EntityKind::ZernikeAnsi,
        EntityKind::LocalCoordinates,
        EntityKind::ConstantIndexGlass,
        EntityKind::OpticalElement,
        EntityKind::OpticalSystem,
        EntityKind::Surface,
        EntityKind::CatalogMaterial,
        EntityKind::Aperture,
        EntityKind::CircularAperture,
        EntityKind::RectangularAperture,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            EntityKind::Conic => "shape_Conic",
            EntityKind::Cylinder => "shape_Cylinder",
            EntityKind::Asphere => "shape_Asphere",
            EntityKind::Biconic => "shape_Biconic",
            EntityKind::XyPolynomials => "shape_XYPolynomials",
            EntityKind::GridSag => "shape_GridSag",
            EntityKind::ZernikeFringe => "shape_ZernikeFringe",
            EntityKind::ZernikeAnsi => "shape_ZernikeANSI",
            EntityKind::LocalCoordinates => "localcoordinates",
            EntityKind::ConstantIndexGlass => "constantindexglass",
            EntityKind::OpticalElement => "opticalelement",
            EntityKind::OpticalSystem => "opticalsystem",
            EntityKind::Surface => "surface",
            EntityKind::CatalogMaterial => "material_from_catalog",
            EntityKind::Aperture => "aperture",
            EntityKind::CircularAperture => "aperture_Circular",
            EntityKind::RectangularAperture => "aperture_Rectangular",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    fn requirements(&self) -> &'static [(&'static str, Expect)] {
        use Expect::*;
        match self {
            EntityKind::Conic | EntityKind::Cylinder | EntityKind::Asphere => {
                &[("lc", Object), ("curvature", Variable), ("conic", Variable)]
            }
            EntityKind::Biconic => &[("lc", Object), ("curvaturex", Variable), ("curvaturey", Variable)],
            EntityKind::XyPolynomials
            | EntityKind::GridSag
            | EntityKind::ZernikeFringe
            | EntityKind::ZernikeAnsi
            | EntityKind::CatalogMaterial
            | EntityKind::Aperture => &[("lc", Object)],
            EntityKind::LocalCoordinates => &[
                ("decx", Variable),
                ("decy", Variable),
                ("decz", Variable),
                ("tiltx", Variable),
                ("tilty", Variable),
                ("tiltz", Variable),
            ],
            EntityKind::ConstantIndexGlass => &[("lc", Object), ("index", Number)],
            EntityKind::OpticalElement | EntityKind::OpticalSystem => &[("rootcoordinatesystem", Object)],
            EntityKind::Surface => &[("lc", Object), ("shape", Object), ("aperture", Object)],
            EntityKind::CircularAperture => &[("lc", Object), ("maxradius", Number), ("minradius", Number)],
            EntityKind::RectangularAperture => &[("lc", Object), ("width", Number), ("height", Number)],
        }
    }

    /// Attribute names a constructor insists on.
    pub fn required_attributes(&self) -> impl Iterator<Item = &'static str> {
        self.requirements().iter().map(|(name, _)| *name)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for EntityKind {
    type Err = PersistError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| PersistError::UnknownTag { tag: s.to_string(), record: None })
    }
}

/// A built-in optical object: tag, name, annotations and attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    kind: EntityKind,
    name: String,
    annotations: Annotations,
    structure: Structure,
}

impl Entity {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self { kind, name: name.into(), annotations: Annotations::new(), structure: Structure::new() }
    }

    pub fn with(mut self, attribute: impl Into<String>, value: Attribute) -> Self {
        self.structure.insert(attribute.into(), value);
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Constructor used by the class registry.
    pub fn construct(kind: EntityKind, annotations: Annotations, structure: Structure, name: &str) -> Result<Self> {
        for (attribute, expect) in kind.requirements() {
            let value = structure.get(*attribute).ok_or_else(|| PersistError::InvalidAttribute {
                kind: kind.tag().to_string(),
                attribute: attribute.to_string(),
                reason: "missing".to_string(),
            })?;
            let fits = match expect {
                Expect::Object => value.as_object().is_some(),
                Expect::Variable => value.as_variable().is_some(),
                Expect::Number => {
                    value.as_variable().is_some() || value.as_scalar().is_some_and(Value::is_number)
                }
            };
            if !fits {
                return Err(PersistError::InvalidAttribute {
                    kind: kind.tag().to_string(),
                    attribute: attribute.to_string(),
                    reason: format!("expected {expect:?}, found {}", value.shape()).to_lowercase(),
                });
            }
        }
        Ok(Self { kind, name: name.to_string(), annotations, structure })
    }

    pub fn entity_kind(&self) -> EntityKind {
        self.kind
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.structure.get(name)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: Attribute) -> Option<Attribute> {
        self.structure.insert(name.into(), value)
    }

    pub fn attributes(&self) -> &Structure {
        &self.structure
    }
}

impl Persistable for Entity {
    fn kind(&self) -> &str {
        self.kind.tag()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn annotations(&self) -> Annotations {
        self.annotations.clone()
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
