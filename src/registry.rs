//! Class Registry
//!
//! Maps the `kind` tag of a record onto the constructor that rebuilds it.
//! Callers add their own classes next to the built-in optical tags.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::entities::{Entity, EntityKind};
use crate::error::{PersistError, Result};
use crate::graph::{Annotations, Persistable, Structure};

/// `(annotations, structure, name) -> instance`
pub type Constructor = Arc<dyn Fn(Annotations, Structure, &str) -> Result<Box<dyn Persistable>> + Send + Sync>;

/// A class that knows how to rebuild itself from a resolved structure.
pub trait Constructible: Persistable + Sized {
    fn construct(annotations: Annotations, structure: Structure, name: &str) -> Result<Self>;
}

#[derive(Clone)]
pub struct ClassRegistry {
    constructors: HashMap<String, Constructor>,
}

impl ClassRegistry {
    /// Create a registry without any class
    pub fn new() -> Self {
        Self { constructors: HashMap::new() }
    }

    /// Create a registry knowing the 17 built-in optical tags
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for kind in EntityKind::ALL {
            registry.register(kind.tag(), move |annotations, structure, name| {
                Ok(Box::new(Entity::construct(kind, annotations, structure, name)?) as Box<dyn Persistable>)
            });
        }
        registry
    }

    /// Register a constructor closure, replacing any previous one for `tag`
    pub fn register<F>(&mut self, tag: impl Into<String>, constructor: F)
    where
        F: Fn(Annotations, Structure, &str) -> Result<Box<dyn Persistable>> + Send + Sync + 'static,
    {
        self.register_constructor(tag, Arc::new(constructor));
    }

    pub fn register_constructor(&mut self, tag: impl Into<String>, constructor: Constructor) {
        let tag = tag.into();
        debug!("Registered constructor for '{}'", tag);
        self.constructors.insert(tag, constructor);
    }

    /// Register a type implementing [`Constructible`]
    pub fn register_type<T: Constructible>(&mut self, tag: impl Into<String>) {
        self.register(tag, |annotations, structure, name| {
            Ok(Box::new(T::construct(annotations, structure, name)?) as Box<dyn Persistable>)
        });
    }

    /// Add caller supplied `(tag, constructor)` pairs
    pub fn extend<I>(&mut self, classes: I)
    where
        I: IntoIterator<Item = (String, Constructor)>,
    {
        for (tag, constructor) in classes {
            self.register_constructor(tag, constructor);
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.constructors.keys().cloned().collect();
        tags.sort();
        tags
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Build an instance for `tag`
    pub fn construct(
        &self,
        tag: &str,
        annotations: Annotations,
        structure: Structure,
        name: &str,
    ) -> Result<Box<dyn Persistable>> {
        let constructor = self
            .constructors
            .get(tag)
            .ok_or_else(|| PersistError::UnknownTag { tag: tag.to_string(), record: None })?;
        constructor(annotations, structure, name)
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry").field("tags", &self.tags()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Attribute;
    use std::any::Any;

    #[derive(Debug)]
    struct Probe {
        name: String,
    }

    impl Persistable for Probe {
        fn kind(&self) -> &str {
            "probe"
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn structure(&self) -> Structure {
            Structure::new()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    impl Constructible for Probe {
        fn construct(_: Annotations, _: Structure, name: &str) -> Result<Self> {
            Ok(Probe { name: name.to_string() })
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ClassRegistry::with_builtins();
        assert_eq!(registry.len(), 17);
        assert!(registry.contains("shape_ZernikeANSI"));
        assert!(!registry.contains("probe"));
        assert!(ClassRegistry::new().is_empty());
    }

    #[test]
    fn test_register_type_and_construct() {
        let mut registry = ClassRegistry::new();
        registry.register_type::<Probe>("probe");
        let built = registry.construct("probe", Annotations::new(), Structure::new(), "p1").unwrap();
        assert_eq!(built.name(), "p1");
        assert!(built.as_any().downcast_ref::<Probe>().is_some());
    }

    #[test]
    fn test_unknown_tag() {
        let registry = ClassRegistry::with_builtins();
        let err = registry.construct("probe", Annotations::new(), Structure::new(), "p").unwrap_err();
        assert!(matches!(err, PersistError::UnknownTag { ref tag, record: None } if tag == "probe"));
    }

    #[test]
    fn test_builtin_constructor_validates() {
        let registry = ClassRegistry::with_builtins();
        let structure = Structure::from([("lc".to_string(), Attribute::scalar(1))]);
        assert!(registry.construct("aperture", Annotations::new(), structure, "a").is_err());
    }
}
