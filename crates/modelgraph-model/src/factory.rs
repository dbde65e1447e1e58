//! Entity construction from declared `(module, class)` identifiers.

use crate::entity::{Entity, EntityHandle};
use std::collections::HashMap;

/// Constructor closure for one entity class.
pub type Constructor = Box<dyn Fn(&str) -> Entity + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("no constructor registered for {module}.{class}")]
    UnknownClass { module: String, class: String },

    #[error("constructing entity {id} failed: {reason}")]
    Construction { id: String, reason: String },
}

/// Builds new entity instances for the reconciler's `add` path.
///
/// The surrounding system decides what a class identifier means; this crate
/// only needs `(module, class, id) -> Entity`.
pub trait EntityFactory: Send + Sync {
    fn construct(
        &self,
        module_name: &str,
        class_name: &str,
        id: &str,
    ) -> Result<EntityHandle, FactoryError>;
}

/// Factory backed by a registry of constructor closures.
///
/// In permissive mode (the default), unregistered classes get a bare entity
/// carrying the declared class identity. Strict mode fails with
/// [`FactoryError::UnknownClass`] instead.
pub struct RegistryFactory {
    constructors: HashMap<(String, String), Constructor>,
    permissive: bool,
}

impl RegistryFactory {
    pub fn permissive() -> Self {
        Self {
            constructors: HashMap::new(),
            permissive: true,
        }
    }

    pub fn strict() -> Self {
        Self {
            constructors: HashMap::new(),
            permissive: false,
        }
    }

    pub fn register(
        &mut self,
        module_name: impl Into<String>,
        class_name: impl Into<String>,
        constructor: Constructor,
    ) {
        self.constructors
            .insert((module_name.into(), class_name.into()), constructor);
    }
}

impl Default for RegistryFactory {
    fn default() -> Self {
        Self::permissive()
    }
}

impl EntityFactory for RegistryFactory {
    fn construct(
        &self,
        module_name: &str,
        class_name: &str,
        id: &str,
    ) -> Result<EntityHandle, FactoryError> {
        let key = (module_name.to_string(), class_name.to_string());
        if let Some(constructor) = self.constructors.get(&key) {
            return Ok(constructor(id).into_handle());
        }
        if self.permissive {
            return Ok(Entity::new(id, module_name, class_name).into_handle());
        }
        Err(FactoryError::UnknownClass {
            module: module_name.to_string(),
            class: class_name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn permissive_factory_builds_bare_entities() {
        let factory = RegistryFactory::permissive();
        let handle = factory
            .construct("pkg.IpRouteEntry", "IpRouteEntry", "10.0.0.0_24")
            .expect("permissive construction");
        let entity = handle.read();
        assert_eq!(entity.id(), "10.0.0.0_24");
        assert!(entity.class_is("pkg.IpRouteEntry", "IpRouteEntry"));
    }

    #[test]
    fn strict_factory_rejects_unregistered() {
        let factory = RegistryFactory::strict();
        let err = factory
            .construct("pkg.Unknown", "Unknown", "x")
            .expect_err("unregistered class");
        assert!(matches!(err, FactoryError::UnknownClass { .. }));
    }

    #[test]
    fn registered_constructor_wins() {
        let mut factory = RegistryFactory::strict();
        factory.register(
            "net.Interface",
            "Interface",
            Box::new(|id| {
                let mut entity = Entity::new(id, "net.Interface", "Interface");
                entity.set_attribute("adminStatus", json!("up"));
                entity
            }),
        );

        let handle = factory
            .construct("net.Interface", "Interface", "eth0")
            .expect("registered construction");
        assert_eq!(handle.read().attribute("adminStatus"), Some(&json!("up")));
    }
}
