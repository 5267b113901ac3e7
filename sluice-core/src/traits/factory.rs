//! Factories and registries for operators and ingresses.
//!
//! Registries are plain objects passed by reference to the code that
//! needs them (the definition-language builder, tests, the CLI). They are
//! populated once at startup and read-only afterwards.

use super::ingress::Ingress;
use crate::error::{Result, SluiceError};
use crate::graph::OpFn;
use std::collections::HashMap;

/// String-keyed parameters handed to factories: the parsed definition's
/// param block merged with runtime build arguments.
pub type Params = HashMap<String, String>;

/// Creates operator bodies from a type name and parameters.
pub trait OpFactory: Send + Sync {
    /// Create one operator body for instance `name` of type `type_name`.
    ///
    /// Fails with [`SluiceError::InvalidParam`] when the parameters are
    /// unusable.
    fn create_op(&self, name: &str, type_name: &str, params: &Params) -> Result<OpFn>;
}

/// Creates ingress instances from a type name and parameters.
pub trait IngressFactory: Send + Sync {
    /// Create one ingress for instance `name` of type `type_name`.
    fn create_ingress(
        &self,
        name: &str,
        type_name: &str,
        params: &Params,
    ) -> Result<Box<dyn Ingress>>;
}

/// Maps operator type names to their factories.
#[derive(Default)]
pub struct OpRegistry {
    factories: HashMap<String, Box<dyn OpFactory>>,
}

impl OpRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `type_name`.
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        factory: impl OpFactory + 'static,
    ) -> Result<()> {
        let type_name = type_name.into();
        if self.factories.contains_key(&type_name) {
            return Err(SluiceError::FactoryExists {
                kind: "op",
                type_name,
            });
        }
        self.factories.insert(type_name, Box::new(factory));
        Ok(())
    }

    /// Look up a factory by type name.
    pub fn get(&self, type_name: &str) -> Option<&dyn OpFactory> {
        self.factories.get(type_name).map(Box::as_ref)
    }

    /// Create an operator body, failing with
    /// [`SluiceError::FactoryNotFound`] for unknown types.
    pub fn create_op(&self, name: &str, type_name: &str, params: &Params) -> Result<OpFn> {
        let factory = self.get(type_name).ok_or_else(|| SluiceError::FactoryNotFound {
            kind: "op",
            type_name: type_name.to_string(),
        })?;
        factory.create_op(name, type_name, params)
    }
}

/// Maps ingress type names to their factories.
#[derive(Default)]
pub struct IngressRegistry {
    factories: HashMap<String, Box<dyn IngressFactory>>,
}

impl IngressRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `type_name`.
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        factory: impl IngressFactory + 'static,
    ) -> Result<()> {
        let type_name = type_name.into();
        if self.factories.contains_key(&type_name) {
            return Err(SluiceError::FactoryExists {
                kind: "ingress",
                type_name,
            });
        }
        self.factories.insert(type_name, Box::new(factory));
        Ok(())
    }

    /// Look up a factory by type name.
    pub fn get(&self, type_name: &str) -> Option<&dyn IngressFactory> {
        self.factories.get(type_name).map(Box::as_ref)
    }

    /// Create an ingress, failing with [`SluiceError::FactoryNotFound`]
    /// for unknown types.
    pub fn create_ingress(
        &self,
        name: &str,
        type_name: &str,
        params: &Params,
    ) -> Result<Box<dyn Ingress>> {
        let factory = self.get(type_name).ok_or_else(|| SluiceError::FactoryNotFound {
            kind: "ingress",
            type_name: type_name.to_string(),
        })?;
        factory.create_ingress(name, type_name, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopFactory;

    impl OpFactory for NoopFactory {
        fn create_op(&self, _name: &str, _type_name: &str, _params: &Params) -> Result<OpFn> {
            Ok(Box::new(|_ctx| Ok(())))
        }
    }

    #[test]
    fn register_and_create() {
        let mut reg = OpRegistry::new();
        reg.register("noop", NoopFactory).unwrap();
        assert!(reg.get("noop").is_some());
        assert!(reg.create_op("n", "noop", &Params::new()).is_ok());
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut reg = OpRegistry::new();
        reg.register("noop", NoopFactory).unwrap();
        let err = reg.register("noop", NoopFactory).unwrap_err();
        assert_eq!(err.code(), "E102");
    }

    #[test]
    fn unknown_type_rejected() {
        let reg = OpRegistry::new();
        let err = reg.create_op("n", "nope", &Params::new()).err().unwrap();
        assert_eq!(err.code(), "E101");
        assert!(format!("{}", err).contains("nope"));
    }
}
