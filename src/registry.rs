//! The immutable controller registry.
//!
//! Built once from every [`WebService`] when the engine starts, read by every
//! call afterwards. Nothing mutates it after construction, so concurrent
//! lookups need no locking: `&Registry` is all a reader ever gets.

use std::collections::HashMap;

use crate::definition::{ActionSpec, Context, ControllerSpec, DefinitionError, WebService};

#[derive(Debug, Default)]
pub struct Registry {
    controllers: HashMap<String, ControllerSpec>,
}

impl Registry {
    /// Invokes each provider exactly once and seals the result.
    pub fn build<'a, I, S>(services: I) -> Result<Self, DefinitionError>
    where
        I: IntoIterator<Item = &'a S>,
        S: WebService + ?Sized + 'a,
    {
        let mut context = Context::new();
        for service in services {
            service.define(&mut context)?;
        }

        let mut controllers = HashMap::new();
        for controller in context.finish()? {
            controllers.insert(controller.path().to_owned(), controller);
        }
        Ok(Self { controllers })
    }

    pub fn controller(&self, path: &str) -> Option<&ControllerSpec> {
        self.controllers.get(path)
    }

    pub fn action(&self, controller_path: &str, key: &str) -> Option<&ActionSpec> {
        self.controller(controller_path)?.action(key)
    }

    /// All controllers, sorted by path.
    pub fn controllers(&self) -> Vec<&ControllerSpec> {
        let mut all: Vec<_> = self.controllers.values().collect();
        all.sort_by(|a, b| a.path().cmp(b.path()));
        all
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}
