//! Link-time module registry and instance factory.
//!
//! Module crates add their [`ModuleDescriptor`] to [`MODULE_REGISTRY`]; the
//! factory collects and validates them once at startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use linkme::distributed_slice;
use tracing::{debug, info};

use crate::error::{FactoryError, FactoryResult};
use crate::module::{ModuleDescriptor, ModuleEnv};
use crate::wrapper::ServerModuleWrapper;

/// Every module type linked into the binary.
#[distributed_slice]
pub static MODULE_REGISTRY: [ModuleDescriptor];

/// The set of installable module types, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ServerModuleFactory {
    descriptors: BTreeMap<&'static str, ModuleDescriptor>,
}

impl ServerModuleFactory {
    /// Collects everything in [`MODULE_REGISTRY`].
    pub fn collect_all() -> FactoryResult<Self> {
        let factory = Self::from_descriptors(MODULE_REGISTRY.iter().copied())?;
        info!(count = factory.descriptors.len(), "Module types collected");
        Ok(factory)
    }

    /// Builds a factory from an explicit list.
    ///
    /// Fails on duplicate names, modules without aliases, and modules whose
    /// command registry is invalid.
    pub fn from_descriptors<I>(descriptors: I) -> FactoryResult<Self>
    where
        I: IntoIterator<Item = ModuleDescriptor>,
    {
        let mut map = BTreeMap::new();
        for descriptor in descriptors {
            if descriptor.recommended_aliases.is_empty() {
                return Err(FactoryError::NoAliases(descriptor.name));
            }
            (descriptor.shortcuts)().map_err(|source| FactoryError::Registry {
                module: descriptor.name,
                source,
            })?;
            if map.insert(descriptor.name, descriptor).is_some() {
                return Err(FactoryError::DuplicateModule(descriptor.name));
            }
            debug!(module = descriptor.name, "Module type registered");
        }
        Ok(Self { descriptors: map })
    }

    /// `(name, short description)` of every module type, sorted by name.
    pub fn available(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.descriptors
            .values()
            .map(|d| (d.name, d.short_description))
    }

    pub fn module_exists(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    pub fn descriptor(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.descriptors.get(name)
    }

    /// Creates an inactive wrapper for a fresh instance of `name`.
    pub fn new_module_instance(&self, name: &str, env: ModuleEnv) -> FactoryResult<Arc<ServerModuleWrapper>> {
        let descriptor = *self
            .descriptors
            .get(name)
            .ok_or_else(|| FactoryError::UnknownModule(name.to_string()))?;
        let shortcuts = (descriptor.shortcuts)().map_err(|source| FactoryError::Registry {
            module: descriptor.name,
            source,
        })?;
        Ok(ServerModuleWrapper::new(descriptor, shortcuts, env))
    }
}
