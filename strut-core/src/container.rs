//! Dependency injection container.
//!
//! Owns the singleton cache and the abstract-to-concrete bindings, and
//! orchestrates the registry and the resolver to produce or retrieve
//! instances. Cloning a container is cheap and yields a handle to the same
//! shared state.

use crate::config::CoreConfig;
use crate::descriptor::{ComponentDescriptor, Instance, TypeKey};
use crate::error::Error;
use crate::registry::ComponentRegistry;
use crate::resolver::{select_constructor, DependencyResolver, SelectionBasis};
use parking_lot::{Mutex, RwLock};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// The dependency injection container.
#[derive(Clone, Default)]
pub struct Container {
    registry: Arc<ComponentRegistry>,
    bindings: Arc<RwLock<HashMap<TypeId, TypeKey>>>,
    singletons: Arc<RwLock<HashMap<TypeId, Instance>>>,
    creation_locks: Arc<Mutex<HashMap<TypeId, Arc<Mutex<()>>>>>,
    config: CoreConfig,
}

impl Container {
    pub fn new() -> Self {
        debug!("creating DI container");
        Self::default()
    }

    /// A container with explicit strictness configuration.
    pub fn with_config(config: CoreConfig) -> Self {
        debug!(?config, "creating DI container");
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> CoreConfig {
        self.config
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> DependencyResolver<'_> {
        DependencyResolver::new(self)
    }

    /// Register a component type through the descriptor source.
    ///
    /// A type with no submitted registration is a no-op; returns whether the
    /// type is registered afterwards.
    pub fn register<T: ?Sized + 'static>(&self) -> bool {
        self.register_key(TypeKey::of::<T>())
    }

    pub fn register_key(&self, key: TypeKey) -> bool {
        trace!(component = key.name(), "registering component");
        self.registry.register_key(key)
    }

    /// Register an explicitly built descriptor.
    pub fn register_descriptor(&self, descriptor: ComponentDescriptor) {
        self.registry.register_descriptor(descriptor);
    }

    /// Bind an abstract type token to a concrete implementation and register
    /// the concrete side. At most one binding per abstract token; a repeated
    /// bind silently overrides the previous one.
    pub fn bind<A: ?Sized + 'static, C: 'static>(&self) {
        self.bind_key(TypeKey::of::<A>(), TypeKey::of::<C>());
    }

    pub fn bind_key(&self, abstract_key: TypeKey, concrete_key: TypeKey) {
        let previous = self
            .bindings
            .write()
            .insert(abstract_key.id(), concrete_key);
        if let Some(previous) = previous {
            warn!(
                binding = abstract_key.name(),
                previous = previous.name(),
                replacement = concrete_key.name(),
                "binding overridden"
            );
        } else {
            debug!(
                binding = abstract_key.name(),
                implementation = concrete_key.name(),
                "binding installed"
            );
        }
        self.registry.register_key(concrete_key);
    }

    /// Resolve a binding one level. Bindings are not chained.
    pub(crate) fn rebind_key(&self, key: TypeKey) -> TypeKey {
        self.bindings
            .read()
            .get(&key.id())
            .copied()
            .unwrap_or(key)
    }

    /// Get an instance of a concrete type.
    ///
    /// For a bound abstract token the cached instance has the concrete
    /// implementation type, which a trait-object downcast cannot recover;
    /// resolve those through [`get_key`](Self::get_key) and downcast to the
    /// implementation instead.
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, Error> {
        let key = TypeKey::of::<T>();
        let instance = self.get_key(key)?;
        instance.downcast::<T>().map_err(|_| Error::DependencyResolution {
            type_name: key.name().to_string(),
            reason: "instance has a different concrete type; use get_key for bound tokens"
                .to_string(),
        })
    }

    /// Get an instance by type token.
    pub fn get_key(&self, key: TypeKey) -> Result<Instance, Error> {
        self.get_with_path(key, &mut Vec::new())
    }

    /// True if the type is registered directly or reachable via a binding.
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.is_registered_key(TypeKey::of::<T>())
    }

    pub fn is_registered_key(&self, key: TypeKey) -> bool {
        self.registry.is_registered(key) || self.bindings.read().contains_key(&key.id())
    }

    /// Discard every cached singleton. Descriptors and bindings survive.
    pub fn reset(&self) {
        let mut singletons = self.singletons.write();
        let count = singletons.len();
        singletons.clear();
        debug!(instance_count = count, "singleton cache reset");
    }

    /// Core lookup: rebind, consult the cache, construct under the per-type
    /// creation lock. `path` is the active construction path guarding
    /// against circular instantiation.
    pub(crate) fn get_with_path(
        &self,
        key: TypeKey,
        path: &mut Vec<TypeKey>,
    ) -> Result<Instance, Error> {
        let key = self.rebind_key(key);

        let descriptor = self
            .registry
            .descriptor(key)
            .or_else(|| {
                self.registry
                    .register_key(key)
                    .then(|| self.registry.descriptor(key))
                    .flatten()
            })
            .ok_or_else(|| Error::DependencyResolution {
                type_name: key.name().to_string(),
                reason: "not registered and not auto-registrable".to_string(),
            })?;

        if descriptor.is_singleton() {
            if let Some(existing) = self.singletons.read().get(&key.id()) {
                trace!(component = key.name(), "singleton cache hit");
                return Ok(existing.clone());
            }
        }

        if path.contains(&key) {
            let mut cycle = path.clone();
            cycle.push(key);
            return Err(Error::CircularDependency {
                path: render_path(&cycle),
            });
        }

        if !descriptor.is_singleton() {
            return self.construct(&descriptor, key, path);
        }

        // Per-type creation lock: two callers racing on the same uncached
        // singleton construct it at most once. Lock acquisition follows
        // dependency edges, which the path guard keeps acyclic.
        let slot = {
            let mut locks = self.creation_locks.lock();
            locks
                .entry(key.id())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _creating = slot.lock();

        if let Some(existing) = self.singletons.read().get(&key.id()) {
            trace!(component = key.name(), "singleton created by a racing caller");
            return Ok(existing.clone());
        }

        let instance = self.construct(&descriptor, key, path)?;
        self.singletons.write().insert(key.id(), instance.clone());
        debug!(component = key.name(), "singleton cached");
        Ok(instance)
    }

    fn construct(
        &self,
        descriptor: &ComponentDescriptor,
        key: TypeKey,
        path: &mut Vec<TypeKey>,
    ) -> Result<Instance, Error> {
        trace!(component = key.name(), "constructing instance");
        path.push(key);
        let built = (|| {
            let (constructor, basis) = select_constructor(descriptor)?;
            if basis == SelectionBasis::FirstDeclared {
                if self.config.strict_constructor_selection {
                    return Err(Error::AmbiguousConstructor(key.name().to_string()));
                }
                warn!(
                    component = key.name(),
                    "constructor selection fell back to first declared"
                );
            }
            let mut args = DependencyResolver::new(self).resolve_with_path(constructor, path)?;
            (constructor.construct())(&mut args)
        })();
        path.pop();

        built.map_err(|source| Error::Instantiation {
            type_name: key.name().to_string(),
            source: Box::new(source),
        })
    }
}

fn render_path(path: &[TypeKey]) -> String {
    path.iter()
        .map(TypeKey::simple_name)
        .collect::<Vec<_>>()
        .join(" -> ")
}
