//! Component metadata registry.
//!
//! Stores the descriptors of discovered components, classified by kind, and
//! answers the membership queries the container and router are built on.
//! Descriptors arrive either explicitly through
//! [`ComponentRegistry::register_descriptor`] or from the inventory-backed
//! descriptor source populated by [`component_registration!`].

use crate::descriptor::{ComponentDescriptor, ComponentKind, TypeKey};
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// A component registration collected at startup via `inventory`.
///
/// The function is evaluated once, lazily, when the descriptor source index
/// is first consulted.
pub struct ComponentRegistration {
    descriptor: fn() -> ComponentDescriptor,
}

impl ComponentRegistration {
    pub const fn new(descriptor: fn() -> ComponentDescriptor) -> Self {
        Self { descriptor }
    }
}

inventory::collect!(ComponentRegistration);

fn source_index() -> &'static HashMap<TypeId, Arc<ComponentDescriptor>> {
    static INDEX: OnceLock<HashMap<TypeId, Arc<ComponentDescriptor>>> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut index = HashMap::new();
        for registration in inventory::iter::<ComponentRegistration> {
            let descriptor = (registration.descriptor)();
            let id = descriptor.key().id();
            index.entry(id).or_insert_with(|| Arc::new(descriptor));
        }
        index
    })
}

/// Look up a type in the submitted registrations without registering it.
pub(crate) fn source_descriptor(key: TypeKey) -> Option<Arc<ComponentDescriptor>> {
    source_index().get(&key.id()).cloned()
}

#[derive(Default)]
struct RegistryState {
    descriptors: HashMap<TypeId, Arc<ComponentDescriptor>>,
    order: Vec<TypeKey>,
}

/// Registry of component descriptors, keyed by type token.
///
/// Mutation and iteration are safe from concurrent contexts; readers work on
/// snapshots taken under the lock and never observe a partially-added entry.
#[derive(Default)]
pub struct ComponentRegistry {
    state: RwLock<RegistryState>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type through the descriptor source.
    ///
    /// A type with no submitted registration is a no-op; the return value
    /// reports whether the type is registered afterwards.
    pub fn register_key(&self, key: TypeKey) -> bool {
        if self.is_registered(key) {
            return true;
        }
        match source_descriptor(key) {
            Some(descriptor) => {
                self.insert(key, descriptor);
                true
            }
            None => {
                trace!(component = key.name(), "no component registration found, skipping");
                false
            }
        }
    }

    /// Register a type by token.
    pub fn register<T: ?Sized + 'static>(&self) -> bool {
        self.register_key(TypeKey::of::<T>())
    }

    /// Register an explicitly built descriptor.
    ///
    /// Re-registering an already known type is a no-op; descriptors are
    /// immutable once stored.
    pub fn register_descriptor(&self, descriptor: ComponentDescriptor) {
        let key = descriptor.key();
        self.insert(key, Arc::new(descriptor));
    }

    fn insert(&self, key: TypeKey, descriptor: Arc<ComponentDescriptor>) {
        let mut state = self.state.write();
        if state.descriptors.contains_key(&key.id()) {
            return;
        }
        state.descriptors.insert(key.id(), descriptor);
        state.order.push(key);
        debug!(component = key.name(), "component registered");
    }

    pub fn descriptor(&self, key: TypeKey) -> Option<Arc<ComponentDescriptor>> {
        self.state.read().descriptors.get(&key.id()).cloned()
    }

    pub fn is_registered(&self, key: TypeKey) -> bool {
        self.state.read().descriptors.contains_key(&key.id())
    }

    pub fn is_controller(&self, key: TypeKey) -> bool {
        self.kind_of(key) == Some(ComponentKind::Controller)
    }

    pub fn is_provider(&self, key: TypeKey) -> bool {
        self.kind_of(key) == Some(ComponentKind::Provider)
    }

    fn kind_of(&self, key: TypeKey) -> Option<ComponentKind> {
        self.state
            .read()
            .descriptors
            .get(&key.id())
            .map(|descriptor| descriptor.kind())
    }

    /// Selector of a structural component: the declared selector, or the
    /// lower-cased simple type name when none was declared. `None` for
    /// providers and unregistered types.
    pub fn selector(&self, key: TypeKey) -> Option<String> {
        let descriptor = self.descriptor(key)?;
        if descriptor.kind() != ComponentKind::Controller {
            return None;
        }
        Some(match descriptor.selector() {
            Some(declared) if !declared.is_empty() => declared.to_string(),
            _ => descriptor.key().simple_name().to_lowercase(),
        })
    }

    /// Declared provider types of a component, or empty.
    pub fn declared_providers(&self, key: TypeKey) -> Vec<TypeKey> {
        self.descriptor(key)
            .map(|descriptor| descriptor.declared_providers().to_vec())
            .unwrap_or_default()
    }

    /// Snapshot of all registered type tokens, in registration order.
    pub fn all(&self) -> Vec<TypeKey> {
        self.state.read().order.clone()
    }

    /// Snapshot of the registered structural components, in registration order.
    pub fn controllers(&self) -> Vec<TypeKey> {
        self.of_kind(ComponentKind::Controller)
    }

    /// Snapshot of the registered providers, in registration order.
    pub fn providers(&self) -> Vec<TypeKey> {
        self.of_kind(ComponentKind::Provider)
    }

    fn of_kind(&self, kind: ComponentKind) -> Vec<TypeKey> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter(|key| {
                state
                    .descriptors
                    .get(&key.id())
                    .is_some_and(|descriptor| descriptor.kind() == kind)
            })
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().descriptors.is_empty()
    }

    /// Drop every registration. Intended for tests.
    pub fn clear(&self) {
        let mut state = self.state.write();
        let count = state.descriptors.len();
        state.descriptors.clear();
        state.order.clear();
        debug!(component_count = count, "registry cleared");
    }
}

/// Submit a component registration for startup collection.
///
/// The expression must build a [`ComponentDescriptor`]:
///
/// ```ignore
/// strut_core::component_registration! {
///     ComponentDescriptor::provider::<AuditTrail>()
///         .constructor(Constructor::new(|_| Ok(Arc::new(AuditTrail::default()) as Instance)))
/// }
/// ```
#[macro_export]
macro_rules! component_registration {
    ($descriptor:expr) => {
        $crate::inventory::submit! {
            $crate::registry::ComponentRegistration::new(|| $descriptor)
        }
    };
}
