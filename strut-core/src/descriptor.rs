//! Component descriptors: the startup-time metadata the container works from.
//!
//! Since there is no runtime reflection, everything an annotation would carry
//! in a reflective framework arrives here explicitly: the type token, the
//! component kind, the selector, the singleton flag, and one or more
//! constructors with their ordered dependency lists.

use crate::error::Error;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A type-erased component instance held by the container.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A constructor body: receives the resolved dependency arguments in
/// declaration order and produces the instance.
pub type ConstructFn = Arc<dyn Fn(&mut ResolvedArgs) -> Result<Instance, Error> + Send + Sync>;

/// Comparable token identifying a registered type.
///
/// Equality and hashing use the `TypeId` only; the type name is carried for
/// diagnostics and selector derivation.
#[derive(Clone, Copy, Debug)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Token for `T`. Works for trait objects as well (`TypeKey::of::<dyn Greeter>()`).
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full type name, including the module path.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name, without generic arguments.
    pub fn simple_name(&self) -> &'static str {
        simple_name_of(self.name)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.simple_name())
    }
}

/// Strip the module path and generic arguments from a type name.
pub(crate) fn simple_name_of(name: &str) -> &str {
    let end = name.find('<').unwrap_or(name.len());
    let base = &name[..end];
    match base.rfind("::") {
        Some(index) => &base[index + 2..],
        None => base,
    }
}

/// Kind of a registered component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentKind {
    /// Structural component: carries a selector and may declare routes
    Controller,
    /// Injectable service
    Provider,
}

/// Ordered, resolved constructor arguments.
///
/// Constructor bodies pull their dependencies out in declaration order with
/// [`ResolvedArgs::take`].
pub struct ResolvedArgs {
    values: Vec<Instance>,
    next: usize,
}

impl ResolvedArgs {
    pub(crate) fn new(values: Vec<Instance>) -> Self {
        Self { values, next: 0 }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Take the next argument, downcast to `T`.
    pub fn take<T: Send + Sync + 'static>(&mut self) -> Result<Arc<T>, Error> {
        let index = self.next;
        let value = self.values.get(index).cloned().ok_or_else(|| {
            Error::DependencyResolution {
                type_name: std::any::type_name::<T>().to_string(),
                reason: format!("constructor requested more arguments than were resolved ({index})"),
            }
        })?;
        self.next = index + 1;
        value.downcast::<T>().map_err(|_| Error::DependencyResolution {
            type_name: std::any::type_name::<T>().to_string(),
            reason: format!("resolved argument {index} has a different type"),
        })
    }

    /// Take the next argument without downcasting.
    pub fn take_any(&mut self) -> Result<Instance, Error> {
        let index = self.next;
        let value = self.values.get(index).cloned().ok_or_else(|| {
            Error::DependencyResolution {
                type_name: "<any>".to_string(),
                reason: format!("constructor requested more arguments than were resolved ({index})"),
            }
        })?;
        self.next = index + 1;
        Ok(value)
    }
}

/// A declared constructor: ordered dependency tokens, an optional injection
/// marker, and the construct body.
#[derive(Clone)]
pub struct Constructor {
    dependencies: Vec<TypeKey>,
    inject: bool,
    construct: ConstructFn,
}

impl Constructor {
    pub fn new<F>(construct: F) -> Self
    where
        F: Fn(&mut ResolvedArgs) -> Result<Instance, Error> + Send + Sync + 'static,
    {
        Self {
            dependencies: Vec::new(),
            inject: false,
            construct: Arc::new(construct),
        }
    }

    /// Append a dependency parameter of type `T`.
    pub fn with_arg<T: ?Sized + 'static>(mut self) -> Self {
        self.dependencies.push(TypeKey::of::<T>());
        self
    }

    /// Mark this constructor as the injection target.
    pub fn inject(mut self) -> Self {
        self.inject = true;
        self
    }

    pub fn dependencies(&self) -> &[TypeKey] {
        &self.dependencies
    }

    pub fn is_inject(&self) -> bool {
        self.inject
    }

    pub(crate) fn construct(&self) -> &ConstructFn {
        &self.construct
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("dependencies", &self.dependencies)
            .field("inject", &self.inject)
            .finish()
    }
}

/// Registered metadata about a constructible type.
///
/// Immutable once handed to the registry.
#[derive(Clone)]
pub struct ComponentDescriptor {
    key: TypeKey,
    kind: ComponentKind,
    selector: Option<String>,
    singleton: bool,
    providers: Vec<TypeKey>,
    constructors: Vec<Constructor>,
}

impl ComponentDescriptor {
    fn new(key: TypeKey, kind: ComponentKind) -> Self {
        Self {
            key,
            kind,
            selector: None,
            singleton: true,
            providers: Vec::new(),
            constructors: Vec::new(),
        }
    }

    /// Descriptor for an injectable service.
    pub fn provider<T: ?Sized + 'static>() -> Self {
        Self::new(TypeKey::of::<T>(), ComponentKind::Provider)
    }

    /// Descriptor for a structural component.
    pub fn controller<T: ?Sized + 'static>() -> Self {
        Self::new(TypeKey::of::<T>(), ComponentKind::Controller)
    }

    /// Declare the component selector.
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Scope the component as transient: every `get` constructs a fresh
    /// instance. The default is singleton.
    pub fn transient(mut self) -> Self {
        self.singleton = false;
        self
    }

    /// Declare a provider/dependency type on the component metadata.
    pub fn provides<T: ?Sized + 'static>(mut self) -> Self {
        self.providers.push(TypeKey::of::<T>());
        self
    }

    /// Declare a constructor. Order of declaration is preserved.
    pub fn constructor(mut self, constructor: Constructor) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    pub fn declared_providers(&self) -> &[TypeKey] {
        &self.providers
    }

    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("selector", &self.selector)
            .field("singleton", &self.singleton)
            .field("constructors", &self.constructors.len())
            .finish()
    }
}
