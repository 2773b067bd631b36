//! Dependency resolution.
//!
//! Resolves a constructor's declared dependencies against the container,
//! auto-registering types the descriptor source knows about, and provides
//! the cycle analysis the container relies on before recursive construction.

use crate::container::Container;
use crate::descriptor::{ComponentDescriptor, Constructor, Instance, ResolvedArgs, TypeKey};
use crate::error::Error;
use crate::registry;
use std::sync::Arc;
use tracing::debug;

/// How a constructor was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionBasis {
    /// The type declares exactly one constructor
    Only,
    /// Exactly one constructor carries the injection marker
    InjectMarked,
    /// A zero-argument constructor exists
    ZeroArg,
    /// Fallback: the first declared constructor. Ambiguous; callers decide
    /// whether to proceed or fail.
    FirstDeclared,
}

/// Outcome of the cycle analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleStatus {
    /// Traversal completed without revisiting a type
    Acyclic,
    /// A type reappeared in the active path; the path ends with the repeat
    Cyclic(Vec<TypeKey>),
    /// A type in the graph has no obtainable descriptor, so the analysis
    /// cannot complete. Distinct from "no cycle".
    Unanalyzable(TypeKey),
}

/// Select a constructor for the descriptor.
///
/// Deterministic policy, applied identically everywhere a constructor is
/// needed: a single declared constructor wins; otherwise the one marked as
/// the injection target, if exactly one is marked; otherwise a zero-argument
/// constructor; otherwise the first declared, tagged
/// [`SelectionBasis::FirstDeclared`] so callers can reject the ambiguity.
pub fn select_constructor(
    descriptor: &ComponentDescriptor,
) -> Result<(&Constructor, SelectionBasis), Error> {
    let constructors = descriptor.constructors();
    let first = constructors.first().ok_or_else(|| {
        Error::MissingConstructor(descriptor.key().name().to_string())
    })?;

    if constructors.len() == 1 {
        return Ok((first, SelectionBasis::Only));
    }

    let mut marked = constructors.iter().filter(|c| c.is_inject());
    if let (Some(only), None) = (marked.next(), marked.next()) {
        return Ok((only, SelectionBasis::InjectMarked));
    }

    if let Some(zero_arg) = constructors.iter().find(|c| c.dependencies().is_empty()) {
        return Ok((zero_arg, SelectionBasis::ZeroArg));
    }

    Ok((first, SelectionBasis::FirstDeclared))
}

/// Resolves constructor dependencies against a container.
pub struct DependencyResolver<'c> {
    container: &'c Container,
}

impl<'c> DependencyResolver<'c> {
    pub fn new(container: &'c Container) -> Self {
        Self { container }
    }

    /// Resolve one argument per declared dependency, in order.
    pub fn resolve_dependencies(&self, constructor: &Constructor) -> Result<ResolvedArgs, Error> {
        self.resolve_with_path(constructor, &mut Vec::new())
    }

    pub(crate) fn resolve_with_path(
        &self,
        constructor: &Constructor,
        path: &mut Vec<TypeKey>,
    ) -> Result<ResolvedArgs, Error> {
        let mut values = Vec::with_capacity(constructor.dependencies().len());
        for dependency in constructor.dependencies() {
            values.push(self.resolve_one(*dependency, path)?);
        }
        Ok(ResolvedArgs::new(values))
    }

    fn resolve_one(&self, dependency: TypeKey, path: &mut Vec<TypeKey>) -> Result<Instance, Error> {
        if self.container.is_registered_key(dependency) {
            return self.container.get_with_path(dependency, path);
        }

        // Unregistered but known to the descriptor source: register on the fly.
        if self.container.registry().register_key(dependency) {
            debug!(component = dependency.name(), "dependency auto-registered");
            return self.container.get_with_path(dependency, path);
        }

        Err(Error::DependencyResolution {
            type_name: dependency.name().to_string(),
            reason: "not registered and not auto-registrable".to_string(),
        })
    }

    /// Boolean view of [`check_cycles`](Self::check_cycles): true only for a
    /// confirmed cycle.
    pub fn has_circular_dependency(&self, root: TypeKey) -> bool {
        matches!(self.check_cycles(root), CycleStatus::Cyclic(_))
    }

    /// Depth-first cycle analysis over declared constructor dependencies,
    /// carrying the active visitation path.
    pub fn check_cycles(&self, root: TypeKey) -> CycleStatus {
        let mut chain = Vec::new();
        self.visit(root, &mut chain)
    }

    fn visit(&self, current: TypeKey, chain: &mut Vec<TypeKey>) -> CycleStatus {
        if chain.contains(&current) {
            let mut path = chain.clone();
            path.push(current);
            return CycleStatus::Cyclic(path);
        }

        let Some(descriptor) = self.analyzable_descriptor(current) else {
            return CycleStatus::Unanalyzable(current);
        };
        let Ok((constructor, _)) = select_constructor(&descriptor) else {
            return CycleStatus::Unanalyzable(current);
        };

        chain.push(current);
        for dependency in constructor.dependencies() {
            match self.visit(*dependency, chain) {
                CycleStatus::Acyclic => {}
                other => {
                    chain.pop();
                    return other;
                }
            }
        }
        chain.pop();
        CycleStatus::Acyclic
    }

    /// Flattened list of the types reachable from `root` through declared
    /// constructor dependencies. Unanalyzable branches are skipped.
    pub fn dependency_chain(&self, root: TypeKey) -> Vec<TypeKey> {
        let mut chain = Vec::new();
        self.build_chain(root, &mut chain);
        chain
    }

    fn build_chain(&self, current: TypeKey, chain: &mut Vec<TypeKey>) {
        if chain.contains(&current) {
            return;
        }
        chain.push(current);

        let Some(descriptor) = self.analyzable_descriptor(current) else {
            return;
        };
        let Ok((constructor, _)) = select_constructor(&descriptor) else {
            return;
        };
        for dependency in constructor.dependencies() {
            self.build_chain(*dependency, chain);
        }
    }

    fn analyzable_descriptor(&self, key: TypeKey) -> Option<Arc<ComponentDescriptor>> {
        let key = self.container.rebind_key(key);
        self.container
            .registry()
            .descriptor(key)
            .or_else(|| registry::source_descriptor(key))
    }
}
