//! Route entry collection.
//!
//! Route declarations are submitted with [`register_route!`] and collected
//! at startup via `inventory`, keyed by the owning controller's type. The
//! router pulls the entries for each registered controller when it builds
//! the route table.

use crate::descriptor::Instance;
use crate::dispatch::{BoundArgs, ParamSpec, ReturnValue};
use crate::error::Error;
use std::any::TypeId;
use std::sync::Arc;

/// Type-erased route handler: receives the owning controller instance and
/// the bound arguments.
pub type RouteHandlerFn =
    Arc<dyn Fn(&Instance, &BoundArgs) -> Result<ReturnValue, Error> + Send + Sync>;

/// A route declaration collected via inventory.
pub struct RouteEntry {
    /// The type ID of the controller this route belongs to
    pub controller_type_id: TypeId,
    /// The controller type name (for route descriptions)
    pub controller_type_name: &'static str,
    /// HTTP method (GET, POST, ...)
    pub method: &'static str,
    /// Route path template (e.g. "/users/{id}"); empty defaults to the
    /// handler name
    pub path: &'static str,
    /// Handler method name
    pub handler_name: &'static str,
    /// Declared handler parameters, in order
    pub params: Vec<ParamSpec>,
    /// The handler function
    pub handler: RouteHandlerFn,
}

/// A route registration collected at startup via `inventory`.
///
/// The factory is evaluated once, lazily, when the route index is first
/// consulted. The indirection keeps the `inventory::submit!` static
/// initializer const-constructible: the [`RouteEntry`] it builds owns a
/// `Vec` and an `Arc`, neither of which can be constructed in a `const`.
pub struct RouteRegistration {
    factory: fn() -> RouteEntry,
}

impl RouteRegistration {
    pub const fn new(factory: fn() -> RouteEntry) -> Self {
        Self { factory }
    }
}

inventory::collect!(RouteRegistration);

/// Materialize every submitted route registration once, lazily.
fn route_index() -> &'static Vec<RouteEntry> {
    static INDEX: std::sync::OnceLock<Vec<RouteEntry>> = std::sync::OnceLock::new();
    INDEX.get_or_init(|| {
        inventory::iter::<RouteRegistration>
            .into_iter()
            .map(|registration| (registration.factory)())
            .collect()
    })
}

impl RouteEntry {
    pub fn new<C: 'static>(
        method: &'static str,
        path: &'static str,
        handler_name: &'static str,
        params: Vec<ParamSpec>,
        handler: RouteHandlerFn,
    ) -> Self {
        Self {
            controller_type_id: TypeId::of::<C>(),
            controller_type_name: std::any::type_name::<C>(),
            method,
            path,
            handler_name,
            params,
            handler,
        }
    }
}

/// Get all registered routes for a specific controller type
pub fn routes_for_controller<C: 'static>() -> Vec<&'static RouteEntry> {
    routes_by_type_id(TypeId::of::<C>())
}

/// Get all registered routes for a controller by type ID
pub fn routes_by_type_id(type_id: TypeId) -> Vec<&'static RouteEntry> {
    route_index()
        .iter()
        .filter(|entry| entry.controller_type_id == type_id)
        .collect()
}

/// Downcast a type-erased controller instance inside a handler body.
pub fn controller_ref<'a, C: 'static>(
    instance: &'a Instance,
    handler_name: &str,
) -> Result<&'a C, Error> {
    instance.downcast_ref::<C>().ok_or_else(|| {
        Error::Handler(format!(
            "handler {handler_name} bound to a controller of a different type"
        ))
    })
}

/// Submit a route declaration for startup collection.
///
/// ```ignore
/// strut_core::register_route!(
///     UserController, "GET", "/users/{id}", "get_user",
///     [ParamSpec::new("id", ParamType::I64)],
///     |instance, args| {
///         let controller = controller_ref::<UserController>(instance, "get_user")?;
///         controller.get_user(args.int(0)?)
///     }
/// );
/// ```
#[macro_export]
macro_rules! register_route {
    ($controller:ty, $method:expr, $path:expr, $handler_name:expr, [$($param:expr),* $(,)?], $handler:expr) => {
        $crate::inventory::submit! {
            $crate::route_registry::RouteRegistration::new(|| {
                $crate::route_registry::RouteEntry::new::<$controller>(
                    $method,
                    $path,
                    $handler_name,
                    vec![$($param),*],
                    std::sync::Arc::new($handler),
                )
            })
        }
    };
}
