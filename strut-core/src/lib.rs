// Core library for the Strut runtime
// Dependency injection container, component registry, route discovery and dispatch

pub mod config;
pub mod container;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod reactive;
pub mod registry;
pub mod resolver;
pub mod route_registry;
pub mod routing;

// Re-export the logging bootstrap and the inventory crate (used by the
// registration macros)
pub use strut_log as logging;
pub use inventory;

// Re-export commonly used types
pub use config::CoreConfig;
pub use container::Container;
pub use descriptor::{
    ComponentDescriptor, ComponentKind, ConstructFn, Constructor, Instance, ResolvedArgs, TypeKey,
};
pub use dispatch::{
    coerce, normalize_result, resolve_parameter, Binding, BoundArgs, ParamSpec, ParamType,
    ParamValue, ReturnValue,
};
pub use error::Error;
pub use http::{parse_query_string, HttpMethod, RequestContext};
pub use reactive::{Multi, Single};
pub use registry::{ComponentRegistration, ComponentRegistry};
pub use resolver::{
    select_constructor, CycleStatus, DependencyResolver, SelectionBasis,
};
pub use route_registry::{
    controller_ref, routes_by_type_id, routes_for_controller, RouteEntry, RouteHandlerFn,
};
pub use routing::{normalize_template, Route, RouteStats, Router};
