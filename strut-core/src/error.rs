// Error types for the Strut runtime

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot resolve dependency {type_name}: {reason}")]
    DependencyResolution { type_name: String, reason: String },

    #[error("circular dependency detected: {path}")]
    CircularDependency { path: String },

    #[error("failed to construct {type_name}")]
    Instantiation {
        type_name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("ambiguous constructor selection for {0}")]
    AmbiguousConstructor(String),

    #[error("no constructor declared for {0}")]
    MissingConstructor(String),

    #[error("route not found: {0}")]
    RouteNotFound(String),

    #[error("failed to execute route {route}")]
    RouteExecution {
        route: String,
        #[source]
        source: Box<Error>,
    },

    #[error("cannot convert {value:?} to {target}")]
    TypeConversion { value: String, target: &'static str },

    #[error("failed to parse request body: {0}")]
    BodyParse(String),

    #[error("invalid route template {template:?}: {reason}")]
    InvalidRouteTemplate { template: String, reason: String },

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("parameter {name:?} of {route} has no binding source")]
    UnbindableParameter { name: String, route: String },

    #[error("handler argument {index}: expected {expected}")]
    Argument { index: usize, expected: &'static str },

    #[error("{0}")]
    Handler(String),
}

impl Error {
    /// Walk the source chain to the innermost error.
    ///
    /// Construction and dispatch failures wrap their cause once per layer;
    /// this unwraps them for callers that only care about the origin.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Instantiation { source, .. } => source.root_cause(),
            Error::RouteExecution { source, .. } => source.root_cause(),
            _ => self,
        }
    }
}
