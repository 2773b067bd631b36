//! Route compilation, discovery, matching, and dispatch.
//!
//! A [`Route`] is an immutable compiled mapping from (verb, path template)
//! to a handler on a controller instance. The [`Router`] builds its table
//! once, eagerly, from the container's registered controllers, then serves
//! lock-free lookups: linear scan per verb, first structurally-matching
//! route wins, registration order breaks ties.

use crate::config::CoreConfig;
use crate::container::Container;
use crate::descriptor::{simple_name_of, Instance};
use crate::dispatch::{self, ParamSpec, ReturnValue};
use crate::error::Error;
use crate::http::{HttpMethod, RequestContext};
use crate::route_registry::{self, RouteHandlerFn};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A single compiled route.
#[derive(Clone)]
pub struct Route {
    method: HttpMethod,
    path: String,
    pattern: Regex,
    param_names: Vec<String>,
    params: Vec<ParamSpec>,
    handler: RouteHandlerFn,
    handler_name: String,
    controller: Instance,
    controller_name: String,
}

impl Route {
    /// Compile a route. The path must already be normalized (leading `/`,
    /// non-empty); a malformed template is an error, never skipped.
    pub fn new(
        method: HttpMethod,
        path: String,
        params: Vec<ParamSpec>,
        handler: RouteHandlerFn,
        handler_name: impl Into<String>,
        controller: Instance,
        controller_type_name: &str,
    ) -> Result<Self, Error> {
        let (pattern, param_names) = compile_template(&path)?;
        Ok(Self {
            method,
            path,
            pattern,
            param_names,
            params,
            handler,
            handler_name: handler_name.into(),
            controller,
            controller_name: simple_name_of(controller_type_name).to_string(),
        })
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The original path template.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Declared parameter names, in template order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub(crate) fn handler(&self) -> &RouteHandlerFn {
        &self.handler
    }

    pub(crate) fn controller(&self) -> &Instance {
        &self.controller
    }

    /// Whether the compiled matcher fully matches the path.
    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    /// Extract path variables from a matching path, in declared order.
    /// An unmatched path yields no variables.
    pub fn extract_path_variables(&self, path: &str) -> Vec<(String, String)> {
        let Some(captures) = self.pattern.captures(path) else {
            return Vec::new();
        };
        self.param_names
            .iter()
            .enumerate()
            .filter_map(|(index, name)| {
                captures
                    .get(index + 1)
                    .map(|capture| (name.clone(), capture.as_str().to_string()))
            })
            .collect()
    }

    pub fn has_path_parameters(&self) -> bool {
        !self.param_names.is_empty()
    }

    pub fn parameter_count(&self) -> usize {
        self.param_names.len()
    }

    /// Route description for logging and error messages,
    /// e.g. `GET /users/{id} -> UserController::get_user`.
    pub fn description(&self) -> String {
        format!(
            "{} {} -> {}::{}",
            self.method.as_str(),
            self.path,
            self.controller_name,
            self.handler_name
        )
    }
}

/// Default an empty template to `/` + the lower-cased handler name and
/// ensure a leading `/`.
pub fn normalize_template(raw: &str, handler_name: &str) -> String {
    if raw.is_empty() {
        format!("/{}", handler_name.to_lowercase())
    } else if raw.starts_with('/') {
        raw.to_string()
    } else {
        format!("/{raw}")
    }
}

/// Compile a path template: each `{name}` placeholder becomes a
/// single-segment capturing group, literal text is escaped, and the whole
/// pattern is anchored at both ends. Returns the matcher and the parameter
/// names in template order.
fn compile_template(template: &str) -> Result<(Regex, Vec<String>), Error> {
    let malformed = |reason: &str| Error::InvalidRouteTemplate {
        template: template.to_string(),
        reason: reason.to_string(),
    };

    let mut pattern = String::from("^");
    let mut names = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                pattern.push_str(&regex::escape(&literal));
                literal.clear();

                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    match n {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => return Err(malformed("nested '{' in placeholder")),
                        other => name.push(other),
                    }
                }
                if !closed {
                    return Err(malformed("unterminated '{' placeholder"));
                }
                if name.is_empty() {
                    return Err(malformed("empty placeholder name"));
                }
                names.push(name);
                pattern.push_str("([^/]+)");
            }
            '}' => return Err(malformed("unmatched '}'")),
            other => literal.push(other),
        }
    }
    pattern.push_str(&regex::escape(&literal));
    pattern.push('$');

    let regex = Regex::new(&pattern).map_err(|error| Error::InvalidRouteTemplate {
        template: template.to_string(),
        reason: error.to_string(),
    })?;
    Ok((regex, names))
}

/// Route table statistics.
#[derive(Debug, Clone)]
pub struct RouteStats {
    pub total: usize,
    pub by_method: HashMap<String, usize>,
}

/// Router: owns the route table and dispatches requests against it.
pub struct Router {
    routes: Vec<Arc<Route>>,
    by_method: HashMap<HttpMethod, Vec<Arc<Route>>>,
    config: CoreConfig,
}

impl Router {
    /// An empty router with permissive defaults. Routes are added manually.
    pub fn new() -> Self {
        Self::with_config(CoreConfig::default())
    }

    pub fn with_config(config: CoreConfig) -> Self {
        Self {
            routes: Vec::new(),
            by_method: HashMap::new(),
            config,
        }
    }

    /// Discover routes for every registered controller and build the table.
    ///
    /// Controller instantiation and template compilation failures are fatal
    /// here; a broken route declaration must not be silently skipped.
    pub fn build(container: &Container) -> Result<Self, Error> {
        let mut router = Self::with_config(container.config());

        for key in container.registry().controllers() {
            let instance = container.get_key(key)?;
            for entry in route_registry::routes_by_type_id(key.id()) {
                let method = HttpMethod::from_str(entry.method)
                    .ok_or_else(|| Error::UnsupportedMethod(entry.method.to_string()))?;
                let path = normalize_template(entry.path, entry.handler_name);
                let route = Route::new(
                    method,
                    path,
                    entry.params.clone(),
                    entry.handler.clone(),
                    entry.handler_name,
                    instance.clone(),
                    entry.controller_type_name,
                )?;
                router.register_route(Arc::new(route));
            }
        }

        info!(routes = router.routes.len(), "router initialized");
        for route in &router.routes {
            debug!(route = %route.description(), "route registered");
        }
        Ok(router)
    }

    /// Manually add a route (for tests or dynamic routes).
    pub fn add_route(&mut self, route: Route) {
        self.register_route(Arc::new(route));
    }

    fn register_route(&mut self, route: Arc<Route>) {
        self.by_method
            .entry(route.method())
            .or_default()
            .push(route.clone());
        self.routes.push(route);
    }

    /// Find the first route matching the path for the (case-insensitive)
    /// method. No match is an empty result, not an error.
    pub fn find_route(&self, path: &str, method: &str) -> Option<Arc<Route>> {
        let verb = HttpMethod::from_str(method)?;
        self.by_method
            .get(&verb)?
            .iter()
            .find(|route| route.matches(path))
            .cloned()
    }

    pub fn has_route(&self, path: &str, method: &str) -> bool {
        self.find_route(path, method).is_some()
    }

    pub fn all_routes(&self) -> Vec<Arc<Route>> {
        self.routes.clone()
    }

    pub fn routes_by_method(&self, method: &str) -> Vec<Arc<Route>> {
        HttpMethod::from_str(method)
            .and_then(|verb| self.by_method.get(&verb).cloned())
            .unwrap_or_default()
    }

    /// Resolve and execute the route matching the request.
    pub fn execute_route(
        &self,
        path: &str,
        method: &str,
        ctx: &RequestContext,
    ) -> Result<ReturnValue, Error> {
        let route = self
            .find_route(path, method)
            .ok_or_else(|| Error::RouteNotFound(format!("{} {}", method.to_uppercase(), path)))?;
        dispatch::execute(&route, ctx, self.config.strict_binding)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn stats(&self) -> RouteStats {
        RouteStats {
            total: self.routes.len(),
            by_method: self
                .by_method
                .iter()
                .map(|(method, routes)| (method.as_str().to_string(), routes.len()))
                .collect(),
        }
    }

    /// Remove all routes (for tests).
    pub fn clear_routes(&mut self) {
        self.routes.clear();
        self.by_method.clear();
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
