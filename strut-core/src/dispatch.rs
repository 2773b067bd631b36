//! Handler argument binding and route execution.
//!
//! For each declared handler parameter the binder resolves a value with a
//! fixed precedence: body marker, then path variable, then query parameter,
//! then request-context injection. A parameter with no source yields the
//! tagged [`Binding::Unbindable`] outcome; the dispatcher either passes an
//! absent value (default) or fails, depending on configuration.

use crate::error::Error;
use crate::http::RequestContext;
use crate::reactive::{Multi, Single};
use crate::routing::Route;
use futures_util::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use tracing::{trace, warn};

/// Target type a handler parameter is coerced to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
    Text,
    /// JSON body payload
    Json,
    /// The request context itself
    Context,
}

impl ParamType {
    pub fn name(self) -> &'static str {
        match self {
            ParamType::Bool => "bool",
            ParamType::I8 => "i8",
            ParamType::I16 => "i16",
            ParamType::I32 => "i32",
            ParamType::I64 => "i64",
            ParamType::U8 => "u8",
            ParamType::U16 => "u16",
            ParamType::U32 => "u32",
            ParamType::U64 => "u64",
            ParamType::F32 => "f32",
            ParamType::F64 => "f64",
            ParamType::Char => "char",
            ParamType::Text => "text",
            ParamType::Json => "json",
            ParamType::Context => "context",
        }
    }
}

/// Declared handler parameter: name, target type, body marker.
#[derive(Clone, Debug)]
pub struct ParamSpec {
    name: &'static str,
    ty: ParamType,
    from_body: bool,
}

impl ParamSpec {
    pub fn new(name: &'static str, ty: ParamType) -> Self {
        Self {
            name,
            ty,
            from_body: false,
        }
    }

    /// A parameter bound from the request body.
    pub fn body(name: &'static str, ty: ParamType) -> Self {
        Self {
            name,
            ty,
            from_body: true,
        }
    }

    /// A parameter receiving the request context.
    pub fn context(name: &'static str) -> Self {
        Self::new(name, ParamType::Context)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ty(&self) -> ParamType {
        self.ty
    }

    pub fn is_body(&self) -> bool {
        self.from_body
    }
}

/// A bound handler argument.
#[derive(Clone, Debug)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Char(char),
    Text(String),
    Json(Value),
    Context(RequestContext),
    /// No binding source was found (permissive fallback)
    Absent,
}

/// Outcome of binding one parameter.
#[derive(Debug)]
pub enum Binding {
    Resolved(ParamValue),
    /// No source matched; carries the parameter name
    Unbindable(&'static str),
}

/// Ordered bound arguments handed to a handler.
pub struct BoundArgs {
    values: Vec<ParamValue>,
}

impl BoundArgs {
    pub(crate) fn new(values: Vec<ParamValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ParamValue> {
        self.values.get(index)
    }

    fn expect(&self, index: usize, expected: &'static str) -> Result<&ParamValue, Error> {
        self.values
            .get(index)
            .ok_or(Error::Argument { index, expected })
    }

    pub fn text(&self, index: usize) -> Result<&str, Error> {
        match self.expect(index, "text")? {
            ParamValue::Text(value) => Ok(value),
            _ => Err(Error::Argument {
                index,
                expected: "text",
            }),
        }
    }

    pub fn int(&self, index: usize) -> Result<i64, Error> {
        match self.expect(index, "integer")? {
            ParamValue::Int(value) => Ok(*value),
            _ => Err(Error::Argument {
                index,
                expected: "integer",
            }),
        }
    }

    pub fn uint(&self, index: usize) -> Result<u64, Error> {
        match self.expect(index, "unsigned integer")? {
            ParamValue::Uint(value) => Ok(*value),
            _ => Err(Error::Argument {
                index,
                expected: "unsigned integer",
            }),
        }
    }

    pub fn float(&self, index: usize) -> Result<f64, Error> {
        match self.expect(index, "float")? {
            ParamValue::Float(value) => Ok(*value),
            _ => Err(Error::Argument {
                index,
                expected: "float",
            }),
        }
    }

    pub fn boolean(&self, index: usize) -> Result<bool, Error> {
        match self.expect(index, "bool")? {
            ParamValue::Bool(value) => Ok(*value),
            _ => Err(Error::Argument {
                index,
                expected: "bool",
            }),
        }
    }

    pub fn character(&self, index: usize) -> Result<char, Error> {
        match self.expect(index, "char")? {
            ParamValue::Char(value) => Ok(*value),
            _ => Err(Error::Argument {
                index,
                expected: "char",
            }),
        }
    }

    pub fn json_value(&self, index: usize) -> Result<&Value, Error> {
        match self.expect(index, "json")? {
            ParamValue::Json(value) => Ok(value),
            _ => Err(Error::Argument {
                index,
                expected: "json",
            }),
        }
    }

    /// Deserialize a JSON-bound argument into a typed value.
    pub fn json<T: DeserializeOwned>(&self, index: usize) -> Result<T, Error> {
        serde_json::from_value(self.json_value(index)?.clone())
            .map_err(|error| Error::BodyParse(error.to_string()))
    }

    pub fn context(&self, index: usize) -> Result<&RequestContext, Error> {
        match self.expect(index, "context")? {
            ParamValue::Context(ctx) => Ok(ctx),
            _ => Err(Error::Argument {
                index,
                expected: "context",
            }),
        }
    }

    pub fn is_absent(&self, index: usize) -> bool {
        matches!(self.values.get(index), Some(ParamValue::Absent))
    }
}

/// Coerce a path or query string value to the declared parameter type.
pub fn coerce(raw: &str, target: ParamType) -> Result<ParamValue, Error> {
    fn fail(raw: &str, target: ParamType) -> Error {
        Error::TypeConversion {
            value: raw.to_string(),
            target: target.name(),
        }
    }

    let value = match target {
        ParamType::Bool => ParamValue::Bool(raw.parse::<bool>().map_err(|_| fail(raw, target))?),
        ParamType::I8 => {
            ParamValue::Int(i64::from(raw.parse::<i8>().map_err(|_| fail(raw, target))?))
        }
        ParamType::I16 => {
            ParamValue::Int(i64::from(raw.parse::<i16>().map_err(|_| fail(raw, target))?))
        }
        ParamType::I32 => {
            ParamValue::Int(i64::from(raw.parse::<i32>().map_err(|_| fail(raw, target))?))
        }
        ParamType::I64 => ParamValue::Int(raw.parse::<i64>().map_err(|_| fail(raw, target))?),
        ParamType::U8 => {
            ParamValue::Uint(u64::from(raw.parse::<u8>().map_err(|_| fail(raw, target))?))
        }
        ParamType::U16 => {
            ParamValue::Uint(u64::from(raw.parse::<u16>().map_err(|_| fail(raw, target))?))
        }
        ParamType::U32 => {
            ParamValue::Uint(u64::from(raw.parse::<u32>().map_err(|_| fail(raw, target))?))
        }
        ParamType::U64 => ParamValue::Uint(raw.parse::<u64>().map_err(|_| fail(raw, target))?),
        ParamType::F32 => {
            ParamValue::Float(f64::from(raw.parse::<f32>().map_err(|_| fail(raw, target))?))
        }
        ParamType::F64 => ParamValue::Float(raw.parse::<f64>().map_err(|_| fail(raw, target))?),
        ParamType::Char => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => ParamValue::Char(c),
                _ => return Err(fail(raw, target)),
            }
        }
        ParamType::Text => ParamValue::Text(raw.to_string()),
        // Not coercible from a string segment
        ParamType::Json | ParamType::Context => return Err(fail(raw, target)),
    };
    Ok(value)
}

/// Resolve one handler parameter against the request.
pub fn resolve_parameter(
    spec: &ParamSpec,
    ctx: &RequestContext,
    path_vars: &[(String, String)],
) -> Result<Binding, Error> {
    if spec.is_body() {
        return bind_body(spec, ctx).map(Binding::Resolved);
    }

    if let Some((_, raw)) = path_vars.iter().find(|(name, _)| name == spec.name()) {
        return coerce(raw, spec.ty()).map(Binding::Resolved);
    }

    if let Some(raw) = ctx.query_params.get(spec.name()) {
        return coerce(raw, spec.ty()).map(Binding::Resolved);
    }

    if spec.ty() == ParamType::Context {
        return Ok(Binding::Resolved(ParamValue::Context(ctx.clone())));
    }

    Ok(Binding::Unbindable(spec.name()))
}

fn bind_body(spec: &ParamSpec, ctx: &RequestContext) -> Result<ParamValue, Error> {
    let body = match ctx.body.as_deref() {
        Some(body) if !body.is_empty() => body,
        _ => return Ok(ParamValue::Absent),
    };

    match spec.ty() {
        ParamType::Text => Ok(ParamValue::Text(body.to_string())),
        ParamType::Json => serde_json::from_str(body)
            .map(ParamValue::Json)
            .map_err(|error| Error::BodyParse(error.to_string())),
        other => Err(Error::TypeConversion {
            value: "<body>".to_string(),
            target: other.name(),
        }),
    }
}

/// A handler's return value, before and after normalization.
pub enum ReturnValue {
    /// Single-value asynchronous result, passed through unchanged
    Single(Single<Value>),
    /// Multi-value asynchronous result, passed through unchanged
    Multi(Multi<Value>),
    /// A bare deferred value; normalization adapts it into `Single`
    Future(BoxFuture<'static, Result<Value, Error>>),
    /// A plain value, passed through unchanged
    Value(Value),
    /// Nothing to return
    Empty,
}

impl std::fmt::Debug for ReturnValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReturnValue::Single(_) => f.write_str("Single(..)"),
            ReturnValue::Multi(_) => f.write_str("Multi(..)"),
            ReturnValue::Future(_) => f.write_str("Future(..)"),
            ReturnValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ReturnValue::Empty => f.write_str("Empty"),
        }
    }
}

impl ReturnValue {
    /// Serialize any value into the plain shape.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, Error> {
        serde_json::to_value(value)
            .map(ReturnValue::Value)
            .map_err(|error| Error::Handler(error.to_string()))
    }

    /// Wrap a deferred value.
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        ReturnValue::Future(future.boxed())
    }

    /// Await whatever shape this is and produce the final value. Multi-value
    /// results collect into an array, `Empty` becomes null.
    pub async fn resolve(self) -> Result<Value, Error> {
        match self {
            ReturnValue::Single(single) => single.resolve().await,
            ReturnValue::Multi(multi) => multi.collect().await.map(Value::Array),
            ReturnValue::Future(future) => future.await,
            ReturnValue::Value(value) => Ok(value),
            ReturnValue::Empty => Ok(Value::Null),
        }
    }
}

/// Normalize a handler result: bare futures are adapted into the
/// single-value shape, everything else passes through unchanged.
pub fn normalize_result(value: ReturnValue) -> ReturnValue {
    match value {
        ReturnValue::Future(future) => ReturnValue::Single(Single::from_future(future)),
        passthrough => passthrough,
    }
}

pub(crate) fn execute(
    route: &Route,
    ctx: &RequestContext,
    strict_binding: bool,
) -> Result<ReturnValue, Error> {
    let args = bind_arguments(route, ctx, strict_binding).map_err(|source| {
        Error::RouteExecution {
            route: route.description(),
            source: Box::new(source),
        }
    })?;

    trace!(route = %route.description(), args = args.len(), "invoking handler");
    let value = (route.handler())(route.controller(), &args).map_err(|source| {
        Error::RouteExecution {
            route: route.description(),
            source: Box::new(source),
        }
    })?;

    Ok(normalize_result(value))
}

fn bind_arguments(
    route: &Route,
    ctx: &RequestContext,
    strict_binding: bool,
) -> Result<BoundArgs, Error> {
    let path_vars = route.extract_path_variables(&ctx.path);
    let mut values = Vec::with_capacity(route.params().len());

    for spec in route.params() {
        match resolve_parameter(spec, ctx, &path_vars)? {
            Binding::Resolved(value) => values.push(value),
            Binding::Unbindable(name) => {
                if strict_binding {
                    return Err(Error::UnbindableParameter {
                        name: name.to_string(),
                        route: route.description(),
                    });
                }
                warn!(
                    parameter = name,
                    route = %route.description(),
                    "no binding source, passing absent value"
                );
                values.push(ParamValue::Absent);
            }
        }
    }

    Ok(BoundArgs::new(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_integers() {
        assert!(matches!(coerce("42", ParamType::I32), Ok(ParamValue::Int(42))));
        assert!(matches!(coerce("-7", ParamType::I8), Ok(ParamValue::Int(-7))));
        assert!(matches!(coerce("300", ParamType::U16), Ok(ParamValue::Uint(300))));
    }

    #[test]
    fn test_coerce_overflow_is_a_conversion_error() {
        let error = coerce("128", ParamType::I8).unwrap_err();
        match error {
            Error::TypeConversion { value, target } => {
                assert_eq!(value, "128");
                assert_eq!(target, "i8");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_coerce_bool_is_strict() {
        assert!(matches!(coerce("true", ParamType::Bool), Ok(ParamValue::Bool(true))));
        assert!(matches!(coerce("false", ParamType::Bool), Ok(ParamValue::Bool(false))));
        assert!(coerce("yes", ParamType::Bool).is_err());
    }

    #[test]
    fn test_coerce_char() {
        assert!(matches!(coerce("x", ParamType::Char), Ok(ParamValue::Char('x'))));
        assert!(coerce("xy", ParamType::Char).is_err());
        assert!(coerce("", ParamType::Char).is_err());
    }

    #[test]
    fn test_coerce_floats() {
        assert!(matches!(coerce("2.5", ParamType::F64), Ok(ParamValue::Float(_))));
        assert!(coerce("2.5.1", ParamType::F32).is_err());
    }

    #[test]
    fn test_coerce_unsupported_targets() {
        assert!(coerce("anything", ParamType::Json).is_err());
        assert!(coerce("anything", ParamType::Context).is_err());
    }

    #[test]
    fn test_body_binding_empty_body_is_absent() {
        let spec = ParamSpec::body("payload", ParamType::Text);
        let ctx = RequestContext::new("POST", "/things");
        let value = bind_body(&spec, &ctx).unwrap();
        assert!(matches!(value, ParamValue::Absent));
    }

    #[test]
    fn test_body_binding_text_is_verbatim() {
        let spec = ParamSpec::body("payload", ParamType::Text);
        let ctx = RequestContext::new("POST", "/things").with_body("raw payload");
        match bind_body(&spec, &ctx).unwrap() {
            ParamValue::Text(text) => assert_eq!(text, "raw payload"),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn test_body_binding_malformed_json() {
        let spec = ParamSpec::body("payload", ParamType::Json);
        let ctx = RequestContext::new("POST", "/things").with_body("{not json");
        assert!(matches!(bind_body(&spec, &ctx), Err(Error::BodyParse(_))));
    }

    #[test]
    fn test_resolve_parameter_query_fallback() {
        let spec = ParamSpec::new("page", ParamType::U32);
        let ctx = RequestContext::new("GET", "/users").with_query_param("page", "3");
        match resolve_parameter(&spec, &ctx, &[]).unwrap() {
            Binding::Resolved(ParamValue::Uint(3)) => {}
            other => panic!("unexpected binding: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_parameter_path_wins_over_query() {
        let spec = ParamSpec::new("id", ParamType::I64);
        let ctx = RequestContext::new("GET", "/users/1").with_query_param("id", "999");
        let path_vars = vec![("id".to_string(), "1".to_string())];
        match resolve_parameter(&spec, &ctx, &path_vars).unwrap() {
            Binding::Resolved(ParamValue::Int(1)) => {}
            other => panic!("unexpected binding: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_parameter_context_injection() {
        let spec = ParamSpec::context("ctx");
        let ctx = RequestContext::new("GET", "/users");
        match resolve_parameter(&spec, &ctx, &[]).unwrap() {
            Binding::Resolved(ParamValue::Context(injected)) => {
                assert_eq!(injected.path, "/users");
            }
            other => panic!("unexpected binding: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_parameter_unbindable() {
        let spec = ParamSpec::new("missing", ParamType::Text);
        let ctx = RequestContext::new("GET", "/users");
        assert!(matches!(
            resolve_parameter(&spec, &ctx, &[]).unwrap(),
            Binding::Unbindable("missing")
        ));
    }

    #[tokio::test]
    async fn test_normalize_adapts_bare_futures() {
        let normalized = normalize_result(ReturnValue::future(async {
            Ok(Value::String("later".to_string()))
        }));
        match normalized {
            ReturnValue::Single(single) => {
                assert_eq!(single.resolve().await.unwrap(), Value::String("later".to_string()));
            }
            _ => panic!("expected a single-value result"),
        }
    }

    #[tokio::test]
    async fn test_normalize_passes_values_through() {
        let normalized = normalize_result(ReturnValue::Value(Value::Bool(true)));
        assert!(matches!(normalized, ReturnValue::Value(Value::Bool(true))));
        assert_eq!(
            ReturnValue::Empty.resolve().await.unwrap(),
            Value::Null
        );
    }
}
