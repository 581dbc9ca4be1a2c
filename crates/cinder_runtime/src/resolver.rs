//! Resolver system for Cinder.
//!
//! A field is resolved either by an [`FieldResolver::Accessor`], which only
//! sees the parent value, or by a [`FieldResolver::Resolver`], whose
//! parameters are described up front by [`ParamDescriptor`]s and bound from
//! the field's arguments at call time.

use crate::arguments::Arguments;
use crate::coerce::coerce_value;
use crate::context::Context;
use crate::error::ResolverError;
use crate::path::Path;
use crate::schema::{FieldDef, Schema, TypeRef};
use crate::value::Value;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Result type for resolvers.
pub type ResolverResult = Result<FieldValue, ResolverError>;

/// Raw resolver output, before completion against the field's type.
pub enum FieldValue {
    Null,
    Value(Value),
    /// A list whose elements may fail individually.
    List(Vec<Result<FieldValue, ResolverError>>),
    /// An opaque object consumed by the resolvers of its type's fields.
    Object(Instance),
}

impl FieldValue {
    /// Wraps a user value as an object instance.
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Self::Object(Instance::new(value))
    }

    /// Wraps a user value as an instance of a known object type.
    pub fn typed_object<T: Any + Send + Sync>(type_name: impl Into<String>, value: T) -> Self {
        Self::Object(Instance::new(value).with_type_name(type_name))
    }

    /// Builds a list of successful elements.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<FieldValue>,
    {
        Self::List(items.into_iter().map(|item| Ok(item.into())).collect())
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Value(Value::Null))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Self::Object(instance) => Some(instance),
            _ => None,
        }
    }

    /// Downcasts an object instance.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_instance().and_then(Instance::downcast_ref)
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Object(instance) => f.debug_tuple("Object").field(instance).finish(),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        if value.is_null() {
            Self::Null
        } else {
            Self::Value(value)
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        Self::from(Value::from(value))
    }
}

impl From<Instance> for FieldValue {
    fn from(instance: Instance) -> Self {
        Self::Object(instance)
    }
}

macro_rules! field_value_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for FieldValue {
            fn from(value: $ty) -> Self {
                Self::from(Value::from(value))
            }
        })*
    };
}

field_value_from!(bool, i32, i64, f64, &str, String);

/// An object value with a stable identity.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: Option<String>,
}

impl Instance {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: None,
        }
    }

    /// Declares the concrete object type, used when completing abstract types.
    #[must_use]
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// Address of the shared value; equal for clones of the same instance.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.value).cast::<()>() as usize
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .field("identity", &self.identity())
            .finish()
    }
}

/// What a resolver returns: a value now, or a computation to await.
pub enum Resolution {
    Ready(ResolverResult),
    Pending(BoxFuture<'static, ResolverResult>),
}

impl Resolution {
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = ResolverResult> + Send + 'static,
    {
        Self::Pending(Box::pin(future))
    }

    /// Awaits the result, whichever form it takes.
    pub async fn resolve(self) -> ResolverResult {
        match self {
            Self::Ready(result) => result,
            Self::Pending(future) => future.await,
        }
    }
}

impl From<ResolverResult> for Resolution {
    fn from(result: ResolverResult) -> Self {
        Self::Ready(result)
    }
}

/// A resolver parameter, described once at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub name: String,
    pub ty: TypeRef,
    /// Receives the [`ParentContext`] instead of an argument.
    pub is_context: bool,
}

impl ParamDescriptor {
    /// A parameter bound from the argument of the same name.
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            is_context: false,
        }
    }

    /// The context parameter.
    pub fn context() -> Self {
        Self {
            name: "context".to_string(),
            ty: TypeRef::named("__Context"),
            is_context: true,
        }
    }
}

pub type AccessorFn = Arc<dyn Fn(&FieldValue) -> Resolution + Send + Sync>;
pub type ResolverFn = Arc<dyn Fn(ResolverParams) -> Resolution + Send + Sync>;

/// How a field obtains its value.
#[derive(Clone)]
pub enum FieldResolver {
    /// Takes the parent value as its only parameter.
    Accessor(AccessorFn),
    /// Takes the parameters listed in its descriptors.
    Resolver(ResolverFn, Vec<ParamDescriptor>),
}

impl FieldResolver {
    /// A synchronous accessor.
    pub fn accessor<F>(f: F) -> Self
    where
        F: Fn(&FieldValue) -> ResolverResult + Send + Sync + 'static,
    {
        Self::Accessor(Arc::new(move |parent| Resolution::Ready(f(parent))))
    }

    /// An accessor that returns a future. The future must own what it needs.
    pub fn accessor_async<F, Fut>(f: F) -> Self
    where
        F: Fn(&FieldValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult> + Send + 'static,
    {
        Self::Accessor(Arc::new(move |parent| Resolution::pending(f(parent))))
    }

    /// A synchronous resolver with explicit parameters.
    pub fn resolver<F>(params: Vec<ParamDescriptor>, f: F) -> Self
    where
        F: Fn(ResolverParams) -> ResolverResult + Send + Sync + 'static,
    {
        Self::Resolver(Arc::new(move |p| Resolution::Ready(f(p))), params)
    }

    /// An asynchronous resolver with explicit parameters.
    pub fn resolver_async<F, Fut>(params: Vec<ParamDescriptor>, f: F) -> Self
    where
        F: Fn(ResolverParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult> + Send + 'static,
    {
        Self::Resolver(Arc::new(move |p| Resolution::pending(f(p))), params)
    }

    /// Parameter descriptors; empty for accessors.
    pub fn params(&self) -> &[ParamDescriptor] {
        match self {
            Self::Accessor(_) => &[],
            Self::Resolver(_, params) => params,
        }
    }
}

impl fmt::Debug for FieldResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accessor(_) => f.write_str("Accessor"),
            Self::Resolver(_, params) => f.debug_tuple("Resolver").field(params).finish(),
        }
    }
}

/// Information about the field being resolved, handed to the context parameter.
#[derive(Clone)]
pub struct ParentContext {
    pub parent: Arc<FieldValue>,
    pub parent_type: String,
    pub field_name: String,
    pub path: Path,
    pub schema: Arc<Schema>,
    pub data: Arc<Context>,
}

impl ParentContext {
    /// Request data of type `T`.
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.get()
    }
}

impl fmt::Debug for ParentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParentContext")
            .field("parent_type", &self.parent_type)
            .field("field_name", &self.field_name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Bound parameters passed to a [`FieldResolver::Resolver`].
#[derive(Debug, Default)]
pub struct ResolverParams {
    values: IndexMap<String, Value>,
    context: Option<ParentContext>,
}

impl ResolverParams {
    /// Gets a parameter by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Gets a parameter as a specific type. Null and absent both give `None`.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.values
            .get(name)
            .filter(|v| !v.is_null())
            .and_then(|v| v.deserialize().ok())
    }

    /// Gets a required parameter, returning an error if missing or malformed.
    pub fn require<T: DeserializeOwned>(&self, name: &str) -> Result<T, ResolverError> {
        self.values
            .get(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| ResolverError::MissingArgument(name.to_string()))
            .and_then(|v| {
                v.deserialize().map_err(|e| ResolverError::InvalidArgument {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            })
    }

    /// The context parameter.
    pub fn context(&self) -> Result<&ParentContext, ResolverError> {
        self.context
            .as_ref()
            .ok_or_else(|| ResolverError::message("Resolver does not declare a context parameter."))
    }

    /// The parent value, through the context parameter.
    pub fn parent(&self) -> Result<&FieldValue, ResolverError> {
        self.context().map(|ctx| ctx.parent.as_ref())
    }

    /// Returns all parameter values in descriptor order.
    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }
}

/// Binds resolved arguments to a resolver's parameters.
pub(crate) fn bind_params(
    schema: &Schema,
    params: &[ParamDescriptor],
    args: &Arguments,
    context: ParentContext,
) -> Result<ResolverParams, ResolverError> {
    let mut bound = ResolverParams::default();
    let mut context = Some(context);

    for param in params {
        if param.is_context {
            bound.context = context.take();
            continue;
        }
        let value = match args.get(&param.name) {
            Some(value) => coerce_value(schema, &param.ty, value).map_err(|e| {
                ResolverError::InvalidArgument {
                    name: param.name.clone(),
                    reason: e.to_string(),
                }
            })?,
            None if param.ty.is_non_null() => {
                return Err(ResolverError::MissingArgument(param.name.clone()))
            }
            None => Value::Null,
        };
        bound.values.insert(param.name.clone(), value);
    }

    Ok(bound)
}

/// Reads the field from a record parent.
///
/// A null parent yields null; a parent that is not a record cannot be read.
pub fn default_resolve(parent: &FieldValue, field_name: &str) -> ResolverResult {
    let record = match parent {
        FieldValue::Null => return Ok(FieldValue::Null),
        FieldValue::Value(value) => value,
        FieldValue::Object(instance) => instance
            .downcast_ref::<Value>()
            .ok_or_else(|| ResolverError::FieldNotFound(field_name.to_string()))?,
        FieldValue::List(_) => return Err(ResolverError::FieldNotFound(field_name.to_string())),
    };

    match record {
        Value::Null => Ok(FieldValue::Null),
        Value::Object(map) => Ok(map
            .get(field_name)
            .cloned()
            .map_or(FieldValue::Null, FieldValue::from)),
        _ => Err(ResolverError::FieldNotFound(field_name.to_string())),
    }
}

/// Invokes the resolver of a field, or the default resolver when it has none.
pub(crate) fn invoke(
    schema: &Schema,
    field_def: &FieldDef,
    parent: &Arc<FieldValue>,
    args: &Arguments,
    context: impl FnOnce() -> ParentContext,
) -> Resolution {
    match &field_def.resolver {
        None => Resolution::Ready(default_resolve(parent, &field_def.name)),
        Some(FieldResolver::Accessor(f)) => f(parent),
        Some(FieldResolver::Resolver(f, params)) => {
            match bind_params(schema, params, args, context()) {
                Ok(bound) => f(bound),
                Err(e) => Resolution::Ready(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ObjectDef, SchemaBuilder};

    fn schema() -> Arc<Schema> {
        Arc::new(
            SchemaBuilder::new()
                .query_type("Query")
                .add_type(ObjectDef::new("Query").with_field(crate::schema::FieldDef::new("a", "Int")))
                .build()
                .unwrap(),
        )
    }

    fn context(schema: &Arc<Schema>, parent: FieldValue) -> ParentContext {
        ParentContext {
            parent: Arc::new(parent),
            parent_type: "Query".to_string(),
            field_name: "a".to_string(),
            path: Path::root().field("a"),
            schema: Arc::clone(schema),
            data: Arc::new(Context::new()),
        }
    }

    #[test]
    fn test_default_resolver() {
        let parent = FieldValue::from(serde_json::json!({"name": "Alice", "age": 30}));
        let value = default_resolve(&parent, "name").unwrap();
        assert_eq!(value.as_value(), Some(&Value::from("Alice")));
        assert!(default_resolve(&parent, "missing").unwrap().is_null());
        assert!(default_resolve(&FieldValue::Null, "name").unwrap().is_null());
        assert!(matches!(
            default_resolve(&FieldValue::from(3), "name"),
            Err(ResolverError::FieldNotFound(_))
        ));
    }

    #[test]
    fn test_default_resolver_reads_record_instances() {
        let parent = FieldValue::object(Value::object([("id", Value::from(1))]));
        let value = default_resolve(&parent, "id").unwrap();
        assert_eq!(value.as_value(), Some(&Value::Int(1)));
    }

    #[test]
    fn test_bind_params() {
        let schema = schema();
        let params = vec![
            ParamDescriptor::new("id", "ID!"),
            ParamDescriptor::context(),
            ParamDescriptor::new("limit", "Int"),
        ];
        let mut args = Arguments::new();
        args.insert("id".into(), Value::Int(42));

        let bound = bind_params(&schema, &params, &args, context(&schema, FieldValue::Null)).unwrap();
        assert_eq!(bound.require::<String>("id").unwrap(), "42");
        assert_eq!(bound.get("limit"), Some(&Value::Null));
        assert_eq!(bound.get_as::<i64>("limit"), None);
        assert_eq!(bound.context().unwrap().field_name, "a");
    }

    #[test]
    fn test_bind_params_missing_required() {
        let schema = schema();
        let params = vec![ParamDescriptor::new("id", "ID!")];
        let err = bind_params(&schema, &params, &Arguments::new(), context(&schema, FieldValue::Null))
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required argument \"id\".");
    }

    #[tokio::test]
    async fn test_invoke_variants() {
        let schema = schema();
        let parent = Arc::new(FieldValue::from(serde_json::json!({"a": 1})));

        let sync = crate::schema::FieldDef::new("a", "Int")
            .with_resolver(FieldResolver::accessor(|_| Ok(FieldValue::from(2))));
        let pending = crate::schema::FieldDef::new("a", "Int").with_resolver(
            FieldResolver::resolver_async(vec![ParamDescriptor::context()], |params| async move {
                let ctx = params.context()?;
                Ok::<_, ResolverError>(FieldValue::from(ctx.path.len() as i64 + 2))
            }),
        );
        let default = crate::schema::FieldDef::new("a", "Int");

        for (def, expected) in [(sync, 2), (pending, 3), (default, 1)] {
            let resolution = invoke(&schema, &def, &parent, &Arguments::new(), || {
                context(&schema, FieldValue::Null)
            });
            let value = resolution.resolve().await.unwrap();
            assert_eq!(value.as_value(), Some(&Value::Int(expected)));
        }
    }
}
