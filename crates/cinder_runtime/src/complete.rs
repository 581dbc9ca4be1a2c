//! Value completion.
//!
//! Turns raw resolver output into response values against the declared
//! output type. Field errors are recorded in the execution context as they
//! are found. A non-null violation is reported once and then travels upward
//! as [`Bubble`] until a nullable position absorbs it.

use crate::arguments::resolve_arguments;
use crate::collect::{collect_fields, GroupedFields};
use crate::context::ExecutionContext;
use crate::error::{FieldError, ResolverError};
use crate::path::Path;
use crate::resolver::{invoke, FieldValue, ParentContext};
use crate::schema::{EnumDef, FieldDef, TypeDef, TypeRef};
use crate::value::{Object, Value};
use cinder_syntax::ast::Field;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{error, warn};

/// A null in a non-null position. The error is already recorded; the
/// nearest nullable ancestor becomes null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Bubble;

pub(crate) type Completed = Result<Value, Bubble>;

/// Executes every field group of one object, assembling the record in
/// collected order.
///
/// Groups run concurrently unless `serial` is set, in which case each group
/// is fully completed before the next one starts.
pub(crate) async fn execute_fields(
    ctx: &ExecutionContext,
    object_type: &str,
    parent: &Arc<FieldValue>,
    groups: &GroupedFields<'_>,
    path: &Path,
    serial: bool,
) -> Completed {
    let mut object = Object::with_capacity(groups.len());

    if serial {
        for (key, fields) in groups {
            let value = execute_field(ctx, object_type, parent, fields, path.field(key)).await?;
            object.insert((*key).to_string(), value);
        }
    } else {
        let results = join_all(
            groups
                .iter()
                .map(|(key, fields)| execute_field(ctx, object_type, parent, fields, path.field(key))),
        )
        .await;
        for ((key, _), result) in groups.iter().zip(results) {
            object.insert((*key).to_string(), result?);
        }
    }

    Ok(Value::Object(object))
}

/// Resolves and completes one field group.
pub(crate) async fn execute_field(
    ctx: &ExecutionContext,
    object_type: &str,
    parent: &Arc<FieldValue>,
    fields: &[&Field],
    path: Path,
) -> Completed {
    let Some(field) = fields.first() else {
        return Ok(Value::Null);
    };
    let name = field.name.as_str();

    if name == "__typename" {
        return Ok(Value::String(object_type.to_string()));
    }

    let Some(field_def) = ctx.schema.field(object_type, name) else {
        let message = format!("Cannot query field \"{name}\" on type \"{object_type}\".");
        record(ctx, message, fields, &path).await;
        return Ok(Value::Null);
    };

    resolve_field(ctx, object_type, parent, fields, field_def, path).await
}

/// Resolves one field group with a known definition and completes the result.
pub(crate) async fn resolve_field(
    ctx: &ExecutionContext,
    object_type: &str,
    parent: &Arc<FieldValue>,
    fields: &[&Field],
    field_def: &FieldDef,
    path: Path,
) -> Completed {
    let Some(field) = fields.first() else {
        return Ok(Value::Null);
    };
    let name = field.name.as_str();

    let result = match resolve_arguments(&ctx.schema, field_def, field, &ctx.variables) {
        Ok(args) => {
            let resolution = invoke(&ctx.schema, field_def, parent, &args, || ParentContext {
                parent: Arc::clone(parent),
                parent_type: object_type.to_string(),
                field_name: name.to_string(),
                path: path.clone(),
                schema: Arc::clone(&ctx.schema),
                data: Arc::clone(&ctx.data),
            });
            resolution.resolve().await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(value) => complete_value(ctx, object_type, fields, &field_def.ty, path, value).await,
        Err(e) => {
            record_resolver_error(ctx, object_type, fields, &path, e).await;
            if field_def.ty.is_non_null() {
                Err(Bubble)
            } else {
                Ok(Value::Null)
            }
        }
    }
}

/// Completes a value against its declared type.
///
/// Nullable positions absorb bubbles; non-null positions report a null once
/// and pass inner bubbles through.
pub(crate) fn complete_value<'a>(
    ctx: &'a ExecutionContext,
    parent_type: &'a str,
    fields: &'a [&'a Field],
    ty: &'a TypeRef,
    path: Path,
    value: FieldValue,
) -> BoxFuture<'a, Completed> {
    async move {
        match ty {
            TypeRef::NonNull(inner) => {
                let completed = complete_inner(ctx, parent_type, fields, inner, &path, value).await?;
                if completed.is_null() {
                    let message = format!(
                        "Cannot return null for non-nullable field {parent_type}.{}.",
                        field_name(fields)
                    );
                    record(ctx, message, fields, &path).await;
                    return Err(Bubble);
                }
                Ok(completed)
            }
            _ => Ok(complete_inner(ctx, parent_type, fields, ty, &path, value)
                .await
                .unwrap_or(Value::Null)),
        }
    }
    .boxed()
}

async fn complete_inner(
    ctx: &ExecutionContext,
    parent_type: &str,
    fields: &[&Field],
    ty: &TypeRef,
    path: &Path,
    value: FieldValue,
) -> Completed {
    let named = match ty {
        TypeRef::NonNull(_) => {
            return complete_value(ctx, parent_type, fields, ty, path.clone(), value).await;
        }
        _ if value.is_null() => return Ok(Value::Null),
        TypeRef::List(inner) => {
            return complete_list(ctx, parent_type, fields, inner, path, value).await;
        }
        TypeRef::Named(named) => named.as_str(),
    };

    let schema = Arc::clone(&ctx.schema);
    match schema.get_type(named) {
        Some(TypeDef::Object(_)) => complete_object(ctx, named, fields, path, value).await,
        Some(TypeDef::Interface(_) | TypeDef::Union(_)) => {
            let Some(object_type) = runtime_type(ctx, named, &value) else {
                let message = format!(
                    "Abstract type \"{named}\" must resolve to an Object type at runtime for field \"{parent_type}.{}\".",
                    field_name(fields)
                );
                record(ctx, message, fields, path).await;
                return Err(Bubble);
            };
            if !schema.is_possible_type(named, &object_type) {
                let message = format!(
                    "Runtime Object type \"{object_type}\" is not a possible type for \"{named}\"."
                );
                record(ctx, message, fields, path).await;
                return Err(Bubble);
            }
            complete_object(ctx, &object_type, fields, path, value).await
        }
        Some(TypeDef::Enum(def)) => match serialize_enum(def, &value) {
            Some(name) => Ok(Value::Enum(name)),
            None => {
                let message = format!(
                    "Enum \"{}\" cannot represent value: {}",
                    def.name,
                    describe(&value)
                );
                record(ctx, message, fields, path).await;
                Err(Bubble)
            }
        },
        _ => match leaf_value(value) {
            Some(value) => Ok(value),
            None => {
                let message = format!(
                    "Expected a value of type \"{named}\" for field \"{parent_type}.{}\".",
                    field_name(fields)
                );
                record(ctx, message, fields, path).await;
                Err(Bubble)
            }
        },
    }
}

async fn complete_list(
    ctx: &ExecutionContext,
    parent_type: &str,
    fields: &[&Field],
    item_type: &TypeRef,
    path: &Path,
    value: FieldValue,
) -> Completed {
    let items = match value {
        FieldValue::List(items) => items,
        FieldValue::Value(Value::List(values)) => {
            values.into_iter().map(|v| Ok(FieldValue::from(v))).collect()
        }
        _ => {
            let message = format!(
                "Expected Iterable, but did not find one for field \"{parent_type}.{}\".",
                field_name(fields)
            );
            record(ctx, message, fields, path).await;
            return Err(Bubble);
        }
    };

    let completed = join_all(items.into_iter().enumerate().map(|(index, item)| {
        let path = path.index(index);
        async move {
            match item {
                Ok(value) => complete_value(ctx, parent_type, fields, item_type, path, value).await,
                Err(e) => {
                    record_resolver_error(ctx, parent_type, fields, &path, e).await;
                    if item_type.is_non_null() {
                        Err(Bubble)
                    } else {
                        Ok(Value::Null)
                    }
                }
            }
        }
    }))
    .await;

    completed
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

/// Completes an object of a known concrete type, reusing an earlier result
/// for the same instance and selection when memoization is on.
///
/// Occurrences of a key that arrive while its first completion is still
/// running wait for it. A completion that recorded errors is not shared, so
/// each occurrence reports its own errors at its own path.
async fn complete_object(
    ctx: &ExecutionContext,
    object_type: &str,
    fields: &[&Field],
    path: &Path,
    value: FieldValue,
) -> Completed {
    let cell = match value.as_instance() {
        Some(instance) => {
            let key = (instance.identity(), object_type.to_string(), selection_identity(fields));
            ctx.memo_cell(key, instance).await
        }
        None => None,
    };
    let parent = Arc::new(value);

    let Some(cell) = cell else {
        return complete_object_fields(ctx, object_type, fields, path, &parent).await;
    };

    let mut first = None;
    let slot = &mut first;
    let parent_ref = &parent;
    let shared = cell
        .get_or_init(move || async move {
            let errors_before = ctx.error_count().await;
            let completed = complete_object_fields(ctx, object_type, fields, path, parent_ref).await;
            let clean = ctx.error_count().await == errors_before;
            let shared = completed.as_ref().ok().filter(|_| clean).cloned();
            *slot = Some(completed);
            shared
        })
        .await;

    match (first, shared) {
        (Some(completed), _) => completed,
        (None, Some(value)) => Ok(value.clone()),
        (None, None) => complete_object_fields(ctx, object_type, fields, path, &parent).await,
    }
}

async fn complete_object_fields(
    ctx: &ExecutionContext,
    object_type: &str,
    fields: &[&Field],
    path: &Path,
    parent: &Arc<FieldValue>,
) -> Completed {
    let groups = collect_fields(
        &ctx.schema,
        &ctx.document,
        &ctx.variables,
        object_type,
        fields.iter().filter_map(|field| field.selection_set.as_ref()),
    );
    execute_fields(ctx, object_type, parent, &groups, path, false).await
}

/// Names the concrete object type of a value of an abstract type.
fn runtime_type(ctx: &ExecutionContext, abstract_type: &str, value: &FieldValue) -> Option<String> {
    let resolve_type = match ctx.schema.get_type(abstract_type) {
        Some(TypeDef::Interface(def)) => def.resolve_type.as_ref(),
        Some(TypeDef::Union(def)) => def.resolve_type.as_ref(),
        _ => None,
    };

    resolve_type
        .and_then(|f| f.call(value))
        .or_else(|| value.as_instance().and_then(|i| i.type_name().map(str::to_string)))
        .or_else(|| {
            let record = match value {
                FieldValue::Value(v) => Some(v),
                FieldValue::Object(instance) => instance.downcast_ref::<Value>(),
                _ => None,
            };
            record
                .and_then(|v| v.get("__typename"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
}

/// Declared name of the enum member a value stands for.
fn serialize_enum(def: &EnumDef, value: &FieldValue) -> Option<String> {
    let value = value.as_value()?;
    if let Some(name) = value.as_str() {
        if let Some(member) = def.value(name) {
            return Some(member.name.clone());
        }
    }
    def.values
        .iter()
        .find(|member| member.value.as_ref() == Some(value))
        .map(|member| member.name.clone())
}

fn leaf_value(value: FieldValue) -> Option<Value> {
    match value {
        FieldValue::Null => Some(Value::Null),
        FieldValue::Value(value) => Some(value),
        FieldValue::Object(instance) => instance.downcast_ref::<Value>().cloned(),
        FieldValue::List(_) => None,
    }
}

fn describe(value: &FieldValue) -> String {
    match value {
        FieldValue::Value(value) => value.to_string(),
        other => format!("{other:?}"),
    }
}

fn field_name<'f>(fields: &[&'f Field]) -> &'f str {
    fields.first().map_or("", |field| field.name.as_str())
}

/// Identifies a field group by the addresses of its selections.
fn selection_identity(fields: &[&Field]) -> usize {
    let mut hasher = FxHasher::default();
    for field in fields {
        (*field as *const Field as usize).hash(&mut hasher);
    }
    hasher.finish() as usize
}

async fn record(ctx: &ExecutionContext, message: String, fields: &[&Field], path: &Path) {
    ctx.record(field_error(ctx, message, fields, path)).await;
}

fn field_error(ctx: &ExecutionContext, message: String, fields: &[&Field], path: &Path) -> FieldError {
    FieldError::new(message)
        .with_locations(ctx.locations(fields))
        .with_path(path)
}

async fn record_resolver_error(
    ctx: &ExecutionContext,
    parent_type: &str,
    fields: &[&Field],
    path: &Path,
    error: ResolverError,
) {
    let field = field_name(fields);
    let message = if error.is_internal() {
        error!(%path, parent_type, field, error = %error, "internal error in resolver");
        if ctx.config.mask_internal_errors {
            format!("Internal error resolving field \"{parent_type}.{field}\"")
        } else {
            error.to_string()
        }
    } else {
        warn!(%path, parent_type, field, error = %error, "resolver failed");
        error.to_string()
    };
    let mut reported = field_error(ctx, message, fields, path);
    if let Some(code) = error.code() {
        reported = reported.with_code(code);
    }
    ctx.record(reported).await;
}
