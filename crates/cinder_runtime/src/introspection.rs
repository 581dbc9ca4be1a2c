//! Introspection.
//!
//! The meta-types are ordinary object types whose resolvers read a snapshot
//! of the schema. Every schema built by [`SchemaBuilder`](crate::SchemaBuilder)
//! carries them; the executor answers `__schema` and `__type` at the root.

use crate::error::ResolverError;
use crate::resolver::{FieldResolver, FieldValue, ParamDescriptor, ResolverResult};
use crate::schema::{
    DirectiveDef, DirectiveLocation, EnumDef, EnumValueDef, FieldDef, InputValueDef, ObjectDef,
    Schema, TypeDef, TypeRef,
};
use crate::value::Value;
use indexmap::IndexMap;
use std::any::Any;
use std::sync::Arc;

/// Root fields answered from the schema rather than the root value.
pub fn is_root_field(name: &str) -> bool {
    matches!(name, "__schema" | "__type")
}

/// The `__schema` value of a schema.
pub fn schema_snapshot(schema: &Arc<Schema>) -> FieldValue {
    FieldValue::object(SchemaMeta {
        schema: Arc::clone(schema),
    })
}

/// The `__type(name:)` value of a schema, if the type exists.
pub fn type_snapshot(schema: &Arc<Schema>, name: &str) -> Option<FieldValue> {
    schema
        .get_type(name)
        .map(|_| type_value(schema, TypeRef::named(name)))
}

struct SchemaMeta {
    schema: Arc<Schema>,
}

struct TypeMeta {
    schema: Arc<Schema>,
    ty: TypeRef,
}

impl TypeMeta {
    fn def(&self) -> Option<&TypeDef> {
        match &self.ty {
            TypeRef::Named(name) => self.schema.get_type(name),
            _ => None,
        }
    }

    fn of_type(&self) -> Option<&TypeRef> {
        match &self.ty {
            TypeRef::List(inner) | TypeRef::NonNull(inner) => Some(inner),
            TypeRef::Named(_) => None,
        }
    }

    fn kind(&self) -> &'static str {
        match &self.ty {
            TypeRef::List(_) => "LIST",
            TypeRef::NonNull(_) => "NON_NULL",
            TypeRef::Named(_) => self.def().map_or("SCALAR", |def| def.kind().as_str()),
        }
    }
}

struct FieldMeta {
    schema: Arc<Schema>,
    field: FieldDef,
}

struct InputValueMeta {
    schema: Arc<Schema>,
    value: InputValueDef,
}

struct DirectiveMeta {
    schema: Arc<Schema>,
    directive: DirectiveDef,
}

fn type_value(schema: &Arc<Schema>, ty: TypeRef) -> FieldValue {
    FieldValue::object(TypeMeta {
        schema: Arc::clone(schema),
        ty,
    })
}

fn type_list<'a>(schema: &Arc<Schema>, names: impl IntoIterator<Item = &'a str>) -> FieldValue {
    FieldValue::list(
        names
            .into_iter()
            .map(|name| type_value(schema, TypeRef::named(name))),
    )
}

fn input_values<'a>(
    schema: &Arc<Schema>,
    values: impl IntoIterator<Item = &'a InputValueDef>,
) -> FieldValue {
    FieldValue::list(values.into_iter().map(|value| {
        FieldValue::object(InputValueMeta {
            schema: Arc::clone(schema),
            value: value.clone(),
        })
    }))
}

fn optional(value: Option<&str>) -> FieldValue {
    value.map_or(FieldValue::Null, FieldValue::from)
}

fn parent_as<T: Any>(parent: &FieldValue) -> Result<&T, ResolverError> {
    parent
        .downcast_ref::<T>()
        .ok_or_else(|| ResolverError::message("Introspection field reached with a foreign parent value."))
}

/// An accessor over a meta instance of type `T`.
fn read<T, F>(f: F) -> FieldResolver
where
    T: Any,
    F: Fn(&T) -> FieldValue + Send + Sync + 'static,
{
    FieldResolver::accessor(move |parent| parent_as::<T>(parent).map(&f))
}

/// A resolver over a meta instance of type `T` that honors `includeDeprecated`.
fn read_filtered<T, F>(f: F) -> FieldResolver
where
    T: Any,
    F: Fn(&T, bool) -> FieldValue + Send + Sync + 'static,
{
    FieldResolver::resolver(
        vec![
            ParamDescriptor::context(),
            ParamDescriptor::new("includeDeprecated", "Boolean"),
        ],
        move |params| -> ResolverResult {
            let include = params.get_as::<bool>("includeDeprecated").unwrap_or(false);
            let parent = parent_as::<T>(params.parent()?)?;
            Ok(f(parent, include))
        },
    )
}

fn include_deprecated() -> InputValueDef {
    InputValueDef::new("includeDeprecated", "Boolean").with_default(false)
}

/// Fields of the root type that read the schema.
pub(crate) fn root_fields() -> IndexMap<String, FieldDef> {
    let schema_field = FieldDef::new("__schema", "__Schema!").with_resolver(FieldResolver::resolver(
        vec![ParamDescriptor::context()],
        |params| Ok(schema_snapshot(&params.context()?.schema)),
    ));
    let type_field = FieldDef::new("__type", "__Type")
        .with_argument(InputValueDef::new("name", "String!"))
        .with_resolver(FieldResolver::resolver(
            vec![ParamDescriptor::context(), ParamDescriptor::new("name", "String!")],
            |params| {
                let name: String = params.require("name")?;
                let schema = &params.context()?.schema;
                Ok(type_snapshot(schema, &name).unwrap_or(FieldValue::Null))
            },
        ));

    [schema_field, type_field]
        .into_iter()
        .map(|field| (field.name.clone(), field))
        .collect()
}

/// The meta-types every schema carries.
pub(crate) fn meta_types() -> Vec<TypeDef> {
    vec![
        schema_type().into(),
        type_type().into(),
        field_type().into(),
        input_value_type().into(),
        enum_value_type().into(),
        directive_type().into(),
        EnumDef::new("__TypeKind")
            .with_values([
                "SCALAR",
                "OBJECT",
                "INTERFACE",
                "UNION",
                "ENUM",
                "INPUT_OBJECT",
                "LIST",
                "NON_NULL",
            ])
            .into(),
        EnumDef::new("__DirectiveLocation")
            .with_values(DirectiveLocation::ALL.iter().map(|l| l.as_str()))
            .into(),
    ]
}

fn schema_type() -> ObjectDef {
    ObjectDef::new("__Schema")
        .with_field(FieldDef::new("description", "String").with_resolver(read(
            |meta: &SchemaMeta| optional(meta.schema.description.as_deref()),
        )))
        .with_field(FieldDef::new("types", "[__Type!]!").with_resolver(read(
            |meta: &SchemaMeta| type_list(&meta.schema, meta.schema.types.keys().map(String::as_str)),
        )))
        .with_field(FieldDef::new("queryType", "__Type!").with_resolver(read(
            |meta: &SchemaMeta| root_type(&meta.schema, meta.schema.query_type.as_deref()),
        )))
        .with_field(FieldDef::new("mutationType", "__Type").with_resolver(read(
            |meta: &SchemaMeta| root_type(&meta.schema, meta.schema.mutation_type.as_deref()),
        )))
        .with_field(FieldDef::new("subscriptionType", "__Type").with_resolver(read(
            |meta: &SchemaMeta| root_type(&meta.schema, meta.schema.subscription_type.as_deref()),
        )))
        .with_field(FieldDef::new("directives", "[__Directive!]!").with_resolver(read(
            |meta: &SchemaMeta| {
                FieldValue::list(meta.schema.directives.values().map(|directive| {
                    FieldValue::object(DirectiveMeta {
                        schema: Arc::clone(&meta.schema),
                        directive: directive.clone(),
                    })
                }))
            },
        )))
}

fn root_type(schema: &Arc<Schema>, name: Option<&str>) -> FieldValue {
    name.map_or(FieldValue::Null, |name| type_value(schema, TypeRef::named(name)))
}

fn type_type() -> ObjectDef {
    ObjectDef::new("__Type")
        .with_field(
            FieldDef::new("kind", "__TypeKind!")
                .with_resolver(read(|meta: &TypeMeta| FieldValue::from(meta.kind()))),
        )
        .with_field(
            FieldDef::new("name", "String")
                .with_resolver(read(|meta: &TypeMeta| optional(meta.def().map(TypeDef::name)))),
        )
        .with_field(FieldDef::new("description", "String").with_resolver(read(
            |meta: &TypeMeta| optional(meta.def().and_then(TypeDef::description)),
        )))
        .with_field(FieldDef::new("specifiedByURL", "String").with_resolver(read(
            |meta: &TypeMeta| match meta.def() {
                Some(TypeDef::Scalar(scalar)) => optional(scalar.specified_by_url.as_deref()),
                _ => FieldValue::Null,
            },
        )))
        .with_field(
            FieldDef::new("fields", "[__Field!]")
                .with_argument(include_deprecated())
                .with_resolver(read_filtered(|meta: &TypeMeta, include| {
                    let fields = match meta.def() {
                        Some(TypeDef::Object(object)) => &object.fields,
                        Some(TypeDef::Interface(interface)) => &interface.fields,
                        _ => return FieldValue::Null,
                    };
                    FieldValue::list(
                        fields
                            .values()
                            .filter(|field| include || !field.deprecated)
                            .map(|field| {
                                FieldValue::object(FieldMeta {
                                    schema: Arc::clone(&meta.schema),
                                    field: field.clone(),
                                })
                            }),
                    )
                })),
        )
        .with_field(FieldDef::new("interfaces", "[__Type!]").with_resolver(read(
            |meta: &TypeMeta| match meta.def() {
                Some(TypeDef::Object(object)) => {
                    type_list(&meta.schema, object.implements.iter().map(String::as_str))
                }
                Some(TypeDef::Interface(interface)) => {
                    type_list(&meta.schema, interface.implements.iter().map(String::as_str))
                }
                _ => FieldValue::Null,
            },
        )))
        .with_field(FieldDef::new("possibleTypes", "[__Type!]").with_resolver(read(
            |meta: &TypeMeta| match meta.def() {
                Some(TypeDef::Union(union)) => {
                    type_list(&meta.schema, union.members.iter().map(String::as_str))
                }
                Some(TypeDef::Interface(interface)) => type_list(
                    &meta.schema,
                    meta.schema
                        .possible_types(&interface.name)
                        .into_iter()
                        .map(|object| object.name.as_str()),
                ),
                _ => FieldValue::Null,
            },
        )))
        .with_field(
            FieldDef::new("enumValues", "[__EnumValue!]")
                .with_argument(include_deprecated())
                .with_resolver(read_filtered(|meta: &TypeMeta, include| match meta.def() {
                    Some(TypeDef::Enum(def)) => FieldValue::list(
                        def.values
                            .iter()
                            .filter(|value| include || !value.deprecated)
                            .map(|value| FieldValue::object(value.clone())),
                    ),
                    _ => FieldValue::Null,
                })),
        )
        .with_field(FieldDef::new("inputFields", "[__InputValue!]").with_resolver(read(
            |meta: &TypeMeta| match meta.def() {
                Some(TypeDef::InputObject(input)) => input_values(&meta.schema, input.fields.values()),
                _ => FieldValue::Null,
            },
        )))
        .with_field(FieldDef::new("ofType", "__Type").with_resolver(read(
            |meta: &TypeMeta| {
                meta.of_type()
                    .map_or(FieldValue::Null, |inner| type_value(&meta.schema, inner.clone()))
            },
        )))
}

fn field_type() -> ObjectDef {
    ObjectDef::new("__Field")
        .with_field(
            FieldDef::new("name", "String!")
                .with_resolver(read(|meta: &FieldMeta| FieldValue::from(meta.field.name.as_str()))),
        )
        .with_field(FieldDef::new("description", "String").with_resolver(read(
            |meta: &FieldMeta| optional(meta.field.description.as_deref()),
        )))
        .with_field(FieldDef::new("args", "[__InputValue!]!").with_resolver(read(
            |meta: &FieldMeta| input_values(&meta.schema, meta.field.arguments.values()),
        )))
        .with_field(FieldDef::new("type", "__Type!").with_resolver(read(
            |meta: &FieldMeta| type_value(&meta.schema, meta.field.ty.clone()),
        )))
        .with_field(
            FieldDef::new("isDeprecated", "Boolean!")
                .with_resolver(read(|meta: &FieldMeta| FieldValue::from(meta.field.deprecated))),
        )
        .with_field(FieldDef::new("deprecationReason", "String").with_resolver(read(
            |meta: &FieldMeta| optional(meta.field.deprecation_reason.as_deref()),
        )))
}

fn input_value_type() -> ObjectDef {
    ObjectDef::new("__InputValue")
        .with_field(FieldDef::new("name", "String!").with_resolver(read(
            |meta: &InputValueMeta| FieldValue::from(meta.value.name.as_str()),
        )))
        .with_field(FieldDef::new("description", "String").with_resolver(read(
            |meta: &InputValueMeta| optional(meta.value.description.as_deref()),
        )))
        .with_field(FieldDef::new("type", "__Type!").with_resolver(read(
            |meta: &InputValueMeta| type_value(&meta.schema, meta.value.ty.clone()),
        )))
        .with_field(FieldDef::new("defaultValue", "String").with_resolver(read(
            |meta: &InputValueMeta| {
                meta.value
                    .default_value
                    .as_ref()
                    .map_or(FieldValue::Null, |value| FieldValue::from(value.to_string()))
            },
        )))
}

fn enum_value_type() -> ObjectDef {
    ObjectDef::new("__EnumValue")
        .with_field(
            FieldDef::new("name", "String!")
                .with_resolver(read(|value: &EnumValueDef| FieldValue::from(value.name.as_str()))),
        )
        .with_field(FieldDef::new("description", "String").with_resolver(read(
            |value: &EnumValueDef| optional(value.description.as_deref()),
        )))
        .with_field(
            FieldDef::new("isDeprecated", "Boolean!")
                .with_resolver(read(|value: &EnumValueDef| FieldValue::from(value.deprecated))),
        )
        .with_field(FieldDef::new("deprecationReason", "String").with_resolver(read(
            |value: &EnumValueDef| optional(value.deprecation_reason.as_deref()),
        )))
}

fn directive_type() -> ObjectDef {
    ObjectDef::new("__Directive")
        .with_field(FieldDef::new("name", "String!").with_resolver(read(
            |meta: &DirectiveMeta| FieldValue::from(meta.directive.name.as_str()),
        )))
        .with_field(FieldDef::new("description", "String").with_resolver(read(
            |meta: &DirectiveMeta| optional(meta.directive.description.as_deref()),
        )))
        .with_field(FieldDef::new("isRepeatable", "Boolean!").with_resolver(read(
            |meta: &DirectiveMeta| FieldValue::from(meta.directive.repeatable),
        )))
        .with_field(FieldDef::new("locations", "[__DirectiveLocation!]!").with_resolver(read(
            |meta: &DirectiveMeta| {
                FieldValue::List(
                    meta.directive
                        .locations
                        .iter()
                        .map(|location| Ok(FieldValue::from(Value::Enum(location.as_str().to_string()))))
                        .collect(),
                )
            },
        )))
        .with_field(FieldDef::new("args", "[__InputValue!]!").with_resolver(read(
            |meta: &DirectiveMeta| input_values(&meta.schema, meta.directive.arguments.values()),
        )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaBuilder;

    #[test]
    fn test_meta_types_are_registered() {
        let schema = SchemaBuilder::new()
            .query_type("Query")
            .add_type(ObjectDef::new("Query").with_field(FieldDef::new("a", "Int")))
            .build()
            .unwrap();
        for name in ["__Schema", "__Type", "__Field", "__InputValue", "__EnumValue", "__Directive"] {
            assert!(schema.object(name).is_some(), "{name}");
        }
        assert!(matches!(schema.get_type("__TypeKind"), Some(TypeDef::Enum(_))));
    }

    #[test]
    fn test_type_meta_kinds() {
        let schema = Arc::new(
            SchemaBuilder::new()
                .query_type("Query")
                .add_type(ObjectDef::new("Query").with_field(FieldDef::new("a", "Int")))
                .build()
                .unwrap(),
        );
        let meta = |ty: &str| TypeMeta {
            schema: Arc::clone(&schema),
            ty: TypeRef::from(ty),
        };
        assert_eq!(meta("Query").kind(), "OBJECT");
        assert_eq!(meta("[Int]").kind(), "LIST");
        assert_eq!(meta("Int!").kind(), "NON_NULL");
        assert_eq!(meta("Int!").of_type(), Some(&TypeRef::named("Int")));
        assert!(type_snapshot(&schema, "Missing").is_none());
        assert!(is_root_field("__type") && !is_root_field("__typename"));
    }
}
