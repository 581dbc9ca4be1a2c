//! Input coercion shared by variables, argument literals and resolver parameters.

use crate::schema::{EnumDef, InputObjectDef, Schema, TypeDef, TypeRef};
use crate::value::{Object, Value};
use crate::variables::Variables;
use cinder_syntax::ast;
use thiserror::Error;

/// Why an input value does not fit its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CoercionError(pub String);

impl CoercionError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Coerces a runtime value (a variable or an already-resolved argument)
/// against an input type.
pub fn coerce_value(schema: &Schema, ty: &TypeRef, value: &Value) -> Result<Value, CoercionError> {
    match ty {
        TypeRef::NonNull(inner) => {
            if value.is_null() {
                return Err(CoercionError::new(format!(
                    "Expected non-nullable type \"{ty}\" not to be null."
                )));
            }
            coerce_value(schema, inner, value)
        }
        _ if value.is_null() => Ok(Value::Null),
        TypeRef::List(inner) => match value {
            Value::List(items) => items
                .iter()
                .map(|item| coerce_value(schema, inner, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            single => Ok(Value::List(vec![coerce_value(schema, inner, single)?])),
        },
        TypeRef::Named(name) => match lookup_input(schema, name)? {
            TypeDef::Scalar(_) => coerce_scalar(name, value),
            TypeDef::Enum(def) => match value {
                Value::Enum(member) | Value::String(member) => coerce_enum(def, member),
                other => Err(not_an_enum(def, other)),
            },
            TypeDef::InputObject(def) => match value {
                Value::Object(fields) => coerce_input_object(
                    schema,
                    def,
                    fields.iter().map(|(k, v)| (k.as_str(), Some(v.clone()))),
                ),
                other => Err(CoercionError::new(format!(
                    "Expected type \"{}\" to be an object, found {other}.",
                    def.name
                ))),
            },
            _ => Err(not_input(name)),
        },
    }
}

/// Coerces an argument literal, resolving variable references at any depth.
///
/// An unbound variable inside a list becomes null; inside an object it counts
/// as an omitted field.
pub fn coerce_literal(
    schema: &Schema,
    ty: &TypeRef,
    literal: &ast::Value,
    variables: &Variables,
) -> Result<Value, CoercionError> {
    if let ast::Value::Variable(name) = literal {
        let value = variables.get(name.as_str()).cloned().unwrap_or_default();
        return coerce_value(schema, ty, &value);
    }

    match ty {
        TypeRef::NonNull(inner) => {
            if matches!(literal, ast::Value::Null(_)) {
                return Err(CoercionError::new(format!(
                    "Expected non-nullable type \"{ty}\" not to be null."
                )));
            }
            coerce_literal(schema, inner, literal, variables)
        }
        _ if matches!(literal, ast::Value::Null(_)) => Ok(Value::Null),
        TypeRef::List(inner) => match literal {
            ast::Value::List(items, _) => items
                .iter()
                .map(|item| coerce_literal(schema, inner, item, variables))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            single => Ok(Value::List(vec![coerce_literal(schema, inner, single, variables)?])),
        },
        TypeRef::Named(name) => match lookup_input(schema, name)? {
            TypeDef::Scalar(_) => match literal {
                ast::Value::Float(..) if name == "Int" => Err(CoercionError::new(format!(
                    "Int cannot represent non-integer value: {}",
                    literal_value(literal, variables)
                ))),
                _ => coerce_scalar(name, &literal_value(literal, variables)),
            },
            TypeDef::Enum(def) => match literal {
                ast::Value::Enum(member) => coerce_enum(def, member.as_str()),
                other => Err(not_an_enum(def, &literal_value(other, variables))),
            },
            TypeDef::InputObject(def) => match literal {
                ast::Value::Object(fields, _) => {
                    let mut entries = Vec::with_capacity(fields.len());
                    for (name, value) in fields {
                        let field_def = def
                            .fields
                            .get(name.as_str())
                            .ok_or_else(|| unknown_field(def, name.as_str()))?;
                        let coerced = match value {
                            ast::Value::Variable(var) if !variables.contains_key(var.as_str()) => {
                                None
                            }
                            other => Some(coerce_literal(schema, &field_def.ty, other, variables)?),
                        };
                        entries.push((name.as_str(), coerced));
                    }
                    finish_input_object(schema, def, entries)
                }
                other => Err(CoercionError::new(format!(
                    "Expected type \"{}\" to be an object, found {}.",
                    def.name,
                    literal_value(other, variables)
                ))),
            },
            _ => Err(not_input(name)),
        },
    }
}

/// Converts a literal to a value without type information.
pub fn literal_value(literal: &ast::Value, variables: &Variables) -> Value {
    match literal {
        ast::Value::Variable(name) => variables.get(name.as_str()).cloned().unwrap_or_default(),
        ast::Value::Int(i, _) => Value::Int(*i),
        ast::Value::Float(f, _) => Value::Float(*f),
        ast::Value::String(s, _) => Value::String(s.clone()),
        ast::Value::Boolean(b, _) => Value::Boolean(*b),
        ast::Value::Null(_) => Value::Null,
        ast::Value::Enum(name) => Value::Enum(name.value.clone()),
        ast::Value::List(items, _) => Value::List(
            items
                .iter()
                .map(|item| literal_value(item, variables))
                .collect(),
        ),
        ast::Value::Object(fields, _) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| (name.value.clone(), literal_value(value, variables)))
                .collect(),
        ),
    }
}

fn lookup_input<'s>(schema: &'s Schema, name: &str) -> Result<&'s TypeDef, CoercionError> {
    schema
        .get_type(name)
        .ok_or_else(|| CoercionError::new(format!("Unknown type \"{name}\".")))
}

fn not_input(name: &str) -> CoercionError {
    CoercionError::new(format!("Type \"{name}\" is not an input type."))
}

fn not_an_enum(def: &EnumDef, value: &Value) -> CoercionError {
    CoercionError::new(format!(
        "Enum \"{}\" cannot represent non-enum value: {value}.",
        def.name
    ))
}

fn unknown_field(def: &InputObjectDef, field: &str) -> CoercionError {
    CoercionError::new(format!(
        "Field \"{field}\" is not defined by type \"{}\".",
        def.name
    ))
}

fn coerce_scalar(name: &str, value: &Value) -> Result<Value, CoercionError> {
    let coerced = match (name, value) {
        ("Int", Value::Int(i)) if i32::try_from(*i).is_ok() => Some(Value::Int(*i)),
        ("Int", Value::Int(_)) => {
            return Err(CoercionError::new(format!(
                "Int cannot represent non 32-bit signed integer value: {value}"
            )))
        }
        ("Int", Value::Float(f))
            if f.fract() == 0.0 && *f >= f64::from(i32::MIN) && *f <= f64::from(i32::MAX) =>
        {
            Some(Value::Int(*f as i64))
        }
        ("Int", _) => None,
        ("Float", Value::Int(i)) => Some(Value::Float(*i as f64)),
        ("Float", Value::Float(f)) if f.is_finite() => Some(Value::Float(*f)),
        ("Float", _) => None,
        ("String", Value::String(s)) => Some(Value::String(s.clone())),
        ("String", _) => None,
        ("Boolean", Value::Boolean(b)) => Some(Value::Boolean(*b)),
        ("Boolean", _) => None,
        ("ID", Value::String(s)) => Some(Value::String(s.clone())),
        ("ID", Value::Int(i)) => Some(Value::String(i.to_string())),
        ("ID", _) => None,
        // Custom scalars accept any value.
        (_, other) => Some(other.clone()),
    };

    coerced.ok_or_else(|| CoercionError::new(format!("{name} cannot represent value: {value}")))
}

fn coerce_enum(def: &EnumDef, member: &str) -> Result<Value, CoercionError> {
    if def.value(member).is_some() {
        Ok(Value::Enum(member.to_string()))
    } else {
        Err(CoercionError::new(format!(
            "Value \"{member}\" does not exist in \"{}\" enum.",
            def.name
        )))
    }
}

fn coerce_input_object<'v>(
    schema: &Schema,
    def: &InputObjectDef,
    fields: impl Iterator<Item = (&'v str, Option<Value>)>,
) -> Result<Value, CoercionError> {
    let mut entries = Vec::new();
    for (name, value) in fields {
        let field_def = def.fields.get(name).ok_or_else(|| unknown_field(def, name))?;
        let coerced = match value {
            Some(value) => Some(coerce_value(schema, &field_def.ty, &value)?),
            None => None,
        };
        entries.push((name, coerced));
    }
    finish_input_object(schema, def, entries)
}

/// Orders fields by declaration and fills in defaults for omitted ones.
fn finish_input_object(
    schema: &Schema,
    def: &InputObjectDef,
    entries: Vec<(&str, Option<Value>)>,
) -> Result<Value, CoercionError> {
    let mut object = Object::new();
    for (name, field_def) in &def.fields {
        let provided = entries
            .iter()
            .find(|(key, _)| *key == name)
            .and_then(|(_, value)| value.clone());

        match (provided, &field_def.default_value) {
            (Some(value), _) => {
                object.insert(name.clone(), value);
            }
            (None, Some(default)) => {
                object.insert(name.clone(), coerce_value(schema, &field_def.ty, default)?);
            }
            (None, None) if field_def.ty.is_non_null() => {
                return Err(CoercionError::new(format!(
                    "Field \"{}.{name}\" of required type \"{}\" was not provided.",
                    def.name, field_def.ty
                )));
            }
            (None, None) => {}
        }
    }
    Ok(Value::Object(object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumDef, FieldDef, InputValueDef, ObjectDef, SchemaBuilder};

    fn schema() -> Schema {
        SchemaBuilder::new()
            .query_type("Query")
            .add_type(ObjectDef::new("Query").with_field(FieldDef::new("ok", "Boolean")))
            .add_type(EnumDef::new("Color").with_values(["RED", "GREEN"]))
            .add_type(
                crate::schema::InputObjectDef::new("Filter")
                    .with_field(InputValueDef::new("color", "Color!"))
                    .with_field(InputValueDef::new("limit", "Int").with_default(10))
                    .with_field(InputValueDef::new("tags", "[String!]")),
            )
            .build()
            .unwrap()
    }

    fn literal(source: &str) -> ast::Value {
        let doc = cinder_syntax::parse_executable(&format!("{{ f(a: {source}) }}")).unwrap();
        let Some(ast::Selection::Field(field)) = doc
            .operations()
            .next()
            .and_then(|op| op.selection_set.selections.first())
        else {
            panic!("expected field");
        };
        field.arguments[0].value.clone()
    }

    #[test]
    fn test_scalars() {
        let schema = schema();
        let int = TypeRef::from("Int");
        assert_eq!(coerce_value(&schema, &int, &Value::Int(4)), Ok(Value::Int(4)));
        assert!(coerce_value(&schema, &int, &Value::Int(1 << 40)).is_err());
        assert!(coerce_value(&schema, &int, &Value::from("4")).is_err());

        let float = TypeRef::from("Float");
        assert_eq!(coerce_value(&schema, &float, &Value::Int(2)), Ok(Value::Float(2.0)));

        let id = TypeRef::from("ID");
        assert_eq!(coerce_value(&schema, &id, &Value::Int(7)), Ok(Value::from("7")));
        assert!(coerce_value(&schema, &id, &Value::Boolean(true)).is_err());
    }

    #[test]
    fn test_int_rejects_float_literals() {
        let schema = schema();
        let int = TypeRef::from("Int");
        let vars = Variables::new();

        let err = coerce_literal(&schema, &int, &literal("4.0"), &vars).unwrap_err();
        assert!(err.0.starts_with("Int cannot represent non-integer value"), "{err}");
        assert_eq!(coerce_literal(&schema, &int, &literal("4"), &vars), Ok(Value::Int(4)));

        // Whole floats from variables still pass.
        assert_eq!(coerce_value(&schema, &int, &Value::Float(4.0)), Ok(Value::Int(4)));
        let mut vars = Variables::new();
        vars.insert("n".into(), Value::Float(4.0));
        assert_eq!(coerce_literal(&schema, &int, &literal("$n"), &vars), Ok(Value::Int(4)));
    }

    #[test]
    fn test_null_handling() {
        let schema = schema();
        assert_eq!(
            coerce_value(&schema, &TypeRef::from("String"), &Value::Null),
            Ok(Value::Null)
        );
        let err = coerce_value(&schema, &TypeRef::from("String!"), &Value::Null).unwrap_err();
        assert_eq!(err.0, "Expected non-nullable type \"String!\" not to be null.");
    }

    #[test]
    fn test_single_value_becomes_list() {
        let schema = schema();
        assert_eq!(
            coerce_value(&schema, &TypeRef::from("[Int]"), &Value::Int(1)),
            Ok(Value::List(vec![Value::Int(1)]))
        );
    }

    #[test]
    fn test_enum_from_variable_and_literal() {
        let schema = schema();
        let color = TypeRef::from("Color");
        assert_eq!(
            coerce_value(&schema, &color, &Value::from("RED")),
            Ok(Value::Enum("RED".into()))
        );
        assert!(coerce_value(&schema, &color, &Value::from("BLUE")).is_err());

        let vars = Variables::new();
        assert_eq!(
            coerce_literal(&schema, &color, &literal("GREEN"), &vars),
            Ok(Value::Enum("GREEN".into()))
        );
        assert!(coerce_literal(&schema, &color, &literal("\"GREEN\""), &vars).is_err());
    }

    #[test]
    fn test_input_object_defaults_and_unknown_fields() {
        let schema = schema();
        let filter = TypeRef::from("Filter");
        let vars = Variables::new();

        let value = coerce_literal(&schema, &filter, &literal("{ color: RED, tags: \"x\" }"), &vars).unwrap();
        assert_eq!(value.get("limit"), Some(&Value::Int(10)));
        assert_eq!(value.get("tags"), Some(&Value::from(vec!["x"])));

        let err = coerce_literal(&schema, &filter, &literal("{ color: RED, size: 1 }"), &vars).unwrap_err();
        assert_eq!(err.0, "Field \"size\" is not defined by type \"Filter\".");

        let err = coerce_literal(&schema, &filter, &literal("{ limit: 1 }"), &vars).unwrap_err();
        assert!(err.0.contains("Filter.color"));
    }

    #[test]
    fn test_nested_variables() {
        let schema = schema();
        let mut vars = Variables::new();
        vars.insert("c".into(), Value::Enum("GREEN".into()));
        vars.insert("t".into(), Value::from("b"));

        let value = coerce_literal(
            &schema,
            &TypeRef::from("Filter"),
            &literal("{ color: $c, limit: $missing, tags: [\"a\", $t] }"),
            &vars,
        )
        .unwrap();

        assert_eq!(value.get("color"), Some(&Value::Enum("GREEN".into())));
        assert_eq!(value.get("limit"), Some(&Value::Int(10)));
        assert_eq!(value.get("tags"), Some(&Value::from(vec!["a", "b"])));
    }
}
