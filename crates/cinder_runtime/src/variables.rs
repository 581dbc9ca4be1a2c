//! Operation variable coercion.

use crate::coerce::{coerce_literal, coerce_value};
use crate::error::FieldError;
use crate::schema::{Schema, TypeRef};
use crate::value::Value;
use cinder_syntax::{Document, OperationDefinition};
use indexmap::IndexMap;

/// Coerced variable values, keyed by name without the `$`.
pub type Variables = IndexMap<String, Value>;

/// Coerces the raw values supplied with a request against the operation's
/// variable definitions.
///
/// All failures are reported, each located at its variable definition.
pub fn coerce_variable_values(
    schema: &Schema,
    document: &Document,
    operation: &OperationDefinition,
    raw: &IndexMap<String, Value>,
) -> Result<Variables, Vec<FieldError>> {
    let mut coerced = Variables::new();
    let mut errors = Vec::new();

    for definition in &operation.variables {
        let name = definition.name.as_str();
        let ty = TypeRef::from_ast(&definition.ty);
        let location = document.location(definition.span);

        match (raw.get(name), &definition.default_value) {
            (Some(value), _) => match coerce_value(schema, &ty, value) {
                Ok(value) => {
                    coerced.insert(name.to_string(), value);
                }
                Err(reason) => {
                    let message = if value.is_null() && ty.is_non_null() {
                        format!("Variable \"${name}\" of non-null type \"{ty}\" must not be null.")
                    } else {
                        format!("Variable \"${name}\" got invalid value {value}; {reason}")
                    };
                    errors.push(FieldError::new(message).with_location(location));
                }
            },
            (None, Some(default)) => {
                match coerce_literal(schema, &ty, default, &Variables::new()) {
                    Ok(value) => {
                        coerced.insert(name.to_string(), value);
                    }
                    Err(reason) => errors.push(
                        FieldError::new(format!(
                            "Variable \"${name}\" has invalid default value; {reason}"
                        ))
                        .with_location(location),
                    ),
                }
            }
            (None, None) if ty.is_non_null() => errors.push(
                FieldError::new(format!(
                    "Variable \"${name}\" of required type \"{ty}\" was not provided."
                ))
                .with_location(location),
            ),
            (None, None) => {}
        }
    }

    if errors.is_empty() {
        Ok(coerced)
    } else {
        Err(errors)
    }
}
