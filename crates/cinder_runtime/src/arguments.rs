//! Field argument resolution.

use crate::coerce::{coerce_literal, coerce_value};
use crate::error::ResolverError;
use crate::schema::{FieldDef, Schema};
use crate::value::Value;
use crate::variables::Variables;
use cinder_syntax::ast;
use indexmap::IndexMap;

/// Resolved arguments of one field, in declaration order.
pub type Arguments = IndexMap<String, Value>;

/// Resolves the arguments of a field selection against the field's declared
/// arguments.
///
/// A variable reference that is not bound counts as absent. Absent arguments
/// take their declared default or are left out.
pub fn resolve_arguments(
    schema: &Schema,
    field_def: &FieldDef,
    field: &ast::Field,
    variables: &Variables,
) -> Result<Arguments, ResolverError> {
    let mut resolved = Arguments::new();

    for (name, def) in &field_def.arguments {
        let supplied = field.argument(name).and_then(|arg| match &arg.value {
            ast::Value::Variable(var) if !variables.contains_key(var.as_str()) => None,
            value => Some(value),
        });

        match (supplied, &def.default_value) {
            (Some(literal), _) => {
                let value = coerce_literal(schema, &def.ty, literal, variables)
                    .map_err(|e| invalid(name, e))?;
                resolved.insert(name.clone(), value);
            }
            (None, Some(default)) => {
                let value = coerce_value(schema, &def.ty, default).map_err(|e| invalid(name, e))?;
                resolved.insert(name.clone(), value);
            }
            (None, None) if def.ty.is_non_null() => {
                return Err(ResolverError::MissingArgument(name.clone()));
            }
            (None, None) => {}
        }
    }

    Ok(resolved)
}

fn invalid(name: &str, err: impl ToString) -> ResolverError {
    ResolverError::InvalidArgument {
        name: name.to_string(),
        reason: err.to_string(),
    }
}
