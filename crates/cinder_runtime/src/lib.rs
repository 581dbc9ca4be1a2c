//! Runtime for Cinder.
//!
//! This crate provides the GraphQL execution runtime:
//! - `schema`: Schema definition and building
//! - `value`: Input and output values
//! - `coerce`, `variables`, `arguments`: Input coercion
//! - `collect`: Field collection with fragments and `@skip`/`@include`
//! - `resolver`: Field resolvers and parameter binding
//! - `executor`: Operation execution and value completion
//! - `subscription`: Channel-based subscription delivery
//! - `introspection`: `__schema` and `__type`

pub mod arguments;
pub mod coerce;
pub mod collect;
mod complete;
pub mod context;
pub mod error;
pub mod executor;
pub mod introspection;
pub mod path;
pub mod resolver;
pub mod schema;
mod subscription;
pub mod value;
pub mod variables;

pub use arguments::{resolve_arguments, Arguments};
pub use coerce::{coerce_literal, coerce_value, CoercionError};
pub use collect::{collect_fields, should_include, FieldGroup, GroupedFields};
pub use context::Context;
pub use error::{ExecutionError, FieldError, Location, ResolverError};
pub use executor::{select_operation, Executor, ExecutorConfig, Request, Response};
pub use path::{Path, PathSegment};
pub use resolver::{
    default_resolve, FieldResolver, FieldValue, Instance, ParamDescriptor, ParentContext,
    Resolution, ResolverParams, ResolverResult,
};
pub use schema::{
    DirectiveDef, DirectiveLocation, EnumDef, EnumValueDef, FieldDef, InputObjectDef,
    InputValueDef, InterfaceDef, ObjectDef, ScalarDef, Schema, SchemaBuilder, SchemaError,
    TypeDef, TypeKind, TypeRef, UnionDef,
};
pub use value::{Object, Value};
pub use variables::{coerce_variable_values, Variables};
