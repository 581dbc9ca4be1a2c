//! Schema definition for Cinder.
//!
//! A [`Schema`] is the type repository the executor consults: object fields
//! with their resolvers, abstract types with their runtime-type functions,
//! enums, input objects and subscription channels.

use crate::introspection;
use crate::resolver::{FieldResolver, FieldValue};
use crate::value::Value;
use cinder_syntax::ast;
use cinder_syntax::OperationType;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A GraphQL schema.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub description: Option<String>,
    pub query_type: Option<String>,
    pub mutation_type: Option<String>,
    pub subscription_type: Option<String>,
    pub types: IndexMap<String, TypeDef>,
    pub directives: IndexMap<String, DirectiveDef>,
}

impl Schema {
    /// Gets a type by name.
    pub fn get_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Returns all types.
    pub fn types(&self) -> impl Iterator<Item = (&String, &TypeDef)> {
        self.types.iter()
    }

    /// Gets an object type by name.
    pub fn object(&self, name: &str) -> Option<&ObjectDef> {
        match self.types.get(name) {
            Some(TypeDef::Object(object)) => Some(object),
            _ => None,
        }
    }

    /// Gets a field of an object or interface type.
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDef> {
        match self.types.get(type_name)? {
            TypeDef::Object(object) => object.fields.get(field_name),
            TypeDef::Interface(interface) => interface.fields.get(field_name),
            _ => None,
        }
    }

    /// Name of the root type for an operation kind.
    pub fn root_type_name(&self, operation: OperationType) -> Option<&str> {
        match operation {
            OperationType::Query => self.query_type.as_deref(),
            OperationType::Mutation => self.mutation_type.as_deref(),
            OperationType::Subscription => self.subscription_type.as_deref(),
        }
    }

    /// The root object type for an operation kind.
    pub fn root_type(&self, operation: OperationType) -> Option<&ObjectDef> {
        self.root_type_name(operation)
            .and_then(|name| self.object(name))
    }

    /// Returns true if `object` is a member of the abstract type `abstract_type`.
    pub fn is_possible_type(&self, abstract_type: &str, object: &str) -> bool {
        match self.types.get(abstract_type) {
            Some(TypeDef::Union(union)) => union.members.iter().any(|m| m == object),
            Some(TypeDef::Interface(_)) => self
                .object(object)
                .is_some_and(|o| o.implements.iter().any(|i| i == abstract_type)),
            _ => false,
        }
    }

    /// Object types that may appear where `name` is expected.
    pub fn possible_types(&self, name: &str) -> Vec<&ObjectDef> {
        self.types
            .values()
            .filter_map(|ty| match ty {
                TypeDef::Object(object) if self.is_possible_type(name, &object.name) => {
                    Some(object)
                }
                _ => None,
            })
            .collect()
    }

    /// Returns true if a fragment with `condition` applies to values of `object`.
    pub fn type_applies(&self, condition: &str, object: &str) -> bool {
        condition == object || self.is_possible_type(condition, object)
    }
}

/// A type definition.
#[derive(Debug, Clone)]
pub enum TypeDef {
    Scalar(ScalarDef),
    Object(ObjectDef),
    Interface(InterfaceDef),
    Union(UnionDef),
    Enum(EnumDef),
    InputObject(InputObjectDef),
}

/// Kind of a type, as reported by introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull,
}

impl TypeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "SCALAR",
            Self::Object => "OBJECT",
            Self::Interface => "INTERFACE",
            Self::Union => "UNION",
            Self::Enum => "ENUM",
            Self::InputObject => "INPUT_OBJECT",
            Self::List => "LIST",
            Self::NonNull => "NON_NULL",
        }
    }
}

impl TypeDef {
    pub fn name(&self) -> &str {
        match self {
            Self::Scalar(s) => &s.name,
            Self::Object(o) => &o.name,
            Self::Interface(i) => &i.name,
            Self::Union(u) => &u.name,
            Self::Enum(e) => &e.name,
            Self::InputObject(i) => &i.name,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => s.description.as_deref(),
            Self::Object(o) => o.description.as_deref(),
            Self::Interface(i) => i.description.as_deref(),
            Self::Union(u) => u.description.as_deref(),
            Self::Enum(e) => e.description.as_deref(),
            Self::InputObject(i) => i.description.as_deref(),
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            Self::Scalar(_) => TypeKind::Scalar,
            Self::Object(_) => TypeKind::Object,
            Self::Interface(_) => TypeKind::Interface,
            Self::Union(_) => TypeKind::Union,
            Self::Enum(_) => TypeKind::Enum,
            Self::InputObject(_) => TypeKind::InputObject,
        }
    }

    /// Returns true for types that may be used as variable or argument types.
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Enum(_) | Self::InputObject(_))
    }
}

/// Scalar type definition.
#[derive(Debug, Clone)]
pub struct ScalarDef {
    pub name: String,
    pub description: Option<String>,
    pub specified_by_url: Option<String>,
}

impl ScalarDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            specified_by_url: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Object type definition.
#[derive(Debug, Clone)]
pub struct ObjectDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
    pub implements: Vec<String>,
}

impl ObjectDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
            implements: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    /// Declares that this object implements an interface.
    #[must_use]
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }
}

/// Maps a value of an abstract type to the name of its concrete object type.
#[derive(Clone)]
pub struct ResolveType(Arc<dyn Fn(&FieldValue) -> Option<String> + Send + Sync>);

impl ResolveType {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&FieldValue) -> Option<String> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, value: &FieldValue) -> Option<String> {
        (self.0)(value)
    }
}

impl fmt::Debug for ResolveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResolveType(..)")
    }
}

/// Interface type definition.
#[derive(Debug, Clone)]
pub struct InterfaceDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
    pub implements: Vec<String>,
    pub resolve_type: Option<ResolveType>,
}

impl InterfaceDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
            implements: Vec::new(),
            resolve_type: None,
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    #[must_use]
    pub fn with_resolve_type<F>(mut self, f: F) -> Self
    where
        F: Fn(&FieldValue) -> Option<String> + Send + Sync + 'static,
    {
        self.resolve_type = Some(ResolveType::new(f));
        self
    }
}

/// Union type definition.
#[derive(Debug, Clone)]
pub struct UnionDef {
    pub name: String,
    pub description: Option<String>,
    pub members: Vec<String>,
    pub resolve_type: Option<ResolveType>,
}

impl UnionDef {
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: None,
            members: members.into_iter().map(Into::into).collect(),
            resolve_type: None,
        }
    }

    #[must_use]
    pub fn with_resolve_type<F>(mut self, f: F) -> Self
    where
        F: Fn(&FieldValue) -> Option<String> + Send + Sync + 'static,
    {
        self.resolve_type = Some(ResolveType::new(f));
        self
    }
}

/// Enum type definition.
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub description: Option<String>,
    pub values: Vec<EnumValueDef>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            values: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: EnumValueDef) -> Self {
        self.values.push(value);
        self
    }

    /// Adds members with no internal value.
    #[must_use]
    pub fn with_values<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values
            .extend(names.into_iter().map(EnumValueDef::new));
        self
    }

    pub fn value(&self, name: &str) -> Option<&EnumValueDef> {
        self.values.iter().find(|v| v.name == name)
    }
}

/// Enum value definition.
#[derive(Debug, Clone)]
pub struct EnumValueDef {
    pub name: String,
    pub description: Option<String>,
    /// Internal representation a resolver may return instead of the name.
    pub value: Option<Value>,
    pub deprecated: bool,
    pub deprecation_reason: Option<String>,
}

impl EnumValueDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            value: None,
            deprecated: false,
            deprecation_reason: None,
        }
    }

    #[must_use]
    pub fn with_internal(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_deprecation(mut self, reason: impl Into<String>) -> Self {
        self.deprecated = true;
        self.deprecation_reason = Some(reason.into());
        self
    }
}

/// Input object type definition.
#[derive(Debug, Clone)]
pub struct InputObjectDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, InputValueDef>,
}

impl InputObjectDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: InputValueDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }
}

/// Decides whether a published payload reaches a subscriber, given the
/// subscriber's resolved arguments.
#[derive(Clone)]
pub struct SubscriptionFilter(Arc<dyn Fn(&IndexMap<String, Value>, &Value) -> bool + Send + Sync>);

impl SubscriptionFilter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&IndexMap<String, Value>, &Value) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn matches(&self, args: &IndexMap<String, Value>, payload: &Value) -> bool {
        (self.0)(args, payload)
    }
}

impl fmt::Debug for SubscriptionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SubscriptionFilter(..)")
    }
}

/// Field definition.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub arguments: IndexMap<String, InputValueDef>,
    /// Resolver; fields without one read their value from the parent record.
    pub resolver: Option<FieldResolver>,
    /// Channel a subscription field listens on.
    pub channel: Option<String>,
    pub filter: Option<SubscriptionFilter>,
    pub deprecated: bool,
    pub deprecation_reason: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty: ty.into(),
            arguments: IndexMap::new(),
            resolver: None,
            channel: None,
            filter: None,
            deprecated: false,
            deprecation_reason: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_argument(mut self, argument: InputValueDef) -> Self {
        self.arguments.insert(argument.name.clone(), argument);
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: FieldResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn with_filter<F>(mut self, f: F) -> Self
    where
        F: Fn(&IndexMap<String, Value>, &Value) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(SubscriptionFilter::new(f));
        self
    }

    #[must_use]
    pub fn with_deprecation(mut self, reason: impl Into<String>) -> Self {
        self.deprecated = true;
        self.deprecation_reason = Some(reason.into());
        self
    }
}

/// Argument or input field definition.
#[derive(Debug, Clone)]
pub struct InputValueDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub default_value: Option<Value>,
}

impl InputValueDef {
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty: ty.into(),
            default_value: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Type reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn list(inner: TypeRef) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn non_null(inner: TypeRef) -> Self {
        Self::NonNull(Box::new(inner))
    }

    /// Parses type syntax such as `[String!]!`.
    pub fn parse(source: &str) -> Option<Self> {
        let source = source.trim();
        if let Some(inner) = source.strip_suffix('!') {
            return Self::parse(inner).map(Self::non_null);
        }
        if let Some(inner) = source.strip_prefix('[') {
            return Self::parse(inner.strip_suffix(']')?).map(Self::list);
        }
        let mut chars = source.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        valid.then(|| Self::named(source))
    }

    /// The innermost named type.
    pub fn named_type(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::List(inner) | Self::NonNull(inner) => inner.named_type(),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    /// Converts a type written in a variable definition.
    pub fn from_ast(ty: &ast::Type) -> Self {
        match ty {
            ast::Type::Named(name) => Self::named(name.as_str()),
            ast::Type::List(inner, _) => Self::list(Self::from_ast(inner)),
            ast::Type::NonNull(inner, _) => Self::non_null(Self::from_ast(inner)),
        }
    }
}

/// Falls back to a named reference when the text is not valid type syntax;
/// [`SchemaBuilder::build`] then reports it as an unknown type.
impl From<&str> for TypeRef {
    fn from(source: &str) -> Self {
        Self::parse(source).unwrap_or_else(|| Self::named(source))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

/// Directive definition.
#[derive(Debug, Clone)]
pub struct DirectiveDef {
    pub name: String,
    pub description: Option<String>,
    pub arguments: IndexMap<String, InputValueDef>,
    pub locations: Vec<DirectiveLocation>,
    pub repeatable: bool,
}

/// Directive location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveLocation {
    Query,
    Mutation,
    Subscription,
    Field,
    FragmentDefinition,
    FragmentSpread,
    InlineFragment,
    VariableDefinition,
    Schema,
    Scalar,
    Object,
    FieldDefinition,
    ArgumentDefinition,
    Interface,
    Union,
    Enum,
    EnumValue,
    InputObject,
    InputFieldDefinition,
}

impl DirectiveLocation {
    pub const ALL: [Self; 19] = [
        Self::Query,
        Self::Mutation,
        Self::Subscription,
        Self::Field,
        Self::FragmentDefinition,
        Self::FragmentSpread,
        Self::InlineFragment,
        Self::VariableDefinition,
        Self::Schema,
        Self::Scalar,
        Self::Object,
        Self::FieldDefinition,
        Self::ArgumentDefinition,
        Self::Interface,
        Self::Union,
        Self::Enum,
        Self::EnumValue,
        Self::InputObject,
        Self::InputFieldDefinition,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "QUERY",
            Self::Mutation => "MUTATION",
            Self::Subscription => "SUBSCRIPTION",
            Self::Field => "FIELD",
            Self::FragmentDefinition => "FRAGMENT_DEFINITION",
            Self::FragmentSpread => "FRAGMENT_SPREAD",
            Self::InlineFragment => "INLINE_FRAGMENT",
            Self::VariableDefinition => "VARIABLE_DEFINITION",
            Self::Schema => "SCHEMA",
            Self::Scalar => "SCALAR",
            Self::Object => "OBJECT",
            Self::FieldDefinition => "FIELD_DEFINITION",
            Self::ArgumentDefinition => "ARGUMENT_DEFINITION",
            Self::Interface => "INTERFACE",
            Self::Union => "UNION",
            Self::Enum => "ENUM",
            Self::EnumValue => "ENUM_VALUE",
            Self::InputObject => "INPUT_OBJECT",
            Self::InputFieldDefinition => "INPUT_FIELD_DEFINITION",
        }
    }
}

/// Error building a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Query root type must be provided.")]
    MissingQueryType,

    #[error("Unknown type \"{name}\" referenced by {referenced_by}.")]
    UnknownType { name: String, referenced_by: String },

    #[error("Type \"{0}\" must be an object type.")]
    NotAnObject(String),

    #[error("Type \"{0}\" must be an interface type.")]
    NotAnInterface(String),

    #[error("Type \"{ty}\" used by {referenced_by} must be an input type.")]
    NotAnInputType { ty: String, referenced_by: String },

    #[error("Cannot attach a resolver to undefined field \"{type_name}.{field}\".")]
    UnknownField { type_name: String, field: String },

    #[error("Resolver for \"{type_name}.{field}\" declares more than one context parameter.")]
    MultipleContextParams { type_name: String, field: String },
}

/// Schema builder.
#[derive(Debug)]
pub struct SchemaBuilder {
    schema: Schema,
    resolvers: Vec<(String, String, FieldResolver)>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    /// Creates a new schema builder with built-in scalars, directives and
    /// introspection types.
    pub fn new() -> Self {
        let mut schema = Schema::default();
        for (name, description) in [
            ("Int", "The `Int` scalar type represents non-fractional signed whole numeric values."),
            ("Float", "The `Float` scalar type represents signed double-precision fractional values."),
            ("String", "The `String` scalar type represents textual data as UTF-8 character sequences."),
            ("Boolean", "The `Boolean` scalar type represents `true` or `false`."),
            ("ID", "The `ID` scalar type represents a unique identifier, serialized as a string."),
        ] {
            schema.types.insert(
                name.to_string(),
                TypeDef::Scalar(ScalarDef::new(name).with_description(description)),
            );
        }

        for directive in builtin_directives() {
            schema.directives.insert(directive.name.clone(), directive);
        }

        for ty in introspection::meta_types() {
            schema.types.insert(ty.name().to_string(), ty);
        }

        Self {
            schema,
            resolvers: Vec::new(),
        }
    }

    /// Sets the schema description.
    #[must_use]
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.schema.description = Some(desc.into());
        self
    }

    /// Sets the query type.
    #[must_use]
    pub fn query_type(mut self, name: impl Into<String>) -> Self {
        self.schema.query_type = Some(name.into());
        self
    }

    /// Sets the mutation type.
    #[must_use]
    pub fn mutation_type(mut self, name: impl Into<String>) -> Self {
        self.schema.mutation_type = Some(name.into());
        self
    }

    /// Sets the subscription type.
    #[must_use]
    pub fn subscription_type(mut self, name: impl Into<String>) -> Self {
        self.schema.subscription_type = Some(name.into());
        self
    }

    /// Adds a type, replacing any type with the same name.
    #[must_use]
    pub fn add_type(mut self, type_def: impl Into<TypeDef>) -> Self {
        let type_def = type_def.into();
        self.schema
            .types
            .insert(type_def.name().to_string(), type_def);
        self
    }

    /// Adds a directive definition.
    #[must_use]
    pub fn add_directive(mut self, directive: DirectiveDef) -> Self {
        self.schema
            .directives
            .insert(directive.name.clone(), directive);
        self
    }

    /// Attaches a resolver to a field declared on an object or interface.
    #[must_use]
    pub fn resolver(
        mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: FieldResolver,
    ) -> Self {
        self.resolvers
            .push((type_name.into(), field_name.into(), resolver));
        self
    }

    /// Builds and checks the schema.
    pub fn build(mut self) -> Result<Schema, SchemaError> {
        for (type_name, field, resolver) in std::mem::take(&mut self.resolvers) {
            let fields = match self.schema.types.get_mut(&type_name) {
                Some(TypeDef::Object(object)) => &mut object.fields,
                Some(TypeDef::Interface(interface)) => &mut interface.fields,
                _ => return Err(SchemaError::UnknownField { type_name, field }),
            };
            let def = fields
                .get_mut(&field)
                .ok_or_else(|| SchemaError::UnknownField {
                    type_name: type_name.clone(),
                    field: field.clone(),
                })?;
            def.resolver = Some(resolver);
        }

        let schema = self.schema;
        if schema.query_type.is_none() {
            return Err(SchemaError::MissingQueryType);
        }
        for root in [
            &schema.query_type,
            &schema.mutation_type,
            &schema.subscription_type,
        ]
        .into_iter()
        .flatten()
        {
            match schema.types.get(root) {
                Some(TypeDef::Object(_)) => {}
                Some(_) => return Err(SchemaError::NotAnObject(root.clone())),
                None => {
                    return Err(SchemaError::UnknownType {
                        name: root.clone(),
                        referenced_by: "the schema root".to_string(),
                    })
                }
            }
        }

        for ty in schema.types.values() {
            check_type(&schema, ty)?;
        }
        for directive in schema.directives.values() {
            for arg in directive.arguments.values() {
                check_input_ref(&schema, &arg.ty, &format!("@{}({})", directive.name, arg.name))?;
            }
        }

        Ok(schema)
    }
}

impl From<ObjectDef> for TypeDef {
    fn from(def: ObjectDef) -> Self {
        Self::Object(def)
    }
}

impl From<InterfaceDef> for TypeDef {
    fn from(def: InterfaceDef) -> Self {
        Self::Interface(def)
    }
}

impl From<UnionDef> for TypeDef {
    fn from(def: UnionDef) -> Self {
        Self::Union(def)
    }
}

impl From<EnumDef> for TypeDef {
    fn from(def: EnumDef) -> Self {
        Self::Enum(def)
    }
}

impl From<InputObjectDef> for TypeDef {
    fn from(def: InputObjectDef) -> Self {
        Self::InputObject(def)
    }
}

impl From<ScalarDef> for TypeDef {
    fn from(def: ScalarDef) -> Self {
        Self::Scalar(def)
    }
}

fn check_type(schema: &Schema, ty: &TypeDef) -> Result<(), SchemaError> {
    match ty {
        TypeDef::Object(object) => {
            check_fields(schema, &object.name, &object.fields)?;
            check_interfaces(schema, &object.implements)
        }
        TypeDef::Interface(interface) => {
            check_fields(schema, &interface.name, &interface.fields)?;
            check_interfaces(schema, &interface.implements)
        }
        TypeDef::Union(union) => {
            for member in &union.members {
                match schema.types.get(member) {
                    Some(TypeDef::Object(_)) => {}
                    Some(_) => return Err(SchemaError::NotAnObject(member.clone())),
                    None => {
                        return Err(SchemaError::UnknownType {
                            name: member.clone(),
                            referenced_by: format!("union {}", union.name),
                        })
                    }
                }
            }
            Ok(())
        }
        TypeDef::InputObject(input) => {
            for field in input.fields.values() {
                check_input_ref(schema, &field.ty, &format!("{}.{}", input.name, field.name))?;
            }
            Ok(())
        }
        TypeDef::Scalar(_) | TypeDef::Enum(_) => Ok(()),
    }
}

fn check_fields(
    schema: &Schema,
    owner: &str,
    fields: &IndexMap<String, FieldDef>,
) -> Result<(), SchemaError> {
    for field in fields.values() {
        let referenced_by = format!("{owner}.{}", field.name);
        check_output_ref(schema, &field.ty, &referenced_by)?;

        for arg in field.arguments.values() {
            check_input_ref(schema, &arg.ty, &format!("{referenced_by}({})", arg.name))?;
        }

        if let Some(FieldResolver::Resolver(_, params)) = &field.resolver {
            if params.iter().filter(|p| p.is_context).count() > 1 {
                return Err(SchemaError::MultipleContextParams {
                    type_name: owner.to_string(),
                    field: field.name.clone(),
                });
            }
            for param in params.iter().filter(|p| !p.is_context) {
                check_input_ref(schema, &param.ty, &format!("{referenced_by}({})", param.name))?;
            }
        }
    }
    Ok(())
}

fn check_interfaces(schema: &Schema, implements: &[String]) -> Result<(), SchemaError> {
    for name in implements {
        match schema.types.get(name) {
            Some(TypeDef::Interface(_)) => {}
            Some(_) => return Err(SchemaError::NotAnInterface(name.clone())),
            None => {
                return Err(SchemaError::UnknownType {
                    name: name.clone(),
                    referenced_by: "an implements clause".to_string(),
                })
            }
        }
    }
    Ok(())
}

fn check_output_ref(schema: &Schema, ty: &TypeRef, referenced_by: &str) -> Result<(), SchemaError> {
    let name = ty.named_type();
    if schema.types.contains_key(name) {
        Ok(())
    } else {
        Err(SchemaError::UnknownType {
            name: name.to_string(),
            referenced_by: referenced_by.to_string(),
        })
    }
}

fn check_input_ref(schema: &Schema, ty: &TypeRef, referenced_by: &str) -> Result<(), SchemaError> {
    let name = ty.named_type();
    match schema.types.get(name) {
        Some(def) if def.is_input() => Ok(()),
        Some(_) => Err(SchemaError::NotAnInputType {
            ty: name.to_string(),
            referenced_by: referenced_by.to_string(),
        }),
        None => Err(SchemaError::UnknownType {
            name: name.to_string(),
            referenced_by: referenced_by.to_string(),
        }),
    }
}

fn builtin_directives() -> Vec<DirectiveDef> {
    let conditional = |name: &str, description: &str| DirectiveDef {
        name: name.to_string(),
        description: Some(description.to_string()),
        arguments: IndexMap::from([(
            "if".to_string(),
            InputValueDef::new("if", TypeRef::non_null(TypeRef::named("Boolean"))),
        )]),
        locations: vec![
            DirectiveLocation::Field,
            DirectiveLocation::FragmentSpread,
            DirectiveLocation::InlineFragment,
        ],
        repeatable: false,
    };

    vec![
        conditional(
            "include",
            "Directs the executor to include this field or fragment only when the `if` argument is true.",
        ),
        conditional(
            "skip",
            "Directs the executor to skip this field or fragment when the `if` argument is true.",
        ),
        DirectiveDef {
            name: "deprecated".to_string(),
            description: Some("Marks an element of a GraphQL schema as no longer supported.".to_string()),
            arguments: IndexMap::from([(
                "reason".to_string(),
                InputValueDef::new("reason", "String").with_default("No longer supported"),
            )]),
            locations: vec![
                DirectiveLocation::FieldDefinition,
                DirectiveLocation::ArgumentDefinition,
                DirectiveLocation::InputFieldDefinition,
                DirectiveLocation::EnumValue,
            ],
            repeatable: false,
        },
    ]
}
