//! Query execution for Cinder.

use crate::collect::{collect_fields, GroupedFields};
use crate::complete::{execute_fields, resolve_field, Bubble};
use crate::context::{Context, ExecutionContext};
use crate::error::{ExecutionError, FieldError};
use crate::introspection;
use crate::path::{Path, PathSegment};
use crate::resolver::FieldValue;
use crate::schema::Schema;
use crate::subscription::SubscriptionRegistry;
use crate::value::{Object, Value};
use crate::variables::coerce_variable_values;
use cinder_syntax::{Document, OperationDefinition, OperationType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info_span, Instrument};

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Answer `__schema` and `__type`.
    pub introspection: bool,
    /// Reuse completed objects reached again through another path.
    pub memoize_objects: bool,
    /// Replace internal resolver error messages with a generic one.
    pub mask_internal_errors: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            introspection: true,
            memoize_objects: true,
            mask_internal_errors: true,
        }
    }
}

impl ExecutorConfig {
    #[must_use]
    pub fn with_introspection(mut self, enabled: bool) -> Self {
        self.introspection = enabled;
        self
    }

    #[must_use]
    pub fn with_memoize_objects(mut self, enabled: bool) -> Self {
        self.memoize_objects = enabled;
        self
    }

    #[must_use]
    pub fn with_mask_internal_errors(mut self, enabled: bool) -> Self {
        self.mask_internal_errors = enabled;
        self
    }
}

/// One operation to execute.
#[derive(Debug)]
pub struct Request {
    pub document: Arc<Document>,
    pub operation_name: Option<String>,
    /// Raw variable values, coerced against the operation's definitions.
    pub variables: IndexMap<String, Value>,
    /// Parent value of the root fields.
    pub root_value: FieldValue,
    pub data: Arc<Context>,
    /// Required for subscriptions.
    pub client_id: Option<String>,
    /// Generated when a subscription request leaves it out.
    pub subscription_id: Option<String>,
}

impl Request {
    pub fn new(document: impl Into<Arc<Document>>) -> Self {
        Self {
            document: document.into(),
            operation_name: None,
            variables: IndexMap::new(),
            root_value: FieldValue::Null,
            data: Arc::new(Context::new()),
            client_id: None,
            subscription_id: None,
        }
    }

    #[must_use]
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_variables(mut self, variables: IndexMap<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    #[must_use]
    pub fn with_root_value(mut self, root: FieldValue) -> Self {
        self.root_value = root;
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Context) -> Self {
        self.data = Arc::new(data);
        self
    }

    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    #[must_use]
    pub fn with_subscription_id(mut self, subscription_id: impl Into<String>) -> Self {
        self.subscription_id = Some(subscription_id.into());
        self
    }
}

/// A GraphQL response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// The data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// The errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    /// Root path of a partial result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    /// Set on subscription registrations and deliveries.
    #[serde(rename = "subscriptionId", skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
}

impl Response {
    /// Creates a successful response with data.
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: None,
            path: None,
            subscription_id: None,
        }
    }

    /// Creates an error response.
    pub fn error(error: FieldError) -> Self {
        Self::errors(vec![error])
    }

    /// Creates an error response with multiple errors.
    pub fn errors(errors: Vec<FieldError>) -> Self {
        Self {
            data: None,
            errors: Some(errors),
            path: None,
            subscription_id: None,
        }
    }

    /// Creates a result for the subtree at `path`.
    pub fn partial(path: &Path, data: Value, errors: Vec<FieldError>) -> Self {
        Self {
            data: Some(data),
            errors: (!errors.is_empty()).then_some(errors),
            path: Some(path.segments()),
            subscription_id: None,
        }
    }

    /// Acknowledges a subscription registration.
    pub fn subscription(subscription_id: impl Into<String>) -> Self {
        Self {
            data: None,
            errors: None,
            path: None,
            subscription_id: Some(subscription_id.into()),
        }
    }

    pub(crate) fn completed(data: Value, errors: Vec<FieldError>) -> Self {
        Self {
            data: Some(data),
            errors: (!errors.is_empty()).then_some(errors),
            path: None,
            subscription_id: None,
        }
    }

    /// Returns true if the response has errors.
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Returns true if the response has data.
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}

/// Executes operations against one schema.
#[derive(Debug)]
pub struct Executor {
    schema: Arc<Schema>,
    config: ExecutorConfig,
    subscriptions: SubscriptionRegistry,
}

impl Executor {
    /// Creates a new executor.
    pub fn new(schema: impl Into<Arc<Schema>>) -> Self {
        Self::with_config(schema, ExecutorConfig::default())
    }

    /// Creates an executor with configuration.
    pub fn with_config(schema: impl Into<Arc<Schema>>, config: ExecutorConfig) -> Self {
        Self {
            schema: schema.into(),
            config,
            subscriptions: SubscriptionRegistry::new(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Executes a request.
    ///
    /// Operation selection failures are returned as `Err`. Everything that
    /// goes wrong afterwards is reported in the response.
    pub async fn execute(&self, request: Request) -> Result<Response, ExecutionError> {
        let operation =
            select_operation(&request.document, request.operation_name.as_deref())?.clone();
        let span = info_span!(
            "execute",
            operation = operation.name().unwrap_or("<anonymous>"),
            kind = %operation.operation,
        );
        self.execute_operation(request, operation)
            .instrument(span)
            .await
    }

    async fn execute_operation(
        &self,
        request: Request,
        operation: OperationDefinition,
    ) -> Result<Response, ExecutionError> {
        let kind = operation.operation;
        let root_type = self
            .schema
            .root_type_name(kind)
            .ok_or(ExecutionError::MissingRootType(kind))?
            .to_string();

        debug!(root_type, "executing operation");

        let variables = match coerce_variable_values(
            &self.schema,
            &request.document,
            &operation,
            &request.variables,
        ) {
            Ok(variables) => variables,
            Err(errors) => {
                debug!(count = errors.len(), "variable coercion failed");
                return Ok(Response::errors(errors));
            }
        };

        let mut config = self.config.clone();
        if kind == OperationType::Mutation {
            config.memoize_objects = false;
        }
        let ctx = ExecutionContext::new(
            Arc::clone(&self.schema),
            Arc::clone(&request.document),
            operation,
            variables,
            Arc::clone(&request.data),
            config,
        );

        if kind == OperationType::Subscription {
            return self
                .subscriptions
                .subscribe(
                    ctx,
                    root_type,
                    request.client_id,
                    request.subscription_id,
                )
                .await;
        }

        let root = Arc::new(request.root_value);
        let data = execute_root(&ctx, &root_type, &root, kind == OperationType::Mutation).await;
        Ok(Response::completed(data, ctx.take_errors().await))
    }

    /// Opens a delivery stream for a subscription client.
    ///
    /// Connecting again under the same id replaces the previous stream.
    pub async fn connect(&self, client_id: impl Into<String>) -> UnboundedReceiver<Response> {
        self.subscriptions.connect(client_id.into()).await
    }

    /// Publishes a payload on a channel, returning how many subscribers
    /// received a result.
    ///
    /// Results are delivered before this returns, in publish order.
    pub async fn publish(&self, channel: &str, payload: impl Into<Value>) -> usize {
        self.subscriptions.publish(channel, payload.into()).await
    }

    /// Removes one subscription. Returns false if it was not registered.
    pub async fn unsubscribe(&self, client_id: &str, subscription_id: &str) -> bool {
        self.subscriptions.unsubscribe(client_id, subscription_id).await
    }

    /// Removes a client and all of its subscriptions.
    pub async fn disconnect(&self, client_id: &str) {
        self.subscriptions.disconnect(client_id).await;
    }

    /// Number of active subscriptions on a channel.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.subscriptions.subscriber_count(channel).await
    }
}

/// Picks the operation a request runs.
pub fn select_operation<'a>(
    document: &'a Document,
    operation_name: Option<&str>,
) -> Result<&'a OperationDefinition, ExecutionError> {
    match operation_name {
        Some(name) => document
            .operations()
            .find(|op| op.name() == Some(name))
            .ok_or_else(|| ExecutionError::UnknownOperation(name.to_string())),
        None => {
            let mut operations = document.operations();
            let first = operations.next().ok_or(ExecutionError::NoOperation)?;
            if operations.next().is_some() {
                return Err(ExecutionError::OperationNameRequired);
            }
            Ok(first)
        }
    }
}

/// Executes the root selection set, answering introspection fields after
/// the main pass. A bubble that reaches the root nulls all data.
async fn execute_root(
    ctx: &ExecutionContext,
    root_type: &str,
    root: &Arc<FieldValue>,
    serial: bool,
) -> Value {
    let groups = collect_fields(
        &ctx.schema,
        &ctx.document,
        &ctx.variables,
        root_type,
        [&ctx.operation.selection_set],
    );
    let order: Vec<&str> = groups.keys().copied().collect();

    let (meta, main): (GroupedFields<'_>, GroupedFields<'_>) = groups
        .into_iter()
        .partition(|(_, fields)| {
            fields
                .first()
                .is_some_and(|f| introspection::is_root_field(f.name.as_str()))
        });

    let Ok(Value::Object(mut main)) =
        execute_fields(ctx, root_type, root, &main, &Path::root(), serial).await
    else {
        return Value::Null;
    };
    let Ok(mut meta) = execute_introspection(ctx, root_type, &meta).await else {
        return Value::Null;
    };

    let mut data = Object::with_capacity(order.len());
    for key in order {
        if let Some(value) = main.shift_remove(key).or_else(|| meta.shift_remove(key)) {
            data.insert(key.to_string(), value);
        }
    }
    Value::Object(data)
}

async fn execute_introspection(
    ctx: &ExecutionContext,
    root_type: &str,
    groups: &GroupedFields<'_>,
) -> Result<Object, Bubble> {
    let mut object = Object::new();
    if groups.is_empty() {
        return Ok(object);
    }

    let fields = introspection::root_fields();
    let parent = Arc::new(FieldValue::Null);
    for (key, group) in groups {
        let path = Path::root().field(key);
        let value = match fields.get(group[0].name.as_str()) {
            Some(def) if ctx.config.introspection => {
                resolve_field(ctx, root_type, &parent, group, def, path).await?
            }
            _ => {
                let error = FieldError::new("Introspection is disabled.")
                    .with_locations(ctx.locations(group))
                    .with_path(&path);
                ctx.record(error).await;
                Value::Null
            }
        };
        object.insert((*key).to_string(), value);
    }
    Ok(object)
}
