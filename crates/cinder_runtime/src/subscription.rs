//! Subscription registry.
//!
//! A subscription operation registers its single root field on the field's
//! channel. Every publish on that channel runs a fresh completion of the
//! field for each matching subscriber, with the payload as parent.

use crate::arguments::{resolve_arguments, Arguments};
use crate::collect::collect_fields;
use crate::complete::{complete_value, resolve_field};
use crate::context::ExecutionContext;
use crate::error::{ExecutionError, FieldError};
use crate::executor::Response;
use crate::path::Path;
use crate::resolver::FieldValue;
use crate::schema::SubscriptionFilter;
use crate::value::Value;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Client id, subscription id.
type SubscriptionKey = (String, String);

struct Subscription {
    id: String,
    client_id: String,
    root_type: String,
    field_name: String,
    response_key: String,
    arguments: Arguments,
    filter: Option<SubscriptionFilter>,
    /// Inputs of the registering execution; cloned fresh for every delivery.
    ctx: ExecutionContext,
}

impl Subscription {
    /// Every argument must equal the payload entry of the same name unless
    /// the field brings its own filter.
    fn matches(&self, payload: &Value) -> bool {
        match &self.filter {
            Some(filter) => filter.matches(&self.arguments, payload),
            None => self
                .arguments
                .iter()
                .all(|(name, value)| payload.get(name).unwrap_or(&Value::Null) == value),
        }
    }

    async fn deliver(&self, payload: &Value) -> Response {
        let ctx = self.ctx.fresh();
        let groups = collect_fields(
            &ctx.schema,
            &ctx.document,
            &ctx.variables,
            &self.root_type,
            [&ctx.operation.selection_set],
        );
        let (Some(fields), Some(field_def)) = (
            groups.get(self.response_key.as_str()),
            ctx.schema.field(&self.root_type, &self.field_name),
        ) else {
            return self.response(Value::Null, Vec::new());
        };

        let path = Path::root().field(&self.response_key);
        let parent = Arc::new(FieldValue::from(payload.clone()));
        let completed = if field_def.resolver.is_some() {
            resolve_field(&ctx, &self.root_type, &parent, fields, field_def, path).await
        } else {
            let value = FieldValue::from(payload.clone());
            complete_value(&ctx, &self.root_type, fields, &field_def.ty, path, value).await
        };

        let data = match completed {
            Ok(value) => Value::object([(self.response_key.clone(), value)]),
            Err(_) => Value::Null,
        };
        self.response(data, ctx.take_errors().await)
    }

    fn response(&self, data: Value, errors: Vec<FieldError>) -> Response {
        let mut response = Response::completed(data, errors);
        response.subscription_id = Some(self.id.clone());
        response
    }
}

#[derive(Default)]
struct RegistryState {
    clients: FxHashMap<String, UnboundedSender<Response>>,
    channels: FxHashMap<String, IndexMap<SubscriptionKey, Arc<Subscription>>>,
}

/// Channels, subscribers and their delivery streams.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    state: RwLock<RegistryState>,
    next_id: AtomicU64,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(&self, client_id: String) -> UnboundedReceiver<Response> {
        let (sender, receiver) = mpsc::unbounded_channel();
        debug!(client = %client_id, "subscription client connected");
        self.state.write().await.clients.insert(client_id, sender);
        receiver
    }

    /// Registers the root field of a subscription operation.
    pub async fn subscribe(
        &self,
        ctx: ExecutionContext,
        root_type: String,
        client_id: Option<String>,
        subscription_id: Option<String>,
    ) -> Result<Response, ExecutionError> {
        let client_id = client_id.ok_or(ExecutionError::MissingClientId)?;
        if !self.state.read().await.clients.contains_key(&client_id) {
            return Err(ExecutionError::UnknownClient(client_id));
        }

        let groups = collect_fields(
            &ctx.schema,
            &ctx.document,
            &ctx.variables,
            &root_type,
            [&ctx.operation.selection_set],
        );
        let mut entries = groups.iter();
        let (Some((key, fields)), None) = (entries.next(), entries.next()) else {
            return Err(ExecutionError::InvalidSubscription);
        };
        let field_name = fields[0].name.as_str();
        let field_def = ctx
            .schema
            .field(&root_type, field_name)
            .ok_or(ExecutionError::InvalidSubscription)?;
        let channel = field_def
            .channel
            .clone()
            .ok_or_else(|| ExecutionError::MissingChannel(format!("{root_type}.{field_name}")))?;

        let arguments = match resolve_arguments(&ctx.schema, field_def, fields[0], &ctx.variables) {
            Ok(arguments) => arguments,
            Err(e) => {
                let error = FieldError::new(e.to_string())
                    .with_locations(ctx.locations(fields))
                    .with_path(&Path::root().field(key));
                return Ok(Response::error(error));
            }
        };

        let id = subscription_id.unwrap_or_else(|| {
            format!("sub-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
        });
        let response_key = (*key).to_string();
        let field_name = field_name.to_string();
        let filter = field_def.filter.clone();
        drop(groups);

        let subscription = Arc::new(Subscription {
            id: id.clone(),
            client_id: client_id.clone(),
            root_type,
            field_name,
            response_key,
            arguments,
            filter,
            ctx,
        });

        debug!(client = %client_id, subscription = %id, channel = %channel, "subscription registered");
        self.state
            .write()
            .await
            .channels
            .entry(channel)
            .or_default()
            .insert((client_id, id.clone()), subscription);

        Ok(Response::subscription(id))
    }

    /// Delivers a payload to every matching subscriber on `channel`.
    pub async fn publish(&self, channel: &str, payload: Value) -> usize {
        let subscriptions: Vec<Arc<Subscription>> = self
            .state
            .read()
            .await
            .channels
            .get(channel)
            .map(|subs| subs.values().cloned().collect())
            .unwrap_or_default();

        let mut delivered = 0;
        for subscription in subscriptions {
            if !subscription.matches(&payload) {
                continue;
            }
            let response = subscription.deliver(&payload).await;
            let sender = self
                .state
                .read()
                .await
                .clients
                .get(&subscription.client_id)
                .cloned();

            match sender {
                Some(sender) if sender.send(response).is_ok() => {
                    debug!(
                        channel,
                        client = %subscription.client_id,
                        subscription = %subscription.id,
                        "subscription event delivered"
                    );
                    delivered += 1;
                }
                _ => {
                    warn!(client = %subscription.client_id, "dropping subscriber with a closed stream");
                    self.disconnect(&subscription.client_id).await;
                }
            }
        }
        delivered
    }

    pub async fn unsubscribe(&self, client_id: &str, subscription_id: &str) -> bool {
        let key = (client_id.to_string(), subscription_id.to_string());
        let mut state = self.state.write().await;
        let mut removed = false;
        for subscriptions in state.channels.values_mut() {
            removed |= subscriptions.shift_remove(&key).is_some();
        }
        state.channels.retain(|_, subscriptions| !subscriptions.is_empty());
        removed
    }

    pub async fn disconnect(&self, client_id: &str) {
        let mut state = self.state.write().await;
        state.clients.remove(client_id);
        for subscriptions in state.channels.values_mut() {
            subscriptions.retain(|(client, _), _| client != client_id);
        }
        state.channels.retain(|_, subscriptions| !subscriptions.is_empty());
    }

    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.state
            .read()
            .await
            .channels
            .get(channel)
            .map_or(0, IndexMap::len)
    }
}
