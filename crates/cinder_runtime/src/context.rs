//! Request data and per-execution state.

use crate::error::{FieldError, Location};
use crate::executor::ExecutorConfig;
use crate::resolver::Instance;
use crate::schema::Schema;
use crate::value::Value;
use crate::variables::Variables;
use cinder_syntax::ast::{Document, Field, OperationDefinition};
use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

/// Request-scoped data, keyed by type.
///
/// Resolvers that declare a context parameter reach it through
/// [`ParentContext::data`](crate::resolver::ParentContext::data).
///
/// # Example
///
/// ```
/// use cinder_runtime::Context;
///
/// struct UserId(String);
///
/// let ctx = Context::new().with(UserId("42".into()));
/// assert_eq!(ctx.get::<UserId>().map(|id| id.0.as_str()), Some("42"));
/// assert!(ctx.get::<u32>().is_none());
/// ```
#[derive(Default)]
pub struct Context {
    data: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Context {
    /// Creates a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.data
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|boxed| boxed.downcast().ok().map(|b| *b))
    }

    /// Adds a value and returns self.
    #[must_use]
    pub fn with<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// Gets a reference to a value by type.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.data
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    /// Gets a mutable reference to a value by type.
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.data
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut())
    }

    /// Removes a value by type.
    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.data
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast().ok().map(|b| *b))
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.data.contains_key(&TypeId::of::<T>())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("data_count", &self.data.len())
            .finish()
    }
}

/// Object instance identity, object type, selection identity.
pub(crate) type MemoKey = (usize, String, usize);

/// Result slot for one memoized object. Holds `None` when the first
/// completion recorded errors and cannot be shared.
pub(crate) type MemoCell = Arc<OnceCell<Option<Value>>>;

/// State shared by every field of one execution.
pub(crate) struct ExecutionContext {
    pub schema: Arc<Schema>,
    pub document: Arc<Document>,
    pub operation: OperationDefinition,
    pub variables: Variables,
    pub data: Arc<Context>,
    pub config: ExecutorConfig,
    errors: RwLock<Vec<FieldError>>,
    /// Object completions, finished or in flight. The instance is kept so
    /// its address stays unique.
    memo: Option<RwLock<FxHashMap<MemoKey, (Instance, MemoCell)>>>,
}

impl ExecutionContext {
    pub fn new(
        schema: Arc<Schema>,
        document: Arc<Document>,
        operation: OperationDefinition,
        variables: Variables,
        data: Arc<Context>,
        config: ExecutorConfig,
    ) -> Self {
        let memo = config.memoize_objects.then(|| RwLock::new(FxHashMap::default()));
        Self {
            schema,
            document,
            operation,
            variables,
            data,
            config,
            errors: RwLock::new(Vec::new()),
            memo,
        }
    }

    /// A context over the same inputs with no errors and an empty memo.
    pub fn fresh(&self) -> Self {
        Self::new(
            Arc::clone(&self.schema),
            Arc::clone(&self.document),
            self.operation.clone(),
            self.variables.clone(),
            Arc::clone(&self.data),
            self.config.clone(),
        )
    }

    pub async fn record(&self, error: FieldError) {
        self.errors.write().await.push(error);
    }

    pub async fn error_count(&self) -> usize {
        self.errors.read().await.len()
    }

    pub async fn take_errors(&self) -> Vec<FieldError> {
        std::mem::take(&mut *self.errors.write().await)
    }

    /// Source locations of a field group.
    pub fn locations(&self, fields: &[&Field]) -> Vec<Location> {
        fields
            .iter()
            .map(|field| Location::from(self.document.location(field.span)))
            .collect()
    }

    /// The memo slot for a key, created on first use. Every occurrence of
    /// the key awaits the same slot.
    pub async fn memo_cell(&self, key: MemoKey, instance: &Instance) -> Option<MemoCell> {
        let memo = self.memo.as_ref()?;
        let mut memo = memo.write().await;
        let (_, cell) = memo
            .entry(key)
            .or_insert_with(|| (instance.clone(), MemoCell::default()));
        Some(Arc::clone(cell))
    }
}
