//! One remote collection of entities with an async request lifecycle.
//!
//! Every slice of the application state is a `RemoteCollection`: a cached
//! list, an optional "current" entity, and the status of the last request.
//! Operations talk to the document store and then dispatch an `Action`; the
//! pure `CollectionState::reduce` applies it.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::store::{self, Direction, DocumentStore, Query};

/// A document kind stored in one collection.
pub trait Entity: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;
    /// Singular, capitalized: "Workout plan".
    const LABEL: &'static str;
    /// Plural, lowercase: "workout plans".
    const PLURAL: &'static str;
    /// Field the list is ordered by, newest first.
    const SORT_FIELD: &'static str;

    /// Extra equality filters for `fetch_all` beyond the owner.
    type Filter: Clone + fmt::Debug + Send + Sync + 'static;

    fn id(&self) -> &str;

    fn filter_query(_filter: &Self::Filter, query: Query) -> Query {
        query
    }
}

/// Input checked before any request is made.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// State derived from a collection's list and kept in step with it.
pub trait Aggregate<E: Entity>: Default + Clone + Send + 'static {
    fn on_fetch_all(&mut self, _filter: &E::Filter, _items: &[E]) {}
    fn on_create(&mut self, _item: &E) {}
    fn on_update(&mut self, _old: &E, _new: &E) {}
    fn on_delete(&mut self, _removed: &E) {}
}

impl<E: Entity> Aggregate<E> for () {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestStatus {
    #[default]
    Idle,
    Pending,
    Fulfilled,
    Rejected,
}

impl RequestStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Fulfilled => "fulfilled",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FetchAll,
    FetchOne,
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Message used when a failure carries no text of its own.
    #[must_use]
    pub fn fallback_message<E: Entity>(self) -> String {
        let label = E::LABEL.to_lowercase();
        match self {
            Self::FetchAll => format!("Failed to fetch {}", E::PLURAL),
            Self::FetchOne => format!("Failed to fetch {label}"),
            Self::Create => format!("Failed to create {label}"),
            Self::Update => format!("Failed to update {label}"),
            Self::Delete => format!("Failed to delete {label}"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action<E: Entity> {
    Pending(Operation),
    FetchedAll { filter: E::Filter, items: Vec<E> },
    FetchedOne(E),
    Created(E),
    Updated(E),
    Deleted(String),
    Rejected { operation: Operation, message: String },
    ClearCurrent,
    /// Back to the initial state, derived state included.
    Reset,
}

#[derive(Debug, Clone)]
pub struct CollectionState<E: Entity, A: Aggregate<E> = ()> {
    items: Vec<E>,
    current: Option<E>,
    status: RequestStatus,
    error: Option<String>,
    aggregate: A,
}

impl<E: Entity, A: Aggregate<E>> Default for CollectionState<E, A> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            current: None,
            status: RequestStatus::Idle,
            error: None,
            aggregate: A::default(),
        }
    }
}

impl<E: Entity, A: Aggregate<E>> CollectionState<E, A> {
    #[must_use]
    pub fn items(&self) -> &[E] {
        &self.items
    }

    #[must_use]
    pub fn current(&self) -> Option<&E> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn status(&self) -> RequestStatus {
        self.status
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    #[must_use]
    pub fn aggregate(&self) -> &A {
        &self.aggregate
    }

    pub fn reduce(&mut self, action: Action<E>) {
        match action {
            Action::Pending(_) => {
                self.status = RequestStatus::Pending;
                self.error = None;
            }
            Action::FetchedAll { filter, items } => {
                self.aggregate.on_fetch_all(&filter, &items);
                self.items = items;
                self.status = RequestStatus::Fulfilled;
            }
            Action::FetchedOne(item) => {
                self.current = Some(item);
                self.status = RequestStatus::Fulfilled;
            }
            Action::Created(item) => {
                self.aggregate.on_create(&item);
                self.items.insert(0, item.clone());
                self.current = Some(item);
                self.status = RequestStatus::Fulfilled;
            }
            Action::Updated(item) => {
                match self.items.iter().position(|e| e.id() == item.id()) {
                    Some(pos) => {
                        let old = std::mem::replace(&mut self.items[pos], item.clone());
                        self.aggregate.on_update(&old, &item);
                    }
                    None => debug!(
                        collection = E::COLLECTION,
                        id = item.id(),
                        "Updated entity is not in the cached list"
                    ),
                }
                self.current = Some(item);
                self.status = RequestStatus::Fulfilled;
            }
            Action::Deleted(id) => {
                if let Some(pos) = self.items.iter().position(|e| e.id() == id) {
                    let removed = self.items.remove(pos);
                    self.aggregate.on_delete(&removed);
                }
                if self.current.as_ref().is_some_and(|c| c.id() == id) {
                    self.current = None;
                }
                self.status = RequestStatus::Fulfilled;
            }
            Action::Rejected { message, .. } => {
                self.status = RequestStatus::Rejected;
                self.error = Some(message);
            }
            Action::ClearCurrent => self.current = None,
            Action::Reset => *self = Self::default(),
        }
    }
}

/// A collection slice bound to a document store.
///
/// Cloning shares both the store and the state.
pub struct RemoteCollection<E: Entity, A: Aggregate<E> = ()> {
    store: Arc<dyn DocumentStore>,
    state: Arc<Mutex<CollectionState<E, A>>>,
}

impl<E: Entity, A: Aggregate<E>> Clone for RemoteCollection<E, A> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            state: Arc::clone(&self.state),
        }
    }
}

impl<E: Entity, A: Aggregate<E>> RemoteCollection<E, A> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            state: Arc::new(Mutex::new(CollectionState::default())),
        }
    }

    pub fn dispatch(&self, action: Action<E>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.reduce(action);
        debug!(collection = E::COLLECTION, status = %state.status, "Collection state changed");
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&CollectionState<E, A>) -> R) -> R {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    #[must_use]
    pub fn snapshot(&self) -> CollectionState<E, A> {
        self.with_state(Clone::clone)
    }

    #[must_use]
    pub fn items(&self) -> Vec<E> {
        self.with_state(|s| s.items.clone())
    }

    #[must_use]
    pub fn current(&self) -> Option<E> {
        self.with_state(|s| s.current.clone())
    }

    #[must_use]
    pub fn status(&self) -> RequestStatus {
        self.with_state(CollectionState::status)
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.with_state(|s| s.error.clone())
    }

    /// Record the failure on the slice and hand it back to the caller.
    fn reject(&self, operation: Operation, err: Error) -> Error {
        let err = if err.message().trim().is_empty() {
            Error::remote(operation.fallback_message::<E>())
        } else {
            err
        };
        warn!(collection = E::COLLECTION, ?operation, error = %err, "Request rejected");
        self.dispatch(Action::Rejected {
            operation,
            message: err.message().to_string(),
        });
        err
    }

    /// Every entity owned by `owner` that matches `filter`, newest first.
    pub async fn fetch_all(&self, owner: &str, filter: E::Filter) -> Result<Vec<E>> {
        self.dispatch(Action::Pending(Operation::FetchAll));
        let query = E::filter_query(
            &filter,
            Query::new()
                .where_eq("userId", owner)
                .order_by(E::SORT_FIELD, Direction::Desc),
        );
        let result = async {
            let docs = self.store.query(E::COLLECTION, &query).await?;
            docs.into_iter()
                .map(store::Document::into_entity)
                .collect::<Result<Vec<E>>>()
        }
        .await;
        match result {
            Ok(items) => {
                self.dispatch(Action::FetchedAll {
                    filter,
                    items: items.clone(),
                });
                Ok(items)
            }
            Err(err) => Err(self.reject(Operation::FetchAll, err)),
        }
    }

    pub async fn fetch_one(&self, id: &str) -> Result<E> {
        self.dispatch(Action::Pending(Operation::FetchOne));
        let result = match self.store.get(E::COLLECTION, id).await {
            Ok(Some(doc)) => doc.into_entity::<E>(),
            Ok(None) => Err(Error::not_found(format!("{} not found", E::LABEL))),
            Err(err) => Err(err),
        };
        match result {
            Ok(item) => {
                self.dispatch(Action::FetchedOne(item.clone()));
                Ok(item)
            }
            Err(err) => Err(self.reject(Operation::FetchOne, err)),
        }
    }

    /// Insert a new entity stamped with `createdAt`.
    pub async fn create<P: Serialize + Validate>(&self, payload: &P) -> Result<E> {
        payload.validate()?;
        let mut data = store::into_object(serde_json::to_value(payload)?)?;
        data.insert("createdAt".to_string(), Value::String(store::timestamp()));

        self.dispatch(Action::Pending(Operation::Create));
        let result = async {
            let doc = self.store.insert(E::COLLECTION, Value::Object(data)).await?;
            doc.into_entity::<E>()
        }
        .await;
        match result {
            Ok(item) => {
                self.dispatch(Action::Created(item.clone()));
                Ok(item)
            }
            Err(err) => Err(self.reject(Operation::Create, err)),
        }
    }

    /// Merge `patch` into the stored document and cache what comes back.
    pub async fn update<P: Serialize + Validate>(&self, id: &str, patch: &P) -> Result<E> {
        patch.validate()?;
        let patch = serde_json::to_value(patch)?;

        self.dispatch(Action::Pending(Operation::Update));
        let result = async {
            let doc = self.store.update(E::COLLECTION, id, patch).await?;
            doc.into_entity::<E>()
        }
        .await;
        match result {
            Ok(item) => {
                self.dispatch(Action::Updated(item.clone()));
                Ok(item)
            }
            Err(err) => Err(self.reject(Operation::Update, err)),
        }
    }

    /// Returns whether the store held a document with this id.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.dispatch(Action::Pending(Operation::Delete));
        match self.store.delete(E::COLLECTION, id).await {
            Ok(existed) => {
                self.dispatch(Action::Deleted(id.to_string()));
                Ok(existed)
            }
            Err(err) => Err(self.reject(Operation::Delete, err)),
        }
    }

    pub fn clear_current(&self) {
        self.dispatch(Action::ClearCurrent);
    }

    pub fn reset(&self) {
        self.dispatch(Action::Reset);
    }
}
