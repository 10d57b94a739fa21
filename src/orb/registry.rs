//! Method Registry
//!
//! Maps method names (e.g. "request_token") to the async closures that
//! implement them. Each peer role declares its full method table up front;
//! the listener only ever dispatches through this table.

use super::protocol::{FaultKind, RemoteFault};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type-erased async method handler.
pub type MethodFn = Arc<
    dyn Fn(Args) -> Pin<Box<dyn Future<Output = Result<Value, RemoteFault>> + Send>>
        + Send
        + Sync,
>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("method '{0}' is already registered")]
    Duplicate(String),
}

/// Positional arguments of an incoming call.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<Value>,
}

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Decodes the argument at `index`; `name` only shows up in the fault.
    pub fn get<T: DeserializeOwned>(&self, index: usize, name: &str) -> Result<T, RemoteFault> {
        let value = self.values.get(index).ok_or_else(|| {
            RemoteFault::message(
                FaultKind::InvalidArguments,
                format!("missing argument #{} ({})", index, name),
            )
        })?;

        serde_json::from_value(value.clone()).map_err(|e| {
            RemoteFault::message(
                FaultKind::InvalidArguments,
                format!("argument #{} ({}): {}", index, name, e),
            )
        })
    }
}

/// Encodes a handler's return value.
pub fn reply<T: Serialize>(value: T) -> Result<Value, RemoteFault> {
    serde_json::to_value(value).map_err(|e| RemoteFault::internal(e.to_string()))
}

pub struct MethodRegistry {
    methods: DashMap<String, MethodFn>,
}

impl MethodRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `handler` under `name`.
    ///
    /// Fails if the name is taken: a role's method table is fixed when the
    /// peer is built, so a clash is a programming error caught at startup.
    pub fn register<F, Fut>(&self, name: &str, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RemoteFault>> + Send + 'static,
    {
        match self.methods.entry(name.to_string()) {
            Entry::Occupied(_) => Err(RegistryError::Duplicate(name.to_string())),
            Entry::Vacant(slot) => {
                let method: MethodFn = Arc::new(move |args: Args| {
                    Box::pin(handler(args))
                        as Pin<Box<dyn Future<Output = Result<Value, RemoteFault>> + Send>>
                });
                slot.insert(method);
                tracing::debug!("Registered method: {}", name);
                Ok(())
            }
        }
    }

    /// Runs the handler registered under `name`.
    pub async fn dispatch(&self, name: &str, args: Vec<Value>) -> Result<Value, RemoteFault> {
        // Clone the handle out so the map shard is not locked while the
        // handler runs.
        let method = self
            .methods
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                RemoteFault::new(FaultKind::UnknownMethod, vec![Value::String(name.into())])
            })?;

        method(Args::new(args)).await
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self {
            methods: DashMap::new(),
        }
    }
}
