//! Name-based dispatch.
//!
//! A [`Registry`] maps `Service.Method` keys to byte-to-byte handlers. It is
//! filled once before the server starts and only read afterwards. Typed
//! methods are adapted into handlers by [`Registry::register_typed`] or, for
//! a whole service, by [`Service::bind`]: each adapter decodes the parameter
//! bytes, calls the method, and encodes the result with the server's codec.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::codec::Codec;
use crate::error::{RegistryError, ServiceError};

/// A registered method: reads encoded parameters, appends the encoded
/// result to the output buffer.
///
/// The output buffer comes from a pooled [`Response`](crate::Response); a
/// handler that fails may leave partial bytes in it, they are discarded.
pub type Handler = Arc<dyn Fn(&[u8], &mut Vec<u8>) -> Result<(), ServiceError> + Send + Sync>;

/// Split `Service.Method` at the last dot.
pub fn split_key(key: &str) -> Result<(&str, &str), RegistryError> {
    match key.rsplit_once('.') {
        Some((service, method)) if !service.is_empty() && !method.is_empty() => {
            Ok((service, method))
        }
        _ => Err(RegistryError::InvalidKey(key.to_string())),
    }
}

/// Handler table keyed by service, then method.
#[derive(Clone, Default)]
pub struct Registry {
    services: HashMap<String, HashMap<String, Handler>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw handler under `Service.Method`.
    ///
    /// A second registration for the same key replaces the first.
    pub fn register<F>(&mut self, key: &str, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(&[u8], &mut Vec<u8>) -> Result<(), ServiceError> + Send + Sync + 'static,
    {
        self.insert(key, Arc::new(handler))
    }

    /// Register a typed function. Parameters are decoded and the result
    /// encoded with `codec`; a parameter that fails to decode is reported to
    /// the caller as an application error.
    pub fn register_typed<C, A, R, F>(
        &mut self,
        key: &str,
        codec: C,
        method: F,
    ) -> Result<(), RegistryError>
    where
        C: Codec,
        A: DeserializeOwned,
        R: Serialize,
        F: Fn(A) -> Result<R, ServiceError> + Send + Sync + 'static,
    {
        self.insert(key, typed_handler(codec, method))
    }

    /// Register every method a service exposes through [`Service::bind`],
    /// under [`Service::NAME`]. Returns the number of methods bound.
    pub fn register_service<S, C>(&mut self, service: Arc<S>, codec: C) -> usize
    where
        S: Service,
        C: Codec,
    {
        self.register_service_as(S::NAME, service, codec)
    }

    /// Like [`register_service`](Self::register_service) but publishes the
    /// methods under `name`.
    pub fn register_service_as<S, C>(&mut self, name: &str, service: Arc<S>, codec: C) -> usize
    where
        S: Service,
        C: Codec,
    {
        let mut binder = ServiceBinder {
            service: name.to_string(),
            codec,
            registry: self,
            bound: 0,
        };
        service.bind(&mut binder);
        let bound = binder.bound;
        debug!(service = name, methods = bound, "service registered");
        bound
    }

    /// Resolve a `Service.Method` key.
    pub fn find(&self, key: &str) -> Result<&Handler, RegistryError> {
        let (service, method) = split_key(key)?;
        self.lookup(service, method)
    }

    /// Resolve an already split key.
    pub fn lookup(&self, service: &str, method: &str) -> Result<&Handler, RegistryError> {
        let methods = self
            .services
            .get(service)
            .ok_or_else(|| RegistryError::ServiceNotFound(service.to_string()))?;
        methods
            .get(method)
            .ok_or_else(|| RegistryError::MethodNotFound {
                service: service.to_string(),
                method: method.to_string(),
            })
    }

    /// All registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .services
            .iter()
            .flat_map(|(service, methods)| {
                methods.keys().map(move |method| format!("{service}.{method}"))
            })
            .collect();
        keys.sort();
        keys
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.services.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, key: &str, handler: Handler) -> Result<(), RegistryError> {
        let (service, method) = split_key(key)?;
        let replaced = self
            .services
            .entry(service.to_string())
            .or_default()
            .insert(method.to_string(), handler);
        if replaced.is_some() {
            warn!(key, "handler replaced by later registration");
        }
        Ok(())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("keys", &self.keys())
            .finish()
    }
}

fn typed_handler<C, A, R, F>(codec: C, method: F) -> Handler
where
    C: Codec,
    A: DeserializeOwned,
    R: Serialize,
    F: Fn(A) -> Result<R, ServiceError> + Send + Sync + 'static,
{
    Arc::new(move |params: &[u8], out: &mut Vec<u8>| -> Result<(), ServiceError> {
        let args: A = codec.unmarshal(params)?;
        let result = method(args)?;
        codec.marshal_into(&result, out)?;
        Ok(())
    })
}

/// A set of methods published under one service name.
///
/// ```ignore
/// struct Echo;
///
/// impl Service for Echo {
///     const NAME: &'static str = "Echo";
///
///     fn bind<C: Codec>(self: Arc<Self>, binder: &mut ServiceBinder<'_, C>) {
///         binder.method("Say", |msg: String| Ok(msg.to_uppercase()));
///     }
/// }
/// ```
pub trait Service: Send + Sync + 'static {
    const NAME: &'static str;

    /// Publish this service's methods.
    fn bind<C: Codec>(self: Arc<Self>, binder: &mut ServiceBinder<'_, C>);
}

/// Registers a service's methods under its name, all using one codec.
pub struct ServiceBinder<'r, C: Codec> {
    service: String,
    codec: C,
    registry: &'r mut Registry,
    bound: usize,
}

impl<C: Codec> ServiceBinder<'_, C> {
    /// Publish `method` as `<service>.<name>`.
    pub fn method<A, R, F>(&mut self, name: &str, method: F) -> &mut Self
    where
        A: DeserializeOwned,
        R: Serialize,
        F: Fn(A) -> Result<R, ServiceError> + Send + Sync + 'static,
    {
        let key = format!("{}.{}", self.service, name);
        match self.registry.insert(&key, typed_handler(self.codec.clone(), method)) {
            Ok(()) => self.bound += 1,
            Err(err) => warn!(%key, error = %err, "method not registered"),
        }
        self
    }

    /// Name the methods are published under.
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }
}
