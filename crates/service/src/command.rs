//! Synchronous command channel: named commands answered with envelopes.
//!
//! A command names an operation as `<domain>.<action>` and carries its
//! arguments in `payload`. Dispatch never fails outward; unknown commands
//! and malformed payloads come back as failure envelopes like any other
//! rejected request.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use vendhub_core::{DomainError, Response};
use vendhub_store::{Filter, ListQuery, Persistable, Sort};

use crate::service::{EntityService, coerce_id};

/// A request on the command channel.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub cmd: String,
    pub payload: Value,
    /// Queue the reply envelope should be published to, if any.
    pub reply_to: Option<String>,
}

#[derive(Deserialize)]
struct RawRequest {
    #[serde(default)]
    cmd: Option<String>,
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    reply_to: Option<String>,
}

impl CommandRequest {
    pub fn new(cmd: impl Into<String>, payload: Value) -> Self {
        Self {
            cmd: cmd.into(),
            payload,
            reply_to: None,
        }
    }

    pub fn with_reply_to(mut self, queue: impl Into<String>) -> Self {
        self.reply_to = Some(queue.into());
        self
    }

    /// Accepts both `{cmd: "account.list"}` and `{module: "account",
    /// action: "list"}` request shapes.
    pub fn parse(raw: Value) -> Result<Self, DomainError> {
        let raw: RawRequest = serde_json::from_value(raw)
            .map_err(|err| DomainError::invalid("request", err.to_string(), "malformed"))?;
        let cmd = match (raw.cmd, raw.module, raw.action) {
            (Some(cmd), _, _) if !cmd.is_empty() => cmd,
            (_, Some(module), Some(action)) => format!("{module}.{action}"),
            _ => return Err(DomainError::invalid("cmd", "is required", "missing")),
        };
        Ok(Self {
            cmd,
            payload: raw.payload,
            reply_to: raw.reply_to,
        })
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, payload: Value) -> Response;
}

#[async_trait]
impl<H> CommandHandler for Arc<H>
where
    H: CommandHandler + ?Sized,
{
    async fn execute(&self, payload: Value) -> Response {
        (**self).execute(payload).await
    }
}

/// Command-name to handler table.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, cmd: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        let cmd = cmd.into();
        if self.handlers.insert(cmd.clone(), handler).is_some() {
            warn!(%cmd, "command handler replaced");
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub async fn dispatch(&self, request: CommandRequest) -> Response {
        let Some(handler) = self.handlers.get(&request.cmd) else {
            return Response::rejected(
                &DomainError::NotFound,
                format!("unknown command `{}`", request.cmd),
            );
        };
        debug!(cmd = %request.cmd, "dispatching command");
        handler.execute(request.payload).await
    }
}

fn parse<T: DeserializeOwned>(payload: Value) -> Result<T, DomainError> {
    serde_json::from_value(payload)
        .map_err(|err| DomainError::invalid("payload", err.to_string(), "malformed"))
}

fn parse_or_default<T: DeserializeOwned + Default>(payload: Value) -> Result<T, DomainError> {
    if payload.is_null() {
        return Ok(T::default());
    }
    parse(payload)
}

fn optional_filter(object: Option<&Map<String, Value>>) -> Result<Filter, DomainError> {
    match object {
        Some(object) => Filter::from_object(object)
            .map_err(|message| DomainError::invalid("filter", message, "invalid_filter")),
        None => Ok(Filter::new()),
    }
}

fn required_id(value: &Value) -> Result<vendhub_core::EntityId, DomainError> {
    coerce_id(value).ok_or_else(|| DomainError::invalid("id", "is required", "missing"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListPayload {
    page: Option<u32>,
    limit: Option<u32>,
    search: Option<String>,
    sort: Option<Sort>,
    filter: Option<Map<String, Value>>,
}

impl ListPayload {
    fn into_query(self) -> Result<ListQuery, DomainError> {
        let mut query = ListQuery::new();
        if let Some(object) = self.filter.as_ref() {
            query = query.filter(optional_filter(Some(object))?);
        }
        if let Some(page) = self.page {
            query = query.page(page);
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        if let Some(sort) = self.sort {
            query = query.sort(sort);
        }
        if let Some(search) = self.search {
            query = query.search(search);
        }
        Ok(query)
    }
}

#[derive(Debug, Deserialize)]
struct GetPayload {
    id: Value,
    #[serde(default)]
    filter: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CountPayload {
    filter: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct UpdatePayload {
    id: Value,
    data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct IdPayload {
    id: Value,
}

pub struct ListCommand<E: Persistable> {
    service: EntityService<E>,
}

impl<E: Persistable> ListCommand<E> {
    pub fn new(service: EntityService<E>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<E: Persistable> CommandHandler for ListCommand<E> {
    async fn execute(&self, payload: Value) -> Response {
        match parse_or_default::<ListPayload>(payload).and_then(ListPayload::into_query) {
            Ok(query) => self.service.find_all(query).await,
            Err(err) => Response::from(err),
        }
    }
}

pub struct GetCommand<E: Persistable> {
    service: EntityService<E>,
}

impl<E: Persistable> GetCommand<E> {
    pub fn new(service: EntityService<E>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<E: Persistable> CommandHandler for GetCommand<E> {
    async fn execute(&self, payload: Value) -> Response {
        let payload: GetPayload = match parse(payload) {
            Ok(payload) => payload,
            Err(err) => return Response::from(err),
        };
        let id = match required_id(&payload.id) {
            Ok(id) => id,
            Err(err) => return Response::from(err),
        };
        match optional_filter(payload.filter.as_ref()) {
            Ok(filter) => self.service.find_one(&id, &filter).await,
            Err(err) => Response::from(err),
        }
    }
}

pub struct CountCommand<E: Persistable> {
    service: EntityService<E>,
}

impl<E: Persistable> CountCommand<E> {
    pub fn new(service: EntityService<E>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<E: Persistable> CommandHandler for CountCommand<E> {
    async fn execute(&self, payload: Value) -> Response {
        let payload: CountPayload = match parse_or_default(payload) {
            Ok(payload) => payload,
            Err(err) => return Response::from(err),
        };
        match optional_filter(payload.filter.as_ref()) {
            Ok(filter) => self.service.count(&filter).await,
            Err(err) => Response::from(err),
        }
    }
}

pub struct CreateCommand<E: Persistable> {
    service: EntityService<E>,
}

impl<E: Persistable> CreateCommand<E> {
    pub fn new(service: EntityService<E>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<E: Persistable> CommandHandler for CreateCommand<E> {
    async fn execute(&self, payload: Value) -> Response {
        self.service.create(payload).await
    }
}

pub struct UpdateCommand<E: Persistable> {
    service: EntityService<E>,
}

impl<E: Persistable> UpdateCommand<E> {
    pub fn new(service: EntityService<E>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<E: Persistable> CommandHandler for UpdateCommand<E> {
    async fn execute(&self, payload: Value) -> Response {
        let payload: UpdatePayload = match parse(payload) {
            Ok(payload) => payload,
            Err(err) => return Response::from(err),
        };
        match required_id(&payload.id) {
            Ok(id) => self.service.update(&id, payload.data).await,
            Err(err) => Response::from(err),
        }
    }
}

pub struct DeleteCommand<E: Persistable> {
    service: EntityService<E>,
}

impl<E: Persistable> DeleteCommand<E> {
    pub fn new(service: EntityService<E>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<E: Persistable> CommandHandler for DeleteCommand<E> {
    async fn execute(&self, payload: Value) -> Response {
        let payload: IdPayload = match parse(payload) {
            Ok(payload) => payload,
            Err(err) => return Response::from(err),
        };
        match required_id(&payload.id) {
            Ok(id) => self.service.delete(&id).await,
            Err(err) => Response::from(err),
        }
    }
}

pub struct RestoreCommand<E: Persistable> {
    service: EntityService<E>,
}

impl<E: Persistable> RestoreCommand<E> {
    pub fn new(service: EntityService<E>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<E: Persistable> CommandHandler for RestoreCommand<E> {
    async fn execute(&self, payload: Value) -> Response {
        let payload: IdPayload = match parse(payload) {
            Ok(payload) => payload,
            Err(err) => return Response::from(err),
        };
        match required_id(&payload.id) {
            Ok(id) => self.service.restore(&id).await,
            Err(err) => Response::from(err),
        }
    }
}

/// Registers `<domain>.list`, `<domain>.get` and `<domain>.count`.
pub fn register_queries<E: Persistable>(registry: &mut CommandRegistry, service: &EntityService<E>) {
    let domain = E::descriptor().domain;
    registry.register(format!("{domain}.list"), Arc::new(ListCommand::new(service.clone())));
    registry.register(format!("{domain}.get"), Arc::new(GetCommand::new(service.clone())));
    registry.register(format!("{domain}.count"), Arc::new(CountCommand::new(service.clone())));
}

/// Registers `<domain>.create/update/delete/restore` for domains whose
/// writes arrive over the command channel instead of the event pipeline.
pub fn register_writes<E: Persistable>(registry: &mut CommandRegistry, service: &EntityService<E>) {
    let domain = E::descriptor().domain;
    registry.register(format!("{domain}.create"), Arc::new(CreateCommand::new(service.clone())));
    registry.register(format!("{domain}.update"), Arc::new(UpdateCommand::new(service.clone())));
    registry.register(format!("{domain}.delete"), Arc::new(DeleteCommand::new(service.clone())));
    registry.register(format!("{domain}.restore"), Arc::new(RestoreCommand::new(service.clone())));
}
