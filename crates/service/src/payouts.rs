//! Payout approval, the one command-channel write with a status transition.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use vendhub_core::{DomainError, Response};
use vendhub_finance::Payout;
use vendhub_store::{Filter, Patch, Repository};

use crate::command::CommandHandler;
use crate::service::coerce_id;

/// `payout.approve`: moves a pending payout to approved, stamping when and
/// by whom. Any other starting status is rejected; a repeated approval of
/// the same payout therefore fails instead of silently re-stamping.
pub struct ApprovePayout {
    repo: Arc<dyn Repository<Payout>>,
}

#[derive(Debug, Deserialize)]
struct ApprovePayload {
    id: Value,
    #[serde(default)]
    approved_by: Option<String>,
}

impl ApprovePayout {
    pub fn new(repo: Arc<dyn Repository<Payout>>) -> Self {
        Self { repo }
    }

    async fn approve(&self, payload: Value) -> Result<Payout, DomainError> {
        let payload: ApprovePayload = serde_json::from_value(payload)
            .map_err(|err| DomainError::invalid("payload", err.to_string(), "malformed"))?;
        let id = coerce_id(&payload.id)
            .ok_or_else(|| DomainError::invalid("id", "is required", "missing"))?;

        let payout = self
            .repo
            .find_one(&id, &Filter::new())
            .await
            .map_err(DomainError::from)?
            .ok_or(DomainError::NotFound)?;
        if !payout.is_pending() {
            return Err(DomainError::invalid(
                "status",
                format!("cannot approve a payout in status `{}`", payout.status),
                "invalid_transition",
            ));
        }

        let mut patch = Patch::new();
        patch.insert("status".to_owned(), json!(Payout::APPROVED));
        patch.insert("approved_at".to_owned(), json!(Utc::now()));
        if let Some(actor) = payload.approved_by {
            patch.insert("approved_by".to_owned(), Value::String(actor));
        }
        self.repo.update(&id, patch).await.map_err(DomainError::from)
    }
}

#[async_trait]
impl CommandHandler for ApprovePayout {
    #[instrument(skip_all)]
    async fn execute(&self, payload: Value) -> Response {
        match self.approve(payload).await {
            Ok(payout) => match serde_json::to_value(&payout) {
                Ok(data) => Response::ok("payout approved").with_data(data),
                Err(err) => Response::from(DomainError::unknown(format!("serialize record: {err}"))),
            },
            Err(err) => Response::from(err),
        }
    }
}
