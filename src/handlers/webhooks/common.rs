//! Shared pieces of the inbound webhook surface.
//!
//! Both providers answer `{"received": true}` for anything that was
//! handled - including redeliveries and events referencing states the
//! intent has already passed. Only malformed requests (400), failed
//! verification (401), and internal errors (500, which the provider will
//! retry) get error statuses.

use serde::Serialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::payments::PaymentProvider;
use crate::settlement::{self, Applied, IntentStatus};

#[derive(Debug, Serialize)]
pub struct ReceivedResponse {
    pub received: bool,
}

pub fn received() -> Json<ReceivedResponse> {
    Json(ReceivedResponse { received: true })
}

/// Feed one observed provider state through the settlement machine and log
/// the outcome. Webhook handlers call this after verification; the sync
/// endpoint reuses the same path with no event ID.
pub fn settle(
    state: &AppState,
    provider: PaymentProvider,
    event_id: Option<&str>,
    intent_id: &str,
    observed: IntentStatus,
    capture_id: Option<&str>,
) -> Result<Applied> {
    let mut conn = state.db.get()?;
    let applied = settlement::apply_settlement(
        &mut conn,
        provider,
        event_id,
        intent_id,
        observed,
        capture_id,
    )?;

    match &applied {
        Applied::DuplicateEvent => {
            tracing::info!(
                "{} webhook replay detected (event={:?}), no ledger effect",
                provider,
                event_id
            );
        }
        Applied::NoOp { current } => {
            tracing::debug!(
                "{} event for intent {} reported {}, already {} - no-op",
                provider,
                intent_id,
                observed,
                current
            );
        }
        Applied::Transitioned { from, to, credited } => {
            tracing::info!(
                "{} intent {}: {} -> {}{}",
                provider,
                intent_id,
                from,
                to,
                if *credited { ", wallet credited" } else { "" }
            );
        }
    }

    Ok(applied)
}
