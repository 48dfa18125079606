use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AdminSession;
use crate::models::{AdmissionState, GateStats, Ticket};
use crate::services::{AdmissionAction, ScanResolution};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::ApiJson;
use crate::utils::response::success;

const RECENT_TICKETS: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct TicketQuery {
    #[serde(default)]
    pub ticket_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub payload: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    #[serde(default, alias = "ticket_id")]
    pub ticket_id: Option<String>,
    #[serde(default)]
    pub payload: Option<String>,
    pub action: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TicketView {
    admission_state: AdmissionState,
    ticket: Ticket,
}

impl From<Ticket> for TicketView {
    fn from(ticket: Ticket) -> Self {
        Self {
            admission_state: ticket.admission_state(),
            ticket,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanView {
    admission_state: AdmissionState,
    #[serde(flatten)]
    resolution: ScanResolution,
}

impl From<ScanResolution> for ScanView {
    fn from(resolution: ScanResolution) -> Self {
        Self {
            admission_state: resolution.ticket.admission_state(),
            resolution,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsView {
    #[serde(flatten)]
    stats: GateStats,
    recent_tickets: Vec<Ticket>,
}

fn parse_ticket_id(raw: &str) -> Result<Uuid, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::ValidationError("Ticket ID is required".to_string()));
    }
    Uuid::parse_str(raw).map_err(|_| AppError::TicketNotFound(raw.to_string()))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(query): Query<TicketQuery>,
) -> Result<Response, AppError> {
    let ticket = state
        .admission
        .lookup(parse_ticket_id(&query.ticket_id)?)
        .await?;
    Ok(success(TicketView::from(ticket), "Ticket retrieved"))
}

pub async fn scan(
    State(state): State<AppState>,
    _admin: AdminSession,
    ApiJson(body): ApiJson<ScanRequest>,
) -> Result<Response, AppError> {
    let resolution = state.admission.resolve(&body.payload).await?;
    Ok(success(ScanView::from(resolution), "Ticket resolved"))
}

pub async fn scan_image(
    State(state): State<AppState>,
    _admin: AdminSession,
    image: Bytes,
) -> Result<Response, AppError> {
    if image.is_empty() {
        return Err(AppError::ValidationError("Image body is empty".to_string()));
    }

    let codec = state.codec.clone();
    let decoded = tokio::task::spawn_blocking(move || codec.decode(&image))
        .await
        .map_err(|e| AppError::InternalServerError(format!("QR decode task failed: {e}")))??;

    let payload = decoded.ok_or_else(|| {
        AppError::MalformedCredential("No QR code found in image".to_string())
    })?;
    let resolution = state.admission.resolve(&payload).await?;
    Ok(success(ScanView::from(resolution), "Ticket resolved"))
}

pub async fn check_in(
    State(state): State<AppState>,
    admin: AdminSession,
    ApiJson(body): ApiJson<CheckInRequest>,
) -> Result<Response, AppError> {
    let action: AdmissionAction = body.action.parse()?;

    let ticket = match (body.payload.as_deref(), body.ticket_id.as_deref()) {
        (Some(payload), _) if !payload.trim().is_empty() => {
            state.admission.scan_and_apply(payload, action, &admin).await?
        }
        (_, Some(ticket_id)) => {
            state
                .admission
                .apply(parse_ticket_id(ticket_id)?, action, &admin)
                .await?
        }
        _ => {
            return Err(AppError::ValidationError(
                "Either ticketId or payload is required".to_string(),
            ))
        }
    };

    let message = match action {
        AdmissionAction::CheckIn => "Ticket checked in",
        AdmissionAction::CheckOut => "Ticket checked out",
    };
    Ok(success(TicketView::from(ticket), message))
}

pub async fn stats(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<Response, AppError> {
    let stats = state.stats.stats().await?;
    let recent_tickets = state.store.recent(RECENT_TICKETS).await?;
    Ok(success(
        StatsView {
            stats,
            recent_tickets,
        },
        "Stats retrieved",
    ))
}
