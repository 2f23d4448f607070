use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, State as AxumState,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::AppError,
    fact::{Choice, Fact},
    state::State,
    store::StorageStatus,
    utils::{parse_choice, validate_voter_id},
};

#[derive(Deserialize)]
pub struct CreateFact {
    content: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotePayload {
    choice: Option<String>,
    voter_id: Option<String>,
}

#[derive(Serialize)]
pub struct VoterChoice {
    choice: Option<Choice>,
}

fn malformed(rejection: impl std::fmt::Display) -> AppError {
    AppError::Validation(format!("Malformed payload: {rejection}"))
}

// An id that does not parse cannot name a stored fact.
fn fact_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, AppError> {
    path.map(|Path(id)| id).map_err(|_| AppError::NotFound)
}

pub async fn current_handler(
    AxumState(state): AxumState<Arc<State>>,
) -> Result<Json<Fact>, AppError> {
    state
        .storage
        .store()?
        .current()
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

pub async fn create_handler(
    AxumState(state): AxumState<Arc<State>>,
    payload: Result<Json<CreateFact>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload.map_err(malformed)?;
    let content = payload
        .content
        .ok_or_else(|| AppError::Validation("content is required".to_string()))?;

    let fact = state.storage.store()?.create(&content).await?;
    info!("Published fact {}", fact.id);

    Ok((StatusCode::CREATED, Json(fact)))
}

pub async fn fact_handler(
    AxumState(state): AxumState<Arc<State>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Fact>, AppError> {
    let id = fact_id(path)?;

    Ok(Json(state.storage.store()?.get(id).await?))
}

pub async fn vote_handler(
    AxumState(state): AxumState<Arc<State>>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<VotePayload>, JsonRejection>,
) -> Result<Json<Fact>, AppError> {
    let id = fact_id(path)?;
    let Json(payload) = payload.map_err(malformed)?;

    let choice = parse_choice(payload.choice.as_deref())?;
    let voter_id = validate_voter_id(payload.voter_id.as_deref().unwrap_or_default())?;

    let store = state.storage.store()?;
    let fact = store.apply_vote(id, voter_id, choice).await.inspect_err(|e| {
        if let AppError::DuplicateVote { previous } = e {
            debug!("Duplicate vote on {id}, already {previous}");
        }
    })?;

    #[cfg(feature = "verbose")]
    info!("Vote {choice} on {id}: {}/{}", fact.agrees, fact.disagrees);

    Ok(Json(fact))
}

pub async fn voter_choice_handler(
    AxumState(state): AxumState<Arc<State>>,
    path: Result<Path<(Uuid, String)>, PathRejection>,
) -> Result<Json<VoterChoice>, AppError> {
    let (id, voter_id) = path.map(|Path(p)| p).map_err(|_| AppError::NotFound)?;
    let voter_id = validate_voter_id(&voter_id)?;

    let choice = state.storage.store()?.voter_choice(id, voter_id).await?;

    Ok(Json(VoterChoice { choice }))
}

pub async fn health_handler(AxumState(state): AxumState<Arc<State>>) -> impl IntoResponse {
    let status = state.storage.status();

    let ready = match &status {
        StorageStatus::Ready(store) => store.ping().await.is_ok(),
        _ => false,
    };

    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let label = match (&status, ready) {
        (StorageStatus::Ready(_), false) => "unreachable",
        (status, _) => status.label(),
    };

    (code, Json(json!({ "status": label })))
}
