//! # HTTP Routes
//!
//! ```text
//! POST /companies/{company}/queues/{queue}/entries          join
//! GET  /companies/{company}/queues/{queue}/entries?date=    snapshot
//! GET  /companies/{company}/events                          WebSocket push
//! POST /entries/{id}/call | confirm | attend | leave | remove
//! GET  /entries/{id}/status
//! GET  /health
//! ```

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::ws;
use waitline_core::{CustomerProfile, EntryStatus, JoinRequest, JoinTicket, QueueEntry};
use waitline_engine::{EngineResult, QueueService, TransitionOutcome};

/// Shared router state.
pub type AppState = Arc<QueueService>;

/// Builds the API router.
pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/companies/{company}/queues/{queue}/entries",
            post(join_handler).get(snapshot_handler),
        )
        .route("/companies/{company}/events", get(ws::events_handler))
        .route("/entries/{id}/status", get(status_handler))
        .route("/entries/{id}/call", post(call_handler))
        .route("/entries/{id}/confirm", post(confirm_handler))
        .route("/entries/{id}/attend", post(attend_handler))
        .route("/entries/{id}/leave", post(leave_handler))
        .route("/entries/{id}/remove", post(remove_handler))
        .with_state(service)
}

// =============================================================================
// Handlers
// =============================================================================

async fn health_handler(State(service): State<AppState>) -> impl IntoResponse {
    if service.database().health_check().await {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "DATABASE UNAVAILABLE")
    }
}

/// Join body: the customer profile plus the party size.
#[derive(Debug, Deserialize)]
pub struct JoinBody {
    #[serde(flatten)]
    pub customer: CustomerProfile,
    #[serde(default = "default_party_size")]
    pub party_size: i64,
}

fn default_party_size() -> i64 {
    1
}

async fn join_handler(
    State(service): State<AppState>,
    Path((company, queue)): Path<(String, String)>,
    Json(body): Json<JoinBody>,
) -> ApiResult<(StatusCode, Json<JoinTicket>)> {
    let ticket = service
        .join(JoinRequest {
            company_id: company,
            queue_id: queue,
            customer: body.customer,
            party_size: body.party_size,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ticket)))
}

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    /// Movement date (`YYYY-MM-DD`); today when absent.
    pub date: Option<NaiveDate>,
}

async fn snapshot_handler(
    State(service): State<AppState>,
    Path((company, queue)): Path<(String, String)>,
    Query(query): Query<SnapshotQuery>,
) -> ApiResult<Json<Vec<QueueEntry>>> {
    let date = query.date.unwrap_or_else(|| service.today());
    let entries = service.queue_snapshot(&company, &queue, date).await?;
    Ok(Json(entries))
}

async fn status_handler(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EntryStatus>> {
    Ok(Json(service.status(&id).await?))
}

/// Turns a transition result into the updated entry or a 409.
fn transition_response(result: EngineResult<TransitionOutcome>) -> ApiResult<Json<QueueEntry>> {
    match result? {
        TransitionOutcome::Applied(entry) => Ok(Json(entry)),
        TransitionOutcome::Superseded { entry_id } => Err(ApiError::superseded(&entry_id)),
    }
}

async fn call_handler(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<QueueEntry>> {
    transition_response(service.call(&id).await)
}

async fn confirm_handler(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<QueueEntry>> {
    transition_response(service.confirm(&id).await)
}

async fn attend_handler(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<QueueEntry>> {
    transition_response(service.mark_attended(&id).await)
}

async fn leave_handler(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<QueueEntry>> {
    transition_response(service.leave(&id).await)
}

async fn remove_handler(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<QueueEntry>> {
    transition_response(service.remove(&id).await)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;
    use waitline_core::{ChannelKind, QueueConfiguration};
    use waitline_db::{Database, DbConfig};
    use waitline_engine::{EventBus, NotificationDispatcher, TimeoutScheduler};

    async fn app() -> Router {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.queues()
            .upsert(&QueueConfiguration {
                company_id: "acme".into(),
                queue_id: "front-desk".into(),
                name: "Front desk".into(),
                tolerance_minutes: 10,
                min_party_size: 1,
                max_party_size: 6,
                active_from: None,
                active_until: None,
                is_active: true,
                default_channel: ChannelKind::Sms,
                average_service_minutes: 5,
                updated_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let service = Arc::new(QueueService::new(
            db,
            TimeoutScheduler::new(Duration::from_secs(60)),
            NotificationDispatcher::new(),
            EventBus::new(16),
        ));
        router(service)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(json) => Body::from(json.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn customer(id: &str) -> serde_json::Value {
        serde_json::json!({
            "customer_id": id,
            "display_name": "Ada",
            "phone": "+5511999990000",
            "party_size": 2
        })
    }

    #[tokio::test]
    async fn test_join_call_confirm_flow() {
        let app = app().await;

        let (status, ticket) = send(
            &app,
            "POST",
            "/companies/acme/queues/front-desk/entries",
            Some(customer("c-1")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(ticket["position"], 0);
        let id = ticket["entryId"].as_str().unwrap().to_string();

        let (status, entry) = send(&app, "POST", &format!("/entries/{id}/call"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(entry["state"], "called");

        let (status, body) = send(&app, "GET", &format!("/entries/{id}/status"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isCalled"], true);

        let (status, entry) = send(&app, "POST", &format!("/entries/{id}/confirm"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(entry["state"], "confirmed");

        let (status, entries) = send(&app, "GET", "/companies/acme/queues/front-desk/entries", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(entries.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let app = app().await;

        let (status, body) = send(&app, "GET", "/entries/missing/status", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        send(&app, "POST", "/companies/acme/queues/front-desk/entries", Some(customer("c-1"))).await;
        let (status, body) = send(
            &app,
            "POST",
            "/companies/acme/queues/front-desk/entries",
            Some(customer("c-1")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");

        let mut invalid = customer("c-2");
        invalid["party_size"] = serde_json::json!(40);
        let (status, body) = send(&app, "POST", "/companies/acme/queues/front-desk/entries", Some(invalid)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}
