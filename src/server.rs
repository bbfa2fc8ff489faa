//! HTTP transport for the two read endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::deep_dive::DeepDive;
use crate::engine::Analytics;
use crate::error::AnalyticsError;
use crate::prevention::PreventionStats;
use crate::store::RecordSource;
use crate::window::WindowQuery;

pub struct ApiError(AnalyticsError);

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            warn!(error = %self.0, "rejected analytics request");
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %self.0, "analytics request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "message": self.0.to_string() }))).into_response()
    }
}

pub fn router<S: RecordSource>(analytics: Arc<Analytics<S>>) -> Router {
    Router::new()
        .route("/prevention-stats", get(prevention_stats::<S>))
        .route("/prevention-deep-dive", get(prevention_deep_dive::<S>))
        .with_state(analytics)
        .layer(TraceLayer::new_for_http())
}

async fn prevention_stats<S: RecordSource>(
    State(analytics): State<Arc<Analytics<S>>>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<PreventionStats>, ApiError> {
    Ok(Json(analytics.prevention_stats(&query).await?))
}

async fn prevention_deep_dive<S: RecordSource>(
    State(analytics): State<Arc<Analytics<S>>>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<DeepDive>, ApiError> {
    Ok(Json(analytics.deep_dive(&query).await?))
}

pub async fn run<S: RecordSource>(analytics: Analytics<S>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(Arc::new(analytics));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::matcher::SubstringMatcher;
    use crate::models::fixtures::{at, report, task};
    use crate::models::YesNo;
    use crate::store::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let now = at(2025, 4, 1);
        let mut open = report("S3", &[]);
        open.date = Some(now - Duration::days(10));
        open.dispatched = Some(YesNo::No);
        open.solved = Some(YesNo::No);

        let store = MemoryStore::new(
            vec![task("S1", 5, Some("QoS Degradation")), task("S3", 2, None)],
            vec![report("S1", &["QoS Issue"]), open],
        );
        router(Arc::new(Analytics::new(
            store,
            Arc::new(SubstringMatcher),
            Arc::new(FixedClock(now)),
        )))
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn serves_prevention_stats() {
        let (status, body) = get_json("/prevention-stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalCriticalTasks"], 2);
        assert_eq!(body["reportedOverlapCount"], 2);
        assert_eq!(body["preventionRate"], "100.00");
        assert_eq!(body["qosMatrix"]["confirmed"], 1);
        assert_eq!(body["processEfficiency"]["oldestPending"][0]["age"], 10.0);
        assert_eq!(body["overlaps"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn serves_deep_dive_with_window() {
        let (status, body) =
            get_json("/prevention-deep-dive?startDate=2025-03-01&endDate=2025-03-31").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalTasks"], 2);
        assert_eq!(body["scoreDistribution"][1]["name"], "Score 2");
        assert_eq!(body["scoreDistribution"][1]["value"], 1);
    }

    #[tokio::test]
    async fn invalid_dates_are_bad_requests() {
        let (status, body) = get_json("/prevention-stats?startDate=soon&endDate=2025-03-31").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"]
            .as_str()
            .is_some_and(|message| message.contains("startDate")));
    }
}
