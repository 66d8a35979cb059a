// HTTP request handlers
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::report_service::ReportRequest;
use crate::application::vat_config::ThresholdInput;
use crate::domain::reading::Metric;
use crate::infrastructure::chunked_stream::stream_from_broadcast;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct AlertsQuery {
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct VatConfigBody {
    pub sensor_id: Option<String>,
    #[serde(default)]
    pub thresholds: ThresholdInput,
}

/// `?vats=a,b&metrics=pH,temperatura&from=2025-03-01&to=2025-03-31`
#[derive(Deserialize, Default)]
pub struct ReportQuery {
    pub vats: Option<String>,
    pub metrics: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl ServiceError {
    fn status(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::SensorTaken { .. } => StatusCode::CONFLICT,
            ServiceError::InvalidTransition(_) | ServiceError::InvalidThreshold(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Backend(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

async fn respond<T: Serialize>(result: ServiceResult<T>, compress: bool) -> Response {
    match result {
        Ok(data) => match json_response(StatusCode::OK, &data, compress).await {
            Ok(response) => response,
            Err(status) => status.into_response(),
        },
        Err(e) => e.into_response(),
    }
}

fn split_list(raw: Option<&str>) -> Vec<&str> {
    raw.map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn parse_date(raw: Option<&str>) -> ServiceResult<Option<NaiveDate>> {
    raw.filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| ServiceError::InvalidRequest(format!("invalid date {}", s)))
        })
        .transpose()
}

fn parse_report_query(query: &ReportQuery) -> ServiceResult<ReportRequest> {
    let vat_ids = split_list(query.vats.as_deref())
        .into_iter()
        .map(String::from)
        .collect();

    let metrics = split_list(query.metrics.as_deref())
        .into_iter()
        .map(|name| {
            Metric::from_column(name)
                .ok_or_else(|| ServiceError::InvalidRequest(format!("unknown metric {}", name)))
        })
        .collect::<ServiceResult<Vec<_>>>()?;

    Ok(ReportRequest {
        vat_ids,
        metrics,
        from: parse_date(query.from.as_deref())?,
        to: parse_date(query.to.as_deref())?,
    })
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Alert history, newest first
pub async fn list_alerts(
    Query(query): Query<AlertsQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let compress = accepts_brotli(&headers);
    respond(state.alert_history.list(query.limit).await, compress).await
}

/// Live notices as length-prefixed JSON frames
pub async fn stream_notices(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let compress = accepts_brotli(&headers);
    tracing::debug!("Notice stream opened (brotli: {})", compress);
    stream_from_broadcast(state.notifications.subscribe(), compress)
}

pub async fn mark_alert_read(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let compress = accepts_brotli(&headers);
    respond(state.alert_sink.mark_read(&id).await, compress).await
}

pub async fn mark_alert_resolved(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let compress = accepts_brotli(&headers);
    respond(state.alert_sink.mark_resolved(&id).await, compress).await
}

/// Assign a sensor and thresholds to a vat
pub async fn configure_vat(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<VatConfigBody>,
) -> Response {
    let sensor_id = body.sensor_id.as_deref().filter(|s| !s.is_empty());
    match state
        .vat_config
        .configure(&id, sensor_id, &body.thresholds)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// Reload vats and thresholds from the backend
pub async fn refresh_thresholds(State(state): State<Arc<AppState>>) -> StatusCode {
    state.vat_config.refresh().await;
    StatusCode::NO_CONTENT
}

pub async fn reading_stats(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let compress = accepts_brotli(&headers);
    respond(Ok(state.ingest.stats()), compress).await
}

pub async fn generate_report(
    Query(query): Query<ReportQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let compress = accepts_brotli(&headers);
    let result = match parse_report_query(&query) {
        Ok(request) => state.report_service.generate(&request).await,
        Err(e) => Err(e),
    };
    respond(result, compress).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::alert_sink::{AlertSink, DedupPolicy};
    use crate::application::evaluator::Evaluator;
    use crate::application::ingest::ReadingIngest;
    use crate::application::memory_repository::InMemoryRepository;
    use crate::application::monitor_repository::MonitorRepository;
    use crate::application::notification::{AlertHistory, NotificationCenter};
    use crate::application::report_service::ReportService;
    use crate::application::threshold_store::ThresholdStore;
    use crate::application::vat_config::VatConfigService;
    use crate::application::vat_registry::VatRegistry;
    use crate::domain::alert::TransitionError;
    use crate::domain::alert::AlertState;
    use crate::domain::threshold::LevelBounds;

    fn state(repo: &InMemoryRepository) -> Arc<AppState> {
        let repository: Arc<dyn MonitorRepository> = Arc::new(repo.clone());
        let notifications = NotificationCenter::new(8);
        let vats = Arc::new(VatRegistry::new(repository.clone()));
        let thresholds = Arc::new(ThresholdStore::new(repository.clone()));
        let alert_sink = Arc::new(AlertSink::new(
            repository.clone(),
            notifications.clone(),
            DedupPolicy::None,
        ));
        let ingest = Arc::new(ReadingIngest::new(
            repository.clone(),
            vats.clone(),
            thresholds.clone(),
            Evaluator::new(thresholds.clone(), LevelBounds::default()),
            alert_sink.clone(),
            notifications.clone(),
            100,
        ));

        Arc::new(AppState {
            alert_history: AlertHistory::new(repository.clone(), notifications.clone(), 50),
            alert_sink,
            vat_config: VatConfigService::new(
                repository.clone(),
                vats.clone(),
                thresholds,
                notifications.clone(),
            ),
            report_service: ReportService::new(repository, vats, notifications.clone(), 1000),
            ingest,
            notifications,
        })
    }

    #[test]
    fn test_parse_report_query() {
        let query = ReportQuery {
            vats: Some("t-1, t-2,".to_string()),
            metrics: Some("pH,temperatura".to_string()),
            from: Some("2025-03-01".to_string()),
            to: Some("2025-03-31".to_string()),
        };

        let request = parse_report_query(&query).unwrap();
        assert_eq!(request.vat_ids, vec!["t-1", "t-2"]);
        assert_eq!(request.metrics, vec![Metric::Ph, Metric::Temperatura]);
        assert_eq!(request.from, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(request.to, NaiveDate::from_ymd_opt(2025, 3, 31));
    }

    #[test]
    fn test_parse_report_query_rejects_unknown_metric_and_bad_date() {
        let query = ReportQuery {
            metrics: Some("salinidad".to_string()),
            ..Default::default()
        };
        assert!(matches!(parse_report_query(&query), Err(ServiceError::InvalidRequest(_))));

        let query = ReportQuery {
            from: Some("01/03/2025".to_string()),
            ..Default::default()
        };
        assert!(matches!(parse_report_query(&query), Err(ServiceError::InvalidRequest(_))));
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(ServiceError::NotFound("alert a-1".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ServiceError::InvalidTransition(TransitionError {
                from: AlertState::Resuelta,
                to: AlertState::Leida,
            })
            .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::SensorTaken {
                sensor_id: "s-1".into(),
                vat_name: "Tina-A".into()
            }
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::Backend(anyhow::anyhow!("timeout")).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_mark_unknown_alert_is_not_found() {
        let repo = InMemoryRepository::new();
        let response = mark_alert_read(
            Path("missing".to_string()),
            HeaderMap::new(),
            State(state(&repo)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_configure_vat_returns_no_content() {
        let repo = InMemoryRepository::new();
        repo.add_vat("t-1", "Tina-A", None);

        let response = configure_vat(
            Path("t-1".to_string()),
            State(state(&repo)),
            Json(VatConfigBody {
                sensor_id: Some("s-1".to_string()),
                thresholds: ThresholdInput::default(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(repo.vat("t-1").and_then(|v| v.sensor_id), Some("s-1".into()));
    }

    #[tokio::test]
    async fn test_empty_report_selection_is_bad_request() {
        let repo = InMemoryRepository::new();
        let response = generate_report(
            Query(ReportQuery::default()),
            HeaderMap::new(),
            State(state(&repo)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
