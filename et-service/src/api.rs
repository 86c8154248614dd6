use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use time::Date;

use crate::{
    config::ResolvedProbe,
    error::EtError,
    reading::JoinedReading,
    service::{DaySeries, EtService, MultiDepthSeries},
    soil::SoilType,
    store::ReadingStore,
    timestamp::{format_date, parse_date},
};

pub struct AppState<S> {
    pub service: Arc<EtService<S>>,
    pub prometheus: Option<PrometheusHandle>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            prometheus: self.prometheus.clone(),
        }
    }
}

pub fn router<S: ReadingStore + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/api/sensors/et", get(weighted_et::<S>))
        .route("/api/sensors/et/uniform", get(uniform_et::<S>))
        .route("/api/sensors/:probe", get(probe_series::<S>))
        .route("/api/sensors/:probe/et", get(probe_et::<S>))
        .route("/api/sensors/:probe/features", get(probe_features::<S>))
        .route("/metrics", get(metrics_handler::<S>))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct SeriesQuery {
    /// `YYYY-MM-DD`; restricts the series to one day before deriving.
    pub date: Option<String>,
    pub soil: Option<String>,
    #[serde(default)]
    pub same_day: bool,
    /// Overrides the probe's configured depth weight for single-probe ET.
    pub weight: Option<f64>,
}

impl SeriesQuery {
    fn day(&self) -> Result<Option<Date>, ApiError> {
        self.date.as_deref().map(parse_date).transpose().map_err(ApiError)
    }
}

/// Maps engine errors onto HTTP statuses with an `{"error": ...}` body.
#[derive(Debug)]
pub struct ApiError(pub EtError);

impl From<EtError> for ApiError {
    fn from(e: EtError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            EtError::DataUnavailable(m) => {
                metrics::counter!("http_not_found_total").increment(1);
                (StatusCode::NOT_FOUND, m.clone())
            }
            EtError::InvalidTimestamp(m) | EtError::InvalidParameter(m) => {
                (StatusCode::BAD_REQUEST, m.clone())
            }
            EtError::Configuration(m) => {
                tracing::error!(error = %m, "configuration error while serving request");
                (StatusCode::INTERNAL_SERVER_ERROR, m.clone())
            }
            EtError::Upstream(e) => {
                tracing::error!(error = %e, "upstream failure while serving request");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn empty_result(what: &str, day: Option<Date>) -> ApiError {
    let message = match day {
        Some(day) => format!("No {what} found for {}", format_date(day)),
        None => format!("No {what} found."),
    };
    ApiError(EtError::DataUnavailable(message))
}

fn ensure_probe<'a, S: ReadingStore>(
    state: &'a AppState<S>,
    probe: &str,
) -> Result<&'a ResolvedProbe, ApiError> {
    state
        .service
        .catalog()
        .probe(probe)
        .map_err(|_| ApiError(EtError::DataUnavailable(format!("unknown probe '{probe}'"))))
}

fn format_dates(dates: &[Date]) -> Vec<String> {
    dates.iter().copied().map(format_date).collect()
}

/// Serialise `body` as JSON and tag it with a content hash.
fn etagged_json<T: Serialize>(body: &T) -> Result<Response, ApiError> {
    let bytes = serde_json::to_vec(body).map_err(|e| ApiError(EtError::Upstream(e.into())))?;
    let etag = format!("\"{}\"", blake3::hash(&bytes).to_hex());

    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        bytes,
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&etag) {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

#[derive(Serialize)]
struct SeriesBody<'a, T> {
    data: &'a [T],
    #[serde(skip_serializing_if = "Option::is_none")]
    depth_cm: Option<u32>,
    latest_date: Option<String>,
    available_dates: Vec<String>,
}

impl<'a, T> SeriesBody<'a, T> {
    fn new(series: &'a DaySeries<T>, probe: &ResolvedProbe) -> Self {
        Self {
            data: &series.points,
            depth_cm: probe.depth_cm,
            latest_date: series.latest_date.map(format_date),
            available_dates: format_dates(&series.available_dates),
        }
    }
}

#[derive(Serialize)]
struct EtResultsBody<'a, T> {
    #[serde(rename = "etResults")]
    et_results: &'a [T],
    #[serde(skip_serializing_if = "Option::is_none")]
    depth_cm: Option<u32>,
    depth_weight: f64,
    latest_date: Option<String>,
    available_dates: Vec<String>,
}

impl<'a, T> EtResultsBody<'a, T> {
    fn new(series: &'a DaySeries<T>, probe: &ResolvedProbe, depth_weight: f64) -> Self {
        Self {
            et_results: &series.points,
            depth_cm: probe.depth_cm,
            depth_weight,
            latest_date: series.latest_date.map(format_date),
            available_dates: format_dates(&series.available_dates),
        }
    }
}

/// A joined row with its ET: `{"timestamp", "p1", .., "pN", "et"}`.
struct JoinedEtRow<'a> {
    joined: &'a JoinedReading,
    et: f64,
}

impl Serialize for JoinedEtRow<'_> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let mut map = serializer.serialize_map(Some(self.joined.values.len() + 2))?;
        map.serialize_entry("timestamp", &self.joined.timestamp)?;
        for (i, v) in self.joined.values.iter().enumerate() {
            map.serialize_entry(&JoinedReading::probe_key(i), v)?;
        }
        map.serialize_entry("et", &self.et)?;
        map.end()
    }
}

#[derive(Serialize)]
struct MultiDepthBody<'a> {
    data: Vec<JoinedEtRow<'a>>,
    soil: Option<&'static str>,
    latest_date: Option<String>,
    available_dates: Vec<String>,
}

fn multi_depth_response(
    series: &MultiDepthSeries,
    soil: Option<SoilType>,
    day: Option<Date>,
) -> Result<Response, ApiError> {
    if series.et.is_empty() {
        return Err(empty_result("ET data", day));
    }
    let data = series
        .joined
        .iter()
        .zip(&series.et)
        .map(|(joined, point)| JoinedEtRow {
            joined,
            et: point.et,
        })
        .collect();

    etagged_json(&MultiDepthBody {
        data,
        soil: soil.map(SoilType::name),
        latest_date: series.latest_date.map(format_date),
        available_dates: format_dates(&series.available_dates),
    })
}

async fn weighted_et<S: ReadingStore + 'static>(
    State(state): State<AppState<S>>,
    Query(query): Query<SeriesQuery>,
) -> Result<Response, ApiError> {
    metrics::counter!("http_requests_total", "route" => "weighted_et").increment(1);
    let day = query.day()?;
    let soil = match &query.soil {
        Some(name) => name.parse::<SoilType>()?,
        None => state.service.catalog().default_soil,
    };

    let series = state.service.multi_depth_et(soil, day).await?;
    multi_depth_response(&series, Some(soil), day)
}

async fn uniform_et<S: ReadingStore + 'static>(
    State(state): State<AppState<S>>,
    Query(query): Query<SeriesQuery>,
) -> Result<Response, ApiError> {
    metrics::counter!("http_requests_total", "route" => "uniform_et").increment(1);
    let day = query.day()?;

    let series = state.service.uniform_multi_depth_et(day).await?;
    multi_depth_response(&series, None, day)
}

async fn probe_series<S: ReadingStore + 'static>(
    State(state): State<AppState<S>>,
    Path(probe): Path<String>,
    Query(query): Query<SeriesQuery>,
) -> Result<Response, ApiError> {
    metrics::counter!("http_requests_total", "route" => "probe_series").increment(1);
    let resolved = ensure_probe(&state, &probe)?;
    let day = query.day()?;

    let series = state.service.probe_series(&probe, day).await?;
    if series.points.is_empty() {
        return Err(empty_result("sensor data", day));
    }
    etagged_json(&SeriesBody::new(&series, resolved))
}

async fn probe_et<S: ReadingStore + 'static>(
    State(state): State<AppState<S>>,
    Path(probe): Path<String>,
    Query(query): Query<SeriesQuery>,
) -> Result<Response, ApiError> {
    metrics::counter!("http_requests_total", "route" => "probe_et").increment(1);
    let resolved = ensure_probe(&state, &probe)?;
    let day = query.day()?;
    let weight = state.service.depth_weight(&probe, query.weight)?;

    if query.same_day {
        let series = state.service.probe_daily_et(&probe, day, Some(weight)).await?;
        if series.points.is_empty() {
            return Err(empty_result("ET data", day));
        }
        return etagged_json(&EtResultsBody::new(&series, resolved, weight));
    }

    let series = state.service.probe_et(&probe, day, Some(weight)).await?;
    if series.points.is_empty() {
        return Err(empty_result("ET data", day));
    }
    etagged_json(&EtResultsBody::new(&series, resolved, weight))
}

async fn probe_features<S: ReadingStore + 'static>(
    State(state): State<AppState<S>>,
    Path(probe): Path<String>,
    Query(query): Query<SeriesQuery>,
) -> Result<Response, ApiError> {
    metrics::counter!("http_requests_total", "route" => "probe_features").increment(1);
    let resolved = ensure_probe(&state, &probe)?;
    let day = query.day()?;

    let series = state.service.lai_features(&probe, day).await?;
    if series.points.is_empty() {
        return Err(empty_result("feature data", day));
    }
    etagged_json(&SeriesBody::new(&series, resolved))
}

async fn metrics_handler<S: ReadingStore + 'static>(
    State(state): State<AppState<S>>,
) -> Result<String, StatusCode> {
    state
        .prometheus
        .as_ref()
        .map(PrometheusHandle::render)
        .ok_or(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::{catalog, sample_store, MemoryStore};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app_with(store: MemoryStore) -> Router {
        router(AppState {
            service: Arc::new(EtService::new(store, catalog())),
            prometheus: None,
        })
    }

    fn app() -> Router {
        app_with(sample_store())
    }

    async fn fetch_json(app: Router, uri: &str) -> (StatusCode, Option<String>, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let etag = response
            .headers()
            .get(header::ETAG)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, etag, body)
    }

    #[tokio::test]
    async fn weighted_et_applies_soil_factor_and_keeps_null_keys() {
        let (status, etag, body) = fetch_json(app(), "/api/sensors/et?soil=Podzols").await;
        assert_eq!(status, StatusCode::OK);
        assert!(etag.is_some());
        assert_eq!(body["soil"], "Podzols");
        assert_eq!(body["latest_date"], "2025-06-02");

        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data[0]["et"], 0.0);
        assert_eq!(data[1]["et"], 11.0);
        assert_eq!(data[2]["et"], 0.0);
        assert!(data[2].as_object().unwrap().contains_key("p3"));
        assert!(data[2]["p3"].is_null());
        assert_eq!(data[1]["timestamp"], "2025-06-02 00:15:00");
    }

    #[tokio::test]
    async fn repeated_requests_are_byte_identical() {
        let (_, first, _) = fetch_json(app(), "/api/sensors/et").await;
        let (_, second, _) = fetch_json(app(), "/api/sensors/et").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unknown_soil_is_a_server_error() {
        let (status, _, body) = fetch_json(app(), "/api/sensors/et?soil=Loess").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("Loess"));
    }

    #[tokio::test]
    async fn uniform_et_has_no_soil() {
        let (status, _, body) = fetch_json(app(), "/api/sensors/et/uniform").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["soil"].is_null());
        assert_eq!(body["data"][1]["et"], 9.0);
    }

    #[tokio::test]
    async fn probe_et_for_a_day_and_for_a_missing_day() {
        let (status, _, body) = fetch_json(app(), "/api/sensors/port1/et?date=2025-06-02").await;
        assert_eq!(status, StatusCode::OK);
        let ets: Vec<f64> = body["etResults"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["et"].as_f64().unwrap())
            .collect();
        assert_eq!(ets, vec![0.0, 1.0]);

        let (status, _, body) = fetch_json(app(), "/api/sensors/port1/et?date=2025-05-01").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No ET data found for 2025-05-01");
    }

    #[tokio::test]
    async fn weight_override_and_probe_metadata() {
        let (status, _, body) = fetch_json(app(), "/api/sensors/port1/et?weight=200").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["depth_weight"], 200.0);
        assert_eq!(body["depth_cm"], 15);
        assert_eq!(body["etResults"][1]["et"], 4.0);
        assert_eq!(
            body["available_dates"],
            serde_json::json!(["2025-06-01", "2025-06-02"])
        );

        let (_, _, body) = fetch_json(app(), "/api/sensors/port2/et").await;
        assert_eq!(body["depth_weight"], 150.0);
        assert!(body.get("depth_cm").is_none());

        let (status, _, _) = fetch_json(app(), "/api/sensors/port1/et?weight=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_deeper_probe_still_answers() {
        let mut store = sample_store();
        store.tables.insert("port3".to_string(), Vec::new());
        let (status, _, body) = fetch_json(app_with(store), "/api/sensors/et").await;
        assert_eq!(status, StatusCode::OK);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 3);
        assert!(data.iter().all(|row| row["p3"].is_null() && row["et"] == 0.0));
    }

    #[tokio::test]
    async fn same_day_et_splits_date_and_time() {
        let (status, _, body) = fetch_json(app(), "/api/sensors/port1/et?same_day=true").await;
        assert_eq!(status, StatusCode::OK);
        let results = body["etResults"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["date"], "2025-06-02");
        assert_eq!(results[0]["time"], "00:30:00");
    }

    #[tokio::test]
    async fn raw_series_and_bad_date() {
        let (status, _, body) = fetch_json(app(), "/api/sensors/port2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["water_content"], 0.2);
        assert_eq!(body["data"][0]["soil_temp"], 16.0);

        let (status, _, _) = fetch_json(app(), "/api/sensors/port2?date=June").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_probe_and_empty_table_are_not_found() {
        let (status, _, _) = fetch_json(app(), "/api/sensors/port9/et").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let mut store = sample_store();
        store.tables.clear();
        let (status, _, _) = fetch_json(app_with(store), "/api/sensors/port1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn store_failure_is_internal_error() {
        let store = MemoryStore {
            fail: true,
            ..sample_store()
        };
        let (status, _, body) = fetch_json(app_with(store), "/api/sensors/et").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal Server Error");
    }

    #[tokio::test]
    async fn features_endpoint_and_disabled_metrics() {
        let (status, _, body) = fetch_json(app(), "/api/sensors/port3/features").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"][0]["moisture_delta"].is_null());
        assert_eq!(body["data"][1]["bulk_ec"], 0.7);

        let (status, _, _) = fetch_json(app(), "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
