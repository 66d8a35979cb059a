// PostgREST repository implementation (hosted backend REST interface)
use crate::application::monitor_repository::{AlertRow, MonitorRepository};
use crate::domain::alert::{Alert, AlertState, NewAlert};
use crate::domain::reading::Reading;
use crate::domain::threshold::Threshold;
use crate::domain::vat::Vat;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const VAT_COLUMNS: &str = "id,nombre,capacidad,estado,tipo_agave,sensor_id";
const THRESHOLD_COLUMNS: &str =
    "tina_id,ph_min,ph_max,temperatura_min,temperatura_max,humedad_min,humedad_max";
const READING_COLUMNS: &str = "id,sensor_id,temperatura,pH,humedad,nivel_liquido,created_at,updated_at";
const ALERT_COLUMNS: &str =
    "id,tina_id,tipo_alerta,valor_actual,valor_umbral,mensaje,lectura_id,estado,created_at";

#[derive(Debug, Clone)]
pub struct PostgrestRepository {
    base_url: String,
    api_key: String,
    schema: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AlertWithVat {
    #[serde(flatten)]
    alert: Alert,
    #[serde(default)]
    tinas: Option<VatName>,
}

#[derive(Debug, Deserialize)]
struct VatName {
    nombre: String,
}

impl From<AlertWithVat> for AlertRow {
    fn from(row: AlertWithVat) -> Self {
        AlertRow {
            alert: row.alert,
            tina_nombre: row.tinas.map(|t| t.nombre),
        }
    }
}

impl PostgrestRepository {
    pub fn new(url: String, api_key: String, schema: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            api_key,
            schema,
            client,
        })
    }

    fn table_url(&self, table: &str, query: &[(&str, String)]) -> String {
        let params: Vec<String> = query
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect();

        if params.is_empty() {
            format!("{}/rest/v1/{}", self.base_url, table)
        } else {
            format!("{}/rest/v1/{}?{}", self.base_url, table, params.join("&"))
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept-Profile", &self.schema)
            .header("Content-Profile", &self.schema)
            .header("Accept", "application/json")
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to backend", what))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Backend {} failed with status {}: {}", what, status, body);
        }

        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>> {
        let url = self.table_url(table, query);
        tracing::debug!("GET {}", url);

        let response = self.send(self.request(Method::GET, &url), table).await?;
        response
            .json::<Vec<T>>()
            .await
            .with_context(|| format!("Failed to parse {} rows", table))
    }
}

/// `in.("a","b")` filter value
fn in_list(values: &[String]) -> String {
    let quoted: Vec<String> = values.iter().map(|v| format!("\"{}\"", v)).collect();
    format!("in.({})", quoted.join(","))
}

/// Row filter for a conditional state change: `id=eq.X&estado=in.(a,b)`
fn state_guard(alert_id: &str, from: &[AlertState]) -> Vec<(&'static str, String)> {
    let states: Vec<String> = from.iter().map(|s| s.to_string()).collect();
    vec![
        ("id", format!("eq.{}", alert_id)),
        ("estado", format!("in.({})", states.join(","))),
        ("select", "id".to_string()),
    ]
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl MonitorRepository for PostgrestRepository {
    async fn list_vats_with_sensor(&self) -> Result<Vec<Vat>> {
        self.fetch(
            "tinas",
            &[
                ("select", VAT_COLUMNS.to_string()),
                ("sensor_id", "not.is.null".to_string()),
            ],
        )
        .await
    }

    async fn get_vat(&self, vat_id: &str) -> Result<Option<Vat>> {
        let vats: Vec<Vat> = self
            .fetch(
                "tinas",
                &[
                    ("select", VAT_COLUMNS.to_string()),
                    ("id", format!("eq.{}", vat_id)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(vats.into_iter().next())
    }

    async fn assign_sensor(&self, vat_id: &str, sensor_id: Option<&str>) -> Result<()> {
        let url = self.table_url("tinas", &[("id", format!("eq.{}", vat_id))]);
        let request = self
            .request(Method::PATCH, &url)
            .header("Prefer", "return=minimal")
            .json(&json!({ "sensor_id": sensor_id }));

        self.send(request, "tinas update").await?;
        Ok(())
    }

    async fn list_thresholds(&self) -> Result<Vec<Threshold>> {
        self.fetch("umbrales_tina", &[("select", THRESHOLD_COLUMNS.to_string())])
            .await
    }

    async fn upsert_threshold(&self, threshold: &Threshold) -> Result<()> {
        // tina_id carries no unique constraint, so look the row up first
        let filter = ("tina_id", format!("eq.{}", threshold.tina_id));
        let existing: Vec<serde_json::Value> = self
            .fetch(
                "umbrales_tina",
                &[
                    ("select", "tina_id".to_string()),
                    filter.clone(),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        let request = if existing.is_empty() {
            self.request(Method::POST, &self.table_url("umbrales_tina", &[]))
        } else {
            self.request(Method::PATCH, &self.table_url("umbrales_tina", &[filter]))
        };

        self.send(
            request.header("Prefer", "return=minimal").json(threshold),
            "umbrales_tina write",
        )
        .await?;
        Ok(())
    }

    async fn list_readings(&self, sensor_ids: &[String], limit: usize) -> Result<Vec<Reading>> {
        if sensor_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.fetch(
            "lectura",
            &[
                ("select", READING_COLUMNS.to_string()),
                ("sensor_id", in_list(sensor_ids)),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn list_readings_changed_since(
        &self,
        sensor_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<Reading>> {
        if sensor_ids.is_empty() {
            return Ok(Vec::new());
        }

        let since = timestamp(since);
        let mut readings: Vec<Reading> = self
            .fetch(
                "lectura",
                &[
                    ("select", READING_COLUMNS.to_string()),
                    ("sensor_id", in_list(sensor_ids)),
                    (
                        "or",
                        format!("(created_at.gt.{},updated_at.gt.{})", since, since),
                    ),
                    ("order", "created_at.asc".to_string()),
                ],
            )
            .await?;

        readings.sort_by_key(|r| r.last_change());
        Ok(readings)
    }

    async fn insert_alert(&self, alert: &NewAlert) -> Result<Alert> {
        let url = self.table_url("alertas", &[("select", ALERT_COLUMNS.to_string())]);
        let request = self
            .request(Method::POST, &url)
            .header("Prefer", "return=representation")
            .json(alert);

        let response = self.send(request, "alertas insert").await?;
        let mut rows = response
            .json::<Vec<Alert>>()
            .await
            .context("Failed to parse inserted alert")?;

        rows.pop().context("Backend returned no row for inserted alert")
    }

    async fn get_alert(&self, alert_id: &str) -> Result<Option<Alert>> {
        let alerts: Vec<Alert> = self
            .fetch(
                "alertas",
                &[
                    ("select", ALERT_COLUMNS.to_string()),
                    ("id", format!("eq.{}", alert_id)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(alerts.into_iter().next())
    }

    async fn update_alert_state(
        &self,
        alert_id: &str,
        state: AlertState,
        from: &[AlertState],
    ) -> Result<bool> {
        if from.is_empty() {
            return Ok(false);
        }

        let url = self.table_url("alertas", &state_guard(alert_id, from));
        let request = self
            .request(Method::PATCH, &url)
            .header("Prefer", "return=representation")
            .json(&json!({ "estado": state }));

        let response = self.send(request, "alertas update").await?;
        let updated = response
            .json::<Vec<serde_json::Value>>()
            .await
            .context("Failed to parse alert update response")?;

        Ok(!updated.is_empty())
    }

    async fn list_alerts(&self, limit: usize) -> Result<Vec<AlertRow>> {
        let rows: Vec<AlertWithVat> = self
            .fetch(
                "alertas",
                &[
                    ("select", format!("{},tinas:tina_id(nombre)", ALERT_COLUMNS)),
                    ("order", "created_at.desc".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        Ok(rows.into_iter().map(AlertRow::from).collect())
    }
}
