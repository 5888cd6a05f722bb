//! BigQuery REST client.
//!
//! Queries go through `jobs.query`; when the job is not finished within the
//! request timeout, or the result spans several pages, the client follows up
//! with `jobs.getQueryResults` until every row (up to `max_rows`) is read.
//!
//! Cells arrive as `{"f": [{"v": ...}]}` where scalar values are strings,
//! so decoding is driven by the schema's field types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::auth::TokenProvider;
use super::error::WarehouseError;
use super::models::{Column, QueryResult, Value};
use super::QueryRunner;

pub const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Server-side wait per request before returning an incomplete job
    pub request_timeout_ms: u64,
    /// Rows per page
    pub page_size: u32,
    /// Stop fetching after this many rows
    pub max_rows: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: 10_000,
            page_size: 10_000,
            max_rows: 100_000,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    timeout_ms: u64,
    max_results: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableFieldSchema {
    name: String,
    #[serde(rename = "type", default)]
    field_type: String,
    #[serde(default)]
    mode: Option<String>,
}

impl TableFieldSchema {
    fn is_repeated(&self) -> bool {
        self.mode.as_deref() == Some("REPEATED")
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<TableFieldSchema>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct JobErrorProto {
    #[serde(default)]
    message: String,
}

/// Shared shape of `jobs.query` and `jobs.getQueryResults` responses
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    job_reference: Option<JobReference>,
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    page_token: Option<String>,
    total_rows: Option<String>,
    #[serde(default)]
    errors: Vec<JobErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Accumulates pages into a `QueryResult`
#[derive(Debug, Default)]
struct ResultBuilder {
    schema: Option<Vec<TableFieldSchema>>,
    rows: Vec<Vec<Value>>,
    total_rows: Option<u64>,
}

impl ResultBuilder {
    /// Absorb one page. Returns an error if the job reported failures.
    fn push_page(&mut self, page: QueryResponse, max_rows: usize) -> Result<(), WarehouseError> {
        if !page.errors.is_empty() {
            let message = page
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(WarehouseError::Job(message));
        }
        if self.schema.is_none() {
            self.schema = page.schema.map(|s| s.fields);
        }
        if let Some(total) = page.total_rows.as_deref() {
            self.total_rows = total.parse().ok();
        }
        if let Some(fields) = &self.schema {
            for row in page.rows {
                if self.rows.len() >= max_rows {
                    break;
                }
                self.rows.push(decode_row(fields, row)?);
            }
        }
        Ok(())
    }

    fn finish(self) -> QueryResult {
        let fields = self.schema.unwrap_or_default();
        let columns = fields
            .into_iter()
            .map(|f| {
                let field_type = if f.is_repeated() {
                    format!("ARRAY<{}>", f.field_type)
                } else {
                    f.field_type
                };
                Column::new(f.name, field_type)
            })
            .collect();
        let mut result = QueryResult::new(columns, self.rows);
        if let Some(total) = self.total_rows {
            result.total_rows = total.max(result.rows.len() as u64);
        }
        result
    }
}

fn decode_row(fields: &[TableFieldSchema], row: TableRow) -> Result<Vec<Value>, WarehouseError> {
    if row.f.len() != fields.len() {
        return Err(WarehouseError::Decode(format!(
            "row has {} cells but schema has {} fields",
            row.f.len(),
            fields.len()
        )));
    }
    fields
        .iter()
        .zip(row.f)
        .map(|(field, cell)| decode_cell(field, cell.v))
        .collect()
}

/// Convert one REST cell into a `Value` using its schema type
fn decode_cell(field: &TableFieldSchema, raw: serde_json::Value) -> Result<Value, WarehouseError> {
    use serde_json::Value as Json;

    let text = match raw {
        Json::Null => return Ok(Value::Null),
        Json::String(s) if !field.is_repeated() => s,
        // RECORD and REPEATED cells stay as JSON text
        other => {
            return serde_json::to_string(&other)
                .map(Value::String)
                .map_err(|e| WarehouseError::Decode(e.to_string()));
        }
    };

    let bad = |kind: &str| {
        WarehouseError::Decode(format!("column {}: invalid {kind} value {text:?}", field.name))
    };

    let value = match field.field_type.as_str() {
        "INTEGER" | "INT64" => Value::Int(text.parse().map_err(|_| bad("integer"))?),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => {
            Value::Float(text.parse().map_err(|_| bad("float"))?)
        }
        "BOOLEAN" | "BOOL" => match text.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(bad("boolean")),
        },
        "TIMESTAMP" => Value::Timestamp(parse_epoch_seconds(&text).ok_or_else(|| bad("timestamp"))?),
        _ => Value::String(text),
    };
    Ok(value)
}

/// TIMESTAMP cells are epoch seconds, either decimal ("1.7E9") or integer microseconds
fn parse_epoch_seconds(text: &str) -> Option<DateTime<Utc>> {
    let seconds: f64 = text.parse().ok()?;
    let micros = (seconds * 1_000_000.0).round() as i64;
    DateTime::from_timestamp_micros(micros)
}

/// Runs SQL against one BigQuery project
pub struct BigQueryClient {
    http: Client,
    tokens: TokenProvider,
    project_id: String,
    config: ClientConfig,
}

impl BigQueryClient {
    pub fn new(
        http: Client,
        tokens: TokenProvider,
        project_id: Option<String>,
        config: ClientConfig,
    ) -> Self {
        let project_id = project_id.unwrap_or_else(|| tokens.project_id().to_string());
        BigQueryClient {
            http,
            tokens,
            project_id,
            config,
        }
    }

    /// Build a client with a fresh HTTP connection pool
    pub fn connect(
        key: crate::secrets::ServiceAccountKey,
        project_id: Option<String>,
        config: ClientConfig,
    ) -> Result<Self, WarehouseError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms + 30_000))
            .user_agent(concat!("bq-abtest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let tokens = TokenProvider::new(key, http.clone())?;
        Ok(Self::new(http, tokens, project_id, config))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn start_query(&self, sql: &str) -> Result<QueryResponse, WarehouseError> {
        let url = format!("{}/projects/{}/queries", self.config.base_url, self.project_id);
        let body = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            timeout_ms: self.config.request_timeout_ms,
            max_results: self.config.page_size,
        };
        let response = self
            .http
            .post(url)
            .bearer_auth(self.tokens.access_token()?)
            .json(&body)
            .send()?;
        parse_response(response)
    }

    fn fetch_page(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse, WarehouseError> {
        let url = format!(
            "{}/projects/{}/queries/{}",
            self.config.base_url, self.project_id, job.job_id
        );
        let mut params: Vec<(&str, String)> = vec![
            ("timeoutMs", self.config.request_timeout_ms.to_string()),
            ("maxResults", self.config.page_size.to_string()),
        ];
        if let Some(location) = &job.location {
            params.push(("location", location.clone()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        let response = self
            .http
            .get(url)
            .bearer_auth(self.tokens.access_token()?)
            .query(&params)
            .send()?;
        parse_response(response)
    }
}

/// Where `run_query` reads its pages from
trait PageSource {
    /// Submit the query and return the first response
    fn start(&self, sql: &str) -> Result<QueryResponse, WarehouseError>;

    /// Poll an unfinished job, or read the page at `page_token`
    fn next(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse, WarehouseError>;
}

impl PageSource for BigQueryClient {
    fn start(&self, sql: &str) -> Result<QueryResponse, WarehouseError> {
        self.start_query(sql)
    }

    fn next(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse, WarehouseError> {
        self.fetch_page(job, page_token)
    }
}

/// Wait for the job and read pages until the last one or `max_rows`
fn collect_pages(
    source: &impl PageSource,
    sql: &str,
    max_rows: usize,
) -> Result<QueryResult, WarehouseError> {
    let mut response = source.start(sql)?;
    let mut builder = ResultBuilder::default();

    loop {
        let job = response.job_reference.clone();
        let complete = response.job_complete;
        let page_token = response.page_token.clone();

        if complete || !response.errors.is_empty() {
            builder.push_page(response, max_rows)?;
        }

        let has_room = builder.rows.len() < max_rows;
        let next_token = match (complete, page_token) {
            (false, _) => None,
            (true, Some(token)) if has_room => Some(token),
            (true, _) => break,
        };

        let job = job.ok_or_else(|| {
            WarehouseError::Decode("response is missing jobReference".to_string())
        })?;
        debug!(job_id = %job.job_id, complete, rows = builder.rows.len(), "fetching results");
        response = source.next(&job, next_token.as_deref())?;
    }

    Ok(builder.finish())
}

impl QueryRunner for BigQueryClient {
    fn run_query(&self, sql: &str) -> Result<QueryResult, WarehouseError> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(WarehouseError::EmptyQuery);
        }

        info!(project = %self.project_id, "submitting query");
        let result = collect_pages(self, sql, self.config.max_rows)?;
        info!(
            rows = result.rows.len(),
            total_rows = result.total_rows,
            "query complete"
        );
        Ok(result)
    }
}

fn parse_response(response: Response) -> Result<QueryResponse, WarehouseError> {
    let status = response.status().as_u16();
    let body = response.text()?;
    decode_body(status, &body)
}

/// Decode a successful body or map the API error envelope
fn decode_body(status: u16, body: &str) -> Result<QueryResponse, WarehouseError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());
        return Err(WarehouseError::Api { status, message });
    }
    serde_json::from_str(body).map_err(|e| WarehouseError::Decode(e.to_string()))
}
