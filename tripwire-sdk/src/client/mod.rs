//! Typed HTTP client for the Tripwire REST surface.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared wire objects do not pull in `reqwest`.

use reqwest::{Client, StatusCode};
use serde_json::Value;
use url::Url;

use crate::objects::{AdminSettings, AdminStats, ApiResponse, Pagination};

/// Errors produced by the SDK HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned an envelope with an error status.
    #[error("api error: status {status}, message: {message}")]
    Api { status: u16, message: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The server answered with a non-envelope body.
    #[error("unexpected response: status {status}, body: {body}")]
    Unexpected { status: StatusCode, body: String },
}

/// HTTP client for a Tripwire deployment.
#[derive(Debug, Clone)]
pub struct TripwireClient {
    http: Client,
    base_url: Url,
}

impl TripwireClient {
    /// Create a new client.
    ///
    /// * `base_url` – root URL of the Tripwire server
    ///   (e.g. `http://workflow.internal:14400`).
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    // -- event types ----------------------------------------------------

    /// `POST /v1/eventtypes`
    pub async fn post_event_type(&self, event_type: &Value) -> Result<ApiResponse<Value>, ClientError> {
        self.post("/v1/eventtypes", event_type).await
    }

    /// `GET /v1/eventtypes/{id}`
    pub async fn get_event_type(&self, id: &str) -> Result<ApiResponse<Value>, ClientError> {
        self.get(&format!("/v1/eventtypes/{id}"), &[]).await
    }

    /// `GET /v1/eventtypes`
    pub async fn list_event_types(
        &self,
        page: Option<&Pagination>,
    ) -> Result<ApiResponse<Value>, ClientError> {
        self.get("/v1/eventtypes", &page_params(page)).await
    }

    /// `DELETE /v1/eventtypes/{id}`
    pub async fn delete_event_type(&self, id: &str) -> Result<ApiResponse<Value>, ClientError> {
        self.delete(&format!("/v1/eventtypes/{id}")).await
    }

    // -- events ---------------------------------------------------------

    /// `POST /v1/events`: dispatches, or registers a repeating event when
    /// the body carries a `cronSchedule`.
    pub async fn post_event(&self, event: &Value) -> Result<ApiResponse<Value>, ClientError> {
        self.post("/v1/events", event).await
    }

    /// `GET /v1/events/{id}`
    pub async fn get_event(&self, id: &str) -> Result<ApiResponse<Value>, ClientError> {
        self.get(&format!("/v1/events/{id}"), &[]).await
    }

    /// `GET /v1/events` with optional `eventTypeId` / `eventTypeName` filters.
    pub async fn list_events(
        &self,
        event_type_id: Option<&str>,
        event_type_name: Option<&str>,
        page: Option<&Pagination>,
    ) -> Result<ApiResponse<Value>, ClientError> {
        let mut params = page_params(page);
        if let Some(id) = event_type_id {
            params.push(("eventTypeId".into(), id.into()));
        }
        if let Some(name) = event_type_name {
            params.push(("eventTypeName".into(), name.into()));
        }
        self.get("/v1/events", &params).await
    }

    /// `DELETE /v1/events/{id}`
    pub async fn delete_event(&self, id: &str) -> Result<ApiResponse<Value>, ClientError> {
        self.delete(&format!("/v1/events/{id}")).await
    }

    // -- triggers -------------------------------------------------------

    /// `POST /v1/triggers`
    pub async fn post_trigger(&self, trigger: &Value) -> Result<ApiResponse<Value>, ClientError> {
        self.post("/v1/triggers", trigger).await
    }

    /// `GET /v1/triggers/{id}`
    pub async fn get_trigger(&self, id: &str) -> Result<ApiResponse<Value>, ClientError> {
        self.get(&format!("/v1/triggers/{id}"), &[]).await
    }

    /// `GET /v1/triggers`
    pub async fn list_triggers(
        &self,
        page: Option<&Pagination>,
    ) -> Result<ApiResponse<Value>, ClientError> {
        self.get("/v1/triggers", &page_params(page)).await
    }

    /// `DELETE /v1/triggers/{id}`
    pub async fn delete_trigger(&self, id: &str) -> Result<ApiResponse<Value>, ClientError> {
        self.delete(&format!("/v1/triggers/{id}")).await
    }

    // -- alerts ---------------------------------------------------------

    /// `GET /v1/alerts/{id}`
    pub async fn get_alert(&self, id: &str) -> Result<ApiResponse<Value>, ClientError> {
        self.get(&format!("/v1/alerts/{id}"), &[]).await
    }

    /// `GET /v1/alerts` with an optional `triggerId` filter.
    pub async fn list_alerts(
        &self,
        trigger_id: Option<&str>,
        page: Option<&Pagination>,
    ) -> Result<ApiResponse<Value>, ClientError> {
        let mut params = page_params(page);
        if let Some(id) = trigger_id {
            params.push(("triggerId".into(), id.into()));
        }
        self.get("/v1/alerts", &params).await
    }

    /// `DELETE /v1/alerts/{id}`
    pub async fn delete_alert(&self, id: &str) -> Result<ApiResponse<Value>, ClientError> {
        self.delete(&format!("/v1/alerts/{id}")).await
    }

    // -- admin ----------------------------------------------------------

    /// `GET /v1/admin/stats`
    pub async fn admin_stats(&self) -> Result<AdminStats, ClientError> {
        let envelope: ApiResponse<AdminStats> = self.request_get("/v1/admin/stats", &[]).await?;
        unwrap_data(envelope)
    }

    /// `GET /v1/admin/settings`
    pub async fn admin_settings(&self) -> Result<AdminSettings, ClientError> {
        let envelope: ApiResponse<AdminSettings> =
            self.request_get("/v1/admin/settings", &[]).await?;
        unwrap_data(envelope)
    }

    /// `POST /v1/admin/settings`
    pub async fn update_admin_settings(
        &self,
        settings: &AdminSettings,
    ) -> Result<AdminSettings, ClientError> {
        let url = self.base_url.join("/v1/admin/settings")?;
        let resp = self.http.post(url).json(settings).send().await?;
        let envelope: ApiResponse<AdminSettings> = parse_envelope(resp).await?;
        unwrap_data(envelope)
    }

    // -- plumbing -------------------------------------------------------

    async fn get(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<ApiResponse<Value>, ClientError> {
        self.request_get(path, params).await
    }

    async fn request_get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<ApiResponse<T>, ClientError> {
        let url = self.base_url.join(path)?;
        let resp = self.http.get(url).query(params).send().await?;
        parse_envelope(resp).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse<Value>, ClientError> {
        let url = self.base_url.join(path)?;
        let resp = self.http.post(url).json(body).send().await?;
        parse_envelope(resp).await
    }

    async fn delete(&self, path: &str) -> Result<ApiResponse<Value>, ClientError> {
        let url = self.base_url.join(path)?;
        let resp = self.http.delete(url).send().await?;
        parse_envelope(resp).await
    }
}

async fn parse_envelope<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<ApiResponse<T>, ClientError> {
    let status = resp.status();
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|_| ClientError::Unexpected { status, body })
}

fn unwrap_data<T>(envelope: ApiResponse<T>) -> Result<T, ClientError> {
    if envelope.is_error() {
        return Err(ClientError::Api {
            status: envelope.status_code,
            message: envelope.message.unwrap_or_default(),
        });
    }
    envelope.data.ok_or(ClientError::Api {
        status: envelope.status_code,
        message: "envelope carried no data".into(),
    })
}

fn page_params(page: Option<&Pagination>) -> Vec<(String, String)> {
    let Some(page) = page else {
        return Vec::new();
    };
    let order = match page.order {
        crate::objects::SortOrder::Asc => "asc",
        crate::objects::SortOrder::Desc => "desc",
    };
    vec![
        ("perPage".into(), page.per_page.to_string()),
        ("page".into(), page.page.to_string()),
        ("sortBy".into(), page.sort_by.clone()),
        ("order".into(), order.into()),
    ]
}
