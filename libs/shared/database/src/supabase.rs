use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::error::DbError;

/// `Prefer` header asking PostgREST to echo written rows back.
pub const RETURN_REPRESENTATION: &str = "return=representation";

const UNIQUE_VIOLATION_SQLSTATE: &str = "23505";

/// Thin PostgREST client. Stores talk to it with the service key; row level
/// authorization is done by the cells before any request goes out.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, prefer: Option<&str>) -> Result<HeaderMap, DbError> {
        let mut headers = HeaderMap::new();

        let key = HeaderValue::from_str(&self.anon_key)
            .map_err(|_| DbError::Unavailable("store key is not a valid header value".to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.anon_key))
            .map_err(|_| DbError::Unavailable("store key is not a valid header value".to_string()))?;

        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(prefer) = prefer {
            let value = HeaderValue::from_str(prefer)
                .map_err(|_| DbError::Unavailable(format!("invalid Prefer header: {}", prefer)))?;
            headers.insert("Prefer", value);
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        self.request_with_prefer(method, path, body, None).await
    }

    pub async fn request_with_prefer<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        prefer: Option<&str>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, &url).headers(self.get_headers(prefer)?);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req
            .send()
            .await
            .map_err(|e| DbError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Store error ({}): {}", status, error_text);
            return Err(classify_failure(status.as_u16(), error_text));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DbError::Decode(e.to_string()))
    }

    /// Fetches rows and decodes them into `T`.
    pub async fn select<T>(&self, path: &str) -> Result<Vec<T>, DbError>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<Value> = self.request(Method::GET, path, None).await?;
        decode_rows(rows)
    }

    /// Writes with `return=representation` and decodes the first echoed row.
    pub async fn write_one<T>(&self, method: Method, path: &str, body: Value) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<Value> = self
            .request_with_prefer(method, path, Some(body), Some(RETURN_REPRESENTATION))
            .await?;

        let first = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound(format!("no row returned for {}", path)))?;

        serde_json::from_value(first).map_err(|e| DbError::Decode(e.to_string()))
    }
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, DbError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| DbError::Decode(e.to_string()))
}

fn classify_failure(status: u16, body: String) -> DbError {
    let sqlstate = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("code").and_then(|c| c.as_str()).map(str::to_string));

    if status == 409 || sqlstate.as_deref() == Some(UNIQUE_VIOLATION_SQLSTATE) {
        return DbError::UniqueViolation(body);
    }

    match status {
        404 => DbError::NotFound(body),
        500..=599 => DbError::Unavailable(format!("{}: {}", status, body)),
        _ => DbError::Rejected { status, message: body },
    }
}
