//! ItineraryClient - REST access to stored plans

use std::time::Duration;

use reqwest::{Client, Request, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::ApiError;
use super::types::{ListQuery, Page, PlanSummary};

/// Retries for transient failures on GETs
const MAX_RETRIES: u32 = 2;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 500;

/// Client for the itinerary backend
pub struct ItineraryClient {
    base_url: Url,
    token: Option<String>,
    http: Client,
}

impl ItineraryClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        debug!(%base_url, ?timeout, "ItineraryClient::new: called");
        let base_url = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            token: token.filter(|t| !t.is_empty()),
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/{segments...}`, each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http.get(url).header("accept", "application/json");
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }

    /// Build the `GET /plans` request
    pub fn list_request(&self, query: &ListQuery) -> Result<Request, ApiError> {
        debug!(?query, "list_request: called");
        let url = self.endpoint(&["plans"])?;
        Ok(self.get(url).query(&query.pairs()).build()?)
    }

    /// Build the `GET /plans/{id}` request
    pub fn get_request(&self, id: &str) -> Result<Request, ApiError> {
        debug!(%id, "get_request: called");
        if id.trim().is_empty() {
            return Err(ApiError::InvalidUrl("empty plan id".to_string()));
        }
        let url = self.endpoint(&["plans", id])?;
        Ok(self.get(url).build()?)
    }

    /// List stored plans
    pub async fn list_plans(&self, query: &ListQuery) -> Result<Page<PlanSummary>, ApiError> {
        debug!(?query, "list_plans: called");
        let request = self.list_request(query)?;
        self.execute_json(request).await
    }

    /// Fetch one stored plan as raw JSON
    pub async fn get_plan(&self, id: &str) -> Result<Value, ApiError> {
        debug!(%id, "get_plan: called");
        let request = self.get_request(id)?;
        self.execute_json(request).await
    }

    async fn execute_json<T: DeserializeOwned>(&self, request: Request) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Send with retry on transient failures
    async fn execute(&self, request: Request) -> Result<Response, ApiError> {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
            // GET requests have no body, so cloning always succeeds
            let Some(this_try) = request.try_clone() else {
                return self.send_once(request).await;
            };

            match self.send_once(this_try).await {
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    warn!(attempt, error = %e, url = %request.url(), "execute: retrying after transient error");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn send_once(&self, request: Request) -> Result<Response, ApiError> {
        let response = self.http.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        debug!(%status, "send_once: API error");
        let message = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message(&message),
        })
    }
}

/// Pull `message`/`error` out of a JSON error body, else use the body as-is
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SortOrder;

    fn client(token: Option<&str>) -> ItineraryClient {
        ItineraryClient::new(
            "https://api.example.com/api/",
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_list_request_defaults() {
        let request = client(None).list_request(&ListQuery::default()).unwrap();
        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.url().as_str(), "https://api.example.com/api/plans?page=1&limit=10");
        assert!(request.headers().get("authorization").is_none());
    }

    #[test]
    fn test_list_request_full_query() {
        let query = ListQuery {
            page: 3,
            limit: 25,
            search: Some("pokhara lake".to_string()),
            sort: Some("createdAt".to_string()),
            order: Some(SortOrder::Asc),
        };
        let request = client(None).list_request(&query).unwrap();
        assert_eq!(
            request.url().query(),
            Some("page=3&limit=25&search=pokhara+lake&sort=createdAt&order=asc")
        );
    }

    #[test]
    fn test_bearer_header() {
        let request = client(Some("secret")).get_request("p1").unwrap();
        assert_eq!(request.headers().get("authorization").unwrap(), "Bearer secret");
        assert_eq!(request.url().as_str(), "https://api.example.com/api/plans/p1");
    }

    #[test]
    fn test_empty_token_ignored() {
        let request = client(Some("")).get_request("p1").unwrap();
        assert!(request.headers().get("authorization").is_none());
    }

    #[test]
    fn test_get_request_encodes_id() {
        let request = client(None).get_request("a/b c").unwrap();
        assert_eq!(request.url().path(), "/api/plans/a%2Fb%20c");
        assert!(client(None).get_request("  ").is_err());
    }

    #[test]
    fn test_invalid_base_url() {
        let err = ItineraryClient::new("not a url", None, Duration::from_secs(1)).err().unwrap();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
        let err = ItineraryClient::new("mailto:me@example.com", None, Duration::from_secs(1)).err().unwrap();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message(r#"{"message":"Plan not found"}"#), "Plan not found");
        assert_eq!(error_message(r#"{"error":"Unauthorized"}"#), "Unauthorized");
        assert_eq!(error_message(" gateway timeout \n"), "gateway timeout");
    }
}
