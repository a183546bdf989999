// src/lambda/mod.rs

//! AWS Lambda adapter for the trigger facade.
//!
//! Accepts function-URL style events (`rawPath`, `queryStringParameters`)
//! and answers with `{statusCode, headers, body}`.

use std::collections::HashMap;

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::facade::{Facade, TriggerResponse};

/// Function-URL request fields the facade needs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlRequest {
    #[serde(default = "default_path")]
    pub raw_path: String,

    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
}

fn default_path() -> String {
    "/".to_string()
}

/// Function-URL response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl From<TriggerResponse> for UrlResponse {
    fn from(response: TriggerResponse) -> Self {
        Self {
            status_code: response.status,
            headers: HashMap::from([("content-type".to_string(), "application/json".to_string())]),
            body: response.body.to_string(),
        }
    }
}

/// Main Lambda handler function.
#[instrument(skip(facade, event))]
pub async fn handler(
    facade: &Facade,
    event: LambdaEvent<UrlRequest>,
) -> std::result::Result<UrlResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (request, _context) = event.into_parts();
    let query = request.query_string_parameters.unwrap_or_default();

    info!("Handling {} {:?}", request.raw_path, query);
    let response = facade.handle(&request.raw_path, &query).await;
    info!(
        "{} answered {} in {}ms",
        request.raw_path,
        response.status,
        start.elapsed().as_millis()
    );

    Ok(response.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_request_parses_function_url_event() {
        let json = r#"{
            "version": "2.0",
            "rawPath": "/scrape",
            "queryStringParameters": {"term": "2024F", "subject": "CSI"},
            "requestContext": {"http": {"method": "GET"}}
        }"#;
        let req: UrlRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.raw_path, "/scrape");
        assert_eq!(req.query_string_parameters.unwrap()["subject"], "CSI");
    }

    #[test]
    fn test_url_request_defaults() {
        let req: UrlRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.raw_path, "/");
        assert!(req.query_string_parameters.is_none());
    }

    #[test]
    fn test_response_shape() {
        let resp = UrlResponse::from(TriggerResponse {
            status: 404,
            body: json!({"error": "Not found: /x"}),
        });
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["statusCode"], 404);
        assert_eq!(value["headers"]["content-type"], "application/json");
        assert_eq!(value["body"], r#"{"error":"Not found: /x"}"#);
    }
}
