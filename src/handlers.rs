use crate::classifier::Classification;
use crate::report::{CapturedRequest, ReportItem};
use crate::server::CollectorState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_REQUEST_HEADERS,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use std::sync::Arc;

pub const CT_REPORT_TYPE: &str = "tls.cert.ct";
pub const DMARC_REPORT_TYPE: &str = "dmarc";

/// Storage or log failure; becomes a 500.
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        log::error!("Failed to record report: {:#}", self.0);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

/// Result of handling one element of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Continue,
    Skip,
    Abort(String),
}

impl CollectorState {
    /// Log the metric line, then capture the request.
    pub async fn record(
        &self,
        report_type: &str,
        request: &CapturedRequest,
    ) -> anyhow::Result<()> {
        self.metrics.log(report_type).await?;
        self.forensics.write(report_type, request).await?;
        Ok(())
    }

    pub async fn process_item(
        &self,
        value: &Value,
        request: &CapturedRequest,
    ) -> anyhow::Result<Step> {
        let Some(item) = ReportItem::from_value(value) else {
            return Ok(Step::Abort("report is not a JSON object".to_string()));
        };

        match self.classifier.classify(&item) {
            Classification::Skip => Ok(Step::Skip),
            Classification::Report(report_type) => {
                self.record(&report_type, request).await?;
                Ok(Step::Continue)
            }
        }
    }

    /// Run a whole batch; the returned status is what the client sees.
    pub async fn process_batch(&self, request: &CapturedRequest) -> anyhow::Result<StatusCode> {
        let reports: Value = match serde_json::from_slice(&request.body) {
            Ok(reports) => reports,
            Err(e) => {
                log::debug!("Rejecting batch from {}: invalid JSON: {}", request.url, e);
                return Ok(StatusCode::BAD_REQUEST);
            }
        };

        let Some(items) = reports.as_array() else {
            log::debug!("Rejecting batch from {}: not a JSON array", request.url);
            return Ok(StatusCode::BAD_REQUEST);
        };

        for (index, value) in items.iter().enumerate() {
            match self.process_item(value, request).await? {
                Step::Continue | Step::Skip => {}
                Step::Abort(reason) => {
                    // Items before this one stay recorded.
                    log::debug!("Rejecting batch at item {}: {}", index, reason);
                    return Ok(StatusCode::BAD_REQUEST);
                }
            }
        }

        Ok(StatusCode::OK)
    }
}

pub async fn handle_default(
    State(state): State<Arc<CollectorState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let request = CapturedRequest::new(&method, &uri, &headers, body);
    Ok(state.process_batch(&request).await?)
}

pub async fn handle_ct(
    State(state): State<Arc<CollectorState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let request = CapturedRequest::new(&method, &uri, &headers, body);
    state.record(CT_REPORT_TYPE, &request).await?;
    Ok(StatusCode::OK)
}

pub async fn handle_dmarc(
    State(state): State<Arc<CollectorState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let request = CapturedRequest::new(&method, &uri, &headers, body);
    state.record(DMARC_REPORT_TYPE, &request).await?;
    Ok(StatusCode::OK)
}

pub async fn handle_preflight(headers: HeaderMap) -> impl IntoResponse {
    let allowed_headers = headers
        .get(ACCESS_CONTROL_REQUEST_HEADERS)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("content-type"));

    (
        StatusCode::NO_CONTENT,
        [
            (ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
            (
                ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("OPTIONS, POST"),
            ),
            (ACCESS_CONTROL_ALLOW_HEADERS, allowed_headers),
        ],
    )
}
