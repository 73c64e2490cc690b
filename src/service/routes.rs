//! HTTP handlers for the inference service.

use std::error::Error;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::AppContext;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub predicted_price: f64,
}

/// Client-visible failure: always `400` with a `detail` message.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!("Prediction error: {detail}");
        Self { detail }
    }

    /// Log the typed failure and its causes; the client only sees `detail`.
    fn from_error<E: Error>(err: &E, detail: String) -> Self {
        tracing::error!(
            error = ?err,
            causes = %source_chain(err),
            "Prediction error: {detail}"
        );
        Self { detail }
    }
}

fn source_chain(err: &dyn Error) -> String {
    let mut chain = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain.join(": ")
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

/// `POST /predict`: score one flat JSON record.
pub async fn predict(
    State(ctx): State<AppContext>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(body) =
        payload.map_err(|rejection| ApiError::from_error(&rejection, rejection.body_text()))?;
    let Value::Object(record) = body else {
        return Err(ApiError::bad_request("Request body must be a JSON object"));
    };
    let predicted_price = ctx
        .artifact()
        .predict_record(&record)
        .map_err(|err| ApiError::from_error(&err, err.to_string()))?;
    tracing::debug!(predicted_price, "Prediction served");
    Ok(Json(PredictResponse { predicted_price }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("scoring failed")]
    struct Outer(#[source] Middle);

    #[derive(Debug, Error)]
    #[error("bad record")]
    struct Middle(#[source] std::io::Error);

    #[test]
    fn source_chain_walks_every_cause() {
        let err = Outer(Middle(std::io::Error::other("disk gone")));
        assert_eq!(source_chain(&err), "bad record: disk gone");
        assert_eq!(source_chain(&std::io::Error::other("leaf")), "");
    }

    #[test]
    fn typed_errors_keep_their_message_as_detail() {
        let err = Outer(Middle(std::io::Error::other("disk gone")));
        let api = ApiError::from_error(&err, err.to_string());
        assert_eq!(api.detail, "scoring failed");
    }
}
