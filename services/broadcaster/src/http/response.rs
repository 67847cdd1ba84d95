use axum::{
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use sw_protocol::HttpErrorEnvelope;

pub type HttpResponse = Response;

pub(crate) fn json_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> HttpResponse {
    (
        status,
        Json(HttpErrorEnvelope {
            code: code.into(),
            message: message.into(),
            details: None,
        }),
    )
        .into_response()
}

pub fn not_found(message: impl Into<String>) -> HttpResponse {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

/// Unknown `/api/...` paths answer with JSON instead of falling through to
/// the static asset fallback.
pub async fn api_not_found(uri: Uri) -> HttpResponse {
    not_found(format!("no API route for {}", uri.path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn assert_error_response(
        response: Response,
        expected_status: StatusCode,
        expected_code: &str,
        expected_message: &str,
    ) {
        assert_eq!(response.status(), expected_status);

        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body should be readable");
        let parsed: HttpErrorEnvelope =
            serde_json::from_slice(&body).expect("response body should be valid error json");

        assert_eq!(parsed.code, expected_code);
        assert_eq!(parsed.message, expected_message);
        assert_eq!(parsed.details, None);
    }

    #[tokio::test]
    async fn json_error_sets_status_code_message_and_no_details() {
        let response = json_error(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", "upstream failure");

        assert_error_response(
            response,
            StatusCode::BAD_GATEWAY,
            "UPSTREAM_ERROR",
            "upstream failure",
        )
        .await;
    }

    #[tokio::test]
    async fn api_not_found_names_the_path() {
        let response = api_not_found(Uri::from_static("/api/v1/nope")).await;

        assert_error_response(
            response,
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "no API route for /api/v1/nope",
        )
        .await;
    }
}
