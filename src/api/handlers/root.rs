use axum::{Json, response::IntoResponse};
use serde_json::json;

// axum handler for the undocumented root route
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn root_returns_name_and_version() {
        let response = root().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
