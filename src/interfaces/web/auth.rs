use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AppState;

fn is_loopback(host: &str) -> bool {
    matches!(host, "127.0.0.1" | "::1" | "localhost")
}

/// Compare without short-circuiting on the first differing byte.
fn tokens_match(provided: &str, expected: &str) -> bool {
    provided.len() == expected.len()
        && provided
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "success": false, "error": message })),
    )
        .into_response()
}

pub async fn require_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    // No admin token configured: open access only on loopback (safe for local dev)
    let Some(expected) = state.admin_token.as_deref() else {
        if is_loopback(&state.api_host) {
            return next.run(req).await;
        }
        return unauthorized(
            "No admin token configured. Set server.admin_token or BIOSYNTH_ADMIN_TOKEN before exposing on a non-loopback address.",
        );
    };

    let provided = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "));

    match provided {
        None => unauthorized("Missing or invalid Authorization header. Use: Bearer <token>"),
        Some(token) if tokens_match(token.trim(), expected) => next.run(req).await,
        Some(_) => unauthorized("Invalid admin token"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::web::router::tests::test_state;
    use axum::{Router, middleware, routing::get};
    use serde_json::json;
    use tower::util::ServiceExt;

    fn protected_app(state: AppState) -> Router {
        Router::new()
            .route(
                "/api/automation/ping",
                get(|| async { axum::Json(json!({ "ok": true })).into_response() }),
            )
            .layer(middleware::from_fn_with_state(
                state.clone(),
                super::require_auth,
            ))
            .with_state(state)
    }

    async fn request_ping_status(app: Router, headers: Vec<(&str, String)>) -> StatusCode {
        let mut req_builder = Request::builder().uri("/api/automation/ping");
        for (k, v) in headers {
            req_builder = req_builder.header(k, v);
        }
        let req = req_builder
            .body(Body::empty())
            .expect("request should build");
        app.oneshot(req)
            .await
            .expect("oneshot should succeed")
            .status()
    }

    #[tokio::test]
    async fn no_token_on_loopback_allows_request() {
        let (state, _) = test_state("127.0.0.1", None, vec![]);
        let status = request_ping_status(protected_app(state), vec![]).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn no_token_on_non_loopback_rejects_request() {
        let (state, _) = test_state("0.0.0.0", None, vec![]);
        let status = request_ping_status(protected_app(state), vec![]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn token_present_requires_authorization_header() {
        let (state, _) = test_state("127.0.0.1", Some("s3cret"), vec![]);
        let status = request_ping_status(protected_app(state), vec![]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_bearer_token_is_rejected() {
        let (state, _) = test_state("0.0.0.0", Some("s3cret"), vec![]);
        let status = request_ping_status(
            protected_app(state),
            vec![("authorization", "Bearer s3cre".to_string())],
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_bearer_token_is_accepted() {
        let (state, _) = test_state("0.0.0.0", Some("s3cret"), vec![]);
        let status = request_ping_status(
            protected_app(state),
            vec![("authorization", "Bearer s3cret".to_string())],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn token_comparison_requires_exact_match() {
        assert!(tokens_match("abc", "abc"));
        assert!(!tokens_match("abc", "abd"));
        assert!(!tokens_match("ab", "abc"));
    }
}
