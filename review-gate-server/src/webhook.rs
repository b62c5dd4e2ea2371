use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use hmac::{digest::KeyInit, Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::dispatcher::DispatchOutcome;
use crate::error::GateError;
use crate::event::InboundEvent;
use crate::ip_filter::client_ip;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;
type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_256_HEADER: &str = "x-hub-signature-256";
const SIGNATURE_HEADER: &str = "x-hub-signature";
const EVENT_HEADER: &str = "x-github-event";
const DELIVERY_HEADER: &str = "x-github-delivery";

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub message: String,
}

fn verify_hmac<M: Mac + KeyInit>(secret: &str, payload: &[u8], signature_hex: &str) -> bool {
    let Ok(signature_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = <M as Mac>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&signature_bytes).is_ok()
}

/// Check a delivery against its signature headers.
///
/// `X-Hub-Signature-256` is authoritative when present; the legacy SHA-1
/// `X-Hub-Signature` is consulted only without it. No signature at all is a
/// mismatch.
pub fn verify_github_signature(secret: &str, payload: &[u8], headers: &HeaderMap) -> bool {
    let header = |name: &str| headers.get(name).and_then(|h| h.to_str().ok());

    if let Some(signature) = header(SIGNATURE_256_HEADER) {
        return signature
            .strip_prefix("sha256=")
            .is_some_and(|hex| verify_hmac::<HmacSha256>(secret, payload, hex));
    }

    header(SIGNATURE_HEADER)
        .and_then(|signature| signature.strip_prefix("sha1="))
        .is_some_and(|hex| verify_hmac::<HmacSha1>(secret, payload, hex))
}

async fn verify_source_address(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    match client_ip(request.headers(), peer) {
        Some(ip) if state.allowed_networks.allows(ip) => Ok(next.run(request).await),
        Some(ip) => {
            warn!("Rejecting webhook from {}", ip);
            Err(GateError::SourceNotAllowed(ip))
        }
        None => {
            warn!("Rejecting webhook with unknown source address");
            Err(GateError::SourceNotAllowed(
                std::net::Ipv4Addr::UNSPECIFIED.into(),
            ))
        }
    }
}

async fn verify_webhook_signature(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to read webhook body: {}", e);
            return Ok(StatusCode::BAD_REQUEST.into_response());
        }
    };

    if !verify_github_signature(&state.webhook_secret, &bytes, &parts.headers) {
        error!("Invalid webhook signature");
        return Err(GateError::SignatureMismatch);
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

pub async fn github_webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, GateError> {
    let event_type = headers
        .get(EVENT_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(GateError::MissingEventType)?;

    let delivery_id = headers
        .get(DELIVERY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!("delivery", delivery_id = %delivery_id, event = %event_type);

    let event = InboundEvent::parse(event_type, &body).map_err(|e| {
        span.in_scope(|| warn!("Malformed {} payload: {}", event_type, e));
        GateError::MalformedPayload(e)
    })?;

    let outcome = state.dispatcher.dispatch(event).instrument(span.clone()).await;

    let message = span.in_scope(|| match outcome {
        DispatchOutcome::Ignored => "Event acknowledged".to_string(),
        DispatchOutcome::Abandoned(e) => {
            let e = GateError::HostUnavailable(e);
            warn!("Delivery abandoned: {}", e);
            "Event acknowledged; reviews unavailable".to_string()
        }
        DispatchOutcome::Evaluated {
            verdict,
            published,
            dismissals,
        } => {
            let failed = dismissals.iter().filter(|d| !d.is_ok()).count();
            info!(
                "Verdict {} ({}); published: {}, dismissals: {} attempted, {} failed",
                verdict.state,
                verdict.description,
                published,
                dismissals.len(),
                failed
            );
            format!("Verdict: {}", verdict.state)
        }
    });

    Ok(Json(WebhookResponse { message }))
}

pub fn webhook_router(middleware_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/incoming", post(github_webhook_handler))
        .route_layer(middleware::from_fn_with_state(
            middleware_state.clone(),
            verify_webhook_signature,
        ))
        .route_layer(middleware::from_fn_with_state(
            middleware_state,
            verify_source_address,
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::WebhookDispatcher;
    use crate::fake_host::FakeHost;
    use crate::ip_filter::AllowedNetworks;
    use crate::status::StatusPublisher;
    use axum::http::HeaderValue;
    use review_gate_core::{GateState, ReviewState};
    use serde_json::json;
    use tower::ServiceExt;

    const SECRET: &str = "It's a Secret to Everybody";

    fn state_with(host: Arc<FakeHost>, allowed_networks: AllowedNetworks) -> Arc<AppState> {
        Arc::new(AppState {
            dispatcher: WebhookDispatcher::new(
                host,
                1,
                StatusPublisher::default(),
                "Review gate",
            ),
            webhook_secret: SECRET.to_string(),
            allowed_networks,
        })
    }

    fn github_networks() -> AllowedNetworks {
        AllowedNetworks::parse("192.30.252.0/22").unwrap()
    }

    fn github_peer() -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from(([192, 30, 252, 10], 443)))
    }

    fn sign_sha256(body: &[u8]) -> String {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn sign_sha1(body: &[u8]) -> String {
        let mut mac = <HmacSha1 as Mac>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body);
        format!("sha1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn opened_body() -> Vec<u8> {
        json!({
            "action": "opened",
            "pull_request": {
                "number": 1,
                "head": {"sha": "abc123def456", "ref": "feature"}
            },
            "repository": {
                "name": "repo",
                "full_name": "owner/repo",
                "owner": {"id": 1, "login": "owner"}
            }
        })
        .to_string()
        .into_bytes()
    }

    fn request(event: Option<&str>, headers: &[(&str, String)], body: Vec<u8>) -> Request {
        let mut builder = axum::http::Request::builder()
            .method("POST")
            .uri("/incoming")
            .header("content-type", "application/json")
            .extension(github_peer());
        if let Some(event) = event {
            builder = builder.header(EVENT_HEADER, event);
        }
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn send(state: Arc<AppState>, request: Request) -> (StatusCode, String) {
        let response = crate::app(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_signature_verification() {
        let body = b"{\"zen\":\"Keep it logically awesome.\"}";
        let mut headers = HeaderMap::new();

        assert!(!verify_github_signature(SECRET, body, &headers));

        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&sign_sha1(body)).unwrap(),
        );
        assert!(verify_github_signature(SECRET, body, &headers));
        assert!(!verify_github_signature("other secret", body, &headers));

        headers.insert(
            SIGNATURE_256_HEADER,
            HeaderValue::from_static("sha256=deadbeef"),
        );
        assert!(
            !verify_github_signature(SECRET, body, &headers),
            "a bad SHA-256 signature must not fall back to SHA-1"
        );

        headers.insert(
            SIGNATURE_256_HEADER,
            HeaderValue::from_str(&sign_sha256(body)).unwrap(),
        );
        assert!(verify_github_signature(SECRET, body, &headers));
    }

    #[test]
    fn test_signature_rejects_wrong_prefix_and_bad_hex() {
        let body = b"payload";
        let mut headers = HeaderMap::new();
        let sha256 = sign_sha256(body);
        let wrong_prefix = sha256.replacen("sha256=", "sha1=", 1);
        headers.insert(
            SIGNATURE_256_HEADER,
            HeaderValue::from_str(&wrong_prefix).unwrap(),
        );
        assert!(!verify_github_signature(SECRET, body, &headers));

        headers.insert(SIGNATURE_256_HEADER, HeaderValue::from_static("sha256=zz"));
        assert!(!verify_github_signature(SECRET, body, &headers));
    }

    #[tokio::test]
    async fn test_opened_with_sha256_signature_publishes_status() {
        let host = Arc::new(FakeHost::new());
        host.add_review(1, 10, ReviewState::Approved);
        let body = opened_body();
        let signature = sign_sha256(&body);

        let (status, response) = send(
            state_with(host.clone(), github_networks()),
            request(
                Some("pull_request"),
                &[
                    (SIGNATURE_256_HEADER, signature),
                    (DELIVERY_HEADER, "72d3162e-cc78-11e3-81ab-4c9367dc0958".to_string()),
                ],
                body,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(response.contains("success"), "{}", response);
        let statuses = host.statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].state, GateState::Success);
    }

    #[tokio::test]
    async fn test_legacy_sha1_signature_is_accepted() {
        let host = Arc::new(FakeHost::new());
        let body = opened_body();
        let signature = sign_sha1(&body);

        let (status, _) = send(
            state_with(host.clone(), github_networks()),
            request(Some("pull_request"), &[(SIGNATURE_HEADER, signature)], body),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(host.statuses()[0].state, GateState::Pending);
    }

    #[tokio::test]
    async fn test_bad_signature_is_rejected_before_dispatch() {
        let host = Arc::new(FakeHost::new());
        let body = opened_body();
        let signature = sign_sha256(b"some other body");

        let (status, _) = send(
            state_with(host.clone(), github_networks()),
            request(Some("pull_request"), &[(SIGNATURE_256_HEADER, signature)], body),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(host.pages_requested().is_empty());
        assert!(host.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_missing_signature_is_rejected() {
        let host = Arc::new(FakeHost::new());

        let (status, _) = send(
            state_with(host.clone(), github_networks()),
            request(Some("pull_request"), &[], opened_body()),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(host.pages_requested().is_empty());
    }

    #[tokio::test]
    async fn test_missing_event_type_is_server_error() {
        let host = Arc::new(FakeHost::new());
        let body = opened_body();
        let signature = sign_sha256(&body);

        let (status, _) = send(
            state_with(host.clone(), github_networks()),
            request(None, &[(SIGNATURE_256_HEADER, signature)], body),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(host.pages_requested().is_empty());
    }

    #[tokio::test]
    async fn test_unhandled_event_type_is_acknowledged() {
        let host = Arc::new(FakeHost::new());
        let body = b"{\"zen\":\"Design for failure.\"}".to_vec();
        let signature = sign_sha256(&body);

        let (status, response) = send(
            state_with(host.clone(), github_networks()),
            request(Some("ping"), &[(SIGNATURE_256_HEADER, signature)], body),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(response.contains("Event acknowledged"));
        assert!(host.pages_requested().is_empty());
        assert!(host.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_bad_request() {
        let host = Arc::new(FakeHost::new());
        let body = b"{\"action\":\"opened\"}".to_vec();
        let signature = sign_sha256(&body);

        let (status, _) = send(
            state_with(host.clone(), github_networks()),
            request(Some("pull_request"), &[(SIGNATURE_256_HEADER, signature)], body),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(host.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_source_outside_allow_list_is_forbidden() {
        let host = Arc::new(FakeHost::new());
        let allowed = AllowedNetworks::parse("192.30.252.0/22").unwrap();
        let body = opened_body();
        let signature = sign_sha256(&body);

        let (status, _) = send(
            state_with(host.clone(), allowed),
            request(
                Some("pull_request"),
                &[
                    (SIGNATURE_256_HEADER, signature),
                    ("x-forwarded-for", "203.0.113.7".to_string()),
                ],
                body,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(host.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_source_inside_allow_list_is_accepted() {
        let host = Arc::new(FakeHost::new());
        let allowed = AllowedNetworks::parse("192.30.252.0/22").unwrap();
        let body = opened_body();
        let signature = sign_sha256(&body);

        let (status, _) = send(
            state_with(host.clone(), allowed),
            request(
                Some("pull_request"),
                &[
                    (SIGNATURE_256_HEADER, signature),
                    ("x-forwarded-for", "192.30.253.40, 10.0.0.2".to_string()),
                ],
                body,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(host.statuses().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_source_is_forbidden() {
        let host = Arc::new(FakeHost::new());
        let body = opened_body();
        let signature = sign_sha256(&body);
        let mut request =
            request(Some("pull_request"), &[(SIGNATURE_256_HEADER, signature)], body);
        request.extensions_mut().remove::<ConnectInfo<SocketAddr>>();

        let (status, _) = send(state_with(host.clone(), github_networks()), request).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(host.pages_requested().is_empty());
    }

    #[tokio::test]
    async fn test_peer_outside_allow_list_is_forbidden() {
        let host = Arc::new(FakeHost::new());
        let body = opened_body();
        let signature = sign_sha256(&body);
        let mut request =
            request(Some("pull_request"), &[(SIGNATURE_256_HEADER, signature)], body);
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([8, 8, 8, 8], 443))));

        let (status, _) = send(state_with(host.clone(), github_networks()), request).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(host.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_empty_allow_list_admits_nothing() {
        let host = Arc::new(FakeHost::new());
        let body = opened_body();
        let signature = sign_sha256(&body);

        let (status, _) = send(
            state_with(host.clone(), AllowedNetworks::default()),
            request(Some("pull_request"), &[(SIGNATURE_256_HEADER, signature)], body),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(host.pages_requested().is_empty());
    }

    #[tokio::test]
    async fn test_status_failure_is_still_acknowledged() {
        let host = Arc::new(FakeHost::new());
        host.fail_status();
        let body = opened_body();
        let signature = sign_sha256(&body);

        let (status, _) = send(
            state_with(host.clone(), github_networks()),
            request(Some("pull_request"), &[(SIGNATURE_256_HEADER, signature)], body),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unavailable_reviews_are_still_acknowledged() {
        let host = Arc::new(FakeHost::new());
        host.fail_page(1);
        let body = opened_body();
        let signature = sign_sha256(&body);

        let (status, response) = send(
            state_with(host.clone(), github_networks()),
            request(Some("pull_request"), &[(SIGNATURE_256_HEADER, signature)], body),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(response.contains("reviews unavailable"));
        assert!(host.statuses().is_empty());
    }
}
