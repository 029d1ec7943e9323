use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use together_slack::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use together_slack::{parse_callback, CallbackPayload, EventSender, SignatureVerifier};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct WebhookState {
    verifier: Arc<SignatureVerifier>,
    events: EventSender,
}

impl WebhookState {
    pub fn new(verifier: SignatureVerifier, events: EventSender) -> Self {
        Self { verifier: Arc::new(verifier), events }
    }
}

pub fn router(path: &str, state: WebhookState) -> Router {
    Router::new().route(path, post(receive_events)).with_state(state)
}

/// Verifies, decodes and enqueues one Events API request. Handling happens on the event runner.
pub async fn receive_events(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(error) = state.verifier.verify(
        header_value(&headers, TIMESTAMP_HEADER),
        header_value(&headers, SIGNATURE_HEADER),
        &body,
        Utc::now().timestamp(),
    ) {
        warn!(
            event_name = "ingress.slack.signature_rejected",
            error = %error,
            "rejected slack request with invalid signature"
        );
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let payload = match parse_callback(&body) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(
                event_name = "ingress.slack.payload_rejected",
                error = %error,
                "could not decode slack request body"
            );
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match payload {
        CallbackPayload::UrlVerification { challenge } => {
            info!(event_name = "ingress.slack.url_verification", "answering url verification");
            Json(json!({ "challenge": challenge })).into_response()
        }
        CallbackPayload::Ignored => StatusCode::OK.into_response(),
        CallbackPayload::Event(envelope) => {
            let envelope_id = envelope.envelope_id.clone();
            let event_type = envelope.event.event_type();
            match state.events.try_send(envelope) {
                Ok(()) => {
                    debug!(
                        event_name = "ingress.slack.envelope_received",
                        correlation_id = %envelope_id,
                        event_type = ?event_type,
                        "queued slack event"
                    );
                    StatusCode::OK.into_response()
                }
                Err(TrySendError::Full(_)) => {
                    warn!(
                        event_name = "ingress.slack.queue_full",
                        correlation_id = %envelope_id,
                        "event queue is full; asking slack to retry"
                    );
                    StatusCode::SERVICE_UNAVAILABLE.into_response()
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(
                        event_name = "ingress.slack.queue_closed",
                        correlation_id = %envelope_id,
                        "event runner is not accepting events"
                    );
                    StatusCode::SERVICE_UNAVAILABLE.into_response()
                }
            }
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use chrono::Utc;
    use serde_json::{json, Value};
    use together_slack::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
    use together_slack::{event_queue, SignatureVerifier, SlackEnvelope};
    use tokio::sync::mpsc::Receiver;
    use tower::ServiceExt;

    use super::{router, WebhookState};

    const SECRET: &str = "test-signing-secret";

    fn app(capacity: usize) -> (Router, Receiver<SlackEnvelope>) {
        let (sender, receiver) = event_queue(capacity);
        let verifier = SignatureVerifier::new(SECRET.to_owned().into(), 300);
        (router("/api/messages", WebhookState::new(verifier, sender)), receiver)
    }

    fn signed_request(body: &Value) -> Request<Body> {
        signed_raw_request(body.to_string())
    }

    fn signed_raw_request(body: String) -> Request<Body> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = SignatureVerifier::new(SECRET.to_owned().into(), 300)
            .sign(&timestamp, body.as_bytes())
            .expect("sign");
        Request::post("/api/messages")
            .header("content-type", "application/json")
            .header(TIMESTAMP_HEADER, timestamp)
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .expect("request")
    }

    fn message_callback(text: &str) -> Value {
        json!({
            "type": "event_callback",
            "event_id": "Ev42",
            "event": { "type": "message", "channel": "C1", "user": "U1", "text": text }
        })
    }

    #[tokio::test]
    async fn answers_url_verification_challenge() {
        let (app, _receiver) = app(4);
        let request =
            signed_request(&json!({ "type": "url_verification", "challenge": "challenge-token" }));

        let response = app.oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024).await.expect("body");
        let value: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(value, json!({ "challenge": "challenge-token" }));
    }

    #[tokio::test]
    async fn queues_verified_events() {
        let (app, mut receiver) = app(4);

        let response =
            app.oneshot(signed_request(&message_callback("hello"))).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let envelope = receiver.try_recv().expect("queued envelope");
        assert_eq!(envelope.envelope_id, "Ev42");
    }

    #[tokio::test]
    async fn rejects_unsigned_and_forged_requests() {
        let (app, mut receiver) = app(4);
        let unsigned = Request::post("/api/messages")
            .body(Body::from(message_callback("hello").to_string()))
            .expect("request");
        let mut forged = signed_request(&message_callback("hello"));
        *forged.body_mut() = Body::from(message_callback("goal was achieved").to_string());

        let unsigned = app.clone().oneshot(unsigned).await.expect("response");
        let forged = app.oneshot(forged).await.expect("response");

        assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn rejects_signed_garbage() {
        let (app, _receiver) = app(4);

        let response = app.oneshot(signed_raw_request("{\"type\": ".to_owned())).await;

        assert_eq!(response.expect("response").status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn full_queue_asks_slack_to_retry() {
        let (app, _receiver) = app(1);

        let first = app.clone().oneshot(signed_request(&message_callback("one"))).await;
        let second = app.oneshot(signed_request(&message_callback("two"))).await;

        assert_eq!(first.expect("response").status(), StatusCode::OK);
        assert_eq!(second.expect("response").status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
