use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use std::sync::Arc;
use tracing::warn;

use super::{ControlReply, ControlRequest, Controller};

pub fn create_control_router(controller: Arc<Controller>) -> Router {
    Router::new()
        .route("/control", post(control_handler))
        .with_state(controller)
}

async fn control_handler(
    State(controller): State<Arc<Controller>>,
    payload: Result<Json<ControlRequest>, JsonRejection>,
) -> (StatusCode, Json<ControlReply>) {
    match payload {
        Ok(Json(request)) => (StatusCode::OK, Json(controller.handle(request).await)),
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected control request.");
            (
                rejection.status(),
                Json(ControlReply::failed(rejection_message(&rejection))),
            )
        }
    }
}

fn rejection_message(rejection: &JsonRejection) -> String {
    let detail = rejection.body_text();
    match rejection {
        JsonRejection::JsonDataError(_) if detail.contains("unknown variant") => {
            format!("Unknown action: {detail}")
        }
        _ => detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::scheduler::Scheduler;
    use crate::monitor::test_support::Harness;
    use serde_json::json;

    async fn spawn_control(harness: &Harness) -> String {
        let controller = Arc::new(Controller::new(Arc::new(Scheduler::new(
            harness.sweeper.clone(),
        ))));
        let app = create_control_router(controller);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.unwrap();
        });
        format!("http://{addr}/control")
    }

    #[tokio::test]
    async fn test_post_control_dispatches_request() {
        let harness = Harness::new();
        let url = spawn_control(&harness).await;

        let response = reqwest::Client::new()
            .post(&url)
            .json(&json!({"action": "testNotification"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let reply: serde_json::Value = response.json().await.unwrap();
        assert_eq!(reply["success"], true);
        assert_eq!(reply["outcome"]["kind"], "notificationSent");
        assert_eq!(harness.sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_action_is_rejected() {
        let harness = Harness::new();
        let url = spawn_control(&harness).await;

        let response = reqwest::Client::new()
            .post(&url)
            .json(&json!({"action": "selfDestruct"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        let reply: ControlReply = response.json().await.unwrap();
        assert!(!reply.success);
        assert!(reply.error.unwrap().starts_with("Unknown action"));
    }

    #[tokio::test]
    async fn test_malformed_body_keeps_rejection_text() {
        let harness = Harness::new();
        let url = spawn_control(&harness).await;

        let response = reqwest::Client::new()
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body("{\"action\": ")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let reply: ControlReply = response.json().await.unwrap();
        assert!(!reply.success);
        assert!(!reply.error.unwrap().starts_with("Unknown action"));

        let response = reqwest::Client::new()
            .post(&url)
            .body(r#"{"action": "testNotification"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let reply: ControlReply = response.json().await.unwrap();
        assert!(!reply.error.unwrap().starts_with("Unknown action"));
    }
}
