//! Concurrency tests: simultaneous submissions against one layout must
//! serialize, while different layouts proceed independently.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::json;
use tower::ServiceExt;

use portlayout_server::router::build_router;
use portlayout_server::schema::actions::{ActionRequest, LayoutAction};
use portlayout_server::state::AppState;
use portlayout_storage::DEFAULT_PROFILE;

async fn post_action(
    app: &Router,
    user: &str,
    action: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method("POST")
        .uri("/profiles/1/layout/actions")
        .header("content-type", "application/json")
        .header("X-Portal-User", user)
        .body(Body::from(serde_json::to_vec(&action).unwrap()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(json!(null)))
}

fn tab_count(state: &AppState, user: &str) -> usize {
    let view = state.service.layout(user, DEFAULT_PROFILE).unwrap();
    view.nodes.iter().filter(|n| n.kind == "tab").count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_submissions_are_not_lost() {
    let state = AppState::in_memory();
    state.service.register_user("ada").unwrap();
    let app = build_router(state.clone());

    let mut handles = Vec::new();
    for i in 0..16 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            post_action(
                &app,
                "ada",
                json!({ "action": "addTab", "tabName": format!("Tab {i}") }),
            )
            .await
        }));
    }
    for handle in handles {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK, "{:?}", body);
    }

    assert_eq!(tab_count(&state, "ada"), 17);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_conditional_submissions_apply_once() {
    let state = AppState::in_memory();
    state.service.register_user("ada").unwrap();
    let hash = state.service.layout("ada", DEFAULT_PROFILE).unwrap().hash;
    let app = build_router(state.clone());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        let hash = hash.clone();
        handles.push(tokio::spawn(async move {
            post_action(
                &app,
                "ada",
                json!({ "action": "addTab", "tabName": "Once", "expectedHash": hash }),
            )
            .await
            .0
        }));
    }
    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(handle.await.unwrap());
    }

    let ok = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    let conflicts = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();
    assert_eq!(ok, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(tab_count(&state, "ada"), 2);
}

#[test]
fn threads_on_separate_users_do_not_interfere() {
    let state = AppState::in_memory();
    let service = Arc::clone(&state.service);
    for name in ["ada", "bob", "cy"] {
        service.register_user(name).unwrap();
    }

    let workers: Vec<_> = ["ada", "bob", "cy"]
        .into_iter()
        .map(|name| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || {
                for _ in 0..5 {
                    let request = ActionRequest::from(LayoutAction::AddTab {
                        tab_name: format!("{name}'s"),
                        columns: Vec::new(),
                    });
                    service.apply(name, DEFAULT_PROFILE, request).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    for name in ["ada", "bob", "cy"] {
        assert_eq!(tab_count(&state, name), 6);
    }
    assert_eq!(service.locks().tracked(), 3);
}
