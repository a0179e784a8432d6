//! Health/status/queue/harness HTTP surface (§6.4): plain `axum` routes over
//! `Arc`-shared state, with typed JSON errors rather than panics on a
//! missing/unreachable dependency. No authentication layer here; that is the
//! gateway's concern.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use fuzzctl_core::Fuzzlet;
use serde_json::json;

use crate::state::SchedulerState;

pub fn router(state: Arc<SchedulerState>) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/status", get(status))
		.route("/queue", get(queue))
		.route("/harness", get(harness))
		.with_state(state)
}

async fn health(State(state): State<Arc<SchedulerState>>) -> impl IntoResponse {
	let dispatch_ready = state.dispatch_ready.load(Ordering::Relaxed);
	let management_ready = state.management_ready.load(Ordering::Relaxed);
	if dispatch_ready && management_ready {
		(StatusCode::OK, Json(json!({ "status": "ready" })))
	} else {
		(
			StatusCode::SERVICE_UNAVAILABLE,
			Json(json!({ "status": "booting", "dispatch_ready": dispatch_ready, "management_ready": management_ready })),
		)
	}
}

async fn status(State(state): State<Arc<SchedulerState>>) -> impl IntoResponse {
	match state.repo.count_active_tasks().await {
		Ok(task_count) => (StatusCode::OK, Json(json!({ "task_count": task_count }))).into_response(),
		Err(error) => {
			tracing::error!(%error, "status handler failed to query repository");
			(StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": error.to_string() })))
				.into_response()
		}
	}
}

async fn queue(
	State(state): State<Arc<SchedulerState>>,
	Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
	let Some(queue_name) = params.get("queue") else {
		return (StatusCode::BAD_REQUEST, Json(json!({ "error": "missing queue param" }))).into_response();
	};
	match state.management.queue_depth(queue_name).await {
		Ok(depth) => (StatusCode::OK, Json(json!({ "queue": queue_name, "depth": depth }))).into_response(),
		Err(error) => {
			tracing::error!(%error, queue = %queue_name, "queue handler failed to reach management api");
			(StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": error.to_string() })))
				.into_response()
		}
	}
}

/// Aggregate of known harness sets, derived from the global `fuzzlets` set:
/// one entry per task id, each holding the distinct harness names published
/// for it so far.
async fn harness(State(state): State<Arc<SchedulerState>>) -> impl IntoResponse {
	let members = match state.kv.smembers(fuzzctl_kv::keys::FUZZLETS).await {
		Ok(members) => members,
		Err(error) => {
			tracing::error!(%error, "harness handler failed to query kv");
			return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": error.to_string() })))
				.into_response();
		}
	};

	let mut by_task: HashMap<String, Vec<String>> = HashMap::new();
	for raw in members {
		let Ok(fuzzlet) = serde_json::from_str::<Fuzzlet>(&raw) else {
			continue;
		};
		let harnesses = by_task.entry(fuzzlet.task_id).or_default();
		if !harnesses.contains(&fuzzlet.harness) {
			harnesses.push(fuzzlet.harness);
		}
	}

	(StatusCode::OK, Json(json!(by_task))).into_response()
}
