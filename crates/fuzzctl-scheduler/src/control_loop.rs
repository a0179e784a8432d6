//! Five independent ticks driven by one `tokio::select!` loop and one
//! `CancellationToken`. Each tick is spawned and logged independently so a
//! slow or failing routine never blocks the others; shutdown waits (bounded)
//! for whichever ticks are still in flight before returning.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::routines;
use crate::state::SchedulerState;

/// Grace period for in-flight ticks to finish once shutdown is requested.
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn run(state: Arc<SchedulerState>, poll_interval: Duration, shutdown: CancellationToken) {
	let mut task_ticker = tokio::time::interval(poll_interval);
	let mut deadline_ticker = tokio::time::interval(poll_interval);
	let mut bug_ticker = tokio::time::interval(poll_interval);
	let mut sarif_ticker = tokio::time::interval(poll_interval);
	let mut management_ticker = tokio::time::interval(poll_interval);

	let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

	loop {
		tokio::select! {
			_ = shutdown.cancelled() => {
				tracing::info!("control loop received shutdown signal, stopping");
				break;
			}
			_ = task_ticker.tick() => {
				let state = state.clone();
				in_flight.push(tokio::spawn(async move { routines::task_dispatch_tick(&state).await }));
			}
			_ = deadline_ticker.tick() => {
				let state = state.clone();
				in_flight.push(tokio::spawn(async move { routines::deadline_tick(&state).await }));
			}
			_ = bug_ticker.tick() => {
				let state = state.clone();
				in_flight.push(tokio::spawn(async move { routines::bug_forward_tick(&state).await }));
			}
			_ = sarif_ticker.tick() => {
				let state = state.clone();
				in_flight.push(tokio::spawn(async move { routines::sarif_forward_tick(&state).await }));
			}
			_ = management_ticker.tick() => {
				let state = state.clone();
				in_flight.push(tokio::spawn(async move { routines::management_probe_tick(&state).await }));
			}
		}

		in_flight.retain(|handle| !handle.is_finished());
	}

	join_in_flight(in_flight).await;
}

async fn join_in_flight(handles: Vec<JoinHandle<()>>) {
	let join_all = async {
		for handle in handles {
			if let Err(error) = handle.await {
				tracing::error!(%error, "a tick panicked during shutdown drain");
			}
		}
	};

	if tokio::time::timeout(SHUTDOWN_JOIN_TIMEOUT, join_all).await.is_err() {
		tracing::warn!("timed out waiting for in-flight ticks to finish, exiting anyway");
	}
}
