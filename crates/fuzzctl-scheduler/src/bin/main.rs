use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use fuzzctl_broker::{LapinBroker, ManagementClient};
use fuzzctl_kv::RedisKv;
use fuzzctl_repository::SqlRepository;
use fuzzctl_scheduler::SchedulerState;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
struct Args {
	/// Path to a TOML config file; falls back to `FUZZCTL_CONFIG` if unset.
	#[arg(long)]
	config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	fuzzctl_telemetry::init_logging("scheduler");

	let args = Args::parse();
	let config_path = args
		.config
		.or_else(|| std::env::var_os("FUZZCTL_CONFIG").map(std::path::PathBuf::from));
	let settings = fuzzctl_config::Settings::load(config_path.as_deref())?;

	let repo: Arc<dyn fuzzctl_repository::TaskRepository> =
		Arc::new(SqlRepository::connect(&settings.db_url).await?);
	let broker: Arc<dyn fuzzctl_broker::BrokerClient> = Arc::new(LapinBroker::connect(&settings.broker_url).await?);
	let kv: Arc<dyn fuzzctl_kv::KvClient> = Arc::new(RedisKv::connect(&settings.kv_url).await?);

	let state = Arc::new(SchedulerState {
		repo,
		broker,
		kv,
		management: ManagementClient::new(settings.management_url.clone()),
		http_client: reqwest::Client::new(),
		storage_root: settings.storage_root.clone(),
		download_retries: settings.download_retries,
		task_failure_retries: settings.task_failure_retries,
		dispatch_ready: Arc::new(AtomicBool::new(false)),
		management_ready: Arc::new(AtomicBool::new(false)),
	});

	let shutdown = CancellationToken::new();

	let listener = tokio::net::TcpListener::bind(("0.0.0.0", settings.health_port)).await?;
	let http_shutdown = shutdown.clone();
	let http_router = fuzzctl_scheduler::http_router(state.clone());
	let http_handle = tokio::spawn(async move {
		axum::serve(listener, http_router)
			.with_graceful_shutdown(async move { http_shutdown.cancelled().await })
			.await
	});

	let inbound_shutdown = shutdown.clone();
	let inbound_state = state.clone();
	let inbound_handle = tokio::spawn(async move { fuzzctl_scheduler::run_inbound_consumer(inbound_state, inbound_shutdown).await });

	let control_loop_shutdown = shutdown.clone();
	let control_loop_handle = tokio::spawn(async move {
		fuzzctl_scheduler::run_control_loop(state, settings.poll_interval, control_loop_shutdown).await
	});

	tokio::signal::ctrl_c().await?;
	tracing::info!("received ctrl-c, shutting down");
	shutdown.cancel();

	control_loop_handle.await?;
	inbound_handle.await?;
	http_handle.await??;

	Ok(())
}
