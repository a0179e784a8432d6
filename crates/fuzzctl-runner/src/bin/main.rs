use std::sync::Arc;

use clap::Parser;
use fuzzctl_broker::LapinBroker;
use fuzzctl_crashmgr::CrashManager;
use fuzzctl_kv::RedisKv;
use fuzzctl_procsup::TokioProcessSupervisor;
use fuzzctl_repository::SqlRepository;
use fuzzctl_runner::{AflFuzzer, RunnerConfig, CRASH_CHANNEL_CAPACITY};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
struct Args {
	/// Path to a TOML config file; falls back to `FUZZCTL_CONFIG` if unset.
	#[arg(long)]
	config: Option<std::path::PathBuf>,
	/// Project this runner instance fuzzes; fuzzlets are routed by project name.
	#[arg(long)]
	project: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	fuzzctl_telemetry::init_logging("runner");

	let args = Args::parse();
	let config_path = args
		.config
		.or_else(|| std::env::var_os("FUZZCTL_CONFIG").map(std::path::PathBuf::from));
	let settings = fuzzctl_config::Settings::load(config_path.as_deref())?;

	let broker: Arc<dyn fuzzctl_broker::BrokerClient> = Arc::new(LapinBroker::connect(&settings.broker_url).await?);
	let kv: Arc<dyn fuzzctl_kv::KvClient> = Arc::new(RedisKv::connect(&settings.kv_url).await?);
	let repo: Arc<dyn fuzzctl_repository::TaskRepository> = Arc::new(SqlRepository::connect(&settings.db_url).await?);
	let supervisor: Arc<dyn fuzzctl_procsup::ProcessSupervisor> = Arc::new(TokioProcessSupervisor);
	let fuzzer: Arc<dyn fuzzctl_runner::Fuzzer> = Arc::new(AflFuzzer);

	let (crash_manager, stored_rx, crashmgr_handle) =
		CrashManager::spawn(settings.crash_root.clone(), CRASH_CHANNEL_CAPACITY);

	let config = Arc::new(RunnerConfig {
		storage_root: settings.storage_root.clone(),
		work_root: settings.work_root.clone(),
		core_count: settings.core_count,
		harness_copies: settings.harness_copies,
		graceful_ratio: settings.graceful_ratio,
	});

	let shutdown = CancellationToken::new();

	let bug_registration_handle = tokio::spawn(fuzzctl_runner::run_bug_registration(repo.clone(), stored_rx));

	let loop_shutdown = shutdown.clone();
	let project = args.project.clone();
	let loop_handle = tokio::spawn(async move {
		fuzzctl_runner::run_consume_loop(
			supervisor,
			fuzzer,
			broker,
			kv,
			repo,
			crash_manager,
			config,
			project,
			loop_shutdown,
		)
		.await
	});

	tokio::signal::ctrl_c().await?;
	tracing::info!("received ctrl-c, shutting down");
	shutdown.cancel();

	loop_handle.await??;
	bug_registration_handle.await?;
	crashmgr_handle.await?;

	Ok(())
}
