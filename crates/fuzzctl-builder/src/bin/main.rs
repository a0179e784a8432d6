use std::sync::Arc;

use clap::Parser;
use fuzzctl_broker::LapinBroker;
use fuzzctl_kv::RedisKv;
use fuzzctl_procsup::TokioProcessSupervisor;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
struct Args {
	/// Path to a TOML config file; falls back to `FUZZCTL_CONFIG` if unset.
	#[arg(long)]
	config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	fuzzctl_telemetry::init_logging("builder");

	let args = Args::parse();
	let config_path = args
		.config
		.or_else(|| std::env::var_os("FUZZCTL_CONFIG").map(std::path::PathBuf::from));
	let settings = fuzzctl_config::Settings::load(config_path.as_deref())?;

	let broker: Arc<dyn fuzzctl_broker::BrokerClient> = Arc::new(LapinBroker::connect(&settings.broker_url).await?);
	let kv: Arc<dyn fuzzctl_kv::KvClient> = Arc::new(RedisKv::connect(&settings.kv_url).await?);
	let supervisor: Arc<dyn fuzzctl_procsup::ProcessSupervisor> = Arc::new(TokioProcessSupervisor);
	let config = Arc::new(fuzzctl_builder::BuildConfig {
		storage_root: settings.storage_root.clone(),
		build_timeout: settings.build_timeout,
		build_retries: settings.build_retries,
	});

	let shutdown = CancellationToken::new();
	let loop_shutdown = shutdown.clone();
	let loop_handle = tokio::spawn(async move {
		fuzzctl_builder::run_consume_loop(supervisor, broker, kv, config, loop_shutdown).await
	});

	tokio::signal::ctrl_c().await?;
	tracing::info!("received ctrl-c, shutting down");
	shutdown.cancel();

	loop_handle.await??;

	Ok(())
}
