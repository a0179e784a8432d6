//! Shared state for the scheduler's control loop and HTTP surface.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use fuzzctl_broker::{BrokerClient, ManagementClient};
use fuzzctl_kv::KvClient;
use fuzzctl_repository::TaskRepository;

pub struct SchedulerState {
	pub repo: Arc<dyn TaskRepository>,
	pub broker: Arc<dyn BrokerClient>,
	pub kv: Arc<dyn KvClient>,
	pub management: ManagementClient,
	pub http_client: reqwest::Client,
	pub storage_root: std::path::PathBuf,
	pub download_retries: u32,
	pub task_failure_retries: u32,
	/// Fires once the first task-dispatch tick has run: the control plane is
	/// provisioned and accepting work.
	pub dispatch_ready: Arc<AtomicBool>,
	/// Fires once the broker management API has answered at least one probe.
	pub management_ready: Arc<AtomicBool>,
}
