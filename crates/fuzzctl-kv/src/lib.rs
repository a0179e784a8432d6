//! KV coordination/dedup layer over Redis.

pub mod keys;

mod error;
mod fake;
mod real;

use std::time::Duration;

use async_trait::async_trait;

pub use error::{KvError, Result};
pub use fake::FakeKv;
pub use real::RedisKv;

/// Cache/coordination surface. Nothing behind this trait is load-bearing: a
/// cold KV store means re-derived work, never incorrect results.
#[async_trait]
pub trait KvClient: Send + Sync {
	async fn get(&self, key: &str) -> Result<Option<String>>;
	async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

	/// Adds `member` to the set at `key`. Returns `true` if it was not already present.
	async fn sadd(&self, key: &str, member: &str) -> Result<bool>;
	/// Removes `member` from the set at `key`. Returns `true` if it was present.
	async fn srem(&self, key: &str, member: &str) -> Result<bool>;
	async fn sismember(&self, key: &str, member: &str) -> Result<bool>;
	/// All current members of the set at `key`, in no particular order.
	async fn smembers(&self, key: &str) -> Result<Vec<String>>;

	async fn delete(&self, key: &str) -> Result<()>;
}
