//! Production [`crate::KvClient`], backed by `redis` with a connection manager.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::error::{KvError, Result};
use crate::KvClient;

pub struct RedisKv {
	manager: ConnectionManager,
}

impl RedisKv {
	pub async fn connect(url: &str) -> Result<Self> {
		let client = redis::Client::open(url).map_err(KvError::Connection)?;
		let manager = client.get_connection_manager().await.map_err(KvError::Connection)?;
		Ok(RedisKv { manager })
	}
}

#[async_trait]
impl KvClient for RedisKv {
	async fn get(&self, key: &str) -> Result<Option<String>> {
		let mut conn = self.manager.clone();
		conn.get(key).await.map_err(KvError::Command)
	}

	async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
		let mut conn = self.manager.clone();
		match ttl {
			Some(ttl) => conn
				.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
				.await
				.map_err(KvError::Command),
			None => conn.set::<_, _, ()>(key, value).await.map_err(KvError::Command),
		}
	}

	async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
		let mut conn = self.manager.clone();
		let added: i64 = conn.sadd(key, member).await.map_err(KvError::Command)?;
		Ok(added > 0)
	}

	async fn srem(&self, key: &str, member: &str) -> Result<bool> {
		let mut conn = self.manager.clone();
		let removed: i64 = conn.srem(key, member).await.map_err(KvError::Command)?;
		Ok(removed > 0)
	}

	async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
		let mut conn = self.manager.clone();
		conn.sismember(key, member).await.map_err(KvError::Command)
	}

	async fn smembers(&self, key: &str) -> Result<Vec<String>> {
		let mut conn = self.manager.clone();
		conn.smembers(key).await.map_err(KvError::Command)
	}

	async fn delete(&self, key: &str) -> Result<()> {
		let mut conn = self.manager.clone();
		conn.del::<_, ()>(key).await.map_err(KvError::Command)
	}
}
