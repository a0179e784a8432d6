//! In-memory [`crate::KvClient`] for tests.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::KvClient;

#[derive(Default)]
pub struct FakeKv {
	strings: Mutex<HashMap<String, String>>,
	sets: Mutex<HashMap<String, HashSet<String>>>,
}

impl FakeKv {
	pub fn new() -> Self {
		FakeKv::default()
	}
}

#[async_trait]
impl KvClient for FakeKv {
	async fn get(&self, key: &str) -> Result<Option<String>> {
		Ok(self.strings.lock().await.get(key).cloned())
	}

	async fn set(&self, key: &str, value: &str, _ttl: Option<Duration>) -> Result<()> {
		self.strings.lock().await.insert(key.to_string(), value.to_string());
		Ok(())
	}

	async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
		let mut sets = self.sets.lock().await;
		Ok(sets.entry(key.to_string()).or_default().insert(member.to_string()))
	}

	async fn srem(&self, key: &str, member: &str) -> Result<bool> {
		let mut sets = self.sets.lock().await;
		Ok(sets.entry(key.to_string()).or_default().remove(member))
	}

	async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
		let sets = self.sets.lock().await;
		Ok(sets.get(key).is_some_and(|set| set.contains(member)))
	}

	async fn smembers(&self, key: &str) -> Result<Vec<String>> {
		let sets = self.sets.lock().await;
		Ok(sets.get(key).map(|set| set.iter().cloned().collect()).unwrap_or_default())
	}

	async fn delete(&self, key: &str) -> Result<()> {
		self.strings.lock().await.remove(key);
		self.sets.lock().await.remove(key);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn sadd_reports_whether_member_was_new() {
		let kv = FakeKv::new();
		assert!(kv.sadd("s", "a").await.unwrap());
		assert!(!kv.sadd("s", "a").await.unwrap());
		assert!(kv.sismember("s", "a").await.unwrap());
		assert!(!kv.sismember("s", "b").await.unwrap());
	}

	#[tokio::test]
	async fn srem_removes_a_member_and_reports_whether_it_was_present() {
		let kv = FakeKv::new();
		kv.sadd("s", "a").await.unwrap();
		assert!(kv.srem("s", "a").await.unwrap());
		assert!(!kv.sismember("s", "a").await.unwrap());
		assert!(!kv.srem("s", "a").await.unwrap());
	}

	#[tokio::test]
	async fn smembers_lists_every_added_member() {
		let kv = FakeKv::new();
		kv.sadd("s", "a").await.unwrap();
		kv.sadd("s", "b").await.unwrap();
		let mut members = kv.smembers("s").await.unwrap();
		members.sort();
		assert_eq!(members, vec!["a".to_string(), "b".to_string()]);
		assert_eq!(kv.smembers("missing").await.unwrap(), Vec::<String>::new());
	}

	#[tokio::test]
	async fn get_set_round_trips() {
		let kv = FakeKv::new();
		assert_eq!(kv.get("k").await.unwrap(), None);
		kv.set("k", "v", None).await.unwrap();
		assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
		kv.delete("k").await.unwrap();
		assert_eq!(kv.get("k").await.unwrap(), None);
	}
}
