//! The fixed AFL++ instance environment. `fuzzctl_procsup` already
//! strips `OTEL_`/`OTLP_` from whatever the instance additionally inherits;
//! these are the variables this workspace adds on top.

/// Applied to every instance, master and slaves alike.
const BASE_ENV: &[(&str, &str)] = &[
	("AFL_NO_UI", "1"),
	("AFL_SKIP_CPUFREQ", "1"),
	("AFL_FAST_CAL", "1"),
	("AFL_CMPLOG_ONLY_NEW", "1"),
	("AFL_FORKSRV_INIT_TMOUT", "30000"),
	("AFL_IGNORE_PROBLEMS", "1"),
	("AFL_IGNORE_SEED_PROBLEMS", "1"),
	("AFL_IGNORE_UNKNOWN_ENVS", "1"),
	("AFL_TRY_AFFINITY", "1"),
	("AFL_I_DONT_CARE_ABOUT_MISSING_CRASHES", "1"),
];

/// Set only on the instance running `AFL_FINAL_SYNC`, i.e. the master.
const MASTER_ONLY_ENV: &[(&str, &str)] = &[("AFL_FINAL_SYNC", "1")];

/// The full environment for one instance: [`BASE_ENV`], plus [`MASTER_ONLY_ENV`] when `is_master`.
pub fn instance_env(is_master: bool) -> Vec<(String, String)> {
	let mut env: Vec<(String, String)> = BASE_ENV.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
	if is_master {
		env.extend(MASTER_ONLY_ENV.iter().map(|(k, v)| (k.to_string(), v.to_string())));
	}
	env
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_the_master_gets_final_sync() {
		let master = instance_env(true);
		let slave = instance_env(false);
		assert!(master.iter().any(|(k, v)| k == "AFL_FINAL_SYNC" && v == "1"));
		assert!(!slave.iter().any(|(k, _)| k == "AFL_FINAL_SYNC"));
	}

	#[test]
	fn both_roles_get_the_base_set() {
		for env in [instance_env(true), instance_env(false)] {
			assert!(env.iter().any(|(k, v)| k == "AFL_NO_UI" && v == "1"));
			assert!(env.iter().any(|(k, _)| k == "AFL_TRY_AFFINITY"));
		}
	}
}
