//! Parses AFL++'s `fuzzer_stats` file into telemetry attributes.

use std::path::Path;

/// Reads `<instance_dir>/fuzzer_stats` and returns its `key : value` lines as
/// `fuzzer.afl.<key>` attributes. Missing file or malformed lines are not
/// fatal to the run; this only runs on exit, after the instance already did
/// its work.
pub fn parse_fuzzer_stats(instance_dir: &Path) -> Vec<(String, String)> {
	let path = instance_dir.join("fuzzer_stats");
	let Ok(contents) = std::fs::read_to_string(&path) else {
		return Vec::new();
	};

	contents
		.lines()
		.filter_map(|line| {
			let (key, value) = line.split_once(':')?;
			Some((format!("fuzzer.afl.{}", key.trim()), value.trim().to_string()))
		})
		.collect()
}

/// Emits `parse_fuzzer_stats` for every instance subdirectory of `output_dir`
/// as one tracing event per instance, tagged with its name.
pub fn log_fuzzer_stats(output_dir: &Path, task_id: &str) {
	let Ok(entries) = std::fs::read_dir(output_dir) else {
		return;
	};
	for entry in entries.flatten() {
		if !entry.path().is_dir() {
			continue;
		}
		let instance_name = entry.file_name().to_string_lossy().to_string();
		let attributes = parse_fuzzer_stats(&entry.path());
		if attributes.is_empty() {
			continue;
		}
		tracing::info!(task_id = %task_id, instance = %instance_name, ?attributes, "fuzzer_stats");
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_colon_separated_key_value_lines() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(
			dir.path().join("fuzzer_stats"),
			"start_time        : 1700000000\nexecs_done        : 12345\nbitmap_cvg        : 4.20%\n",
		)
		.unwrap();

		let attributes = parse_fuzzer_stats(dir.path());
		assert!(attributes.contains(&("fuzzer.afl.start_time".to_string(), "1700000000".to_string())));
		assert!(attributes.contains(&("fuzzer.afl.execs_done".to_string(), "12345".to_string())));
	}

	#[test]
	fn missing_file_yields_no_attributes() {
		let dir = tempfile::tempdir().unwrap();
		assert!(parse_fuzzer_stats(dir.path()).is_empty());
	}
}
