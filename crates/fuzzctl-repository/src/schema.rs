//! Startup schema. Idempotent `CREATE TABLE IF NOT EXISTS` run by every
//! binary at boot; there is no separate migration binary because the tables
//! mirror the domain entities 1:1 and rarely change shape.

pub const STATEMENTS: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS tasks (
		task_id TEXT PRIMARY KEY,
		task_type TEXT NOT NULL,
		project_name TEXT NOT NULL,
		focus TEXT NOT NULL,
		deadline TEXT NOT NULL,
		status TEXT NOT NULL,
		metadata TEXT NOT NULL,
		message_id TEXT NOT NULL,
		user_id TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS sources (
		task_id TEXT NOT NULL,
		source_type TEXT NOT NULL,
		url TEXT NOT NULL,
		sha256 TEXT NOT NULL,
		local_path TEXT,
		PRIMARY KEY (task_id, source_type)
	)
	"#,
	// `id` is an autoincrement primary key; inserts use `RETURNING id` so the
	// same statement shape works against both backends.
	r#"
	CREATE TABLE IF NOT EXISTS bugs (
		id INTEGER PRIMARY KEY,
		task_id TEXT NOT NULL,
		harness_name TEXT NOT NULL,
		sanitizer TEXT NOT NULL,
		architecture TEXT NOT NULL,
		poc TEXT NOT NULL,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS bug_profiles (
		bug_id INTEGER PRIMARY KEY,
		summary TEXT NOT NULL,
		cwe TEXT
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS patches (
		patch_id TEXT PRIMARY KEY,
		task_id TEXT NOT NULL,
		diff_path TEXT NOT NULL,
		status TEXT NOT NULL,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS sarif_records (
		sarif_id TEXT PRIMARY KEY,
		task_id TEXT NOT NULL,
		message_id TEXT NOT NULL,
		sarif TEXT NOT NULL,
		metadata TEXT NOT NULL
	)
	"#,
];
