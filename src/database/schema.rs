//! SQLite schema and ad hoc column migrations

/// Tables, created when missing
pub const CREATE_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS groups (
        id INTEGER PRIMARY KEY,
        name TEXT,
        added_at TEXT NOT NULL,
        punish_action TEXT NOT NULL DEFAULT 'mute',
        punish_duration_profile INTEGER NOT NULL DEFAULT 0,
        punish_duration_message INTEGER NOT NULL DEFAULT 3600,
        punish_duration_mention INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        username TEXT,
        first_name TEXT,
        last_name TEXT,
        last_seen_at TEXT NOT NULL,
        has_started_bot INTEGER NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_users_username ON users (username)",
    r#"
    CREATE TABLE IF NOT EXISTS group_user_exemptions (
        group_id INTEGER NOT NULL REFERENCES groups (id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (group_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS global_exemptions (
        user_id INTEGER PRIMARY KEY,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS bad_actors (
        user_id INTEGER NOT NULL,
        group_id INTEGER NOT NULL REFERENCES groups (id) ON DELETE CASCADE,
        reason TEXT NOT NULL,
        punishment_type TEXT NOT NULL,
        punishment_end TEXT,
        created_at TEXT NOT NULL,
        PRIMARY KEY (user_id, group_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS feature_control (
        feature_name TEXT PRIMARY KEY,
        is_enabled INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS timed_broadcasts (
        job_name TEXT PRIMARY KEY,
        target_type TEXT NOT NULL,
        message_text TEXT NOT NULL,
        interval_seconds INTEGER NOT NULL,
        next_run_at TEXT NOT NULL,
        markup_json TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS unmute_attempts (
        user_id INTEGER NOT NULL,
        chat_id INTEGER NOT NULL,
        last_attempt_at TEXT NOT NULL,
        PRIMARY KEY (user_id, chat_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS action_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        group_id INTEGER NOT NULL,
        action TEXT NOT NULL,
        trigger_type TEXT NOT NULL,
        reason TEXT NOT NULL,
        duration_seconds INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS group_members (
        group_id INTEGER NOT NULL REFERENCES groups (id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL,
        seen_at TEXT NOT NULL,
        PRIMARY KEY (group_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS bot_settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
];

/// Columns added after the first release. Databases created by this version
/// already have them, so "duplicate column" failures are expected and ignored.
pub const COLUMN_MIGRATIONS: &[&str] = &[
    "ALTER TABLE groups ADD COLUMN punish_duration_mention INTEGER NOT NULL DEFAULT 0",
    "ALTER TABLE users ADD COLUMN has_started_bot INTEGER NOT NULL DEFAULT 0",
    "ALTER TABLE timed_broadcasts ADD COLUMN markup_json TEXT",
];
