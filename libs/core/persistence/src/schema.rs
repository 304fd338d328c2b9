// [libs/core/persistence/src/schema.rs]
//! Schema definition and migration for the SPECTRA persistence store.
//!
//! Tables are applied idempotently via `CREATE TABLE IF NOT EXISTS`, the
//! same pattern the source used for its own tactical tables. What's new
//! here is `schema_version`: a single-row table checked at startup, a
//! version mismatch is a fatal `PersistenceError::Migration`.

use crate::errors::PersistenceError;
use libsql::Connection;
use tracing::{debug, info, instrument};

/// Bump when a table's shape changes in a way existing rows can't
/// tolerate. `apply_schema` will refuse to run against a database
/// stamped with a different version.
pub const SCHEMA_VERSION: i64 = 1;

const TABLES: &[(&str, &str)] = &[
    ("schema_version", r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );
    "#),
    ("accounts", r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_name TEXT NOT NULL UNIQUE,
            api_id INTEGER NOT NULL,
            api_hash TEXT NOT NULL,
            phone_number TEXT NOT NULL,
            password TEXT,
            proxy_id INTEGER REFERENCES proxies(id),
            usage_counter INTEGER NOT NULL DEFAULT 0,
            last_used_at TEXT,
            cooldown_until TEXT,
            health TEXT NOT NULL DEFAULT 'active'
        );
    "#),
    ("proxies", r#"
        CREATE TABLE IF NOT EXISTS proxies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transport TEXT NOT NULL,
            host TEXT NOT NULL,
            port INTEGER NOT NULL,
            username TEXT,
            password TEXT,
            rotation_group TEXT NOT NULL DEFAULT 'default',
            exclusive INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("entities", r#"
        CREATE TABLE IF NOT EXISTS entities (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            kind TEXT NOT NULL,
            first_seen_at TEXT NOT NULL,
            last_seen_at TEXT NOT NULL,
            discovery_depth INTEGER NOT NULL DEFAULT 0,
            priority_score REAL NOT NULL DEFAULT 0.0
        );
    "#),
    ("entity_access_hashes", r#"
        CREATE TABLE IF NOT EXISTS entity_access_hashes (
            account_id INTEGER NOT NULL REFERENCES accounts(id),
            entity_id INTEGER NOT NULL REFERENCES entities(id),
            access_hash INTEGER NOT NULL,
            learned_at TEXT NOT NULL,
            PRIMARY KEY (account_id, entity_id)
        );
    "#),
    ("messages", r#"
        CREATE TABLE IF NOT EXISTS messages (
            entity_id INTEGER NOT NULL REFERENCES entities(id),
            message_id INTEGER NOT NULL,
            sender_id INTEGER,
            kind TEXT NOT NULL,
            date TEXT NOT NULL,
            edit_date TEXT,
            text TEXT,
            reply_to INTEGER,
            media_id INTEGER REFERENCES media_objects(id),
            checksum_sha256 TEXT NOT NULL,
            PRIMARY KEY (entity_id, message_id)
        );
    "#),
    ("media_objects", r#"
        CREATE TABLE IF NOT EXISTS media_objects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            mime_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            file_path TEXT NOT NULL,
            original_filename TEXT,
            sha256 TEXT NOT NULL,
            phash INTEGER,
            fuzzy_hash TEXT
        );
    "#),
    ("checkpoints", r#"
        CREATE TABLE IF NOT EXISTS checkpoints (
            entity_id INTEGER NOT NULL,
            context TEXT NOT NULL,
            last_fetched_message_id INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (entity_id, context)
        );
    "#),
    ("forward_fingerprints", r#"
        CREATE TABLE IF NOT EXISTS forward_fingerprints (
            destination_entity_id INTEGER NOT NULL,
            sha256 TEXT NOT NULL,
            perceptual_hash INTEGER,
            fuzzy_hash TEXT,
            first_seen_at TEXT NOT NULL,
            origin_entity_id INTEGER NOT NULL,
            PRIMARY KEY (destination_entity_id, sha256)
        );
    "#),
    ("archive_jobs", r#"
        CREATE TABLE IF NOT EXISTS archive_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            target_entity_id INTEGER NOT NULL,
            options_json TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'queued',
            attempts INTEGER NOT NULL DEFAULT 0,
            cause TEXT,
            earliest_run_at TEXT,
            pinned_account_id INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("forward_jobs", r#"
        CREATE TABLE IF NOT EXISTS forward_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_entity_ids_json TEXT NOT NULL,
            destination_entity_id INTEGER NOT NULL,
            mode TEXT NOT NULL,
            flags_json TEXT NOT NULL,
            progress_cursor INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'queued',
            attempts INTEGER NOT NULL DEFAULT 0,
            cause TEXT,
            earliest_run_at TEXT,
            pinned_account_id INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("discovery_jobs", r#"
        CREATE TABLE IF NOT EXISTS discovery_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            seeds_json TEXT NOT NULL,
            options_json TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'queued',
            attempts INTEGER NOT NULL DEFAULT 0,
            cause TEXT,
            earliest_run_at TEXT,
            pinned_account_id INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("invitation_tasks", r#"
        CREATE TABLE IF NOT EXISTS invitation_tasks (
            destination_entity_id INTEGER NOT NULL,
            invitee_account_id INTEGER NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            next_eligible_at TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'pending',
            PRIMARY KEY (destination_entity_id, invitee_account_id)
        );
    "#),
    ("access_records", r#"
        CREATE TABLE IF NOT EXISTS access_records (
            account_id INTEGER NOT NULL,
            entity_id INTEGER NOT NULL,
            access_hash INTEGER NOT NULL,
            last_seen_at TEXT NOT NULL,
            stale INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (account_id, entity_id)
        );
    "#),
    ("discovery_edges", r#"
        CREATE TABLE IF NOT EXISTS discovery_edges (
            source_entity_id INTEGER NOT NULL,
            target_entity_id INTEGER NOT NULL,
            observed_at TEXT NOT NULL,
            context TEXT NOT NULL,
            PRIMARY KEY (source_entity_id, target_entity_id, context)
        );
    "#),
];

const INDEXES: &[(&str, &str)] = &[
    ("idx_accounts_health", "CREATE INDEX IF NOT EXISTS idx_accounts_health ON accounts(health, cooldown_until);"),
    ("idx_messages_date", "CREATE INDEX IF NOT EXISTS idx_messages_date ON messages(entity_id, date);"),
    ("idx_jobs_status_archive", "CREATE INDEX IF NOT EXISTS idx_archive_jobs_status ON archive_jobs(status, earliest_run_at);"),
    ("idx_jobs_status_forward", "CREATE INDEX IF NOT EXISTS idx_forward_jobs_status ON forward_jobs(status, earliest_run_at);"),
    ("idx_jobs_status_discovery", "CREATE INDEX IF NOT EXISTS idx_discovery_jobs_status ON discovery_jobs(status, earliest_run_at);"),
    ("idx_invitations_eligible", "CREATE INDEX IF NOT EXISTS idx_invitations_eligible ON invitation_tasks(state, next_eligible_at);"),
    ("idx_edges_source", "CREATE INDEX IF NOT EXISTS idx_discovery_edges_source ON discovery_edges(source_entity_id);"),
];

/// Creates every table and index if absent, then verifies (or stamps,
/// on a fresh database) the schema version row.
#[instrument(skip(connection))]
pub async fn apply_schema(connection: &Connection) -> Result<(), PersistenceError> {
    connection.execute("PRAGMA foreign_keys = ON;", ()).await.map_err(PersistenceError::from)?;

    for (name, sql) in TABLES {
        debug!(table = name, "applying table");
        connection.execute(sql, ()).await.map_err(|e| PersistenceError::Migration(format!("{name}: {e}")))?;
    }
    for (name, sql) in INDEXES {
        connection.execute(sql, ()).await.map_err(|e| PersistenceError::Migration(format!("{name}: {e}")))?;
    }

    verify_or_stamp_version(connection).await?;
    info!(version = SCHEMA_VERSION, "schema applied");
    Ok(())
}

async fn verify_or_stamp_version(connection: &Connection) -> Result<(), PersistenceError> {
    let mut rows = connection
        .query("SELECT version FROM schema_version WHERE id = 1;", ())
        .await
        .map_err(PersistenceError::from)?;

    match rows.next().await.map_err(PersistenceError::from)? {
        Some(row) => {
            let found: i64 = row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
            if found != SCHEMA_VERSION {
                return Err(PersistenceError::Migration(format!(
                    "schema version mismatch: expected {SCHEMA_VERSION}, found {found}"
                )));
            }
            Ok(())
        }
        None => {
            connection
                .execute("INSERT INTO schema_version (id, version) VALUES (1, ?1);", libsql::params![SCHEMA_VERSION])
                .await
                .map_err(PersistenceError::from)?;
            Ok(())
        }
    }
}
