//! SQLite schema definitions.

/// Current schema version for migrations.
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema for the local SQLite database.
pub const SCHEMA: &str = r#"
-- Boards owned by this device (and, once synced, by a user)
CREATE TABLE IF NOT EXISTS boards (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    cover_image TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT,
    owner_id TEXT,
    sharing TEXT,
    synced_at TEXT
);

-- Ranked cards; rank is dense 1..N over non-deleted cards of a board
CREATE TABLE IF NOT EXISTS cards (
    id TEXT PRIMARY KEY,
    board_id TEXT NOT NULL REFERENCES boards(id),
    name TEXT NOT NULL,
    nickname TEXT,
    image_key TEXT,
    thumbnail_key TEXT,
    image_crop TEXT,
    notes TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    rank INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

-- Immutable snapshots; rankings is a JSON array of value copies
CREATE TABLE IF NOT EXISTS snapshots (
    id TEXT PRIMARY KEY,
    board_id TEXT NOT NULL,
    episode_number INTEGER NOT NULL,
    label TEXT NOT NULL,
    notes TEXT,
    rankings TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Device-scoped key/value state
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Content hash of the last pushed copy of each entity
CREATE TABLE IF NOT EXISTS sync_ledger (
    collection TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    pushed_at TEXT NOT NULL,
    PRIMARY KEY (collection, entity_id)
);

-- Sync metadata
CREATE TABLE IF NOT EXISTS sync_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_sync_at TEXT,
    last_user_id TEXT
);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_cards_board ON cards(board_id);
CREATE INDEX IF NOT EXISTS idx_cards_deleted ON cards(deleted_at);
CREATE INDEX IF NOT EXISTS idx_snapshots_board ON snapshots(board_id, episode_number);
"#;

/// Initialize sync state if not exists.
pub const INIT_SYNC_STATE: &str = r#"
INSERT OR IGNORE INTO sync_state (id) VALUES (1);
"#;
