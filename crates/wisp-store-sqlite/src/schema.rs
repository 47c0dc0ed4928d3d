//! SQL schema for the Wisp SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS items (
    item_id            TEXT PRIMARY KEY,
    owner_id           TEXT NOT NULL,
    recipients         TEXT NOT NULL DEFAULT '[]', -- JSON array of identities
    created_at         TEXT NOT NULL,              -- fixed-width RFC 3339 UTC
    mode               TEXT NOT NULL,              -- 'ephemeral' | 'story'
    policy             TEXT NOT NULL,              -- JSON-encoded Policy
    max_views          INTEGER,                    -- NULL when unlimited
    state              TEXT NOT NULL,              -- 'sent' | 'delivered' | 'viewed' | 'expired'
    viewed_by          TEXT NOT NULL DEFAULT '{}', -- JSON map viewer -> first view
    view_count         INTEGER NOT NULL DEFAULT 0,
    expires_at         TEXT,                       -- NULL until first ephemeral view
    pending_recipients INTEGER NOT NULL,           -- recipients yet to view
    version            INTEGER NOT NULL DEFAULT 0  -- bumped on every write
);

CREATE INDEX IF NOT EXISTS items_expires_idx ON items(expires_at);
CREATE INDEX IF NOT EXISTS items_created_idx ON items(mode, created_at);
CREATE INDEX IF NOT EXISTS items_state_idx   ON items(state);

PRAGMA user_version = 1;
";
