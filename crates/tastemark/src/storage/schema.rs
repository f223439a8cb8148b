//! `SQLite` schema definitions for tastemark.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the venues table.
///
/// Restaurants and stores share one table, told apart by `kind`.
pub const CREATE_VENUES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS venues (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL CHECK (kind IN ('restaurant', 'store')),
    name TEXT NOT NULL,
    location TEXT NOT NULL,
    price_range INTEGER NOT NULL CHECK (price_range BETWEEN 1 AND 5),
    created_by TEXT,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the reviews table.
pub const CREATE_REVIEWS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    venue_id INTEGER NOT NULL REFERENCES venues(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    text TEXT NOT NULL,
    rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the users table.
pub const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    hashed_password TEXT NOT NULL,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create an index on `kind` for list queries.
pub const CREATE_KIND_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_venues_kind ON venues(kind)
";

/// SQL statement to create an index on `venue_id` for review lookups.
pub const CREATE_REVIEW_VENUE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_reviews_venue ON reviews(venue_id)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_VENUES_TABLE,
    CREATE_REVIEWS_TABLE,
    CREATE_USERS_TABLE,
    CREATE_KIND_INDEX,
    CREATE_REVIEW_VENUE_INDEX,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.trim().is_empty());
        }
    }

    #[test]
    fn test_reviews_reference_venues() {
        assert!(CREATE_REVIEWS_TABLE.contains("REFERENCES venues(id) ON DELETE CASCADE"));
        assert!(CREATE_REVIEWS_TABLE.contains("rating BETWEEN 1 AND 5"));
    }

    #[test]
    fn test_usernames_unique() {
        assert!(CREATE_USERS_TABLE.contains("username TEXT NOT NULL UNIQUE"));
    }
}
