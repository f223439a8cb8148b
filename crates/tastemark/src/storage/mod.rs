//! Storage layer for tastemark.
//!
//! This module provides `SQLite`-based persistent storage for venues, reviews
//! and users. Every operation is a single parameterized statement; writes use
//! `RETURNING` so callers get the affected row back without a second query.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{
    truncate_rating, Review, User, ValidReview, ValidVenue, Venue, VenueKind, VenueRating,
};

/// Columns selected for every venue row, in `row_to_venue` order.
const VENUE_COLUMNS: &str = "id, kind, name, location, price_range, created_by, created_at";

/// Columns selected for every review row, in `row_to_review` order.
const REVIEW_COLUMNS: &str = "id, venue_id, name, text, rating, created_at";

/// Columns selected for every user row, in `row_to_user` order.
const USER_COLUMNS: &str = "id, username, hashed_password, created_at";

/// Storage engine for venues, reviews and users.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::prepare(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        Self::prepare(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    fn prepare(conn: &Connection) -> Result<()> {
        // Reviews are removed together with their venue
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(conn)
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // === Venues ===

    /// List every venue of one kind with its review count and average rating.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_venue_ratings(&self, kind: VenueKind) -> Result<Vec<VenueRating>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT v.id, v.kind, v.name, v.location, v.price_range, v.created_by, v.created_at,
                   COUNT(r.id), AVG(r.rating)
            FROM venues v
            LEFT JOIN reviews r ON r.venue_id = v.id
            WHERE v.kind = ?1
            GROUP BY v.id
            ORDER BY v.id
            ",
        )?;

        let ratings = stmt
            .query_map([kind.as_str()], |row| {
                let venue = Self::row_to_venue(row)?;
                let count: i64 = row.get(7)?;
                let average: Option<f64> = row.get(8)?;
                Ok(VenueRating {
                    venue,
                    count,
                    average_rating: average.map(truncate_rating),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("Listed {} {} ratings", ratings.len(), kind);
        Ok(ratings)
    }

    /// Get a venue of the given kind by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_venue(&self, kind: VenueKind, id: i64) -> Result<Option<Venue>> {
        let venue = self
            .conn
            .query_row(
                &format!("SELECT {VENUE_COLUMNS} FROM venues WHERE id = ?1 AND kind = ?2"),
                params![id, kind.as_str()],
                Self::row_to_venue,
            )
            .optional()?;
        Ok(venue)
    }

    /// Insert a venue and return the stored row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn create_venue(
        &self,
        kind: VenueKind,
        venue: &ValidVenue,
        created_by: Option<&str>,
    ) -> Result<Venue> {
        let created = self.conn.query_row(
            &format!(
                r"
                INSERT INTO venues (kind, name, location, price_range, created_by, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                RETURNING {VENUE_COLUMNS}
                "
            ),
            params![
                kind.as_str(),
                venue.name,
                venue.location,
                venue.price_range,
                created_by,
                Utc::now().to_rfc3339(),
            ],
            Self::row_to_venue,
        )?;

        debug!("Inserted {} with id {}", kind, created.id);
        Ok(created)
    }

    /// Replace the editable fields of a venue.
    ///
    /// Returns `None` if no venue of that kind has the id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn update_venue(
        &self,
        kind: VenueKind,
        id: i64,
        venue: &ValidVenue,
    ) -> Result<Option<Venue>> {
        let updated = self
            .conn
            .query_row(
                &format!(
                    r"
                    UPDATE venues SET name = ?1, location = ?2, price_range = ?3
                    WHERE id = ?4 AND kind = ?5
                    RETURNING {VENUE_COLUMNS}
                    "
                ),
                params![venue.name, venue.location, venue.price_range, id, kind.as_str()],
                Self::row_to_venue,
            )
            .optional()?;
        Ok(updated)
    }

    /// Delete a venue and its reviews.
    ///
    /// Returns the deleted row, or `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_venue(&self, kind: VenueKind, id: i64) -> Result<Option<Venue>> {
        let deleted = self
            .conn
            .query_row(
                &format!("DELETE FROM venues WHERE id = ?1 AND kind = ?2 RETURNING {VENUE_COLUMNS}"),
                params![id, kind.as_str()],
                Self::row_to_venue,
            )
            .optional()?;

        if let Some(venue) = &deleted {
            info!("Deleted {} {} ({})", kind, venue.id, venue.name);
        }
        Ok(deleted)
    }

    // === Reviews ===

    /// List the reviews of a venue, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_reviews(&self, venue_id: i64) -> Result<Vec<Review>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE venue_id = ?1 ORDER BY id"
        ))?;

        let reviews = stmt
            .query_map([venue_id], Self::row_to_review)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(reviews)
    }

    /// Get a review by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_review(&self, id: i64) -> Result<Option<Review>> {
        let review = self
            .conn
            .query_row(
                &format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = ?1"),
                [id],
                Self::row_to_review,
            )
            .optional()?;
        Ok(review)
    }

    /// Insert a review on an existing venue.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails, including when the
    /// venue does not exist.
    pub fn create_review(&self, venue_id: i64, review: &ValidReview) -> Result<Review> {
        let created = self.conn.query_row(
            &format!(
                r"
                INSERT INTO reviews (venue_id, name, text, rating, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                RETURNING {REVIEW_COLUMNS}
                "
            ),
            params![
                venue_id,
                review.name,
                review.text,
                review.rating,
                Utc::now().to_rfc3339(),
            ],
            Self::row_to_review,
        )?;

        debug!("Inserted review {} on venue {}", created.id, venue_id);
        Ok(created)
    }

    /// Replace the editable fields of a review.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn update_review(&self, id: i64, review: &ValidReview) -> Result<Option<Review>> {
        let updated = self
            .conn
            .query_row(
                &format!(
                    r"
                    UPDATE reviews SET name = ?1, text = ?2, rating = ?3
                    WHERE id = ?4
                    RETURNING {REVIEW_COLUMNS}
                    "
                ),
                params![review.name, review.text, review.rating, id],
                Self::row_to_review,
            )
            .optional()?;
        Ok(updated)
    }

    /// Delete a review by id, returning the deleted row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_review(&self, id: i64) -> Result<Option<Review>> {
        let deleted = self
            .conn
            .query_row(
                &format!("DELETE FROM reviews WHERE id = ?1 RETURNING {REVIEW_COLUMNS}"),
                [id],
                Self::row_to_review,
            )
            .optional()?;
        Ok(deleted)
    }

    // === Users ===

    /// Insert a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails. A taken username
    /// surfaces as a unique-constraint violation
    /// (see [`Error::is_unique_violation`]).
    pub fn create_user(&self, username: &str, hashed_password: &str) -> Result<User> {
        let user = self.conn.query_row(
            &format!(
                r"
                INSERT INTO users (username, hashed_password, created_at)
                VALUES (?1, ?2, ?3)
                RETURNING {USER_COLUMNS}
                "
            ),
            params![username, hashed_password, Utc::now().to_rfc3339()],
            Self::row_to_user,
        )?;

        info!("Registered user {}", user.username);
        Ok(user)
    }

    /// Look up a user by username.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                [username],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    // === Maintenance ===

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let count_kind = |kind: VenueKind| -> Result<i64> {
            Ok(self.conn.query_row(
                "SELECT COUNT(*) FROM venues WHERE kind = ?1",
                [kind.as_str()],
                |row| row.get(0),
            )?)
        };

        let restaurants = count_kind(VenueKind::Restaurant)?;
        let stores = count_kind(VenueKind::Store)?;
        let reviews: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))?;
        let users: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            restaurants,
            stores,
            reviews,
            users,
            db_size_bytes,
        })
    }

    // === Row mapping ===

    fn row_to_venue(row: &rusqlite::Row) -> rusqlite::Result<Venue> {
        let kind_str: String = row.get(1)?;
        let kind = kind_str.parse::<VenueKind>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
        })?;
        let created_at: String = row.get(6)?;

        Ok(Venue {
            id: row.get(0)?,
            kind,
            name: row.get(2)?,
            location: row.get(3)?,
            price_range: row.get(4)?,
            created_by: row.get(5)?,
            created_at: parse_timestamp(&created_at),
        })
    }

    fn row_to_review(row: &rusqlite::Row) -> rusqlite::Result<Review> {
        let created_at: String = row.get(5)?;

        Ok(Review {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            name: row.get(2)?,
            text: row.get(3)?,
            rating: row.get(4)?,
            created_at: parse_timestamp(&created_at),
        })
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let created_at: String = row.get(3)?;

        Ok(User {
            user_id: row.get(0)?,
            username: row.get(1)?,
            hashed_password: row.get(2)?,
            created_at: parse_timestamp(&created_at),
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).map_or_else(
        |_| {
            warn!("Unparseable timestamp {value}, using current time");
            Utc::now()
        },
        |dt| dt.with_timezone(&Utc),
    )
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Number of restaurants.
    pub restaurants: i64,
    /// Number of stores.
    pub stores: i64,
    /// Number of reviews across all venues.
    pub reviews: i64,
    /// Number of registered users.
    pub users: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
