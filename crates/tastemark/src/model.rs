//! Core domain types for tastemark.
//!
//! Venues (restaurants and stores), their reviews, and users, together with the
//! request payloads that create or change them. Payload validation lives here so
//! every entry point reports the same client errors.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Lowest accepted rating or price range.
pub const MIN_SCORE: i64 = 1;

/// Highest accepted rating or price range.
pub const MAX_SCORE: i64 = 5;

/// The kind of venue a row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueKind {
    /// A restaurant.
    Restaurant,
    /// A store.
    Store,
}

impl VenueKind {
    /// All venue kinds, in route registration order.
    pub const ALL: [VenueKind; 2] = [Self::Restaurant, Self::Store];

    /// Value stored in the `kind` column.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restaurant => "restaurant",
            Self::Store => "store",
        }
    }

    /// Path segment under `/api`.
    #[must_use]
    pub fn collection(self) -> &'static str {
        match self {
            Self::Restaurant => "restaurants",
            Self::Store => "stores",
        }
    }

    /// JSON key holding the rating summaries in list responses.
    #[must_use]
    pub fn ratings_key(self) -> &'static str {
        match self {
            Self::Restaurant => "restaurantRatings",
            Self::Store => "storeRatings",
        }
    }

    /// Name of the id path parameter, used in client error messages.
    #[must_use]
    pub fn id_label(self) -> &'static str {
        match self {
            Self::Restaurant => "restaurantId",
            Self::Store => "storeId",
        }
    }
}

impl fmt::Display for VenueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VenueKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "restaurant" => Ok(Self::Restaurant),
            "store" => Ok(Self::Store),
            other => Err(Error::internal(format!("unknown venue kind: {other}"))),
        }
    }
}

/// A restaurant or store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    /// Row id.
    pub id: i64,
    /// Restaurant or store.
    pub kind: VenueKind,
    /// Display name.
    pub name: String,
    /// Free-form location.
    pub location: String,
    /// Price range from 1 (cheap) to 5 (expensive).
    pub price_range: i64,
    /// Username of the author, if the venue was created by a signed-in user.
    pub created_by: Option<String>,
    /// When the venue was created.
    pub created_at: DateTime<Utc>,
}

/// A venue with its aggregated review statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueRating {
    /// The venue itself.
    #[serde(flatten)]
    pub venue: Venue,
    /// Number of reviews.
    pub count: i64,
    /// Mean rating truncated to one decimal place; `None` without reviews.
    pub average_rating: Option<f64>,
}

/// Truncate an average rating to one decimal place.
///
/// Truncation, not rounding: 4.66 becomes 4.6.
#[must_use]
pub fn truncate_rating(average: f64) -> f64 {
    (average * 10.0).trunc() / 10.0
}

/// A review left on a venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Row id.
    pub id: i64,
    /// Id of the reviewed venue.
    pub parent_id: i64,
    /// Reviewer display name.
    pub name: String,
    /// Review body.
    pub text: String,
    /// Rating from 1 to 5.
    pub rating: i64,
    /// When the review was written.
    pub created_at: DateTime<Utc>,
}

/// A registered user. The password hash never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Row id.
    pub user_id: i64,
    /// Unique login name.
    pub username: String,
    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub hashed_password: String,
    /// When the user signed up.
    pub created_at: DateTime<Utc>,
}

/// Body of a venue create or update request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueInput {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Free-form location.
    #[serde(default)]
    pub location: Option<String>,
    /// Price range, as a number or numeric string.
    #[serde(default, deserialize_with = "lenient_int")]
    pub price_range: Option<i64>,
}

/// A venue payload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidVenue {
    /// Trimmed display name.
    pub name: String,
    /// Trimmed location.
    pub location: String,
    /// Price range in `1..=5`.
    pub price_range: i64,
}

impl VenueInput {
    /// Check presence and range of every field.
    ///
    /// # Errors
    ///
    /// Returns a `400` client error describing the first problem found.
    pub fn validate(&self) -> Result<ValidVenue> {
        let (Some(name), Some(location), Some(price_range)) = (
            non_blank(self.name.as_deref()),
            non_blank(self.location.as_deref()),
            self.price_range.filter(|p| *p != 0),
        ) else {
            return Err(Error::bad_request(
                "name, location, and priceRange are required",
            ));
        };

        if !(MIN_SCORE..=MAX_SCORE).contains(&price_range) {
            return Err(Error::bad_request(
                "priceRange must be an integer from 1 to 5",
            ));
        }

        Ok(ValidVenue {
            name: name.to_string(),
            location: location.to_string(),
            price_range,
        })
    }
}

/// Body of a review create or update request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReviewInput {
    /// Reviewer display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Review body. Sent as `review` by the web client.
    #[serde(default, alias = "text")]
    pub review: Option<String>,
    /// Rating, as a number or numeric string.
    #[serde(default, deserialize_with = "lenient_int")]
    pub rating: Option<i64>,
}

/// A review payload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidReview {
    /// Trimmed reviewer name.
    pub name: String,
    /// Review body.
    pub text: String,
    /// Rating in `1..=5`.
    pub rating: i64,
}

impl ReviewInput {
    /// Check presence and range of every field.
    ///
    /// # Errors
    ///
    /// Returns a `400` client error describing the first problem found.
    pub fn validate(&self) -> Result<ValidReview> {
        let (Some(name), Some(text), Some(rating)) = (
            non_blank(self.name.as_deref()),
            non_blank(self.review.as_deref()),
            self.rating.filter(|r| *r != 0),
        ) else {
            return Err(Error::bad_request("name, review, and rating are required"));
        };

        if !(MIN_SCORE..=MAX_SCORE).contains(&rating) {
            return Err(Error::bad_request("rating must be an integer from 1 to 5"));
        }

        Ok(ValidReview {
            name: name.to_string(),
            text: text.to_string(),
            rating,
        })
    }
}

/// Username and password sent to the auth endpoints.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// Login name.
    #[serde(default)]
    pub username: Option<String>,
    /// Plain-text password.
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Return the trimmed username and the raw password.
    ///
    /// # Errors
    ///
    /// Returns a `400` client error if either is missing or blank.
    pub fn validate(&self) -> Result<(&str, &str)> {
        match (
            non_blank(self.username.as_deref()),
            self.password.as_deref().filter(|p| !p.is_empty()),
        ) {
            (Some(username), Some(password)) => Ok((username, password)),
            _ => Err(Error::bad_request("username and password are required")),
        }
    }
}

/// Parse a path segment as a positive row id.
///
/// # Errors
///
/// Returns a `400` client error naming `label` when `raw` is not a positive integer.
pub fn parse_id(raw: &str, label: &str) -> Result<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(Error::bad_request(format!(
            "{label} must be a positive integer"
        ))),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Accept an integer either as a JSON number or as a numeric string.
///
/// Anything else (fractions, words, booleans) deserializes to `None` so the
/// caller reports the field as missing instead of rejecting the whole body.
fn lenient_int<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
