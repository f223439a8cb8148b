//! `tastemark` - A review server for restaurants and stores
//!
//! This library provides the storage, authentication and HTTP layers behind
//! the `tastemark` binary: venues with reviews and rating summaries, user
//! accounts with signed bearer tokens, and a JSON API over both.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod storage;

pub use api::{app, router, AppState};
pub use auth::{Claims, TokenIssuer};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{Review, User, Venue, VenueKind, VenueRating};
pub use storage::{Storage, StorageStats};
