//! Data layer module
//!
//! Repositories over the key-value store:
//! - User records, lookup maps and follow edges
//! - Post records and the feed lists
//! - Author name cache (volatile)

mod cache;
mod ids;
pub mod keys;
mod models;
mod posts;
mod users;

pub use cache::AuthorNameCache;
pub use models::{AdminProfile, Post, TIMESTAMP_FORMAT, User, encode_timestamp};
pub use posts::PostRepository;
pub use users::UserRepository;
