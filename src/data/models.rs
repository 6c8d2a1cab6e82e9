//! Data models
//!
//! Typed records decoded from, and encoded to, the flat string fields of a
//! hash. Field names are part of the storage format.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::auth::{Permission, Role, has_permission};
use crate::error::AppError;
use crate::store::FieldMap;

/// Hash field names of `user:<id>`
pub(crate) mod user_fields {
    pub const NAME: &str = "name";
    pub const PASSWORD: &str = "password";
    pub const EMAIL: &str = "email";
    pub const ROLE_ID: &str = "role_id";
    pub const CONFIRMED: &str = "confirmed";
    pub const LOCATION: &str = "location";
    pub const ABOUT_ME: &str = "about_me";
    pub const MEMBER_SINCE: &str = "member_since";
    pub const LAST_SEEN: &str = "last_seen";
}

/// Hash field names of `post:<id>`
pub(crate) mod post_fields {
    pub const POST_ID: &str = "post_id";
    pub const TITLE: &str = "title";
    pub const AUTHOR_ID: &str = "author_id";
    pub const CONTENT: &str = "content";
    pub const CATEGORY: &str = "category";
    pub const TIME: &str = "time";
}

// =============================================================================
// Field codecs
// =============================================================================

/// Storage format of timestamps (UTC, microseconds)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn encode_bool(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

/// Typed read access to one hash
struct Fields<'a> {
    key: &'a str,
    map: &'a FieldMap,
}

impl<'a> Fields<'a> {
    fn new(key: &'a str, map: &'a FieldMap) -> Self {
        Self { key, map }
    }

    fn raw(&self, field: &str) -> Option<&'a str> {
        self.map.get(field).map(String::as_str)
    }

    /// Absent text decodes to the empty string.
    fn text(&self, field: &str) -> String {
        self.raw(field).unwrap_or_default().to_string()
    }

    fn id(&self, field: &'static str) -> Result<u64, AppError> {
        let raw = self
            .raw(field)
            .ok_or_else(|| AppError::decode(self.key, field, "missing"))?;
        raw.trim()
            .parse::<u64>()
            .map_err(|e| AppError::decode(self.key, field, e))
    }

    fn flag(&self, field: &'static str) -> Result<bool, AppError> {
        match self.raw(field).map(str::trim) {
            None | Some("") | Some("0") | Some("false") | Some("False") => Ok(false),
            Some("1") | Some("true") | Some("True") => Ok(true),
            Some(other) => Err(AppError::decode(
                self.key,
                field,
                format!("`{other}` is not a boolean"),
            )),
        }
    }

    /// Absent, empty or `None` decodes to unset.
    fn timestamp(&self, field: &'static str) -> Result<Option<DateTime<Utc>>, AppError> {
        let raw = match self.raw(field).map(str::trim) {
            None | Some("") | Some("None") => return Ok(None),
            Some(raw) => raw,
        };

        for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Ok(Some(naive.and_utc()));
            }
        }

        DateTime::parse_from_rfc3339(raw)
            .map(|at| Some(at.with_timezone(&Utc)))
            .map_err(|e| AppError::decode(self.key, field, e))
    }

    fn role(&self, field: &'static str) -> Result<Role, AppError> {
        match self.raw(field).map(str::trim) {
            None | Some("") => Ok(Role::Anonymous),
            Some(raw) => raw
                .parse::<u8>()
                .map(Role::from_id)
                .map_err(|e| AppError::decode(self.key, field, e)),
        }
    }
}

// =============================================================================
// User
// =============================================================================

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub role: Role,
    pub confirmed: bool,
    pub location: String,
    pub about_me: String,
    pub member_since: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl User {
    /// Decode the hash stored under `key`.
    pub(crate) fn decode(id: u64, key: &str, map: &FieldMap) -> Result<Self, AppError> {
        use user_fields::*;

        let fields = Fields::new(key, map);
        Ok(Self {
            id,
            name: fields.text(NAME),
            password_hash: fields.text(PASSWORD),
            email: fields.text(EMAIL),
            role: fields.role(ROLE_ID)?,
            confirmed: fields.flag(CONFIRMED)?,
            location: fields.text(LOCATION),
            about_me: fields.text(ABOUT_ME),
            member_since: fields.timestamp(MEMBER_SINCE)?,
            last_seen: fields.timestamp(LAST_SEEN)?,
        })
    }

    /// Every stored field. Unset timestamps are written as empty strings.
    pub(crate) fn encode(&self) -> FieldMap {
        use user_fields::*;

        let timestamp = |at: Option<DateTime<Utc>>| at.map(encode_timestamp).unwrap_or_default();
        FieldMap::from([
            (NAME.to_string(), self.name.clone()),
            (PASSWORD.to_string(), self.password_hash.clone()),
            (EMAIL.to_string(), self.email.clone()),
            (ROLE_ID.to_string(), self.role.id().to_string()),
            (CONFIRMED.to_string(), encode_bool(self.confirmed)),
            (LOCATION.to_string(), self.location.clone()),
            (ABOUT_ME.to_string(), self.about_me.clone()),
            (MEMBER_SINCE.to_string(), timestamp(self.member_since)),
            (LAST_SEEN.to_string(), timestamp(self.last_seen)),
        ])
    }

    pub fn permissions(&self) -> Permission {
        self.role.permissions()
    }

    pub fn can(&self, flag: Permission) -> bool {
        has_permission(self.permissions(), flag)
    }

    pub fn is_administrator(&self) -> bool {
        self.can(Permission::ADMINISTER)
    }
}

/// Fields an administrator may overwrite on any account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminProfile {
    pub name: String,
    pub email: String,
    pub confirmed: bool,
    pub role: Role,
    pub location: String,
    pub about_me: String,
}

impl AdminProfile {
    pub(crate) fn encode(&self) -> FieldMap {
        use user_fields::*;

        FieldMap::from([
            (NAME.to_string(), self.name.clone()),
            (EMAIL.to_string(), self.email.clone()),
            (CONFIRMED.to_string(), encode_bool(self.confirmed)),
            (ROLE_ID.to_string(), self.role.id().to_string()),
            (LOCATION.to_string(), self.location.clone()),
            (ABOUT_ME.to_string(), self.about_me.clone()),
        ])
    }
}

impl From<&User> for AdminProfile {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            confirmed: user.confirmed,
            role: user.role,
            location: user.location.clone(),
            about_me: user.about_me.clone(),
        }
    }
}

// =============================================================================
// Post
// =============================================================================

/// A published post
///
/// `content` is HTML that was sanitized before it reached the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub author_id: u64,
    pub content: String,
    pub category: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Post {
    pub(crate) fn decode(id: u64, key: &str, map: &FieldMap) -> Result<Self, AppError> {
        use post_fields::*;

        let fields = Fields::new(key, map);
        Ok(Self {
            id,
            title: fields.text(TITLE),
            author_id: fields.id(AUTHOR_ID)?,
            content: fields.text(CONTENT),
            category: fields.text(CATEGORY),
            created_at: fields.timestamp(TIME)?,
        })
    }

    pub(crate) fn encode(&self) -> FieldMap {
        use post_fields::*;

        FieldMap::from([
            (POST_ID.to_string(), self.id.to_string()),
            (TITLE.to_string(), self.title.clone()),
            (AUTHOR_ID.to_string(), self.author_id.to_string()),
            (CONTENT.to_string(), self.content.clone()),
            (CATEGORY.to_string(), self.category.clone()),
            (
                TIME.to_string(),
                self.created_at.map(encode_timestamp).unwrap_or_default(),
            ),
        ])
    }
}
