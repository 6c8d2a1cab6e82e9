//! User repository
//!
//! Layout:
//! - `user:<id>` hash with the record fields
//! - `name.to.id` / `email.to.id` hashes as the only uniqueness guard
//! - `user:following:<id>` / `user:follower:<id>` lists for follow edges
//!
//! Composite writes (register, renames, follow, unfollow) issue several store
//! calls. Under [`WriteMode::Sequential`] a failure between them leaves a
//! partial write behind (for example a one-sided follow edge); use
//! [`WriteMode::Atomic`] when that matters.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::ids::{contains_id, next_id, page_of_ids, parse_id, submit};
use super::keys;
use super::models::{AdminProfile, User, encode_bool, encode_timestamp, user_fields};
use crate::auth::Role;
use crate::error::AppError;
use crate::store::{Batch, FieldMap, KeyValueStore, WriteMode};

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn KeyValueStore>,
    write_mode: WriteMode,
}

impl UserRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, write_mode: WriteMode) -> Self {
        Self { store, write_mode }
    }

    // =========================================================================
    // Registration and lookups
    // =========================================================================

    /// Register a new user and return its id
    ///
    /// The record starts unconfirmed with empty profile text, and both
    /// `member_since` and `last_seen` set to now.
    ///
    /// # Errors
    /// `Conflict` if the name or email is already registered. The check runs
    /// before the id is allocated but is not atomic with the write.
    pub async fn register(
        &self,
        name: &str,
        password_hash: &str,
        email: &str,
        role: Role,
    ) -> Result<u64, AppError> {
        if self.is_name_registered(name).await? {
            return Err(AppError::Conflict(format!(
                "name `{name}` is already registered"
            )));
        }
        if self.is_email_registered(email).await? {
            return Err(AppError::Conflict(format!(
                "email `{email}` is already registered"
            )));
        }

        let id = next_id(self.store.as_ref(), keys::USERS_COUNT).await?;
        let now = Utc::now();
        let user = User {
            id,
            name: name.to_string(),
            password_hash: password_hash.to_string(),
            email: email.to_string(),
            role,
            confirmed: false,
            location: String::new(),
            about_me: String::new(),
            member_since: Some(now),
            last_seen: Some(now),
        };

        let mut batch = Batch::new();
        batch
            .hash_set_many(keys::user(id), user.encode())
            .hash_set(keys::EMAIL_TO_ID, email, id.to_string())
            .hash_set(keys::NAME_TO_ID, name, id.to_string());
        self.submit("register", batch).await?;

        tracing::info!(user_id = id, name, role = ?role, "User registered");
        Ok(id)
    }

    pub async fn is_name_registered(&self, name: &str) -> Result<bool, AppError> {
        Ok(self.store.hash_exists(keys::NAME_TO_ID, name).await?)
    }

    pub async fn is_email_registered(&self, email: &str) -> Result<bool, AppError> {
        Ok(self.store.hash_exists(keys::EMAIL_TO_ID, email).await?)
    }

    pub async fn get_by_id(&self, id: u64) -> Result<User, AppError> {
        let key = keys::user(id);
        let fields = self.store.hash_get_all(&key).await?;
        if fields.is_empty() {
            tracing::debug!(user_id = id, "User not found");
            return Err(AppError::NotFound);
        }
        User::decode(id, &key, &fields)
    }

    pub async fn get_by_name(&self, name: &str) -> Result<User, AppError> {
        let id = self.resolve(keys::NAME_TO_ID, name).await?;
        self.get_by_id(id).await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User, AppError> {
        let id = self.resolve(keys::EMAIL_TO_ID, email).await?;
        self.get_by_id(id).await
    }

    async fn resolve(&self, lookup: &str, value: &str) -> Result<u64, AppError> {
        match self.store.hash_get(lookup, value).await? {
            Some(raw) => parse_id(lookup, &raw),
            None => Err(AppError::NotFound),
        }
    }

    // =========================================================================
    // Field updates
    // =========================================================================

    pub async fn update_password(&self, id: u64, password_hash: &str) -> Result<(), AppError> {
        self.set_field(id, user_fields::PASSWORD, password_hash).await
    }

    pub async fn set_confirmed(&self, id: u64, confirmed: bool) -> Result<(), AppError> {
        self.set_field(id, user_fields::CONFIRMED, &encode_bool(confirmed))
            .await
    }

    pub async fn set_last_seen(&self, id: u64, at: DateTime<Utc>) -> Result<(), AppError> {
        self.set_field(id, user_fields::LAST_SEEN, &encode_timestamp(at))
            .await
    }

    /// Overwrite name, location and about-me.
    ///
    /// A changed name moves the `name.to.id` entry along with it.
    pub async fn update_profile(
        &self,
        id: u64,
        name: &str,
        location: &str,
        about_me: &str,
    ) -> Result<(), AppError> {
        let current = self.get_by_id(id).await?;

        let mut batch = Batch::new();
        batch.hash_set_many(
            keys::user(id),
            FieldMap::from([
                (user_fields::NAME.to_string(), name.to_string()),
                (user_fields::LOCATION.to_string(), location.to_string()),
                (user_fields::ABOUT_ME.to_string(), about_me.to_string()),
            ]),
        );
        self.relink(&mut batch, keys::NAME_TO_ID, &current.name, name, id)
            .await?;
        self.submit("update_profile", batch).await?;

        tracing::info!(user_id = id, name, "Profile updated");
        Ok(())
    }

    /// Overwrite every administrator-editable field.
    ///
    /// Changed names and emails move their lookup entries along with them.
    pub async fn update_admin_profile(
        &self,
        id: u64,
        profile: &AdminProfile,
    ) -> Result<(), AppError> {
        let current = self.get_by_id(id).await?;

        let mut batch = Batch::new();
        batch.hash_set_many(keys::user(id), profile.encode());
        self.relink(&mut batch, keys::NAME_TO_ID, &current.name, &profile.name, id)
            .await?;
        self.relink(
            &mut batch,
            keys::EMAIL_TO_ID,
            &current.email,
            &profile.email,
            id,
        )
        .await?;
        self.submit("update_admin_profile", batch).await?;

        tracing::info!(
            user_id = id,
            name = %profile.name,
            role = ?profile.role,
            "Profile updated by administrator"
        );
        Ok(())
    }

    async fn set_field(&self, id: u64, field: &str, value: &str) -> Result<(), AppError> {
        let key = keys::user(id);
        if !self.store.hash_exists(&key, user_fields::NAME).await? {
            return Err(AppError::NotFound);
        }
        self.store.hash_set(&key, field, value).await?;
        tracing::debug!(user_id = id, field, "User field updated");
        Ok(())
    }

    /// Queue the lookup-map changes for `old -> new` owned by `id`.
    async fn relink(
        &self,
        batch: &mut Batch,
        lookup: &str,
        old: &str,
        new: &str,
        id: u64,
    ) -> Result<(), AppError> {
        if old == new {
            return Ok(());
        }

        if let Some(raw) = self.store.hash_get(lookup, new).await? {
            if parse_id(lookup, &raw)? != id {
                return Err(AppError::Conflict(format!(
                    "`{new}` is already registered in {lookup}"
                )));
            }
        }
        batch.hash_set(lookup, new, id.to_string());

        let old_owner = self.store.hash_get(lookup, old).await?;
        if old_owner.as_deref() == Some(id.to_string().as_str()) {
            batch.hash_delete(lookup, old);
        }
        Ok(())
    }

    // =========================================================================
    // Follow edges
    // =========================================================================

    /// Record that `follower_id` follows `followed_id`.
    ///
    /// Duplicates are not detected here; callers check [`Self::is_following`].
    pub async fn follow(&self, follower_id: u64, followed_id: u64) -> Result<(), AppError> {
        let mut batch = Batch::new();
        batch
            .list_push_front(keys::user_following(follower_id), followed_id.to_string())
            .list_push_front(keys::user_followers(followed_id), follower_id.to_string());
        self.submit("follow", batch).await?;

        tracing::info!(follower_id, followed_id, "Follow edge added");
        Ok(())
    }

    /// Remove every `follower_id -> followed_id` edge. Absent edges are a no-op.
    pub async fn unfollow(&self, follower_id: u64, followed_id: u64) -> Result<(), AppError> {
        let mut batch = Batch::new();
        batch
            .list_remove(
                keys::user_following(follower_id),
                followed_id.to_string(),
                0,
            )
            .list_remove(
                keys::user_followers(followed_id),
                follower_id.to_string(),
                0,
            );
        self.submit("unfollow", batch).await?;

        tracing::info!(follower_id, followed_id, "Follow edge removed");
        Ok(())
    }

    /// Scans the whole following list of `follower_id`.
    pub async fn is_following(&self, follower_id: u64, followed_id: u64) -> Result<bool, AppError> {
        contains_id(
            self.store.as_ref(),
            &keys::user_following(follower_id),
            followed_id,
        )
        .await
    }

    /// Whether `other_id` appears in the follower list of `user_id`.
    pub async fn is_followed_by(&self, user_id: u64, other_id: u64) -> Result<bool, AppError> {
        contains_id(self.store.as_ref(), &keys::user_followers(user_id), other_id).await
    }

    pub async fn followers_count(&self, id: u64) -> Result<u64, AppError> {
        Ok(self.store.list_length(&keys::user_followers(id)).await?)
    }

    pub async fn following_count(&self, id: u64) -> Result<u64, AppError> {
        Ok(self.store.list_length(&keys::user_following(id)).await?)
    }

    /// Follower ids of `id`, newest first.
    pub async fn followers_page(
        &self,
        id: u64,
        page: u64,
        per_page: u64,
    ) -> Result<Vec<u64>, AppError> {
        page_of_ids(self.store.as_ref(), &keys::user_followers(id), page, per_page).await
    }

    /// Ids that `id` follows, newest first.
    pub async fn following_page(
        &self,
        id: u64,
        page: u64,
        per_page: u64,
    ) -> Result<Vec<u64>, AppError> {
        page_of_ids(self.store.as_ref(), &keys::user_following(id), page, per_page).await
    }

    async fn submit(&self, action: &'static str, batch: Batch) -> Result<(), AppError> {
        submit(self.store.as_ref(), self.write_mode, action, batch).await
    }
}
