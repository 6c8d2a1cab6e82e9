//! Account service
//!
//! Registration, profile edits and follow edges, with permission checks.

use chrono::Utc;

use super::views::UserView;
use crate::auth::{Identity, Permission, Role};
use crate::data::{AdminProfile, AuthorNameCache, PostRepository, User, UserRepository};
use crate::error::AppError;

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Account service
#[derive(Clone)]
pub struct AccountService {
    users: UserRepository,
    posts: PostRepository,
    author_cache: AuthorNameCache,
    admin_email: Option<String>,
}

impl AccountService {
    /// Create new account service
    ///
    /// # Arguments
    /// * `admin_email` - Registrations with this email get the admin role
    pub fn new(
        users: UserRepository,
        posts: PostRepository,
        author_cache: AuthorNameCache,
        admin_email: Option<String>,
    ) -> Self {
        Self {
            users,
            posts,
            author_cache,
            admin_email,
        }
    }

    /// Register a new account and return its id
    ///
    /// `password_hash` is stored as given; hashing happens before the core.
    ///
    /// # Errors
    /// `Validation` for empty name or email, `Conflict` when either is taken
    pub async fn register(
        &self,
        name: &str,
        password_hash: &str,
        email: &str,
    ) -> Result<u64, AppError> {
        require_text("name", name)?;
        require_text("email", email)?;

        let role = if self.admin_email.as_deref() == Some(email) {
            Role::Admin
        } else {
            Role::User
        };

        self.users.register(name, password_hash, email, role).await
    }

    /// Full record, for the authentication layer
    pub async fn find_by_email(&self, email: &str) -> Result<User, AppError> {
        self.users.get_by_email(email).await
    }

    pub async fn get(&self, id: u64) -> Result<UserView, AppError> {
        let user = self.users.get_by_id(id).await?;
        self.view(user).await
    }

    pub async fn get_by_name(&self, name: &str) -> Result<UserView, AppError> {
        let user = self.users.get_by_name(name).await?;
        self.view(user).await
    }

    async fn view(&self, user: User) -> Result<UserView, AppError> {
        let followers = self.users.followers_count(user.id).await?;
        let following = self.users.following_count(user.id).await?;
        let posts = self.posts.total_by_author(user.id).await?;
        Ok(UserView::new(user, followers, following, posts))
    }

    pub async fn change_password(
        &self,
        identity: &Identity,
        password_hash: &str,
    ) -> Result<(), AppError> {
        let user_id = identity.require_user()?;
        self.users.update_password(user_id, password_hash).await?;
        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    /// Mark the account as confirmed (email verification done upstream)
    pub async fn confirm(&self, user_id: u64) -> Result<(), AppError> {
        self.users.set_confirmed(user_id, true).await?;
        tracing::info!(user_id, "Account confirmed");
        Ok(())
    }

    /// Refresh `last_seen` of the caller
    pub async fn ping(&self, identity: &Identity) -> Result<(), AppError> {
        let user_id = identity.require_user()?;
        self.users.set_last_seen(user_id, Utc::now()).await
    }

    /// Edit the caller's own profile
    pub async fn update_profile(
        &self,
        identity: &Identity,
        name: &str,
        location: &str,
        about_me: &str,
    ) -> Result<(), AppError> {
        let user_id = identity.require_user()?;
        require_text("name", name)?;

        self.users
            .update_profile(user_id, name, location, about_me)
            .await?;
        self.author_cache.invalidate(user_id).await;
        Ok(())
    }

    /// Edit any account; requires `ADMINISTER`
    pub async fn update_admin_profile(
        &self,
        identity: &Identity,
        user_id: u64,
        profile: &AdminProfile,
    ) -> Result<(), AppError> {
        identity.require(Permission::ADMINISTER)?;
        require_text("name", &profile.name)?;
        require_text("email", &profile.email)?;

        self.users.update_admin_profile(user_id, profile).await?;
        self.author_cache.invalidate(user_id).await;
        Ok(())
    }

    /// Follow `name`. Following twice is a no-op.
    ///
    /// # Errors
    /// `Forbidden` without `FOLLOW`, `Validation` for self-follow, `NotFound`
    /// for an unknown name
    pub async fn follow(&self, identity: &Identity, name: &str) -> Result<(), AppError> {
        let follower_id = identity.require(Permission::FOLLOW)?;
        let followed = self.users.get_by_name(name).await?;
        if followed.id == follower_id {
            return Err(AppError::Validation("cannot follow yourself".to_string()));
        }

        if self.users.is_following(follower_id, followed.id).await? {
            tracing::debug!(follower_id, followed_id = followed.id, "Already following");
            return Ok(());
        }
        self.users.follow(follower_id, followed.id).await
    }

    /// Unfollow `name`. Unfollowing someone not followed is a no-op.
    pub async fn unfollow(&self, identity: &Identity, name: &str) -> Result<(), AppError> {
        let follower_id = identity.require(Permission::FOLLOW)?;
        let followed = self.users.get_by_name(name).await?;

        if !self.users.is_following(follower_id, followed.id).await? {
            tracing::debug!(follower_id, followed_id = followed.id, "Not following");
            return Ok(());
        }
        self.users.unfollow(follower_id, followed.id).await
    }

    pub async fn is_following(&self, follower_id: u64, followed_id: u64) -> Result<bool, AppError> {
        self.users.is_following(follower_id, followed_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::store::{MemoryStore, WriteMode};

    fn create_service() -> AccountService {
        let store = Arc::new(MemoryStore::new());
        AccountService::new(
            UserRepository::new(store.clone(), WriteMode::Sequential),
            PostRepository::new(store, WriteMode::Sequential),
            AuthorNameCache::new(100, Duration::from_secs(60)),
            Some("admin@example.com".to_string()),
        )
    }

    async fn identity(service: &AccountService, id: u64) -> Identity {
        let user = service.users.get_by_id(id).await.unwrap();
        Identity::for_user(&user)
    }

    #[tokio::test]
    async fn register_assigns_admin_role_by_email() {
        let service = create_service();
        let admin = service
            .register("root", "h", "admin@example.com")
            .await
            .unwrap();
        let user = service
            .register("alice", "h", "alice@example.com")
            .await
            .unwrap();

        assert_eq!(service.get(admin).await.unwrap().role, Role::Admin);
        assert_eq!(service.get(user).await.unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn register_rejects_blank_fields() {
        let service = create_service();
        assert!(matches!(
            service.register("  ", "h", "a@example.com").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.register("alice", "h", "").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn follow_checks_permission_and_skips_duplicates() {
        let service = create_service();
        let alice = service.register("alice", "h", "a@example.com").await.unwrap();
        let bob = service.register("bob", "h", "b@example.com").await.unwrap();
        let alice_identity = identity(&service, alice).await;

        assert!(matches!(
            service.follow(&Identity::anonymous(), "bob").await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            service.follow(&alice_identity, "alice").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.follow(&alice_identity, "carol").await,
            Err(AppError::NotFound)
        ));

        service.follow(&alice_identity, "bob").await.unwrap();
        service.follow(&alice_identity, "bob").await.unwrap();
        assert!(service.is_following(alice, bob).await.unwrap());

        let bob_view = service.get_by_name("bob").await.unwrap();
        assert_eq!(bob_view.followers_count, 1);
        assert_eq!(service.get(alice).await.unwrap().following_count, 1);

        service.unfollow(&alice_identity, "bob").await.unwrap();
        service.unfollow(&alice_identity, "bob").await.unwrap();
        assert!(!service.is_following(alice, bob).await.unwrap());
    }

    #[tokio::test]
    async fn profile_edits_refresh_author_cache() {
        let service = create_service();
        let alice = service.register("alice", "h", "a@example.com").await.unwrap();
        service.author_cache.insert(alice, "alice").await;

        let alice_identity = identity(&service, alice).await;
        service
            .update_profile(&alice_identity, "alicia", "Lisbon", "")
            .await
            .unwrap();

        assert!(service.author_cache.get(alice).await.is_none());
        assert_eq!(service.get(alice).await.unwrap().name, "alicia");
    }

    #[tokio::test]
    async fn admin_profile_requires_administer() {
        let service = create_service();
        let admin = service
            .register("root", "h", "admin@example.com")
            .await
            .unwrap();
        let alice = service.register("alice", "h", "a@example.com").await.unwrap();
        let admin_identity = identity(&service, admin).await;
        let alice_identity = identity(&service, alice).await;

        let mut profile = AdminProfile::from(&service.users.get_by_id(alice).await.unwrap());
        profile.role = Role::Moderator;

        assert!(matches!(
            service
                .update_admin_profile(&alice_identity, alice, &profile)
                .await,
            Err(AppError::Forbidden)
        ));

        service
            .update_admin_profile(&admin_identity, alice, &profile)
            .await
            .unwrap();
        assert_eq!(service.get(alice).await.unwrap().role, Role::Moderator);
    }

    #[tokio::test]
    async fn password_confirm_and_ping() {
        let service = create_service();
        let alice = service.register("alice", "h", "a@example.com").await.unwrap();
        let alice_identity = identity(&service, alice).await;
        let before = service.get(alice).await.unwrap().last_seen;

        service
            .change_password(&alice_identity, "h2")
            .await
            .unwrap();
        service.confirm(alice).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        service.ping(&alice_identity).await.unwrap();

        let user = service.find_by_email("a@example.com").await.unwrap();
        assert_eq!(user.password_hash, "h2");
        assert!(user.confirmed);
        assert!(user.last_seen > before);

        assert!(matches!(
            service.ping(&Identity::anonymous()).await,
            Err(AppError::Forbidden)
        ));
    }
}
