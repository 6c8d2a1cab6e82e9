//! Post service
//!
//! Publishing and editing with permission checks.

use super::views::{PostView, PostViews};
use crate::auth::{Identity, Permission};
use crate::data::{AuthorNameCache, Post, PostRepository, UserRepository};
use crate::error::AppError;

/// Post service
#[derive(Clone)]
pub struct PostService {
    posts: PostRepository,
    views: PostViews,
}

impl PostService {
    /// Create new post service
    pub fn new(
        users: UserRepository,
        posts: PostRepository,
        author_cache: AuthorNameCache,
    ) -> Self {
        Self {
            posts,
            views: PostViews::new(users, author_cache),
        }
    }

    /// Publish a post as the caller
    ///
    /// # Arguments
    /// * `html_content` - Already sanitized HTML
    ///
    /// # Errors
    /// `Forbidden` without `WRITE_ARTICLES`, `Validation` for an empty title
    pub async fn publish(
        &self,
        identity: &Identity,
        title: &str,
        html_content: &str,
        category: &str,
    ) -> Result<u64, AppError> {
        let author_id = identity.require(Permission::WRITE_ARTICLES)?;
        if title.trim().is_empty() {
            return Err(AppError::Validation("title cannot be empty".to_string()));
        }

        self.posts
            .publish(title, author_id, html_content, category)
            .await
    }

    pub async fn get(&self, post_id: u64) -> Result<PostView, AppError> {
        let post = self.posts.get(post_id).await?;
        self.views.compose(post).await
    }

    /// Replace the content; author or administrator only
    pub async fn edit_content(
        &self,
        identity: &Identity,
        post_id: u64,
        html_content: &str,
    ) -> Result<(), AppError> {
        let post = self.posts.get(post_id).await?;
        authorize(identity, &post)?;
        self.posts.update_content(post_id, html_content).await
    }

    /// Replace the category; author or administrator only
    pub async fn edit_category(
        &self,
        identity: &Identity,
        post_id: u64,
        category: &str,
    ) -> Result<(), AppError> {
        let post = self.posts.get(post_id).await?;
        authorize(identity, &post)?;
        self.posts.update_category(post_id, category).await
    }

    /// Soft-delete; author or administrator only
    pub async fn delete(&self, identity: &Identity, post_id: u64) -> Result<(), AppError> {
        let post = self.posts.get(post_id).await?;
        authorize(identity, &post)?;
        self.posts.delete(post_id).await
    }
}

fn authorize(identity: &Identity, post: &Post) -> Result<(), AppError> {
    let user_id = identity.require_user()?;
    if user_id == post.author_id || identity.is_administrator() {
        Ok(())
    } else {
        tracing::debug!(user_id, post_id = post.id, "Post edit refused");
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::auth::Role;
    use crate::store::{MemoryStore, WriteMode};

    struct Fixture {
        service: PostService,
        users: UserRepository,
        posts: PostRepository,
    }

    fn create_fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let users = UserRepository::new(store.clone(), WriteMode::Sequential);
        let posts = PostRepository::new(store, WriteMode::Sequential);
        let service = PostService::new(
            users.clone(),
            posts.clone(),
            AuthorNameCache::new(100, Duration::from_secs(60)),
        );
        Fixture {
            service,
            users,
            posts,
        }
    }

    async fn register(fixture: &Fixture, name: &str, role: Role) -> Identity {
        let id = fixture
            .users
            .register(name, "h", &format!("{name}@example.com"), role)
            .await
            .unwrap();
        Identity::new(id, role.permissions())
    }

    #[tokio::test]
    async fn publish_requires_write_articles() {
        let fixture = create_fixture();
        let alice = register(&fixture, "alice", Role::User).await;

        assert!(matches!(
            fixture
                .service
                .publish(&Identity::anonymous(), "Hello", "<p>hi</p>", "")
                .await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            fixture.service.publish(&alice, " ", "<p>hi</p>", "").await,
            Err(AppError::Validation(_))
        ));

        let id = fixture
            .service
            .publish(&alice, "Hello", "<p>hi</p>", "misc")
            .await
            .unwrap();
        let view = fixture.service.get(id).await.unwrap();
        assert_eq!(view.title, "Hello");
        assert_eq!(view.author_name, "alice");
    }

    #[tokio::test]
    async fn only_author_or_admin_may_edit() {
        let fixture = create_fixture();
        let alice = register(&fixture, "alice", Role::User).await;
        let bob = register(&fixture, "bob", Role::Moderator).await;
        let root = register(&fixture, "root", Role::Admin).await;

        let id = fixture
            .service
            .publish(&alice, "Hello", "<p>v1</p>", "")
            .await
            .unwrap();

        assert!(matches!(
            fixture.service.edit_content(&bob, id, "<p>x</p>").await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            fixture.service.delete(&bob, id).await,
            Err(AppError::Forbidden)
        ));

        fixture
            .service
            .edit_content(&alice, id, "<p>v2</p>")
            .await
            .unwrap();
        fixture
            .service
            .edit_category(&root, id, "rust")
            .await
            .unwrap();

        let view = fixture.service.get(id).await.unwrap();
        assert_eq!(view.content, "<p>v2</p>");
        assert_eq!(view.category, "rust");

        fixture.service.delete(&root, id).await.unwrap();
        assert!(fixture.posts.is_deleted(id).await.unwrap());
    }

    #[tokio::test]
    async fn missing_author_is_not_found() {
        let fixture = create_fixture();
        let id = fixture.posts.publish("Orphan", 42, "", "").await.unwrap();

        assert!(matches!(
            fixture.service.get(id).await,
            Err(AppError::NotFound)
        ));
    }
}
