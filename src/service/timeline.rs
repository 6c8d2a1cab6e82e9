//! Timeline service
//!
//! Paged feeds and follow lists, composed into read models.

use super::views::{PostView, PostViews, UserSummary};
use crate::config::BlogConfig;
use crate::data::{AuthorNameCache, PostRepository, UserRepository};
use crate::error::AppError;
use crate::pagination::Pagination;

/// Timeline service
#[derive(Clone)]
pub struct TimelineService {
    users: UserRepository,
    posts: PostRepository,
    views: PostViews,
    posts_per_page: u64,
    follows_per_page: u64,
}

impl TimelineService {
    /// Create new timeline service
    pub fn new(
        users: UserRepository,
        posts: PostRepository,
        author_cache: AuthorNameCache,
        blog: &BlogConfig,
    ) -> Self {
        Self {
            views: PostViews::new(users.clone(), author_cache),
            users,
            posts,
            posts_per_page: blog.posts_per_page,
            follows_per_page: blog.followers_per_page,
        }
    }

    /// One page of the global feed, newest first
    pub async fn posts_page(&self, page: u64) -> Result<Pagination<PostView>, AppError> {
        let total = self.posts.total().await?;
        let ids = self.posts.page(page, self.posts_per_page).await?;
        let items = self.compose_posts(ids).await?;
        Ok(Pagination::new(page, self.posts_per_page, total, items))
    }

    /// One page of everything `name` published, newest first
    ///
    /// Soft-deleted posts stay in an author's feed.
    pub async fn author_posts_page(
        &self,
        name: &str,
        page: u64,
    ) -> Result<Pagination<PostView>, AppError> {
        let author = self.users.get_by_name(name).await?;
        let total = self.posts.total_by_author(author.id).await?;
        let ids = self
            .posts
            .author_page(author.id, page, self.posts_per_page)
            .await?;
        let items = self.compose_posts(ids).await?;
        Ok(Pagination::new(page, self.posts_per_page, total, items))
    }

    /// Users following `name`, most recent first
    pub async fn followers_page(
        &self,
        name: &str,
        page: u64,
    ) -> Result<Pagination<UserSummary>, AppError> {
        let user = self.users.get_by_name(name).await?;
        let total = self.users.followers_count(user.id).await?;
        let ids = self
            .users
            .followers_page(user.id, page, self.follows_per_page)
            .await?;
        let items = self.compose_users(ids).await?;
        Ok(Pagination::new(page, self.follows_per_page, total, items))
    }

    /// Users `name` follows, most recent first
    pub async fn following_page(
        &self,
        name: &str,
        page: u64,
    ) -> Result<Pagination<UserSummary>, AppError> {
        let user = self.users.get_by_name(name).await?;
        let total = self.users.following_count(user.id).await?;
        let ids = self
            .users
            .following_page(user.id, page, self.follows_per_page)
            .await?;
        let items = self.compose_users(ids).await?;
        Ok(Pagination::new(page, self.follows_per_page, total, items))
    }

    async fn compose_posts(&self, ids: Vec<u64>) -> Result<Vec<PostView>, AppError> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            let post = match self.posts.get(id).await {
                Ok(post) => post,
                Err(AppError::NotFound) => {
                    tracing::warn!(post_id = id, "Feed references a missing post, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };
            items.push(self.views.compose(post).await?);
        }
        Ok(items)
    }

    async fn compose_users(&self, ids: Vec<u64>) -> Result<Vec<UserSummary>, AppError> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            match self.users.get_by_id(id).await {
                Ok(user) => items.push(UserSummary::from(user)),
                Err(AppError::NotFound) => {
                    tracing::warn!(user_id = id, "Follow list references a missing user, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::auth::Role;
    use crate::store::{KeyValueStore, MemoryStore, WriteMode};

    struct Fixture {
        service: TimelineService,
        users: UserRepository,
        posts: PostRepository,
        store: Arc<MemoryStore>,
    }

    fn create_fixture(posts_per_page: u64, followers_per_page: u64) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let users = UserRepository::new(store.clone(), WriteMode::Sequential);
        let posts = PostRepository::new(store.clone(), WriteMode::Sequential);
        let blog = BlogConfig {
            posts_per_page,
            followers_per_page,
            admin_email: None,
        };
        let service = TimelineService::new(
            users.clone(),
            posts.clone(),
            AuthorNameCache::new(100, Duration::from_secs(60)),
            &blog,
        );
        Fixture {
            service,
            users,
            posts,
            store,
        }
    }

    #[tokio::test]
    async fn posts_page_composes_views() {
        let fixture = create_fixture(2, 50);
        let alice = fixture
            .users
            .register("alice", "h", "a@example.com", Role::User)
            .await
            .unwrap();
        for title in ["one", "two", "three"] {
            fixture.posts.publish(title, alice, "", "").await.unwrap();
        }

        let first = fixture.service.posts_page(1).await.unwrap();
        assert_eq!(first.total, 3);
        assert_eq!(first.pages, 2);
        assert!(first.has_next());
        let titles: Vec<&str> = first.items.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["three", "two"]);
        assert!(first.items.iter().all(|p| p.author_name == "alice"));

        let second = fixture.service.posts_page(2).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.prev_num(), Some(1));

        let beyond = fixture.service.posts_page(9).await.unwrap();
        assert!(beyond.items.is_empty());
    }

    #[tokio::test]
    async fn author_page_keeps_deleted_posts() {
        let fixture = create_fixture(10, 50);
        let alice = fixture
            .users
            .register("alice", "h", "a@example.com", Role::User)
            .await
            .unwrap();
        let id = fixture.posts.publish("Hello", alice, "", "").await.unwrap();
        fixture.posts.delete(id).await.unwrap();

        assert!(fixture.service.posts_page(1).await.unwrap().items.is_empty());
        let authored = fixture.service.author_posts_page("alice", 1).await.unwrap();
        assert_eq!(authored.total, 1);
        assert_eq!(authored.items[0].id, id);

        assert!(matches!(
            fixture.service.author_posts_page("nobody", 1).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn feed_skips_missing_records() {
        let fixture = create_fixture(10, 50);
        let alice = fixture
            .users
            .register("alice", "h", "a@example.com", Role::User)
            .await
            .unwrap();
        fixture.posts.publish("kept", alice, "", "").await.unwrap();
        fixture
            .store
            .list_push_front("posts:list", "99")
            .await
            .unwrap();

        let page = fixture.service.posts_page(1).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].title, "kept");
    }

    #[tokio::test]
    async fn follow_lists_page_newest_first() {
        let fixture = create_fixture(10, 2);
        let mut ids = Vec::new();
        for name in ["target", "a", "b", "c"] {
            let id = fixture
                .users
                .register(name, "h", &format!("{name}@example.com"), Role::User)
                .await
                .unwrap();
            ids.push(id);
        }
        for follower in &ids[1..] {
            fixture.users.follow(*follower, ids[0]).await.unwrap();
        }

        let first = fixture.service.followers_page("target", 1).await.unwrap();
        let names: Vec<&str> = first.items.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b"]);
        assert_eq!(first.total, 3);
        assert_eq!(first.pages, 2);

        let following = fixture.service.following_page("a", 1).await.unwrap();
        assert_eq!(following.items.len(), 1);
        assert_eq!(following.items[0].name, "target");
    }
}
