//! Read models handed to the presentation layer

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::Role;
use crate::data::{AuthorNameCache, Post, User, UserRepository};
use crate::error::AppError;

/// Public profile of a user
///
/// Never carries the password hash or the email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: u64,
    pub name: String,
    pub role: Role,
    pub confirmed: bool,
    pub location: String,
    pub about_me: String,
    pub member_since: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub followers_count: u64,
    pub following_count: u64,
    /// Everything the user published, deleted posts included
    pub posts_count: u64,
}

impl UserView {
    pub(crate) fn new(
        user: User,
        followers_count: u64,
        following_count: u64,
        posts_count: u64,
    ) -> Self {
        Self {
            id: user.id,
            name: user.name,
            role: user.role,
            confirmed: user.confirmed,
            location: user.location,
            about_me: user.about_me,
            member_since: user.member_since,
            last_seen: user.last_seen,
            followers_count,
            following_count,
            posts_count,
        }
    }
}

/// Entry of a follower/following list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: u64,
    pub name: String,
    pub last_seen: Option<DateTime<Utc>>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            last_seen: user.last_seen,
        }
    }
}

/// A post with its author's display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    pub id: u64,
    pub title: String,
    pub author_id: u64,
    pub author_name: String,
    pub content: String,
    pub category: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl PostView {
    fn new(post: Post, author_name: &str) -> Self {
        Self {
            id: post.id,
            title: post.title,
            author_id: post.author_id,
            author_name: author_name.to_string(),
            content: post.content,
            category: post.category,
            created_at: post.created_at,
        }
    }
}

/// Resolves author names for post views, cache first.
#[derive(Clone)]
pub(crate) struct PostViews {
    users: UserRepository,
    author_cache: AuthorNameCache,
}

impl PostViews {
    pub(crate) fn new(users: UserRepository, author_cache: AuthorNameCache) -> Self {
        Self {
            users,
            author_cache,
        }
    }

    /// # Errors
    /// `NotFound` when the author record is missing.
    pub(crate) async fn author_name(&self, author_id: u64) -> Result<Arc<str>, AppError> {
        if let Some(name) = self.author_cache.get(author_id).await {
            return Ok(name);
        }

        let author = self.users.get_by_id(author_id).await?;
        Ok(self.author_cache.insert(author_id, &author.name).await)
    }

    pub(crate) async fn compose(&self, post: Post) -> Result<PostView, AppError> {
        let author_name = self.author_name(post.author_id).await?;
        Ok(PostView::new(post, &author_name))
    }
}
