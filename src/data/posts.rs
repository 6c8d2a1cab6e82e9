//! Post repository
//!
//! Layout:
//! - `post:<id>` hash with the record fields
//! - `posts:list` global feed of live ids, newest first
//! - `posts:author:<id>` every id an author published, newest first
//! - `posts:del_list` tombstones
//!
//! Deletion is soft: the id leaves the global feed and lands in the tombstone
//! list, while the record and the author feed entry stay. [`PostRepository::total`]
//! and [`PostRepository::total_by_author`] therefore diverge after a delete.

use std::sync::Arc;

use chrono::Utc;

use super::ids::{contains_id, next_id, page_of_ids, submit};
use super::keys;
use super::models::{Post, post_fields};
use crate::error::AppError;
use crate::store::{Batch, KeyValueStore, WriteMode};

#[derive(Clone)]
pub struct PostRepository {
    store: Arc<dyn KeyValueStore>,
    write_mode: WriteMode,
}

impl PostRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, write_mode: WriteMode) -> Self {
        Self { store, write_mode }
    }

    /// Publish a post and return its id
    ///
    /// `html_content` must already be sanitized.
    pub async fn publish(
        &self,
        title: &str,
        author_id: u64,
        html_content: &str,
        category: &str,
    ) -> Result<u64, AppError> {
        let id = next_id(self.store.as_ref(), keys::POSTS_COUNT).await?;
        let post = Post {
            id,
            title: title.to_string(),
            author_id,
            content: html_content.to_string(),
            category: category.to_string(),
            created_at: Some(Utc::now()),
        };

        let mut batch = Batch::new();
        batch
            .hash_set_many(keys::post(id), post.encode())
            .list_push_front(keys::POSTS_LIST, id.to_string())
            .list_push_front(keys::author_posts(author_id), id.to_string());
        submit(self.store.as_ref(), self.write_mode, "publish", batch).await?;

        tracing::info!(post_id = id, author_id, title, "Post published");
        Ok(id)
    }

    pub async fn update_content(&self, id: u64, html_content: &str) -> Result<(), AppError> {
        self.set_field(id, post_fields::CONTENT, html_content).await
    }

    pub async fn update_category(&self, id: u64, category: &str) -> Result<(), AppError> {
        self.set_field(id, post_fields::CATEGORY, category).await
    }

    /// Move a post from the global feed to the tombstone list.
    ///
    /// Deleting an already deleted post changes nothing.
    pub async fn delete(&self, id: u64) -> Result<(), AppError> {
        if !self.exists(id).await? {
            return Err(AppError::NotFound);
        }
        if self.is_deleted(id).await? {
            tracing::debug!(post_id = id, "Post already deleted");
            return Ok(());
        }

        let mut batch = Batch::new();
        batch
            .list_remove(keys::POSTS_LIST, id.to_string(), 1)
            .list_push_front(keys::POSTS_DEL_LIST, id.to_string());
        submit(self.store.as_ref(), self.write_mode, "delete", batch).await?;

        tracing::info!(post_id = id, "Post deleted");
        Ok(())
    }

    pub async fn get(&self, id: u64) -> Result<Post, AppError> {
        let key = keys::post(id);
        let fields = self.store.hash_get_all(&key).await?;
        if fields.is_empty() {
            tracing::debug!(post_id = id, "Post not found");
            return Err(AppError::NotFound);
        }
        Post::decode(id, &key, &fields)
    }

    pub async fn is_deleted(&self, id: u64) -> Result<bool, AppError> {
        contains_id(self.store.as_ref(), keys::POSTS_DEL_LIST, id).await
    }

    /// Live posts in the global feed
    pub async fn total(&self) -> Result<u64, AppError> {
        Ok(self.store.list_length(keys::POSTS_LIST).await?)
    }

    /// Everything `author_id` published, deleted posts included
    pub async fn total_by_author(&self, author_id: u64) -> Result<u64, AppError> {
        Ok(self
            .store
            .list_length(&keys::author_posts(author_id))
            .await?)
    }

    pub async fn total_deleted(&self) -> Result<u64, AppError> {
        Ok(self.store.list_length(keys::POSTS_DEL_LIST).await?)
    }

    /// Ids of one page of the global feed, newest first
    pub async fn page(&self, page: u64, per_page: u64) -> Result<Vec<u64>, AppError> {
        page_of_ids(self.store.as_ref(), keys::POSTS_LIST, page, per_page).await
    }

    /// Ids of one page of an author feed, newest first
    pub async fn author_page(
        &self,
        author_id: u64,
        page: u64,
        per_page: u64,
    ) -> Result<Vec<u64>, AppError> {
        page_of_ids(
            self.store.as_ref(),
            &keys::author_posts(author_id),
            page,
            per_page,
        )
        .await
    }

    async fn exists(&self, id: u64) -> Result<bool, AppError> {
        Ok(self
            .store
            .hash_exists(&keys::post(id), post_fields::AUTHOR_ID)
            .await?)
    }

    async fn set_field(&self, id: u64, field: &str, value: &str) -> Result<(), AppError> {
        if !self.exists(id).await? {
            return Err(AppError::NotFound);
        }
        self.store.hash_set(&keys::post(id), field, value).await?;
        tracing::info!(post_id = id, field, "Post updated");
        Ok(())
    }
}
