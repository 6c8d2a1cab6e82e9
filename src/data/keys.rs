//! Key naming scheme
//!
//! These names are shared with existing deployments and must not change.

/// Counter allocating user ids
pub const USERS_COUNT: &str = "users:count";
/// Hash: email -> user id
pub const EMAIL_TO_ID: &str = "email.to.id";
/// Hash: name -> user id
pub const NAME_TO_ID: &str = "name.to.id";

/// Counter allocating post ids
pub const POSTS_COUNT: &str = "posts:count";
/// List: global feed of live post ids, newest first
pub const POSTS_LIST: &str = "posts:list";
/// List: deleted post ids, newest first
pub const POSTS_DEL_LIST: &str = "posts:del_list";

/// Hash holding a user record
pub fn user(id: u64) -> String {
    format!("user:{id}")
}

/// List: ids following `id`
pub fn user_followers(id: u64) -> String {
    format!("user:follower:{id}")
}

/// List: ids that `id` follows
pub fn user_following(id: u64) -> String {
    format!("user:following:{id}")
}

/// List: every post id `author_id` published, newest first
pub fn author_posts(author_id: u64) -> String {
    format!("posts:author:{author_id}")
}

/// Hash holding a post record
pub fn post(id: u64) -> String {
    format!("post:{id}")
}
