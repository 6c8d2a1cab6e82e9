//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services check permissions and compose repository reads into views.

mod account;
mod post;
mod timeline;
mod views;

pub use account::AccountService;
pub use post::PostService;
pub use timeline::TimelineService;
pub use views::{PostView, UserSummary, UserView};
