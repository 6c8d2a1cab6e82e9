//! Authorization
//!
//! Authentication itself happens upstream; the core receives an
//! [`Identity`] and checks it against role permission masks.

mod permission;

pub use permission::{Identity, Permission, Role, has_permission};
