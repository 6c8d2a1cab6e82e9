//! Roles and permission bitmasks

use std::fmt;
use std::ops::{BitAnd, BitOr};

use serde::{Deserialize, Serialize};

/// A set of capabilities packed into one byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(u8);

impl Permission {
    pub const NONE: Permission = Permission(0);
    /// Follow other users
    pub const FOLLOW: Permission = Permission(0x01);
    /// Comment on other users' posts
    pub const COMMENT: Permission = Permission(0x02);
    /// Publish posts
    pub const WRITE_ARTICLES: Permission = Permission(0x04);
    /// Moderate comments written by others
    pub const MANAGE_COMMENTS: Permission = Permission(0x08);
    /// Administer the site
    pub const ADMINISTER: Permission = Permission(0x80);
    pub const ALL: Permission = Permission(0xff);

    pub const fn from_bits(bits: u8) -> Self {
        Permission(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Every bit of `flag` is set in `self`.
    pub const fn contains(self, flag: Permission) -> bool {
        self.0 & flag.0 == flag.0
    }
}

impl BitOr for Permission {
    type Output = Permission;

    fn bitor(self, rhs: Self) -> Self::Output {
        Permission(self.0 | rhs.0)
    }
}

impl BitAnd for Permission {
    type Output = Permission;

    fn bitand(self, rhs: Self) -> Self::Output {
        Permission(self.0 & rhs.0)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// `mask & flag == flag`
pub fn has_permission(mask: Permission, flag: Permission) -> bool {
    mask.contains(flag)
}

/// User role, stored as `role_id` in the user hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Not logged in; read only
    #[default]
    Anonymous,
    /// Default for new accounts
    User,
    Moderator,
    Admin,
}

impl Role {
    pub const fn id(self) -> u8 {
        match self {
            Role::Anonymous => 0,
            Role::User => 1,
            Role::Moderator => 2,
            Role::Admin => 3,
        }
    }

    /// Unrecognised ids fall back to `Anonymous`, which has no permissions.
    pub const fn from_id(id: u8) -> Self {
        match id {
            1 => Role::User,
            2 => Role::Moderator,
            3 => Role::Admin,
            _ => Role::Anonymous,
        }
    }

    pub const fn permissions(self) -> Permission {
        match self {
            Role::Anonymous => Permission::NONE,
            Role::User => Permission::from_bits(
                Permission::FOLLOW.bits()
                    | Permission::COMMENT.bits()
                    | Permission::WRITE_ARTICLES.bits(),
            ),
            Role::Moderator => Permission::from_bits(
                Permission::FOLLOW.bits()
                    | Permission::COMMENT.bits()
                    | Permission::WRITE_ARTICLES.bits()
                    | Permission::MANAGE_COMMENTS.bits(),
            ),
            Role::Admin => Permission::ALL,
        }
    }
}

/// The caller as seen by the core: authenticated id plus permission bitmask
///
/// Produced by the presentation layer after it has authenticated a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<u64>,
    pub permissions: Permission,
}

impl Identity {
    pub const fn anonymous() -> Self {
        Self {
            user_id: None,
            permissions: Permission::NONE,
        }
    }

    pub const fn new(user_id: u64, permissions: Permission) -> Self {
        Self {
            user_id: Some(user_id),
            permissions,
        }
    }

    pub fn for_user(user: &crate::data::User) -> Self {
        Self::new(user.id, user.role.permissions())
    }

    pub fn can(&self, flag: Permission) -> bool {
        has_permission(self.permissions, flag)
    }

    pub fn is_administrator(&self) -> bool {
        self.can(Permission::ADMINISTER)
    }

    /// Id of the caller, or `Forbidden` when anonymous.
    pub fn require_user(&self) -> Result<u64, crate::error::AppError> {
        self.user_id.ok_or(crate::error::AppError::Forbidden)
    }

    /// `Forbidden` unless every bit of `flag` is granted.
    pub fn require(&self, flag: Permission) -> Result<u64, crate::error::AppError> {
        let user_id = self.require_user()?;
        if self.can(flag) {
            Ok(user_id)
        } else {
            Err(crate::error::AppError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_masks() {
        assert_eq!(Role::Anonymous.permissions().bits(), 0x00);
        assert_eq!(Role::User.permissions().bits(), 0x07);
        assert_eq!(Role::Moderator.permissions().bits(), 0x0f);
        assert_eq!(Role::Admin.permissions().bits(), 0xff);
    }

    #[test]
    fn unknown_role_id_has_no_permissions() {
        let role = Role::from_id(42);
        assert_eq!(role, Role::Anonymous);
        assert!(!has_permission(role.permissions(), Permission::FOLLOW));
    }

    #[test]
    fn role_ids_round_trip() {
        for role in [Role::Anonymous, Role::User, Role::Moderator, Role::Admin] {
            assert_eq!(Role::from_id(role.id()), role);
        }
    }

    #[test]
    fn has_permission_requires_every_bit() {
        let mask = Role::User.permissions();
        assert!(has_permission(mask, Permission::FOLLOW));
        assert!(has_permission(mask, Permission::FOLLOW | Permission::WRITE_ARTICLES));
        assert!(!has_permission(mask, Permission::FOLLOW | Permission::MANAGE_COMMENTS));
        assert!(!has_permission(mask, Permission::ADMINISTER));
        assert!(has_permission(Role::Admin.permissions(), Permission::ADMINISTER));
    }

    #[test]
    fn anonymous_identity_is_refused() {
        let identity = Identity::anonymous();
        assert!(!identity.can(Permission::FOLLOW));
        assert!(matches!(
            identity.require(Permission::NONE),
            Err(crate::error::AppError::Forbidden)
        ));
    }

    #[test]
    fn moderator_cannot_administer() {
        let identity = Identity::new(3, Role::Moderator.permissions());
        assert!(identity.require(Permission::MANAGE_COMMENTS).is_ok());
        assert!(!identity.is_administrator());
    }
}
