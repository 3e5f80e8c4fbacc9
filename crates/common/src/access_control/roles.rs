use std::fmt;

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Named permissions. Each flag exists twice inside a [`RoleBitmap`]:
    /// once as an owner bit (may perform the action) and once as an
    /// admin bit (may grant or revoke the permission).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Roles: u32 {
        /// Register new names. Only meaningful at the root resource.
        const REGISTRAR = 1 << 0;
        /// Extend a name's expiry
        const RENEW = 1 << 1;
        /// Point a name at a subregistry. A name with no holder of this
        ///  permission (owner or admin) is locked.
        const SET_SUBREGISTRY = 1 << 2;
        /// Point a name at a resolver
        const SET_RESOLVER = 1 << 3;
        /// Transfer or burn a name's token
        const CAN_TRANSFER = 1 << 4;
        /// Deliver bridge messages to a controller. Only meaningful at the
        ///  root resource of a controller.
        const EJECTOR = 1 << 5;
    }
}

/// Owner bits paired with their admin bits.
///
/// For every permission `P`, `owner.contains(P)` means the holder may
/// perform `P` and `admin.contains(P)` means the holder may grant or
/// revoke `P` (both halves) to anyone else at the same resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RoleBitmap {
    pub owner: Roles,
    pub admin: Roles,
}

impl RoleBitmap {
    pub const EMPTY: RoleBitmap = RoleBitmap {
        owner: Roles::empty(),
        admin: Roles::empty(),
    };

    pub const fn new(owner: Roles, admin: Roles) -> Self {
        Self { owner, admin }
    }

    /// Only the owner bits of `roles`
    pub const fn owner(roles: Roles) -> Self {
        Self {
            owner: roles,
            admin: Roles::empty(),
        }
    }

    /// Only the admin bits of `roles`
    pub const fn admin(roles: Roles) -> Self {
        Self {
            owner: Roles::empty(),
            admin: roles,
        }
    }

    /// Both the owner and admin bits of `roles`
    pub const fn full(roles: Roles) -> Self {
        Self {
            owner: roles,
            admin: roles,
        }
    }

    /// Every owner and admin bit
    pub const fn all() -> Self {
        Self::full(Roles::all())
    }

    pub fn is_empty(&self) -> bool {
        self.owner.is_empty() && self.admin.is_empty()
    }

    pub fn contains(&self, other: RoleBitmap) -> bool {
        self.owner.contains(other.owner) && self.admin.contains(other.admin)
    }

    /// True if any owner or admin bit of `roles` is present
    pub fn intersects_any(&self, roles: Roles) -> bool {
        self.owner.intersects(roles) || self.admin.intersects(roles)
    }

    pub fn union(self, other: RoleBitmap) -> Self {
        Self {
            owner: self.owner | other.owner,
            admin: self.admin | other.admin,
        }
    }

    pub fn intersection(self, other: RoleBitmap) -> Self {
        Self {
            owner: self.owner & other.owner,
            admin: self.admin & other.admin,
        }
    }

    pub fn difference(self, other: RoleBitmap) -> Self {
        Self {
            owner: self.owner - other.owner,
            admin: self.admin - other.admin,
        }
    }

    /// The admin bits a caller must hold to grant or revoke this bitmap
    pub fn required_admin(&self) -> Roles {
        self.owner | self.admin
    }
}

impl fmt::Display for RoleBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner[{:?}] admin[{:?}]", self.owner, self.admin)
    }
}
