//! # Access control
//!
//! Resource-scoped roles gate every mutation in the registry and the bridge
//! controller.
//!
//! Roles are held per `(resource, account)` as a [`RoleBitmap`]. A check at
//! a name's resource also consults [`Resource::Root`], so an account holding
//! a bit at root holds it everywhere. The same goes for admin bits: an admin
//! at root may grant or revoke at any resource, which gives a two level
//! delegation hierarchy.
//!
//! Grants and revokes are all-or-nothing. If the caller lacks the admin bit
//! for any bit in the change, nothing is applied and the error names the
//! resource, the missing admin bits and the caller.

mod roles;

use std::collections::HashMap;

use crate::types::{Address, Resource};

pub use roles::{RoleBitmap, Roles};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AccessControlError {
    /// The caller does not hold the admin bits required for the change
    #[error("unauthorized roles: {account} is missing {missing} at {resource}")]
    UnauthorizedRoles {
        resource: Resource,
        missing: RoleBitmap,
        account: Address,
    },
    /// Roles can not be held by the zero address
    #[error("invalid account: roles can not be granted to the zero address")]
    InvalidAccount,
}

/// Role storage for one registry or controller
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    grants: HashMap<Resource, HashMap<Address, RoleBitmap>>,
}

impl AccessControl {
    /// Create an access control table where `admin` holds every owner and
    /// admin bit at the root resource
    pub fn new(admin: Address) -> Self {
        let mut access = Self::default();
        access.grant_unchecked(Resource::Root, RoleBitmap::all(), admin);
        access
    }

    /// The bits held by `account` at exactly `resource`
    pub fn roles(&self, resource: Resource, account: Address) -> RoleBitmap {
        self.grants
            .get(&resource)
            .and_then(|holders| holders.get(&account))
            .copied()
            .unwrap_or_default()
    }

    /// The bits `account` effectively holds at `resource`, root included
    pub fn effective_roles(&self, resource: Resource, account: Address) -> RoleBitmap {
        let held = self.roles(resource, account);
        if resource.is_root() {
            return held;
        }
        held.union(self.roles(Resource::Root, account))
    }

    /// Whether `account` holds every bit of `roles` at `resource` or root
    pub fn has_roles(&self, resource: Resource, roles: RoleBitmap, account: Address) -> bool {
        self.effective_roles(resource, account).contains(roles)
    }

    /// Whether `account` holds every bit of `roles` at the root resource
    pub fn has_root_roles(&self, roles: RoleBitmap, account: Address) -> bool {
        self.roles(Resource::Root, account).contains(roles)
    }

    /// Fail with [`AccessControlError::UnauthorizedRoles`] unless `account`
    /// holds `roles` at `resource` or root
    pub fn check_roles(
        &self,
        resource: Resource,
        roles: RoleBitmap,
        account: Address,
    ) -> Result<(), AccessControlError> {
        let missing = roles.difference(self.effective_roles(resource, account));
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AccessControlError::UnauthorizedRoles {
                resource,
                missing,
                account,
            })
        }
    }

    /// Same as [`check_roles`](Self::check_roles) but root only
    pub fn check_root_roles(
        &self,
        roles: RoleBitmap,
        account: Address,
    ) -> Result<(), AccessControlError> {
        self.check_roles(Resource::Root, roles, account)
    }

    /// Number of accounts holding any owner or admin bit of `roles` at
    /// exactly `resource`. Root holders are not counted.
    pub fn role_count(&self, resource: Resource, roles: Roles) -> usize {
        self.grants
            .get(&resource)
            .map(|holders| {
                holders
                    .values()
                    .filter(|bitmap| bitmap.intersects_any(roles))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Grant `roles` at `resource` to `account` on behalf of `caller`
    ///
    /// # Returns
    /// * `Ok(RoleBitmap)` - the bits that were newly added
    /// * `Err(AccessControlError)` - nothing was applied
    pub fn grant_roles(
        &mut self,
        caller: Address,
        resource: Resource,
        roles: RoleBitmap,
        account: Address,
    ) -> Result<RoleBitmap, AccessControlError> {
        self.check_settable(caller, resource, roles)?;
        if account.is_zero() {
            return Err(AccessControlError::InvalidAccount);
        }
        Ok(self.grant_unchecked(resource, roles, account))
    }

    /// Revoke `roles` at `resource` from `account` on behalf of `caller`
    ///
    /// # Returns
    /// * `Ok(RoleBitmap)` - the bits that were actually removed
    /// * `Err(AccessControlError)` - nothing was applied
    pub fn revoke_roles(
        &mut self,
        caller: Address,
        resource: Resource,
        roles: RoleBitmap,
        account: Address,
    ) -> Result<RoleBitmap, AccessControlError> {
        self.check_settable(caller, resource, roles)?;
        Ok(self.revoke_unchecked(resource, roles, account))
    }

    /// Add bits without any authorization check
    pub(crate) fn grant_unchecked(
        &mut self,
        resource: Resource,
        roles: RoleBitmap,
        account: Address,
    ) -> RoleBitmap {
        if roles.is_empty() {
            return RoleBitmap::EMPTY;
        }
        let held = self
            .grants
            .entry(resource)
            .or_default()
            .entry(account)
            .or_default();
        let added = roles.difference(*held);
        *held = held.union(roles);
        added
    }

    /// Remove bits without any authorization check
    pub(crate) fn revoke_unchecked(
        &mut self,
        resource: Resource,
        roles: RoleBitmap,
        account: Address,
    ) -> RoleBitmap {
        let Some(holders) = self.grants.get_mut(&resource) else {
            return RoleBitmap::EMPTY;
        };
        let Some(held) = holders.get_mut(&account) else {
            return RoleBitmap::EMPTY;
        };

        let removed = held.intersection(roles);
        *held = held.difference(roles);
        if held.is_empty() {
            holders.remove(&account);
        }
        if holders.is_empty() {
            self.grants.remove(&resource);
        }
        removed
    }

    /// Move every bit `from` holds at `resource` over to `to`
    pub(crate) fn transfer_all(&mut self, resource: Resource, from: Address, to: Address) {
        let held = self.roles(resource, from);
        self.revoke_unchecked(resource, held, from);
        self.grant_unchecked(resource, held, to);
    }

    /// Drop every grant at `resource`
    pub(crate) fn revoke_all(&mut self, resource: Resource) {
        self.grants.remove(&resource);
    }

    fn check_settable(
        &self,
        caller: Address,
        resource: Resource,
        roles: RoleBitmap,
    ) -> Result<(), AccessControlError> {
        let settable = self.effective_roles(resource, caller).admin;
        let missing = roles.required_admin() - settable;
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AccessControlError::UnauthorizedRoles {
                resource,
                missing: RoleBitmap::admin(missing),
                account: caller,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LabelId, NameId};

    fn name_resource(label: &str) -> Resource {
        NameId::new(LabelId::of(label), 0).resource()
    }

    #[test]
    fn test_bootstrap_grants_admin_everything_at_root() {
        let admin = Address::random();
        let access = AccessControl::new(admin);
        assert!(access.has_root_roles(RoleBitmap::all(), admin));
        assert!(access.has_roles(name_resource("alice"), RoleBitmap::all(), admin));
    }

    #[test]
    fn test_root_admin_can_grant_at_any_resource() {
        let admin = Address::random();
        let user = Address::random();
        let mut access = AccessControl::new(admin);
        let resource = name_resource("alice");

        let added = access
            .grant_roles(admin, resource, RoleBitmap::owner(Roles::RENEW), user)
            .unwrap();
        assert_eq!(added, RoleBitmap::owner(Roles::RENEW));
        assert!(access.has_roles(resource, RoleBitmap::owner(Roles::RENEW), user));
        assert!(!access.has_root_roles(RoleBitmap::owner(Roles::RENEW), user));
    }

    #[test]
    fn test_resource_admin_scoped_to_resource() {
        let admin = Address::random();
        let delegate = Address::random();
        let user = Address::random();
        let mut access = AccessControl::new(admin);
        let alice = name_resource("alice");
        let bob = name_resource("bob");

        access
            .grant_roles(admin, alice, RoleBitmap::admin(Roles::SET_RESOLVER), delegate)
            .unwrap();

        // Delegate may hand out the owner bit at alice...
        access
            .grant_roles(delegate, alice, RoleBitmap::owner(Roles::SET_RESOLVER), user)
            .unwrap();

        // ...but not at bob
        let err = access
            .grant_roles(delegate, bob, RoleBitmap::owner(Roles::SET_RESOLVER), user)
            .unwrap_err();
        assert_eq!(
            err,
            AccessControlError::UnauthorizedRoles {
                resource: bob,
                missing: RoleBitmap::admin(Roles::SET_RESOLVER),
                account: delegate,
            }
        );
    }

    #[test]
    fn test_partial_authority_applies_nothing() {
        let admin = Address::random();
        let delegate = Address::random();
        let user = Address::random();
        let mut access = AccessControl::new(admin);
        let resource = name_resource("alice");

        access
            .grant_roles(admin, resource, RoleBitmap::admin(Roles::RENEW), delegate)
            .unwrap();

        let err = access
            .grant_roles(
                delegate,
                resource,
                RoleBitmap::owner(Roles::RENEW | Roles::SET_SUBREGISTRY),
                user,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            AccessControlError::UnauthorizedRoles { missing, .. }
                if missing == RoleBitmap::admin(Roles::SET_SUBREGISTRY)
        ));
        assert_eq!(access.roles(resource, user), RoleBitmap::EMPTY);
    }

    #[test]
    fn test_revoke_requires_admin() {
        let admin = Address::random();
        let user = Address::random();
        let mut access = AccessControl::new(admin);
        let resource = name_resource("alice");

        access
            .grant_roles(admin, resource, RoleBitmap::owner(Roles::RENEW), user)
            .unwrap();
        assert!(access
            .revoke_roles(user, resource, RoleBitmap::owner(Roles::RENEW), user)
            .is_err());

        let removed = access
            .revoke_roles(admin, resource, RoleBitmap::owner(Roles::RENEW), user)
            .unwrap();
        assert_eq!(removed, RoleBitmap::owner(Roles::RENEW));
        assert_eq!(access.roles(resource, user), RoleBitmap::EMPTY);
    }

    #[test]
    fn test_role_count_ignores_root_holders() {
        let admin = Address::random();
        let mut access = AccessControl::new(admin);
        let resource = name_resource("alice");
        assert_eq!(access.role_count(resource, Roles::SET_SUBREGISTRY), 0);

        for roles in [
            RoleBitmap::admin(Roles::SET_SUBREGISTRY),
            RoleBitmap::owner(Roles::SET_SUBREGISTRY),
            RoleBitmap::owner(Roles::RENEW),
        ] {
            access.grant_unchecked(resource, roles, Address::random());
        }
        assert_eq!(access.role_count(resource, Roles::SET_SUBREGISTRY), 2);
    }

    #[test]
    fn test_transfer_all_moves_bits() {
        let from = Address::random();
        let to = Address::random();
        let mut access = AccessControl::default();
        let resource = name_resource("alice");
        access.grant_unchecked(resource, RoleBitmap::full(Roles::RENEW), from);

        access.transfer_all(resource, from, to);
        assert_eq!(access.roles(resource, from), RoleBitmap::EMPTY);
        assert_eq!(access.roles(resource, to), RoleBitmap::full(Roles::RENEW));
    }

    #[test]
    fn test_grant_to_zero_rejected() {
        let admin = Address::random();
        let mut access = AccessControl::new(admin);
        let err = access
            .grant_roles(admin, Resource::Root, RoleBitmap::owner(Roles::RENEW), Address::ZERO)
            .unwrap_err();
        assert_eq!(err, AccessControlError::InvalidAccount);
    }
}
