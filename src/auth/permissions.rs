//! Permission Evaluation
//! Mission: Decide who may view or modify a given employee record
//!
//! Authorization is expressed as explicit predicate functions the caller
//! branches on, rather than declarative annotations intercepted by a
//! framework. Role checks take precedence over the ownership fallback.

use crate::auth::models::{AuthenticatedActor, RoleName};
use std::collections::BTreeSet;

/// Capability grant: a named action on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permission {
    pub name: &'static str,
    pub resource: &'static str,
    pub action: &'static str,
}

const READ_EMPLOYEE: Permission = Permission {
    name: "READ_EMPLOYEE",
    resource: "EMPLOYEE",
    action: "READ",
};
const CREATE_EMPLOYEE: Permission = Permission {
    name: "CREATE_EMPLOYEE",
    resource: "EMPLOYEE",
    action: "CREATE",
};
const UPDATE_EMPLOYEE: Permission = Permission {
    name: "UPDATE_EMPLOYEE",
    resource: "EMPLOYEE",
    action: "UPDATE",
};
const DELETE_EMPLOYEE: Permission = Permission {
    name: "DELETE_EMPLOYEE",
    resource: "EMPLOYEE",
    action: "DELETE",
};
const READ_ROLE: Permission = Permission {
    name: "READ_ROLE",
    resource: "ROLE",
    action: "READ",
};
const MANAGE_ROLE: Permission = Permission {
    name: "MANAGE_ROLE",
    resource: "ROLE",
    action: "MANAGE",
};

/// Role-to-permission catalog. Code-resident and immutable; a role's grants
/// cannot change mid-request.
pub fn role_permissions(role: RoleName) -> &'static [Permission] {
    match role {
        RoleName::Admin => &[
            READ_EMPLOYEE,
            CREATE_EMPLOYEE,
            UPDATE_EMPLOYEE,
            DELETE_EMPLOYEE,
            READ_ROLE,
            MANAGE_ROLE,
        ],
        RoleName::Manager => &[READ_EMPLOYEE, CREATE_EMPLOYEE, UPDATE_EMPLOYEE, READ_ROLE],
        RoleName::Hr => &[READ_EMPLOYEE, CREATE_EMPLOYEE, UPDATE_EMPLOYEE],
        RoleName::Employee => &[READ_EMPLOYEE],
    }
}

/// Full authority set for a role list: role markers plus every permission
/// name those roles grant. Sorted for stable token payloads.
pub fn authorities_for(roles: &[RoleName]) -> Vec<String> {
    let mut set = BTreeSet::new();
    for role in roles {
        set.insert(role.authority().to_string());
        for perm in role_permissions(*role) {
            set.insert(perm.name.to_string());
        }
    }
    set.into_iter().collect()
}

/// Authorization decision engine over (actor, action, resource owner).
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionEvaluator;

impl PermissionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// May `actor` view the record owned by `target_owner_id`?
    pub fn can_view(&self, actor: &AuthenticatedActor, target_owner_id: i64) -> bool {
        // Manager and above can view anyone
        if actor.has_role(RoleName::Admin)
            || actor.has_role(RoleName::Manager)
            || actor.has_role(RoleName::Hr)
        {
            return true;
        }

        // Everyone can view their own record
        actor.id == target_owner_id
    }

    /// May `actor` modify the record owned by `target_owner_id`?
    pub fn can_modify(&self, actor: &AuthenticatedActor, target_owner_id: i64) -> bool {
        // Admin can modify anyone
        if actor.has_role(RoleName::Admin) {
            return true;
        }

        // HR manages employee records without being admin
        if actor.has_role(RoleName::Hr) {
            return true;
        }

        // Everyone can modify their own record
        actor.id == target_owner_id
    }

    /// Coarse-grained check against the actor's resolved authority set
    /// (role-granted permissions plus directly granted ones).
    pub fn has_authority(&self, actor: &AuthenticatedActor, authority: &str) -> bool {
        actor.authorities.contains(authority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn actor_with(id: i64, roles: &[RoleName]) -> AuthenticatedActor {
        AuthenticatedActor {
            id,
            email: format!("actor{}@company.com", id),
            authorities: authorities_for(roles).into_iter().collect(),
        }
    }

    #[test]
    fn test_admin_allowed_on_any_target() {
        let admin = actor_with(1, &[RoleName::Admin]);
        let eval = PermissionEvaluator::new();

        assert!(eval.can_view(&admin, 1));
        assert!(eval.can_view(&admin, 999));
        assert!(eval.can_modify(&admin, 1));
        assert!(eval.can_modify(&admin, 999));
    }

    #[test]
    fn test_employee_confined_to_own_record() {
        let employee = actor_with(42, &[RoleName::Employee]);
        let eval = PermissionEvaluator::new();

        assert!(eval.can_view(&employee, 42));
        assert!(eval.can_modify(&employee, 42));
        assert!(!eval.can_view(&employee, 7));
        assert!(!eval.can_modify(&employee, 7));
    }

    #[test]
    fn test_hr_modifies_others() {
        let hr = actor_with(9, &[RoleName::Hr]);
        let eval = PermissionEvaluator::new();

        assert!(eval.can_view(&hr, 7));
        assert!(eval.can_modify(&hr, 7));
        assert!(eval.can_modify(&hr, 9));
    }

    #[test]
    fn test_manager_views_but_does_not_modify_others() {
        let manager = actor_with(5, &[RoleName::Manager]);
        let eval = PermissionEvaluator::new();

        assert!(eval.can_view(&manager, 5));
        assert!(eval.can_view(&manager, 7));
        assert!(eval.can_modify(&manager, 5));
        assert!(!eval.can_modify(&manager, 7));
    }

    #[test]
    fn test_role_catalog_grants() {
        let admin = authorities_for(&[RoleName::Admin]);
        assert!(admin.contains(&"MANAGE_ROLE".to_string()));
        assert!(admin.contains(&"DELETE_EMPLOYEE".to_string()));

        let hr = authorities_for(&[RoleName::Hr]);
        assert!(hr.contains(&"UPDATE_EMPLOYEE".to_string()));
        assert!(!hr.contains(&"DELETE_EMPLOYEE".to_string()));

        let employee = authorities_for(&[RoleName::Employee]);
        assert_eq!(employee, vec!["READ_EMPLOYEE", "ROLE_EMPLOYEE"]);
    }

    #[test]
    fn test_has_authority_includes_direct_grants() {
        let mut authorities: HashSet<String> = authorities_for(&[RoleName::Employee])
            .into_iter()
            .collect();
        authorities.insert("EXPORT_PAYROLL".to_string());

        let actor = AuthenticatedActor {
            id: 3,
            email: "payroll@company.com".to_string(),
            authorities,
        };
        let eval = PermissionEvaluator::new();

        assert!(eval.has_authority(&actor, "READ_EMPLOYEE"));
        assert!(eval.has_authority(&actor, "EXPORT_PAYROLL"));
        assert!(!eval.has_authority(&actor, "DELETE_EMPLOYEE"));
    }

    #[test]
    fn test_permission_metadata() {
        let perms = role_permissions(RoleName::Manager);
        let read = perms.iter().find(|p| p.name == "READ_EMPLOYEE").unwrap();
        assert_eq!(read.resource, "EMPLOYEE");
        assert_eq!(read.action, "READ");
    }
}
