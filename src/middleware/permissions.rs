use crate::database::models::UserRole;
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;

use UserRole::{Admin, Agent, Manager, SuperAdmin, User};

/// Static permission table: action name -> roles allowed to perform it
pub const PERMISSIONS: &[(&str, &[UserRole])] = &[
    // Project management
    ("projects.create", &[SuperAdmin]),
    ("projects.edit", &[SuperAdmin, Admin]),
    ("projects.delete", &[SuperAdmin]),
    ("projects.view", &[SuperAdmin, Admin, Manager, Agent, User]),
    // Units management
    ("units.create", &[SuperAdmin, Admin, Manager]),
    ("units.edit", &[SuperAdmin, Admin, Manager]),
    ("units.delete", &[SuperAdmin, Admin]),
    ("units.view", &[SuperAdmin, Admin, Manager, Agent, User]),
    ("units.bulk_update", &[SuperAdmin, Admin, Manager]),
    ("units.csv_import", &[SuperAdmin, Admin, Manager]),
    // Leads management
    ("leads.create", &[SuperAdmin, Admin, Manager, Agent]),
    ("leads.edit", &[SuperAdmin, Admin, Manager, Agent]),
    ("leads.delete", &[SuperAdmin, Admin, Manager]),
    ("leads.view", &[SuperAdmin, Admin, Manager, Agent]),
    ("leads.assign", &[SuperAdmin, Admin, Manager]),
    // Currency management
    ("currencies.view", &[SuperAdmin, Admin, Manager, Agent, User]),
    // Analytics
    ("analytics.organization", &[SuperAdmin, Admin, Manager]),
    ("analytics.personal", &[SuperAdmin, Admin, Manager, Agent]),
];

/// Check if a role has permission for an action
pub fn has_permission(role: UserRole, permission: &str) -> bool {
    match PERMISSIONS.iter().find(|(name, _)| *name == permission) {
        Some((_, roles)) => roles.contains(&role),
        None => {
            tracing::warn!("Permission \"{}\" not defined", permission);
            false
        }
    }
}

/// Handler-side permission guard. Denies with 403 and the permission name.
pub fn require_permission(user: &AuthUser, permission: &str) -> Result<(), ApiError> {
    if has_permission(user.role, permission) {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!("No tienes permiso para: {}", permission)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_import_restricted_to_managers_and_up() {
        assert!(has_permission(UserRole::SuperAdmin, "units.csv_import"));
        assert!(has_permission(UserRole::Admin, "units.csv_import"));
        assert!(has_permission(UserRole::Manager, "units.csv_import"));
        assert!(!has_permission(UserRole::Agent, "units.csv_import"));
        assert!(!has_permission(UserRole::User, "units.csv_import"));
    }

    #[test]
    fn unknown_permission_denied() {
        assert!(!has_permission(UserRole::SuperAdmin, "units.fly"));
    }

    #[test]
    fn view_permissions_open_to_all_roles() {
        for role in [UserRole::SuperAdmin, UserRole::Admin, UserRole::Manager, UserRole::Agent, UserRole::User] {
            assert!(has_permission(role, "units.view"), "{:?} should view units", role);
        }
    }
}
