//! Sonate RBAC - role catalog and permission evaluation.
//!
//! The role catalog is built once at process start and validated there:
//! a catalog containing an inheritance cycle or a reference to an unknown
//! role cannot be constructed, so queries never have to defend against one.
//! Evaluation is pure and lock-free per call; administrative updates replace
//! the whole catalog atomically instead of mutating it in place.

#![deny(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sonate_types::PrincipalId;
use thiserror::Error;
use tracing::debug;

/// An opaque permission token, `resource:action` by convention.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission(pub String);

impl Permission {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleName(pub String);

impl RoleName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl std::fmt::Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strict total order used by [`RbacEngine::can_grant_role`]. A principal
/// may only grant roles strictly below their own rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleRank {
    Guest,
    Viewer,
    Analyst,
    Operator,
    Admin,
    SuperAdmin,
}

/// A named permission bundle with optional inheritance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Role {
    pub name: RoleName,
    pub rank: RoleRank,
    pub permissions: HashSet<Permission>,
    pub inherits: Vec<RoleName>,
}

/// A principal holding roles plus optional per-user grants.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: PrincipalId,
    pub roles: Vec<RoleName>,
    pub custom_permissions: HashSet<Permission>,
}

impl User {
    pub fn new(id: impl Into<String>, roles: Vec<RoleName>) -> Self {
        Self {
            id: PrincipalId::new(id),
            roles,
            custom_permissions: HashSet::new(),
        }
    }

    pub fn with_custom_permission(mut self, permission: Permission) -> Self {
        self.custom_permissions.insert(permission);
        self
    }
}

/// Machine-readable access decision for HTTP layers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

/// RBAC-related errors. These surface at catalog construction, not at
/// query time.
#[derive(Debug, Error)]
pub enum RbacError {
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Duplicate role definition: {0}")]
    DuplicateRole(String),

    #[error("Role inheritance cycle through: {0}")]
    InheritanceCycle(String),
}

/// Immutable, validated role catalog.
#[derive(Clone, Debug)]
pub struct RoleCatalog {
    roles: HashMap<RoleName, Role>,
}

impl RoleCatalog {
    pub fn builder() -> RoleCatalogBuilder {
        RoleCatalogBuilder { roles: Vec::new() }
    }

    pub fn role(&self, name: &RoleName) -> Option<&Role> {
        self.roles.get(name)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// The platform's standard six-rank catalog.
    pub fn with_defaults() -> Self {
        let mut builder = Self::builder();
        builder = builder
            .role(
                "guest",
                RoleRank::Guest,
                &["session:read"],
                &[],
            )
            .role(
                "viewer",
                RoleRank::Viewer,
                &["audit:read", "receipt:read"],
                &["guest"],
            )
            .role(
                "analyst",
                RoleRank::Analyst,
                &["audit:query", "audit:summarize", "credential:read"],
                &["viewer"],
            )
            .role(
                "operator",
                RoleRank::Operator,
                &["receipt:write", "credential:issue", "session:write"],
                &["analyst"],
            )
            .role(
                "admin",
                RoleRank::Admin,
                &["credential:revoke", "policy:update", "limit:reset"],
                &["operator"],
            )
            .role(
                "super_admin",
                RoleRank::SuperAdmin,
                &["tenant:manage", "secrets:manage"],
                &["admin"],
            );
        builder
            .build()
            .expect("default catalog is statically valid")
    }
}

/// Builder validating the catalog before anything can query it.
pub struct RoleCatalogBuilder {
    roles: Vec<Role>,
}

impl RoleCatalogBuilder {
    pub fn role(
        mut self,
        name: &str,
        rank: RoleRank,
        permissions: &[&str],
        inherits: &[&str],
    ) -> Self {
        self.roles.push(Role {
            name: RoleName::new(name),
            rank,
            permissions: permissions.iter().map(|p| Permission::new(*p)).collect(),
            inherits: inherits.iter().map(|r| RoleName::new(*r)).collect(),
        });
        self
    }

    pub fn add(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }

    pub fn build(self) -> Result<RoleCatalog, RbacError> {
        let mut roles = HashMap::new();
        for role in self.roles {
            if roles.insert(role.name.clone(), role.clone()).is_some() {
                return Err(RbacError::DuplicateRole(role.name.0));
            }
        }

        for role in roles.values() {
            for parent in &role.inherits {
                if !roles.contains_key(parent) {
                    return Err(RbacError::UnknownRole(parent.0.clone()));
                }
            }
        }

        // A role must not inherit itself, directly or transitively.
        for name in roles.keys() {
            let mut stack = vec![name.clone()];
            let mut visited = HashSet::new();
            while let Some(current) = stack.pop() {
                for parent in &roles[&current].inherits {
                    if parent == name {
                        return Err(RbacError::InheritanceCycle(name.0.clone()));
                    }
                    if visited.insert(parent.clone()) {
                        stack.push(parent.clone());
                    }
                }
            }
        }

        Ok(RoleCatalog { roles })
    }
}

/// Stateless permission evaluation over an immutable catalog.
pub struct RbacEngine {
    catalog: RwLock<Arc<RoleCatalog>>,
}

impl RbacEngine {
    pub fn new(catalog: RoleCatalog) -> Self {
        Self {
            catalog: RwLock::new(Arc::new(catalog)),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RoleCatalog::with_defaults())
    }

    /// Administrative update path: the catalog is swapped as a whole, never
    /// mutated in place.
    pub fn replace_catalog(&self, catalog: RoleCatalog) {
        *self.catalog.write() = Arc::new(catalog);
    }

    fn snapshot(&self) -> Arc<RoleCatalog> {
        Arc::clone(&self.catalog.read())
    }

    /// Union of a role's direct permissions and everything it inherits,
    /// transitively.
    pub fn role_permissions(&self, name: &RoleName) -> Result<HashSet<Permission>, RbacError> {
        let catalog = self.snapshot();
        if catalog.role(name).is_none() {
            return Err(RbacError::UnknownRole(name.0.clone()));
        }

        let mut permissions = HashSet::new();
        let mut stack = vec![name.clone()];
        let mut visited = HashSet::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(role) = catalog.role(&current) {
                permissions.extend(role.permissions.iter().cloned());
                stack.extend(role.inherits.iter().cloned());
            }
        }
        Ok(permissions)
    }

    pub fn has_permission(&self, user: &User, permission: &Permission) -> bool {
        if user.custom_permissions.contains(permission) {
            return true;
        }
        for role in &user.roles {
            match self.role_permissions(role) {
                Ok(permissions) if permissions.contains(permission) => return true,
                Ok(_) => {}
                Err(_) => {
                    // A user can reference a role that was removed by an
                    // administrative catalog swap; that role grants nothing.
                    debug!(user = %user.id, role = %role, "user references unknown role");
                }
            }
        }
        false
    }

    pub fn has_all_permissions(&self, user: &User, permissions: &[Permission]) -> bool {
        permissions.iter().all(|p| self.has_permission(user, p))
    }

    pub fn has_any_permission(&self, user: &User, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.has_permission(user, p))
    }

    /// A granter may only hand out roles strictly below their own rank.
    pub fn can_grant_role(
        &self,
        granter: &RoleName,
        target: &RoleName,
    ) -> Result<bool, RbacError> {
        let catalog = self.snapshot();
        let granter_rank = catalog
            .role(granter)
            .ok_or_else(|| RbacError::UnknownRole(granter.0.clone()))?
            .rank;
        let target_rank = catalog
            .role(target)
            .ok_or_else(|| RbacError::UnknownRole(target.0.clone()))?
            .rank;
        Ok(granter_rank > target_rank)
    }

    /// Structured decision for request boundaries; never exposes internals.
    pub fn check(&self, user: &User, permission: &Permission) -> AccessDecision {
        if self.has_permission(user, permission) {
            AccessDecision {
                allowed: true,
                reason: None,
            }
        } else {
            AccessDecision {
                allowed: false,
                reason: Some(format!("missing permission {}", permission)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> RbacEngine {
        RbacEngine::with_defaults()
    }

    #[test]
    fn default_catalog_has_six_roles() {
        assert_eq!(RoleCatalog::with_defaults().len(), 6);
    }

    #[test]
    fn inheritance_is_transitive_through_five_levels() {
        let engine = engine();
        // super_admin sits five inheritance hops above guest.
        let permissions = engine
            .role_permissions(&RoleName::new("super_admin"))
            .unwrap();
        assert!(permissions.contains(&Permission::new("session:read")));
        assert!(permissions.contains(&Permission::new("audit:read")));
        assert!(permissions.contains(&Permission::new("audit:query")));
        assert!(permissions.contains(&Permission::new("receipt:write")));
        assert!(permissions.contains(&Permission::new("credential:revoke")));
        assert!(permissions.contains(&Permission::new("tenant:manage")));
    }

    #[test]
    fn inheritance_does_not_flow_downward() {
        let engine = engine();
        let viewer = engine.role_permissions(&RoleName::new("viewer")).unwrap();
        assert!(!viewer.contains(&Permission::new("credential:revoke")));
    }

    #[test]
    fn direct_cycle_is_rejected_at_build() {
        let result = RoleCatalog::builder()
            .role("a", RoleRank::Viewer, &["x:read"], &["a"])
            .build();
        assert!(matches!(result, Err(RbacError::InheritanceCycle(_))));
    }

    #[test]
    fn transitive_cycle_is_rejected_at_build() {
        let result = RoleCatalog::builder()
            .role("a", RoleRank::Viewer, &[], &["b"])
            .role("b", RoleRank::Viewer, &[], &["c"])
            .role("c", RoleRank::Viewer, &[], &["a"])
            .build();
        assert!(matches!(result, Err(RbacError::InheritanceCycle(_))));
    }

    #[test]
    fn unknown_parent_is_rejected_at_build() {
        let result = RoleCatalog::builder()
            .role("a", RoleRank::Viewer, &[], &["ghost"])
            .build();
        assert!(matches!(result, Err(RbacError::UnknownRole(_))));
    }

    #[test]
    fn duplicate_role_is_rejected_at_build() {
        let result = RoleCatalog::builder()
            .role("a", RoleRank::Viewer, &[], &[])
            .role("a", RoleRank::Admin, &[], &[])
            .build();
        assert!(matches!(result, Err(RbacError::DuplicateRole(_))));
    }

    #[test]
    fn custom_permissions_apply_without_roles() {
        let engine = engine();
        let user = User::new("u1", vec![]).with_custom_permission(Permission::new("audit:read"));
        assert!(engine.has_permission(&user, &Permission::new("audit:read")));
        assert!(!engine.has_permission(&user, &Permission::new("audit:query")));
    }

    #[test]
    fn has_all_and_any_compose() {
        let engine = engine();
        let user = User::new("u1", vec![RoleName::new("analyst")]);
        let read = Permission::new("audit:read");
        let revoke = Permission::new("credential:revoke");
        assert!(engine.has_all_permissions(&user, &[read.clone()]));
        assert!(!engine.has_all_permissions(&user, &[read.clone(), revoke.clone()]));
        assert!(engine.has_any_permission(&user, &[read, revoke]));
    }

    #[test]
    fn grant_requires_strictly_higher_rank() {
        let engine = engine();
        let admin = RoleName::new("admin");
        let operator = RoleName::new("operator");
        assert!(engine.can_grant_role(&admin, &operator).unwrap());
        assert!(!engine.can_grant_role(&operator, &admin).unwrap());
        // Equal rank never grants; no self-promotion.
        assert!(!engine.can_grant_role(&admin, &admin).unwrap());
    }

    #[test]
    fn check_returns_machine_readable_denial() {
        let engine = engine();
        let user = User::new("u1", vec![RoleName::new("guest")]);
        let decision = engine.check(&user, &Permission::new("tenant:manage"));
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("tenant:manage"));
    }

    #[test]
    fn unknown_role_on_user_grants_nothing() {
        let engine = engine();
        let user = User::new("u1", vec![RoleName::new("deleted_role")]);
        assert!(!engine.has_permission(&user, &Permission::new("session:read")));
    }

    #[test]
    fn replace_catalog_swaps_atomically() {
        let engine = engine();
        let minimal = RoleCatalog::builder()
            .role("only", RoleRank::Viewer, &["thing:read"], &[])
            .build()
            .unwrap();
        engine.replace_catalog(minimal);

        assert!(matches!(
            engine.role_permissions(&RoleName::new("admin")),
            Err(RbacError::UnknownRole(_))
        ));
        let user = User::new("u1", vec![RoleName::new("only")]);
        assert!(engine.has_permission(&user, &Permission::new("thing:read")));
    }
}
