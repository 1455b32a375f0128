//! Permission evaluation.
//!
//! An acting identity implements [`Permission`]. Capability checks combine
//! three inputs: authentication, contextual rules (ownership among them) and
//! roles. Roles are looked up on every call; nothing is memoized, so a role
//! change between two checks in the same request is visible to the second.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::models::{Client, Credential, Employee, PrincipalKind, TokenClaims};
use crate::store::{CredentialStore, StoreError};

/// Role held by an acting identity, derived from its principal kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Client,
    Employee,
}

impl From<PrincipalKind> for Role {
    fn from(kind: PrincipalKind) -> Self {
        match kind {
            PrincipalKind::Client => Role::Client,
            PrincipalKind::Employee => Role::Employee,
        }
    }
}

/// The four capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Credential,
    Client,
    Employee,
}

/// Something a capability check can target.
pub trait Resource: Send + Sync {
    fn resource_kind(&self) -> ResourceKind;

    /// Credential that owns the resource, if any.
    fn owner_credential_id(&self) -> Option<&str>;
}

/// A resource that does not exist yet. Nobody owns it, so only roles or
/// explicit rules can grant access.
impl Resource for ResourceKind {
    fn resource_kind(&self) -> ResourceKind {
        *self
    }

    fn owner_credential_id(&self) -> Option<&str> {
        None
    }
}

impl Resource for Credential {
    fn resource_kind(&self) -> ResourceKind {
        ResourceKind::Credential
    }

    fn owner_credential_id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

impl Resource for Client {
    fn resource_kind(&self) -> ResourceKind {
        ResourceKind::Client
    }

    fn owner_credential_id(&self) -> Option<&str> {
        Some(&self.credential_id)
    }
}

impl Resource for Employee {
    fn resource_kind(&self) -> ResourceKind {
        ResourceKind::Employee
    }

    fn owner_credential_id(&self) -> Option<&str> {
        Some(&self.credential_id)
    }
}

/// A contextual predicate over the acting credential.
pub trait Rule: Send + Sync {
    fn holds(&self, credential_id: Option<&str>) -> bool;
}

impl<F> Rule for F
where
    F: Fn(Option<&str>) -> bool + Send + Sync,
{
    fn holds(&self, credential_id: Option<&str>) -> bool {
        self(credential_id)
    }
}

/// Holds when the acting credential owns the resource.
pub struct IsOwner<'a>(pub &'a dyn Resource);

impl Rule for IsOwner<'_> {
    fn holds(&self, credential_id: Option<&str>) -> bool {
        match (credential_id, self.0.owner_credential_id()) {
            (Some(actor), Some(owner)) => actor == owner,
            _ => false,
        }
    }
}

const STAFF: &[Role] = &[Role::Employee];

/// Roles that grant `action` on a resource of kind `kind`.
///
/// Employees manage every account. Clients only reach their own records,
/// through ownership.
pub fn granting_roles(_action: Action, _kind: ResourceKind) -> &'static [Role] {
    STAFF
}

/// Capability contract of an acting identity.
#[async_trait]
pub trait Permission: Send + Sync {
    fn is_authenticated(&self) -> bool;

    fn credential_id(&self) -> Option<&str>;

    /// True iff the identity currently holds at least one of `roles`.
    async fn is_granted_by_roles(&self, roles: &[Role]) -> bool;

    /// True iff at least one rule holds.
    fn is_granted_by_rules(&self, rules: &[&dyn Rule]) -> bool {
        let actor = self.credential_id();
        rules.iter().any(|rule| rule.holds(actor))
    }

    /// Authenticated AND (rule-granted OR role-granted). Ownership counts as
    /// a rule for every action but create.
    async fn can(&self, action: Action, resource: &dyn Resource, rules: &[&dyn Rule]) -> bool {
        if !self.is_authenticated() {
            return false;
        }
        if self.is_granted_by_rules(rules) {
            return true;
        }
        if action != Action::Create && IsOwner(resource).holds(self.credential_id()) {
            return true;
        }
        self.is_granted_by_roles(granting_roles(action, resource.resource_kind()))
            .await
    }

    async fn can_read(&self, resource: &dyn Resource, rules: &[&dyn Rule]) -> bool {
        self.can(Action::Read, resource, rules).await
    }

    async fn can_create(&self, resource: &dyn Resource, rules: &[&dyn Rule]) -> bool {
        self.can(Action::Create, resource, rules).await
    }

    async fn can_update(&self, resource: &dyn Resource, rules: &[&dyn Rule]) -> bool {
        self.can(Action::Update, resource, rules).await
    }

    async fn can_delete(&self, resource: &dyn Resource, rules: &[&dyn Rule]) -> bool {
        self.can(Action::Delete, resource, rules).await
    }
}

/// An unauthenticated caller. Every capability is refused.
#[derive(Debug, Default, Clone, Copy)]
pub struct Anonymous;

#[async_trait]
impl Permission for Anonymous {
    fn is_authenticated(&self) -> bool {
        false
    }

    fn credential_id(&self) -> Option<&str> {
        None
    }

    async fn is_granted_by_roles(&self, _roles: &[Role]) -> bool {
        false
    }
}

/// An identity proven by a freshly consumed validation code instead of a
/// session. It holds no role, so it only reaches what its credential owns.
#[derive(Debug, Clone)]
pub struct ValidationGrant {
    credential_id: String,
}

impl ValidationGrant {
    pub fn new(credential_id: impl Into<String>) -> Self {
        Self {
            credential_id: credential_id.into(),
        }
    }
}

#[async_trait]
impl Permission for ValidationGrant {
    fn is_authenticated(&self) -> bool {
        true
    }

    fn credential_id(&self) -> Option<&str> {
        Some(&self.credential_id)
    }

    async fn is_granted_by_roles(&self, _roles: &[Role]) -> bool {
        false
    }
}

/// A caller holding a verified access token. Roles come from the store.
#[derive(Clone)]
pub struct UserAccess {
    claims: TokenClaims,
    store: Arc<dyn CredentialStore>,
}

impl UserAccess {
    pub fn new(claims: TokenClaims, store: Arc<dyn CredentialStore>) -> Self {
        Self { claims, store }
    }

    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }

    /// Current roles of the acting credential. Empty if its profile is gone.
    pub async fn roles(&self) -> Vec<Role> {
        match self.store.read_user(&self.claims.sub).await {
            Ok(principal) => vec![Role::from(principal.kind())],
            Err(StoreError::NotFound) => Vec::new(),
            Err(e) => {
                warn!(credential_id = %self.claims.sub, error = %e, "role lookup failed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Permission for UserAccess {
    fn is_authenticated(&self) -> bool {
        true
    }

    fn credential_id(&self) -> Option<&str> {
        Some(&self.claims.sub)
    }

    async fn is_granted_by_roles(&self, roles: &[Role]) -> bool {
        let held = self.roles().await;
        roles.iter().any(|role| held.contains(role))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{Principal, TokenKind};
    use crate::store::memory::MemoryStore;
    use crate::store::{NewProfile, NewRegistration, Registration};

    fn claims(sub: &str, kind: PrincipalKind) -> TokenClaims {
        TokenClaims {
            sub: sub.to_string(),
            kind,
            typ: TokenKind::Access,
            iat: 0,
            exp: i64::MAX,
            jti: "jti".into(),
        }
    }

    fn client_of(credential_id: &str) -> Client {
        Client {
            id: "client-x".into(),
            credential_id: credential_id.into(),
            newsletter: false,
            cgu: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn registered(store: &MemoryStore, email: &str, profile: NewProfile) -> Registration {
        let new = NewRegistration {
            email: email.into(),
            password_hash: "hash".into(),
            profile,
            code: "123455".into(),
            expires_at: Utc::now() + chrono::Duration::minutes(15),
        };
        store.register(&new).await.unwrap()
    }

    async fn employee_credential(store: &MemoryStore, email: &str) -> (Credential, Employee) {
        let profile = NewProfile::Employee {
            firstname: Some("Ada".into()),
            lastname: None,
        };
        let done = registered(store, email, profile).await;
        match done.principal {
            Principal::Employee(employee) => (done.credential, employee),
            other => panic!("expected employee, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn anonymous_is_refused_everything() {
        let resource = client_of("c1");
        let allow_all = |_: Option<&str>| true;
        assert!(!Anonymous.can_read(&resource, &[&allow_all]).await);
        assert!(!Anonymous.can_update(&resource, &[]).await);
        assert!(!Anonymous.is_authenticated());
        assert!(Anonymous.credential_id().is_none());
    }

    #[tokio::test]
    async fn owner_may_read_update_delete_but_not_create() {
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
        let access = UserAccess::new(claims("c1", PrincipalKind::Client), store);
        let own = client_of("c1");
        assert!(access.can_read(&own, &[]).await);
        assert!(access.can_update(&own, &[]).await);
        assert!(access.can_delete(&own, &[]).await);
        assert!(!access.can_create(&own, &[]).await);

        let foreign = client_of("c2");
        assert!(!access.can_read(&foreign, &[]).await);
    }

    #[tokio::test]
    async fn rules_grant_when_any_holds() {
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
        let access = UserAccess::new(claims("c1", PrincipalKind::Client), store);
        let never = |_: Option<&str>| false;
        let is_c1 = |id: Option<&str>| id == Some("c1");
        assert!(!access.is_granted_by_rules(&[&never]));
        assert!(access.is_granted_by_rules(&[&never, &is_c1]));
        assert!(access.can_create(&client_of("c2"), &[&is_c1]).await);
    }

    #[tokio::test]
    async fn employees_are_granted_by_role() {
        let store = Arc::new(MemoryStore::new());
        let (credential, _) = employee_credential(&store, "boss@x.com").await;
        let access = UserAccess::new(
            claims(&credential.id, PrincipalKind::Employee),
            store.clone() as Arc<dyn CredentialStore>,
        );
        assert!(access.is_granted_by_roles(&[Role::Employee]).await);
        assert!(!access.is_granted_by_roles(&[Role::Client]).await);
        assert!(access.can_update(&client_of("someone-else"), &[]).await);
        assert!(access.can_create(&client_of("someone-else"), &[]).await);
    }

    #[tokio::test]
    async fn role_changes_are_seen_by_the_next_check() {
        let store = Arc::new(MemoryStore::new());
        let (credential, employee) = employee_credential(&store, "boss@x.com").await;
        let access = UserAccess::new(
            claims(&credential.id, PrincipalKind::Employee),
            store.clone() as Arc<dyn CredentialStore>,
        );
        let target = client_of("someone-else");

        assert!(access.can_update(&target, &[]).await);
        store.delete_employee(&employee.id).await.unwrap();
        assert!(!access.can_update(&target, &[]).await);
    }

    #[tokio::test]
    async fn validation_grant_reaches_only_its_own_credential() {
        let store = MemoryStore::new();
        let client = || NewProfile::Client {
            newsletter: false,
            cgu: true,
        };
        let own = registered(&store, "a@x.com", client()).await.credential;
        let other = registered(&store, "b@x.com", client()).await.credential;
        let grant = ValidationGrant::new(own.id.clone());
        assert!(grant.can_update(&own, &[]).await);
        assert!(!grant.can_update(&other, &[]).await);
        assert!(!grant.can_create(&ResourceKind::Employee, &[]).await);
    }

    #[tokio::test]
    async fn unowned_resources_need_a_role() {
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
        let access = UserAccess::new(claims("c1", PrincipalKind::Client), store);
        assert!(!access.can_create(&ResourceKind::Employee, &[]).await);
        assert!(!access.can_read(&ResourceKind::Client, &[]).await);
    }
}
