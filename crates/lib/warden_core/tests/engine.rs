//! End-to-end engine scenarios against the in-memory store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::mpsc::UnboundedReceiver;

use warden_core::auth::{Permission, UserAccess};
use warden_core::clock::{Clock, ManualClock};
use warden_core::config::{EngineConfig, RetryPolicy};
use warden_core::identity::Authenticated;
use warden_core::models::{
    Client, Credential, Employee, NewValidation, Principal, PrincipalKind, TokenClaims, TokenKind,
    ValidationKind, ValidationToken,
};
use warden_core::notify::{DeliveryReport, Mail, Mailer, NotificationQueue, NotifyError, TemplateSet};
use warden_core::store::{
    CredentialQuery, CredentialStore, MemoryStore, NewRegistration, Registration, StoreError,
    ValidationQuery,
};
use warden_core::transfer::{ClientDto, CredentialDto, EmployeeDto, ValidationDto};
use warden_core::{ErrorKind, Services};

const PASSWORD: &str = "Valid1@Pass";

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<Mail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: &Mail) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

struct Harness {
    services: Services,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    mailer: Arc<RecordingMailer>,
    reports: UnboundedReceiver<DeliveryReport>,
}

impl Harness {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let mailer = Arc::new(RecordingMailer::default());
        let policy = RetryPolicy {
            attempts: 3,
            backoff: StdDuration::from_millis(1),
        };
        let (queue, reports) = NotificationQueue::start_with_reports(
            mailer.clone(),
            Arc::new(TemplateSet::builtin()),
            policy,
        );
        let config = EngineConfig {
            app_name: "Warden Test".into(),
            bcrypt_cost: 4,
            retry: policy,
            ..EngineConfig::default()
        };
        let services = Services::new(store.clone(), queue, Arc::new(config))
            .with_clock(clock.clone());
        Self {
            services,
            store,
            clock,
            mailer,
            reports,
        }
    }

    fn access(&self, who: &Authenticated) -> Arc<dyn Permission> {
        let claims = TokenClaims {
            sub: who.credential_id.clone(),
            kind: who.kind,
            typ: TokenKind::Access,
            iat: 0,
            exp: i64::MAX,
            jti: "test".into(),
        };
        let store: Arc<dyn CredentialStore> = self.store.clone();
        Arc::new(UserAccess::new(claims, store))
    }

    async fn next_report(&mut self) -> DeliveryReport {
        tokio::time::timeout(StdDuration::from_secs(5), self.reports.recv())
            .await
            .expect("delivery report timed out")
            .expect("report channel closed")
    }

    async fn register_client(&self, email: &str) -> Authenticated {
        let client = ClientDto {
            cgu: Some(true),
            ..ClientDto::default()
        };
        self.services
            .anonymous()
            .register_client(&CredentialDto::new(email, PASSWORD), &client)
            .await
            .unwrap();
        self.login(email, PASSWORD).await
    }

    async fn register_employee(&self, by: Option<&Authenticated>, email: &str) -> Authenticated {
        let engine = match by {
            Some(who) => self.services.user(self.access(who)),
            None => self.services.anonymous(),
        };
        engine
            .register_employee(&CredentialDto::new(email, PASSWORD), &EmployeeDto::default())
            .await
            .unwrap();
        self.login(email, PASSWORD).await
    }

    async fn login(&self, email: &str, password: &str) -> Authenticated {
        self.services
            .anonymous()
            .authenticate(&CredentialDto::new(email, password))
            .await
            .unwrap()
    }

    /// Code of the latest validation of `kind`.
    async fn latest_code(&self, kind: ValidationKind) -> String {
        self.store
            .validations()
            .await
            .into_iter()
            .filter(|v| v.kind == kind)
            .last()
            .expect("no validation of that kind")
            .code
    }
}

// ---------------------------------------------------------------------------
// Registration and authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_creates_mail_validation_and_sends_it() {
    let mut h = Harness::new();
    let client = ClientDto {
        newsletter: Some(true),
        cgu: Some(true),
        ..ClientDto::default()
    };
    let created = h
        .services
        .anonymous()
        .register_client(&CredentialDto::new("a@x.com", PASSWORD), &client)
        .await
        .unwrap();
    assert!(created.newsletter);

    let validations = h.store.validations().await;
    assert_eq!(validations.len(), 1);
    assert_eq!(validations[0].kind, ValidationKind::Mail);
    assert!(!validations[0].validated);
    assert_eq!(validations[0].expires_at, h.clock.now() + Duration::minutes(15));

    let report = h.next_report().await;
    assert!(report.is_delivered());
    assert_eq!(report.to, "a@x.com");
    let sent = h.mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains(&validations[0].code));
    assert!(sent[0].html.contains("Warden Test"));
}

#[tokio::test]
async fn duplicate_registration_is_refused() {
    let h = Harness::new();
    h.register_client("a@x.com").await;
    let client = ClientDto {
        cgu: Some(true),
        ..ClientDto::default()
    };
    let err = h
        .services
        .anonymous()
        .register_client(&CredentialDto::new("A@X.com", PASSWORD), &client)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[tokio::test]
async fn registration_validates_fields_first() {
    let h = Harness::new();
    let engine = h.services.anonymous();
    let no_cgu = ClientDto::default();
    let err = engine
        .register_client(&CredentialDto::new("a@x.com", PASSWORD), &no_cgu)
        .await
        .unwrap_err();
    assert_eq!(err.message(), "value cgu is required");

    let err = engine
        .register_client(&CredentialDto::new("a@x.com", "weak"), &no_cgu)
        .await
        .unwrap_err();
    assert_eq!(err.message(), "value password is invalid");
    assert!(h.store.validations().await.is_empty());
}

#[tokio::test]
async fn authenticate_resolves_principal_kind() {
    let h = Harness::new();
    let client = h.register_client("a@x.com").await;
    assert_eq!(client.kind, PrincipalKind::Client);
    let employee = h.register_employee(None, "boss@x.com").await;
    assert_eq!(employee.kind, PrincipalKind::Employee);
    assert_ne!(client.principal_id, employee.principal_id);
}

#[tokio::test]
async fn wrong_password_is_an_invalid_credential() {
    let h = Harness::new();
    h.register_client("a@x.com").await;
    let engine = h.services.anonymous();

    let err = engine
        .authenticate(&CredentialDto::new("a@x.com", "wrong"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredential);

    let err = engine
        .authenticate(&CredentialDto::new("nobody@x.com", PASSWORD))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ---------------------------------------------------------------------------
// Validation lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mail_validation_is_single_use() {
    let h = Harness::new();
    h.register_client("a@x.com").await;
    let code = h.latest_code(ValidationKind::Mail).await;
    let engine = h.services.anonymous();
    let who = CredentialDto::email("a@x.com");

    let consumed = engine
        .mail_validation(&ValidationDto::new(code.clone()), &who)
        .await
        .unwrap();
    assert!(consumed.validated);

    let err = engine
        .mail_validation(&ValidationDto::new(code), &who)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyValidated);
}

#[tokio::test]
async fn consumption_after_ttl_is_expired() {
    let h = Harness::new();
    h.register_client("a@x.com").await;
    let code = h.latest_code(ValidationKind::Mail).await;

    h.clock.advance(Duration::minutes(16));
    let err = h
        .services
        .anonymous()
        .mail_validation(&ValidationDto::new(code), &CredentialDto::email("a@x.com"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Expired);
}

#[tokio::test]
async fn codes_do_not_cross_owners_or_kinds() {
    let h = Harness::new();
    h.register_client("a@x.com").await;
    h.register_client("b@x.com").await;
    let codes: Vec<String> = h.store.validations().await.into_iter().map(|v| v.code).collect();
    let engine = h.services.anonymous();

    // b's code presented for a.
    let err = engine
        .mail_validation(&ValidationDto::new(codes[1].clone()), &CredentialDto::email("a@x.com"))
        .await;
    if codes[0] != codes[1] {
        assert_eq!(err.unwrap_err().kind(), ErrorKind::NotFound);
    }

    let err = engine
        .password_validation(&ValidationDto::new(codes[0].clone()), &CredentialDto::email("a@x.com"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn bad_checksum_is_rejected_before_lookup() {
    let h = Harness::new();
    let err = h
        .services
        .anonymous()
        .mail_validation(&ValidationDto::new("123456"), &CredentialDto::email("nobody@x.com"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert_eq!(err.message(), "value token is invalid");
}

#[tokio::test]
async fn concurrent_consumptions_have_one_winner() {
    let h = Harness::new();
    h.register_client("a@x.com").await;
    let code = h.latest_code(ValidationKind::Mail).await;

    let mut handles = Vec::new();
    for _ in 0..6 {
        let engine = h.services.anonymous();
        let code = code.clone();
        handles.push(tokio::spawn(async move {
            engine
                .mail_validation(&ValidationDto::new(code), &CredentialDto::email("a@x.com"))
                .await
        }));
    }
    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::AlreadyValidated),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn phone_validations_are_not_mailed() {
    let mut h = Harness::new();
    h.register_client("a@x.com").await;
    h.next_report().await;

    let engine = h.services.anonymous();
    let who = CredentialDto::email("a@x.com");
    engine.issue_validation(ValidationKind::Phone, &who).await.unwrap();
    let password = engine
        .issue_validation(ValidationKind::Password, &who)
        .await
        .unwrap();
    h.next_report().await;

    let sent = h.mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].text.contains(&password.code));
}

#[tokio::test]
async fn issuance_survives_delivery_failure() {
    struct DownMailer;

    #[async_trait]
    impl Mailer for DownMailer {
        async fn send(&self, _mail: &Mail) -> Result<(), NotifyError> {
            Err(NotifyError::Transport("connection refused".into()))
        }
    }

    let store = Arc::new(MemoryStore::new());
    let policy = RetryPolicy {
        attempts: 3,
        backoff: StdDuration::from_millis(1),
    };
    let (queue, mut reports) = NotificationQueue::start_with_reports(
        Arc::new(DownMailer),
        Arc::new(TemplateSet::builtin()),
        policy,
    );
    let config = EngineConfig {
        bcrypt_cost: 4,
        ..EngineConfig::default()
    };
    let services = Services::new(store.clone(), queue, Arc::new(config));
    let client = ClientDto {
        cgu: Some(true),
        ..ClientDto::default()
    };
    services
        .anonymous()
        .register_client(&CredentialDto::new("a@x.com", PASSWORD), &client)
        .await
        .unwrap();

    let report = reports.recv().await.unwrap();
    assert_eq!(report.attempts, 3);
    assert_eq!(report.error.unwrap().kind(), ErrorKind::DeliveryFailed);
    assert_eq!(store.validations().await.len(), 1);
}

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_password_requires_ownership() {
    let h = Harness::new();
    let a = h.register_client("a@x.com").await;
    let b = h.register_client("b@x.com").await;
    let change = CredentialDto::new("a@x.com", "Another1@Pass");

    let err = h.services.anonymous().update_password(&change).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    let err = h
        .services
        .user(h.access(&b))
        .update_password(&change)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    h.services.user(h.access(&a)).update_password(&change).await.unwrap();
    h.login("a@x.com", "Another1@Pass").await;
}

#[tokio::test]
async fn reset_password_with_a_password_validation() {
    let h = Harness::new();
    h.register_client("a@x.com").await;
    let engine = h.services.anonymous();
    engine
        .issue_validation(ValidationKind::Password, &CredentialDto::email("a@x.com"))
        .await
        .unwrap();
    let code = h.latest_code(ValidationKind::Password).await;

    let reset = CredentialDto::new("a@x.com", "Brand1@New");
    engine
        .reset_password(&ValidationDto::new(code.clone()), &reset)
        .await
        .unwrap();
    h.login("a@x.com", "Brand1@New").await;
    let err = engine
        .authenticate(&CredentialDto::new("a@x.com", PASSWORD))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredential);

    let err = engine
        .reset_password(&ValidationDto::new(code), &reset)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyValidated);
}

#[tokio::test]
async fn mail_codes_cannot_reset_passwords() {
    let h = Harness::new();
    h.register_client("a@x.com").await;
    let code = h.latest_code(ValidationKind::Mail).await;
    let err = h
        .services
        .anonymous()
        .reset_password(&ValidationDto::new(code), &CredentialDto::new("a@x.com", "Brand1@New"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ---------------------------------------------------------------------------
// Profiles and authorization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_employee_without_id_is_a_bad_request() {
    let h = Harness::new();
    let err = h
        .services
        .anonymous()
        .update_employee(&EmployeeDto::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert_eq!(err.message(), "value id is required");

    let engine = h.services.anonymous();
    for err in [
        engine.get_employee(&EmployeeDto::default()).await.unwrap_err(),
        engine.delete_employee(&EmployeeDto::default()).await.unwrap_err(),
    ] {
        assert_eq!(err.message(), "value id is required");
    }
    assert_eq!(
        engine.get_client(&ClientDto::default()).await.unwrap_err().message(),
        "value id is required"
    );
}

#[tokio::test]
async fn only_the_first_employee_registers_freely() {
    let h = Harness::new();
    let boss = h.register_employee(None, "boss@x.com").await;

    let err = h
        .services
        .anonymous()
        .register_employee(&CredentialDto::new("two@x.com", PASSWORD), &EmployeeDto::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let client = h.register_client("c@x.com").await;
    let err = h
        .services
        .user(h.access(&client))
        .register_employee(&CredentialDto::new("two@x.com", PASSWORD), &EmployeeDto::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    h.register_employee(Some(&boss), "two@x.com").await;
}

#[tokio::test]
async fn clients_manage_only_their_own_profile() {
    let h = Harness::new();
    let a = h.register_client("a@x.com").await;
    let b = h.register_client("b@x.com").await;
    let as_a = h.services.user(h.access(&a));

    let own = ClientDto {
        id: Some(a.principal_id.clone()),
        newsletter: Some(true),
        cgu: None,
    };
    let updated = as_a.update_client(&own).await.unwrap();
    assert!(updated.newsletter);
    assert!(updated.cgu);

    let err = as_a
        .get_client(&ClientDto::with_id(b.principal_id.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    let err = as_a
        .delete_client(&ClientDto::with_id(b.principal_id.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn employees_manage_every_profile() {
    let h = Harness::new();
    let boss = h.register_employee(None, "boss@x.com").await;
    let client = h.register_client("a@x.com").await;
    let as_boss = h.services.user(h.access(&boss));

    let fetched = as_boss
        .get_client(&ClientDto::with_id(client.principal_id.clone()))
        .await
        .unwrap();
    assert_eq!(fetched.id, client.principal_id);

    let renamed = as_boss
        .update_employee(&EmployeeDto {
            id: Some(boss.principal_id.clone()),
            firstname: Some("  Ada ".into()),
            lastname: None,
        })
        .await
        .unwrap();
    assert_eq!(renamed.firstname.as_deref(), Some("Ada"));

    as_boss
        .delete_client(&ClientDto::with_id(client.principal_id.clone()))
        .await
        .unwrap();
    let err = as_boss
        .get_client(&ClientDto::with_id(client.principal_id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let h = Harness::new();
    let boss = h.register_employee(None, "boss@x.com").await;
    let err = h
        .services
        .user(h.access(&boss))
        .get_employee(&EmployeeDto::with_id("does-not-exist"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.message(), "employee not found");
}

#[tokio::test]
async fn deleted_employee_loses_its_role_immediately() {
    let h = Harness::new();
    let boss = h.register_employee(None, "boss@x.com").await;
    let second = h.register_employee(Some(&boss), "two@x.com").await;
    let client = h.register_client("a@x.com").await;
    let as_second = h.services.user(h.access(&second));
    let target = ClientDto::with_id(client.principal_id.clone());

    as_second.get_client(&target).await.unwrap();
    h.services
        .user(h.access(&boss))
        .delete_employee(&EmployeeDto::with_id(second.principal_id.clone()))
        .await
        .unwrap();
    let err = as_second.get_client(&target).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn bootstrap_stays_closed_after_the_last_employee_leaves() {
    let h = Harness::new();
    let boss = h.register_employee(None, "boss@x.com").await;
    h.services
        .user(h.access(&boss))
        .delete_employee(&EmployeeDto::with_id(boss.principal_id.clone()))
        .await
        .unwrap();

    let err = h
        .services
        .anonymous()
        .register_employee(&CredentialDto::new("two@x.com", PASSWORD), &EmployeeDto::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

/// Delegates to a [`MemoryStore`] but fails the first registration.
struct FailFirstRegistration {
    inner: MemoryStore,
    failed: AtomicBool,
}

#[async_trait]
impl CredentialStore for FailFirstRegistration {
    async fn register(&self, new: &NewRegistration) -> Result<Registration, StoreError> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err(StoreError::Internal("connection reset".into()));
        }
        self.inner.register(new).await
    }
    async fn read_credential(&self, query: CredentialQuery<'_>) -> Result<Credential, StoreError> {
        self.inner.read_credential(query).await
    }
    async fn update_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        self.inner.update_credential(credential).await
    }
    async fn create_validation(&self, new: &NewValidation) -> Result<ValidationToken, StoreError> {
        self.inner.create_validation(new).await
    }
    async fn read_validation(
        &self,
        query: &ValidationQuery<'_>,
    ) -> Result<ValidationToken, StoreError> {
        self.inner.read_validation(query).await
    }
    async fn update_validation(
        &self,
        validation: &ValidationToken,
    ) -> Result<ValidationToken, StoreError> {
        self.inner.update_validation(validation).await
    }
    async fn read_user(&self, credential_id: &str) -> Result<Principal, StoreError> {
        self.inner.read_user(credential_id).await
    }
    async fn read_client(&self, id: &str) -> Result<Client, StoreError> {
        self.inner.read_client(id).await
    }
    async fn update_client(&self, client: &Client) -> Result<Client, StoreError> {
        self.inner.update_client(client).await
    }
    async fn delete_client(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete_client(id).await
    }
    async fn read_employee(&self, id: &str) -> Result<Employee, StoreError> {
        self.inner.read_employee(id).await
    }
    async fn update_employee(&self, employee: &Employee) -> Result<Employee, StoreError> {
        self.inner.update_employee(employee).await
    }
    async fn delete_employee(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete_employee(id).await
    }
    async fn count_employees(&self) -> Result<i64, StoreError> {
        self.inner.count_employees().await
    }
}

#[tokio::test]
async fn failed_registration_leaves_the_email_free() {
    let store = Arc::new(FailFirstRegistration {
        inner: MemoryStore::new(),
        failed: AtomicBool::new(false),
    });
    let mailer = Arc::new(RecordingMailer::default());
    let policy = RetryPolicy {
        attempts: 1,
        backoff: StdDuration::from_millis(1),
    };
    let (queue, mut reports) = NotificationQueue::start_with_reports(
        mailer.clone(),
        Arc::new(TemplateSet::builtin()),
        policy,
    );
    let config = EngineConfig {
        bcrypt_cost: 4,
        retry: policy,
        ..EngineConfig::default()
    };
    let services = Services::new(store.clone(), queue, Arc::new(config));
    let credential = CredentialDto::new("a@x.com", PASSWORD);
    let client = ClientDto {
        cgu: Some(true),
        ..ClientDto::default()
    };

    let err = services
        .anonymous()
        .register_client(&credential, &client)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(matches!(
        store.read_credential(CredentialQuery::Email("a@x.com")).await,
        Err(StoreError::NotFound)
    ));

    services
        .anonymous()
        .register_client(&credential, &client)
        .await
        .unwrap();
    let who = services.anonymous().authenticate(&credential).await.unwrap();
    assert_eq!(who.kind, PrincipalKind::Client);

    tokio::time::timeout(StdDuration::from_secs(5), reports.recv())
        .await
        .expect("delivery report timed out")
        .expect("report channel closed");
    assert_eq!(store.inner.validations().await.len(), 1);
    assert_eq!(mailer.sent.lock().unwrap().len(), 1);
}
