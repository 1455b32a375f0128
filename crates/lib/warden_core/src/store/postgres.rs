//! PostgreSQL store.
//!
//! Registration runs in one transaction; every other operation is a single
//! statement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    CredentialQuery, CredentialStore, NewProfile, NewRegistration, Registration, StoreError,
    ValidationQuery,
};
use crate::models::{
    Client, Credential, Employee, NewValidation, Owner, Principal, PrincipalLink, ValidationKind,
    ValidationToken,
};
use crate::uuid::uuidv7;

type CredentialRow = (
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

type ValidationRow = (
    String,
    String,
    String,
    bool,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
    DateTime<Utc>,
);

type ClientRow = (String, String, bool, bool, DateTime<Utc>, DateTime<Utc>);

type EmployeeRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

const CREDENTIAL_COLUMNS: &str = "id::text, email, password_hash, client_id::text, \
     employee_id::text, created_at, updated_at";

const VALIDATION_COLUMNS: &str = "id::text, token, kind, validated, client_id::text, \
     employee_id::text, expires_at, created_at, updated_at";

const CLIENT_COLUMNS: &str = "id::text, credential_id::text, newsletter, cgu, created_at, updated_at";

const EMPLOYEE_COLUMNS: &str =
    "id::text, credential_id::text, firstname, lastname, created_at, updated_at";

/// Ids are UUIDs in the database. Anything else cannot match a row.
fn parse_id(id: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(id).map_err(|_| StoreError::NotFound)
}

/// Parse an optional id column value for binding.
fn parse_optional_id(id: Option<&str>) -> Result<Option<Uuid>, StoreError> {
    id.map(parse_id).transpose()
}

fn credential_from_row(row: CredentialRow) -> Result<Credential, StoreError> {
    let (id, email, password_hash, client_id, employee_id, created_at, updated_at) = row;
    let principal = PrincipalLink::from_columns(client_id, employee_id).ok_or_else(|| {
        StoreError::Internal(format!("credential {id} links both a client and an employee"))
    })?;
    Ok(Credential {
        id,
        email,
        password_hash,
        principal,
        created_at,
        updated_at,
    })
}

fn validation_from_row(row: ValidationRow) -> Result<ValidationToken, StoreError> {
    let (id, code, kind, validated, client_id, employee_id, expires_at, created_at, updated_at) =
        row;
    let kind = kind.parse::<ValidationKind>().map_err(StoreError::Internal)?;
    let owner = Owner::from_columns(client_id, employee_id)
        .ok_or_else(|| StoreError::Internal(format!("validation {id} has no single owner")))?;
    Ok(ValidationToken {
        id,
        code,
        kind,
        validated,
        owner,
        expires_at,
        created_at,
        updated_at,
    })
}

fn client_from_row(row: ClientRow) -> Client {
    let (id, credential_id, newsletter, cgu, created_at, updated_at) = row;
    Client {
        id,
        credential_id,
        newsletter,
        cgu,
        created_at,
        updated_at,
    }
}

fn employee_from_row(row: EmployeeRow) -> Employee {
    let (id, credential_id, firstname, lastname, created_at, updated_at) = row;
    Employee {
        id,
        credential_id,
        firstname,
        lastname,
        created_at,
        updated_at,
    }
}

/// [`CredentialStore`] backed by a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn register(&self, new: &NewRegistration) -> Result<Registration, StoreError> {
        let mut tx = self.pool.begin().await?;

        let credential_id = uuidv7();
        sqlx::query("INSERT INTO credentials (id, email, password_hash) VALUES ($1, $2, $3)")
            .bind(credential_id)
            .bind(&new.email)
            .bind(&new.password_hash)
            .execute(&mut *tx)
            .await?;

        let profile_id = uuidv7();
        let (principal, client_id, employee_id) = match &new.profile {
            NewProfile::Client { newsletter, cgu } => {
                let row = sqlx::query_as::<_, ClientRow>(&format!(
                    "INSERT INTO clients (id, credential_id, newsletter, cgu) \
                     VALUES ($1, $2, $3, $4) \
                     RETURNING {CLIENT_COLUMNS}"
                ))
                .bind(profile_id)
                .bind(credential_id)
                .bind(*newsletter)
                .bind(*cgu)
                .fetch_one(&mut *tx)
                .await?;
                (Principal::Client(client_from_row(row)), Some(profile_id), None)
            }
            NewProfile::Employee {
                firstname,
                lastname,
            } => {
                let row = sqlx::query_as::<_, EmployeeRow>(&format!(
                    "INSERT INTO employees (id, credential_id, firstname, lastname) \
                     VALUES ($1, $2, $3, $4) \
                     RETURNING {EMPLOYEE_COLUMNS}"
                ))
                .bind(profile_id)
                .bind(credential_id)
                .bind(firstname)
                .bind(lastname)
                .fetch_one(&mut *tx)
                .await?;
                (Principal::Employee(employee_from_row(row)), None, Some(profile_id))
            }
        };

        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "UPDATE credentials SET client_id = $2, employee_id = $3 WHERE id = $1 \
             RETURNING {CREDENTIAL_COLUMNS}"
        ))
        .bind(credential_id)
        .bind(client_id)
        .bind(employee_id)
        .fetch_one(&mut *tx)
        .await?;
        let credential = credential_from_row(row)?;

        let row = sqlx::query_as::<_, ValidationRow>(&format!(
            "INSERT INTO validations (id, token, kind, client_id, employee_id, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {VALIDATION_COLUMNS}"
        ))
        .bind(uuidv7())
        .bind(&new.code)
        .bind(ValidationKind::Mail.as_str())
        .bind(client_id)
        .bind(employee_id)
        .bind(new.expires_at)
        .fetch_one(&mut *tx)
        .await?;
        let validation = validation_from_row(row)?;

        tx.commit().await?;
        Ok(Registration {
            credential,
            principal,
            validation,
        })
    }

    async fn read_credential(&self, query: CredentialQuery<'_>) -> Result<Credential, StoreError> {
        let row = match query {
            CredentialQuery::Email(email) => {
                sqlx::query_as::<_, CredentialRow>(&format!(
                    "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE lower(email) = lower($1)"
                ))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?
            }
            CredentialQuery::Id(id) => {
                sqlx::query_as::<_, CredentialRow>(&format!(
                    "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE id = $1"
                ))
                .bind(parse_id(id)?)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        credential_from_row(row.ok_or(StoreError::NotFound)?)
    }

    async fn update_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        let (client_id, employee_id) = credential.principal.as_columns();
        let result = sqlx::query(
            "UPDATE credentials \
             SET email = $2, password_hash = $3, client_id = $4, employee_id = $5, \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(parse_id(&credential.id)?)
        .bind(&credential.email)
        .bind(&credential.password_hash)
        .bind(parse_optional_id(client_id)?)
        .bind(parse_optional_id(employee_id)?)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn create_validation(&self, new: &NewValidation) -> Result<ValidationToken, StoreError> {
        let (client_id, employee_id) = new.owner.as_columns();
        let row = sqlx::query_as::<_, ValidationRow>(&format!(
            "INSERT INTO validations (id, token, kind, client_id, employee_id, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {VALIDATION_COLUMNS}"
        ))
        .bind(uuidv7())
        .bind(&new.code)
        .bind(new.kind.as_str())
        .bind(parse_optional_id(client_id)?)
        .bind(parse_optional_id(employee_id)?)
        .bind(new.expires_at)
        .fetch_one(&self.pool)
        .await?;
        validation_from_row(row)
    }

    async fn read_validation(
        &self,
        query: &ValidationQuery<'_>,
    ) -> Result<ValidationToken, StoreError> {
        let (client_id, employee_id) = query.owner.as_columns();
        let row = sqlx::query_as::<_, ValidationRow>(&format!(
            "SELECT {VALIDATION_COLUMNS} FROM validations \
             WHERE token = $1 AND kind = $2 \
               AND client_id IS NOT DISTINCT FROM $3 \
               AND employee_id IS NOT DISTINCT FROM $4 \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1"
        ))
        .bind(query.code)
        .bind(query.kind.as_str())
        .bind(parse_optional_id(client_id)?)
        .bind(parse_optional_id(employee_id)?)
        .fetch_optional(&self.pool)
        .await?;
        validation_from_row(row.ok_or(StoreError::NotFound)?)
    }

    async fn update_validation(
        &self,
        validation: &ValidationToken,
    ) -> Result<ValidationToken, StoreError> {
        let id = parse_id(&validation.id)?;
        let row = sqlx::query_as::<_, ValidationRow>(&format!(
            "UPDATE validations SET validated = $2, updated_at = now() \
             WHERE id = $1 AND validated = false \
             RETURNING {VALIDATION_COLUMNS}"
        ))
        .bind(id)
        .bind(validation.validated)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => validation_from_row(row),
            None => {
                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM validations WHERE id = $1)",
                )
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
                if exists {
                    Err(StoreError::Conflict("validation is no longer pending".into()))
                } else {
                    Err(StoreError::NotFound)
                }
            }
        }
    }

    async fn read_user(&self, credential_id: &str) -> Result<Principal, StoreError> {
        let id = parse_id(credential_id)?;
        let client = sqlx::query_as::<_, ClientRow>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients \
             WHERE credential_id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = client {
            return Ok(Principal::Client(client_from_row(row)));
        }
        let employee = sqlx::query_as::<_, EmployeeRow>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees \
             WHERE credential_id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        employee
            .map(|row| Principal::Employee(employee_from_row(row)))
            .ok_or(StoreError::NotFound)
    }

    async fn read_client(&self, id: &str) -> Result<Client, StoreError> {
        let row = sqlx::query_as::<_, ClientRow>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(parse_id(id)?)
        .fetch_optional(&self.pool)
        .await?;
        row.map(client_from_row).ok_or(StoreError::NotFound)
    }

    async fn update_client(&self, client: &Client) -> Result<Client, StoreError> {
        let row = sqlx::query_as::<_, ClientRow>(&format!(
            "UPDATE clients SET newsletter = $2, cgu = $3, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {CLIENT_COLUMNS}"
        ))
        .bind(parse_id(&client.id)?)
        .bind(client.newsletter)
        .bind(client.cgu)
        .fetch_optional(&self.pool)
        .await?;
        row.map(client_from_row).ok_or(StoreError::NotFound)
    }

    async fn delete_client(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE clients SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(parse_id(id)?)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn read_employee(&self, id: &str) -> Result<Employee, StoreError> {
        let row = sqlx::query_as::<_, EmployeeRow>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(parse_id(id)?)
        .fetch_optional(&self.pool)
        .await?;
        row.map(employee_from_row).ok_or(StoreError::NotFound)
    }

    async fn update_employee(&self, employee: &Employee) -> Result<Employee, StoreError> {
        let row = sqlx::query_as::<_, EmployeeRow>(&format!(
            "UPDATE employees SET firstname = $2, lastname = $3, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {EMPLOYEE_COLUMNS}"
        ))
        .bind(parse_id(&employee.id)?)
        .bind(&employee.firstname)
        .bind(&employee.lastname)
        .fetch_optional(&self.pool)
        .await?;
        row.map(employee_from_row).ok_or(StoreError::NotFound)
    }

    async fn delete_employee(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE employees SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(parse_id(id)?)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn count_employees(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
