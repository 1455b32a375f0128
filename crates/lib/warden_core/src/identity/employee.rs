//! Employee accounts.
//!
//! Creating an employee requires the create capability on employees, which
//! only employees hold. The very first employee is the exception: until one
//! has ever been registered, registration is open so the system can be
//! bootstrapped. Soft-deleted employees still count, so the window never
//! reopens.

use tracing::{info, warn};

use super::{UserService, ensure, or_not_found};
use crate::auth::ResourceKind;
use crate::error::{EngineError, Result};
use crate::models::{Employee, Principal};
use crate::store::NewProfile;
use crate::transfer::{CredentialDto, EmployeeDto};
use crate::validate;

/// Trimmed, with blank treated as absent.
fn name(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl UserService {
    pub async fn register_employee(
        &self,
        credential: &CredentialDto,
        employee: &EmployeeDto,
    ) -> Result<Employee> {
        let email = validate::email(credential.email.as_deref())?;
        let password = validate::password(credential.password.as_deref())?;

        if self.store().count_employees().await? > 0 {
            ensure(self.access.can_create(&ResourceKind::Employee, &[]).await)?;
        } else {
            warn!(email = %email, "no employee yet, registering the first one without authorization");
        }

        let registration = self
            .register_principal(
                &email,
                password,
                NewProfile::Employee {
                    firstname: name(employee.firstname.as_deref()),
                    lastname: name(employee.lastname.as_deref()),
                },
            )
            .await?;
        let Principal::Employee(profile) = registration.principal else {
            return Err(EngineError::internal("employee registration stored another profile"));
        };

        info!(employee_id = %profile.id, "employee registered");
        Ok(profile)
    }

    pub async fn update_employee(&self, dto: &EmployeeDto) -> Result<Employee> {
        let id = validate::required("id", dto.id.as_deref())?;
        let mut employee = self.read_employee(id).await?;
        ensure(self.access.can_update(&employee, &[]).await)?;

        if let Some(firstname) = dto.firstname.as_deref() {
            employee.firstname = name(Some(firstname));
        }
        if let Some(lastname) = dto.lastname.as_deref() {
            employee.lastname = name(Some(lastname));
        }
        let employee = self
            .store()
            .update_employee(&employee)
            .await
            .map_err(or_not_found("employee not found"))?;
        info!(employee_id = %employee.id, "employee updated");
        Ok(employee)
    }

    /// Soft delete.
    pub async fn delete_employee(&self, dto: &EmployeeDto) -> Result<()> {
        let id = validate::required("id", dto.id.as_deref())?;
        let employee = self.read_employee(id).await?;
        ensure(self.access.can_delete(&employee, &[]).await)?;

        self.store()
            .delete_employee(&employee.id)
            .await
            .map_err(or_not_found("employee not found"))?;
        info!(employee_id = %employee.id, "employee deleted");
        Ok(())
    }

    pub async fn get_employee(&self, dto: &EmployeeDto) -> Result<Employee> {
        let id = validate::required("id", dto.id.as_deref())?;
        let employee = self.read_employee(id).await?;
        ensure(self.access.can_read(&employee, &[]).await)?;
        Ok(employee)
    }

    async fn read_employee(&self, id: &str) -> Result<Employee> {
        self.store()
            .read_employee(id)
            .await
            .map_err(or_not_found("employee not found"))
    }
}
