use emporia_shared::pii::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role granted by the identity collaborator. Admins are store operators;
/// everyone else is a customer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Admin,
}

/// The authenticated caller, as established by the identity service.
/// Everything downstream of the HTTP layer reasons about this type,
/// never about tokens or headers.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
    pub email: Option<Masked<String>>,
}

impl Principal {
    pub fn customer(id: Uuid) -> Self {
        Self {
            id,
            role: Role::Customer,
            email: None,
        }
    }

    pub fn admin(id: Uuid) -> Self {
        Self {
            id,
            role: Role::Admin,
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(Masked(email.into()));
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
