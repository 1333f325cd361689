use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{CoreError, CoreResult};

/// Role asserted by the identity provider for the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Commuter,
    Operator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Commuter => "commuter",
            Role::Operator => "operator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "commuter" => Ok(Role::Commuter),
            "operator" => Ok(Role::Operator),
            "admin" => Ok(Role::Admin),
            other => Err(CoreError::ValidationError(format!("Unknown role: {}", other))),
        }
    }
}

/// An already-authenticated caller. The engine trusts the role; ownership
/// checks against individual records are done by the engine itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub user_id: String,
    pub role: Role,
}

impl Requester {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins and operators may manage trips.
    pub fn require_scheduler(&self) -> CoreResult<()> {
        match self.role {
            Role::Admin | Role::Operator => Ok(()),
            Role::Commuter => Err(CoreError::Forbidden(
                "Admins and operators only".to_string(),
            )),
        }
    }

    pub fn require_admin(&self) -> CoreResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(CoreError::Forbidden("Admins only".to_string()))
        }
    }

    /// True when the requester owns the record or is an admin.
    pub fn may_act_for(&self, owner_id: &str) -> bool {
        self.is_admin() || self.user_id == owner_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("operator".parse::<Role>().unwrap(), Role::Operator);
        assert!("guest".parse::<Role>().is_err());
    }

    #[test]
    fn test_scheduler_roles() {
        assert!(Requester::new("u1", Role::Admin).require_scheduler().is_ok());
        assert!(Requester::new("u1", Role::Operator).require_scheduler().is_ok());
        assert!(matches!(
            Requester::new("u1", Role::Commuter).require_scheduler(),
            Err(CoreError::Forbidden(_))
        ));
    }

    #[test]
    fn test_ownership() {
        let commuter = Requester::new("alice", Role::Commuter);
        assert!(commuter.may_act_for("alice"));
        assert!(!commuter.may_act_for("bob"));
        assert!(Requester::new("root", Role::Admin).may_act_for("bob"));
    }
}
