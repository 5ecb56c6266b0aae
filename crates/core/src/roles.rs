use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of workflow roles. The approval chain only involves the five
/// chain roles (procurement through accounts); supervisor and design roles
/// exist as requesters and routing targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    SiteSupervisor,
    MepSupervisor,
    Procurement,
    ProjectManager,
    Design,
    Estimation,
    Accounts,
    TechnicalDirector,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 8] = [
        Role::SiteSupervisor,
        Role::MepSupervisor,
        Role::Procurement,
        Role::ProjectManager,
        Role::Design,
        Role::Estimation,
        Role::Accounts,
        Role::TechnicalDirector,
    ];

    /// Roles that render decisions in the fixed approval chain, in order.
    pub const CHAIN: [Role; 5] = [
        Role::Procurement,
        Role::ProjectManager,
        Role::Estimation,
        Role::TechnicalDirector,
        Role::Accounts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SiteSupervisor => "siteSupervisor",
            Self::MepSupervisor => "mepSupervisor",
            Self::Procurement => "procurement",
            Self::ProjectManager => "projectManager",
            Self::Design => "design",
            Self::Estimation => "estimation",
            Self::Accounts => "accounts",
            Self::TechnicalDirector => "technicalDirector",
        }
    }

    /// Human-readable name used in routing messages and notifications.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SiteSupervisor => "Site Supervisor",
            Self::MepSupervisor => "MEP Supervisor",
            Self::Procurement => "Procurement",
            Self::ProjectManager => "Project Manager",
            Self::Design => "Design",
            Self::Estimation => "Estimation",
            Self::Accounts => "Accounts",
            Self::TechnicalDirector => "Technical Director",
        }
    }

    pub fn is_chain_role(&self) -> bool {
        Self::CHAIN.contains(self)
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key = value.trim().to_ascii_lowercase().replace(['-', '_'], "");
        match key.as_str() {
            "sitesupervisor" => Ok(Self::SiteSupervisor),
            "mepsupervisor" => Ok(Self::MepSupervisor),
            "procurement" => Ok(Self::Procurement),
            "projectmanager" => Ok(Self::ProjectManager),
            "design" => Ok(Self::Design),
            "estimation" => Ok(Self::Estimation),
            "accounts" => Ok(Self::Accounts),
            "technicaldirector" => Ok(Self::TechnicalDirector),
            _ => Err(UnknownRole(value.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static per-role authority record. Approval limits and permissions are
/// configuration, not user data; defaults live here and can be overridden
/// from the config file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleProfile {
    pub role: Role,
    pub approval_limit: Decimal,
    pub permissions: Vec<String>,
}

pub fn default_role_profiles() -> Vec<RoleProfile> {
    fn profile(role: Role, approval_limit: Decimal, permissions: &[&str]) -> RoleProfile {
        RoleProfile {
            role,
            approval_limit,
            permissions: permissions.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    vec![
        profile(Role::SiteSupervisor, Decimal::ZERO, &["purchase.create", "purchase.view"]),
        profile(Role::MepSupervisor, Decimal::ZERO, &["purchase.create", "purchase.view"]),
        profile(
            Role::Procurement,
            Decimal::new(25_000_00, 2),
            &["purchase.view", "purchase.decide"],
        ),
        profile(
            Role::ProjectManager,
            Decimal::new(100_000_00, 2),
            &["purchase.view", "purchase.decide"],
        ),
        profile(Role::Design, Decimal::ZERO, &["purchase.view"]),
        profile(
            Role::Estimation,
            Decimal::new(250_000_00, 2),
            &["purchase.view", "purchase.decide"],
        ),
        profile(
            Role::Accounts,
            Decimal::new(500_000_00, 2),
            &["purchase.view", "purchase.decide", "payment.release"],
        ),
        profile(
            Role::TechnicalDirector,
            Decimal::new(1_000_000_00, 2),
            &["purchase.view", "purchase.decide"],
        ),
    ]
}

/// The acting user as supplied by the (already-verified) auth layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::{default_role_profiles, Role};

    #[test]
    fn role_round_trips_through_string_form() {
        for role in Role::ALL {
            let parsed: Role = role.as_str().parse().expect("role parses back");
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn role_parse_accepts_kebab_and_snake_variants() {
        assert_eq!("project-manager".parse::<Role>(), Ok(Role::ProjectManager));
        assert_eq!("technical_director".parse::<Role>(), Ok(Role::TechnicalDirector));
        assert_eq!("MEPSupervisor".parse::<Role>(), Ok(Role::MepSupervisor));
    }

    #[test]
    fn role_parse_rejects_unknown_names() {
        assert!("foreman".parse::<Role>().is_err());
    }

    #[test]
    fn chain_roles_are_marked_as_deciders() {
        for role in Role::CHAIN {
            assert!(role.is_chain_role());
        }
        assert!(!Role::SiteSupervisor.is_chain_role());
        assert!(!Role::Design.is_chain_role());
    }

    #[test]
    fn default_profiles_cover_every_role() {
        let profiles = default_role_profiles();
        for role in Role::ALL {
            assert!(
                profiles.iter().any(|profile| profile.role == role),
                "missing default profile for {role}"
            );
        }
    }
}
