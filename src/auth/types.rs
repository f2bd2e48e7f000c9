//! Types for authentication and identity

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Coarse-grained authorization class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Company,
    Admin,
}

impl Role {
    /// Wire and storage form
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Company => "COMPANY",
            Role::Admin => "ADMIN",
        }
    }

    /// Landing page for a signed-in principal of this role
    pub fn home_route(&self) -> &'static str {
        match self {
            Role::User => "/dashboard",
            Role::Company => "/company/dashboard",
            Role::Admin => "/admin/dashboard",
        }
    }

    /// Sign-in page for this role
    pub fn login_route(&self) -> &'static str {
        match self {
            Role::User => "/login",
            Role::Company => "/company/login",
            Role::Admin => "/admin/login",
        }
    }

    /// Human-readable account kind used in notices
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Company => "company",
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
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "USER" => Ok(Role::User),
            "COMPANY" => Ok(Role::Company),
            "ADMIN" => Ok(Role::Admin),
            other => Err(Error::invalid_session(format!("unknown role: {}", other))),
        }
    }
}

/// Backend ids arrive as numbers or strings depending on the endpoint
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Uint(n) => n.to_string(),
    })
}

/// Profile of a rider (also used for admins)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Profile of a bus company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub company_id: String,
    pub company_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_person: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
}

/// Authenticated principal's profile data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Identity {
    Rider(RiderProfile),
    Company(CompanyProfile),
}

impl Identity {
    /// Parse an identity payload using the role as discriminator.
    ///
    /// The two shapes share no required fields, so the payload alone cannot
    /// be trusted to say which one it is.
    pub fn from_value(role: Role, value: serde_json::Value) -> Result<Self> {
        match role {
            Role::User | Role::Admin => Ok(Identity::Rider(serde_json::from_value(value)?)),
            Role::Company => Ok(Identity::Company(serde_json::from_value(value)?)),
        }
    }

    /// Display name of the principal
    pub fn display_name(&self) -> &str {
        match self {
            Identity::Rider(rider) => &rider.name,
            Identity::Company(company) => &company.company_name,
        }
    }

    /// Backend identifier of the principal
    pub fn id(&self) -> &str {
        match self {
            Identity::Rider(rider) => &rider.id,
            Identity::Company(company) => &company.company_id,
        }
    }

    fn matches(&self, role: Role) -> bool {
        matches!(
            (self, role),
            (Identity::Rider(_), Role::User | Role::Admin) | (Identity::Company(_), Role::Company)
        )
    }
}

/// Role together with the identity it describes.
///
/// The only way to hold a session in memory; the constructor refuses a role
/// whose identity shape does not match.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    role: Role,
    identity: Identity,
}

impl Principal {
    /// Pair a role with an identity, rejecting mismatched shapes
    pub fn new(role: Role, identity: Identity) -> Result<Self> {
        if !identity.matches(role) {
            return Err(Error::invalid_session(format!(
                "{} role cannot carry a {} identity",
                role,
                match identity {
                    Identity::Rider(_) => "rider",
                    Identity::Company(_) => "company",
                }
            )));
        }
        Ok(Self { role, identity })
    }

    /// A rider signed in as USER
    pub fn rider(profile: RiderProfile) -> Self {
        Self {
            role: Role::User,
            identity: Identity::Rider(profile),
        }
    }

    /// A company signed in as COMPANY
    pub fn company(profile: CompanyProfile) -> Self {
        Self {
            role: Role::Company,
            identity: Identity::Company(profile),
        }
    }

    /// An administrator
    pub fn admin(profile: RiderProfile) -> Self {
        Self {
            role: Role::Admin,
            identity: Identity::Rider(profile),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn into_parts(self) -> (Role, Identity) {
        (self.role, self.identity)
    }
}

/// Email/password pair posted to the login endpoints
#[derive(Debug, Clone, Serialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
        }
    }
}

/// Rider sign-up form
#[derive(Debug, Clone, Serialize)]
pub struct UserRegistration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Company sign-up form
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRegistration {
    pub company_name: String,
    pub contact_person: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub address: String,
    pub license_number: String,
    pub password: String,
}

/// Registration body, tagged with the role being registered
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role")]
pub enum Registration {
    #[serde(rename = "USER")]
    User(UserRegistration),
    #[serde(rename = "COMPANY")]
    Company(CompanyRegistration),
}

/// Successful login/registration body
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub role: Role,
    pub data: serde_json::Value,
}

impl AuthResponse {
    /// Turn the response into a checked principal
    pub fn into_principal(self) -> Result<(Principal, String)> {
        let identity = Identity::from_value(self.role, self.data)?;
        let principal = Principal::new(self.role, identity)?;
        Ok((principal, self.token))
    }
}
