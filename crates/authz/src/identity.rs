use serde::Serialize;
use serde_json::{Map, Value};

const DEFAULT_ROLE: &str = "user";

/// Caller identity derived from verified token claims.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub subject: String,
    pub name: String,
    pub email: String,
    pub tenant: Option<String>,
    pub roles: Vec<String>,
    #[serde(skip)]
    pub claims: Map<String, Value>,
}

impl Identity {
    /// Build an identity from the claim set of a verified token.
    ///
    /// The display name falls back through `name`, `preferred_username` and
    /// `email`, then to `user_` plus the first eight characters of `sub`.
    pub fn from_claims(claims: Map<String, Value>) -> Self {
        let text = |key: &str| {
            claims
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let subject = text("sub").or_else(|| text("oid")).unwrap_or_default();
        let name = text("name")
            .or_else(|| text("preferred_username"))
            .or_else(|| text("email"))
            .unwrap_or_else(|| format!("user_{}", subject.chars().take(8).collect::<String>()));
        let email = text("email")
            .or_else(|| text("preferred_username"))
            .or_else(|| text("upn"))
            .unwrap_or_default();
        let tenant = text("tid");

        let roles: Vec<String> = claims
            .get("roles")
            .and_then(Value::as_array)
            .map(|roles| {
                roles
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let roles = if roles.is_empty() {
            vec![DEFAULT_ROLE.to_string()]
        } else {
            roles
        };

        Self {
            subject,
            name,
            email,
            tenant,
            roles,
            claims,
        }
    }

    /// Fixed identity handed out for the local development token.
    pub fn demo() -> Self {
        Self {
            subject: "demo-user".to_string(),
            name: "Demo User".to_string(),
            email: "demo@example.com".to_string(),
            tenant: None,
            roles: vec![DEFAULT_ROLE.to_string()],
            claims: Map::new(),
        }
    }
}
