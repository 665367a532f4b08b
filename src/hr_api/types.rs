use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Response of the token introspection endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenIntrospection {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub company_id: Option<String>,
}

/// Company owning the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nb_active_contracts: u64,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    /// Any other field the API returns, kept for reports.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorStatus {
    Active,
    #[default]
    #[serde(other)]
    Inactive,
}

impl fmt::Display for CollaboratorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("Active"),
            Self::Inactive => f.write_str("Inactive"),
        }
    }
}

/// Employee record returned by the collaborator listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: CollaboratorStatus,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

impl Collaborator {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// One page of the collaborator listing.
#[derive(Debug, Clone)]
pub struct CollaboratorPage {
    pub items: Vec<Collaborator>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CollaboratorsResponse {
    #[serde(default)]
    pub collaborators: Vec<Collaborator>,
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PageMeta {
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Metadata describing one pay period's document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayslipRecord {
    /// Filled in by the client from the request path.
    #[serde(default)]
    pub collaborator_id: String,
    #[serde(deserialize_with = "int_or_string")]
    pub year: i32,
    #[serde(deserialize_with = "int_or_string")]
    pub month: u32,
    pub contract_id: String,
    pub payslip_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PayslipsResponse {
    #[serde(default)]
    pub payslips: Option<Vec<PayslipRecord>>,
}

/// Accepts `2024` as well as `"2024"`.
fn int_or_string<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64> + std::str::FromStr,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(value) => T::try_from(value)
            .map_err(|_| serde::de::Error::custom(format!("number out of range: {value}"))),
        Raw::Str(value) => value
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("not a number: {value:?}"))),
    }
}
