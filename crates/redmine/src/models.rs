use serde::{Deserialize, Deserializer};

/// A tracker account as returned by `GET /users.json`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct User {
    pub id: u32,
    pub login: String,
    #[serde(default)]
    pub mail: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct NamedReference {
    pub id: u32,
    pub name: String,
}

/// An issue as returned by `GET /issues.json`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Issue {
    pub id: u32,
    pub subject: String,
    pub project: NamedReference,
    pub status: NamedReference,
    #[serde(default, deserialize_with = "hours")]
    pub estimated_hours: f64,
    #[serde(default, deserialize_with = "hours")]
    pub spent_hours: f64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct UserList {
    pub users: Vec<User>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct IssueList {
    pub issues: Vec<Issue>,
}

// Redmine omits or nulls the hour fields when no estimate has been entered.
fn hours<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}
