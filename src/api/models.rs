use serde::{Deserialize, Serialize};

/// Profile of the signed-in account.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub picture: String,
    pub access_token: String,
}
