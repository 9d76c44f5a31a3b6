use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::api::models::UserProfile;
use crate::models::Contact;
use crate::storage::{KeyValueStore, StorageError};

pub const USER_KEY: &str = "identity_user";
pub const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("sign-in is not available: {0}")]
    NotInitialized(String),
    #[error("sign-in was cancelled")]
    Cancelled,
    #[error("could not reach the identity provider: {0}")]
    Network(#[from] reqwest::Error),
    #[error("the identity provider rejected the credentials (HTTP {0})")]
    Rejected(u16),
    #[error("no account is signed in")]
    NotSignedIn,
    #[error("could not remember the signed-in account: {0}")]
    Storage(#[from] StorageError),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, access_token: &str) -> Result<UserProfile, IdentityError>;
    async fn sign_out(&self) -> Result<(), IdentityError>;
    fn current_user(&self) -> Option<UserProfile>;
}

/// Google account sign-in. The OAuth consent flow happens elsewhere; this
/// takes the resulting access token, checks it against the userinfo endpoint
/// and keeps the profile in the key-value store.
pub struct GoogleIdentity {
    http: HttpClient,
    userinfo_url: Url,
    store: Arc<dyn KeyValueStore>,
}

impl GoogleIdentity {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Result<Self, IdentityError> {
        let url =
            Url::parse(USERINFO_URL).map_err(|e| IdentityError::NotInitialized(e.to_string()))?;
        Self::with_endpoint(store, url)
    }

    pub fn with_endpoint(
        store: Arc<dyn KeyValueStore>,
        userinfo_url: Url,
    ) -> Result<Self, IdentityError> {
        let http = HttpClient::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| IdentityError::NotInitialized(e.to_string()))?;
        Ok(Self {
            http,
            userinfo_url,
            store,
        })
    }

    fn profile_from(json: &Value, access_token: &str) -> UserProfile {
        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| json.get(*k).and_then(|v| v.as_str()))
                .unwrap_or_default()
                .to_string()
        };
        UserProfile {
            id: text(&["sub", "id"]),
            name: text(&["name", "given_name", "email"]),
            email: text(&["email"]),
            picture: text(&["picture"]),
            access_token: access_token.to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentity {
    async fn sign_in(&self, access_token: &str) -> Result<UserProfile, IdentityError> {
        let token = access_token.trim();
        if token.is_empty() {
            return Err(IdentityError::Cancelled);
        }
        let resp = self
            .http
            .get(self.userinfo_url.clone())
            .bearer_auth(token)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(IdentityError::Rejected(resp.status().as_u16()));
        }
        let json: Value = resp.json().await?;
        let profile = Self::profile_from(&json, token);
        if profile.id.is_empty() {
            return Err(IdentityError::Rejected(200));
        }
        let raw = serde_json::to_string(&profile)
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        self.store.set(USER_KEY, &raw)?;
        info!("signed in as {} <{}>", profile.name, profile.email);
        Ok(profile)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.store.remove(USER_KEY)?;
        info!("signed out");
        Ok(())
    }

    fn current_user(&self) -> Option<UserProfile> {
        match self.store.get(USER_KEY) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!("stored account is unreadable, treating as signed out: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                error!("cannot read stored account: {e}");
                None
            }
        }
    }
}

/// Contact import from a spreadsheet. Requires a signed-in account; the
/// import itself is not implemented.
pub fn import_contacts(identity: &dyn IdentityProvider) -> crate::error::Result<Vec<Contact>> {
    let user = identity.current_user().ok_or(IdentityError::NotSignedIn)?;
    info!("spreadsheet import requested by {}", user.email);
    Err(crate::error::Error::ImportUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::storage::MemoryStore;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn identity_for(server: &MockServer) -> (GoogleIdentity, Arc<dyn KeyValueStore>) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let url = Url::parse(&format!("{}/userinfo", server.uri())).unwrap();
        (GoogleIdentity::with_endpoint(store.clone(), url).unwrap(), store)
    }

    #[tokio::test]
    async fn sign_in_stores_profile_and_sign_out_clears_it() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "42",
                "name": "Ana Costa",
                "email": "ana@example.com",
                "picture": "https://example.com/a.png"
            })))
            .mount(&server)
            .await;
        let (identity, store) = identity_for(&server).await;

        let user = identity.sign_in("tok-1").await.unwrap();
        assert_eq!(user.id, "42");
        assert_eq!(user.access_token, "tok-1");
        assert_eq!(identity.current_user(), Some(user));
        assert!(store.get(USER_KEY).unwrap().is_some());

        identity.sign_out().await.unwrap();
        assert_eq!(identity.current_user(), None);
    }

    #[tokio::test]
    async fn rejected_token_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let (identity, _) = identity_for(&server).await;
        assert!(matches!(
            identity.sign_in("bad").await,
            Err(IdentityError::Rejected(401))
        ));
        assert!(matches!(
            identity.sign_in("  ").await,
            Err(IdentityError::Cancelled)
        ));
        assert_eq!(identity.current_user(), None);
    }

    #[test]
    fn corrupt_stored_user_reads_as_signed_out() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(USER_KEY, "{").unwrap();
        let identity = GoogleIdentity::new(store).unwrap();
        assert_eq!(identity.current_user(), None);
    }

    #[test]
    fn import_needs_a_signed_in_user() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let identity = GoogleIdentity::new(store.clone()).unwrap();
        assert!(matches!(
            import_contacts(&identity),
            Err(Error::Identity(IdentityError::NotSignedIn))
        ));

        let user = UserProfile {
            id: "1".into(),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            picture: String::new(),
            access_token: "t".into(),
        };
        store
            .set(USER_KEY, &serde_json::to_string(&user).unwrap())
            .unwrap();
        assert!(matches!(
            import_contacts(&identity),
            Err(Error::ImportUnavailable)
        ));
    }
}
