//! OAuth credentials for the remote mirror: the stored blob, lazy refresh,
//! and the authorization-code flow.

use serde::{Deserialize, Serialize};

use crate::db::now_ms;
use crate::error::HubError;
use crate::mirror::MirrorError;

/// Opaque credential blob persisted per workspace. Serialized form is the
/// `token_json` column; the engine round-trips it through here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    /// Epoch ms after which the access token is stale. None = assume valid.
    #[serde(default)]
    pub expiry: Option<i64>,
}

impl StoredCredential {
    pub fn from_json(raw: &str) -> Result<Self, MirrorError> {
        serde_json::from_str(raw).map_err(|e| MirrorError::BadPayload(format!("credential: {e}")))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expiry.is_some_and(|exp| exp <= now)
    }
}

#[derive(Deserialize)]
struct TokenEndpointBody {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Refresh the credential when its access token is stale. Returns the
/// credential and whether it changed; persisting a changed credential is the
/// caller's explicit step.
pub async fn refresh_if_expired(
    client: &reqwest::Client,
    cred: StoredCredential,
) -> Result<(StoredCredential, bool), MirrorError> {
    if !cred.is_expired(now_ms()) {
        return Ok((cred, false));
    }
    let Some(refresh_token) = cred.refresh_token.clone() else {
        return Err(MirrorError::ReauthRequired);
    };

    let res = client
        .post(&cred.token_uri)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", cred.client_id.as_str()),
            ("client_secret", cred.client_secret.as_str()),
        ])
        .send()
        .await?;

    let status = res.status();
    if status.is_client_error() {
        // the grant was revoked or the refresh token is dead
        return Err(MirrorError::ReauthRequired);
    }
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(MirrorError::Api {
            status: status.as_u16(),
            body: crate::util::truncate_chars(&body, 200),
        });
    }

    let body: TokenEndpointBody = res.json().await?;
    let refreshed = StoredCredential {
        access_token: body.access_token,
        refresh_token: body.refresh_token.or(Some(refresh_token)),
        expiry: Some(now_ms() + body.expires_in.unwrap_or(3600) * 1000),
        ..cred
    };
    Ok((refreshed, true))
}

/// Client registration for the authorization-code flow, read from a
/// client-secrets JSON file (`{"web": {...}}` or `{"installed": {...}}`).
#[derive(Debug, Clone)]
pub struct OauthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    #[serde(default)]
    web: Option<ClientSecrets>,
    #[serde(default)]
    installed: Option<ClientSecrets>,
}

#[derive(Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
    auth_uri: String,
    token_uri: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

const DEFAULT_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/documents",
    "https://www.googleapis.com/auth/drive.metadata.readonly",
];

impl OauthConfig {
    pub fn from_client_secrets(path: &str, redirect_uri: Option<String>) -> Result<Self, HubError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| HubError::Internal(format!("read {path}: {e}")))?;
        let file: ClientSecretsFile = serde_json::from_str(&raw)
            .map_err(|e| HubError::Internal(format!("parse {path}: {e}")))?;
        let secrets = file
            .web
            .or(file.installed)
            .ok_or_else(|| HubError::Internal(format!("{path}: no web/installed section")))?;

        let redirect_uri = redirect_uri
            .or_else(|| secrets.redirect_uris.first().cloned())
            .ok_or_else(|| HubError::Internal("no redirect URI configured".into()))?;

        Ok(Self {
            client_id: secrets.client_id,
            client_secret: secrets.client_secret,
            auth_uri: secrets.auth_uri,
            token_uri: secrets.token_uri,
            redirect_uri,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Redirect URL for `authorize(workspace)`. The workspace id travels in
    /// `state` and comes back on the callback.
    pub fn authorize_url(&self, workspace_id: &str) -> Result<String, HubError> {
        let url = url::Url::parse_with_params(
            &self.auth_uri,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", self.scopes.join(" ").as_str()),
                ("access_type", "offline"),
                ("include_granted_scopes", "true"),
                ("prompt", "consent"),
                ("state", workspace_id),
            ],
        )
        .map_err(|e| HubError::Internal(format!("auth_uri: {e}")))?;
        Ok(url.to_string())
    }

    /// Exchange the callback code for a stored credential.
    pub async fn exchange_code(
        &self,
        client: &reqwest::Client,
        code: &str,
    ) -> Result<StoredCredential, MirrorError> {
        let res = client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(MirrorError::Api {
                status: status.as_u16(),
                body: crate::util::truncate_chars(&body, 200),
            });
        }

        let body: TokenEndpointBody = res.json().await?;
        Ok(StoredCredential {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            token_uri: self.token_uri.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            expiry: Some(now_ms() + body.expires_in.unwrap_or(3600) * 1000),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_roundtrip() {
        let cred = StoredCredential {
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            token_uri: "https://oauth2.example/token".into(),
            client_id: "cid".into(),
            client_secret: "cs".into(),
            expiry: Some(1_700_000_000_000),
        };
        let parsed = StoredCredential::from_json(&cred.to_json()).unwrap();
        assert_eq!(parsed, cred);
    }

    #[test]
    fn expiry_check() {
        let mut cred = StoredCredential {
            access_token: "at".into(),
            refresh_token: None,
            token_uri: "t".into(),
            client_id: "c".into(),
            client_secret: "s".into(),
            expiry: None,
        };
        // no expiry recorded — assume usable
        assert!(!cred.is_expired(now_ms()));
        cred.expiry = Some(now_ms() - 1);
        assert!(cred.is_expired(now_ms()));
    }

    #[test]
    fn authorize_url_carries_state() {
        let cfg = OauthConfig {
            client_id: "cid".into(),
            client_secret: "cs".into(),
            auth_uri: "https://accounts.example/o/oauth2/auth".into(),
            token_uri: "https://oauth2.example/token".into(),
            redirect_uri: "http://127.0.0.1:8787/auth/google/callback".into(),
            scopes: vec!["scope-a".into()],
        };
        let url = cfg.authorize_url("ws-1").unwrap();
        assert!(url.starts_with("https://accounts.example/o/oauth2/auth?"));
        assert!(url.contains("state=ws-1"));
        assert!(url.contains("access_type=offline"));
    }
}
