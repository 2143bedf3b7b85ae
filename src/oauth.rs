use crate::config::Credentials;
use crate::error::{Result, TickError};
use crate::token::{is_expired, now_millis, TokenSet, TokenStore};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

pub const SCOPE: &str = "tasks:read tasks:write";

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Convert a grant response into a stored token. A refresh response
    /// that omits `refresh_token` keeps the previous one.
    pub fn into_token_set(self, now_ms: i64, previous_refresh: Option<&str>) -> TokenSet {
        let refresh_token = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous_refresh.map(str::to_string))
            .unwrap_or_default();
        TokenSet {
            access_token: self.access_token,
            refresh_token,
            expires_at: now_ms.saturating_add(self.expires_in.saturating_mul(1000)),
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            stored_at: now_ms,
        }
    }
}

/// The two OAuth grants the client performs against the token endpoint.
#[async_trait]
pub trait TokenGrant: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<TokenSet>;
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet>;
}

pub struct HttpTokenGrant {
    credentials: Credentials,
    client: reqwest::Client,
    token_url: String,
}

impl HttpTokenGrant {
    pub fn new(credentials: Credentials, client: reqwest::Client) -> Self {
        let token_url = credentials.region.token_url().to_string();
        Self {
            credentials,
            client,
            token_url,
        }
    }

    #[cfg(test)]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> std::result::Result<TokenResponse, String> {
        let url = self.token_url.as_str();
        tracing::debug!(url, grant_type = form[0].1, "token request");

        let response = self
            .client
            .post(url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let body = response.text().await.map_err(|e| e.to_string())?;
        if !status.is_success() {
            return Err(format!("HTTP {}: {}", status.as_u16(), body));
        }
        serde_json::from_str(&body).map_err(|e| format!("unexpected token response ({}): {}", e, body))
    }
}

#[async_trait]
impl TokenGrant for HttpTokenGrant {
    async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        let c = &self.credentials;
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", c.redirect_uri.as_str()),
            ("client_id", c.client_id.as_str()),
            ("client_secret", c.client_secret.as_str()),
            ("scope", SCOPE),
        ];
        let response = self
            .post_form(&form)
            .await
            .map_err(TickError::TokenExchangeFailed)?;
        Ok(response.into_token_set(now_millis(), None))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        let c = &self.credentials;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", c.client_id.as_str()),
            ("client_secret", c.client_secret.as_str()),
        ];
        let response = self
            .post_form(&form)
            .await
            .map_err(TickError::TokenRefreshFailed)?;
        Ok(response.into_token_set(now_millis(), Some(refresh_token)))
    }
}

/// Owns the token store and the grant client; hands out a valid bearer
/// token for every outbound call.
pub struct TokenManager {
    store: Box<dyn TokenStore>,
    grant: Box<dyn TokenGrant>,
}

impl TokenManager {
    pub fn new(store: Box<dyn TokenStore>, grant: Box<dyn TokenGrant>) -> Self {
        Self { store, grant }
    }

    /// Returns the stored access token, refreshing it first when it is
    /// within the expiry buffer. No network call when still valid.
    pub async fn get_valid_access_token(&self) -> Result<String> {
        let token = self.store.load()?.ok_or(TickError::NotAuthenticated)?;
        if !is_expired(&token) {
            return Ok(token.access_token);
        }
        if token.refresh_token.is_empty() {
            return Err(TickError::NotAuthenticated);
        }

        tracing::info!("access token expired, refreshing");
        let refreshed = self.grant.refresh(&token.refresh_token).await?;
        self.store.save(&refreshed)?;
        Ok(refreshed.access_token)
    }

    pub async fn login(&self, code: &str) -> Result<TokenSet> {
        let token = self.grant.exchange_code(code).await?;
        self.store.save(&token)?;
        tracing::info!(expires_at = token.expires_at, "authorization code exchanged");
        Ok(token)
    }

    pub async fn force_refresh(&self) -> Result<TokenSet> {
        let token = self.store.load()?.ok_or(TickError::NotAuthenticated)?;
        if token.refresh_token.is_empty() {
            return Err(TickError::NotAuthenticated);
        }
        let refreshed = self.grant.refresh(&token.refresh_token).await?;
        self.store.save(&refreshed)?;
        tracing::info!(expires_at = refreshed.expires_at, "token refreshed");
        Ok(refreshed)
    }
}

pub fn authorize_url(credentials: &Credentials, state: &str) -> Result<String> {
    let url = Url::parse_with_params(
        credentials.region.authorize_url(),
        &[
            ("client_id", credentials.client_id.as_str()),
            ("scope", SCOPE),
            ("state", state),
            ("redirect_uri", credentials.redirect_uri.as_str()),
            ("response_type", "code"),
        ],
    )
    .map_err(|e| TickError::Other(format!("invalid authorize url: {}", e)))?;
    Ok(url.to_string())
}

pub fn new_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Accept either a bare authorization code or the full redirect URL. When
/// `expected_state` is given, a redirect URL must carry that same `state`.
pub fn extract_code(input: &str, expected_state: Option<&str>) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TickError::Validation(
            "authorization code cannot be empty".to_string(),
        ));
    }
    let Ok(url) = Url::parse(input) else {
        return Ok(input.to_string());
    };

    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };
    if let Some(expected) = expected_state {
        if param("state").as_deref() != Some(expected) {
            return Err(TickError::Validation(
                "redirect URL state does not match this login attempt".to_string(),
            ));
        }
    }
    param("code")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| TickError::Validation("redirect URL has no 'code' parameter".to_string()))
}
