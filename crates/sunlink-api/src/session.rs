// Telemetry cloud authentication
//
// Exchanges credentials for a bearer token at the cloud's login endpoint
// and extracts identity claims from the token. The token is an opaque
// bearer credential: claims are decoded without signature or expiry
// validation and trusted as-is. Sessions are never refreshed -- a fresh
// login happens at the start of every bridge cycle.

use jsonwebtoken::{DecodingKey, Validation, decode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::Error;

/// Production telemetry portal.
pub const DEFAULT_TELEMETRY_URL: &str = "https://portal.riotsystems.cloud";

/// Credential login endpoint on the portal.
const LOGIN_PATH: &str = "/api/auth/login";

/// An authenticated telemetry session.
///
/// Identity fields come straight out of the bearer token's claims and are
/// assumed valid until the telemetry socket rejects the token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub tenant_id: Option<String>,
    pub customer_id: Option<String>,
}

impl Session {
    /// Copy of this session with the bearer token blanked, safe to embed in
    /// a status response.
    pub fn redacted(&self) -> Session {
        Session {
            access_token: String::new(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenClaims {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    tenant_id: Option<String>,
    #[serde(default)]
    customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Login client for the telemetry cloud.
pub struct TelemetryAuth {
    http: reqwest::Client,
    base_url: Url,
}

impl TelemetryAuth {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Exchange credentials for a session.
    ///
    /// One outbound call. Anything short of a response carrying a token
    /// collapses into [`Error::Authentication`]; the remote does not say
    /// why a login failed.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, Error> {
        let url = self.base_url.join(LOGIN_PATH).map_err(Error::InvalidUrl)?;
        debug!(%url, "logging in to telemetry cloud");

        let body = json!({
            "username": email,
            "password": password.expose_secret(),
        });

        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Authentication {
                message: format!("login request failed: {e}"),
            })?;

        let login: LoginResponse = resp.json().await.map_err(|e| Error::Authentication {
            message: format!("unusable login response: {e}"),
        })?;

        let token = login.token.ok_or_else(|| Error::Authentication {
            message: "no access token returned".into(),
        })?;

        decode_token(&token)
    }
}

/// Extract identity claims from a bearer token.
///
/// Pure claims extraction: no network, no signature verification, no expiry
/// check. A token that does not decode at all is an authentication failure.
pub fn decode_token(token: &str) -> Result<Session, Error> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation).map_err(
        |e| Error::Authentication {
            message: format!("undecodable access token: {e}"),
        },
    )?;

    let claims = data.claims;
    Ok(Session {
        access_token: token.to_owned(),
        user_id: claims.user_id,
        session_id: claims.session_id,
        first_name: claims.first_name,
        last_name: claims.last_name,
        tenant_id: claims.tenant_id,
        customer_id: claims.customer_id,
    })
}
