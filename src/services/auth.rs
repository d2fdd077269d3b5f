// src/services/auth.rs

//! Login against the EC3 REST auth endpoint.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::CredentialProvider;
use crate::utils::http::endpoint;

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    key: String,
}

/// Exchanges a username/password for a bearer token. No refresh.
pub struct AuthClient {
    client: Client,
    login_url: Url,
}

impl AuthClient {
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            login_url: endpoint(base_url, "rest-auth/login")?,
        })
    }

    /// Log in and return the `Authorization` header value.
    pub async fn authenticate(&self, provider: &dyn CredentialProvider) -> Result<String> {
        let credentials = provider.credentials()?;
        log::debug!("Logging in as {}", credentials.username);

        let response = self
            .client
            .post(self.login_url.clone())
            .json(&LoginRequest {
                username: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        let token = parse_login_response(status, &body)?;
        log::info!("Fetched a new token");
        Ok(token)
    }
}

/// Turn a login response into `Bearer <key>`.
pub fn parse_login_response(status: u16, body: &str) -> Result<String> {
    if status != 200 {
        return Err(AppError::authentication(status, body));
    }
    let parsed: LoginResponse =
        serde_json::from_str(body).map_err(|_| AppError::authentication(status, body))?;
    Ok(format!("Bearer {}", parsed.key))
}
