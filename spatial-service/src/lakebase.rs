//! Managed PostgreSQL instances with short-lived credentials.
//!
//! Each new session looks the instance up, asks the workspace for a fresh
//! credential and connects over TLS with it.

use std::time::Duration;

use async_trait::async_trait;
use common::config::LakebaseSettings;
use common::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use uuid::Uuid;

use crate::connection_manager::Provisioner;
use crate::postgres::PgSession;

/// Instance metadata returned by the workspace API.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseInstance {
    pub name: String,
    #[serde(default)]
    pub read_write_dns: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Serialize)]
struct CredentialRequest<'a> {
    request_id: String,
    instance_names: [&'a str; 1],
}

#[derive(Deserialize)]
struct DatabaseCredential {
    token: String,
}

/// Thin client for the workspace database API.
pub struct LakebaseClient {
    http: reqwest::Client,
    workspace_host: String,
    workspace_token: String,
}

impl LakebaseClient {
    pub fn new(workspace_host: &str, workspace_token: &str, timeout: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            workspace_host: workspace_host.trim_end_matches('/').to_string(),
            workspace_token: workspace_token.to_string(),
        })
    }

    /// Looks up an instance by name.
    pub async fn get_instance(&self, name: &str) -> AppResult<DatabaseInstance> {
        let url = format!("{}/api/2.0/database/instances/{}", self.workspace_host, name);
        tracing::debug!(instance = name, "Looking up database instance");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.workspace_token)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("instance lookup failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "instance '{}' lookup returned HTTP {}",
                name,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("invalid instance response: {e}")))
    }

    /// Generates a short-lived database credential for `instance_name`.
    pub async fn generate_credential(&self, instance_name: &str) -> AppResult<String> {
        let url = format!("{}/api/2.0/database/credentials", self.workspace_host);
        let body = CredentialRequest {
            request_id: Uuid::new_v4().to_string(),
            instance_names: [instance_name],
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.workspace_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("credential request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "credential request returned HTTP {}",
                response.status()
            )));
        }

        let credential: DatabaseCredential = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("invalid credential response: {e}")))?;
        Ok(credential.token)
    }
}

/// Provisions sessions against a managed instance.
pub struct LakebaseProvisioner {
    client: LakebaseClient,
    settings: LakebaseSettings,
    connect_timeout: Duration,
}

impl LakebaseProvisioner {
    pub fn new(settings: LakebaseSettings, connect_timeout: Duration) -> AppResult<Self> {
        let client = LakebaseClient::new(&settings.workspace_host, &settings.workspace_token, connect_timeout)?;
        Ok(Self {
            client,
            settings,
            connect_timeout,
        })
    }

    /// Connection options for `instance` authenticated with `token`.
    pub fn connect_options(&self, instance: &DatabaseInstance, token: &str) -> AppResult<PgConnectOptions> {
        let host = instance
            .read_write_dns
            .as_deref()
            .filter(|dns| !dns.is_empty())
            .ok_or_else(|| {
                AppError::DatabaseConnection(format!(
                    "instance '{}' has no read-write endpoint (state: {})",
                    instance.name,
                    instance.state.as_deref().unwrap_or("unknown")
                ))
            })?;

        Ok(PgConnectOptions::new()
            .host(host)
            .database(&self.settings.db_name)
            .username(&self.settings.user)
            .password(token)
            .ssl_mode(PgSslMode::Require))
    }
}

#[async_trait]
impl Provisioner for LakebaseProvisioner {
    type Session = PgSession;

    async fn provision(&self) -> AppResult<PgSession> {
        let to_connection_error = |e: AppError| match e {
            AppError::ExternalService(msg) => AppError::DatabaseConnection(msg),
            other => other,
        };

        let instance = self
            .client
            .get_instance(&self.settings.instance_name)
            .await
            .map_err(to_connection_error)?;
        let token = self
            .client
            .generate_credential(&instance.name)
            .await
            .map_err(to_connection_error)?;
        let options = self.connect_options(&instance, &token)?;

        tracing::info!(instance = %instance.name, database = %self.settings.db_name, "Connecting to managed instance");
        PgSession::connect(&options, self.connect_timeout).await
    }
}
