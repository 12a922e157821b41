//! Registration service client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ProvisionError, Provisioner, Registration};

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    #[serde(rename = "registrationId")]
    registration_id: &'a str,
    key: &'a str,
    #[serde(rename = "modelId")]
    model_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    status: String,
    #[serde(rename = "assignedHost", default)]
    assigned_host: String,
}

/// Provisioner backed by the registration service's REST endpoint.
///
/// Registers the device under the fleet's model ID so the endpoint files
/// it under the right device template. Registration is an upsert on the
/// service side, so repeated calls are safe.
pub struct RestProvisioner {
    client: reqwest::Client,
    endpoint: String,
    model_id: String,
}

impl RestProvisioner {
    pub fn new(endpoint: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model_id: model_id.into(),
        }
    }
}

#[async_trait]
impl Provisioner for RestProvisioner {
    async fn provision(
        &self,
        station_id: &str,
        device_key: &str,
    ) -> Result<Registration, ProvisionError> {
        let url = format!("{}/register", self.endpoint.trim_end_matches('/'));
        debug!(station_id, %url, "registering with the provisioning service");

        let response = self
            .client
            .post(&url)
            .json(&RegisterRequest {
                registration_id: station_id,
                key: device_key,
                model_id: &self.model_id,
            })
            .send()
            .await
            .map_err(|e| ProvisionError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| ProvisionError::Request(e.to_string()))?;

        let body: RegisterResponse = response
            .json()
            .await
            .map_err(|e| ProvisionError::Request(e.to_string()))?;

        debug!(station_id, status = %body.status, "registration status");
        if body.status != "assigned" || body.assigned_host.is_empty() {
            return Err(ProvisionError::Rejected(body.status));
        }

        Ok(Registration {
            assigned_host: body.assigned_host,
        })
    }
}
