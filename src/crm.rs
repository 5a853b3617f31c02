use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{trace, warn};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::model::{CustomerRecord, ServiceRecord};

const CRM_USER_AGENT: &str = "Splynx-API-Client";

/// Read/update surface of the billing CRM used by the sync run.
#[async_trait]
pub trait CrmGateway: Send + Sync {
    async fn list_customers(&self, status: &str) -> AppResult<Vec<CustomerRecord>>;

    async fn list_internet_services(&self, customer_id: u64) -> AppResult<Vec<ServiceRecord>>;

    /// Writes `geo.marker` only. `Ok(false)` means the CRM answered but refused.
    async fn update_geo_marker(
        &self,
        customer_id: u64,
        service_id: u64,
        marker: &str,
    ) -> AppResult<bool>;
}

/// Splynx API 2.0 client using Basic authentication.
pub struct SplynxClient {
    http: Client,
    base_url: String,
    authorization: SecretString,
}

impl SplynxClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let (base_url, key, secret) = config.splynx_credentials()?;
        let http = Client::builder()
            .user_agent(CRM_USER_AGENT)
            .timeout(config.http_timeout())
            .build()?;
        let encoded = STANDARD.encode(format!(
            "{}:{}",
            key.expose_secret(),
            secret.expose_secret()
        ));
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: SecretString::from(format!("Basic {encoded}")),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        let url = self.url(path);
        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, self.authorization.expose_secret())
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(rejection(url, response).await);
        }
        trace!(%url, "crm listing fetched");
        Ok(response.json().await?)
    }
}

#[async_trait]
impl CrmGateway for SplynxClient {
    async fn list_customers(&self, status: &str) -> AppResult<Vec<CustomerRecord>> {
        let rows = self
            .get_json(
                "admin/customers/customer",
                &[("main_attributes[status]", status)],
            )
            .await?;
        Ok(decode_rows(rows, "customer"))
    }

    async fn list_internet_services(&self, customer_id: u64) -> AppResult<Vec<ServiceRecord>> {
        let rows = self
            .get_json(
                &format!("admin/customers/customer/{customer_id}/internet-services"),
                &[],
            )
            .await?;
        Ok(decode_rows(rows, "internet service"))
    }

    async fn update_geo_marker(
        &self,
        customer_id: u64,
        service_id: u64,
        marker: &str,
    ) -> AppResult<bool> {
        let url = self.url(&format!(
            "admin/customers/customer/{customer_id}/geo-internet-service--{service_id}"
        ));
        let response = self
            .http
            .put(&url)
            .header(AUTHORIZATION, self.authorization.expose_secret())
            .header(ACCEPT, "application/json")
            .json(&json!({ "marker": marker }))
            .send()
            .await?;

        if response.status() == StatusCode::ACCEPTED {
            return Ok(true);
        }
        let err = rejection(url, response).await;
        warn!(%err, "geo marker update rejected");
        Ok(false)
    }
}

// A row without a usable id is dropped rather than failing the whole listing.
fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>, kind: &'static str) -> Vec<T> {
    rows.into_iter()
        .enumerate()
        .filter_map(|(index, row)| match serde_json::from_value(row) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(kind, index, %err, "skipping undecodable crm row");
                None
            }
        })
        .collect()
}

async fn rejection(url: String, response: Response) -> AppError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .ok()
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "No response body".to_string());
    AppError::Crm { url, status, body }
}
