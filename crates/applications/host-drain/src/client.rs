//! HTTP client for the orchestration API
//!
//! Every call is a signed GET:
//!
//! ```text
//! <url>?apiKey=..&command=listHosts&response=json&...&signature=..
//! ```
//!
//! The signature is HMAC-SHA1 over the sorted, percent-encoded, lower-cased
//! query string, base64-encoded. Responses are wrapped in
//! `<command lowercased>response`; list responses omit the collection key
//! entirely when nothing matches.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha1::Sha1;
use tracing::{debug, warn};

use crate::api::{
    AllocationChange, CloudApi, Domain, Host, JobId, JobStatus, PlatformVm, ProjectScope, UserVm,
};
use crate::config::Credentials;
use crate::error::{DrainError, Result};

type HmacSha1 = Hmac<Sha1>;

/// Signed client for a CloudStack/Cosmic-compatible API endpoint
pub struct CosmicClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    secret_key: String,
}

impl CosmicClient {
    /// Create a client for the given credentials
    pub fn new(credentials: &Credentials) -> Result<Self> {
        if !credentials.verify_tls {
            debug!(url = %credentials.url, "TLS certificate verification disabled");
        }

        let client = reqwest::Client::builder()
            .timeout(credentials.timeout)
            .danger_accept_invalid_certs(!credentials.verify_tls)
            .build()?;

        Ok(Self {
            client,
            url: credentials.url.trim_end_matches(['?', '/']).to_string(),
            api_key: credentials.api_key.clone(),
            secret_key: credentials.secret_key.clone(),
        })
    }

    /// Issue `command` and return the unwrapped response object
    async fn call(&self, command: &str, params: &[(&str, &str)]) -> Result<Value> {
        let mut all: Vec<(&str, &str)> = vec![
            ("command", command),
            ("response", "json"),
            ("apiKey", self.api_key.as_str()),
        ];
        all.extend_from_slice(params);

        let query = signed_query(&all, &self.secret_key)?;
        debug!(command = %command, params = ?params, "API request");

        let response = self
            .client
            .get(format!("{}?{}", self.url, query))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        unwrap_response(command, status, &body)
    }

    async fn list<T: DeserializeOwned>(
        &self,
        command: &str,
        entity: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let response = self.call(command, params).await?;
        let items: Vec<T> = collection(&response, entity)?;
        debug!(command = %command, count = items.len(), "API list");
        Ok(items)
    }

    async fn start_job(&self, command: &str, params: &[(&str, &str)]) -> Result<JobId> {
        let response = self.call(command, params).await?;
        response
            .get("jobid")
            .and_then(Value::as_str)
            .map(JobId::from)
            .ok_or_else(|| DrainError::malformed(command, "missing jobid"))
    }
}

#[async_trait]
impl CloudApi for CosmicClient {
    async fn list_hosts(&self) -> Result<Vec<Host>> {
        self.list("listHosts", "host", &[("listall", "true")]).await
    }

    async fn list_domains(&self) -> Result<Vec<Domain>> {
        self.list("listDomains", "domain", &[("listall", "true")]).await
    }

    async fn list_virtual_machines(&self, host_id: &str, scope: ProjectScope) -> Result<Vec<UserVm>> {
        let mut params = vec![("hostid", host_id), ("listall", "true")];
        if scope == ProjectScope::AllProjects {
            params.push(("projectid", "-1"));
        }
        self.list("listVirtualMachines", "virtualmachine", &params).await
    }

    async fn list_system_vms(&self, host_id: &str) -> Result<Vec<PlatformVm>> {
        self.list("listSystemVms", "systemvm", &[("hostid", host_id), ("listall", "true")])
            .await
    }

    async fn list_routers(&self, host_id: &str) -> Result<Vec<PlatformVm>> {
        self.list("listRouters", "router", &[("hostid", host_id), ("listall", "true")])
            .await
    }

    async fn update_host_allocation_state(&self, host_id: &str, change: AllocationChange) -> Result<()> {
        self.call(
            "updateHost",
            &[("id", host_id), ("allocationstate", change.as_str())],
        )
        .await?;
        Ok(())
    }

    async fn migrate_virtual_machine(&self, host_id: &str, vm_id: &str) -> Result<JobId> {
        self.start_job(
            "migrateVirtualMachine",
            &[("hostid", host_id), ("virtualmachineid", vm_id)],
        )
        .await
    }

    async fn migrate_system_vm(&self, host_id: &str, vm_id: &str) -> Result<JobId> {
        self.start_job(
            "migrateSystemVm",
            &[("hostid", host_id), ("virtualmachineid", vm_id)],
        )
        .await
    }

    async fn query_async_job_result(&self, job_id: &JobId) -> Result<JobStatus> {
        let command = "queryAsyncJobResult";
        let response = self.call(command, &[("jobid", job_id.0.as_str())]).await?;
        job_status(command, &response)
    }
}

/// Build the signed query string for `params`
///
/// Parameters are sorted by lower-cased key; the HMAC is computed over the
/// lower-cased form of the encoded string and appended as `signature`.
pub fn signed_query(params: &[(&str, &str)], secret_key: &str) -> Result<String> {
    let mut sorted = params.to_vec();
    sorted.sort_by_key(|(key, _)| key.to_lowercase());

    let query = sorted
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    let mut mac = HmacSha1::new_from_slice(secret_key.as_bytes())
        .map_err(|e| DrainError::config(format!("invalid secret key: {}", e)))?;
    mac.update(query.to_lowercase().as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    Ok(format!("{}&signature={}", query, urlencoding::encode(&signature)))
}

/// Strip the `<command>response` wrapper and surface error payloads
pub fn unwrap_response(command: &str, status: u16, body: &str) -> Result<Value> {
    let success = (200..300).contains(&status);

    let parsed: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) if success => return Err(DrainError::Json(e)),
        Err(_) => return Err(DrainError::api(command, status, body.trim())),
    };

    let key = format!("{}response", command.to_lowercase());
    let inner = parsed
        .get(&key)
        .or_else(|| parsed.get("errorresponse"))
        .cloned()
        .ok_or_else(|| DrainError::malformed(command, format!("missing '{}'", key)))?;

    if let Some(code) = inner.get("errorcode").and_then(Value::as_u64) {
        let text = inner
            .get("errortext")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(DrainError::api(command, code as u16, text));
    }

    if !success {
        return Err(DrainError::api(command, status, "request failed"));
    }

    Ok(inner)
}

/// Extract the `entity` collection from a list response (absent = empty)
pub fn collection<T: DeserializeOwned>(response: &Value, entity: &str) -> Result<Vec<T>> {
    match response.get(entity) {
        Some(items) => Ok(serde_json::from_value(items.clone())?),
        None => Ok(Vec::new()),
    }
}

fn job_status(command: &str, response: &Value) -> Result<JobStatus> {
    let code = response
        .get("jobstatus")
        .and_then(Value::as_i64)
        .ok_or_else(|| DrainError::malformed(command, "missing jobstatus"))?;

    let status = JobStatus::from_code(code)
        .ok_or_else(|| DrainError::malformed(command, format!("unknown jobstatus {}", code)))?;

    if status == JobStatus::Failed {
        if let Some(text) = response
            .get("jobresult")
            .and_then(|r| r.get("errortext"))
            .and_then(Value::as_str)
        {
            warn!(error = %text, "Async job failed");
        }
    }

    Ok(status)
}
