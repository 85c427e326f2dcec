//! HTTP client for the banking data service

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// Environment variable holding the service base URL
pub const BANKING_API_URL_ENV: &str = "BANKING_API_BASE_URL";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Available balance for a single account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceInfo {
    /// Current balance in rupees
    #[serde(alias = "cbalance")]
    pub balance: f64,
    /// Balance as-of date
    #[serde(alias = "tdate")]
    pub as_of: Option<String>,
}

/// Thin client over the bank's read-only search endpoints.
///
/// Search endpoints take a JSON filter object and return record
/// arrays whose field sets are owned by the backend, so records stay
/// as raw JSON values here.
#[derive(Debug, Clone)]
pub struct BankingApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl BankingApiClient {
    /// Create a client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::NotConfigured(format!(
                "{BANKING_API_URL_ENV} must be set"
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Request(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    /// Create a client from `BANKING_API_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var(BANKING_API_URL_ENV)
            .map_err(|_| Error::NotConfigured(format!("{BANKING_API_URL_ENV} must be set")))?;
        Self::new(base_url)
    }

    async fn post_search(&self, endpoint: &str, filters: &Value) -> Result<Vec<Value>> {
        let url = format!("{}{endpoint}", self.base_url);
        debug!(%url, "banking API search");
        let response = self.http.post(&url).json(filters).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        serde_json::from_str(&body).map_err(|e| Error::InvalidResponse(e.to_string()))
    }

    /// Search bank branches by filter (branch code, name, city, PIN, status).
    #[instrument(skip(self, filters))]
    pub async fn search_branches(&self, filters: &Value) -> Result<Vec<Value>> {
        self.post_search("/branch/search", filters).await
    }

    /// Search deposit schemes by filter (account type, name, tenure, status).
    #[instrument(skip(self, filters))]
    pub async fn search_deposit_schemes(&self, filters: &Value) -> Result<Vec<Value>> {
        self.post_search("/depositscheme/search", filters).await
    }

    /// Search loan schemes by filter (name, category, tenure, interest type, status).
    #[instrument(skip(self, filters))]
    pub async fn search_loan_schemes(&self, filters: &Value) -> Result<Vec<Value>> {
        self.post_search("/loanscheme/search", filters).await
    }

    /// Look up the available balance for one account.
    #[instrument(skip(self))]
    pub async fn get_account_balance(
        &self,
        office_code: &str,
        account_number: &str,
    ) -> Result<BalanceInfo> {
        let url = format!("{}/account/balance", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "ocode": office_code,
                "accountno": account_number,
            }))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        serde_json::from_str(&body).map_err(|e| Error::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_stripped() {
        let client = BankingApiClient::new("http://bank.local/").unwrap();
        assert_eq!(client.base_url, "http://bank.local");
    }

    #[test]
    fn test_empty_base_url_rejected() {
        assert!(matches!(
            BankingApiClient::new(""),
            Err(Error::NotConfigured(_))
        ));
    }

    #[test]
    fn test_balance_info_aliases() {
        let info: BalanceInfo =
            serde_json::from_str(r#"{"cbalance": 50000.0, "tdate": "2025-03-31"}"#).unwrap();
        assert_eq!(info.balance, 50000.0);
        assert_eq!(info.as_of.as_deref(), Some("2025-03-31"));
    }
}
