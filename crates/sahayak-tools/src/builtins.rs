//! Built-in banking lookup tools
//!
//! Each tool wraps one read-only endpoint of the banking data
//! service. List results are truncated to a per-tool cap with a note
//! disclosing how many more records exist, to bound prompt size.

use crate::client::BankingApiClient;
use crate::registry::{Tool, ToolRegistry};
use async_trait::async_trait;
use sahayak_llm::ToolDefinition;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

const BRANCH_RESULT_CAP: usize = 20;
const SCHEME_RESULT_CAP: usize = 15;

/// Keep only the non-null string/number fields of the model-supplied
/// arguments so empty filters don't reach the backend.
fn clean_filters(args: &Value) -> Value {
    match args.as_object() {
        Some(map) => {
            let cleaned: serde_json::Map<String, Value> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Value::Object(cleaned)
        }
        None => json!({}),
    }
}

/// Serialize up to `cap` records with a disclosure note when more exist.
fn format_results(results: Vec<Value>, cap: usize, kind: &str, hint: &str) -> String {
    let total = results.len();
    if total == 0 {
        return format!("No {kind} found matching the criteria.");
    }
    let shown: Vec<Value> = results.into_iter().take(cap).collect();
    let mut payload = json!({
        "results": shown,
        "count": total,
    });
    if total > cap {
        payload["note"] = json!(format!(
            "Showing {cap} out of {total} total {kind}. {hint}"
        ));
    }
    payload.to_string()
}

struct BranchSearchTool {
    client: BankingApiClient,
}

#[async_trait]
impl Tool for BranchSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "search_branches",
            "Search for bank branches by code, name, city, PIN code, or status. \
             Use this when users ask about branch locations, addresses, or \
             finding branches in a specific city.",
            json!({
                "type": "object",
                "properties": {
                    "bcode": {"type": "string", "description": "Branch code"},
                    "name": {"type": "string", "description": "Branch name"},
                    "city": {"type": "string", "description": "City name"},
                    "pin": {"type": "string", "description": "PIN code"},
                    "status": {"type": "string", "description": "Branch status (Active/Inactive)"}
                }
            }),
        )
    }

    async fn execute(&self, args: Value) -> String {
        match self.client.search_branches(&clean_filters(&args)).await {
            Ok(results) => format_results(
                results,
                BRANCH_RESULT_CAP,
                "branches",
                "Add more specific filters to narrow results.",
            ),
            Err(e) => {
                warn!(error = %e, "branch search failed");
                format!("Error searching branches: {e}")
            }
        }
    }
}

struct DepositSchemeSearchTool {
    client: BankingApiClient,
}

#[async_trait]
impl Tool for DepositSchemeSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "search_deposit_schemes",
            "Search deposit schemes (Savings, Recurring Deposit, Fixed Deposit, \
             MIS). Use this for questions about deposit interest rates, tenure, \
             or available deposit account types. Amounts are in Indian Rupees (₹).",
            json!({
                "type": "object",
                "properties": {
                    "actype": {"type": "string", "description": "Account type (SB, RD, FD, MIS)"},
                    "name": {"type": "string", "description": "Scheme name"},
                    "tenure": {"type": "number", "description": "Tenure period"},
                    "tunit": {"type": "string", "description": "Tenure unit (Year/Month)"},
                    "status": {"type": "string", "description": "Scheme status (Running/Closed)"}
                }
            }),
        )
    }

    async fn execute(&self, args: Value) -> String {
        match self
            .client
            .search_deposit_schemes(&clean_filters(&args))
            .await
        {
            Ok(results) => format_results(
                results,
                SCHEME_RESULT_CAP,
                "deposit schemes",
                "Add more specific filters (like actype: FD/RD/SB/MIS) to narrow results.",
            ),
            Err(e) => {
                warn!(error = %e, "deposit scheme search failed");
                format!("Error searching deposit schemes: {e}")
            }
        }
    }
}

struct LoanSchemeSearchTool {
    client: BankingApiClient,
}

#[async_trait]
impl Tool for LoanSchemeSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "search_loan_schemes",
            "Search loan schemes by name, category, tenure, or interest type. \
             Use this for questions about personal, home, vehicle, or education \
             loans, secured vs unsecured loans, or loan interest rates. Amounts \
             are in Indian Rupees (₹).",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Loan scheme name"},
                    "category": {"type": "string", "description": "Loan category (Secured/Unsecured)"},
                    "tenure": {"type": "integer", "description": "Loan tenure in months"},
                    "interesttype": {"type": "string", "description": "Interest type (Flat/Reducing)"},
                    "status": {"type": "string", "description": "Scheme status (Running/Closed)"}
                }
            }),
        )
    }

    async fn execute(&self, args: Value) -> String {
        match self.client.search_loan_schemes(&clean_filters(&args)).await {
            Ok(results) => format_results(
                results,
                SCHEME_RESULT_CAP,
                "loan schemes",
                "Add more specific filters (like category: Secured/Unsecured) to narrow results.",
            ),
            Err(e) => {
                warn!(error = %e, "loan scheme search failed");
                format!("Error searching loan schemes: {e}")
            }
        }
    }
}

struct AccountBalanceTool {
    client: BankingApiClient,
}

#[async_trait]
impl Tool for AccountBalanceTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_account_balance",
            "Get the available balance for a specific account. Requires the \
             office code and account number. Balance is in Indian Rupees (₹).",
            json!({
                "type": "object",
                "properties": {
                    "ocode": {"type": "string", "description": "Office code"},
                    "accountno": {"type": "string", "description": "Account number"}
                },
                "required": ["ocode", "accountno"]
            }),
        )
    }

    async fn execute(&self, args: Value) -> String {
        let office_code = args.get("ocode").and_then(Value::as_str).unwrap_or("");
        let account_number = args.get("accountno").and_then(Value::as_str).unwrap_or("");
        if office_code.is_empty() || account_number.is_empty() {
            return "Error: both ocode and accountno are required.".to_string();
        }

        match self
            .client
            .get_account_balance(office_code, account_number)
            .await
        {
            Ok(info) => {
                let as_of = info.as_of.as_deref().unwrap_or("today");
                format!(
                    "Available balance for account {account_number}: ₹{:.2} (as of {as_of})",
                    info.balance
                )
            }
            Err(e) => {
                warn!(error = %e, "balance lookup failed");
                format!("Could not retrieve balance for account {account_number}: {e}")
            }
        }
    }
}

/// Register the four banking lookups on a registry.
pub fn register_banking_tools(registry: &mut ToolRegistry, client: BankingApiClient) {
    registry.register(Arc::new(BranchSearchTool {
        client: client.clone(),
    }));
    registry.register(Arc::new(DepositSchemeSearchTool {
        client: client.clone(),
    }));
    registry.register(Arc::new(LoanSchemeSearchTool {
        client: client.clone(),
    }));
    registry.register(Arc::new(AccountBalanceTool { client }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_filters_drops_nulls() {
        let cleaned = clean_filters(&json!({"city": "Patna", "pin": null}));
        assert_eq!(cleaned, json!({"city": "Patna"}));
    }

    #[test]
    fn test_clean_filters_non_object_becomes_empty() {
        assert_eq!(clean_filters(&json!("city")), json!({}));
    }

    #[test]
    fn test_format_results_under_cap_has_no_note() {
        let out = format_results(vec![json!({"name": "Main"})], 20, "branches", "hint");
        assert!(out.contains("\"count\":1"));
        assert!(!out.contains("note"));
    }

    #[test]
    fn test_format_results_over_cap_discloses_total() {
        let records: Vec<Value> = (0..25).map(|i| json!({"id": i})).collect();
        let out = format_results(records, 20, "branches", "Narrow the search.");
        assert!(out.contains("Showing 20 out of 25 total branches"));
    }

    #[test]
    fn test_format_results_empty() {
        let out = format_results(vec![], 20, "branches", "hint");
        assert_eq!(out, "No branches found matching the criteria.");
    }

    #[test]
    fn test_register_banking_tools_registers_four() {
        let client = BankingApiClient::new("http://bank.local").unwrap();
        let mut registry = ToolRegistry::new();
        register_banking_tools(&mut registry, client);
        assert_eq!(registry.len(), 4);
        let names: Vec<String> = registry
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert!(names.contains(&"search_branches".to_string()));
        assert!(names.contains(&"get_account_balance".to_string()));
    }
}
