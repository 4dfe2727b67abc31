/// Jupiter Aggregator V6 integration
/// Supplies the quote and swap-instruction capabilities the scanner consumes

use crate::flash_loan::opportunity_detector::MergedQuote;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use solana_sdk::pubkey::Pubkey;

/// Jupiter quote response
///
/// Amounts are in the smallest unit of their mint. Fields this type does not
/// model are kept in `extra` so a quote can be sent back to Jupiter unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    #[serde(with = "as_string")]
    pub input_mint: Pubkey,
    #[serde(with = "as_string")]
    pub in_amount: u64,
    #[serde(with = "as_string")]
    pub output_mint: Pubkey,
    #[serde(with = "as_string")]
    pub out_amount: u64,
    #[serde(with = "as_string")]
    pub other_amount_threshold: u64,
    pub swap_mode: String,
    pub slippage_bps: u16,
    pub price_impact_pct: String,
    pub route_plan: Vec<RoutePlanStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_slot: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_taken: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Quote {
    /// Venue labels of every leg, in execution order
    pub fn route_labels(&self) -> String {
        self.route_plan
            .iter()
            .map(|step| step.swap_info.label.as_deref().unwrap_or("unknown"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlanStep {
    pub swap_info: SwapInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<u8>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInfo {
    pub amm_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: String,
    pub out_amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_mint: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parameters of a single quote request
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount: u64,
    pub slippage_bps: u16,
    pub excluded_dexes: Vec<String>,
    pub only_direct_routes: bool,
}

impl QuoteRequest {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("inputMint", self.input_mint.to_string()),
            ("outputMint", self.output_mint.to_string()),
            ("amount", self.amount.to_string()),
            ("slippageBps", self.slippage_bps.to_string()),
            ("onlyDirectRoutes", self.only_direct_routes.to_string()),
        ];
        if !self.excluded_dexes.is_empty() {
            pairs.push(("excludeDexes", self.excluded_dexes.join(",")));
        }
        pairs
    }
}

/// Knobs recognized by the swap-instructions endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct SwapInstructionOptions {
    /// Off keeps every account explicit in the returned instructions
    pub use_shared_accounts: bool,
    pub compute_unit_price_micro_lamports: u64,
    /// Let Jupiter estimate the compute budget instead of a fixed limit
    pub dynamic_compute_unit_limit: bool,
    /// Off because the flow never leaves wrapped SOL inside the transaction
    pub wrap_and_unwrap_sol: bool,
    pub skip_user_accounts_rpc_calls: bool,
}

impl Default for SwapInstructionOptions {
    fn default() -> Self {
        Self {
            use_shared_accounts: false,
            compute_unit_price_micro_lamports: 1,
            dynamic_compute_unit_limit: true,
            wrap_and_unwrap_sol: false,
            skip_user_accounts_rpc_calls: true,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapInstructionsRequest<'a> {
    #[serde(with = "as_string")]
    user_public_key: Pubkey,
    quote_response: &'a MergedQuote,
    wrap_and_unwrap_sol: bool,
    use_shared_accounts: bool,
    compute_unit_price_micro_lamports: u64,
    dynamic_compute_unit_limit: bool,
    skip_user_accounts_rpc_calls: bool,
}

/// Instruction in Jupiter's JSON encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInstruction {
    pub program_id: String,
    pub accounts: Vec<RawAccountMeta>,
    /// Base64 payload
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAccountMeta {
    pub pubkey: String,
    pub is_signer: bool,
    pub is_writable: bool,
}

/// Swap-instructions response, still in wire form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInstructionsResponse {
    #[serde(default)]
    pub token_ledger_instruction: Option<RawInstruction>,
    #[serde(default)]
    pub compute_budget_instructions: Vec<RawInstruction>,
    #[serde(default)]
    pub setup_instructions: Vec<RawInstruction>,
    pub swap_instruction: RawInstruction,
    #[serde(default)]
    pub cleanup_instruction: Option<RawInstruction>,
    #[serde(default)]
    pub address_lookup_table_addresses: Vec<String>,
}

/// Quote capability
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self, request: &QuoteRequest) -> Result<Quote>;
}

/// Instruction-build capability
#[async_trait]
pub trait SwapInstructionSource: Send + Sync {
    async fn swap_instructions(
        &self,
        user: &Pubkey,
        quote: &MergedQuote,
        options: &SwapInstructionOptions,
    ) -> Result<SwapInstructionsResponse>;
}

/// Jupiter API client
pub struct JupiterRouter {
    client: reqwest::Client,
    api_url: String,
}

impl JupiterRouter {
    /// Create new Jupiter router
    pub fn new() -> Self {
        Self::with_url("https://quote-api.jup.ag/v6".to_string())
    }

    /// Create with custom API URL
    pub fn with_url(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Get quote from Jupiter
    pub async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote> {
        let response = self
            .client
            .get(format!("{}/quote", self.api_url))
            .query(&request.query_pairs())
            .send()
            .await
            .context("Failed to send request to Jupiter API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Jupiter API error {}: {}", status, error_text);
        }

        let quote: Quote = response
            .json()
            .await
            .context("Failed to parse Jupiter quote response")?;

        if quote.route_plan.is_empty() {
            anyhow::bail!("Jupiter returned an empty route plan");
        }

        Ok(quote)
    }

    /// Request executable instructions for a quote
    pub async fn get_swap_instructions(
        &self,
        user: &Pubkey,
        quote: &MergedQuote,
        options: &SwapInstructionOptions,
    ) -> Result<SwapInstructionsResponse> {
        let body = SwapInstructionsRequest {
            user_public_key: *user,
            quote_response: quote,
            wrap_and_unwrap_sol: options.wrap_and_unwrap_sol,
            use_shared_accounts: options.use_shared_accounts,
            compute_unit_price_micro_lamports: options.compute_unit_price_micro_lamports,
            dynamic_compute_unit_limit: options.dynamic_compute_unit_limit,
            skip_user_accounts_rpc_calls: options.skip_user_accounts_rpc_calls,
        };

        let response = self
            .client
            .post(format!("{}/swap-instructions", self.api_url))
            .json(&body)
            .send()
            .await
            .context("Failed to send swap-instructions request to Jupiter API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Jupiter swap-instructions error {}: {}", status, error_text);
        }

        response
            .json()
            .await
            .context("Failed to parse Jupiter swap-instructions response")
    }
}

impl Default for JupiterRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteSource for JupiterRouter {
    async fn quote(&self, request: &QuoteRequest) -> Result<Quote> {
        self.get_quote(request).await
    }
}

#[async_trait]
impl SwapInstructionSource for JupiterRouter {
    async fn swap_instructions(
        &self,
        user: &Pubkey,
        quote: &MergedQuote,
        options: &SwapInstructionOptions,
    ) -> Result<SwapInstructionsResponse> {
        self.get_swap_instructions(user, quote, options).await
    }
}

/// Jupiter encodes amounts and mints as JSON strings
mod as_string {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const QUOTE_JSON: &str = r#"{
        "inputMint": "So11111111111111111111111111111111111111112",
        "inAmount": "4000000000000",
        "outputMint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
        "outAmount": "600123456789",
        "otherAmountThreshold": "597122839505",
        "swapMode": "ExactIn",
        "slippageBps": 50,
        "platformFee": null,
        "priceImpactPct": "0.0012",
        "routePlan": [
            {
                "swapInfo": {
                    "ammKey": "HJPjoWUrhoZzkNfRpHuieeFk9WcZWjwy6PBjZ81ngndJ",
                    "label": "Raydium CLMM",
                    "inputMint": "So11111111111111111111111111111111111111112",
                    "outputMint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                    "inAmount": "4000000000000",
                    "outAmount": "600123456789",
                    "feeAmount": "1000",
                    "feeMint": "So11111111111111111111111111111111111111112"
                },
                "percent": 100
            }
        ],
        "contextSlot": 299283763,
        "timeTaken": 0.0123
    }"#;

    #[test]
    fn test_quote_parses_string_amounts() {
        let quote: Quote = serde_json::from_str(QUOTE_JSON).unwrap();
        assert_eq!(quote.in_amount, 4_000_000_000_000);
        assert_eq!(quote.out_amount, 600_123_456_789);
        assert_eq!(
            quote.input_mint,
            Pubkey::from_str("So11111111111111111111111111111111111111112").unwrap()
        );
        assert_eq!(quote.route_plan.len(), 1);
        assert_eq!(quote.route_labels(), "Raydium CLMM");
    }

    #[test]
    fn test_quote_keeps_unmodeled_fields() {
        let quote: Quote = serde_json::from_str(QUOTE_JSON).unwrap();
        assert!(quote.extra.contains_key("platformFee"));

        let value = serde_json::to_value(&quote).unwrap();
        assert_eq!(value["inAmount"], "4000000000000");
        assert_eq!(value["platformFee"], Value::Null);
        assert_eq!(value["routePlan"][0]["swapInfo"]["ammKey"], "HJPjoWUrhoZzkNfRpHuieeFk9WcZWjwy6PBjZ81ngndJ");
    }

    #[test]
    fn test_quote_query_pairs() {
        let request = QuoteRequest {
            input_mint: Pubkey::new_unique(),
            output_mint: Pubkey::new_unique(),
            amount: 42,
            slippage_bps: 50,
            excluded_dexes: vec!["Obric V2".to_string(), "Phoenix".to_string()],
            only_direct_routes: false,
        };
        let pairs = request.query_pairs();
        assert!(pairs.contains(&("amount", "42".to_string())));
        assert!(pairs.contains(&("onlyDirectRoutes", "false".to_string())));
        assert!(pairs.contains(&("excludeDexes", "Obric V2,Phoenix".to_string())));
    }

    #[test]
    fn test_swap_instructions_response_defaults() {
        let json = r#"{
            "swapInstruction": {
                "programId": "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4",
                "accounts": [],
                "data": "AQID"
            },
            "addressLookupTableAddresses": []
        }"#;
        let response: SwapInstructionsResponse = serde_json::from_str(json).unwrap();
        assert!(response.compute_budget_instructions.is_empty());
        assert!(response.setup_instructions.is_empty());
        assert!(response.cleanup_instruction.is_none());
    }

    #[test]
    fn test_default_swap_instruction_options() {
        let options = SwapInstructionOptions::default();
        assert!(!options.use_shared_accounts);
        assert!(!options.wrap_and_unwrap_sol);
        assert!(options.dynamic_compute_unit_limit);
        assert_eq!(options.compute_unit_price_micro_lamports, 1);
    }

    #[tokio::test]
    #[ignore] // Requires API access
    async fn test_get_jupiter_quote() {
        let router = JupiterRouter::new();

        let request = QuoteRequest {
            input_mint: Pubkey::from_str("So11111111111111111111111111111111111111112").unwrap(),
            output_mint: Pubkey::from_str("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v").unwrap(),
            amount: 100_000_000, // 0.1 SOL
            slippage_bps: 50,
            excluded_dexes: vec![],
            only_direct_routes: false,
        };

        let quote = router.get_quote(&request).await;

        assert!(quote.is_ok());
        let quote = quote.unwrap();
        println!("Out amount: {}", quote.out_amount);
        println!("Route plan: {} hops", quote.route_plan.len());
    }
}
