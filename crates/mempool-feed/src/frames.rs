//! Parsing of inbound feed frames. Three shapes exist on the wire: a
//! subscription confirmation, a subscription push carrying a pending
//! transaction, and an error frame.

use {
    crate::error::FeedError,
    alloy_primitives::{Address, B256, Bytes, U256},
    domain_types::{GasPricing, PendingTransaction},
    serde::Deserialize,
};

#[derive(Debug)]
pub(crate) enum Frame {
    /// `{id, result}` answering our subscribe request.
    Confirmation { subscription_id: String },
    /// `{method, params: {result: {txHash, txContents}}}` push.
    PendingTx(PendingTransaction),
    /// `{id?, error: {code, message}}`.
    Error { code: i64, message: String },
}

/// Wire error codes the provider uses for request throttling.
const RATE_LIMIT_CODES: [i64; 2] = [429, -32005];

pub(crate) fn classify_error(code: i64, message: &str) -> FeedError {
    if RATE_LIMIT_CODES.contains(&code) {
        FeedError::RateLimited(message.to_owned())
    } else if code == 401 || code == 403 {
        FeedError::AuthRejected(message.to_owned())
    } else {
        FeedError::Parse(format!("feed error {code}: {message}"))
    }
}

pub(crate) fn parse(text: &str) -> Result<Frame, FeedError> {
    let raw: RawFrame =
        serde_json::from_str(text).map_err(|err| FeedError::Parse(err.to_string()))?;

    if let Some(error) = raw.error {
        return Ok(Frame::Error {
            code: error.code,
            message: error.message,
        });
    }
    if let Some(params) = raw.params {
        let push = params.result.ok_or_else(|| {
            FeedError::Parse("subscription push without result".to_owned())
        })?;
        return Ok(Frame::PendingTx(pending_transaction(push)?));
    }
    if let Some(result) = raw.result {
        return Ok(Frame::Confirmation {
            subscription_id: match result {
                serde_json::Value::String(id) => id,
                other => other.to_string(),
            },
        });
    }
    Err(FeedError::Parse("frame matches no known shape".to_owned()))
}

fn pending_transaction(push: PushResult) -> Result<PendingTransaction, FeedError> {
    let tx = push.tx_contents;
    let parse = |what: &str, err: String| FeedError::Parse(format!("{what}: {err}"));

    let hash = push
        .tx_hash
        .parse::<B256>()
        .map_err(|err| parse("txHash", err.to_string()))?;
    let from = tx
        .from
        .parse::<Address>()
        .map_err(|err| parse("from", err.to_string()))?;
    let to = match tx.to {
        Some(to) if !to.is_empty() => Some(
            to.parse::<Address>()
                .map_err(|err| parse("to", err.to_string()))?,
        ),
        _ => None,
    };
    let value = parse_u256(tx.value.as_deref().unwrap_or("0x0"))
        .map_err(|err| parse("value", err))?;
    let input = match tx.input.as_deref() {
        None | Some("") | Some("0x") => Bytes::new(),
        Some(input) => input
            .parse::<Bytes>()
            .map_err(|err| parse("input", err.to_string()))?,
    };
    let gas = parse_u64(tx.gas.as_deref().unwrap_or("0x0")).map_err(|err| parse("gas", err))?;
    let nonce =
        parse_u64(tx.nonce.as_deref().unwrap_or("0x0")).map_err(|err| parse("nonce", err))?;
    // Carried verbatim: a zero chain id stays zero.
    let chain_id = parse_u64(tx.chain_id.as_deref().unwrap_or("0x0"))
        .map_err(|err| parse("chainId", err))?;

    let gas_pricing = match (&tx.max_fee_per_gas, &tx.max_priority_fee_per_gas) {
        (Some(max_fee), priority) => GasPricing::Eip1559 {
            max_fee_per_gas: parse_u256(max_fee).map_err(|err| parse("maxFeePerGas", err))?,
            max_priority_fee_per_gas: match priority {
                Some(priority) => parse_u256(priority)
                    .map_err(|err| parse("maxPriorityFeePerGas", err))?,
                None => U256::ZERO,
            },
        },
        (None, _) => GasPricing::Legacy {
            gas_price: parse_u256(tx.gas_price.as_deref().unwrap_or("0x0"))
                .map_err(|err| parse("gasPrice", err))?,
        },
    };

    Ok(PendingTransaction {
        hash,
        from,
        to,
        value,
        input,
        gas,
        gas_pricing,
        nonce,
        chain_id,
    })
}

fn parse_u256(text: &str) -> Result<U256, String> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x") {
        U256::from_str_radix(hex, 16).map_err(|err| err.to_string())
    } else {
        U256::from_str_radix(text, 10).map_err(|err| err.to_string())
    }
}

fn parse_u64(text: &str) -> Result<u64, String> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).map_err(|err| err.to_string())
    } else {
        text.parse().map_err(|err: std::num::ParseIntError| err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RawError>,
    #[serde(default)]
    params: Option<RawParams>,
}

#[derive(Debug, Deserialize)]
struct RawError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawParams {
    #[serde(default)]
    result: Option<PushResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushResult {
    tx_hash: String,
    tx_contents: TxContents,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxContents {
    from: String,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    gas: Option<String>,
    #[serde(default)]
    gas_price: Option<String>,
    #[serde(default)]
    max_fee_per_gas: Option<String>,
    #[serde(default)]
    max_priority_fee_per_gas: Option<String>,
    #[serde(default)]
    nonce: Option<String>,
    #[serde(default)]
    chain_id: Option<String>,
}
