//! Decoding of EVM revert data into human-readable reasons.

use {alloy_primitives::U256, alloy_sol_types::SolValue, hex_literal::hex};

/// `Error(string)` selector.
const ERROR_SELECTOR: [u8; 4] = hex!("08c379a0");
/// `Panic(uint256)` selector.
const PANIC_SELECTOR: [u8; 4] = hex!("4e487b71");

/// Renders revert data as `"Error: …"`, `"Panic(…): …"` or a raw hex dump.
pub fn decode_revert_reason(data: &[u8]) -> String {
    if let Some(tail) = data.strip_prefix(&ERROR_SELECTOR)
        && let Ok(reason) = String::abi_decode(tail)
    {
        return format!("Error: {reason}");
    }
    if let Some(tail) = data.strip_prefix(&PANIC_SELECTOR)
        && let Ok(code) = U256::abi_decode(tail)
    {
        let code = u64::try_from(code).unwrap_or(u64::MAX);
        return format!("Panic(0x{code:02x}): {}", panic_description(code));
    }
    format!("Revert: 0x{}", alloy_primitives::hex::encode(data))
}

fn panic_description(code: u64) -> &'static str {
    match code {
        0x01 => "assertion failed",
        0x11 => "arithmetic overflow or underflow",
        0x12 => "division or modulo by zero",
        0x21 => "invalid enum value",
        0x22 => "invalid storage byte array access",
        0x31 => "pop on empty array",
        0x32 => "array index out of bounds",
        0x41 => "memory allocation overflow",
        0x51 => "call to zero-initialized variable",
        _ => "unknown panic code",
    }
}
