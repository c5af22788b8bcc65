use serde::{Deserialize, Serialize};

/// The experiment arm an opportunity got assigned to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arm {
    Control,
    Variant,
}

impl Arm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Variant => "variant",
        }
    }
}

/// 32-bit FNV-1a. Deterministic across implementations and processes, cheap
/// enough for the hot path. Cryptographic strength is explicitly not needed
/// here; only stability and rough uniformity are.
pub fn fnv1a_32(input: &str) -> u32 {
    const OFFSET_BASIS: u32 = 2_166_136_261;
    const PRIME: u32 = 16_777_619;
    let mut hash = OFFSET_BASIS;
    for byte in input.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Maps a fingerprint onto `[0, 1)`.
pub(crate) fn split_position(fingerprint: &str) -> f64 {
    f64::from(fnv1a_32(fingerprint)) / 4_294_967_296.0
}

/// Deterministic arm assignment: fingerprints hashing below the traffic
/// split go to the variant.
pub(crate) fn assign(traffic_split: f64, fingerprint: &str) -> Arm {
    if split_position(fingerprint) < traffic_split {
        Arm::Variant
    } else {
        Arm::Control
    }
}
