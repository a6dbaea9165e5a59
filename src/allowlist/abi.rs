use crate::domain::types::ParamValue;
use crate::error::AllowlistError;
use alloy_primitives::{keccak256, Address, U256};

/// Every static argument occupies one 32-byte word in the calldata body.
pub(crate) const WORD_LEN: usize = 32;

/// Normalize a raw param type tag into its canonical form.
///
/// Whitespace is stripped, casing is folded, and the bare `uint` alias
/// becomes `uint256`. Only head-only static word types are admissible:
/// `address`, `bool`, `uintN` (N a multiple of 8 up to 256) and `bytesN`
/// (1..=32). Anything else — dynamic types, arrays, tuples, `intN` —
/// can never be decoded by the validation algorithm, so admitting it
/// would create a condition that can never match.
pub(crate) fn normalize_param_type(raw: &str) -> Result<String, AllowlistError> {
    let compact = raw
        .chars()
        .filter(|char| !char.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    match compact.as_str() {
        "" => Err(AllowlistError::UnsupportedParamType(raw.to_string())),
        "address" | "bool" => Ok(compact),
        "uint" => Ok("uint256".to_string()),
        _ => {
            if let Some(bits) = parse_suffix(&compact, "uint") {
                if bits % 8 == 0 && (8..=256).contains(&bits) {
                    return Ok(compact);
                }
            }
            if let Some(size) = parse_suffix(&compact, "bytes") {
                if (1..=32).contains(&size) {
                    return Ok(compact);
                }
            }
            Err(AllowlistError::UnsupportedParamType(raw.to_string()))
        }
    }
}

/// Trim and validate a method name for signature construction.
pub(crate) fn normalize_method_name(raw: &str) -> Result<String, AllowlistError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return Err(AllowlistError::MalformedMethodName(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Canonical signature `method(type1,...,typeN)` over already-normalized
/// param types.
pub(crate) fn canonical_signature(method_name: &str, param_types: &[String]) -> String {
    format!("{method_name}({})", param_types.join(","))
}

/// First 4 bytes of the keccak256 hash of the canonical signature.
pub(crate) fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[..4]);
    selector
}

/// Decode the argument section of a call (everything after the selector)
/// against the declared param types.
///
/// Decoding is strict: the payload must be exactly one 32-byte word per
/// declared param and every word must be properly zero-padded for its
/// type. Any violation is reported as an error the caller folds into
/// "condition not applicable" — never a panic.
pub(crate) fn decode_static_args(
    data: &[u8],
    param_types: &[String],
) -> Result<Vec<ParamValue>, String> {
    let expected = param_types.len() * WORD_LEN;
    if data.len() != expected {
        return Err(format!(
            "argument payload must be exactly {expected} bytes for {} params, got {}",
            param_types.len(),
            data.len()
        ));
    }
    param_types
        .iter()
        .zip(data.chunks_exact(WORD_LEN))
        .map(|(kind, word)| decode_word(kind, word))
        .collect()
}

fn decode_word(kind: &str, word: &[u8]) -> Result<ParamValue, String> {
    match kind {
        "address" => {
            require_zero(&word[..12], kind)?;
            Ok(ParamValue::Address(Address::from_slice(&word[12..])))
        }
        "bool" => {
            require_zero(&word[..31], kind)?;
            match word[31] {
                0 => Ok(ParamValue::Bool(false)),
                1 => Ok(ParamValue::Bool(true)),
                other => Err(format!("bool word must end in 0 or 1, got {other}")),
            }
        }
        _ => {
            if let Some(bits) = parse_suffix(kind, "uint") {
                require_zero(&word[..WORD_LEN - bits / 8], kind)?;
                return Ok(ParamValue::Uint(U256::from_be_slice(word)));
            }
            if let Some(size) = parse_suffix(kind, "bytes") {
                require_zero(&word[size..], kind)?;
                return Ok(ParamValue::Bytes(word[..size].to_vec()));
            }
            Err(format!("cannot decode param type {kind}"))
        }
    }
}

fn require_zero(padding: &[u8], kind: &str) -> Result<(), String> {
    if padding.iter().any(|byte| *byte != 0) {
        return Err(format!("{kind} word has non-zero padding"));
    }
    Ok(())
}

fn parse_suffix(kind: &str, prefix: &str) -> Option<usize> {
    let suffix = kind.strip_prefix(prefix)?;
    let value = suffix.parse::<usize>().ok()?;
    // Reject leading zeros and signs: the tag must already be canonical.
    if suffix != value.to_string() {
        return None;
    }
    Some(value)
}
