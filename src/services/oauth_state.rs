// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed OAuth `state` parameter.
//!
//! Format: `base64url(account_id|timestamp_ms_hex|hmac_sha256_hex)`. The
//! signature covers `account_id|timestamp_ms_hex`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// How long a state value stays valid.
pub const STATE_MAX_AGE_MS: u128 = 15 * 60 * 1000;

fn now_ms() -> Result<u128, AppError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

fn signature(payload: &str, key: &[u8]) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Sign a state value binding the authorization request to an account.
pub fn sign(account_id: i64, key: &[u8]) -> Result<String, AppError> {
    sign_at(account_id, key, now_ms()?)
}

fn sign_at(account_id: i64, key: &[u8], timestamp_ms: u128) -> Result<String, AppError> {
    let payload = format!("{}|{:x}", account_id, timestamp_ms);
    let signed = format!("{}|{}", payload, signature(&payload, key)?);
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Check a state value and return the account ID it was issued for.
///
/// Returns `None` for malformed, tampered or expired values.
pub fn verify(state: &str, key: &[u8]) -> Option<i64> {
    verify_at(state, key, now_ms().ok()?)
}

fn verify_at(state: &str, key: &[u8], now_ms: u128) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    let mut parts = state_str.splitn(3, '|');
    let account_part = parts.next()?;
    let timestamp_hex = parts.next()?;
    let signature_hex = parts.next()?;

    let payload = format!("{}|{}", account_part, timestamp_hex);
    let expected = signature(&payload, key).ok()?;

    if !bool::from(expected.as_bytes().ct_eq(signature_hex.as_bytes())) {
        tracing::warn!("OAuth state signature mismatch");
        return None;
    }

    let issued_ms = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if now_ms.saturating_sub(issued_ms) > STATE_MAX_AGE_MS {
        tracing::warn!("OAuth state expired");
        return None;
    }

    account_part.parse().ok()
}
