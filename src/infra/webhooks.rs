use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

fn now_unix() -> Result<i64, AppError> {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .map_err(|_| AppError::Internal)
}

/// Identity-provider webhook verification. Three required headers:
/// message id, unix timestamp, and a signature list of `v1,<base64>` entries.
/// Signed content is `{id}.{timestamp}.{body}`; the secret is a
/// `whsec_`-prefixed base64 key.
pub fn verify_identity_signature(
    secret: &str,
    message_id: &str,
    timestamp: &str,
    signature_header: &str,
    payload: &str,
) -> Result<(), AppError> {
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| AppError::Forbidden("Invalid webhook timestamp".into()))?;

    if (now_unix()? - ts).abs() > TIMESTAMP_TOLERANCE_SECS {
        warn!(timestamp = ts, "Identity webhook timestamp outside tolerance");
        return Err(AppError::Forbidden("Webhook timestamp outside tolerance".into()));
    }

    let key = general_purpose::STANDARD
        .decode(secret.strip_prefix("whsec_").unwrap_or(secret))
        .map_err(|_| AppError::InternalWithMsg("Invalid identity webhook secret".into()))?;

    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|_| AppError::InternalWithMsg("Invalid identity webhook secret".into()))?;
    mac.update(format!("{}.{}.{}", message_id, ts, payload).as_bytes());

    // Header may carry several space-separated versioned signatures.
    // verify_slice compares in constant time.
    let matched = signature_header.split_whitespace().any(|entry| {
        entry.split_once(',').is_some_and(|(version, sig)| {
            version == "v1"
                && general_purpose::STANDARD
                    .decode(sig)
                    .is_ok_and(|candidate| mac.clone().verify_slice(&candidate).is_ok())
        })
    });

    if !matched {
        warn!(message_id = %message_id, "Identity webhook signature mismatch");
        return Err(AppError::Forbidden("Invalid webhook signature".into()));
    }

    Ok(())
}

/// Billing webhook verification: `t=<unix>,v1=<hex>` header, signed content
/// `{t}.{body}`, HMAC-SHA256 over the raw secret bytes.
pub fn verify_billing_signature(
    secret: &str,
    signature_header: &str,
    payload: &str,
) -> Result<(), AppError> {
    let mut timestamp: Option<i64> = None;
    let mut v1_signature: Option<String> = None;

    for part in signature_header.split(',') {
        let kv: Vec<&str> = part.splitn(2, '=').collect();
        if kv.len() == 2 {
            match kv[0] {
                "t" => timestamp = kv[1].parse().ok(),
                "v1" => v1_signature = Some(kv[1].to_string()),
                _ => {}
            }
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| AppError::Forbidden("Missing timestamp in signature header".into()))?;
    let v1_signature = v1_signature
        .ok_or_else(|| AppError::Forbidden("Missing v1 signature in signature header".into()))?;

    if (now_unix()? - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
        warn!(timestamp = timestamp, "Billing webhook timestamp outside tolerance");
        return Err(AppError::Forbidden("Webhook timestamp outside tolerance".into()));
    }

    let provided = hex::decode(&v1_signature)
        .map_err(|_| AppError::Forbidden("Invalid webhook signature".into()))?;

    let secret_key = secret.strip_prefix("whsec_").unwrap_or(secret);
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|_| AppError::InternalWithMsg("Invalid billing webhook secret".into()))?;
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());

    if mac.verify_slice(&provided).is_err() {
        warn!("Billing webhook signature mismatch");
        return Err(AppError::Forbidden("Invalid webhook signature".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    #[test]
    fn test_identity_signature_accepts_valid_and_rejects_tampered() {
        let raw_key = b"unit-test-key";
        let secret = format!("whsec_{}", general_purpose::STANDARD.encode(raw_key));
        let ts = now().to_string();
        let payload = r#"{"type":"user.created"}"#;

        let mut mac = HmacSha256::new_from_slice(raw_key).unwrap();
        mac.update(format!("msg_1.{}.{}", ts, payload).as_bytes());
        let sig = general_purpose::STANDARD.encode(mac.finalize().into_bytes());

        let header = format!("v1,{}", sig);
        assert!(verify_identity_signature(&secret, "msg_1", &ts, &header, payload).is_ok());

        // Same signature over a different body must fail.
        assert!(verify_identity_signature(&secret, "msg_1", &ts, &header, "{}").is_err());
        // Unknown version entries alone must fail.
        let header = format!("v2,{}", sig);
        assert!(verify_identity_signature(&secret, "msg_1", &ts, &header, payload).is_err());
    }

    #[test]
    fn test_billing_signature_accepts_valid_and_rejects_tampered() {
        let secret = "whsec_unit-test-key";
        let ts = now();
        let payload = r#"{"type":"invoice.paid"}"#;

        let mut mac = HmacSha256::new_from_slice(b"unit-test-key").unwrap();
        mac.update(format!("{}.{}", ts, payload).as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());

        let header = format!("t={},v1={}", ts, sig);
        assert!(verify_billing_signature(secret, &header, payload).is_ok());
        assert!(verify_billing_signature(secret, &header, "{}").is_err());

        let header = format!("t={},v1=nothex!!", ts);
        assert!(verify_billing_signature(secret, &header, payload).is_err());
    }
}
