use anyhow::{bail, Context, Result};

use super::DecodedPayment;

/// Decodes an `X-PAYMENT` header: base64 of a JSON `DecodedPayment`.
pub fn decode_payment_header(header: &str) -> Result<DecodedPayment> {
    let bytes = base64::decode(header.trim()).context("X-PAYMENT header is not valid base64")?;
    let decoded: DecodedPayment =
        serde_json::from_slice(&bytes).context("X-PAYMENT payload is not valid JSON")?;
    if decoded.payload.authorization.from.is_empty() {
        bail!("X-PAYMENT payload missing authorization.from");
    }
    Ok(decoded)
}

/// Base64-encodes a settlement response for the `X-PAYMENT-RESPONSE`
/// header.
pub fn encode_settlement_response(settle_response: &super::SettleResponse) -> Result<String> {
    let json = serde_json::to_vec(settle_response)?;
    Ok(base64::encode(json))
}

/// Converts an integer base-units amount to a human-readable decimal
/// string: `human = baseUnits / 10^decimals` (Glossary "Base units").
pub fn base_units_to_human(raw: &str, decimals: u8) -> Result<String> {
    use bigdecimal::BigDecimal;
    use num_bigint::BigInt;
    use std::str::FromStr;

    let raw_int = BigInt::from_str(raw).context("maxAmountRequiredRaw is not an integer")?;
    let value = BigDecimal::new(raw_int, decimals as i64);
    Ok(value.normalized().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::{DecodedPayment, PaymentAuthorization, PaymentPayload};

    fn sample_payment() -> DecodedPayment {
        DecodedPayment {
            x402_version: 1,
            scheme: "exact".to_string(),
            network: "base-sepolia".to_string(),
            payload: PaymentPayload {
                authorization: PaymentAuthorization {
                    from: "0xabc0000000000000000000000000000000000000".to_string(),
                    to: "0xdef0000000000000000000000000000000000000".to_string(),
                    value: "50000".to_string(),
                    valid_after: "0".to_string(),
                    valid_before: "9999999999".to_string(),
                    nonce: "0x01".to_string(),
                },
                signature: "0xsignature".to_string(),
            },
        }
    }

    #[test]
    fn round_trips_through_base64_json() {
        let payment = sample_payment();
        let json = serde_json::to_vec(&payment).unwrap();
        let header = base64::encode(json);
        let decoded = decode_payment_header(&header).unwrap();
        assert_eq!(decoded.payload.authorization.from, payment.payload.authorization.from);
        assert_eq!(decoded.network, payment.network);
    }

    #[test]
    fn rejects_non_base64() {
        assert!(decode_payment_header("not base64 !!!").is_err());
    }

    #[test]
    fn base_units_division_matches_decimals() {
        assert_eq!(base_units_to_human("50000", 6).unwrap(), "0.05");
        assert_eq!(base_units_to_human("0", 6).unwrap(), "0");
        assert_eq!(base_units_to_human("1000000", 6).unwrap(), "1");
    }
}
