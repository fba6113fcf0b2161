//! Ledger-backed validator.
//!
//! Funds come from the `[validator.balances]` table. Signatures are checked
//! for shape only: a 65-byte `r ‖ s ‖ v` with non-zero `r` and `s` and a
//! recognised recovery byte. Setting `trust_signatures` skips even that.

use std::collections::HashMap;

use blobshare_core::{SIGNATURE_LEN, ValidatorConfig};
use blobshare_scheduler::{BoxFuture, Validator};
use tracing::debug;

pub struct LedgerValidator {
    trust_signatures: bool,
    /// Keyed by lowercased identity.
    balances: HashMap<String, f64>,
}

impl LedgerValidator {
    pub fn from_config(config: &ValidatorConfig) -> Self {
        let balances = config
            .balances
            .iter()
            .map(|(identity, funds)| (identity.to_lowercase(), *funds))
            .collect();
        Self {
            trust_signatures: config.trust_signatures,
            balances,
        }
    }

    fn well_formed(signature: &[u8]) -> bool {
        if signature.len() != SIGNATURE_LEN {
            return false;
        }
        let (r, rest) = signature.split_at(32);
        let (s, v) = rest.split_at(32);
        let non_zero = |part: &[u8]| part.iter().any(|b| *b != 0);
        non_zero(r) && non_zero(s) && matches!(v[0], 0 | 1 | 27 | 28)
    }
}

impl Validator for LedgerValidator {
    fn verify_signature<'a>(
        &'a self,
        identity: &'a str,
        _data: &'a str,
        signature: &'a [u8],
    ) -> BoxFuture<'a, Result<bool, String>> {
        Box::pin(async move {
            if self.trust_signatures {
                return Ok(true);
            }
            let ok = Self::well_formed(signature);
            if !ok {
                debug!(%identity, "malformed signature");
            }
            Ok(ok)
        })
    }

    fn check_funds<'a>(&'a self, identity: &'a str, bid: f64) -> BoxFuture<'a, Result<bool, String>> {
        Box::pin(async move {
            match self.balances.get(&identity.to_lowercase()) {
                Some(funds) => Ok(*funds >= bid),
                None => {
                    debug!(%identity, "no balance on record");
                    Ok(false)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature(v: u8) -> Vec<u8> {
        let mut sig = vec![0x11; SIGNATURE_LEN];
        sig[64] = v;
        sig
    }

    fn validator(trust_signatures: bool) -> LedgerValidator {
        let mut balances = HashMap::new();
        balances.insert("0xAbC".to_string(), 1.0);
        LedgerValidator::from_config(&ValidatorConfig {
            trust_signatures,
            balances,
        })
    }

    #[tokio::test]
    async fn funds_are_compared_case_insensitively() {
        let v = validator(false);
        assert_eq!(v.check_funds("0xabc", 0.5).await, Ok(true));
        assert_eq!(v.check_funds("0xABC", 1.0).await, Ok(true));
        assert_eq!(v.check_funds("0xabc", 1.5).await, Ok(false));
        assert_eq!(v.check_funds("0xother", 0.0).await, Ok(false));
    }

    #[tokio::test]
    async fn signature_shape_is_checked() {
        let v = validator(false);
        assert_eq!(v.verify_signature("0xabc", "d", &signature(27)).await, Ok(true));
        assert_eq!(v.verify_signature("0xabc", "d", &signature(1)).await, Ok(true));
        assert_eq!(v.verify_signature("0xabc", "d", &signature(5)).await, Ok(false));
        assert_eq!(v.verify_signature("0xabc", "d", &[0u8; 65]).await, Ok(false));
        assert_eq!(v.verify_signature("0xabc", "d", &[1u8; 10]).await, Ok(false));
    }

    #[tokio::test]
    async fn trusted_signatures_skip_the_check() {
        let v = validator(true);
        assert_eq!(v.verify_signature("0xabc", "d", &signature(5)).await, Ok(true));
    }
}
