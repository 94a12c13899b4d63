use crate::errors::{BotError, Result};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

pub struct Validator;

impl Validator {
    /// Validate a base58 wallet address, per the glossary's ≤44-char rule.
    pub fn validate_wallet_address(address: &str) -> Result<Pubkey> {
        if address.is_empty() || address.len() > 44 {
            return Err(BotError::protocol("invalid wallet address length"));
        }
        Pubkey::from_str(address).map_err(|e| BotError::protocol(format!("invalid wallet address: {e}")))
    }

    /// Validate a base58 transaction signature, per the glossary's ≤88-char rule.
    pub fn validate_signature(signature: &str) -> Result<()> {
        if signature.is_empty() || signature.len() > 88 {
            return Err(BotError::protocol("invalid signature length"));
        }
        bs58::decode(signature)
            .into_vec()
            .map_err(|_| BotError::protocol("signature is not valid base58"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_wallet_address() {
        assert!(Validator::validate_wallet_address("").is_err());
    }

    #[test]
    fn rejects_oversized_signature() {
        let too_long = "1".repeat(89);
        assert!(Validator::validate_signature(&too_long).is_err());
    }

    #[test]
    fn accepts_well_formed_signature() {
        let sig = bs58::encode([7u8; 64]).into_string();
        assert!(Validator::validate_signature(&sig).is_ok());
    }
}
