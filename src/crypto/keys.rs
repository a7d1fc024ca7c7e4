// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key generation failed: {0}")]
    Generation(String),
    #[error("invalid PEM: {0}")]
    Pem(String),
}

/// Freshly generated 2048-bit agent keypair (spec §4.1). The private half is
/// returned to the caller exactly once, at agent creation, and never
/// persisted by the gateway.
pub struct AgentKeypair {
    pub public_key_pem: String,
    pub private_key_pem: String,
}

pub fn generate_agent_keypair() -> Result<AgentKeypair, KeyError> {
    let mut rng = rand::rng();
    let private_key = RsaPrivateKey::new(&mut rng, 2048).map_err(|e| KeyError::Generation(e.to_string()))?;
    let public_key = RsaPublicKey::from(&private_key);

    let public_key_pem = public_key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| KeyError::Pem(e.to_string()))?;
    let private_key_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| KeyError::Pem(e.to_string()))?
        .to_string();

    Ok(AgentKeypair { public_key_pem, private_key_pem })
}

pub fn parse_public_key(pem: &str) -> Result<RsaPublicKey, KeyError> {
    RsaPublicKey::from_pkcs1_pem(pem).map_err(|e| KeyError::Pem(e.to_string()))
}

pub fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, KeyError> {
    RsaPrivateKey::from_pkcs1_pem(pem).map_err(|e| KeyError::Pem(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keypair_pems_parse_back() {
        let pair = generate_agent_keypair().unwrap();
        assert!(parse_public_key(&pair.public_key_pem).is_ok());
        assert!(parse_private_key(&pair.private_key_pem).is_ok());
    }
}
