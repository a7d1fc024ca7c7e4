// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Versioned, envelope-encrypted per-tool credential vault (spec §4.2). The
// process-level Key-Encryption-Key (KEK) is an AES-256 key loaded from
// config; credentials are never stored or logged in plaintext.

use std::sync::Arc;

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use crate::domain::credential::{CredentialId, ToolCredential};
use crate::domain::repository::CredentialRepository;
use crate::error::GatewayError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub struct CredentialVault {
    kek: [u8; 32],
    repo: Arc<dyn CredentialRepository>,
}

impl CredentialVault {
    pub fn new(kek_base64: &str, repo: Arc<dyn CredentialRepository>) -> Result<Self, GatewayError> {
        let kek_bytes = STANDARD
            .decode(kek_base64)
            .map_err(|e| GatewayError::Internal(format!("invalid KEK_BASE64: {e}")))?;
        let kek: [u8; 32] = kek_bytes
            .try_into()
            .map_err(|_| GatewayError::Internal("KEK must decode to exactly 32 bytes".to_string()))?;
        Ok(Self { kek, repo })
    }

    fn seal(&self, plaintext: &[u8]) -> String {
        let mut iv = [0u8; 16];
        rand::rng().fill_bytes(&mut iv);
        let ciphertext = Aes256CbcEnc::new(&self.kek.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        let mut blob = Vec::with_capacity(16 + ciphertext.len());
        blob.extend_from_slice(&iv);
        blob.extend_from_slice(&ciphertext);
        STANDARD.encode(blob)
    }

    fn unseal(&self, blob_b64: &str) -> Result<Vec<u8>, GatewayError> {
        let blob = STANDARD
            .decode(blob_b64)
            .map_err(|e| GatewayError::Internal(format!("CRYPTO_DECRYPT: invalid base64: {e}")))?;
        if blob.len() < 16 {
            return Err(GatewayError::Internal("CRYPTO_DECRYPT: envelope too short".to_string()));
        }
        let (iv, ciphertext) = blob.split_at(16);
        Aes256CbcDec::new(&self.kek.into(), iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|e| GatewayError::Internal(format!("CRYPTO_DECRYPT: {e}")))
    }

    /// Stores a new, inactive credential version for `tool` (spec §4.2).
    pub async fn create(
        &self,
        tool: String,
        version: u32,
        plaintext: &[u8],
        metadata: Option<&[u8]>,
    ) -> Result<CredentialId, GatewayError> {
        let encrypted_credential = self.seal(plaintext);
        let encrypted_metadata = metadata.map(|m| self.seal(m));
        let credential = ToolCredential::new(tool, version, encrypted_credential, encrypted_metadata);
        let id = credential.id;
        self.repo.save(credential).await.map_err(|e| GatewayError::Internal(e.to_string()))?;
        Ok(id)
    }

    /// Atomically activates `id`, deactivating every other credential of the
    /// same tool (spec §3, §4.2 invariant; spec §5: serialized per tool).
    pub async fn activate(&self, id: CredentialId) -> Result<(), GatewayError> {
        self.repo
            .find_by_id(id)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?
            .ok_or_else(|| GatewayError::BadRequest("cannot activate a deleted credential".to_string()))?;
        self.repo.activate(id).await.map_err(|e| GatewayError::Internal(e.to_string()))
    }

    /// Decrypts and returns the active credential for `tool` (spec §4.2).
    pub async fn get_active(&self, tool: &str) -> Result<Vec<u8>, GatewayError> {
        let credential = self
            .repo
            .find_active(tool)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?
            .ok_or_else(|| GatewayError::CredNotFound(tool.to_string()))?;
        self.unseal(&credential.encrypted_credential)
    }

    pub async fn list(&self, tool: &str) -> Result<Vec<ToolCredential>, GatewayError> {
        self.repo.list(tool).await.map_err(|e| GatewayError::Internal(e.to_string()))
    }

    /// Refuses to delete the only active credential of a tool unless
    /// `force=true`; the gateway never exposes `force` by default (spec
    /// §4.2 failure model).
    pub async fn delete(&self, id: CredentialId, force: bool) -> Result<(), GatewayError> {
        let credential = self
            .repo
            .find_by_id(id)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?
            .ok_or_else(|| GatewayError::BadRequest("unknown credential id".to_string()))?;

        if credential.is_active && !force {
            let siblings = self.repo.list(&credential.tool).await.map_err(|e| GatewayError::Internal(e.to_string()))?;
            let has_successor = siblings.iter().any(|c| c.id != id && !c.is_active);
            if !has_successor {
                return Err(GatewayError::BadRequest(
                    "cannot delete the only active credential without a successor".to_string(),
                ));
            }
        }

        self.repo.delete(id).await.map_err(|e| GatewayError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::memory::InMemoryCredentialRepository;

    fn vault() -> CredentialVault {
        let kek = STANDARD.encode([7u8; 32]);
        CredentialVault::new(&kek, Arc::new(InMemoryCredentialRepository::new())).unwrap()
    }

    #[tokio::test]
    async fn create_is_inactive_until_activated() {
        let vault = vault();
        assert!(vault.get_active("serpapi").await.is_err());
        let id = vault.create("serpapi".to_string(), 1, b"key-123", None).await.unwrap();
        assert!(vault.get_active("serpapi").await.is_err());
        vault.activate(id).await.unwrap();
        assert_eq!(vault.get_active("serpapi").await.unwrap(), b"key-123");
    }

    #[tokio::test]
    async fn activating_a_new_version_deactivates_the_old_one() {
        let vault = vault();
        let v1 = vault.create("serpapi".to_string(), 1, b"key-v1", None).await.unwrap();
        vault.activate(v1).await.unwrap();
        let v2 = vault.create("serpapi".to_string(), 2, b"key-v2", None).await.unwrap();
        vault.activate(v2).await.unwrap();

        assert_eq!(vault.get_active("serpapi").await.unwrap(), b"key-v2");
        let all = vault.list("serpapi").await.unwrap();
        let old = all.iter().find(|c| c.id == v1).unwrap();
        assert!(!old.is_active);
    }

    #[tokio::test]
    async fn cannot_delete_sole_active_credential_without_force() {
        let vault = vault();
        let id = vault.create("openai".to_string(), 1, b"key", None).await.unwrap();
        vault.activate(id).await.unwrap();
        assert!(vault.delete(id, false).await.is_err());
        assert!(vault.delete(id, true).await.is_ok());
    }
}
