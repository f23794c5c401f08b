use async_trait::async_trait;
use gamemaster::collaborators::{Cipher, CollaboratorError};
use gamemaster::domain::KeyRef;

/// Ciphertext is the plaintext. Enough to exercise the routing and
/// settlement paths without gpg.
pub struct PlainCipher;

#[async_trait]
impl Cipher for PlainCipher {
    async fn encrypt(&self, plaintext: &[u8], _recipient: &KeyRef) -> Result<Vec<u8>, CollaboratorError> {
        Ok(plaintext.to_vec())
    }

    async fn decrypt(&self, ciphertext: &[u8], _key: &KeyRef) -> Result<Vec<u8>, CollaboratorError> {
        Ok(ciphertext.to_vec())
    }
}
