//! Cipher backed by the `gpg` binary.
//!
//! Encryption uses `--recipient <key ref>` against a public keyring;
//! decryption treats the key ref as the `--homedir` holding the private key.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{Cipher, CollaboratorError};
use crate::domain::KeyRef;

pub struct GpgCipher {
    program: String,
    /// Keyring with the recipients' public keys. `None` uses gpg's default.
    public_keyring: Option<PathBuf>,
}

impl GpgCipher {
    pub fn new(program: impl Into<String>, public_keyring: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            public_keyring,
        }
    }

    async fn run(&self, homedir: Option<&str>, args: &[&str], input: &[u8]) -> Result<Vec<u8>, CollaboratorError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--batch", "--yes", "--no-tty", "--quiet"]);
        if let Some(home) = homedir {
            cmd.args(["--homedir", home]);
        }
        let mut child = cmd
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CollaboratorError::Unavailable(format!("{}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CollaboratorError::Unavailable("gpg stdin not piped".into()))?;
        let input = input.to_vec();
        let feed = async move {
            let written = stdin.write_all(&input).await;
            drop(stdin);
            written
        };
        let (_, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(|e| CollaboratorError::Unavailable(format!("{}: {e}", self.program)))?;
        if !output.status.success() {
            return Err(CollaboratorError::Failed(format!(
                "gpg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Cipher for GpgCipher {
    async fn encrypt(&self, plaintext: &[u8], recipient: &KeyRef) -> Result<Vec<u8>, CollaboratorError> {
        let keyring = self
            .public_keyring
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        self.run(
            keyring.as_deref(),
            &[
                "--armor",
                "--encrypt",
                "--trust-model",
                "always",
                "--recipient",
                recipient.as_str(),
            ],
            plaintext,
        )
        .await
    }

    async fn decrypt(&self, ciphertext: &[u8], key: &KeyRef) -> Result<Vec<u8>, CollaboratorError> {
        self.run(Some(key.as_str()), &["--decrypt"], ciphertext).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let cipher = GpgCipher::new("/nonexistent/gpg-for-tests", None);
        let err = cipher
            .decrypt(b"x", &KeyRef::new("/tmp/none"))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Unavailable(_)));
    }
}
