//! Token files on disk
//!
//! Two stores exist side by side: an encrypted file (base64 blob, see
//! [`crypto`](super::crypto)) and a plaintext file. Both are written with
//! owner-only permissions. The encrypted store is always consulted first.

use super::Credential;
use super::crypto::{self, DecryptFailure};
use crate::config::CredentialConfig;
use crate::error::{CredentialError, Error, Result};
use crate::prompt::Prompter;
use crate::types::CredentialSource;
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where a token was written
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoredCredential {
    /// Passphrase-encrypted file
    Encrypted(PathBuf),
    /// Plaintext file
    Plaintext(PathBuf),
}

impl StoredCredential {
    /// Path of the written file
    pub fn path(&self) -> &Path {
        match self {
            StoredCredential::Encrypted(p) | StoredCredential::Plaintext(p) => p,
        }
    }
}

/// Passphrase prompts before an encrypted store is given up on
pub const PASSPHRASE_ATTEMPTS: u32 = 3;

/// Reads, writes and removes the local token files
#[derive(Clone, Debug)]
pub struct CredentialStore {
    encrypted_path: PathBuf,
    plaintext_path: PathBuf,
    kdf_iterations: u32,
}

impl CredentialStore {
    /// Create a store over explicit paths with the default KDF settings
    pub fn new(encrypted_path: impl Into<PathBuf>, plaintext_path: impl Into<PathBuf>) -> Self {
        let defaults = CredentialConfig::default();
        Self {
            encrypted_path: encrypted_path.into(),
            plaintext_path: plaintext_path.into(),
            kdf_iterations: defaults.kdf_iterations,
        }
    }

    /// Create a store from the credential section of the configuration
    pub fn from_config(config: &CredentialConfig) -> Self {
        Self {
            encrypted_path: config.encrypted_path.clone(),
            plaintext_path: config.plaintext_path.clone(),
            kdf_iterations: config.kdf_iterations,
        }
    }

    /// Override the PBKDF2 iteration count
    pub fn with_kdf_iterations(mut self, iterations: u32) -> Self {
        self.kdf_iterations = iterations;
        self
    }

    /// Path of the encrypted store
    pub fn encrypted_path(&self) -> &Path {
        &self.encrypted_path
    }

    /// Path of the plaintext store
    pub fn plaintext_path(&self) -> &Path {
        &self.plaintext_path
    }

    /// Whether an encrypted store file exists
    pub fn has_encrypted(&self) -> bool {
        self.encrypted_path.is_file()
    }

    /// Whether a plaintext store file exists
    pub fn has_plaintext(&self) -> bool {
        self.plaintext_path.is_file()
    }

    /// Persist the token
    ///
    /// With a passphrase the token is encrypted into the encrypted store,
    /// otherwise it is written verbatim to the plaintext store. The other store
    /// is removed so that only one copy remains.
    pub fn save(
        &self,
        credential: &Credential,
        passphrase: Option<&SecretString>,
    ) -> Result<StoredCredential> {
        let (stored, other) = match passphrase {
            Some(passphrase) => {
                let blob = crypto::encrypt(
                    credential.expose(),
                    passphrase.expose_secret(),
                    self.kdf_iterations,
                )?;
                write_private(&self.encrypted_path, blob.as_bytes())?;
                (
                    StoredCredential::Encrypted(self.encrypted_path.clone()),
                    &self.plaintext_path,
                )
            }
            None => {
                write_private(&self.plaintext_path, credential.expose().as_bytes())?;
                (
                    StoredCredential::Plaintext(self.plaintext_path.clone()),
                    &self.encrypted_path,
                )
            }
        };

        if other.is_file() {
            match std::fs::remove_file(other) {
                Ok(()) => debug!(path = %other.display(), "removed superseded token file"),
                Err(e) => warn!(
                    path = %other.display(),
                    error = %e,
                    "could not remove superseded token file"
                ),
            }
        }

        info!(path = %stored.path().display(), "saved access token");
        Ok(stored)
    }

    /// Load the token from whichever store exists, encrypted first
    ///
    /// Returns `Ok(None)` when neither file exists.
    pub fn load(
        &self,
        prompter: &mut dyn Prompter,
    ) -> Result<Option<(Credential, CredentialSource)>> {
        if self.has_encrypted() {
            let credential = self.load_encrypted(prompter)?;
            return Ok(Some((
                credential,
                CredentialSource::EncryptedFile {
                    path: self.encrypted_path.clone(),
                },
            )));
        }

        if self.has_plaintext() {
            let credential = self.load_plaintext()?;
            return Ok(Some((
                credential,
                CredentialSource::PlaintextFile {
                    path: self.plaintext_path.clone(),
                },
            )));
        }

        Ok(None)
    }

    /// Decrypt the encrypted store, prompting for the passphrase
    ///
    /// A wrong passphrase is re-prompted until the attempt limit; reaching it
    /// is `TooManyAttempts`. A blob that cannot be parsed fails immediately.
    pub fn load_encrypted(&self, prompter: &mut dyn Prompter) -> Result<Credential> {
        let path = &self.encrypted_path;
        let blob = std::fs::read_to_string(path)?;

        for attempt in 1..=PASSPHRASE_ATTEMPTS {
            let prompt = if attempt == 1 {
                format!("Passphrase for {}", path.display())
            } else {
                format!("Wrong passphrase, try again ({attempt}/{PASSPHRASE_ATTEMPTS})")
            };
            let passphrase = prompter.secret(&prompt)?;

            match crypto::decrypt(&blob, passphrase.expose_secret(), self.kdf_iterations) {
                Ok(token) => {
                    debug!(path = %path.display(), attempt, "decrypted token store");
                    return Credential::from_string(token.to_string()).ok_or_else(|| {
                        CredentialError::CorruptStore {
                            path: path.clone(),
                            reason: "decrypted token is empty".to_string(),
                        }
                        .into()
                    });
                }
                Err(DecryptFailure::WrongPassphrase) => {
                    warn!(path = %path.display(), attempt, "wrong passphrase");
                }
                Err(DecryptFailure::Malformed(reason)) => {
                    return Err(CredentialError::CorruptStore {
                        path: path.clone(),
                        reason,
                    }
                    .into());
                }
            }
        }

        Err(CredentialError::TooManyAttempts {
            path: path.clone(),
            attempts: PASSPHRASE_ATTEMPTS,
        }
        .into())
    }

    /// Read the plaintext store, first restricting its permissions if needed
    pub fn load_plaintext(&self) -> Result<Credential> {
        let path = &self.plaintext_path;
        restrict_permissions(path)?;

        let token = std::fs::read_to_string(path)?;
        Credential::from_string(token).ok_or_else(|| {
            CredentialError::CorruptStore {
                path: path.clone(),
                reason: "file is empty".to_string(),
            }
            .into()
        })
    }

    /// Delete both store files; returns how many existed
    pub fn remove(&self) -> Result<usize> {
        let mut removed = 0;
        for path in [&self.encrypted_path, &self.plaintext_path] {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    info!(path = %path.display(), "removed token file");
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(removed)
    }
}

/// Write `contents` to `path` readable only by the owner
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // mode() only applies on creation
    restrict_permissions(path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}

/// Ensure `path` is accessible by its owner only
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)?.permissions().mode();
    if mode & 0o077 == 0 {
        return Ok(());
    }

    warn!(
        path = %path.display(),
        mode = %format!("{:o}", mode & 0o777),
        "token file is accessible by other users, restricting to 600"
    );
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|e| {
        CredentialError::Permissions {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
        .into()
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
