//! Credential source ordering
//!
//! Sources are consulted strictly in order and the first one present wins:
//! environment variable, encrypted store, plaintext store, interactive entry.
//! Only an interactively entered token is probed before use and offered for
//! saving; tokens from the environment or a store are trusted here and fail
//! later at the first request if they are bad.

use super::{Credential, CredentialStore, StoredCredential};
use crate::client::ZenodoClient;
use crate::config::CredentialConfig;
use crate::error::{CredentialError, Result};
use crate::prompt::Prompter;
use crate::types::{CredentialSource, RecordId};
use crate::validator::{self, Validation};
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

/// How an interactively entered token should be persisted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaveChoice {
    /// Encrypt with a passphrase (default)
    #[default]
    Encrypted,
    /// Write the token as-is
    Plaintext,
    /// Keep it for this run only
    None,
}

impl SaveChoice {
    const OPTIONS: [&'static str; 3] = [
        "encrypted file (passphrase protected)",
        "plaintext file",
        "do not save",
    ];

    fn from_index(index: usize) -> Self {
        match index {
            0 => SaveChoice::Encrypted,
            1 => SaveChoice::Plaintext,
            _ => SaveChoice::None,
        }
    }
}

/// Finds a usable token for a record
#[derive(Clone, Debug)]
pub struct CredentialResolver {
    env_var: String,
    store: CredentialStore,
    client: ZenodoClient,
}

impl CredentialResolver {
    /// Create a resolver over the configured sources
    pub fn new(config: &CredentialConfig, client: ZenodoClient) -> Self {
        Self {
            env_var: config.env_var.clone(),
            store: CredentialStore::from_config(config),
            client,
        }
    }

    /// Create a resolver with an explicit store
    pub fn with_store(
        env_var: impl Into<String>,
        store: CredentialStore,
        client: ZenodoClient,
    ) -> Self {
        Self {
            env_var: env_var.into(),
            store,
            client,
        }
    }

    /// The token files this resolver reads and writes
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Resolve a token for `record_id`
    ///
    /// # Errors
    /// - [`CredentialError::Missing`] if the interactive entry is empty
    /// - [`CredentialError::Invalid`] if an entered token fails the probe
    /// - store errors (wrong passphrase limit, corrupt file, permissions)
    pub async fn resolve(
        &self,
        record_id: RecordId,
        prompter: &mut dyn Prompter,
    ) -> Result<(Credential, CredentialSource)> {
        if let Some(credential) = self.from_environment() {
            debug!(var = %self.env_var, "using access token from environment");
            return Ok((
                credential,
                CredentialSource::Environment {
                    var: self.env_var.clone(),
                },
            ));
        }

        if let Some((credential, source)) = self.store.load(prompter)? {
            debug!(%source, "using stored access token");
            return Ok((credential, source));
        }

        let entered = prompter.secret(&format!("Access token for record {}", record_id))?;
        let credential = Credential::new(entered).ok_or(CredentialError::Missing)?;

        match validator::validate(&self.client, &credential, record_id).await? {
            Validation::Valid => {}
            Validation::Invalid(status) => {
                drop(credential);
                return Err(CredentialError::Invalid { record_id, status }.into());
            }
        }
        info!(record_id = %record_id, "access token validated");

        match self.offer_save(&credential, prompter) {
            Ok(Some(_)) => {}
            Ok(None) => debug!("access token not saved"),
            Err(e) => warn!(error = %e, "could not save access token, continuing without it"),
        }

        Ok((credential, CredentialSource::Interactive))
    }

    /// Ask whether and how to persist `credential`
    ///
    /// Returns `Ok(None)` when the user declines, leaves the passphrase empty,
    /// or the two passphrase entries differ.
    pub fn offer_save(
        &self,
        credential: &Credential,
        prompter: &mut dyn Prompter,
    ) -> Result<Option<StoredCredential>> {
        let index = prompter.choose("Save this token for next time?", &SaveChoice::OPTIONS, 0)?;

        match SaveChoice::from_index(index) {
            SaveChoice::None => Ok(None),
            SaveChoice::Plaintext => self.store.save(credential, None).map(Some),
            SaveChoice::Encrypted => {
                let passphrase = prompter.secret("New passphrase")?;
                if passphrase.expose_secret().is_empty() {
                    warn!("empty passphrase, token not saved");
                    return Ok(None);
                }
                let repeated = prompter.secret("Repeat passphrase")?;
                if repeated.expose_secret() != passphrase.expose_secret() {
                    warn!("passphrases do not match, token not saved");
                    return Ok(None);
                }
                self.store.save(credential, Some(&passphrase)).map(Some)
            }
        }
    }

    fn from_environment(&self) -> Option<Credential> {
        std::env::var(&self.env_var)
            .ok()
            .and_then(Credential::from_string)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::credentials::crypto;
    use crate::error::Error;
    use crate::prompt::testing::ScriptedPrompter;
    use serial_test::serial;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ID: RecordId = RecordId(4242);

    async fn server_with_probe(status: u16, expected_calls: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/deposit/depositions/4242"))
            .respond_with(ResponseTemplate::new(status))
            .expect(expected_calls)
            .mount(&server)
            .await;
        server
    }

    fn resolver(server: &MockServer, dir: &TempDir, env_var: &str) -> CredentialResolver {
        let client = ZenodoClient::new(&ApiConfig {
            base_url: server.uri(),
            ..ApiConfig::default()
        })
        .unwrap();
        let store = CredentialStore::new(dir.path().join("token.enc"), dir.path().join("token"))
            .with_kdf_iterations(1_000);
        CredentialResolver::with_store(env_var, store, client)
    }

    #[tokio::test]
    #[serial]
    async fn environment_short_circuits_everything() {
        let server = server_with_probe(200, 0).await;
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("token"), "from-file").unwrap();
        let var = "ZENODO_DL_TEST_TOKEN_ENV";
        // SAFETY: serialized test, variable name unique to this test
        unsafe { std::env::set_var(var, "from-env") };

        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        let (credential, source) = resolver(&server, &dir, var)
            .resolve(ID, &mut prompter)
            .await
            .unwrap();
        unsafe { std::env::remove_var(var) };

        assert_eq!(credential.expose(), "from-env");
        assert_eq!(
            source,
            CredentialSource::Environment {
                var: var.to_string()
            }
        );
        assert!(prompter.prompts.is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn empty_environment_variable_is_ignored() {
        let server = server_with_probe(200, 0).await;
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("token"), "from-file").unwrap();
        let var = "ZENODO_DL_TEST_TOKEN_EMPTY";
        // SAFETY: serialized test, variable name unique to this test
        unsafe { std::env::set_var(var, "") };

        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        let (credential, source) = resolver(&server, &dir, var)
            .resolve(ID, &mut prompter)
            .await
            .unwrap();
        unsafe { std::env::remove_var(var) };

        assert_eq!(credential.expose(), "from-file");
        assert!(matches!(source, CredentialSource::PlaintextFile { .. }));
    }

    #[tokio::test]
    async fn encrypted_store_wins_over_plaintext_and_is_not_probed() {
        let server = server_with_probe(200, 0).await;
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("token"), "plain").unwrap();
        std::fs::write(
            dir.path().join("token.enc"),
            crypto::encrypt("enc", "pw", 1_000).unwrap(),
        )
        .unwrap();

        let mut prompter = ScriptedPrompter::new(["pw"]);
        let (credential, source) = resolver(&server, &dir, "ZENODO_DL_TEST_UNSET_1")
            .resolve(ID, &mut prompter)
            .await
            .unwrap();
        assert_eq!(credential.expose(), "enc");
        assert!(matches!(source, CredentialSource::EncryptedFile { .. }));
    }

    #[tokio::test]
    async fn interactive_token_is_validated_and_saved_encrypted_by_default() {
        let server = server_with_probe(200, 1).await;
        let dir = TempDir::new().unwrap();
        let resolver = resolver(&server, &dir, "ZENODO_DL_TEST_UNSET_2");

        let mut prompter = ScriptedPrompter::new(["typed-token", "", "pw", "pw"]);
        let (credential, source) = resolver.resolve(ID, &mut prompter).await.unwrap();
        assert_eq!(credential.expose(), "typed-token");
        assert_eq!(source, CredentialSource::Interactive);

        assert!(resolver.store().has_encrypted());
        assert!(!resolver.store().has_plaintext());
        let blob = std::fs::read_to_string(resolver.store().encrypted_path()).unwrap();
        assert_eq!(&*crypto::decrypt(&blob, "pw", 1_000).unwrap(), "typed-token");
    }

    #[tokio::test]
    async fn plaintext_save_choice() {
        let server = server_with_probe(200, 1).await;
        let dir = TempDir::new().unwrap();
        let resolver = resolver(&server, &dir, "ZENODO_DL_TEST_UNSET_3");

        let mut prompter = ScriptedPrompter::new(["typed-token", "2"]);
        resolver.resolve(ID, &mut prompter).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(resolver.store().plaintext_path()).unwrap(),
            "typed-token"
        );
    }

    #[tokio::test]
    async fn declining_save_writes_nothing() {
        let server = server_with_probe(200, 1).await;
        let dir = TempDir::new().unwrap();
        let resolver = resolver(&server, &dir, "ZENODO_DL_TEST_UNSET_4");

        let mut prompter = ScriptedPrompter::new(["typed-token", "3"]);
        resolver.resolve(ID, &mut prompter).await.unwrap();
        assert!(!resolver.store().has_encrypted());
        assert!(!resolver.store().has_plaintext());
    }

    #[tokio::test]
    async fn mismatched_passphrases_skip_saving() {
        let server = server_with_probe(200, 1).await;
        let dir = TempDir::new().unwrap();
        let resolver = resolver(&server, &dir, "ZENODO_DL_TEST_UNSET_5");

        let mut prompter = ScriptedPrompter::new(["typed-token", "1", "pw", "other"]);
        let (credential, _) = resolver.resolve(ID, &mut prompter).await.unwrap();
        assert_eq!(credential.expose(), "typed-token");
        assert!(!resolver.store().has_encrypted());
    }

    #[tokio::test]
    async fn rejected_token_is_fatal_and_never_saved() {
        let server = server_with_probe(401, 1).await;
        let dir = TempDir::new().unwrap();
        let resolver = resolver(&server, &dir, "ZENODO_DL_TEST_UNSET_6");

        let mut prompter = ScriptedPrompter::new(["bad-token", "1", "pw", "pw"]);
        let err = resolver.resolve(ID, &mut prompter).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Credential(CredentialError::Invalid { status: 401, .. })
        ));
        assert!(err.is_fatal());
        assert_eq!(prompter.prompts.len(), 1, "no save prompt after rejection");
        assert!(!resolver.store().has_encrypted());
        assert!(!resolver.store().has_plaintext());
    }

    #[tokio::test]
    async fn empty_interactive_entry_is_missing() {
        let server = server_with_probe(200, 0).await;
        let dir = TempDir::new().unwrap();

        let mut prompter = ScriptedPrompter::new(["   "]);
        let err = resolver(&server, &dir, "ZENODO_DL_TEST_UNSET_7")
            .resolve(ID, &mut prompter)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Credential(CredentialError::Missing)));
    }
}
