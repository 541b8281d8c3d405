//! Shared helpers for integration tests
//!
//! Every test talks to a wiremock server and keeps token files and downloads
//! inside its own temporary directory, so nothing in the user's home is read
//! or written.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use secrecy::SecretString;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::Path;
use tempfile::TempDir;
use zenodo_dl::config::Config;
use zenodo_dl::prompt::Prompter;

/// Environment variable no test ever sets, so the resolver moves on to the stores
pub const UNSET_ENV_VAR: &str = "ZENODO_DL_INTEGRATION_TOKEN_NEVER_SET";

/// Configuration pointing at `base_url` with all paths inside `dir`
pub fn test_config(base_url: &str, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config.credentials.env_var = UNSET_ENV_VAR.to_string();
    config.credentials.encrypted_path = dir.path().join("token.enc");
    config.credentials.plaintext_path = dir.path().join("token");
    config.credentials.kdf_iterations = 1_000;
    config.download.output_dir = dir.path().join("downloads");
    config
}

/// In-memory ZIP archive with the given entries
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Write a plaintext token store readable only by the owner
pub fn write_plaintext_token(path: &Path, token: &str) {
    std::fs::write(path, token).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).unwrap();
    }
}

/// Prompter answering from a fixed script
#[derive(Debug, Default)]
pub struct Script {
    answers: VecDeque<String>,
    /// Every prompt shown, in order
    pub prompts: Vec<String>,
}

impl Script {
    pub fn new<const N: usize>(answers: [&str; N]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            prompts: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self, prompt: &str) -> io::Result<String> {
        self.prompts.push(prompt.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))
    }
}

impl Prompter for Script {
    fn secret(&mut self, prompt: &str) -> io::Result<SecretString> {
        self.next(prompt).map(SecretString::from)
    }

    fn line(&mut self, prompt: &str) -> io::Result<String> {
        self.next(prompt)
    }
}
