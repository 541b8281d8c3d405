//! Passphrase encryption for the token store
//!
//! Blobs use the OpenSSL `enc -aes-256-cbc -pbkdf2 -a` layout so that files
//! written by `openssl` and by this crate are interchangeable:
//!
//! ```text
//! base64( "Salted__" | salt[8] | AES-256-CBC(PKCS#7, token) )
//! key | iv = PBKDF2-HMAC-SHA256(passphrase, salt, iterations, 48 bytes)
//! ```

use aes::Aes256;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CredentialError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const MAGIC: &[u8; 8] = b"Salted__";
const SALT_LEN: usize = 8;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;
const LINE_WIDTH: usize = 64;

/// Why a blob could not be decrypted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptFailure {
    /// Not base64, missing header, or truncated ciphertext
    Malformed(String),
    /// Padding or plaintext check failed; the passphrase is wrong
    WrongPassphrase,
}

fn derive_key_iv(
    passphrase: &str,
    salt: &[u8],
    iterations: u32,
) -> Zeroizing<[u8; KEY_LEN + IV_LEN]> {
    let mut okm = Zeroizing::new([0u8; KEY_LEN + IV_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, iterations, &mut okm[..]);
    okm
}

/// Encrypt `secret` under `passphrase` with a fresh random salt
pub fn encrypt(
    secret: &str,
    passphrase: &str,
    iterations: u32,
) -> Result<String, CredentialError> {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    encrypt_with_salt(secret, passphrase, &salt, iterations)
}

pub(crate) fn encrypt_with_salt(
    secret: &str,
    passphrase: &str,
    salt: &[u8; SALT_LEN],
    iterations: u32,
) -> Result<String, CredentialError> {
    let okm = derive_key_iv(passphrase, salt, iterations);
    let cipher = Aes256CbcEnc::new_from_slices(&okm[..KEY_LEN], &okm[KEY_LEN..])
        .map_err(|e| CredentialError::Crypto(e.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(secret.as_bytes());

    let mut raw = Vec::with_capacity(MAGIC.len() + SALT_LEN + ciphertext.len());
    raw.extend_from_slice(MAGIC);
    raw.extend_from_slice(salt);
    raw.extend_from_slice(&ciphertext);

    Ok(wrap_lines(&STANDARD.encode(raw)))
}

/// Decrypt a blob produced by [`encrypt`] or by `openssl enc -aes-256-cbc -pbkdf2 -a`
///
/// A single trailing newline in the plaintext is dropped, since tokens piped
/// through `echo` carry one.
pub fn decrypt(
    blob: &str,
    passphrase: &str,
    iterations: u32,
) -> Result<Zeroizing<String>, DecryptFailure> {
    let compact: String = blob.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let raw = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| DecryptFailure::Malformed(format!("not base64: {e}")))?;

    if raw.len() < MAGIC.len() + SALT_LEN || &raw[..MAGIC.len()] != MAGIC {
        return Err(DecryptFailure::Malformed("missing salt header".to_string()));
    }
    let salt = &raw[MAGIC.len()..MAGIC.len() + SALT_LEN];
    let ciphertext = &raw[MAGIC.len() + SALT_LEN..];
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(DecryptFailure::Malformed(format!(
            "ciphertext length {} is not a positive multiple of {}",
            ciphertext.len(),
            BLOCK_LEN
        )));
    }

    let okm = derive_key_iv(passphrase, salt, iterations);
    let cipher = Aes256CbcDec::new_from_slices(&okm[..KEY_LEN], &okm[KEY_LEN..])
        .map_err(|e| DecryptFailure::Malformed(e.to_string()))?;
    let plain = Zeroizing::new(
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| DecryptFailure::WrongPassphrase)?,
    );

    let text = std::str::from_utf8(&plain).map_err(|_| DecryptFailure::WrongPassphrase)?;
    let text = text
        .strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text);
    if text.is_empty() || text.chars().any(char::is_control) {
        return Err(DecryptFailure::WrongPassphrase);
    }

    Ok(Zeroizing::new(text.to_string()))
}

fn wrap_lines(encoded: &str) -> String {
    let mut out = String::with_capacity(encoded.len() + encoded.len() / LINE_WIDTH + 1);
    for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out
}
