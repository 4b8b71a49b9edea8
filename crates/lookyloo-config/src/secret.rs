//! Per-install secret used to sign session cookies.

use std::io::Write;
use std::path::Path;

use rand::RngCore;
use secrecy::SecretBox;

use crate::Result;

pub const SECRET_KEY_LEN: usize = 64;

pub type SecretKey = SecretBox<Vec<u8>>;

/// Read the secret key file, creating it with fresh random bytes when it is
/// missing or shorter than [`SECRET_KEY_LEN`].
pub fn load_or_create_secret_key(path: &Path) -> Result<SecretKey> {
    let too_short = match std::fs::metadata(path) {
        Ok(meta) => meta.len() < SECRET_KEY_LEN as u64,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => return Err(e.into()),
    };

    if too_short {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut key = vec![0u8; SECRET_KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut key);
        let mut file = std::fs::File::create(path)?;
        file.write_all(&key)?;
        file.sync_all()?;
        tracing::info!(path = %path.display(), "generated new secret key");
    }

    Ok(SecretBox::new(Box::new(std::fs::read(path)?)))
}
