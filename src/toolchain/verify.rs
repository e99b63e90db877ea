//! Checksum verification for downloaded archives

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::GvmError;
use crate::version::Version;

/// Computes the SHA256 of a file as lowercase hex
pub fn compute_sha256(file_path: &Path) -> Result<String, GvmError> {
    let mut file = std::fs::File::open(file_path)?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verifies that the archive of `version` matches the published checksum.
///
/// Returns the computed checksum on success.
pub fn verify_checksum(
    file_path: &Path,
    version: &Version,
    expected: &str,
) -> Result<String, GvmError> {
    let actual = compute_sha256(file_path)?;

    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(GvmError::ChecksumMismatch {
            version: version.clone(),
            expected: expected.trim().to_lowercase(),
            actual,
        });
    }

    Ok(actual)
}
