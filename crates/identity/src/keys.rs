//! DER key pair loading.

use crate::commitment::Commitment;
use crate::error::{IdentityError, Result};
use std::fs;
use std::path::Path;

/// Long-term key pair in DER form, read from fixed paths at startup.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    public_der: Vec<u8>,
    private_der: Vec<u8>,
}

impl KeyMaterial {
    /// Load a key pair from DER files.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::KeyLoadFailed`] naming the offending path
    /// when either file cannot be read.
    pub fn load(public_path: &Path, private_path: &Path) -> Result<Self> {
        let public_der = fs::read(public_path).map_err(|source| IdentityError::KeyLoadFailed {
            path: public_path.to_path_buf(),
            source,
        })?;
        let private_der = fs::read(private_path).map_err(|source| IdentityError::KeyLoadFailed {
            path: private_path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            public_der,
            private_der,
        })
    }

    /// The public key in DER form.
    pub fn public_der(&self) -> &[u8] {
        &self.public_der
    }

    /// The private key in DER form.
    pub fn private_der(&self) -> &[u8] {
        &self.private_der
    }

    /// Commitment to the public key.
    pub fn commitment(&self) -> Commitment {
        Commitment::digest(&self.public_der)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn der_file(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[test]
    fn test_load_reads_both_files() {
        let public = der_file(b"\x30\x59public");
        let private = der_file(b"\x30\x82private");

        let keys = KeyMaterial::load(public.path(), private.path()).unwrap();
        assert_eq!(keys.public_der(), b"\x30\x59public");
        assert_eq!(keys.private_der(), b"\x30\x82private");
    }

    #[test]
    fn test_missing_file_names_path() {
        let public = der_file(b"\x30\x59public");
        let missing = Path::new("/nonexistent/pico_priv_key.der");

        let result = KeyMaterial::load(public.path(), missing);
        match result {
            Err(IdentityError::KeyLoadFailed { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected KeyLoadFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_commitment_tracks_public_key() {
        let public = der_file(b"key A");
        let private = der_file(b"irrelevant");
        let keys = KeyMaterial::load(public.path(), private.path()).unwrap();

        assert_eq!(keys.commitment(), Commitment::digest(b"key A"));
    }
}
