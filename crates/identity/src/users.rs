//! Authorized-user list loading.

use crate::error::{IdentityError, Result};
use std::fs;
use std::path::Path;

/// Authorized users, one name per line in `users.txt`.
///
/// Blank lines and `#` comments are skipped. The list is advisory: the
/// authentication engine decides what an empty or missing list means.
#[derive(Debug, Clone, Default)]
pub struct Users {
    names: Vec<String>,
}

impl Users {
    /// Load the user list from a file.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::UserFileLoadFailed`] when the file cannot
    /// be read.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).map_err(|source| IdentityError::UserFileLoadFailed {
                path: path.to_path_buf(),
                source,
            })?;

        let names = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();

        Ok(Self { names })
    }

    /// Whether `name` appears in the list.
    pub fn is_authorized(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Number of listed users.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate over the listed user names.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
