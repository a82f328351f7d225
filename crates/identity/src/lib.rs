//! # PicoBLE Identity
//!
//! Long-term key material and the identity inputs the peripheral service
//! reads at startup:
//!
//! - DER-encoded key pair files (`pico_pub_key.der` / `pico_priv_key.der`)
//! - the 32-byte commitment derived from the public key, which seeds the
//!   rotating service UUID
//! - the authorized-user list (`users.txt`)
//!
//! All loaders are read-only; the service never writes these files. Load
//! failures are reported as typed errors so the caller can log and carry on
//! (the authentication engine defines its own behaviour under missing
//! credentials).

pub mod commitment;
pub mod error;
pub mod keys;
pub mod users;

pub use commitment::{Commitment, COMMITMENT_LEN};
pub use error::{IdentityError, Result};
pub use keys::KeyMaterial;
pub use users::Users;
