//! Producer and account keys.
//!
//! Keys and signatures are stored and transmitted in compressed form.
//! They are only decompressed when verifying.

use core::fmt::{Debug, Formatter, Result as FmtResult};

use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use fixed_hash::construct_fixed_hash;
use impl_serde::impl_fixed_hash_serde;

use crate::primitives::H256;

construct_fixed_hash! {
    #[derive(derive_more::AsRef)]
    pub struct PublicKeyBytes(32);
}

impl_fixed_hash_serde!(PublicKeyBytes, 32);

construct_fixed_hash! {
    #[derive(derive_more::AsRef)]
    pub struct SignatureBytes(64);
}

impl_fixed_hash_serde!(SignatureBytes, 64);

impl SignatureBytes {
    /// Returns `false` for malformed keys and signatures instead of failing.
    #[must_use]
    pub fn verify(self, message: impl AsRef<[u8]>, public_key: PublicKeyBytes) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
            return false;
        };

        verifying_key
            .verify_strict(message.as_ref(), &Signature::from_bytes(&self.0))
            .is_ok()
    }
}

#[derive(Clone)]
pub struct SecretKey(SigningKey);

// Avoid leaking the key through logs.
impl Debug for SecretKey {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        formatter
            .debug_tuple("SecretKey")
            .field(&self.to_public_key())
            .finish()
    }
}

impl SecretKey {
    #[must_use]
    pub fn from_seed(seed: H256) -> Self {
        Self(SigningKey::from_bytes(seed.as_fixed_bytes()))
    }

    /// Derives a key from an arbitrary phrase.
    ///
    /// Only suitable for development chains and tests.
    #[must_use]
    pub fn from_phrase(phrase: impl AsRef<[u8]>) -> Self {
        Self::from_seed(hashing::hash_bytes(phrase))
    }

    #[must_use]
    pub fn to_public_key(&self) -> PublicKeyBytes {
        PublicKeyBytes(self.0.verifying_key().to_bytes())
    }

    #[must_use]
    pub fn sign(&self, message: impl AsRef<[u8]>) -> SignatureBytes {
        SignatureBytes(self.0.sign(message.as_ref()).to_bytes())
    }
}
