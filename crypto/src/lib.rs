/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    Signing capability consumed by the provisioning flow and the firmware
    signer. The capability is an explicit object constructed once at
    process start and passed by reference; there is no ambient crypto
    state.

--*/

mod convert;

pub use convert::{
    raw_pubkey_from_wire, raw_sign_from_wire, wire_pubkey_from_raw, wire_sign_from_raw,
};

use openssl::bn::BigNumContext;
use openssl::ec::{EcGroup, EcKey, PointConversionForm};
use openssl::ecdsa::EcdsaSig;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, Private};
use openssl::sign::Verifier;

use provkit_types::{CodecError, HashAlgorithm, KeypairType};

/// Errors raised by the signing capability and the format bridge.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// A raw <-> wire format conversion could not be performed.
    #[error("format conversion failed: {0}")]
    ConversionFailed(&'static str),

    /// The signer produced an empty signature.
    #[error("signature is empty")]
    SignatureEmpty,

    /// A freshly produced signature did not verify against the signer's
    /// own public key.
    #[error("self-verification of freshly produced signature failed")]
    SelfVerificationFailed,

    /// A signature did not verify against the supplied public key.
    #[error("signature verification failed")]
    VerificationFailed,

    /// The algorithm is not usable for this operation.
    #[error("unsupported algorithm for operation: {0:?}")]
    UnsupportedAlgorithm(KeypairType),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Openssl(#[from] openssl::error::ErrorStack),
}

/// Signing capability: produces and checks wire-format signatures and
/// exposes the signer's wire-format public key.
pub trait Signer {
    /// Sign `data`, returning the signature in wire format.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Verify a wire-format signature over `data` with a wire-format
    /// public key.
    fn verify(
        &self,
        data: &[u8],
        wire_sig: &[u8],
        wire_pubkey: &[u8],
        hash: HashAlgorithm,
    ) -> Result<(), CryptoError>;

    /// The signer's public key in wire format (SubjectPublicKeyInfo DER).
    fn public_key_full(&self) -> Result<Vec<u8>, CryptoError>;
}

pub(crate) fn message_digest(hash: HashAlgorithm) -> MessageDigest {
    match hash {
        HashAlgorithm::Sha256 => MessageDigest::sha256(),
        HashAlgorithm::Sha384 => MessageDigest::sha384(),
        HashAlgorithm::Sha512 => MessageDigest::sha512(),
    }
}

pub(crate) fn curve_nid(keypair: KeypairType) -> Result<Nid, CryptoError> {
    match keypair {
        KeypairType::Secp192r1 => Ok(Nid::X9_62_PRIME192V1),
        KeypairType::Secp224r1 => Ok(Nid::SECP224R1),
        KeypairType::Secp256r1 => Ok(Nid::X9_62_PRIME256V1),
        KeypairType::Secp384r1 => Ok(Nid::SECP384R1),
        KeypairType::Secp521r1 => Ok(Nid::SECP521R1),
        KeypairType::Secp192k1 => Ok(Nid::SECP192K1),
        KeypairType::Secp224k1 => Ok(Nid::SECP224K1),
        KeypairType::Secp256k1 => Ok(Nid::SECP256K1),
        _ => Err(CryptoError::UnsupportedAlgorithm(keypair)),
    }
}

/// Map an openssl curve back to the protocol identifier.
pub fn keypair_type_from_nid(nid: Nid) -> Option<KeypairType> {
    match nid {
        Nid::X9_62_PRIME192V1 => Some(KeypairType::Secp192r1),
        Nid::SECP224R1 => Some(KeypairType::Secp224r1),
        Nid::X9_62_PRIME256V1 => Some(KeypairType::Secp256r1),
        Nid::SECP384R1 => Some(KeypairType::Secp384r1),
        Nid::SECP521R1 => Some(KeypairType::Secp521r1),
        Nid::SECP192K1 => Some(KeypairType::Secp192k1),
        Nid::SECP224K1 => Some(KeypairType::Secp224k1),
        Nid::SECP256K1 => Some(KeypairType::Secp256k1),
        _ => None,
    }
}

/// Signer backed by an EC private key held by the factory.
#[derive(Debug)]
pub struct FactorySigner {
    key: EcKey<Private>,
    keypair_type: KeypairType,
    hash: HashAlgorithm,
}

impl FactorySigner {
    /// Load the factory key from PEM bytes.
    pub fn from_pem(pem: &[u8], keypair_type: KeypairType) -> Result<Self, CryptoError> {
        // Fails early if the keypair type has no curve behind it.
        curve_nid(keypair_type)?;
        let key = EcKey::private_key_from_pem(pem)?;
        Ok(Self {
            key,
            keypair_type,
            hash: HashAlgorithm::Sha256,
        })
    }

    pub fn new(key: EcKey<Private>, keypair_type: KeypairType) -> Result<Self, CryptoError> {
        curve_nid(keypair_type)?;
        Ok(Self {
            key,
            keypair_type,
            hash: HashAlgorithm::Sha256,
        })
    }

    pub fn keypair_type(&self) -> KeypairType {
        self.keypair_type
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash
    }
}

impl Signer for FactorySigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let digest = openssl::hash::hash(message_digest(self.hash), data)?;
        let sig = EcdsaSig::sign(&digest, &self.key)?;
        let inner = sig.to_der()?;
        convert::wrap_wire_signature(&inner, self.hash)
    }

    fn verify(
        &self,
        data: &[u8],
        wire_sig: &[u8],
        wire_pubkey: &[u8],
        hash: HashAlgorithm,
    ) -> Result<(), CryptoError> {
        verify_wire(data, wire_sig, wire_pubkey, hash)
    }

    fn public_key_full(&self) -> Result<Vec<u8>, CryptoError> {
        let public = EcKey::from_public_key(self.key.group(), self.key.public_key())?;
        Ok(public.public_key_to_der()?)
    }
}

/// Verify a wire-format signature over `data` with a wire-format public
/// key. Standalone so that callers holding only public material (e.g.
/// checking a device-produced signature) can use it directly.
pub fn verify_wire(
    data: &[u8],
    wire_sig: &[u8],
    wire_pubkey: &[u8],
    hash: HashAlgorithm,
) -> Result<(), CryptoError> {
    if wire_sig.is_empty() {
        return Err(CryptoError::SignatureEmpty);
    }
    if wire_pubkey.is_empty() {
        return Err(CryptoError::ConversionFailed("public key is empty"));
    }
    let inner = convert::unwrap_wire_signature(wire_sig)?;
    let pkey = PKey::public_key_from_der(wire_pubkey)?;
    let valid = match pkey.id() {
        Id::ED25519 => {
            let mut verifier = Verifier::new_without_digest(&pkey)?;
            verifier.verify_oneshot(inner, data)?
        }
        _ => {
            let mut verifier = Verifier::new(message_digest(hash), &pkey)?;
            verifier.update(data)?;
            verifier.verify(inner)?
        }
    };
    if valid {
        Ok(())
    } else {
        Err(CryptoError::VerificationFailed)
    }
}

/// Generate a fresh keypair for the given curve. Used by tests and the
/// simulated device population.
pub fn generate_keypair(keypair_type: KeypairType) -> Result<EcKey<Private>, CryptoError> {
    let group = EcGroup::from_curve_name(curve_nid(keypair_type)?)?;
    Ok(EcKey::generate(&group)?)
}

/// Uncompressed point bytes (`0x04 || X || Y`) of an EC key: the raw
/// public key representation the devices store.
pub fn raw_pubkey_bytes(key: &EcKey<Private>) -> Result<Vec<u8>, CryptoError> {
    let mut ctx = BigNumContext::new()?;
    Ok(key
        .public_key()
        .to_bytes(key.group(), PointConversionForm::UNCOMPRESSED, &mut ctx)?)
}
