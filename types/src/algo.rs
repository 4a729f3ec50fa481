/*++

Licensed under the Apache-2.0 license.

File Name:

   algo.rs

Abstract:

    Key and hash algorithm identifiers with their fixed field widths.
    Every codec that deals in fixed-width key or signature fields consults
    this table; the widths are part of the device wire contract.

--*/

use crate::CodecError;

/// Keypair algorithm identifier carried in `ec_type` wire fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeypairType {
    Secp192r1 = 1,
    Secp224r1 = 2,
    Secp256r1 = 3,
    Secp384r1 = 4,
    Secp521r1 = 5,
    Secp192k1 = 6,
    Secp224k1 = 7,
    Secp256k1 = 8,
    Curve25519 = 9,
    Ed25519 = 10,
    Rsa2048 = 11,
}

impl KeypairType {
    pub fn from_u8(value: u8) -> Result<Self, CodecError> {
        match value {
            1 => Ok(Self::Secp192r1),
            2 => Ok(Self::Secp224r1),
            3 => Ok(Self::Secp256r1),
            4 => Ok(Self::Secp384r1),
            5 => Ok(Self::Secp521r1),
            6 => Ok(Self::Secp192k1),
            7 => Ok(Self::Secp224k1),
            8 => Ok(Self::Secp256k1),
            9 => Ok(Self::Curve25519),
            10 => Ok(Self::Ed25519),
            11 => Ok(Self::Rsa2048),
            _ => Err(CodecError::UnknownAlgorithm(value)),
        }
    }

    /// Raw public key width in bytes. RSA-2048 has no raw public key
    /// representation in this protocol and is an error.
    pub fn pubkey_len(self) -> Result<usize, CodecError> {
        match self {
            Self::Secp192r1 | Self::Secp192k1 => Ok(49),
            Self::Secp224r1 | Self::Secp224k1 => Ok(57),
            Self::Secp256r1 | Self::Secp256k1 => Ok(65),
            Self::Secp384r1 => Ok(97),
            Self::Secp521r1 => Ok(133),
            Self::Curve25519 | Self::Ed25519 => Ok(32),
            Self::Rsa2048 => Err(CodecError::UnknownAlgorithm(self as u8)),
        }
    }

    /// Raw signature width in bytes. Curve25519 is a key-agreement-only
    /// algorithm and has no signature representation.
    pub fn signature_len(self) -> Result<usize, CodecError> {
        match self {
            Self::Secp192r1 | Self::Secp192k1 => Ok(48),
            Self::Secp224r1 | Self::Secp224k1 => Ok(56),
            Self::Secp256r1 | Self::Secp256k1 => Ok(64),
            Self::Secp384r1 => Ok(96),
            Self::Secp521r1 => Ok(132),
            Self::Ed25519 => Ok(64),
            Self::Rsa2048 => Ok(256),
            Self::Curve25519 => Err(CodecError::UnknownAlgorithm(self as u8)),
        }
    }

    /// ECDSA component width (the `r`/`s` scalar size) for curves that
    /// use the DER `ECDSA-Sig-Value` wire representation.
    pub fn coord_len(self) -> Result<usize, CodecError> {
        match self {
            Self::Secp192r1 | Self::Secp192k1 => Ok(24),
            Self::Secp224r1 | Self::Secp224k1 => Ok(28),
            Self::Secp256r1 | Self::Secp256k1 => Ok(32),
            Self::Secp384r1 => Ok(48),
            Self::Secp521r1 => Ok(66),
            _ => Err(CodecError::UnknownAlgorithm(self as u8)),
        }
    }

    /// True for the NIST/SEC curves whose signatures are DER sequences in
    /// the wire format (everything except ed25519/curve25519/RSA).
    pub fn is_secp(self) -> bool {
        matches!(
            self,
            Self::Secp192r1
                | Self::Secp224r1
                | Self::Secp256r1
                | Self::Secp384r1
                | Self::Secp521r1
                | Self::Secp192k1
                | Self::Secp224k1
                | Self::Secp256k1
        )
    }
}

/// Hash algorithm identifier carried in `hash_type` wire fields.
/// SHA-256 is what shipping devices use for every signing operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HashAlgorithm {
    #[default]
    Sha256 = 0,
    Sha384 = 1,
    Sha512 = 2,
}

const SHA256_ALG_ID_DER: &[u8] = &[
    0x30, 0x0D, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01, 0x05, 0x00,
];
const SHA384_ALG_ID_DER: &[u8] = &[
    0x30, 0x0D, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x02, 0x05, 0x00,
];
const SHA512_ALG_ID_DER: &[u8] = &[
    0x30, 0x0D, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03, 0x05, 0x00,
];

impl HashAlgorithm {
    pub fn from_u8(value: u8) -> Result<Self, CodecError> {
        match value {
            0 => Ok(Self::Sha256),
            1 => Ok(Self::Sha384),
            2 => Ok(Self::Sha512),
            _ => Err(CodecError::UnknownHashAlgorithm(value)),
        }
    }

    /// DER `AlgorithmIdentifier` (OID + NULL params) used by the wire
    /// signature envelope.
    pub fn alg_id_der(self) -> &'static [u8] {
        match self {
            Self::Sha256 => SHA256_ALG_ID_DER,
            Self::Sha384 => SHA384_ALG_ID_DER,
            Self::Sha512 => SHA512_ALG_ID_DER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pubkey_widths() {
        assert_eq!(KeypairType::Secp192r1.pubkey_len().unwrap(), 49);
        assert_eq!(KeypairType::Secp192k1.pubkey_len().unwrap(), 49);
        assert_eq!(KeypairType::Secp224r1.pubkey_len().unwrap(), 57);
        assert_eq!(KeypairType::Secp256r1.pubkey_len().unwrap(), 65);
        assert_eq!(KeypairType::Secp256k1.pubkey_len().unwrap(), 65);
        assert_eq!(KeypairType::Secp384r1.pubkey_len().unwrap(), 97);
        assert_eq!(KeypairType::Secp521r1.pubkey_len().unwrap(), 133);
        assert_eq!(KeypairType::Ed25519.pubkey_len().unwrap(), 32);
        assert_eq!(KeypairType::Curve25519.pubkey_len().unwrap(), 32);
        assert!(KeypairType::Rsa2048.pubkey_len().is_err());
    }

    #[test]
    fn test_signature_widths() {
        assert_eq!(KeypairType::Secp192r1.signature_len().unwrap(), 48);
        assert_eq!(KeypairType::Secp224k1.signature_len().unwrap(), 56);
        assert_eq!(KeypairType::Secp256r1.signature_len().unwrap(), 64);
        assert_eq!(KeypairType::Secp384r1.signature_len().unwrap(), 96);
        assert_eq!(KeypairType::Secp521r1.signature_len().unwrap(), 132);
        assert_eq!(KeypairType::Ed25519.signature_len().unwrap(), 64);
        assert_eq!(KeypairType::Rsa2048.signature_len().unwrap(), 256);
        assert!(KeypairType::Curve25519.signature_len().is_err());
    }

    #[test]
    fn test_unknown_identifiers() {
        assert_eq!(KeypairType::from_u8(0), Err(CodecError::UnknownAlgorithm(0)));
        assert_eq!(
            KeypairType::from_u8(12),
            Err(CodecError::UnknownAlgorithm(12))
        );
        assert_eq!(
            HashAlgorithm::from_u8(3),
            Err(CodecError::UnknownHashAlgorithm(3))
        );
    }

    #[test]
    fn test_alg_id_der_is_well_formed() {
        for hash in [
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
        ] {
            let der = hash.alg_id_der();
            assert_eq!(der[0], 0x30);
            assert_eq!(der[1] as usize, der.len() - 2);
        }
    }
}
