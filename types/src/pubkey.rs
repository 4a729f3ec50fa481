/*++

Licensed under the Apache-2.0 license.

File Name:

   pubkey.rs

Abstract:

    Public key wire structure and its dated trust-list variant.

--*/

use crate::{CodecError, KeypairType, Reader};

/// A raw public key as exchanged with devices.
///
/// Wire layout: `key_type` u8, `ec_type` u8, metadata length u16
/// big-endian, metadata, raw key. The raw key width is fixed by
/// `ec_type` (see [`KeypairType::pubkey_len`]); the scalar fields around
/// it keep the historical byte order of this structure.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublicKey {
    pub key_type: u8,
    pub ec_type: u8,
    pub metadata: Vec<u8>,
    pub raw_key: Vec<u8>,
}

impl PublicKey {
    pub fn keypair_type(&self) -> Result<KeypairType, CodecError> {
        KeypairType::from_u8(self.ec_type)
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let expected = KeypairType::from_u8(self.ec_type)?.pubkey_len()?;
        if self.raw_key.len() != expected {
            return Err(CodecError::LengthMismatch {
                structure: "PublicKey",
                expected,
                actual: self.raw_key.len(),
            });
        }
        if self.metadata.len() > usize::from(u16::MAX) {
            return Err(CodecError::LengthMismatch {
                structure: "PublicKey",
                expected: usize::from(u16::MAX),
                actual: self.metadata.len(),
            });
        }
        let mut out = Vec::with_capacity(4 + self.metadata.len() + expected);
        out.push(self.key_type);
        out.push(self.ec_type);
        out.extend_from_slice(&(self.metadata.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.metadata);
        out.extend_from_slice(&self.raw_key);
        Ok(out)
    }

    /// Decode one public key, returning the structure and the number of
    /// bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), CodecError> {
        let mut reader = Reader::new("PublicKey", buf);
        let key_type = reader.u8()?;
        let ec_type = reader.u8()?;
        let metadata_len = reader.u16_be()? as usize;
        let metadata = reader.take(metadata_len)?.to_vec();
        let key_len = KeypairType::from_u8(ec_type)?.pubkey_len()?;
        let raw_key = reader.take(key_len)?.to_vec();
        Ok((
            Self {
                key_type,
                ec_type,
                metadata,
                raw_key,
            },
            reader.consumed(),
        ))
    }
}

/// A public key with its validity window, as stored in trust list chunks.
///
/// The two dates are little-endian while the embedded key keeps its own
/// byte order; this asymmetry is part of the wire contract.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DatedPublicKey {
    pub start_date: u32,
    pub expire_date: u32,
    pub pubkey: PublicKey,
}

impl DatedPublicKey {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.start_date.to_le_bytes());
        out.extend_from_slice(&self.expire_date.to_le_bytes());
        out.extend_from_slice(&self.pubkey.encode()?);
        Ok(out)
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), CodecError> {
        let mut reader = Reader::new("DatedPublicKey", buf);
        let start_date = reader.u32_le()?;
        let expire_date = reader.u32_le()?;
        let (pubkey, pubkey_len) = PublicKey::decode(reader.rest())?;
        Ok((
            Self {
                start_date,
                expire_date,
                pubkey,
            },
            reader.consumed() + pubkey_len,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key() -> PublicKey {
        PublicKey {
            key_type: 2,
            ec_type: KeypairType::Ed25519 as u8,
            metadata: vec![0xAA, 0xBB, 0xCC],
            raw_key: vec![0x11; 32],
        }
    }

    #[test]
    fn test_pubkey_round_trip() {
        let key = sample_key();
        let encoded = key.encode().unwrap();
        // key_type + ec_type + u16 metadata length prefix (big-endian).
        assert_eq!(&encoded[..4], &[2, 10, 0x00, 0x03]);
        let (decoded, consumed) = PublicKey::decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, key);
    }

    #[test]
    fn test_pubkey_decode_truncated() {
        let encoded = sample_key().encode().unwrap();
        let err = PublicKey::decode(&encoded[..encoded.len() - 1]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn test_pubkey_encode_rejects_wrong_key_width() {
        let mut key = sample_key();
        key.raw_key.pop();
        let err = key.encode().unwrap_err();
        assert_eq!(
            err,
            CodecError::LengthMismatch {
                structure: "PublicKey",
                expected: 32,
                actual: 31,
            }
        );
    }

    #[test]
    fn test_pubkey_unknown_algorithm() {
        let mut encoded = sample_key().encode().unwrap();
        encoded[1] = 0x7F;
        let err = PublicKey::decode(&encoded).unwrap_err();
        assert_eq!(err, CodecError::UnknownAlgorithm(0x7F));
    }

    #[test]
    fn test_dated_pubkey_round_trip() {
        let dated = DatedPublicKey {
            start_date: 0x01020304,
            expire_date: 0x0A0B0C0D,
            pubkey: sample_key(),
        };
        let encoded = dated.encode().unwrap();
        // Dates are little-endian.
        assert_eq!(&encoded[..4], &[0x04, 0x03, 0x02, 0x01]);
        let (decoded, consumed) = DatedPublicKey::decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, dated);
    }
}
