/*++

Licensed under the Apache-2.0 license.

File Name:

   sign.rs

Abstract:

    Signature wire structure and the in-device signing request.

--*/

use crate::{CodecError, KeypairType, Reader};

/// A raw signature record: who signed, with which algorithms, the
/// fixed-width signature and the signer's raw public key.
///
/// Wire layout: `signer_type` u8, `ec_type` u8, `hash_type` u8, raw
/// signature, raw public key. Both variable fields have widths fixed by
/// `ec_type` (see [`KeypairType::signature_len`] /
/// [`KeypairType::pubkey_len`]).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signature {
    pub signer_type: u8,
    pub ec_type: u8,
    pub hash_type: u8,
    pub raw_signature: Vec<u8>,
    pub raw_pubkey: Vec<u8>,
}

impl Signature {
    pub fn keypair_type(&self) -> Result<KeypairType, CodecError> {
        KeypairType::from_u8(self.ec_type)
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let keypair = KeypairType::from_u8(self.ec_type)?;
        let sig_len = keypair.signature_len()?;
        let key_len = keypair.pubkey_len()?;
        if self.raw_signature.len() != sig_len {
            return Err(CodecError::LengthMismatch {
                structure: "Signature",
                expected: sig_len,
                actual: self.raw_signature.len(),
            });
        }
        if self.raw_pubkey.len() != key_len {
            return Err(CodecError::LengthMismatch {
                structure: "Signature",
                expected: key_len,
                actual: self.raw_pubkey.len(),
            });
        }
        let mut out = Vec::with_capacity(3 + sig_len + key_len);
        out.push(self.signer_type);
        out.push(self.ec_type);
        out.push(self.hash_type);
        out.extend_from_slice(&self.raw_signature);
        out.extend_from_slice(&self.raw_pubkey);
        Ok(out)
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), CodecError> {
        let mut reader = Reader::new("Signature", buf);
        let signer_type = reader.u8()?;
        let ec_type = reader.u8()?;
        let hash_type = reader.u8()?;
        let keypair = KeypairType::from_u8(ec_type)?;
        let raw_signature = reader.take(keypair.signature_len()?)?.to_vec();
        let raw_pubkey = reader.take(keypair.pubkey_len()?)?.to_vec();
        Ok((
            Self {
                signer_type,
                ec_type,
                hash_type,
                raw_signature,
                raw_pubkey,
            },
            reader.consumed(),
        ))
    }
}

/// Request body for the in-device signing operation: the hash algorithm
/// the device must use followed by the payload to sign.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignRequest {
    pub hash_type: u8,
    pub payload: Vec<u8>,
}

impl SignRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.payload.len());
        out.push(self.hash_type);
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new("SignRequest", buf);
        let hash_type = reader.u8()?;
        Ok(Self {
            hash_type,
            payload: reader.rest().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_signature() -> Signature {
        Signature {
            signer_type: 4,
            ec_type: KeypairType::Secp256r1 as u8,
            hash_type: 0,
            raw_signature: vec![0x5A; 64],
            raw_pubkey: vec![0x04; 65],
        }
    }

    #[test]
    fn test_signature_round_trip() {
        let sig = sample_signature();
        let encoded = sig.encode().unwrap();
        assert_eq!(encoded.len(), 3 + 64 + 65);
        let (decoded, consumed) = Signature::decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, sig);
    }

    #[test]
    fn test_signature_rsa_width() {
        let sig = Signature {
            signer_type: 1,
            ec_type: KeypairType::Rsa2048 as u8,
            hash_type: 0,
            raw_signature: vec![0; 256],
            raw_pubkey: vec![],
        };
        // RSA-2048 has no raw public key entry in the size table.
        assert!(matches!(
            sig.encode(),
            Err(CodecError::UnknownAlgorithm(11))
        ));
    }

    #[test]
    fn test_signature_decode_truncated() {
        let encoded = sample_signature().encode().unwrap();
        let err = Signature::decode(&encoded[..30]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn test_sign_request_round_trip() {
        let req = SignRequest {
            hash_type: 0,
            payload: b"payload-to-sign".to_vec(),
        };
        let encoded = req.encode();
        assert_eq!(encoded[0], 0);
        assert_eq!(SignRequest::decode(&encoded).unwrap(), req);
    }
}
