/*++

Licensed under the Apache-2.0 license.

File Name:

   trust_list.rs

Abstract:

    Trust list container: header, dated public key chunks and the signed
    footer. Decoding is strict; a trust list that does not account for
    every input byte is rejected.

--*/

use crate::{
    CodecError, DatedPublicKey, FileVersion, Reader, Signature, FILE_VERSION_BYTE_SIZE,
};

pub const TRUST_LIST_HEADER_BYTE_SIZE: usize = 4 + FILE_VERSION_BYTE_SIZE + 2 + 1;

/// Trust list header. All scalar fields are big-endian.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrustListHeader {
    pub whole_size: u32,
    pub version: FileVersion,
    pub pubkeys_count: u16,
    pub signatures_count: u8,
}

impl TrustListHeader {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TRUST_LIST_HEADER_BYTE_SIZE);
        out.extend_from_slice(&self.whole_size.to_be_bytes());
        self.version.encode_into(&mut out);
        out.extend_from_slice(&self.pubkeys_count.to_be_bytes());
        out.push(self.signatures_count);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), CodecError> {
        let mut reader = Reader::new("TrustListHeader", buf);
        let whole_size = reader.u32_be()?;
        let version = FileVersion::decode_from(&mut reader)?;
        let pubkeys_count = reader.u16_be()?;
        let signatures_count = reader.u8()?;
        Ok((
            Self {
                whole_size,
                version,
                pubkeys_count,
                signatures_count,
            },
            reader.consumed(),
        ))
    }
}

/// Trust list footer: the list type tag and the authority signatures
/// over the list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrustListFooter {
    pub tl_type: u8,
    pub signatures: Vec<Signature>,
}

impl TrustListFooter {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = vec![self.tl_type];
        for signature in &self.signatures {
            out.extend_from_slice(&signature.encode()?);
        }
        Ok(out)
    }
}

/// A decoded trust list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrustList {
    pub header: TrustListHeader,
    pub chunks: Vec<DatedPublicKey>,
    pub footer: TrustListFooter,
}

impl TrustList {
    /// Decode a complete trust list blob.
    ///
    /// Reads the header, exactly `pubkeys_count` chunks, the footer type
    /// tag and exactly `signatures_count` signatures. Leftover bytes are
    /// a hard error, not a warning: the whole-buffer size is an
    /// integrity invariant of the format.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let (header, mut offset) = TrustListHeader::decode(buf)?;

        let mut chunks = Vec::with_capacity(usize::from(header.pubkeys_count));
        for _ in 0..header.pubkeys_count {
            let (chunk, used) = DatedPublicKey::decode(&buf[offset..])?;
            chunks.push(chunk);
            offset += used;
        }

        let mut reader = Reader::new("TrustListFooter", &buf[offset..]);
        let tl_type = reader.u8()?;
        offset += reader.consumed();

        let mut signatures = Vec::with_capacity(usize::from(header.signatures_count));
        for _ in 0..header.signatures_count {
            let (signature, used) = Signature::decode(&buf[offset..])?;
            signatures.push(signature);
            offset += used;
        }

        if offset != buf.len() {
            return Err(CodecError::LengthMismatch {
                structure: "TrustList",
                expected: offset,
                actual: buf.len(),
            });
        }

        Ok(Self {
            header,
            chunks,
            footer: TrustListFooter {
                tl_type,
                signatures,
            },
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = self.header.encode();
        for chunk in &self.chunks {
            out.extend_from_slice(&chunk.encode()?);
        }
        out.extend_from_slice(&self.footer.encode()?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KeypairType, PublicKey};

    fn sample_chunk() -> DatedPublicKey {
        DatedPublicKey {
            start_date: 100,
            expire_date: 200,
            pubkey: PublicKey {
                key_type: 2,
                ec_type: KeypairType::Secp256r1 as u8,
                metadata: Vec::new(),
                raw_key: vec![0x42; 65],
            },
        }
    }

    fn sample_signature() -> Signature {
        Signature {
            signer_type: 2,
            ec_type: KeypairType::Secp256r1 as u8,
            hash_type: 0,
            raw_signature: vec![0x66; 64],
            raw_pubkey: vec![0x77; 65],
        }
    }

    fn sample_trust_list(pubkeys: u16, signatures: u8) -> TrustList {
        TrustList {
            header: TrustListHeader {
                whole_size: 0,
                version: FileVersion {
                    major: 1,
                    minor: 0,
                    patch: 0,
                    build: 1,
                    timestamp: 1000,
                },
                pubkeys_count: pubkeys,
                signatures_count: signatures,
            },
            chunks: (0..pubkeys).map(|_| sample_chunk()).collect(),
            footer: TrustListFooter {
                tl_type: 1,
                signatures: (0..signatures).map(|_| sample_signature()).collect(),
            },
        }
    }

    #[test]
    fn test_header_round_trip() {
        let header = sample_trust_list(3, 2).header;
        let encoded = header.encode();
        assert_eq!(encoded.len(), TRUST_LIST_HEADER_BYTE_SIZE);
        let (decoded, consumed) = TrustListHeader::decode(&encoded).unwrap();
        assert_eq!(consumed, TRUST_LIST_HEADER_BYTE_SIZE);
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_trust_list_round_trip() {
        let tl = sample_trust_list(2, 1);
        let encoded = tl.encode().unwrap();
        let decoded = TrustList::decode(&encoded).unwrap();
        assert_eq!(decoded, tl);
    }

    #[test]
    fn test_trust_list_missing_chunk_is_truncated() {
        // Header advertises two chunks but only one chunk worth of bytes
        // follows.
        let tl = sample_trust_list(2, 0);
        let mut encoded = tl.header.encode();
        encoded.extend_from_slice(&tl.chunks[0].encode().unwrap());
        let err = TrustList::decode(&encoded).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }), "{err:?}");
    }

    #[test]
    fn test_trust_list_trailing_byte_is_length_mismatch() {
        let mut encoded = sample_trust_list(1, 1).encode().unwrap();
        encoded.push(0x00);
        let err = TrustList::decode(&encoded).unwrap_err();
        assert!(matches!(err, CodecError::LengthMismatch { .. }), "{err:?}");
    }

    #[test]
    fn test_trust_list_empty_buffer() {
        let err = TrustList::decode(&[]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }
}
