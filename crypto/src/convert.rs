/*++

Licensed under the Apache-2.0 license.

File Name:

   convert.rs

Abstract:

    Bridge between the device-native fixed-width raw representation of
    signatures and public keys and the variable-length wire format used
    by the downstream identity service.

    The wire signature envelope is
    `SEQUENCE { SEQUENCE { OID(hash) NULL } OCTET-STRING { inner } }`
    where `inner` is the DER ECDSA-Sig-Value for the SEC curves and the
    raw signature bytes for ed25519/RSA. The wire public key is X.509
    SubjectPublicKeyInfo DER.

--*/

use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcKey, EcPoint, PointConversionForm};
use openssl::ecdsa::EcdsaSig;
use openssl::pkey::{Id, PKey};

use provkit_types::{HashAlgorithm, KeypairType};

use crate::{curve_nid, CryptoError};

const TAG_SEQUENCE: u8 = 0x30;
const TAG_OCTET_STRING: u8 = 0x04;

fn der_push_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xFF {
        out.push(0x81);
        out.push(len as u8);
    } else {
        out.push(0x82);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    }
    out.extend_from_slice(content);
}

/// Read one TLV at the start of `buf`; returns (content, total consumed).
fn der_read_tlv(buf: &[u8], expected_tag: u8) -> Result<(&[u8], usize), CryptoError> {
    let malformed = CryptoError::ConversionFailed("malformed DER element");
    if buf.len() < 2 || buf[0] != expected_tag {
        return Err(malformed);
    }
    let (len, header) = match buf[1] {
        n if n < 0x80 => (usize::from(n), 2),
        0x81 => {
            if buf.len() < 3 {
                return Err(malformed);
            }
            (usize::from(buf[2]), 3)
        }
        0x82 => {
            if buf.len() < 4 {
                return Err(malformed);
            }
            (usize::from(u16::from_be_bytes([buf[2], buf[3]])), 4)
        }
        _ => return Err(malformed),
    };
    if buf.len() < header + len {
        return Err(malformed);
    }
    Ok((&buf[header..header + len], header + len))
}

/// Wrap an inner signature blob in the wire envelope.
pub(crate) fn wrap_wire_signature(
    inner: &[u8],
    hash: HashAlgorithm,
) -> Result<Vec<u8>, CryptoError> {
    if inner.is_empty() {
        return Err(CryptoError::SignatureEmpty);
    }
    let mut body = hash.alg_id_der().to_vec();
    der_push_tlv(&mut body, TAG_OCTET_STRING, inner);
    let mut out = Vec::with_capacity(body.len() + 4);
    der_push_tlv(&mut out, TAG_SEQUENCE, &body);
    Ok(out)
}

/// Extract the inner signature blob from the wire envelope.
pub(crate) fn unwrap_wire_signature(wire: &[u8]) -> Result<&[u8], CryptoError> {
    let (body, consumed) = der_read_tlv(wire, TAG_SEQUENCE)?;
    if consumed != wire.len() {
        return Err(CryptoError::ConversionFailed(
            "trailing bytes after signature envelope",
        ));
    }
    let (_alg_id, alg_len) = der_read_tlv(body, TAG_SEQUENCE)?;
    let (inner, _) = der_read_tlv(&body[alg_len..], TAG_OCTET_STRING)?;
    Ok(inner)
}

/// Convert a fixed-width raw signature to the wire format.
pub fn wire_sign_from_raw(
    raw: &[u8],
    keypair_type: KeypairType,
    hash: HashAlgorithm,
) -> Result<Vec<u8>, CryptoError> {
    if raw.len() != keypair_type.signature_len()? {
        return Err(CryptoError::ConversionFailed("raw signature has wrong size"));
    }
    let inner;
    if keypair_type.is_secp() {
        let coord = keypair_type.coord_len()?;
        let r = BigNum::from_slice(&raw[..coord])?;
        let s = BigNum::from_slice(&raw[coord..coord * 2])?;
        inner = EcdsaSig::from_private_components(r, s)?.to_der()?;
    } else {
        inner = raw.to_vec();
    }
    wrap_wire_signature(&inner, hash)
}

/// Convert a wire-format signature back to the fixed-width raw form.
pub fn raw_sign_from_wire(wire: &[u8], keypair_type: KeypairType) -> Result<Vec<u8>, CryptoError> {
    let inner = unwrap_wire_signature(wire)?;
    if keypair_type.is_secp() {
        let coord = keypair_type.coord_len()?;
        let sig = EcdsaSig::from_der(inner)
            .map_err(|_| CryptoError::ConversionFailed("malformed ECDSA-Sig-Value"))?;
        let mut raw = sig.r().to_vec_padded(coord as i32)?;
        raw.extend_from_slice(&sig.s().to_vec_padded(coord as i32)?);
        Ok(raw)
    } else {
        if inner.len() != keypair_type.signature_len()? {
            return Err(CryptoError::ConversionFailed(
                "inner signature has wrong size",
            ));
        }
        Ok(inner.to_vec())
    }
}

/// Convert a device-native raw public key to the wire SPKI form.
pub fn wire_pubkey_from_raw(
    raw: &[u8],
    keypair_type: KeypairType,
) -> Result<Vec<u8>, CryptoError> {
    if raw.len() != keypair_type.pubkey_len()? {
        return Err(CryptoError::ConversionFailed("raw public key has wrong size"));
    }
    if keypair_type == KeypairType::Ed25519 {
        let pkey = PKey::public_key_from_raw_bytes(raw, Id::ED25519)?;
        return Ok(pkey.public_key_to_der()?);
    }
    let group = EcGroup::from_curve_name(curve_nid(keypair_type)?)?;
    let mut ctx = BigNumContext::new()?;
    let point = EcPoint::from_bytes(&group, raw, &mut ctx)
        .map_err(|_| CryptoError::ConversionFailed("public key is not a point on the curve"))?;
    let key = EcKey::from_public_key(&group, &point)?;
    Ok(key.public_key_to_der()?)
}

/// Convert a wire SPKI public key to the device-native raw form.
pub fn raw_pubkey_from_wire(
    wire: &[u8],
    keypair_type: KeypairType,
) -> Result<Vec<u8>, CryptoError> {
    if keypair_type == KeypairType::Ed25519 {
        let pkey = PKey::public_key_from_der(wire)
            .map_err(|_| CryptoError::ConversionFailed("malformed SubjectPublicKeyInfo"))?;
        if pkey.id() != Id::ED25519 {
            return Err(CryptoError::ConversionFailed("key algorithm mismatch"));
        }
        return Ok(pkey.raw_public_key()?);
    }
    let key = EcKey::public_key_from_der(wire)
        .map_err(|_| CryptoError::ConversionFailed("malformed SubjectPublicKeyInfo"))?;
    let mut ctx = BigNumContext::new()?;
    let raw = key
        .public_key()
        .to_bytes(key.group(), PointConversionForm::UNCOMPRESSED, &mut ctx)?;
    if raw.len() != keypair_type.pubkey_len()? {
        return Err(CryptoError::ConversionFailed(
            "decoded key does not match declared curve",
        ));
    }
    Ok(raw)
}
