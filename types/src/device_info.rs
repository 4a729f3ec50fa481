/*++

Licensed under the Apache-2.0 license.

File Name:

   device_info.rs

Abstract:

    Device identity record returned by the device-info request: a packed
    little-endian prefix followed by the device's public key and its
    factory signature.

--*/

use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{CodecError, MacAddr, PublicKey, Signature, MAC_ADDR_BYTE_SIZE};

pub const DEVICE_UDID_BYTE_SIZE: usize = 32;
pub const DEVICE_MANUFACTURER_BYTE_SIZE: usize = 16;

/// Fixed-layout little-endian prefix of the device-info response. This
/// mirrors the device's packed in-memory layout, so unlike the other
/// structures it is native/little-endian end to end.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug)]
#[repr(C)]
struct DeviceInfoPrefix {
    manufacturer: [u8; DEVICE_MANUFACTURER_BYTE_SIZE],
    model: U32,
    mac: [u8; MAC_ADDR_BYTE_SIZE],
    udid: [u8; DEVICE_UDID_BYTE_SIZE],
    data_sz: U16,
}

pub const DEVICE_INFO_PREFIX_BYTE_SIZE: usize = core::mem::size_of::<DeviceInfoPrefix>();

/// Decoded device identity record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub manufacturer: [u8; DEVICE_MANUFACTURER_BYTE_SIZE],
    pub model: u32,
    pub mac: MacAddr,
    pub udid: [u8; DEVICE_UDID_BYTE_SIZE],
    pub pubkey: PublicKey,
    pub signature: Signature,
}

impl DeviceInfo {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let pubkey = self.pubkey.encode()?;
        let signature = self.signature.encode()?;
        let prefix = DeviceInfoPrefix {
            manufacturer: self.manufacturer,
            model: U32::new(self.model),
            mac: self.mac.0,
            udid: self.udid,
            data_sz: U16::new((pubkey.len() + signature.len()) as u16),
        };
        let mut out = Vec::with_capacity(DEVICE_INFO_PREFIX_BYTE_SIZE + pubkey.len() + signature.len());
        out.extend_from_slice(prefix.as_bytes());
        out.extend_from_slice(&pubkey);
        out.extend_from_slice(&signature);
        Ok(out)
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let (prefix, rest) =
            DeviceInfoPrefix::read_from_prefix(buf).map_err(|_| CodecError::Truncated {
                structure: "DeviceInfo",
                needed: DEVICE_INFO_PREFIX_BYTE_SIZE,
                remaining: buf.len(),
            })?;
        let (pubkey, pubkey_len) = PublicKey::decode(rest)?;
        let (signature, _) = Signature::decode(&rest[pubkey_len..])?;
        Ok(Self {
            manufacturer: prefix.manufacturer,
            model: prefix.model.get(),
            mac: MacAddr(prefix.mac),
            udid: prefix.udid,
            pubkey,
            signature,
        })
    }
}
