/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains the wire structures exchanged with devices during
    provisioning, the trust list container and the firmware image layouts,
    together with their binary codecs.

--*/

mod algo;
mod device_info;
mod firmware;
mod pubkey;
mod reader;
mod sign;
mod trust_list;
mod version;

pub use algo::{HashAlgorithm, KeypairType};
pub use device_info::{
    DeviceInfo, DEVICE_INFO_PREFIX_BYTE_SIZE, DEVICE_MANUFACTURER_BYTE_SIZE, DEVICE_UDID_BYTE_SIZE,
};
pub use firmware::{
    FirmwareDescriptor, FirmwareFooter, FirmwareHeader, DEVICE_TYPE_BYTE_SIZE,
    FIRMWARE_DESCRIPTOR_BYTE_SIZE, FIRMWARE_FOOTER_META_BYTE_SIZE, FIRMWARE_HEADER_BYTE_SIZE,
    MANUFACTURE_ID_BYTE_SIZE, SIGNATURE_META_BYTE_SIZE,
};
pub use pubkey::{DatedPublicKey, PublicKey};
pub use sign::{SignRequest, Signature};
pub use trust_list::{TrustList, TrustListFooter, TrustListHeader, TRUST_LIST_HEADER_BYTE_SIZE};
pub use version::{FileVersion, FILE_VERSION_BYTE_SIZE, VERSION_EPOCH_OFFSET};

pub(crate) use reader::Reader;

use core::fmt;

/// Errors raised by the binary codecs and the algorithm size table.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The input buffer ended before the structure was complete.
    #[error("{structure}: buffer truncated, {needed} bytes needed but {remaining} remain")]
    Truncated {
        structure: &'static str,
        needed: usize,
        remaining: usize,
    },

    /// A structure decoded cleanly but its computed size disagrees with
    /// the input, or an encoded field has the wrong fixed width.
    #[error("{structure}: length mismatch, expected {expected} bytes, got {actual}")]
    LengthMismatch {
        structure: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Unrecognized key algorithm identifier.
    #[error("unknown key algorithm identifier: {0}")]
    UnknownAlgorithm(u8),

    /// A version string that is not `major.minor.patch.build`.
    #[error("invalid version string: {0}")]
    InvalidVersion(String),

    /// Unrecognized hash algorithm identifier.
    #[error("unknown hash algorithm identifier: {0}")]
    UnknownHashAlgorithm(u8),
}

pub const MAC_ADDR_BYTE_SIZE: usize = 6;

/// Device MAC address as reported by the discovery service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; MAC_ADDR_BYTE_SIZE]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl From<[u8; MAC_ADDR_BYTE_SIZE]> for MacAddr {
    fn from(bytes: [u8; MAC_ADDR_BYTE_SIZE]) -> Self {
        MacAddr(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_addr_display() {
        let mac = MacAddr([0x02, 0xab, 0x00, 0x3c, 0x4d, 0x5e]);
        assert_eq!(mac.to_string(), "02:ab:00:3c:4d:5e");
    }
}
