/*++

Licensed under the Apache-2.0 license.

File Name:

   version.rs

Abstract:

    File version structure shared by the trust list header and the
    firmware descriptor.

--*/

use crate::{CodecError, Reader};

/// Offset in seconds between the Unix epoch and the protocol's version
/// timestamp epoch (2015-01-01T00:00:00Z).
pub const VERSION_EPOCH_OFFSET: u32 = 1_420_070_400;

pub const FILE_VERSION_BYTE_SIZE: usize = 11;

/// File version: `major.minor.patch.build` plus a creation timestamp in
/// seconds since [`VERSION_EPOCH_OFFSET`].
///
/// Both containers that embed it (trust list header, firmware
/// descriptor) are big-endian, so the codec here is big-endian only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub build: u32,
    pub timestamp: u32,
}

impl FileVersion {
    /// Parse a `major.minor.patch.build` string. The timestamp is
    /// supplied by the caller (see [`VERSION_EPOCH_OFFSET`]).
    pub fn parse(version: &str, timestamp: u32) -> Result<Self, CodecError> {
        let invalid = || CodecError::InvalidVersion(version.to_string());
        let parts: Vec<&str> = version.split('.').collect();
        if parts.len() != 4 {
            return Err(invalid());
        }
        Ok(Self {
            major: parts[0].parse().map_err(|_| invalid())?,
            minor: parts[1].parse().map_err(|_| invalid())?,
            patch: parts[2].parse().map_err(|_| invalid())?,
            build: parts[3].parse().map_err(|_| invalid())?,
            timestamp,
        })
    }

    /// Seconds since the Unix epoch for this version's timestamp.
    pub fn unix_timestamp(&self) -> u64 {
        u64::from(self.timestamp) + u64::from(VERSION_EPOCH_OFFSET)
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.major);
        out.push(self.minor);
        out.push(self.patch);
        out.extend_from_slice(&self.build.to_be_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
    }

    pub(crate) fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            major: reader.u8()?,
            minor: reader.u8()?,
            patch: reader.u8()?,
            build: reader.u32_be()?,
            timestamp: reader.u32_be()?,
        })
    }
}

impl core::fmt::Display for FileVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.patch, self.build
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_round_trip() {
        let version = FileVersion {
            major: 1,
            minor: 2,
            patch: 3,
            build: 0x01020304,
            timestamp: 0xA1B2C3D4,
        };
        let mut buf = Vec::new();
        version.encode_into(&mut buf);
        assert_eq!(buf.len(), FILE_VERSION_BYTE_SIZE);
        assert_eq!(&buf[3..7], &[0x01, 0x02, 0x03, 0x04]);

        let mut reader = Reader::new("FileVersion", &buf);
        let decoded = FileVersion::decode_from(&mut reader).unwrap();
        assert_eq!(decoded, version);
        assert_eq!(reader.consumed(), FILE_VERSION_BYTE_SIZE);
    }

    #[test]
    fn test_version_parse() {
        let version = FileVersion::parse("2.5.11.4027", 77).unwrap();
        assert_eq!(version.major, 2);
        assert_eq!(version.minor, 5);
        assert_eq!(version.patch, 11);
        assert_eq!(version.build, 4027);
        assert_eq!(version.timestamp, 77);
        assert_eq!(version.to_string(), "2.5.11.4027");

        assert!(FileVersion::parse("1.2.3", 0).is_err());
        assert!(FileVersion::parse("1.2.3.4.5", 0).is_err());
        assert!(FileVersion::parse("1.2.x.4", 0).is_err());
        assert!(FileVersion::parse("300.0.0.1", 0).is_err());
    }

    #[test]
    fn test_unix_timestamp_offset() {
        let version = FileVersion {
            timestamp: 100,
            ..Default::default()
        };
        assert_eq!(version.unix_timestamp(), 1_420_070_500);
    }
}
