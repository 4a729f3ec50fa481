/*++

Licensed under the Apache-2.0 license.

File Name:

   firmware.rs

Abstract:

    Firmware image layouts: the descriptor shared by both artifacts, the
    update image header and the multi-signer footer. All scalar fields in
    these structures are big-endian.

--*/

use crate::{CodecError, FileVersion, Reader, Signature, FILE_VERSION_BYTE_SIZE};

pub const MANUFACTURE_ID_BYTE_SIZE: usize = 16;
pub const DEVICE_TYPE_BYTE_SIZE: usize = 4;

/// 16 + 4 + 11 + 1 + 2 + 4 + 4
pub const FIRMWARE_DESCRIPTOR_BYTE_SIZE: usize =
    MANUFACTURE_ID_BYTE_SIZE + DEVICE_TYPE_BYTE_SIZE + FILE_VERSION_BYTE_SIZE + 1 + 2 + 4 + 4;

/// 4 + 4 + 4 + 4 + 1 + 42
pub const FIRMWARE_HEADER_BYTE_SIZE: usize = 4 * 4 + 1 + FIRMWARE_DESCRIPTOR_BYTE_SIZE;

/// Signature count byte plus the descriptor repeated in the footer.
pub const FIRMWARE_FOOTER_META_BYTE_SIZE: usize = 1 + FIRMWARE_DESCRIPTOR_BYTE_SIZE;

/// Per-signature fixed overhead: signer type, ec type, hash type.
pub const SIGNATURE_META_BYTE_SIZE: usize = 3;

/// Firmware descriptor embedded in both the update header and the footer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FirmwareDescriptor {
    pub manufacture_id: [u8; MANUFACTURE_ID_BYTE_SIZE],
    pub device_type: [u8; DEVICE_TYPE_BYTE_SIZE],
    pub version: FileVersion,
    pub padding: u8,
    pub chunk_size: u16,
    pub firmware_length: u32,
    pub app_size: u32,
}

impl FirmwareDescriptor {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FIRMWARE_DESCRIPTOR_BYTE_SIZE);
        out.extend_from_slice(&self.manufacture_id);
        out.extend_from_slice(&self.device_type);
        self.version.encode_into(&mut out);
        out.push(self.padding);
        out.extend_from_slice(&self.chunk_size.to_be_bytes());
        out.extend_from_slice(&self.firmware_length.to_be_bytes());
        out.extend_from_slice(&self.app_size.to_be_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), CodecError> {
        let mut reader = Reader::new("FirmwareDescriptor", buf);
        let manufacture_id = reader.take(MANUFACTURE_ID_BYTE_SIZE)?.try_into().unwrap();
        let device_type = reader.take(DEVICE_TYPE_BYTE_SIZE)?.try_into().unwrap();
        let version = FileVersion::decode_from(&mut reader)?;
        let padding = reader.u8()?;
        let chunk_size = reader.u16_be()?;
        let firmware_length = reader.u32_be()?;
        let app_size = reader.u32_be()?;
        Ok((
            Self {
                manufacture_id,
                device_type,
                version,
                padding,
                chunk_size,
                firmware_length,
                app_size,
            },
            reader.consumed(),
        ))
    }
}

/// Update image header: section offsets plus the embedded descriptor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FirmwareHeader {
    pub code_offset: u32,
    pub code_length: u32,
    pub footer_offset: u32,
    pub footer_length: u32,
    pub signatures_count: u8,
    pub descriptor: FirmwareDescriptor,
}

impl FirmwareHeader {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FIRMWARE_HEADER_BYTE_SIZE);
        out.extend_from_slice(&self.code_offset.to_be_bytes());
        out.extend_from_slice(&self.code_length.to_be_bytes());
        out.extend_from_slice(&self.footer_offset.to_be_bytes());
        out.extend_from_slice(&self.footer_length.to_be_bytes());
        out.push(self.signatures_count);
        out.extend_from_slice(&self.descriptor.encode());
        out
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), CodecError> {
        let mut reader = Reader::new("FirmwareHeader", buf);
        let code_offset = reader.u32_be()?;
        let code_length = reader.u32_be()?;
        let footer_offset = reader.u32_be()?;
        let footer_length = reader.u32_be()?;
        let signatures_count = reader.u8()?;
        let (descriptor, used) = FirmwareDescriptor::decode(reader.rest())?;
        Ok((
            Self {
                code_offset,
                code_length,
                footer_offset,
                footer_length,
                signatures_count,
                descriptor,
            },
            reader.consumed() + used,
        ))
    }
}

/// Multi-signer footer shared by the Prog and Update images.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FirmwareFooter {
    pub descriptor: FirmwareDescriptor,
    pub signatures: Vec<Signature>,
}

impl FirmwareFooter {
    /// The bytes signed by each signer: the signature count and the
    /// descriptor (the signatures themselves are appended afterwards).
    pub fn encode_meta(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FIRMWARE_FOOTER_META_BYTE_SIZE);
        out.push(self.signatures.len() as u8);
        out.extend_from_slice(&self.descriptor.encode());
        out
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = self.encode_meta();
        for signature in &self.signatures {
            out.extend_from_slice(&signature.encode()?);
        }
        Ok(out)
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), CodecError> {
        let mut reader = Reader::new("FirmwareFooter", buf);
        let signatures_count = reader.u8()?;
        let (descriptor, used) = FirmwareDescriptor::decode(reader.rest())?;
        let mut offset = reader.consumed() + used;
        let mut signatures = Vec::with_capacity(usize::from(signatures_count));
        for _ in 0..signatures_count {
            let (signature, used) = Signature::decode(&buf[offset..])?;
            signatures.push(signature);
            offset += used;
        }
        Ok((
            Self {
                descriptor,
                signatures,
            },
            offset,
        ))
    }
}
