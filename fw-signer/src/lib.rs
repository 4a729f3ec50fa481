/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    Firmware image signer. Builds the two release artifacts from one
    firmware blob: the `_Prog.bin` flash image (code, 0xFF filler,
    footer) and the `_Update.bin` over-the-air image (header, code,
    footer). Both artifacts share one multi-signer footer.

--*/

mod signer;

pub use signer::{FirmwareSigner, SignerKeyConfig};

use std::path::{Path, PathBuf};

use provkit_crypto::CryptoError;
use provkit_types::{
    CodecError, FileVersion, FirmwareDescriptor, FirmwareFooter, FirmwareHeader,
    DEVICE_TYPE_BYTE_SIZE, FIRMWARE_HEADER_BYTE_SIZE, MANUFACTURE_ID_BYTE_SIZE,
};

#[derive(Debug, thiserror::Error)]
pub enum FirmwareError {
    /// The configured Prog image size cannot hold the code plus footer.
    #[error("prog image size too small: need {need} bytes, have {have}")]
    ConfigTooSmall { need: usize, have: usize },

    #[error("bad signer key config: {0}")]
    BadKeyConfig(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Inputs for one signing run.
#[derive(Clone, Debug)]
pub struct BuildParams {
    pub firmware_path: PathBuf,
    /// Total size of the Prog flash image.
    pub prog_size: usize,
    pub version: FileVersion,
    pub manufacture_id: [u8; MANUFACTURE_ID_BYTE_SIZE],
    pub device_type: [u8; DEVICE_TYPE_BYTE_SIZE],
    pub chunk_size: u16,
}

/// Filler length for the Prog image, or `ConfigTooSmall` when the code
/// plus footer exceeds the target size.
pub fn filler_len(
    prog_size: usize,
    code_len: usize,
    footer_size: usize,
) -> Result<usize, FirmwareError> {
    let need = code_len + footer_size;
    if need > prog_size {
        return Err(FirmwareError::ConfigTooSmall {
            need,
            have: prog_size,
        });
    }
    Ok(prog_size - need)
}

/// The two artifacts of a signing run, in memory, with the shared
/// footer.
#[derive(Debug)]
pub struct SignedFirmware {
    pub prog: Vec<u8>,
    pub update: Vec<u8>,
    pub footer: FirmwareFooter,
}

impl FirmwareSigner {
    /// Build both artifacts and write them next to the input as
    /// `<input>_Prog.bin` and `<input>_Update.bin`.
    pub fn create_signed_firmware(
        &self,
        params: &BuildParams,
    ) -> Result<(PathBuf, PathBuf), FirmwareError> {
        let code = std::fs::read(&params.firmware_path)?;
        let signed = self.build(&code, params)?;

        let (prog_path, update_path) = artifact_paths(&params.firmware_path);

        std::fs::write(&prog_path, &signed.prog)?;
        log::info!("file saved: {}", prog_path.display());
        std::fs::write(&update_path, &signed.update)?;
        log::info!("file saved: {}", update_path.display());
        Ok((prog_path, update_path))
    }

    /// Build both artifacts in memory.
    pub fn build(&self, code: &[u8], params: &BuildParams) -> Result<SignedFirmware, FirmwareError> {
        let footer_size = self.footer_size()?;
        let filler = filler_len(params.prog_size, code.len(), footer_size)?;
        log::info!("0xFF filler section length: {filler} bytes");

        let descriptor = FirmwareDescriptor {
            manufacture_id: params.manufacture_id,
            device_type: params.device_type,
            version: params.version,
            padding: 0,
            chunk_size: params.chunk_size,
            firmware_length: code.len() as u32,
            app_size: params.prog_size as u32,
        };

        // Prog image: code, filler, then the footer. The signatures
        // cover everything written before them.
        let mut prog = Vec::with_capacity(params.prog_size);
        prog.extend_from_slice(code);
        prog.resize(prog.len() + filler, 0xFF);
        prog.push(self.signer_count() as u8);
        prog.extend_from_slice(&descriptor.encode());

        let signatures = self.sign_buffer(&prog)?;
        let footer = FirmwareFooter {
            descriptor,
            signatures,
        };
        for signature in &footer.signatures {
            prog.extend_from_slice(&signature.encode()?);
        }
        debug_assert_eq!(prog.len(), params.prog_size);

        // Update image: header, code, then the same footer. The header
        // describes offsets consistent with the Prog build.
        let header = FirmwareHeader {
            code_offset: FIRMWARE_HEADER_BYTE_SIZE as u32,
            code_length: code.len() as u32,
            footer_offset: (FIRMWARE_HEADER_BYTE_SIZE + code.len()) as u32,
            footer_length: footer_size as u32,
            signatures_count: footer.signatures.len() as u8,
            descriptor,
        };
        let mut update =
            Vec::with_capacity(FIRMWARE_HEADER_BYTE_SIZE + code.len() + footer_size);
        update.extend_from_slice(&header.encode());
        update.extend_from_slice(code);
        update.extend_from_slice(&footer.encode()?);

        Ok(SignedFirmware {
            prog,
            update,
            footer,
        })
    }
}

/// Strip the extension from a firmware path and derive the artifact
/// names. Kept separate for testing.
pub fn artifact_paths(firmware_path: &Path) -> (PathBuf, PathBuf) {
    let stem = firmware_path.with_extension("");
    let stem = stem.to_string_lossy();
    (
        PathBuf::from(format!("{stem}_Prog.bin")),
        PathBuf::from(format!("{stem}_Update.bin")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filler_len() {
        assert_eq!(filler_len(1000, 200, 150).unwrap(), 650);
        assert_eq!(filler_len(1000, 850, 150).unwrap(), 0);
    }

    #[test]
    fn test_filler_len_too_small() {
        let err = filler_len(300, 200, 150).unwrap_err();
        match err {
            FirmwareError::ConfigTooSmall { need, have } => {
                assert_eq!(need, 350);
                assert_eq!(have, 300);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_artifact_paths() {
        let (prog, update) = artifact_paths(Path::new("/build/firmware.bin"));
        assert_eq!(prog, Path::new("/build/firmware_Prog.bin"));
        assert_eq!(update, Path::new("/build/firmware_Update.bin"));
    }
}
