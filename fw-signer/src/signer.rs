/*++

Licensed under the Apache-2.0 license.

File Name:

   signer.rs

Abstract:

    Multi-signer key handling for firmware images: an arbitrary list of
    `{path, key_type}` signer entries loaded from a TOML config. Each
    signer contributes one footer signature record.

--*/

use std::path::{Path, PathBuf};

use serde_derive::{Deserialize, Serialize};

use provkit_crypto::{
    keypair_type_from_nid, raw_pubkey_from_wire, raw_sign_from_wire, FactorySigner, Signer,
};
use provkit_types::{HashAlgorithm, KeypairType, Signature, SIGNATURE_META_BYTE_SIZE};

use crate::FirmwareError;

/// One signer entry in the key config file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignerKeyConfig {
    /// PEM file with the signer's EC private key.
    pub path: PathBuf,
    /// Role identifier stamped into the footer record (`signer_type`).
    pub key_type: u8,
}

#[derive(Serialize, Deserialize)]
struct KeyConfigFile {
    keys: Vec<SignerKeyConfig>,
}

struct LoadedKey {
    signer: FactorySigner,
    key_type: u8,
    keypair_type: KeypairType,
}

/// Signs firmware buffers with every configured key in turn.
pub struct FirmwareSigner {
    keys: Vec<LoadedKey>,
    hash: HashAlgorithm,
}

impl FirmwareSigner {
    /// Load the signer list from a TOML config file.
    pub fn from_key_config(path: &Path) -> Result<Self, FirmwareError> {
        let config_str = std::fs::read_to_string(path)?;
        let config: KeyConfigFile = toml::from_str(&config_str)
            .map_err(|e| FirmwareError::BadKeyConfig(e.to_string()))?;
        if config.keys.is_empty() {
            return Err(FirmwareError::BadKeyConfig(
                "signer key list is empty".to_string(),
            ));
        }
        Self::from_entries(&config.keys)
    }

    pub fn from_entries(entries: &[SignerKeyConfig]) -> Result<Self, FirmwareError> {
        let mut keys = Vec::with_capacity(entries.len());
        for entry in entries {
            let pem = std::fs::read(&entry.path)?;
            let key = openssl::ec::EcKey::private_key_from_pem(&pem)
                .map_err(|e| FirmwareError::BadKeyConfig(e.to_string()))?;
            let keypair_type = key
                .group()
                .curve_name()
                .and_then(keypair_type_from_nid)
                .ok_or_else(|| {
                    FirmwareError::BadKeyConfig(format!(
                        "unsupported curve in {}",
                        entry.path.display()
                    ))
                })?;
            keys.push(LoadedKey {
                signer: FactorySigner::new(key, keypair_type)?,
                key_type: entry.key_type,
                keypair_type,
            });
        }
        Ok(Self {
            keys,
            hash: HashAlgorithm::Sha256,
        })
    }

    pub fn signer_count(&self) -> usize {
        self.keys.len()
    }

    /// Total footer size for the configured signer list: the footer
    /// meta plus, per signer, the signature record overhead and the
    /// fixed-width signature and public key.
    pub fn footer_size(&self) -> Result<usize, FirmwareError> {
        let mut size = provkit_types::FIRMWARE_FOOTER_META_BYTE_SIZE;
        for key in &self.keys {
            size += SIGNATURE_META_BYTE_SIZE;
            size += key.keypair_type.signature_len()?;
            size += key.keypair_type.pubkey_len()?;
        }
        Ok(size)
    }

    /// Sign `data` with every configured key, producing the footer
    /// signature records in config order.
    pub fn sign_buffer(&self, data: &[u8]) -> Result<Vec<Signature>, FirmwareError> {
        let mut signatures = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            log::info!("signing with key type {}", key.key_type);
            let wire_signature = key.signer.sign(data)?;
            let raw_signature = raw_sign_from_wire(&wire_signature, key.keypair_type)?;
            let wire_pubkey = key.signer.public_key_full()?;
            let raw_pubkey = raw_pubkey_from_wire(&wire_pubkey, key.keypair_type)?;
            signatures.push(Signature {
                signer_type: key.key_type,
                ec_type: key.keypair_type as u8,
                hash_type: self.hash as u8,
                raw_signature,
                raw_pubkey,
            });
        }
        Ok(signatures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BuildParams, FirmwareError};
    use provkit_crypto::{generate_keypair, verify_wire, wire_pubkey_from_raw, wire_sign_from_raw};
    use provkit_types::{FileVersion, FirmwareFooter, FirmwareHeader, FIRMWARE_HEADER_BYTE_SIZE};

    fn write_test_key(dir: &Path, name: &str) -> PathBuf {
        let key = generate_keypair(KeypairType::Secp256r1).unwrap();
        let pem = key.private_key_to_pem().unwrap();
        let path = dir.join(name);
        std::fs::write(&path, pem).unwrap();
        path
    }

    fn test_signer(dir: &Path, count: usize) -> FirmwareSigner {
        let entries: Vec<SignerKeyConfig> = (0..count)
            .map(|i| SignerKeyConfig {
                path: write_test_key(dir, &format!("key{i}.pem")),
                key_type: 3,
            })
            .collect();
        FirmwareSigner::from_entries(&entries).unwrap()
    }

    fn test_params(firmware_path: PathBuf, prog_size: usize) -> BuildParams {
        BuildParams {
            firmware_path,
            prog_size,
            version: FileVersion::parse("0.1.2.3", 1000).unwrap(),
            manufacture_id: *b"EXAMPLE-MFR\0\0\0\0\0",
            device_type: *b"LAMP",
            chunk_size: 1024,
        }
    }

    #[test]
    fn test_footer_size_per_signer() {
        let dir = tempfile::tempdir().unwrap();
        let signer = test_signer(dir.path(), 2);
        // 43 meta bytes plus (3 + 64 + 65) per secp256r1 signer.
        assert_eq!(signer.footer_size().unwrap(), 43 + 2 * 132);
    }

    #[test]
    fn test_build_prog_and_update_images() {
        let dir = tempfile::tempdir().unwrap();
        let signer = test_signer(dir.path(), 1);
        let code = vec![0xC0; 512];
        let params = test_params(dir.path().join("fw.bin"), 1024);

        let signed = signer.build(&code, &params).unwrap();
        assert_eq!(signed.prog.len(), 1024);
        assert_eq!(&signed.prog[..512], &code[..]);

        // Filler region is all 0xFF.
        let footer_size = signer.footer_size().unwrap();
        let filler = 1024 - 512 - footer_size;
        assert!(signed.prog[512..512 + filler].iter().all(|&b| b == 0xFF));

        // Update image: header + code + same footer as the Prog image.
        let (header, _) = FirmwareHeader::decode(&signed.update).unwrap();
        assert_eq!(header.code_offset as usize, FIRMWARE_HEADER_BYTE_SIZE);
        assert_eq!(header.code_length as usize, code.len());
        assert_eq!(
            header.footer_offset as usize,
            FIRMWARE_HEADER_BYTE_SIZE + code.len()
        );
        assert_eq!(header.footer_length as usize, footer_size);
        assert_eq!(header.descriptor.firmware_length, 512);
        assert_eq!(header.descriptor.app_size, 1024);

        let (update_footer, _) =
            FirmwareFooter::decode(&signed.update[header.footer_offset as usize..]).unwrap();
        assert_eq!(update_footer, signed.footer);

        // The footer signature verifies over the signed span of the
        // Prog image.
        let signed_span = &signed.prog[..1024 - footer_size + 43];
        let record = &signed.footer.signatures[0];
        let wire_sig =
            wire_sign_from_raw(&record.raw_signature, KeypairType::Secp256r1, HashAlgorithm::Sha256)
                .unwrap();
        let wire_pub = wire_pubkey_from_raw(&record.raw_pubkey, KeypairType::Secp256r1).unwrap();
        verify_wire(signed_span, &wire_sig, &wire_pub, HashAlgorithm::Sha256).unwrap();
    }

    #[test]
    fn test_build_rejects_undersized_prog() {
        let dir = tempfile::tempdir().unwrap();
        let signer = test_signer(dir.path(), 1);
        let code = vec![0xC0; 512];
        let params = test_params(dir.path().join("fw.bin"), 600);
        let err = signer.build(&code, &params).unwrap_err();
        assert!(matches!(err, FirmwareError::ConfigTooSmall { .. }));
    }

    #[test]
    fn test_create_signed_firmware_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let signer = test_signer(dir.path(), 1);
        let firmware_path = dir.path().join("fw.bin");
        std::fs::write(&firmware_path, vec![0xC0; 256]).unwrap();

        let params = test_params(firmware_path, 1024);
        let (prog_path, update_path) = signer.create_signed_firmware(&params).unwrap();

        assert_eq!(prog_path, dir.path().join("fw_Prog.bin"));
        assert_eq!(update_path, dir.path().join("fw_Update.bin"));
        assert_eq!(std::fs::read(&prog_path).unwrap().len(), 1024);
        assert!(update_path.exists());
    }

    #[test]
    fn test_key_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = write_test_key(dir.path(), "fw1.pem");
        let config = format!(
            "[[keys]]\npath = {:?}\nkey_type = 3\n",
            key_path.to_string_lossy()
        );
        let config_path = dir.path().join("keys.toml");
        std::fs::write(&config_path, config).unwrap();

        let signer = FirmwareSigner::from_key_config(&config_path).unwrap();
        assert_eq!(signer.signer_count(), 1);
    }
}
