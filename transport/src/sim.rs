/*++

Licensed under the Apache-2.0 license.

File Name:

   sim.rs

Abstract:

    In-process simulated device population. Each simulated device
    implements the provisioning service surface: it generates a keypair
    on request, stores uploaded elements, signs payloads with its device
    key and reports a well-formed identity record.

--*/

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use openssl::ecdsa::EcdsaSig;
use openssl::pkey::Private;

use provkit_crypto::{generate_keypair, raw_pubkey_bytes};
use provkit_types::{
    DeviceInfo, HashAlgorithm, KeypairType, MacAddr, PublicKey, SignRequest, Signature,
    DEVICE_MANUFACTURER_BYTE_SIZE, DEVICE_UDID_BYTE_SIZE,
};

use crate::{DeviceHandle, Element, Transport, TransportError};

const SIM_DEVICE_TYPE: u8 = 0x50;
const SIM_MANUFACTURER: &[u8; DEVICE_MANUFACTURER_BYTE_SIZE] = b"SIMULATED-DEVICE";

/// Key type identifier devices stamp on their own keys.
const KEY_TYPE_IOT_DEVICE: u8 = 5;

/// One simulated device. Keys are secp256r1, like the shipping firmware.
pub struct SimDevice {
    handle: DeviceHandle,
    manufacturer: [u8; DEVICE_MANUFACTURER_BYTE_SIZE],
    model: u32,
    udid: [u8; DEVICE_UDID_BYTE_SIZE],
    key: Option<openssl::ec::EcKey<Private>>,
    elements: HashMap<Element, Vec<u8>>,
    reject: HashSet<Element>,
}

impl SimDevice {
    pub fn new(index: u8) -> Self {
        let mac = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, index]);
        let mut udid = [0u8; DEVICE_UDID_BYTE_SIZE];
        udid[0] = index;
        udid[1..7].copy_from_slice(&mac.0);
        Self {
            handle: DeviceHandle {
                mac,
                device_type: SIM_DEVICE_TYPE,
            },
            manufacturer: *SIM_MANUFACTURER,
            model: u32::from_le_bytes(*b"SIM1"),
            udid,
            key: None,
            elements: HashMap::new(),
            reject: HashSet::new(),
        }
    }

    pub fn handle(&self) -> DeviceHandle {
        self.handle
    }

    pub fn manufacturer(&self) -> &[u8; DEVICE_MANUFACTURER_BYTE_SIZE] {
        &self.manufacturer
    }

    /// Make the device answer the given element with a non-zero status.
    pub fn reject_element(&mut self, element: Element) {
        self.reject.insert(element);
    }

    /// Uploaded element payload, if any.
    pub fn stored(&self, element: Element) -> Option<&[u8]> {
        self.elements.get(&element).map(Vec::as_slice)
    }

    fn device_pubkey(&self) -> Result<PublicKey, TransportError> {
        let key = self.key.as_ref().ok_or(TransportError::Rejected {
            element: Element::DeviceInfo.name(),
            status: -2,
        })?;
        Ok(PublicKey {
            key_type: KEY_TYPE_IOT_DEVICE,
            ec_type: KeypairType::Secp256r1 as u8,
            metadata: Vec::new(),
            raw_key: raw_pubkey_bytes(key).map_err(backend)?,
        })
    }

    fn handle_element(
        &mut self,
        element: Element,
        payload: &[u8],
    ) -> Result<Vec<u8>, TransportError> {
        if self.reject.contains(&element) {
            return Err(TransportError::Rejected {
                element: element.name(),
                status: -1,
            });
        }
        match element {
            Element::SaveProvision => {
                let key = generate_keypair(KeypairType::Secp256r1).map_err(backend)?;
                self.key = Some(key);
                self.device_pubkey()?.encode().map_err(backend)
            }
            Element::SignData => self.sign_data(payload),
            Element::DeviceInfo => {
                let signature_bytes =
                    self.stored(Element::DeviceSignature)
                        .ok_or(TransportError::Rejected {
                            element: element.name(),
                            status: -2,
                        })?;
                let (signature, _) = Signature::decode(signature_bytes).map_err(backend)?;
                let info = DeviceInfo {
                    manufacturer: self.manufacturer,
                    model: self.model,
                    mac: self.handle.mac,
                    udid: self.udid,
                    pubkey: self.device_pubkey()?,
                    signature,
                };
                info.encode().map_err(backend)
            }
            _ => {
                // Key and trust list uploads: store and acknowledge.
                self.elements.insert(element, payload.to_vec());
                Ok(Vec::new())
            }
        }
    }

    fn sign_data(&self, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        let key = self.key.as_ref().ok_or(TransportError::Rejected {
            element: Element::SignData.name(),
            status: -2,
        })?;
        let request = SignRequest::decode(payload).map_err(backend)?;
        let hash = HashAlgorithm::from_u8(request.hash_type).map_err(backend)?;
        let digest = match hash {
            HashAlgorithm::Sha256 => {
                openssl::hash::hash(openssl::hash::MessageDigest::sha256(), &request.payload)
            }
            HashAlgorithm::Sha384 => {
                openssl::hash::hash(openssl::hash::MessageDigest::sha384(), &request.payload)
            }
            HashAlgorithm::Sha512 => {
                openssl::hash::hash(openssl::hash::MessageDigest::sha512(), &request.payload)
            }
        }
        .map_err(backend)?;
        let sig = EcdsaSig::sign(&digest, key).map_err(backend)?;
        let coord = KeypairType::Secp256r1.coord_len().map_err(backend)?;
        let mut raw_signature = sig.r().to_vec_padded(coord as i32).map_err(backend)?;
        raw_signature.extend_from_slice(&sig.s().to_vec_padded(coord as i32).map_err(backend)?);

        let record = Signature {
            signer_type: KEY_TYPE_IOT_DEVICE,
            ec_type: KeypairType::Secp256r1 as u8,
            hash_type: request.hash_type,
            raw_signature,
            raw_pubkey: raw_pubkey_bytes(key).map_err(backend)?,
        };
        record.encode().map_err(backend)
    }
}

fn backend<E: std::fmt::Display>(err: E) -> TransportError {
    TransportError::Backend(err.to_string())
}

/// Transport backed by a set of in-process simulated devices.
pub struct SimTransport {
    devices: Vec<SimDevice>,
}

impl SimTransport {
    pub fn new(count: u8) -> Self {
        Self {
            devices: (0..count).map(SimDevice::new).collect(),
        }
    }

    pub fn device_mut(&mut self, index: usize) -> &mut SimDevice {
        &mut self.devices[index]
    }

    pub fn devices(&self) -> &[SimDevice] {
        &self.devices
    }
}

impl Transport for SimTransport {
    fn discover_devices(
        &mut self,
        _timeout: Duration,
    ) -> Result<Vec<DeviceHandle>, TransportError> {
        let handles: Vec<DeviceHandle> = self.devices.iter().map(|d| d.handle()).collect();
        log::debug!("discovery: {} simulated device(s)", handles.len());
        Ok(handles)
    }

    fn send_element(
        &mut self,
        mac: MacAddr,
        element: Element,
        payload: &[u8],
        _timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let device = self
            .devices
            .iter_mut()
            .find(|d| d.handle.mac == mac)
            .ok_or(TransportError::UnknownDevice(mac))?;
        device.handle_element(element, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[test]
    fn test_discovery() {
        let mut transport = SimTransport::new(3);
        let handles = transport.discover_devices(TIMEOUT).unwrap();
        assert_eq!(handles.len(), 3);
        assert_ne!(handles[0].mac, handles[1].mac);
    }

    #[test]
    fn test_save_provision_returns_public_key() {
        let mut transport = SimTransport::new(1);
        let mac = transport.devices()[0].handle().mac;
        let response = transport
            .send_element(mac, Element::SaveProvision, &[], TIMEOUT)
            .unwrap();
        let (pubkey, consumed) = PublicKey::decode(&response).unwrap();
        assert_eq!(consumed, response.len());
        assert_eq!(pubkey.ec_type, KeypairType::Secp256r1 as u8);
        assert_eq!(pubkey.raw_key.len(), 65);
        assert_eq!(pubkey.raw_key[0], 0x04);
    }

    #[test]
    fn test_upload_is_stored() {
        let mut transport = SimTransport::new(1);
        let mac = transport.devices()[0].handle().mac;
        transport
            .send_element(mac, Element::RecoveryKey1, b"key-bytes", TIMEOUT)
            .unwrap();
        assert_eq!(
            transport.devices()[0].stored(Element::RecoveryKey1),
            Some(&b"key-bytes"[..])
        );
    }

    #[test]
    fn test_rejected_element() {
        let mut transport = SimTransport::new(1);
        let mac = transport.devices()[0].handle().mac;
        transport.device_mut(0).reject_element(Element::AuthKey1);
        let err = transport
            .send_element(mac, Element::AuthKey1, b"x", TIMEOUT)
            .unwrap_err();
        assert!(matches!(err, TransportError::Rejected { .. }));
    }

    #[test]
    fn test_unknown_device() {
        let mut transport = SimTransport::new(1);
        let err = transport
            .send_element(MacAddr([9; 6]), Element::AuthKey1, b"x", TIMEOUT)
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownDevice(_)));
    }

    #[test]
    fn test_device_info_requires_provisioning() {
        let mut transport = SimTransport::new(1);
        let mac = transport.devices()[0].handle().mac;
        let err = transport
            .send_element(mac, Element::DeviceInfo, &[], TIMEOUT)
            .unwrap_err();
        assert!(matches!(err, TransportError::Rejected { .. }));
    }
}
