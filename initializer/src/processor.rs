/*++

Licensed under the Apache-2.0 license.

File Name:

   processor.rs

Abstract:

    Per-device provisioning state machine. Runs the five-step sequence
    (init, set keys, sign, set trust list, get info) over the transport
    collaborator, accumulating the device's identity as it goes.

--*/

use std::time::Duration;

use provkit_crypto::{
    raw_pubkey_from_wire, raw_sign_from_wire, wire_pubkey_from_raw, wire_sign_from_raw,
    CryptoError, Signer,
};
use provkit_transport::{DeviceHandle, Element, Transport};
use provkit_types::{
    DeviceInfo, MacAddr, PublicKey, SignRequest, Signature, TrustList,
    DEVICE_MANUFACTURER_BYTE_SIZE, DEVICE_UDID_BYTE_SIZE,
};

use crate::{KeyType, ProvisionError, ProvisioningInfo};

/// Per-device accumulator. Created right after discovery, mutated in
/// place through the provisioning steps, never shared across devices.
pub struct DeviceProcessor<'a, T: Transport, S: Signer> {
    transport: &'a mut T,
    signer: &'a S,
    info: &'a ProvisioningInfo,
    timeout: Duration,

    pub handle: DeviceHandle,
    pub device_public_key: Option<PublicKey>,
    pub signature: Option<Signature>,
    pub manufacturer: [u8; DEVICE_MANUFACTURER_BYTE_SIZE],
    pub model: u32,
    pub mac: MacAddr,
    pub udid: [u8; DEVICE_UDID_BYTE_SIZE],
}

impl<'a, T: Transport, S: Signer> DeviceProcessor<'a, T, S> {
    pub fn new(
        transport: &'a mut T,
        signer: &'a S,
        info: &'a ProvisioningInfo,
        handle: DeviceHandle,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            signer,
            info,
            timeout,
            handle,
            device_public_key: None,
            signature: None,
            manufacturer: [0; DEVICE_MANUFACTURER_BYTE_SIZE],
            model: 0,
            mac: handle.mac,
            udid: [0; DEVICE_UDID_BYTE_SIZE],
        }
    }

    /// Run the provisioning sequence for this device. The mode flags
    /// select a subset; otherwise all five steps run in order and any
    /// failure aborts this device only.
    pub fn process(&mut self) -> Result<(), ProvisionError> {
        if self.info.trust_list_only {
            self.set_trust_list()?;
        } else {
            if !self.info.card_only {
                self.init_device()?;
                self.set_keys()?;
                self.sign_device()?;
                self.set_trust_list()?;
            }
            self.get_provision_info()?;
        }
        log::info!("OK: device {} initialization done", self.mac);
        Ok(())
    }

    fn send(&mut self, element: Element, payload: &[u8]) -> Result<Vec<u8>, ProvisionError> {
        Ok(self
            .transport
            .send_element(self.handle.mac, element, payload, self.timeout)?)
    }

    fn upload(&mut self, element: Element, payload: &[u8]) -> Result<(), ProvisionError> {
        log::info!("upload {}", element.name());
        match self.send(element, payload) {
            Ok(_) => {
                log::debug!("success: upload {}", element.name());
                Ok(())
            }
            Err(err) => {
                log::warn!("failed: upload {}", element.name());
                Err(err)
            }
        }
    }

    /// Step 1: request a freshly generated device keypair and store the
    /// returned public key.
    pub fn init_device(&mut self) -> Result<(), ProvisionError> {
        let response = self.send(Element::SaveProvision, &[])?;
        let (pubkey, _) = PublicKey::decode(&response)?;
        log::debug!(
            "device key type {}, EC type {}",
            pubkey.key_type,
            pubkey.ec_type
        );
        self.device_public_key = Some(pubkey);
        Ok(())
    }

    /// Step 2: upload the eight role keys in the fixed order the device
    /// reports progress by.
    pub fn set_keys(&mut self) -> Result<(), ProvisionError> {
        let info = self.info;
        let uploads: [(Element, &[u8]); 8] = [
            (Element::RecoveryKey1, &info.rec_pub_key_1),
            (Element::RecoveryKey2, &info.rec_pub_key_2),
            (Element::AuthKey1, &info.auth_pub_key_1),
            (Element::AuthKey2, &info.auth_pub_key_2),
            (Element::FirmwareKey1, &info.fw_pub_key_1),
            (Element::FirmwareKey2, &info.fw_pub_key_2),
            (Element::TrustListKey1, &info.tl_pub_key_1),
            (Element::TrustListKey2, &info.tl_pub_key_2),
        ];
        for (element, payload) in uploads {
            self.upload(element, payload)?;
        }
        Ok(())
    }

    /// Step 3: sign the device public key with the factory key, verify
    /// the signature before trusting it, and upload the packed record.
    pub fn sign_device(&mut self) -> Result<(), ProvisionError> {
        log::info!("sign device by factory key");
        let factory_ec = self.info.factory_ec_type()?;

        let device_key = self
            .device_public_key
            .as_ref()
            .ok_or(ProvisionError::MissingState("device public key"))?;
        let data_to_sign = device_key.encode()?;

        let wire_signature = self.signer.sign(&data_to_sign)?;
        if wire_signature.is_empty() {
            return Err(CryptoError::SignatureEmpty.into());
        }

        let raw_signature = raw_sign_from_wire(&wire_signature, factory_ec)?;
        let wire_pubkey = self.signer.public_key_full()?;
        let raw_pubkey = raw_pubkey_from_wire(&wire_pubkey, factory_ec)?;

        let record = Signature {
            signer_type: KeyType::Factory as u8,
            ec_type: factory_ec as u8,
            hash_type: self.info.hash_algorithm as u8,
            raw_signature,
            raw_pubkey,
        };

        // Never upload an unverified signature.
        self.signer
            .verify(
                &data_to_sign,
                &wire_signature,
                &wire_pubkey,
                self.info.hash_algorithm,
            )
            .map_err(|_| CryptoError::SelfVerificationFailed)?;

        self.upload(Element::DeviceSignature, &record.encode()?)?;
        Ok(())
    }

    /// Step 4: decode the trust list (failing fast on any structural
    /// mismatch), then upload header, chunks and footer separately.
    pub fn set_trust_list(&mut self) -> Result<(), ProvisionError> {
        let trust_list = TrustList::decode(&self.info.trust_list)?;

        self.upload(Element::TrustListHeader, &trust_list.header.encode())?;

        for (index, chunk) in trust_list.chunks.iter().enumerate() {
            log::info!("upload TrustList chunk {index}");
            let payload = chunk.encode()?;
            self.transport.send_element(
                self.handle.mac,
                Element::TrustListChunk,
                &payload,
                self.timeout,
            )?;
        }

        self.upload(Element::TrustListFooter, &trust_list.footer.encode()?)?;
        log::info!("OK: trust list set");
        Ok(())
    }

    /// Step 5: fetch and decode the device's full identity record.
    pub fn get_provision_info(&mut self) -> Result<(), ProvisionError> {
        let response = self.send(Element::DeviceInfo, &[])?;
        let info = DeviceInfo::decode(&response)?;

        self.manufacturer = info.manufacturer;
        self.model = info.model;
        self.mac = info.mac;
        self.udid = info.udid;
        self.device_public_key = Some(info.pubkey);
        self.signature = Some(info.signature);
        Ok(())
    }

    /// Sign an arbitrary payload inside the device and verify the result
    /// against the device's own public key before accepting it. Returns
    /// the wire-format signature.
    pub fn sign_data_in_device(&mut self, data: &[u8]) -> Result<Vec<u8>, ProvisionError> {
        let request = SignRequest {
            hash_type: self.info.hash_algorithm as u8,
            payload: data.to_vec(),
        };
        let response = self.send(Element::SignData, &request.encode())?;

        let (record, _) = Signature::decode(&response)?;
        let keypair_type = record.keypair_type()?;

        let wire_signature =
            wire_sign_from_raw(&record.raw_signature, keypair_type, self.info.hash_algorithm)?;
        let wire_pubkey = wire_pubkey_from_raw(&record.raw_pubkey, keypair_type)?;

        self.signer
            .verify(data, &wire_signature, &wire_pubkey, self.info.hash_algorithm)?;

        Ok(wire_signature)
    }
}
