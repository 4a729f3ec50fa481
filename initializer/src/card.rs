/*++

Licensed under the Apache-2.0 license.

File Name:

   card.rs

Abstract:

    Builds the device-info record and the identity card request from a
    provisioned device. The card content is signed inside the device
    itself; the signature is verified before the request is accepted.

--*/

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_derive::Serialize;

use provkit_crypto::{wire_pubkey_from_raw, Signer};
use provkit_transport::Transport;

use crate::{DeviceProcessor, ProvisionError};

const CARD_VERSION: &str = "5.0";

/// Device identity record persisted as one JSON line per device.
#[derive(Clone, Debug, Serialize)]
pub struct DeviceRecord {
    pub manufacturer: String,
    pub model: u32,
    pub roles: Vec<String>,
    pub mac: String,
    pub serial: String,
    pub public_key: String,
    pub signature: String,
    pub key_type: u8,
    pub ec_type: u8,
}

#[derive(Serialize)]
struct CardSnapshot<'a> {
    device: &'a str,
    #[serde(flatten)]
    record: &'a DeviceRecord,
}

#[derive(Serialize)]
struct RawCardContent {
    identity: String,
    public_key: String,
    created_at: i64,
    version: &'static str,
}

#[derive(Serialize)]
struct RawCardSignature {
    signer: &'static str,
    signature: String,
    snapshot: String,
}

#[derive(Serialize)]
struct RawSignedModel {
    content_snapshot: String,
    signatures: Vec<RawCardSignature>,
}

/// Builds the persisted artifacts for one provisioned device.
pub struct RequestBuilder<'p, 'a, T: Transport, S: Signer> {
    processor: &'p mut DeviceProcessor<'a, T, S>,
    record: Option<DeviceRecord>,
}

impl<'p, 'a, T: Transport, S: Signer> RequestBuilder<'p, 'a, T, S> {
    pub fn new(processor: &'p mut DeviceProcessor<'a, T, S>) -> Self {
        Self {
            processor,
            record: None,
        }
    }

    fn record(&mut self) -> Result<&DeviceRecord, ProvisionError> {
        if self.record.is_none() {
            let p = &*self.processor;
            let pubkey = p
                .device_public_key
                .as_ref()
                .ok_or(ProvisionError::MissingState("device public key"))?;
            let signature = p
                .signature
                .as_ref()
                .ok_or(ProvisionError::MissingState("device signature"))?;
            self.record = Some(DeviceRecord {
                manufacturer: BASE64.encode(p.manufacturer),
                model: p.model,
                roles: vec!["iot_device".to_string()],
                mac: p.mac.to_string(),
                serial: BASE64.encode(p.udid),
                public_key: BASE64.encode(&pubkey.raw_key),
                signature: BASE64.encode(&signature.raw_signature),
                key_type: pubkey.key_type,
                ec_type: pubkey.ec_type,
            });
        }
        Ok(self.record.as_ref().unwrap())
    }

    /// The device-info JSON line.
    pub fn device_info(&mut self) -> Result<String, ProvisionError> {
        let record = self.record()?;
        Ok(serde_json::to_string(record)?)
    }

    /// Build the card request: content snapshot plus the device's own
    /// signature over the combined snapshot, exported as one base64
    /// line.
    pub fn build_request(&mut self) -> Result<String, ProvisionError> {
        self.record()?;

        let p = &*self.processor;
        let pubkey = p
            .device_public_key
            .as_ref()
            .ok_or(ProvisionError::MissingState("device public key"))?;
        let wire_pubkey = wire_pubkey_from_raw(&pubkey.raw_key, pubkey.keypair_type()?)?;

        let content = RawCardContent {
            identity: hex::encode(p.udid),
            public_key: BASE64.encode(wire_pubkey),
            created_at: chrono::Utc::now().timestamp(),
            version: CARD_VERSION,
        };
        let content_snapshot = serde_json::to_vec(&content)?;

        let record = self.record.as_ref().unwrap();
        let extra_snapshot = serde_json::to_vec(&CardSnapshot {
            device: "",
            record,
        })?;

        // The device signs the combined snapshot; the signature is
        // verified against the device key before it is accepted.
        let mut combined = content_snapshot.clone();
        combined.extend_from_slice(&extra_snapshot);
        let wire_signature = self.processor.sign_data_in_device(&combined)?;

        let model = RawSignedModel {
            content_snapshot: BASE64.encode(&content_snapshot),
            signatures: vec![RawCardSignature {
                signer: "self",
                signature: BASE64.encode(&wire_signature),
                snapshot: BASE64.encode(&extra_snapshot),
            }],
        };
        Ok(BASE64.encode(serde_json::to_vec(&model)?))
    }
}
