/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    Factory initializer: drives every discovered device through the
    provisioning sequence, persists the resulting identity records and
    card requests, and isolates per-device failures from the batch.

--*/

mod card;
mod persist;
mod processor;

pub use card::RequestBuilder;
pub use persist::PersistenceManager;
pub use processor::DeviceProcessor;

use std::path::Path;
use std::time::Duration;

use provkit_crypto::{CryptoError, Signer};
use provkit_transport::{Transport, TransportError};
use provkit_types::{CodecError, HashAlgorithm, KeypairType, MacAddr};

/// Default per-request timeout, matching the device firmware's worst
/// case over the broadcast bus.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(7000);

/// Key role identifiers carried in `key_type`/`signer_type` wire fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyType {
    Recovery = 0,
    Auth = 1,
    TrustList = 2,
    Firmware = 3,
    Factory = 4,
    IotDevice = 5,
    UserDevice = 6,
    FirmwareInternal = 7,
    AuthInternal = 8,
    Cloud = 9,
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("device state missing: {0}")]
    MissingState(&'static str),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Immutable bundle of key material and mode flags for one provisioning
/// run. Built once before any device is contacted.
#[derive(Clone, Default)]
pub struct ProvisioningInfo {
    pub trust_list_only: bool,
    pub card_only: bool,

    pub rec_pub_key_1: Vec<u8>,
    pub rec_pub_key_2: Vec<u8>,
    pub auth_pub_key_1: Vec<u8>,
    pub auth_pub_key_2: Vec<u8>,
    pub fw_pub_key_1: Vec<u8>,
    pub fw_pub_key_2: Vec<u8>,
    pub tl_pub_key_1: Vec<u8>,
    pub tl_pub_key_2: Vec<u8>,

    pub trust_list: Vec<u8>,

    pub factory_ec_type: Option<KeypairType>,
    pub hash_algorithm: HashAlgorithm,
}

impl ProvisioningInfo {
    pub fn factory_ec_type(&self) -> Result<KeypairType, ProvisionError> {
        self.factory_ec_type
            .ok_or(ProvisionError::MissingState("factory key EC type"))
    }
}

/// One failed device in a batch.
#[derive(Debug)]
pub struct DeviceFailure {
    pub mac: MacAddr,
    pub error: ProvisionError,
}

/// Outcome of a provisioning run.
#[derive(Debug, Default)]
pub struct ProvisionSummary {
    pub provisioned: usize,
    pub failures: Vec<DeviceFailure>,
}

impl ProvisionSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// One line per failed device, for final reporting.
    pub fn failure_report(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("device {}: {}", f.mac, f.error))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Drives provisioning of every discovered device, sequentially in
/// discovery order. Devices are independent; one device's failure does
/// not abort the batch.
pub struct Initializer<T: Transport, S: Signer> {
    transport: T,
    signer: S,
    info: ProvisioningInfo,
    device_info_out: PersistenceManager,
    requests_out: PersistenceManager,
    timeout: Duration,
}

impl<T: Transport, S: Signer> Initializer<T, S> {
    pub fn new(
        transport: T,
        signer: S,
        info: ProvisioningInfo,
        device_info_path: &Path,
        requests_path: &Path,
    ) -> Self {
        Self {
            transport,
            signer,
            info,
            device_info_out: PersistenceManager::new(device_info_path),
            requests_out: PersistenceManager::new(requests_path),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provision_all(&mut self) -> Result<ProvisionSummary, ProvisionError> {
        let handles = self.transport.discover_devices(self.timeout)?;
        log::info!("got {} device(s)", handles.len());

        let mut summary = ProvisionSummary::default();
        for handle in handles {
            log::info!("device type {}, MAC {}", handle.device_type, handle.mac);
            match self.provision_one(handle) {
                Ok(()) => summary.provisioned += 1,
                Err(error) => {
                    log::error!("device {} failed: {error}", handle.mac);
                    summary.failures.push(DeviceFailure {
                        mac: handle.mac,
                        error,
                    });
                }
            }
        }
        Ok(summary)
    }

    fn provision_one(
        &mut self,
        handle: provkit_transport::DeviceHandle,
    ) -> Result<(), ProvisionError> {
        let mut processor = DeviceProcessor::new(
            &mut self.transport,
            &self.signer,
            &self.info,
            handle,
            self.timeout,
        );
        processor.process()?;

        if !self.info.trust_list_only {
            let mut builder = RequestBuilder::new(&mut processor);

            let device_info = builder.device_info()?;
            log::info!("device info: {device_info}");
            self.device_info_out.persist(&device_info)?;

            let card_request = builder.build_request()?;
            log::info!("card request: {card_request}");
            self.requests_out.persist(&card_request)?;
        }
        Ok(())
    }
}
