/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    Transport collaborator interface for the provisioning service:
    broadcast discovery and blocking element exchange with a device,
    keyed by MAC address. The actual bus (UDP broadcast, PLC) is an
    external backend; this crate also ships an in-process simulated
    device population for tests and bench runs.

--*/

pub mod sim;

use std::time::Duration;

use provkit_types::MacAddr;

const fn fourcc(id: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*id)
}

/// Provisioning element identifiers. The discriminants are the FourCC
/// codes the device firmware dispatches on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Element {
    /// Discover not-initialized devices.
    Discover = fourcc(b"DNID"),
    /// Generate and save a device keypair, returning the public key.
    SaveProvision = fourcc(b"ASAV"),
    /// Sign a payload with the device key.
    SignData = fourcc(b"ASGN"),
    /// Full device identity record.
    DeviceInfo = fourcc(b"DEVI"),
    /// Factory signature over the device public key.
    DeviceSignature = fourcc(b"SGNP"),
    RecoveryKey1 = fourcc(b"PBR1"),
    RecoveryKey2 = fourcc(b"PBR2"),
    AuthKey1 = fourcc(b"PBA1"),
    AuthKey2 = fourcc(b"PBA2"),
    TrustListKey1 = fourcc(b"PBT1"),
    TrustListKey2 = fourcc(b"PBT2"),
    FirmwareKey1 = fourcc(b"PBF1"),
    FirmwareKey2 = fourcc(b"PBF2"),
    TrustListHeader = fourcc(b"_TLH"),
    TrustListChunk = fourcc(b"_TLC"),
    TrustListFooter = fourcc(b"_TLF"),
}

impl Element {
    /// Human-readable name used in progress logs. Devices may display
    /// upload progress by element, so log lines keep the upload order
    /// visible.
    pub fn name(self) -> &'static str {
        match self {
            Element::Discover => "Discovery",
            Element::SaveProvision => "Save provision",
            Element::SignData => "Sign request",
            Element::DeviceInfo => "Device info",
            Element::DeviceSignature => "Device signature",
            Element::RecoveryKey1 => "Recovery key 1",
            Element::RecoveryKey2 => "Recovery key 2",
            Element::AuthKey1 => "Auth key 1",
            Element::AuthKey2 => "Auth key 2",
            Element::TrustListKey1 => "TrustList key 1",
            Element::TrustListKey2 => "TrustList key 2",
            Element::FirmwareKey1 => "Firmware key 1",
            Element::FirmwareKey2 => "Firmware key 2",
            Element::TrustListHeader => "TrustList header",
            Element::TrustListChunk => "TrustList chunk",
            Element::TrustListFooter => "TrustList footer",
        }
    }
}

/// A device found by broadcast discovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceHandle {
    pub mac: MacAddr,
    pub device_type: u8,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No response within the caller-supplied timeout. Never retried.
    #[error("device did not respond within the timeout")]
    Timeout,

    /// The device answered with a non-zero status.
    #[error("device rejected {element}: status {status}")]
    Rejected { element: &'static str, status: i32 },

    /// The addressed device is not reachable on this transport.
    #[error("unknown device {0}")]
    UnknownDevice(MacAddr),

    #[error("transport backend failure: {0}")]
    Backend(String),
}

/// Blocking request/response transport to the provisioning service.
///
/// Implementations serialize access to the underlying bus; callers drive
/// one request at a time per device and supply the timeout for every
/// exchange.
pub trait Transport {
    /// Broadcast discovery of not-initialized devices.
    fn discover_devices(&mut self, timeout: Duration)
        -> Result<Vec<DeviceHandle>, TransportError>;

    /// Send one element to a device and wait for its response bytes.
    fn send_element(
        &mut self,
        mac: MacAddr,
        element: Element,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;
}
