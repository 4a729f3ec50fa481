// Licensed under the Apache-2.0 license.

//! End-to-end provisioning runs against the simulated device population.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use provkit_crypto::{generate_keypair, verify_wire, wire_pubkey_from_raw, FactorySigner};
use provkit_initializer::{Initializer, ProvisioningInfo};
use provkit_transport::sim::SimTransport;
use provkit_transport::Element;
use provkit_types::{
    DatedPublicKey, FileVersion, HashAlgorithm, KeypairType, PublicKey, Signature, TrustList,
    TrustListFooter, TrustListHeader,
};

fn test_trust_list() -> Vec<u8> {
    let trust_list = TrustList {
        header: TrustListHeader {
            whole_size: 0,
            version: FileVersion {
                major: 1,
                minor: 0,
                patch: 0,
                build: 1,
                timestamp: 1,
            },
            pubkeys_count: 1,
            signatures_count: 1,
        },
        chunks: vec![DatedPublicKey {
            start_date: 0,
            expire_date: u32::MAX,
            pubkey: PublicKey {
                key_type: 2,
                ec_type: KeypairType::Ed25519 as u8,
                metadata: Vec::new(),
                raw_key: vec![0x21; 32],
            },
        }],
        footer: TrustListFooter {
            tl_type: 1,
            signatures: vec![Signature {
                signer_type: 2,
                ec_type: KeypairType::Ed25519 as u8,
                hash_type: 0,
                raw_signature: vec![0x42; 64],
                raw_pubkey: vec![0x63; 32],
            }],
        },
    };
    trust_list.encode().unwrap()
}

fn test_info() -> ProvisioningInfo {
    ProvisioningInfo {
        trust_list_only: false,
        card_only: false,
        rec_pub_key_1: vec![1; 32],
        rec_pub_key_2: vec![2; 32],
        auth_pub_key_1: vec![3; 32],
        auth_pub_key_2: vec![4; 32],
        fw_pub_key_1: vec![5; 32],
        fw_pub_key_2: vec![6; 32],
        tl_pub_key_1: vec![7; 32],
        tl_pub_key_2: vec![8; 32],
        trust_list: test_trust_list(),
        factory_ec_type: Some(KeypairType::Secp256r1),
        hash_algorithm: HashAlgorithm::Sha256,
    }
}

fn factory_signer() -> FactorySigner {
    FactorySigner::new(
        generate_keypair(KeypairType::Secp256r1).unwrap(),
        KeypairType::Secp256r1,
    )
    .unwrap()
}

#[test]
fn test_full_provisioning_run() {
    let dir = tempfile::tempdir().unwrap();
    let device_info_path = dir.path().join("device_info.txt");
    let requests_path = dir.path().join("requests.txt");

    let mut initializer = Initializer::new(
        SimTransport::new(1),
        factory_signer(),
        test_info(),
        &device_info_path,
        &requests_path,
    );
    let summary = initializer.provision_all().unwrap();

    assert_eq!(summary.provisioned, 1);
    assert!(summary.all_succeeded(), "{}", summary.failure_report());

    // One JSON line with the simulated device's identity.
    let device_info = std::fs::read_to_string(&device_info_path).unwrap();
    let lines: Vec<&str> = device_info.lines().collect();
    assert_eq!(lines.len(), 1);
    let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(record["mac"], "02:00:00:00:00:00");
    assert_eq!(
        record["manufacturer"],
        BASE64.encode(b"SIMULATED-DEVICE")
    );
    assert_eq!(
        record["ec_type"].as_u64().unwrap(),
        KeypairType::Secp256r1 as u64
    );

    // One base64 line holding the signed card request.
    let requests = std::fs::read_to_string(&requests_path).unwrap();
    let lines: Vec<&str> = requests.lines().collect();
    assert_eq!(lines.len(), 1);
    let model: serde_json::Value =
        serde_json::from_slice(&BASE64.decode(lines[0]).unwrap()).unwrap();
    let signatures = model["signatures"].as_array().unwrap();
    assert_eq!(signatures.len(), 1);
    assert_eq!(signatures[0]["signer"], "self");

    // The card signature must verify against the device key over the
    // combined snapshot.
    let content_snapshot = BASE64
        .decode(model["content_snapshot"].as_str().unwrap())
        .unwrap();
    let extra_snapshot = BASE64
        .decode(signatures[0]["snapshot"].as_str().unwrap())
        .unwrap();
    let wire_signature = BASE64
        .decode(signatures[0]["signature"].as_str().unwrap())
        .unwrap();
    let mut combined = content_snapshot.clone();
    combined.extend_from_slice(&extra_snapshot);

    let device_raw_key = BASE64
        .decode(record["public_key"].as_str().unwrap())
        .unwrap();
    let wire_pubkey = wire_pubkey_from_raw(&device_raw_key, KeypairType::Secp256r1).unwrap();
    verify_wire(
        &combined,
        &wire_signature,
        &wire_pubkey,
        HashAlgorithm::Sha256,
    )
    .unwrap();
}

#[test]
fn test_trust_list_only_run() {
    let dir = tempfile::tempdir().unwrap();
    let device_info_path = dir.path().join("device_info.txt");
    let requests_path = dir.path().join("requests.txt");

    let mut info = test_info();
    info.trust_list_only = true;

    let mut initializer = Initializer::new(
        SimTransport::new(1),
        factory_signer(),
        info,
        &device_info_path,
        &requests_path,
    );
    let summary = initializer.provision_all().unwrap();
    assert_eq!(summary.provisioned, 1);

    // Only the trust list steps ran: no identity artifacts.
    assert!(!device_info_path.exists());
    assert!(!requests_path.exists());
}

#[test]
fn test_device_failure_does_not_abort_batch() {
    let dir = tempfile::tempdir().unwrap();
    let device_info_path = dir.path().join("device_info.txt");
    let requests_path = dir.path().join("requests.txt");

    let mut transport = SimTransport::new(2);
    transport.device_mut(0).reject_element(Element::AuthKey1);
    let failing_mac = transport.devices()[0].handle().mac;

    let mut initializer = Initializer::new(
        transport,
        factory_signer(),
        test_info(),
        &device_info_path,
        &requests_path,
    );
    let summary = initializer.provision_all().unwrap();

    assert_eq!(summary.provisioned, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].mac, failing_mac);
    assert!(summary.failure_report().contains("Auth key 1"));

    // The surviving device still produced its artifacts.
    let device_info = std::fs::read_to_string(&device_info_path).unwrap();
    assert_eq!(device_info.lines().count(), 1);
}
