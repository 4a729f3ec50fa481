/*++

Licensed under the Apache-2.0 license.

File Name:

   provision.rs

Abstract:

    `provision` subcommand: load the key material, build the
    provisioning bundle and run the initializer over the discovered
    devices.

--*/

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::ArgMatches;

use provkit_crypto::FactorySigner;
use provkit_initializer::{Initializer, ProvisioningInfo};
use provkit_transport::sim::SimTransport;
use provkit_types::KeypairType;

fn read_file(args: &ArgMatches, flag: &str) -> anyhow::Result<Vec<u8>> {
    let path: &PathBuf = args
        .get_one::<PathBuf>(flag)
        .with_context(|| format!("missing --{flag}"))?;
    std::fs::read(path).with_context(|| format!("can't read file {}", path.display()))
}

pub(crate) fn run_cmd(args: &ArgMatches) -> anyhow::Result<()> {
    let requests_path: &PathBuf = args.get_one("output").unwrap();
    let device_info_path: &PathBuf = args.get_one("device-info-output").unwrap();

    let factory_ec_type = KeypairType::from_u8(*args.get_one::<u8>("factory-key-ec-type").unwrap())
        .context("bad --factory-key-ec-type")?;

    let info = ProvisioningInfo {
        trust_list_only: args.get_flag("trust-list-only"),
        card_only: args.get_flag("create-card-only"),
        rec_pub_key_1: read_file(args, "rec-pub-key-1")?,
        rec_pub_key_2: read_file(args, "rec-pub-key-2")?,
        auth_pub_key_1: read_file(args, "auth-pub-key-1")?,
        auth_pub_key_2: read_file(args, "auth-pub-key-2")?,
        fw_pub_key_1: read_file(args, "fw-pub-key-1")?,
        fw_pub_key_2: read_file(args, "fw-pub-key-2")?,
        tl_pub_key_1: read_file(args, "tl-pub-key-1")?,
        tl_pub_key_2: read_file(args, "tl-pub-key-2")?,
        trust_list: read_file(args, "trust-list")?,
        factory_ec_type: Some(factory_ec_type),
        hash_algorithm: Default::default(),
    };

    let factory_key_pem = read_file(args, "factory-key")?;
    let signer = FactorySigner::from_pem(&factory_key_pem, factory_ec_type)
        .context("failed to import the factory private key")?;

    // The broadcast bus backend is linked in by the integrator; this
    // build ships the in-process simulator only.
    let Some(sim_count) = args.get_one::<u8>("sim").copied() else {
        bail!("no device transport backend in this build; use --sim <N>");
    };
    let transport = SimTransport::new(sim_count);

    let mut initializer = Initializer::new(
        transport,
        signer,
        info,
        device_info_path,
        requests_path,
    );
    if let Some(timeout_ms) = args.get_one::<u64>("timeout-ms").copied() {
        initializer = initializer.with_timeout(Duration::from_millis(timeout_ms));
    }

    let summary = initializer.provision_all()?;
    log::info!(
        "provisioned {} device(s), {} failure(s)",
        summary.provisioned,
        summary.failures.len()
    );
    if !summary.all_succeeded() {
        bail!("provisioning failed for:\n{}", summary.failure_report());
    }
    Ok(())
}
