/*++

Licensed under the Apache-2.0 license.

File Name:

   sign_firmware.rs

Abstract:

    `sign-firmware` subcommand: load the signer key list and build the
    Prog and Update artifacts for a firmware binary.

--*/

use std::path::PathBuf;

use anyhow::Context;
use clap::ArgMatches;

use provkit_fw_signer::{BuildParams, FirmwareSigner};
use provkit_types::{
    FileVersion, DEVICE_TYPE_BYTE_SIZE, MANUFACTURE_ID_BYTE_SIZE, VERSION_EPOCH_OFFSET,
};

const DEFAULT_CHUNK_SIZE: u16 = 1024;

fn ascii_field<const N: usize>(value: &str, flag: &str) -> anyhow::Result<[u8; N]> {
    if value.len() > N {
        anyhow::bail!("--{flag} is longer than {N} bytes");
    }
    let mut out = [0u8; N];
    out[..value.len()].copy_from_slice(value.as_bytes());
    Ok(out)
}

pub(crate) fn run_cmd(args: &ArgMatches) -> anyhow::Result<()> {
    let firmware_path: &PathBuf = args.get_one("firmware").unwrap();
    let key_config: &PathBuf = args.get_one("key-config").unwrap();
    let prog_size = *args.get_one::<usize>("prog-size").unwrap();

    let timestamp = (chrono::Utc::now().timestamp() as u64)
        .saturating_sub(u64::from(VERSION_EPOCH_OFFSET)) as u32;
    let version = FileVersion::parse(args.get_one::<String>("fw-version").unwrap(), timestamp)
        .context("bad --fw-version")?;

    let params = BuildParams {
        firmware_path: firmware_path.clone(),
        prog_size,
        version,
        manufacture_id: ascii_field::<MANUFACTURE_ID_BYTE_SIZE>(
            args.get_one::<String>("manufacturer").unwrap(),
            "manufacturer",
        )?,
        device_type: ascii_field::<DEVICE_TYPE_BYTE_SIZE>(
            args.get_one::<String>("model").unwrap(),
            "model",
        )?,
        chunk_size: args
            .get_one::<u16>("chunk-size")
            .copied()
            .unwrap_or(DEFAULT_CHUNK_SIZE),
    };

    let signer = FirmwareSigner::from_key_config(key_config)
        .with_context(|| format!("failed to load key config {}", key_config.display()))?;
    let (prog_path, update_path) = signer.create_signed_firmware(&params)?;

    log::info!(
        "signed firmware written: {} and {}",
        prog_path.display(),
        update_path.display()
    );
    Ok(())
}
