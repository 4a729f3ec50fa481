/*++

Licensed under the Apache-2.0 license.

File Name:

   main.rs

Abstract:

    Main entry point of the provkit factory tooling: device provisioning
    and firmware image signing.

--*/

use std::path::PathBuf;

use clap::{arg, value_parser, Command};

mod provision;
mod sign_firmware;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let sub_cmds = vec![
        Command::new("provision")
            .about("Initialize discovered devices and collect identity requests")
            .arg(
                arg!(--"output" <FILE> "Card requests output file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"device-info-output" <FILE> "Device info output file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"auth-pub-key-1" <FILE> "File with 1st auth public key")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"auth-pub-key-2" <FILE> "File with 2nd auth public key")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"rec-pub-key-1" <FILE> "File with 1st recovery public key")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"rec-pub-key-2" <FILE> "File with 2nd recovery public key")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"tl-pub-key-1" <FILE> "File with 1st trust list public key")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"tl-pub-key-2" <FILE> "File with 2nd trust list public key")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"fw-pub-key-1" <FILE> "File with 1st firmware public key")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"fw-pub-key-2" <FILE> "File with 2nd firmware public key")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"trust-list" <FILE> "File with the trust list")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"factory-key" <FILE> "File with the factory private key (PEM)")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"factory-key-ec-type" <U8> "EC type identifier of the factory key")
                    .required(true)
                    .value_parser(value_parser!(u8)),
            )
            .arg(arg!(--"trust-list-only" "Upload the trust list only"))
            .arg(arg!(--"create-card-only" "Create card requests only"))
            .arg(
                arg!(--"timeout-ms" <U64> "Per-request device timeout in milliseconds")
                    .required(false)
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                arg!(--"sim" <COUNT> "Run against N in-process simulated devices")
                    .required(false)
                    .value_parser(value_parser!(u8)),
            ),
        Command::new("sign-firmware")
            .about("Sign a firmware image, producing the Prog and Update artifacts")
            .arg(
                arg!(--"firmware" <FILE> "Firmware binary to sign")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"key-config" <FILE> "TOML file with the signer key list")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"prog-size" <BYTES> "Total size of the Prog flash image")
                    .required(true)
                    .value_parser(value_parser!(usize)),
            )
            .arg(
                arg!(--"fw-version" <VERSION> "Firmware version as major.minor.patch.build")
                    .required(true)
                    .value_parser(value_parser!(String)),
            )
            .arg(
                arg!(--"manufacturer" <ID> "Manufacturer identifier (up to 16 ASCII chars)")
                    .required(true)
                    .value_parser(value_parser!(String)),
            )
            .arg(
                arg!(--"model" <ID> "Device model identifier (up to 4 ASCII chars)")
                    .required(true)
                    .value_parser(value_parser!(String)),
            )
            .arg(
                arg!(--"chunk-size" <BYTES> "Transfer chunk size stored in the descriptor")
                    .required(false)
                    .value_parser(value_parser!(u16)),
            ),
    ];

    let cmd = Command::new("provkit")
        .arg_required_else_help(true)
        .subcommands(sub_cmds)
        .about("Factory provisioning and firmware signing tools")
        .get_matches();

    match cmd.subcommand().unwrap() {
        ("provision", args) => provision::run_cmd(args),
        ("sign-firmware", args) => sign_firmware::run_cmd(args),
        (_, _) => unreachable!(),
    }
}
