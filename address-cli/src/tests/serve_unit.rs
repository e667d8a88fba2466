//! Focused unit tests covering `serve` configuration.

use super::*;
use crate::serve::{ServeArgs, ServeConfig};
use camino::Utf8PathBuf;
use rstest::rstest;

#[rstest]
fn defaults_apply_when_nothing_is_configured() {
    let config = ServeConfig::try_from(ServeArgs::default()).expect("defaults are valid");
    assert_eq!(config.bind.to_string(), DEFAULT_BIND);
    assert_eq!(config.data_dir, Utf8PathBuf::from(DEFAULT_DATA_DIR));
}

#[rstest]
fn explicit_values_override_defaults() {
    let args = ServeArgs {
        bind: Some("127.0.0.1:9000".to_owned()),
        data_dir: Some(Utf8PathBuf::from("/srv/addresses")),
    };
    let config = ServeConfig::try_from(args).expect("valid configuration");
    assert_eq!(config.bind.port(), 9000);
    assert!(config.bind.ip().is_loopback());
    assert_eq!(config.data_dir, Utf8PathBuf::from("/srv/addresses"));
}

#[rstest]
#[case("localhost")]
#[case("0.0.0.0")]
#[case("0.0.0.0:port")]
fn malformed_bind_addresses_are_rejected(#[case] bind: &str) {
    let args = ServeArgs {
        bind: Some(bind.to_owned()),
        ..ServeArgs::default()
    };
    match ServeConfig::try_from(args) {
        Err(CliError::InvalidBindAddress { value, .. }) => assert_eq!(value, bind),
        other => panic!("expected InvalidBindAddress, found {other:?}"),
    }
}

#[rstest]
fn serve_subcommand_parses_flags() {
    let cli = Cli::try_parse_from([
        "address-server",
        "serve",
        "--bind",
        "127.0.0.1:0",
        "--data-dir",
        "store",
    ])
    .expect("arguments parse");
    let Command::Serve(args) = cli.command else {
        panic!("expected the serve subcommand");
    };
    assert_eq!(args.bind.as_deref(), Some("127.0.0.1:0"));
    assert_eq!(args.data_dir, Some(Utf8PathBuf::from("store")));
}
