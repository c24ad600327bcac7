//! Command-line parsing tests
//!
//! Run with: cargo test --test cli_test

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use clap::Parser;
    use seqtrace::seq::TraceUnit;
    use seqtrace::ui::cli::{is_usage_request, parse_number, Args};

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("seqtrace").chain(args.iter().copied()))
    }

    #[test]
    fn test_decimal_and_hex_numbers() {
        assert_eq!(parse_number("4198400").unwrap(), 0x401000);
        assert_eq!(parse_number("0x401000").unwrap(), 0x401000);
        assert_eq!(parse_number("0X1f").unwrap(), 31);
        assert!(parse_number("0x").is_err());
        assert!(parse_number("12abc").is_err());
    }

    #[test]
    fn test_full_command_line() {
        let args = parse(&["target.exe", "0x401000", "5", "1", "opcode"]).unwrap();
        assert_eq!(args.log_level(), "warn");

        let config = args.into_config();
        assert_eq!(config.path, PathBuf::from("target.exe"));
        assert_eq!(config.address, 0x401000);
        assert_eq!(config.length, 5);
        assert_eq!(config.order, 1);
        assert_eq!(config.unit, TraceUnit::Opcode);
        assert_eq!(config.load_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_units_and_options() {
        let args = parse(&[
            "-vv",
            "--load-timeout",
            "0",
            "a.exe",
            "4096",
            "0x10",
            "3",
            "mnemonic",
        ])
        .unwrap();
        assert_eq!(args.log_level(), "debug");
        assert_eq!(args.unit, TraceUnit::Mnemonic);

        let config = args.into_config();
        assert_eq!(config.length, 16);
        assert_eq!(config.load_timeout, None);

        let args = parse(&["a.exe", "1", "1", "2", "original"]).unwrap();
        assert_eq!(args.unit, TraceUnit::Original);
    }

    #[test]
    fn test_invalid_values_are_failures() {
        for bad in [
            ["a.exe", "nope", "5", "1", "opcode"],
            ["a.exe", "0x401000", "5", "0", "opcode"],
            ["a.exe", "0x401000", "5", "4", "opcode"],
            ["a.exe", "0x401000", "5", "1", "bytes"],
            ["a.exe", "0x100000000", "5", "1", "opcode"],
        ] {
            let err = parse(&bad).unwrap_err();
            assert!(!is_usage_request(err.kind()), "{:?}", bad);
        }
    }

    #[test]
    fn test_wrong_arity_prints_usage() {
        let err = parse(&["a.exe", "0x401000"]).unwrap_err();
        assert!(is_usage_request(err.kind()));

        let err = parse(&["--help"]).unwrap_err();
        assert!(is_usage_request(err.kind()));
    }
}

#[cfg(test)]
mod diagnostics {
    use anyhow::Context;
    use seqtrace::ui::cli::diagnostic_line;
    use seqtrace::{OsError, TraceError};

    #[test]
    fn test_os_failure_is_reported_once() {
        let launch = TraceError::Launch(OsError::with_message(
            2,
            "The system cannot find the file specified.",
        ));
        let err = Err::<(), _>(launch).context("tracing a.exe").unwrap_err();
        let line = diagnostic_line(&err);
        assert!(line.starts_with("tracing a.exe: failed to launch target: error 0x00000002"));
        assert_eq!(line.matches("cannot find the file").count(), 1);
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_validation_error_has_no_context() {
        let err = anyhow::Error::new(TraceError::Validation("x.exe is a directory".into()));
        assert_eq!(diagnostic_line(&err), "invalid input: x.exe is a directory");
    }
}
