//! Tests for error types

use miette::Diagnostic;
use pipewright_core::Error;
use std::path::Path;

#[test]
fn test_configuration_error() {
    let error = Error::configuration("duplicate target");
    assert_eq!(error.to_string(), "Configuration error: duplicate target");
    assert_eq!(
        error.code().map(|c| c.to_string()).as_deref(),
        Some("pipewright::config::invalid")
    );
}

#[test]
fn test_manifest_parse_error_with_and_without_path() {
    let error = Error::manifest_parse(None, "expected a table");
    assert_eq!(error.to_string(), "Failed to parse manifest: expected a table");

    let error = Error::manifest_parse(Some(Path::new("build/pipewright.toml")), "bad key");
    assert_eq!(
        error.to_string(),
        "Failed to parse manifest build/pipewright.toml: bad key"
    );
    assert!(error.help().is_some());
}

#[test]
fn test_io_error_keeps_source() {
    use std::error::Error as _;
    use std::io;

    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let error = Error::io(io_error, Some(Path::new("/tmp/x")), "reading manifest");
    assert_eq!(
        error.to_string(),
        "I/O error during reading manifest: file not found"
    );
    assert!(error.source().is_some());
}
