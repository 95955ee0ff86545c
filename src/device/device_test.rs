// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::device::{open, DeviceAddr, RxChunk};
use crate::error::UsrpError;
use crate::types::TimeSpec;

#[test]
fn test_addr_parses_key_value_list() {
    let addr = DeviceAddr::parse("type=sim, channels=2 ,fifo=4096").unwrap();
    assert_eq!(addr.get("type"), Some("sim"));
    assert_eq!(addr.get("channels"), Some("2"));
    assert_eq!(addr.get("fifo"), Some("4096"));
    assert_eq!(addr.get("serial"), None);
    assert_eq!(addr.to_string(), "type=sim,channels=2,fifo=4096");
}

#[test]
fn test_addr_empty_is_valid() {
    let addr = DeviceAddr::parse("").unwrap();
    assert_eq!(addr, DeviceAddr::default());
    assert_eq!(addr.get("type"), None);
}

#[test]
fn test_addr_last_duplicate_wins() {
    let addr = DeviceAddr::parse("channels=1,channels=4").unwrap();
    assert_eq!(addr.get("channels"), Some("4"));
}

#[test]
fn test_addr_rejects_bare_tokens() {
    assert!(DeviceAddr::parse("sim").is_err());
    assert!(DeviceAddr::parse("type=sim,=2").is_err());
}

#[test]
fn test_addr_get_parsed_defaults_and_errors() {
    let addr = DeviceAddr::parse("channels=3").unwrap();
    assert_eq!(addr.get_parsed("channels", 1usize).unwrap(), 3);
    assert_eq!(addr.get_parsed("fifo", 512u64).unwrap(), 512);
    let bad = DeviceAddr::parse("channels=many").unwrap();
    assert!(bad.get_parsed("channels", 1usize).is_err());
}

#[test]
fn test_open_defaults_to_simulator() {
    let dev = open(&DeviceAddr::parse("").unwrap()).unwrap();
    assert_eq!(dev.num_channels(), 2);
    let dev = open(&DeviceAddr::parse("type=sim,channels=1").unwrap()).unwrap();
    assert_eq!(dev.num_channels(), 1);
}

#[test]
fn test_open_unknown_type_is_config_error() {
    let err = open(&DeviceAddr::parse("type=x310").unwrap()).unwrap_err();
    assert!(matches!(err, UsrpError::Config(_)));
}

#[test]
fn test_empty_chunk_shape() {
    let chunk = RxChunk::empty(2, TimeSpec::new(5, 0.25));
    assert_eq!(chunk.samples, 0);
    assert_eq!(chunk.data.len(), 2);
    assert!(chunk.data.iter().all(|d| d.is_empty()));
    assert!(!chunk.overflow);
}
