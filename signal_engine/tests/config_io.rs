//! Config loading from disk.

use std::io::Write;

use market_feed::models::Timeframe;
use signal_engine::config::load_config_path;

#[test]
fn loads_and_normalizes_a_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
instruments = ["rb2510", " cu2509 "]
timezone = "Asia/Shanghai"

[lookback]
d1 = 90

[calendar]
trading_dates = ["2025-03-10", "2025-03-11", "2025-03-12"]
"#
    )
    .unwrap();

    let cfg = load_config_path(file.path()).unwrap();
    assert_eq!(cfg.instruments, vec!["rb2510", "cu2509"]);
    assert_eq!(cfg.lookback.trading_days(Timeframe::D1), 90);
    assert_eq!(cfg.lookback.trading_days(Timeframe::M3), 5);
    assert_eq!(cfg.calendar.trading_dates.len(), 3);
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config_path(dir.path().join("absent.toml")).unwrap_err();
    assert!(format!("{err:#}").contains("read config file"));
}
