//! Engine configuration: parsing, normalization, and loading.
//!
//! A TOML-backed config describing which instruments to watch, the exchange
//! time zone, how many trading days of history each timeframe evaluates over,
//! and the trading calendar to wire in.
//!
//! Normalization trims and de-duplicates instrument codes (preserving order),
//! validates the time zone string, and checks every lookback is nonzero.
//! Entrypoints: [`load_config_str`] and [`load_config_path`].

use anyhow::{Context, bail};
use chrono::NaiveDate;
use chrono_tz::Tz;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use toml::from_str;

use market_feed::models::Timeframe;

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Instrument codes to aggregate and evaluate (e.g., ["rb2510", "cu2509"]).
    ///
    /// Normalized to unique, trimmed values while preserving order.
    pub instruments: Vec<String>,

    /// Exchange time zone as an IANA name. Defaults to Asia/Shanghai.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Evaluation history depth per timeframe, in trading days.
    #[serde(default)]
    pub lookback: LookbackConfig,

    /// The trading calendar, listed explicitly.
    pub calendar: CalendarConfig,
}

/// How many trading days of bars each timeframe's evaluation reads.
///
/// The defaults cover the longest moving-average window at each timeframe's
/// bar density with some slack.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct LookbackConfig {
    /// Daily bars.
    pub d1: u32,
    /// 15-minute bars.
    pub m15: u32,
    /// 5-minute bars.
    pub m5: u32,
    /// 3-minute bars.
    pub m3: u32,
    /// 1-minute bars.
    pub m1: u32,
}

impl Default for LookbackConfig {
    fn default() -> Self {
        Self {
            d1: 61,
            m15: 20,
            m5: 7,
            m3: 5,
            m1: 2,
        }
    }
}

impl LookbackConfig {
    /// Lookback depth for `timeframe`, in trading days.
    pub fn trading_days(&self, timeframe: Timeframe) -> u32 {
        match timeframe {
            Timeframe::D1 => self.d1,
            Timeframe::M15 => self.m15,
            Timeframe::M5 => self.m5,
            Timeframe::M3 => self.m3,
            Timeframe::M1 => self.m1,
        }
    }
}

/// Trading-calendar section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CalendarConfig {
    /// Known trading dates, in any order; sorted and de-duplicated when the
    /// calendar is built.
    pub trading_dates: Vec<NaiveDate>,
}

fn default_timezone() -> String {
    "Asia/Shanghai".to_string()
}

impl EngineConfig {
    /// The parsed exchange time zone.
    ///
    /// Normalization already validated the string, so this only fails on a
    /// config mutated after loading.
    pub fn tz(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid timezone {:?}: {e}", self.timezone))
    }
}

/// Normalize a config in-place.
///
/// - Trim instrument codes, reject empties, de-duplicate preserving order
/// - Require at least one instrument and at least one trading date
/// - Validate the time zone string parses
/// - Reject zero lookbacks
pub fn normalize_config(cfg: &mut EngineConfig) -> anyhow::Result<()> {
    let mut seen: IndexSet<String> = IndexSet::new();
    for raw in std::mem::take(&mut cfg.instruments) {
        let code = raw.trim().to_string();
        if code.is_empty() {
            bail!("instrument code cannot be empty after trimming");
        }
        seen.insert(code);
    }
    cfg.instruments = seen.into_iter().collect();
    if cfg.instruments.is_empty() {
        bail!("config must list at least one instrument");
    }

    if cfg.calendar.trading_dates.is_empty() {
        bail!("config must list at least one trading date");
    }

    cfg.timezone = cfg.timezone.trim().to_string();
    cfg.timezone
        .parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("invalid timezone {:?}: {e}", cfg.timezone))?;

    for tf in Timeframe::ALL {
        if cfg.lookback.trading_days(tf) == 0 {
            bail!("lookback for {tf} must be at least 1 trading day");
        }
    }

    Ok(())
}

/// Parse and normalize a config from a TOML string.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<EngineConfig> {
    let mut cfg: EngineConfig = from_str(toml_str).context("failed to parse engine TOML")?;
    normalize_config(&mut cfg).context("normalize config failed")?;
    Ok(cfg)
}

/// Read a config TOML file from disk, parse, and normalize it.
pub fn load_config_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<EngineConfig> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        instruments = [" rb2510 ", "cu2509", "rb2510"]

        [calendar]
        trading_dates = ["2025-03-10", "2025-03-11"]
    "#;

    #[test]
    fn normalizes_and_applies_defaults() {
        let cfg = load_config_str(MINIMAL).unwrap();
        assert_eq!(cfg.instruments, vec!["rb2510", "cu2509"]);
        assert_eq!(cfg.timezone, "Asia/Shanghai");
        assert_eq!(cfg.lookback.trading_days(Timeframe::D1), 61);
        assert_eq!(cfg.lookback.trading_days(Timeframe::M1), 2);
        assert_eq!(cfg.tz().unwrap(), chrono_tz::Asia::Shanghai);
    }

    #[test]
    fn explicit_sections_override_defaults() {
        let cfg = load_config_str(
            r#"
            instruments = ["ag2506"]
            timezone = "UTC"

            [lookback]
            m15 = 30

            [calendar]
            trading_dates = ["2025-03-10"]
        "#,
        )
        .unwrap();
        assert_eq!(cfg.lookback.trading_days(Timeframe::M15), 30);
        // Unmentioned fields keep their defaults.
        assert_eq!(cfg.lookback.trading_days(Timeframe::M5), 7);
        assert_eq!(cfg.tz().unwrap(), chrono_tz::UTC);
    }

    #[test]
    fn empty_instruments_rejected() {
        let err = load_config_str(
            r#"
            instruments = ["   "]

            [calendar]
            trading_dates = ["2025-03-10"]
        "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("normalize config"));
    }

    #[test]
    fn bad_timezone_rejected() {
        let err = load_config_str(
            r#"
            instruments = ["rb2510"]
            timezone = "Mars/Olympus"

            [calendar]
            trading_dates = ["2025-03-10"]
        "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("invalid timezone"));
    }

    #[test]
    fn unknown_fields_rejected() {
        let err = load_config_str(
            r#"
            instruments = ["rb2510"]
            surprise = true

            [calendar]
            trading_dates = ["2025-03-10"]
        "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("parse engine TOML"));
    }

    #[test]
    fn zero_lookback_rejected() {
        let err = load_config_str(
            r#"
            instruments = ["rb2510"]

            [lookback]
            m1 = 0

            [calendar]
            trading_dates = ["2025-03-10"]
        "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("at least 1 trading day"));
    }
}
