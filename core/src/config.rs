use serde::{Deserialize, Serialize};

/// What to do with a subscription row whose status is neither
/// active nor canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownStatusPolicy {
    /// Flag the row invalid and let the status resolver fill it in.
    #[default]
    Resolve,
    /// Abort the run with `PipelineError::UnknownStatus`.
    Reject,
}

// ── Synthetic input generator ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub subscribers:            usize,
    /// First month any subscriber may start in, as `YYYY-MM`.
    pub earliest_start:         String,
    /// Number of months after `earliest_start` a history may begin.
    pub start_spread_months:    u32,
    pub min_history_months:     u32,
    pub max_history_months:     u32,
    /// Per observed month, probability the status flips.
    pub status_flip_rate:       f64,
    /// Per observed month, probability a second conflicting row is emitted.
    pub duplicate_rate:         f64,
    /// Per interior month, probability the row is dropped.
    pub gap_rate:               f64,
    /// Per observed month, probability the status text is garbled.
    pub unknown_status_rate:    f64,
    /// Upper bound on booking events per subscriber-month.
    pub max_bookings_per_month: u32,
    /// Probability a booking event is Confirmed.
    pub confirmed_share:        f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            subscribers:            50,
            earliest_start:         "2020-01".into(),
            start_spread_months:    24,
            min_history_months:     1,
            max_history_months:     24,
            status_flip_rate:       0.15,
            duplicate_rate:         0.05,
            gap_rate:               0.10,
            unknown_status_rate:    0.0,
            max_bookings_per_month: 4,
            confirmed_share:        0.70,
        }
    }
}

impl SyntheticConfig {
    /// Longest history or start spread the generator accepts (100 years).
    pub const MAX_MONTHS: u32 = 1200;
    pub const MAX_BOOKINGS_PER_MONTH: u32 = 1000;

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_history_months == 0 || self.min_history_months > self.max_history_months {
            anyhow::bail!(
                "synthetic history bounds invalid: min={} max={}",
                self.min_history_months,
                self.max_history_months
            );
        }
        for (name, months) in [
            ("max_history_months", self.max_history_months),
            ("start_spread_months", self.start_spread_months),
        ] {
            if months > Self::MAX_MONTHS {
                anyhow::bail!("synthetic.{name}={months} exceeds {}", Self::MAX_MONTHS);
            }
        }
        if self.max_bookings_per_month > Self::MAX_BOOKINGS_PER_MONTH {
            anyhow::bail!(
                "synthetic.max_bookings_per_month={} exceeds {}",
                self.max_bookings_per_month,
                Self::MAX_BOOKINGS_PER_MONTH
            );
        }
        for (name, p) in [
            ("status_flip_rate", self.status_flip_rate),
            ("duplicate_rate", self.duplicate_rate),
            ("gap_rate", self.gap_rate),
            ("unknown_status_rate", self.unknown_status_rate),
            ("confirmed_share", self.confirmed_share),
        ] {
            if !(0.0..=1.0).contains(&p) {
                anyhow::bail!("synthetic.{name}={p} must be within [0, 1]");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub unknown_status_policy:    UnknownStatusPolicy,
    /// Booking status counted as confirmed. Exact match.
    pub confirmed_booking_status: String,
    /// Persist a JSON checkpoint of the timeline after every stage.
    pub checkpoint_stages:        bool,
    pub synthetic:                SyntheticConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            unknown_status_policy:    UnknownStatusPolicy::Resolve,
            confirmed_booking_status: "Confirmed".into(),
            checkpoint_stages:        false,
            synthetic:                SyntheticConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    /// In tests, use PipelineConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Config with hardcoded defaults and checkpoints on, for tests.
    pub fn default_test() -> Self {
        Self {
            checkpoint_stages: true,
            synthetic: SyntheticConfig {
                subscribers:         25,
                unknown_status_rate: 0.02,
                ..SyntheticConfig::default()
            },
            ..Self::default()
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.confirmed_booking_status.trim().is_empty() {
            anyhow::bail!("confirmed_booking_status must not be empty");
        }
        self.synthetic.validate()
    }
}
