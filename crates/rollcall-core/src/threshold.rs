//! Threshold math: percentages, recovery counts, safe-miss counts and risk
//! tiers.
//!
//! Every function here is pure and total. A student with no sessions yields
//! zeros and "no data", never an error.
//!
//! The target ratio is held in basis points so that the ceiling in
//! [`required_to_recover`] and the floor in [`safe_miss_count`] are computed
//! with exact integer arithmetic.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const SCALE: u64 = 10_000;

// ─── Threshold ───────────────────────────────────────────────────────────────

/// The minimum required attendance ratio, strictly between 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold {
  basis_points: u64,
}

impl Threshold {
  /// 75%, the bar used throughout the institution.
  pub const DEFAULT: Self = Self { basis_points: 7_500 };

  pub fn from_ratio(ratio: f64) -> Result<Self> {
    if !ratio.is_finite() || ratio <= 0.0 || ratio >= 1.0 {
      return Err(Error::InvalidThreshold(ratio));
    }
    let basis_points = (ratio * SCALE as f64).round() as u64;
    if basis_points == 0 || basis_points >= SCALE {
      return Err(Error::InvalidThreshold(ratio));
    }
    Ok(Self { basis_points })
  }

  pub fn ratio(self) -> f64 { self.basis_points as f64 / SCALE as f64 }

  /// Whether `present / total` reaches the target. An empty history never
  /// does.
  pub fn is_met(self, present: u32, total: u32) -> bool {
    total > 0
      && u64::from(present) * SCALE >= self.basis_points * u64::from(total)
  }

  /// Whether a whole-number percentage reaches the target.
  pub fn is_met_by_percentage(self, percentage: u8) -> bool {
    u64::from(percentage) * (SCALE / 100) >= self.basis_points
  }
}

impl Default for Threshold {
  fn default() -> Self { Self::DEFAULT }
}

impl TryFrom<f64> for Threshold {
  type Error = Error;

  fn try_from(ratio: f64) -> Result<Self> { Self::from_ratio(ratio) }
}

impl From<Threshold> for f64 {
  fn from(t: Threshold) -> Self { t.ratio() }
}

// ─── Percentages and tiers ───────────────────────────────────────────────────

/// `100 * present / total` rounded to a whole number, with exact halves
/// rounding down (35/40 is 87); `None` when there are no sessions.
pub fn percentage(present: u32, total: u32) -> Option<u8> {
  if total == 0 {
    return None;
  }
  let (present, total) = (u64::from(present.min(total)), u64::from(total));
  Some(((200 * present + total - 1) / (2 * total)) as u8)
}

/// Coarse classification of a percentage for warnings.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
  Critical,
  Low,
  Safe,
}

impl RiskTier {
  /// `>= 75` is safe, `60..75` is low, anything below 60 is critical.
  pub fn from_percentage(percentage: u8) -> Self {
    match percentage {
      75.. => Self::Safe,
      60..=74 => Self::Low,
      _ => Self::Critical,
    }
  }
}

// ─── Forward-looking counts ──────────────────────────────────────────────────

/// Minimum number of further sessions the student must attend, back to
/// back, to reach `target`. Zero when already at or above it, or when there
/// is no history.
pub fn required_to_recover(present: u32, total: u32, target: Threshold) -> u32 {
  if total == 0 || target.is_met(present, total) {
    return 0;
  }
  let present = u64::from(present.min(total));
  let deficit = target.basis_points * u64::from(total) - present * SCALE;
  let margin = SCALE - target.basis_points;
  u32::try_from(deficit.div_ceil(margin)).unwrap_or(u32::MAX)
}

/// Maximum number of further sessions that may take place, all missed,
/// before the ratio drops below `target`.
pub fn safe_miss_count(present: u32, total: u32, target: Threshold) -> u32 {
  if total == 0 {
    return 0;
  }
  let present = u64::from(present.min(total));
  let ceiling = present * SCALE / target.basis_points;
  let spare = ceiling.saturating_sub(u64::from(total));
  u32::try_from(spare).unwrap_or(u32::MAX)
}

// ─── Outlook ─────────────────────────────────────────────────────────────────

/// The threshold metrics for one set of counts: a subject, or the overall
/// totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outlook {
  /// `None` when there is no data to classify.
  pub risk:                Option<RiskTier>,
  pub required_to_recover: u32,
  pub safe_miss_count:     u32,
}

impl Outlook {
  pub fn compute(present: u32, total: u32, target: Threshold) -> Self {
    Self {
      risk:                percentage(present, total).map(RiskTier::from_percentage),
      required_to_recover: required_to_recover(present, total, target),
      safe_miss_count:     safe_miss_count(present, total, target),
    }
  }
}
