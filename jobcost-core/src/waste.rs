//! Per-unit waste volume estimation.

use serde::{Deserialize, Serialize};

use crate::catalogue::normalize;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Fixed waste volume for every product whose code contains `prefix`.
pub struct WasteProfile {
    /// Family prefix, compared in normalized form.
    pub prefix: String,
    /// Volume returned for matching products.
    pub volume_m3: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Constants of the install-time based waste formula.
pub struct WasteFormula {
    /// Volume every product produces.
    pub base: f64,
    /// Extra volume per install hour.
    pub time_factor: f64,
    /// Factor applied to heavy products.
    pub heavy_multiplier: f64,
    /// Upper bound of any per-unit volume.
    pub max_cap: f64,
}

impl WasteFormula {
    /// Check every constant is finite and non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending constant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("waste.base", self.base),
            ("waste.time_factor", self.time_factor),
            ("waste.heavy_multiplier", self.heavy_multiplier),
            ("waste.max_cap", self.max_cap),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(
                    field,
                    value,
                    "must be a non-negative number",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Waste estimator combining a profile table with the fallback formula.
pub struct WasteEstimator {
    profiles: Vec<(String, f64)>,
    formula: WasteFormula,
}

impl WasteEstimator {
    /// Build an estimator from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the formula is invalid or a profile lies outside
    /// `[0, max_cap]`.
    pub fn new(profiles: Vec<WasteProfile>, formula: WasteFormula) -> Result<Self, ConfigError> {
        formula.validate()?;

        let mut table = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let prefix = normalize(&profile.prefix);
            if prefix.is_empty() {
                return Err(ConfigError::invalid(
                    "waste.profiles.prefix",
                    &profile.prefix,
                    "prefix is empty",
                ));
            }
            if !profile.volume_m3.is_finite()
                || profile.volume_m3 < 0.0
                || profile.volume_m3 > formula.max_cap
            {
                return Err(ConfigError::invalid(
                    "waste.profiles.volume_m3",
                    profile.volume_m3,
                    "must lie between 0 and waste.max_cap",
                ));
            }
            table.push((prefix, profile.volume_m3));
        }

        Ok(Self {
            profiles: table,
            formula,
        })
    }

    /// The formula constants in use.
    #[must_use]
    pub fn formula(&self) -> WasteFormula {
        self.formula
    }

    /// Profile volume for `code`, if any profile prefix occurs in it.
    ///
    /// The longest matching prefix wins; among equal lengths the first configured one does.
    #[must_use]
    pub fn profile_for(&self, code: &str) -> Option<f64> {
        let normalized = normalize(code);
        let mut best: Option<(usize, f64)> = None;

        for (prefix, volume) in &self.profiles {
            if !normalized.contains(prefix.as_str()) {
                continue;
            }
            if best.is_none_or(|(length, _)| prefix.len() > length) {
                best = Some((prefix.len(), *volume));
            }
        }

        best.map(|(_, volume)| volume)
    }

    /// Waste volume per unit for a (possibly unresolved) product.
    #[must_use]
    pub fn estimate(&self, code: &str, install_time_hours: f64, is_heavy: bool) -> f64 {
        if let Some(volume) = self.profile_for(code) {
            tracing::trace!(code, volume, "waste from profile");
            return volume;
        }

        let mut volume = self.formula.base + install_time_hours * self.formula.time_factor;
        if is_heavy {
            volume *= self.formula.heavy_multiplier;
        }
        self.bound(volume)
    }

    /// Clamp `volume` to `[0, max_cap]`; anything not a number becomes zero.
    #[must_use]
    pub fn bound(&self, volume: f64) -> f64 {
        if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, self.formula.max_cap)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMULA: WasteFormula = WasteFormula {
        base: 0.2,
        time_factor: 0.3,
        heavy_multiplier: 1.5,
        max_cap: 2.0,
    };

    fn estimator() -> WasteEstimator {
        WasteEstimator::new(
            vec![
                WasteProfile {
                    prefix: "FLX".to_owned(),
                    volume_m3: 0.8,
                },
                WasteProfile {
                    prefix: "FLX-8P".to_owned(),
                    volume_m3: 1.6,
                },
            ],
            FORMULA,
        )
        .expect("valid estimator")
    }

    fn close(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-9
    }

    #[test]
    fn profile_ignores_install_time() {
        let waste = estimator();
        assert!(close(waste.estimate("FLX-8P", 2.0, true), 1.6));
        assert!(close(waste.estimate("FLX-8P", 40.0, false), 1.6));
    }

    #[test]
    fn longest_profile_prefix_wins() {
        let waste = estimator();
        assert!(close(waste.estimate("flx_8p_3200", 0.0, false), 1.6));
        assert!(close(waste.estimate("FLX 4P", 0.0, false), 0.8));
    }

    #[test]
    fn formula_applies_without_profile() {
        let waste = estimator();
        assert!(close(waste.estimate("UNKNOWN-CODE", 1.0, false), 0.2 + 0.3));
        assert!(close(
            waste.estimate("UNKNOWN-CODE", 1.0, true),
            (0.2 + 0.3) * 1.5
        ));
    }

    #[test]
    fn formula_is_clamped_to_cap() {
        let waste = estimator();
        assert!(close(waste.estimate("UNKNOWN-CODE", 100.0, true), 2.0));
        assert!(close(waste.bound(-3.0), 0.0));
        assert!(close(waste.bound(f64::NAN), 0.0));
    }

    #[test]
    fn profile_above_cap_is_rejected() {
        let result = WasteEstimator::new(
            vec![WasteProfile {
                prefix: "BIG".to_owned(),
                volume_m3: 5.0,
            }],
            FORMULA,
        );
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn negative_constant_is_rejected() {
        let formula = WasteFormula {
            time_factor: -1.0,
            ..FORMULA
        };
        assert!(WasteEstimator::new(Vec::new(), formula).is_err());
    }
}
