//! Batch processing of quote lines: catalogue matching followed by waste estimation.

use crate::catalogue::CatalogueSnapshot;
use crate::error::ValidationError;
use crate::model::{ProductLineInput, QuoteBatch, QuoteLine, ResolvedLine};
use crate::waste::WasteEstimator;

/// Runs catalogue resolution and waste estimation over quote lines.
#[derive(Debug, Clone)]
pub struct QuoteLineProcessor {
    estimator: WasteEstimator,
}

impl QuoteLineProcessor {
    /// Create a processor using `estimator` for waste volumes.
    #[must_use]
    pub fn new(estimator: WasteEstimator) -> Self {
        Self { estimator }
    }

    /// The waste estimator in use.
    #[must_use]
    pub fn estimator(&self) -> &WasteEstimator {
        &self.estimator
    }

    /// Process `lines` in order and total their waste and install time.
    ///
    /// Every line is validated before any of them is resolved.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for the first line with no text, a zero quantity or an
    /// unusable manual install time.
    pub fn process_batch(
        &self,
        lines: &[ProductLineInput],
        catalogue: &CatalogueSnapshot,
    ) -> Result<QuoteBatch, ValidationError> {
        for (index, line) in lines.iter().enumerate() {
            validate_line(index, line)?;
        }

        let processed: Vec<QuoteLine> = lines
            .iter()
            .map(|line| self.process_line(line, catalogue))
            .collect();

        let total_waste_m3 = processed.iter().map(QuoteLine::line_waste_m3).sum();
        let total_install_hours = processed
            .iter()
            .filter_map(|line| {
                line.install_time_hours
                    .map(|hours| hours * f64::from(line.input.quantity))
            })
            .sum();
        let unresolved_count = processed
            .iter()
            .filter(|line| line.resolution.requires_manual_entry())
            .count();

        tracing::info!(
            lines = processed.len(),
            unresolved = unresolved_count,
            total_waste_m3,
            total_install_hours,
            "quote batch processed"
        );

        Ok(QuoteBatch {
            lines: processed,
            total_waste_m3,
            total_install_hours,
            unresolved_count,
        })
    }

    /// Resolve one line and work out its per-unit waste.
    #[must_use]
    pub fn process_line(
        &self,
        line: &ProductLineInput,
        catalogue: &CatalogueSnapshot,
    ) -> QuoteLine {
        let resolution = catalogue.resolve(&line.product_code, &line.description);

        let (install_time_hours, waste_per_unit_m3) = match &resolution {
            ResolvedLine::Resolved(product) => {
                let hours = line
                    .manual_install_hours
                    .unwrap_or(product.install_time_hours);
                let waste = if product.waste_volume_m3 > 0.0 {
                    self.estimator.bound(product.waste_volume_m3)
                } else {
                    self.estimator
                        .estimate(&product.canonical_key, hours, product.is_heavy)
                };
                (Some(hours), waste)
            }
            ResolvedLine::Unresolved { .. } => {
                let hours = line.manual_install_hours;
                let waste = self.estimator.estimate(
                    &line.product_code,
                    hours.unwrap_or_default(),
                    false,
                );
                (hours, waste)
            }
        };

        QuoteLine {
            input: line.clone(),
            resolution,
            install_time_hours,
            waste_per_unit_m3,
        }
    }
}

fn validate_line(index: usize, line: &ProductLineInput) -> Result<(), ValidationError> {
    if line.product_code.trim().is_empty() && line.description.trim().is_empty() {
        return Err(ValidationError::EmptyLine { index });
    }
    if line.quantity == 0 {
        return Err(ValidationError::InvalidQuantity {
            index,
            quantity: line.quantity,
        });
    }
    if let Some(hours) = line.manual_install_hours
        && (!hours.is_finite() || hours < 0.0)
    {
        return Err(ValidationError::InvalidManualHours { index, hours });
    }
    Ok(())
}
