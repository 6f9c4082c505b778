//! Plain-text job report.

use std::fmt::{self, Write as _};

use chrono::NaiveDate;

use jobcost_core::{LogisticsResult, QuoteBatch, ResolvedLine};

/// Everything that ends up on one printed report.
pub(crate) struct Report<'a> {
    pub(crate) reference: Option<&'a str>,
    pub(crate) job_date: Option<NaiveDate>,
    pub(crate) prepared: NaiveDate,
    pub(crate) quote: Option<&'a QuoteBatch>,
    pub(crate) route: Option<&'a LogisticsResult>,
}

impl Report<'_> {
    pub(crate) fn render(&self) -> Result<String, fmt::Error> {
        let mut out = String::new();
        self.write_header(&mut out)?;
        if let Some(batch) = self.quote {
            write_quote(&mut out, batch)?;
        }
        if let Some(route) = self.route {
            write_route(&mut out, route)?;
        }
        Ok(out)
    }

    fn write_header(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "Job {}", self.reference.unwrap_or("(no reference)"))?;
        if let Some(date) = self.job_date {
            writeln!(out, "Scheduled {}", date.format("%a %d %b %Y"))?;
            if date < self.prepared {
                writeln!(out, "  note: the scheduled date has already passed")?;
            }
        }
        writeln!(out, "Prepared  {}", self.prepared.format("%d/%m/%Y"))
    }
}

fn write_quote(out: &mut String, batch: &QuoteBatch) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "Products")?;
    for line in &batch.lines {
        let shown = if line.input.product_code.is_empty() {
            line.input.description.as_str()
        } else {
            line.input.product_code.as_str()
        };
        let matched = match &line.resolution {
            ResolvedLine::Resolved(product) => {
                format!("{} [{}]", product.canonical_key, product.confidence)
            }
            ResolvedLine::Unresolved { .. } => "UNRESOLVED".to_owned(),
        };
        let hours = line
            .install_time_hours
            .map_or_else(|| "manual".to_owned(), |hours| format!("{hours:.2} h"));
        writeln!(
            out,
            "  {shown:<28} x{qty:<4} {matched:<28} {hours:>8}  {waste:>7.3} m3",
            qty = line.input.quantity,
            waste = line.line_waste_m3(),
        )?;
    }
    writeln!(out, "  Install time  {:.2} h", batch.total_install_hours)?;
    writeln!(out, "  Waste         {:.2} m3", batch.total_waste_m3)?;
    if batch.unresolved_count > 0 {
        writeln!(
            out,
            "  {} line(s) need install times entered by hand",
            batch.unresolved_count
        )?;
    }
    Ok(())
}

fn write_route(out: &mut String, route: &LogisticsResult) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "Route")?;
    for leg in &route.legs {
        writeln!(
            out,
            "  {} ({}) -> {} ({})  {:.1} mi  {}",
            leg.from_label,
            leg.from_postcode,
            leg.to_label,
            leg.to_postcode,
            leg.distance_miles,
            drive_time(leg.duration_minutes),
        )?;
    }
    writeln!(
        out,
        "  Distance {:.1} mi, drive time {}",
        route.total_distance_miles,
        drive_time(route.total_duration_minutes)
    )?;
    writeln!(out, "  Congestion charge  £{:.2}", route.congestion_charge)?;
    writeln!(out, "  ULEZ               £{:.2}", route.ulez_charge)?;
    writeln!(out, "  Fuel               £{:.2}", route.estimated_fuel_cost)?;
    writeln!(out, "  Total              £{:.2}", route.total_cost())?;

    if !route.warnings.is_empty() {
        writeln!(out)?;
        writeln!(out, "Warnings")?;
        for warning in &route.warnings {
            writeln!(out, "  - {warning}")?;
        }
    }
    Ok(())
}

fn drive_time(minutes: f64) -> String {
    let total = minutes.round();
    let hours = (total / 60.0).floor();
    format!("{hours:.0}h {:02.0}m", total - hours * 60.0)
}

#[cfg(test)]
mod tests {
    use jobcost_core::{
        MatchConfidence, Postcode, ProductLineInput, QuoteLine, ResolvedProduct, RouteLeg,
    };

    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn batch() -> QuoteBatch {
        let resolved = QuoteLine {
            input: ProductLineInput::new("FLX-4P-2816-A", "", 10),
            resolution: ResolvedLine::Resolved(ResolvedProduct {
                canonical_key: "FLX 4P".to_owned(),
                name: "Flex 4 person".to_owned(),
                category: "desking".to_owned(),
                install_time_hours: 2.5,
                waste_volume_m3: 0.0,
                is_heavy: false,
                confidence: MatchConfidence::Pattern,
            }),
            install_time_hours: Some(2.5),
            waste_per_unit_m3: 0.95,
        };
        let unresolved = QuoteLine {
            input: ProductLineInput::new("", "Mystery cabinet", 2),
            resolution: ResolvedLine::Unresolved {
                reason: "no catalogue or alias match".to_owned(),
            },
            install_time_hours: None,
            waste_per_unit_m3: 0.2,
        };
        QuoteBatch {
            lines: vec![resolved, unresolved],
            total_waste_m3: 9.9,
            total_install_hours: 25.0,
            unresolved_count: 1,
        }
    }

    fn route() -> LogisticsResult {
        LogisticsResult {
            legs: vec![RouteLeg {
                from_label: "Depot".to_owned(),
                to_label: "Site".to_owned(),
                from_postcode: Postcode::parse("SE1 4AA").expect("valid"),
                to_postcode: Postcode::parse("B1 1RS").expect("valid"),
                distance_miles: 121.5,
                duration_minutes: 145.0,
            }],
            total_distance_miles: 121.5,
            total_duration_minutes: 145.0,
            ulez_charge: 12.5,
            congestion_charge: 15.0,
            warnings: vec!["Site (B1 1RS) is inside the ULEZ: £12.50 charge applied".to_owned()],
            estimated_fuel_cost: 60.75,
        }
    }

    #[test]
    fn renders_quote_and_route_sections() {
        let batch = batch();
        let route = route();
        let text = Report {
            reference: Some("Q-1042"),
            job_date: Some(date(2026, 11, 2)),
            prepared: date(2026, 10, 18),
            quote: Some(&batch),
            route: Some(&route),
        }
        .render()
        .expect("render");

        assert!(text.starts_with("Job Q-1042\nScheduled Mon 02 Nov 2026\nPrepared  18/10/2026\n"));
        assert!(text.contains("FLX 4P [pattern]"));
        assert!(text.contains("UNRESOLVED"));
        assert!(text.contains("1 line(s) need install times entered by hand"));
        assert!(text.contains("Depot (SE1 4AA) -> Site (B1 1RS)  121.5 mi  2h 25m"));
        assert!(text.contains("Total              £88.25"));
        assert!(text.contains("  - Site (B1 1RS) is inside the ULEZ"));
        assert!(!text.contains("already passed"));
    }

    #[test]
    fn past_job_date_is_flagged() {
        let text = Report {
            reference: None,
            job_date: Some(date(2026, 1, 5)),
            prepared: date(2026, 10, 18),
            quote: None,
            route: None,
        }
        .render()
        .expect("render");

        assert!(text.contains("Job (no reference)"));
        assert!(text.contains("already passed"));
        assert!(!text.contains("Products"));
    }

    #[test]
    fn drive_time_rounds_to_minutes() {
        assert_eq!(drive_time(312.6), "5h 13m");
        assert_eq!(drive_time(59.7), "1h 00m");
        assert_eq!(drive_time(0.0), "0h 00m");
    }
}
