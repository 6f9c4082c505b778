//! TOML inputs of the command line: application config, catalogue and job files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use jobcost_core::{
    Address, AddressRole, AliasMapping, CatalogueEntry, ProductLineInput, Settings,
    config::expand_env,
};
use jobcost_provider_static::DistanceEntry;

/// `jobcost.toml`: the core settings plus the provider wiring.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct AppConfig {
    #[serde(flatten)]
    pub(crate) settings: Settings,
    #[serde(default)]
    pub(crate) providers: ProviderSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum DistanceBackend {
    #[default]
    Google,
    Table,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProviderSettings {
    #[serde(default)]
    pub(crate) distance: DistanceBackend,
    #[serde(default)]
    pub(crate) google: GoogleSettings,
    /// `[[providers.distances]]`, used by the `table` backend.
    #[serde(default)]
    pub(crate) distances: Vec<DistanceEntry>,
    #[serde(default)]
    pub(crate) zones: ZoneSettings,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GoogleSettings {
    pub(crate) api_key: Option<String>,
    pub(crate) base_url: Option<String>,
}

impl GoogleSettings {
    /// The API key, unless absent or still an unexpanded `${VAR}` placeholder.
    pub(crate) fn api_key(&self) -> Result<&str> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() && !key.starts_with("${") => Ok(key),
            _ => bail!("providers.google.api_key is not set"),
        }
    }
}

/// District lists replacing the built-in London ones.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ZoneSettings {
    pub(crate) congestion: Option<Vec<String>>,
    pub(crate) emission_zone: Option<Vec<String>>,
}

/// Catalogue export: `[[products]]` and `[[aliases]]`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CatalogueFile {
    #[serde(default)]
    pub(crate) products: Vec<CatalogueEntry>,
    #[serde(default)]
    pub(crate) aliases: Vec<AliasMapping>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StopEntry {
    label: Option<String>,
    postcode: String,
}

impl StopEntry {
    fn address(&self, role: AddressRole) -> Result<Address> {
        let label = self.label.clone().unwrap_or_else(|| role.to_string());
        Address::new(label, &self.postcode, role)
            .with_context(|| format!("invalid {role} address"))
    }
}

/// One job: where it is, when, and what gets installed.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct JobFile {
    pub(crate) reference: Option<String>,
    /// Written as a quoted ISO date, e.g. `"2026-11-02"`.
    pub(crate) date: Option<NaiveDate>,
    site: Option<StopEntry>,
    collection: Option<StopEntry>,
    #[serde(default)]
    pub(crate) lines: Vec<ProductLineInput>,
}

impl JobFile {
    pub(crate) fn site(&self) -> Result<Option<Address>> {
        self.site
            .as_ref()
            .map(|stop| stop.address(AddressRole::Site))
            .transpose()
    }

    pub(crate) fn collection(&self) -> Result<Option<Address>> {
        self.collection
            .as_ref()
            .map(|stop| stop.address(AddressRole::Collection))
            .transpose()
    }
}

pub(crate) fn load_config(path: &Path) -> Result<AppConfig> {
    load(path, "configuration")
}

pub(crate) fn load_catalogue(path: &Path) -> Result<CatalogueFile> {
    load(path, "catalogue")
}

pub(crate) fn load_job(path: &Path) -> Result<JobFile> {
    load(path, "job")
}

fn load<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} file {}", path.display()))?;
    toml::from_str(&expand_env(&content))
        .with_context(|| format!("failed to parse {what} file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write");
        file
    }

    #[test]
    fn config_keeps_core_settings_and_providers() {
        let file = write_temp(
            r#"
[route]
base_postcode = "SE1 4AA"
congestion_fee = 15.0

[providers]
distance = "table"

[[providers.distances]]
from = "SE1 4AA"
to = "B1 1RS"
miles = 120.0
minutes = 150.0

[providers.zones]
congestion = ["EC1", "SE1"]
"#,
        );

        let config = load_config(file.path()).expect("config");
        assert_eq!(config.settings.route.congestion_fee, Some(15.0));
        assert_eq!(config.providers.distance, DistanceBackend::Table);
        assert_eq!(config.providers.distances.len(), 1);
        assert_eq!(
            config.providers.zones.congestion.as_deref(),
            Some(&["EC1".to_owned(), "SE1".to_owned()][..])
        );
        assert!(config.providers.zones.emission_zone.is_none());
    }

    #[test]
    fn unexpanded_api_key_counts_as_missing() {
        let google = GoogleSettings {
            api_key: Some("${JOBCOST_TEST_UNSET_KEY}".to_owned()),
            base_url: None,
        };
        assert!(google.api_key().is_err());

        let google = GoogleSettings {
            api_key: Some("abc123".to_owned()),
            base_url: None,
        };
        assert_eq!(google.api_key().expect("key"), "abc123");
    }

    #[test]
    fn job_file_builds_addresses_and_lines() {
        let file = write_temp(
            r#"
reference = "Q-1042"
date = "2026-11-02"

[site]
label = "Birmingham office"
postcode = "b1 1rs"

[collection]
postcode = "SE1 3ER"

[[lines]]
product_code = "FLX-4P-2816-A"
quantity = 10

[[lines]]
description = "Operator chair"
quantity = 20
manual_install_hours = 0.5
"#,
        );

        let job = load_job(file.path()).expect("job");
        assert_eq!(job.date, NaiveDate::from_ymd_opt(2026, 11, 2));
        assert_eq!(job.lines.len(), 2);

        let site = job.site().expect("valid site").expect("site present");
        assert_eq!(site.postcode.as_str(), "B1 1RS");
        assert_eq!(site.label, "Birmingham office");

        let collection = job
            .collection()
            .expect("valid collection")
            .expect("collection present");
        assert_eq!(collection.label, "collection");
    }

    #[test]
    fn malformed_site_postcode_is_an_error() {
        let job: JobFile = toml::from_str("[site]\npostcode = \"nowhere\"").expect("parses");
        assert!(job.site().is_err());
        assert!(job.collection().expect("absent is fine").is_none());
    }

    #[test]
    fn missing_file_names_the_input() {
        let error = load_catalogue(Path::new("/nonexistent/catalogue.toml"))
            .expect_err("missing file");
        assert!(error.to_string().contains("catalogue file"));
    }
}
