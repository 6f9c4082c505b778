//! Matching raw product text against an immutable catalogue snapshot.
//!
//! Matching runs an ordered list of matchers (exact key, alias, then one structural matcher per
//! product family). Each matcher looks at the product code first and the description second;
//! the first hit wins. Anything left over is reported as unresolved.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CatalogueError;
use crate::model::{AliasMapping, CatalogueEntry, MatchConfidence, ResolvedLine, ResolvedProduct};

/// Reason attached to lines nothing in the catalogue matches.
pub const UNRESOLVED_REASON: &str = "no catalogue or alias match";

/// Canonical comparable form: uppercase, without whitespace, hyphens, underscores or parentheses.
///
/// Applying it twice gives the same result as applying it once.
#[must_use]
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|ch| !ch.is_whitespace() && !matches!(ch, '-' | '_' | '(' | ')'))
        .flat_map(char::to_uppercase)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Structural description of a product family such as `FLX-4P-2816-A`.
pub struct FamilyPattern {
    /// Leading family token, e.g. `FLX`.
    pub family: String,
    /// Letters following the variant number, e.g. `P` in `4P`.
    #[serde(default = "default_suffix")]
    pub suffix: String,
    /// Key template tried first when a 4-digit size token is present.
    #[serde(default = "default_sized_template")]
    pub sized_template: Option<String>,
    /// Key templates tried in order otherwise (or when the sized key is absent).
    #[serde(default = "default_templates")]
    pub templates: Vec<String>,
}

impl FamilyPattern {
    /// Pattern with the default key templates.
    #[must_use]
    pub fn new<F: Into<String>, S: Into<String>>(family: F, suffix: S) -> Self {
        Self {
            family: family.into(),
            suffix: suffix.into(),
            sized_template: default_sized_template(),
            templates: default_templates(),
        }
    }
}

fn default_suffix() -> String {
    "P".to_owned()
}

#[expect(
    clippy::unnecessary_wraps,
    reason = "serde default for an optional field"
)]
fn default_sized_template() -> Option<String> {
    Some("{family}-VARIANT-{variant}-L{size}".to_owned())
}

fn default_templates() -> Vec<String> {
    vec![
        "{family} {variant}".to_owned(),
        "{variant} {family}".to_owned(),
        "{family}-{variant}".to_owned(),
    ]
}

/// Variant extracted from a family code.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FamilyCode {
    variant: String,
    size: Option<String>,
}

#[derive(Debug, Clone)]
struct FamilyMatcher {
    pattern: FamilyPattern,
    family: String,
    variant_re: Regex,
}

impl FamilyMatcher {
    fn compile(pattern: FamilyPattern) -> Result<Self, CatalogueError> {
        let family = pattern.family.trim().to_uppercase();
        if family.is_empty() {
            return Err(CatalogueError::InvalidFamily {
                family: pattern.family,
                reason: "family token is empty".to_owned(),
            });
        }
        let suffix = pattern.suffix.trim().to_uppercase();

        let source = format!(
            r"(?:^|[^A-Z0-9]){}[-_\s]*([0-9]+){}(?:[^A-Z]|$)",
            regex::escape(&family),
            regex::escape(&suffix)
        );
        let variant_re = Regex::new(&source).map_err(|err| CatalogueError::InvalidFamily {
            family: pattern.family.clone(),
            reason: err.to_string(),
        })?;

        Ok(Self {
            pattern,
            family,
            variant_re,
        })
    }

    /// Pull the variant (and optional size) out of `raw`; `None` when no variant digit follows
    /// the family token.
    fn extract(&self, raw: &str) -> Option<FamilyCode> {
        let upper = raw.to_uppercase();
        let captures = self.variant_re.captures(&upper)?;
        let digits = captures.get(1)?.as_str();
        let whole = captures.get(0)?;

        let suffix = self.pattern.suffix.trim().to_uppercase();
        let rest = upper.get(whole.end().saturating_sub(1)..).unwrap_or_default();
        let size = size_token(rest);

        Some(FamilyCode {
            variant: format!("{digits}{suffix}"),
            size,
        })
    }

    fn candidate_keys(&self, code: &FamilyCode) -> Vec<String> {
        let fill = |template: &str, size: &str| {
            template
                .replace("{family}", &self.family)
                .replace("{variant}", &code.variant)
                .replace("{size}", size)
        };

        let mut candidates = Vec::with_capacity(self.pattern.templates.len() + 1);
        if let (Some(size), Some(template)) = (&code.size, &self.pattern.sized_template) {
            candidates.push(fill(template, size));
        }
        candidates.extend(
            self.pattern
                .templates
                .iter()
                .map(|template| fill(template, "")),
        );
        candidates
    }
}

/// First standalone 4-digit number in `text`.
fn size_token(text: &str) -> Option<String> {
    text.split(|ch: char| !ch.is_ascii_digit())
        .find(|token| token.len() == 4)
        .map(str::to_owned)
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact,
    Alias,
    Family(Box<FamilyMatcher>),
}

/// Read-only view of the catalogue and alias table for one call context.
#[derive(Debug, Clone)]
pub struct CatalogueSnapshot {
    entries: Vec<CatalogueEntry>,
    by_key: HashMap<String, usize>,
    by_alias: HashMap<String, usize>,
    matchers: Vec<Matcher>,
}

impl CatalogueSnapshot {
    /// Index entries, aliases and family patterns.
    ///
    /// Aliases pointing at unknown keys are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogueError`] for duplicate keys, negative numbers or invalid families.
    pub fn new(
        entries: Vec<CatalogueEntry>,
        aliases: Vec<AliasMapping>,
        families: Vec<FamilyPattern>,
    ) -> Result<Self, CatalogueError> {
        let mut by_key: HashMap<String, usize> = HashMap::with_capacity(entries.len());

        for (index, entry) in entries.iter().enumerate() {
            validate_entry(entry)?;
            match by_key.entry(normalize(&entry.key)) {
                Entry::Occupied(existing) => {
                    let existing_key = entries
                        .get(*existing.get())
                        .map(|other| other.key.clone())
                        .unwrap_or_default();
                    return Err(CatalogueError::DuplicateKey {
                        key: entry.key.clone(),
                        existing: existing_key,
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(index);
                }
            }
        }

        let mut by_alias: HashMap<String, usize> = HashMap::with_capacity(aliases.len());
        for mapping in aliases {
            let Some(&target) = by_key.get(&normalize(&mapping.key)) else {
                tracing::warn!(
                    alias = %mapping.alias,
                    key = %mapping.key,
                    "dropping alias for unknown catalogue key"
                );
                continue;
            };
            let alias_key = normalize(&mapping.alias);
            if alias_key.is_empty() {
                continue;
            }
            // Exact matching runs first, so such an alias could never be reached.
            if by_key.get(&alias_key).is_some_and(|&index| index != target) {
                tracing::warn!(
                    alias = %mapping.alias,
                    key = %mapping.key,
                    "dropping alias that spells another catalogue key"
                );
                continue;
            }
            match by_alias.entry(alias_key) {
                Entry::Occupied(existing) if *existing.get() != target => {
                    tracing::warn!(
                        alias = %mapping.alias,
                        key = %mapping.key,
                        "alias already mapped to a different key, keeping the first"
                    );
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(target);
                }
            }
        }

        let mut matchers = vec![Matcher::Exact, Matcher::Alias];
        for family in families {
            matchers.push(Matcher::Family(Box::new(FamilyMatcher::compile(family)?)));
        }

        tracing::debug!(
            entries = entries.len(),
            aliases = by_alias.len(),
            matchers = matchers.len(),
            "catalogue snapshot built"
        );

        Ok(Self {
            entries,
            by_key,
            by_alias,
            matchers,
        })
    }

    /// Number of catalogue entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in load order.
    #[must_use]
    pub fn entries(&self) -> &[CatalogueEntry] {
        &self.entries
    }

    /// Look up an entry by key in any spelling.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&CatalogueEntry> {
        self.by_key
            .get(&normalize(key))
            .and_then(|&index| self.entries.get(index))
    }

    /// Match raw product text; see [`resolve`].
    #[must_use]
    pub fn resolve(&self, raw_code: &str, raw_description: &str) -> ResolvedLine {
        resolve(raw_code, raw_description, self)
    }

    fn try_matcher(&self, matcher: &Matcher, raw: &str) -> Option<(usize, MatchConfidence)> {
        match matcher {
            Matcher::Exact => self
                .by_key
                .get(&normalize(raw))
                .map(|&index| (index, MatchConfidence::Exact)),
            Matcher::Alias => self
                .by_alias
                .get(&normalize(raw))
                .map(|&index| (index, MatchConfidence::Alias)),
            Matcher::Family(family) => {
                let code = family.extract(raw)?;
                family
                    .candidate_keys(&code)
                    .iter()
                    .find_map(|candidate| self.by_key.get(&normalize(candidate)).copied())
                    .map(|index| (index, MatchConfidence::Pattern))
            }
        }
    }

    fn resolved(&self, index: usize, confidence: MatchConfidence) -> Option<ResolvedProduct> {
        self.entries.get(index).map(|entry| ResolvedProduct {
            canonical_key: entry.key.clone(),
            name: entry.name.clone(),
            category: entry.category.clone(),
            install_time_hours: entry.install_time_hours,
            waste_volume_m3: entry.waste_volume_m3,
            is_heavy: entry.is_heavy,
            confidence,
        })
    }
}

fn validate_entry(entry: &CatalogueEntry) -> Result<(), CatalogueError> {
    let invalid = |reason: &str| CatalogueError::InvalidEntry {
        key: entry.key.clone(),
        reason: reason.to_owned(),
    };

    if normalize(&entry.key).is_empty() {
        return Err(invalid("key is empty"));
    }
    if !entry.install_time_hours.is_finite() || entry.install_time_hours < 0.0 {
        return Err(invalid("install time must be a non-negative number"));
    }
    if !entry.waste_volume_m3.is_finite() || entry.waste_volume_m3 < 0.0 {
        return Err(invalid("waste volume must be a non-negative number"));
    }
    Ok(())
}

/// Match raw product text against `snapshot`.
///
/// Pure and deterministic: the same inputs always give the same outcome.
#[must_use]
pub fn resolve(
    raw_code: &str,
    raw_description: &str,
    snapshot: &CatalogueSnapshot,
) -> ResolvedLine {
    let sources = [raw_code, raw_description];

    for matcher in &snapshot.matchers {
        for raw in sources.iter().filter(|text| !text.trim().is_empty()) {
            if let Some((index, confidence)) = snapshot.try_matcher(matcher, raw)
                && let Some(product) = snapshot.resolved(index, confidence)
            {
                tracing::debug!(
                    code = raw_code,
                    key = %product.canonical_key,
                    %confidence,
                    "resolved product line"
                );
                return ResolvedLine::Resolved(product);
            }
        }
    }

    tracing::debug!(code = raw_code, description = raw_description, "unresolved product line");
    ResolvedLine::Unresolved {
        reason: UNRESOLVED_REASON.to_owned(),
    }
}
