use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Mapping;

/// One monitored series page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct TrackedSource {
    #[serde(default)]
    pub name: String,
    /// Template hint overriding host-based parser dispatch (`site:` in the library file)
    #[serde(default, rename = "site", skip_serializing_if = "Option::is_none")]
    pub site_hint: Option<String>,
    #[serde(default)]
    pub url: String,
    /// `None` until the first successful observation
    #[serde(
        default,
        deserialize_with = "lenient_chapter",
        serialize_with = "compact_chapter"
    )]
    pub last_chapter: Option<f64>,
    /// Skip the plain HTTP client and render this page in a browser
    #[serde(
        default,
        alias = "force_cloudscraper",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub force_render: bool,
    /// Keys this crate doesn't use (notes, language, ...), written back untouched
    #[serde(flatten)]
    pub extra: Mapping,
}

impl TrackedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_last_chapter(mut self, chapter: f64) -> Self {
        self.last_chapter = Some(chapter);
        self
    }

    pub fn with_site_hint(mut self, hint: impl Into<String>) -> Self {
        self.site_hint = Some(hint.into());
        self
    }

    /// Name for reports, never empty
    pub fn display_name(&self) -> &str {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            "<unnamed>"
        } else {
            trimmed
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChapter {
    Number(f64),
    Text(String),
}

/// Hand-edited libraries carry `54`, `54.1`, `"54,1"`, `""` or `null`.
fn lenient_chapter<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawChapter>::deserialize(deserializer)? {
        Some(RawChapter::Number(v)) => Some(v),
        Some(RawChapter::Text(s)) => crate::chapter::normalize_number(&s),
        None => None,
    })
}

/// Whole chapters are written as `54`, not `54.0`
fn compact_chapter<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => serializer.serialize_i64(*v as i64),
        Some(v) => serializer.serialize_f64(*v),
        None => serializer.serialize_none(),
    }
}

/// `series:` with nothing under it
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<TrackedSource>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<TrackedSource>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The persisted collection of tracked sources.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Library {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub series: Vec<TrackedSource>,
    /// Top-level keys other than `series`
    #[serde(flatten)]
    pub extra: Mapping,
}

impl Library {
    pub fn new(series: Vec<TrackedSource>) -> Self {
        Self {
            series,
            extra: Mapping::new(),
        }
    }
}

/// Result of comparing one freshly observed page against its stored baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationOutcome {
    /// A strictly greater chapter was confirmed; `old` is `None` on bootstrap
    Updated { old: Option<f64>, new: f64 },
    Unchanged { current: f64 },
    ExtractionFailed { reason: String },
    FetchFailed { reason: String },
}

impl ReconciliationOutcome {
    pub fn is_update(&self) -> bool {
        matches!(self, ReconciliationOutcome::Updated { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ReconciliationOutcome::ExtractionFailed { .. } | ReconciliationOutcome::FetchFailed { .. }
        )
    }
}

/// An outcome tied to the source it was produced for, as handed to the reporter.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOutcome {
    pub name: String,
    pub url: String,
    pub outcome: ReconciliationOutcome,
}
