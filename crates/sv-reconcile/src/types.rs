use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use sv_schemas::ObjectInfo;

// ---------------------------------------------------------------------------
// Expectations
// ---------------------------------------------------------------------------

/// One thing a run declares must be checked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExpectationSpec {
    /// An exact object name. No date substitution is ever applied.
    Exact { key: String },
    /// Every object whose name starts with `prefix`.
    Prefix {
        prefix: String,
        must_match_at_least_one: bool,
    },
}

impl ExpectationSpec {
    pub fn exact(key: impl Into<String>) -> Self {
        ExpectationSpec::Exact { key: key.into() }
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        ExpectationSpec::Prefix {
            prefix: prefix.into(),
            must_match_at_least_one: true,
        }
    }

    /// A prefix that may legitimately match nothing.
    pub fn optional_prefix(prefix: impl Into<String>) -> Self {
        ExpectationSpec::Prefix {
            prefix: prefix.into(),
            must_match_at_least_one: false,
        }
    }

    /// The key or prefix text this expectation is reported under.
    pub fn label(&self) -> &str {
        match self {
            ExpectationSpec::Exact { key } => key,
            ExpectationSpec::Prefix { prefix, .. } => prefix,
        }
    }
}

/// The full set of expectations for one run. Immutable once resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpectationSet {
    /// Point-in-time presence checks, in declaration order.
    ///
    /// `modified_after` restricts which SOURCE objects are considered when
    /// matching prefixes. It never applies to the target side.
    Specs {
        specs: Vec<ExpectationSpec>,
        modified_after: Option<DateTime<Utc>>,
    },
    /// Enumerate everything modified after `modified_after` on both sides.
    Inventory {
        lookback_days: u32,
        modified_after: DateTime<Utc>,
    },
}

impl ExpectationSet {
    pub fn is_inventory(&self) -> bool {
        matches!(self, ExpectationSet::Inventory { .. })
    }

    pub fn specs(&self) -> &[ExpectationSpec] {
        match self {
            ExpectationSet::Specs { specs, .. } => specs,
            ExpectationSet::Inventory { .. } => &[],
        }
    }

    /// Exact keys in declaration order.
    pub fn exact_keys(&self) -> Vec<&str> {
        self.specs()
            .iter()
            .filter_map(|s| match s {
                ExpectationSpec::Exact { key } => Some(key.as_str()),
                ExpectationSpec::Prefix { .. } => None,
            })
            .collect()
    }

    /// `true` when at least one prefix expectation needs full listings.
    pub fn needs_listings(&self) -> bool {
        match self {
            ExpectationSet::Inventory { .. } => true,
            ExpectationSet::Specs { specs, .. } => specs
                .iter()
                .any(|s| matches!(s, ExpectationSpec::Prefix { .. })),
        }
    }

    pub fn modified_after(&self) -> Option<DateTime<Utc>> {
        match self {
            ExpectationSet::Specs { modified_after, .. } => *modified_after,
            ExpectationSet::Inventory { modified_after, .. } => Some(*modified_after),
        }
    }
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// Result of looking one key up in a side's observations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup<'a> {
    Present(&'a ObjectInfo),
    Absent,
    Failed(&'a str),
}

/// Everything one store revealed for the run, fully materialized.
///
/// Built by the runtime from normalized listings and/or per-key probes.
/// `failures` holds per-key probe errors; `listing_failure` means the whole
/// listing could not be obtained, so no key on this side can be trusted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SideObservations {
    pub objects: BTreeMap<String, ObjectInfo>,
    pub failures: BTreeMap<String, String>,
    pub listing_failure: Option<String>,
}

impl SideObservations {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_listing(listing: impl IntoIterator<Item = ObjectInfo>) -> Self {
        let mut s = Self::empty();
        for o in listing {
            s.insert(o);
        }
        s
    }

    pub fn listing_failed(error: impl Into<String>) -> Self {
        Self {
            listing_failure: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn insert(&mut self, obj: ObjectInfo) {
        self.objects.insert(obj.name.clone(), obj);
    }

    pub fn record_failure(&mut self, key: impl Into<String>, error: impl Into<String>) {
        self.failures.insert(key.into(), error.into());
    }

    pub fn lookup(&self, key: &str) -> Lookup<'_> {
        if let Some(err) = self.failures.get(key) {
            return Lookup::Failed(err);
        }
        if let Some(err) = &self.listing_failure {
            return Lookup::Failed(err);
        }
        match self.objects.get(key) {
            Some(o) if o.exists() => Lookup::Present(o),
            _ => Lookup::Absent,
        }
    }

    /// Present objects whose name starts with `prefix`, in name order.
    pub fn present_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = &'a ObjectInfo> + 'a {
        self.objects
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(name, _)| name.starts_with(prefix))
            .map(|(_, o)| o)
            .filter(|o| o.exists())
    }

    pub fn present(&self) -> impl Iterator<Item = &ObjectInfo> {
        self.objects.values().filter(|o| o.exists())
    }
}

// ---------------------------------------------------------------------------
// Discrepancies
// ---------------------------------------------------------------------------

/// Discrepancy taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscrepancyKind {
    MissingInSource,
    MissingInTarget,
    SizeMismatch,
    ZeroSizeInSource,
    ZeroSizeInTarget,
    TransientError,
}

impl DiscrepancyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyKind::MissingInSource => "MISSING_IN_SOURCE",
            DiscrepancyKind::MissingInTarget => "MISSING_IN_TARGET",
            DiscrepancyKind::SizeMismatch => "SIZE_MISMATCH",
            DiscrepancyKind::ZeroSizeInSource => "ZERO_SIZE_IN_SOURCE",
            DiscrepancyKind::ZeroSizeInTarget => "ZERO_SIZE_IN_TARGET",
            DiscrepancyKind::TransientError => "TRANSIENT_ERROR",
        }
    }
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified difference between source and target state for one key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    pub key: String,
    pub detail: BTreeMap<String, String>,
}

impl Discrepancy {
    pub fn new(kind: DiscrepancyKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
            detail: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: impl ToString) -> Self {
        self.detail.insert(field.to_string(), value.to_string());
        self
    }

    /// `KIND: key | field=value | ...` with detail fields in name order.
    pub fn render_line(&self) -> String {
        let mut line = format!("{}: {}", self.kind, self.key);
        for (k, v) in &self.detail {
            line.push_str(&format!(" | {k}={v}"));
        }
        line
    }
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// One side of a weekly inventory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideInventory {
    pub object_count: usize,
    pub total_bytes: u64,
    pub objects: Vec<ObjectInfo>,
    /// Listing failure, if the side could not be enumerated. Informational.
    pub listing_failure: Option<String>,
}

impl SideInventory {
    pub fn from_observations(obs: &SideObservations) -> Self {
        let objects: Vec<ObjectInfo> = obs.present().cloned().collect();
        Self {
            object_count: objects.len(),
            total_bytes: objects.iter().filter_map(|o| o.size).sum(),
            objects,
            listing_failure: obs.listing_failure.clone(),
        }
    }
}

/// Informational pair returned by inventory runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub lookback_days: u32,
    pub modified_after: DateTime<Utc>,
    pub union_count: usize,
    /// Names present in the source window but not in the target window.
    pub source_only: usize,
    /// Names present in the target window but not in the source window.
    pub target_only: usize,
    pub source: SideInventory,
    pub target: SideInventory,
}

// ---------------------------------------------------------------------------
// Reconciliation output
// ---------------------------------------------------------------------------

/// Output of the engine for one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconciliation {
    /// Number of evaluated keys (or prefixes reported as a whole).
    pub checked: usize,
    /// Insertion-ordered: expectation order, then source-before-target checks.
    pub discrepancies: Vec<Discrepancy>,
    /// Every evaluated key or prefix, in evaluation order. `checked == evaluated.len()`.
    pub evaluated: Vec<String>,
    /// Present only for inventory runs.
    pub inventory: Option<InventorySummary>,
}

impl Reconciliation {
    pub fn empty() -> Self {
        Self {
            checked: 0,
            discrepancies: Vec::new(),
            evaluated: Vec::new(),
            inventory: None,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }

    pub fn count_of(&self, kind: DiscrepancyKind) -> usize {
        self.discrepancies.iter().filter(|d| d.kind == kind).count()
    }
}
