
use crate::data_types::taxon::TaxId;

/// One mass observation from a truth or predicted profile
#[derive(Clone, Debug, PartialEq)]
pub struct AbundanceEntry {
    /// The taxon the mass was reported for
    pub taxid: TaxId,
    /// The rank the reporting tool asserted for this taxon; None means the rank must be looked up
    pub rank: Option<String>,
    /// Read count, percentage, or fraction; only relative values matter
    pub mass: f64,
}

impl AbundanceEntry {
    /// Entry whose rank will be resolved through the taxonomy
    pub fn unranked(taxid: TaxId, mass: f64) -> Self {
        Self { taxid, rank: None, mass }
    }

    /// Entry that is only counted at the rank the tool reported
    pub fn ranked(taxid: TaxId, rank: &str, mass: f64) -> Self {
        Self { taxid, rank: Some(rank.to_string()), mass }
    }
}

/// A `taxon -> mass` profile plus the mass that could not be tied to any taxon
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AbundanceProfile {
    /// All entries, in input order
    entries: Vec<AbundanceEntry>,
    /// Mass of inputs that never resolved to a taxid, e.g. unknown species names or genome files
    unresolved_mass: f64,
    /// Number of inputs that contributed to `unresolved_mass`
    unresolved_count: u64,
}

impl AbundanceProfile {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry; non-positive or non-finite masses are ignored
    pub fn push(&mut self, entry: AbundanceEntry) {
        if entry.mass.is_finite() && entry.mass > 0.0 {
            self.entries.push(entry);
        }
    }

    /// Adds mass that could not be resolved to a taxon
    pub fn add_unresolved(&mut self, mass: f64) {
        if mass.is_finite() && mass > 0.0 {
            self.unresolved_mass += mass;
        }
        self.unresolved_count += 1;
    }

    /// Sum of resolved and unresolved mass
    pub fn total_mass(&self) -> f64 {
        self.entries.iter().map(|e| e.mass).sum::<f64>() + self.unresolved_mass
    }

    /// True if the profile carries no mass at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.unresolved_mass == 0.0
    }

    // getters
    pub fn entries(&self) -> &[AbundanceEntry] {
        &self.entries
    }

    pub fn unresolved_mass(&self) -> f64 {
        self.unresolved_mass
    }

    pub fn unresolved_count(&self) -> u64 {
        self.unresolved_count
    }
}
