//! Existence-only catalog of route structures.
//!
//! Commands reference structures, sounds and textures by index or file name.
//! The compiler never loads any of them; it only asks whether a reference
//! resolves. A [`CatalogBuilder`] collects the known indices and freezes them
//! into an immutable [`Catalog`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Kind of an indexed structure set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StructureKind {
    Rail,
    Ground,
    WallL,
    WallR,
    DikeL,
    DikeR,
    FormL,
    FormR,
    FormCL,
    FormCR,
    RoofL,
    RoofR,
    RoofCL,
    RoofCR,
    CrackL,
    CrackR,
    FreeObj,
    Beacon,
    Background,
    Weather,
    TimetableDay,
    TimetableNight,
    DynamicLight,
}

/// Number of compatibility signal objects available when none are declared.
pub const DEFAULT_COMPATIBILITY_SIGNALS: usize = 9;

/// Pole type 0 exists for zero to three additional rails without a manifest.
const DEFAULT_POLE_SPANS: usize = 4;

/// Builder for constructing an immutable [`Catalog`].
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    structures: BTreeMap<StructureKind, BTreeSet<usize>>,
    poles: Vec<BTreeSet<usize>>,
    rail_cycles: BTreeMap<usize, Vec<usize>>,
    ground_cycles: BTreeMap<usize, Vec<usize>>,
    signals: BTreeSet<usize>,
    compatibility_signals: usize,
    files: BTreeSet<String>,
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self {
            structures: BTreeMap::new(),
            poles: (0..DEFAULT_POLE_SPANS)
                .map(|_| BTreeSet::from([0]))
                .collect(),
            rail_cycles: BTreeMap::new(),
            ground_cycles: BTreeMap::new(),
            signals: BTreeSet::new(),
            compatibility_signals: DEFAULT_COMPATIBILITY_SIGNALS,
            files: BTreeSet::new(),
        }
    }

    pub fn structure(&mut self, kind: StructureKind, index: usize) -> &mut Self {
        self.structures.entry(kind).or_default().insert(index);
        self
    }

    pub fn structures(
        &mut self,
        kind: StructureKind,
        indices: impl IntoIterator<Item = usize>,
    ) -> &mut Self {
        self.structures.entry(kind).or_default().extend(indices);
        self
    }

    /// Registers pole type `index` for poles spanning `additional_rails` extra rails.
    pub fn pole(&mut self, additional_rails: usize, index: usize) -> &mut Self {
        if self.poles.len() <= additional_rails {
            self.poles.resize_with(additional_rails + 1, BTreeSet::new);
        }
        self.poles[additional_rails].insert(index);
        self
    }

    pub fn rail_cycle(&mut self, index: usize, rail_types: Vec<usize>) -> &mut Self {
        self.rail_cycles.insert(index, rail_types);
        self
    }

    pub fn ground_cycle(&mut self, index: usize, grounds: Vec<usize>) -> &mut Self {
        self.ground_cycles.insert(index, grounds);
        self
    }

    pub fn signal(&mut self, index: usize) -> &mut Self {
        self.signals.insert(index);
        self
    }

    pub fn compatibility_signals(&mut self, count: usize) -> &mut Self {
        self.compatibility_signals = count;
        self
    }

    /// Marks a file path as present on disk.
    pub fn file(&mut self, path: impl Into<String>) -> &mut Self {
        self.files.insert(normalize_path(&path.into()));
        self
    }

    /// Finalize into the immutable catalog.
    pub fn build(self) -> Catalog {
        // Empty cycles never resolve; drop them so lookups can index [0].
        let rail_cycles = self
            .rail_cycles
            .into_iter()
            .filter(|(_, c)| !c.is_empty())
            .collect();
        let ground_cycles = self
            .ground_cycles
            .into_iter()
            .filter(|(_, c)| !c.is_empty())
            .collect();
        Catalog {
            structures: self.structures,
            poles: self.poles,
            rail_cycles,
            ground_cycles,
            signals: self.signals,
            compatibility_signals: self.compatibility_signals,
            files: self.files,
        }
    }
}

/// Immutable catalog. Frozen after [`CatalogBuilder::build`]. Safe to share
/// between concurrent compiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    structures: BTreeMap<StructureKind, BTreeSet<usize>>,
    poles: Vec<BTreeSet<usize>>,
    rail_cycles: BTreeMap<usize, Vec<usize>>,
    ground_cycles: BTreeMap<usize, Vec<usize>>,
    signals: BTreeSet<usize>,
    compatibility_signals: usize,
    files: BTreeSet<String>,
}

impl Default for Catalog {
    fn default() -> Self {
        CatalogBuilder::new().build()
    }
}

impl Catalog {
    pub fn has(&self, kind: StructureKind, index: usize) -> bool {
        self.structures
            .get(&kind)
            .is_some_and(|set| set.contains(&index))
    }

    pub fn count(&self, kind: StructureKind) -> usize {
        self.structures.get(&kind).map_or(0, BTreeSet::len)
    }

    pub fn has_rail(&self, index: usize) -> bool {
        self.has(StructureKind::Rail, index)
    }

    pub fn has_free_object(&self, index: usize) -> bool {
        self.has(StructureKind::FreeObj, index)
    }

    pub fn has_beacon(&self, index: usize) -> bool {
        self.has(StructureKind::Beacon, index)
    }

    pub fn has_pole(&self, additional_rails: usize, index: usize) -> bool {
        self.poles
            .get(additional_rails)
            .is_some_and(|set| set.contains(&index))
    }

    /// True when any pole type spans `additional_rails` extra rails.
    pub fn has_pole_set(&self, additional_rails: usize) -> bool {
        self.poles
            .get(additional_rails)
            .is_some_and(|set| !set.is_empty())
    }

    pub fn rail_cycle(&self, index: usize) -> Option<&[usize]> {
        self.rail_cycles.get(&index).map(Vec::as_slice)
    }

    pub fn ground_cycle(&self, index: usize) -> Option<&[usize]> {
        self.ground_cycles.get(&index).map(Vec::as_slice)
    }

    pub fn has_signal(&self, index: usize) -> bool {
        self.signals.contains(&index)
    }

    pub fn compatibility_signal_count(&self) -> usize {
        self.compatibility_signals
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.files.contains(&normalize_path(path))
    }
}

/// Route files mix `\` and `/` and are matched case-insensitively.
fn normalize_path(path: &str) -> String {
    path.trim().replace('\\', "/").to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_builder() -> CatalogBuilder {
        let mut b = CatalogBuilder::new();
        b.structures(StructureKind::Rail, [0, 1, 2])
            .structure(StructureKind::FreeObj, 4)
            .pole(2, 1)
            .pole(5, 2)
            .rail_cycle(0, vec![1, 2])
            .rail_cycle(1, vec![])
            .file("Sounds\\Bell.wav");
        b
    }

    #[test]
    fn register_and_build() {
        let cat = setup_builder().build();
        assert!(cat.has_rail(2));
        assert!(!cat.has_rail(3));
        assert!(cat.has_free_object(4));
        assert_eq!(cat.count(StructureKind::Rail), 3);
        assert_eq!(cat.count(StructureKind::Ground), 0);
    }

    #[test]
    fn poles_are_keyed_by_additional_rails() {
        let cat = setup_builder().build();
        assert!(cat.has_pole(0, 0));
        assert!(cat.has_pole(3, 0));
        assert!(cat.has_pole(2, 1));
        assert!(cat.has_pole(5, 2));
        assert!(!cat.has_pole(1, 1));
        assert!(!cat.has_pole(4, 0));
        assert!(!cat.has_pole(7, 0));
        assert!(cat.has_pole_set(5));
        assert!(!cat.has_pole_set(4));
    }

    #[test]
    fn empty_cycles_are_dropped() {
        let cat = setup_builder().build();
        assert_eq!(cat.rail_cycle(0), Some(&[1, 2][..]));
        assert_eq!(cat.rail_cycle(1), None);
    }

    #[test]
    fn file_lookup_ignores_case_and_separator() {
        let cat = setup_builder().build();
        assert!(cat.has_file("sounds/bell.wav"));
        assert!(!cat.has_file("sounds/horn.wav"));
    }

    #[test]
    fn default_has_compatibility_signals() {
        let cat = Catalog::default();
        assert_eq!(cat.compatibility_signal_count(), DEFAULT_COMPATIBILITY_SIGNALS);
    }
}
