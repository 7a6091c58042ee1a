//! Serde structs for catalog manifests.
//!
//! A manifest lists which structure indices, cycles, signals and files a
//! route may reference. It is deserialized from RON, JSON or TOML and then
//! frozen into a [`Catalog`].

use serde::Deserialize;
use trackway_core::catalog::{Catalog, CatalogBuilder, StructureKind};

// ===========================================================================
// Manifest
// ===========================================================================

/// Top-level catalog manifest. Every section may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogData {
    pub structures: Vec<StructureSetData>,
    pub poles: Vec<PoleData>,
    pub rail_cycles: Vec<CycleData>,
    pub ground_cycles: Vec<CycleData>,
    pub signals: Vec<usize>,
    /// Overrides the built-in count of compatibility signal objects.
    pub compatibility_signals: Option<usize>,
    /// Paths of files that exist, such as station XML files.
    pub files: Vec<String>,
}

/// Indices available for one structure kind.
#[derive(Debug, Clone, Deserialize)]
pub struct StructureSetData {
    pub kind: StructureKind,
    pub indices: Vec<usize>,
}

/// A pole object for a given number of additional rails.
#[derive(Debug, Clone, Deserialize)]
pub struct PoleData {
    pub additional_rails: usize,
    pub index: usize,
}

/// A rail or ground cycle: the index and the members it cycles through.
#[derive(Debug, Clone, Deserialize)]
pub struct CycleData {
    pub index: usize,
    pub members: Vec<usize>,
}

impl CatalogData {
    pub fn into_builder(self) -> CatalogBuilder {
        let mut builder = CatalogBuilder::new();
        for set in self.structures {
            builder.structures(set.kind, set.indices);
        }
        for pole in self.poles {
            builder.pole(pole.additional_rails, pole.index);
        }
        for cycle in self.rail_cycles {
            builder.rail_cycle(cycle.index, cycle.members);
        }
        for cycle in self.ground_cycles {
            builder.ground_cycle(cycle.index, cycle.members);
        }
        for signal in self.signals {
            builder.signal(signal);
        }
        if let Some(count) = self.compatibility_signals {
            builder.compatibility_signals(count);
        }
        for file in self.files {
            builder.file(file);
        }
        builder
    }

    pub fn into_catalog(self) -> Catalog {
        self.into_builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_manifest_matches_default_catalog() {
        let data: CatalogData = ron::from_str("()").unwrap();
        assert_eq!(data.into_catalog(), CatalogBuilder::new().build());
    }

    #[test]
    fn manifest_sections_reach_the_catalog() {
        let src = r#"(
            structures: [
                (kind: Rail, indices: [0, 1, 4]),
                (kind: FreeObj, indices: [7]),
            ],
            poles: [(additional_rails: 1, index: 2)],
            rail_cycles: [(index: 3, members: [0, 1])],
            signals: [5],
            compatibility_signals: Some(4),
            files: ["stations/central.xml"],
        )"#;
        let catalog = ron::from_str::<CatalogData>(src).unwrap().into_catalog();
        assert!(catalog.has_rail(4));
        assert!(!catalog.has_rail(2));
        assert!(catalog.has_free_object(7));
        assert!(catalog.has_pole(1, 2));
        assert_eq!(catalog.rail_cycle(3), Some(&[0, 1][..]));
        assert!(catalog.has_signal(5));
        assert_eq!(catalog.compatibility_signal_count(), 4);
        assert!(catalog.has_file("stations/central.xml"));
    }
}
