//! Static GPU catalog mapping human-readable display names to the
//! provider's canonical GPU type identifiers.
//!
//! The table mirrors the provider's published GPU types; it is data, not
//! something computed at runtime.

use crate::error::{Error, Result};

/// One catalog entry: canonical provider id plus its display alias
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuCatalogEntry {
    /// Canonical GPU type id as the provider's API expects it
    pub id: &'static str,
    /// Short human-readable name accepted on the command line
    pub display_name: &'static str,
}

pub const GPU_CATALOG: &[GpuCatalogEntry] = &[
    GpuCatalogEntry { id: "AMD Instinct MI300X OAM", display_name: "MI300X" },
    GpuCatalogEntry { id: "NVIDIA A100 80GB PCIe", display_name: "A100 PCIe" },
    GpuCatalogEntry { id: "NVIDIA A100-SXM4-80GB", display_name: "A100 SXM" },
    GpuCatalogEntry { id: "NVIDIA A30", display_name: "A30" },
    GpuCatalogEntry { id: "NVIDIA A40", display_name: "A40" },
    GpuCatalogEntry { id: "NVIDIA B200", display_name: "B200" },
    GpuCatalogEntry { id: "NVIDIA GeForce RTX 3070", display_name: "RTX 3070" },
    GpuCatalogEntry { id: "NVIDIA GeForce RTX 3080", display_name: "RTX 3080" },
    GpuCatalogEntry { id: "NVIDIA GeForce RTX 3080 Ti", display_name: "RTX 3080 Ti" },
    GpuCatalogEntry { id: "NVIDIA GeForce RTX 3090", display_name: "RTX 3090" },
    GpuCatalogEntry { id: "NVIDIA GeForce RTX 3090 Ti", display_name: "RTX 3090 Ti" },
    GpuCatalogEntry { id: "NVIDIA GeForce RTX 4070 Ti", display_name: "RTX 4070 Ti" },
    GpuCatalogEntry { id: "NVIDIA GeForce RTX 4080", display_name: "RTX 4080" },
    GpuCatalogEntry { id: "NVIDIA GeForce RTX 4080 SUPER", display_name: "RTX 4080 SUPER" },
    GpuCatalogEntry { id: "NVIDIA GeForce RTX 4090", display_name: "RTX 4090" },
    GpuCatalogEntry { id: "NVIDIA GeForce RTX 5080", display_name: "RTX 5080" },
    GpuCatalogEntry { id: "NVIDIA GeForce RTX 5090", display_name: "RTX 5090" },
    GpuCatalogEntry { id: "NVIDIA H100 80GB HBM3", display_name: "H100 SXM" },
    GpuCatalogEntry { id: "NVIDIA H100 NVL", display_name: "H100 NVL" },
    GpuCatalogEntry { id: "NVIDIA H100 PCIe", display_name: "H100 PCIe" },
    GpuCatalogEntry { id: "NVIDIA H200", display_name: "H200 SXM" },
    GpuCatalogEntry { id: "NVIDIA L4", display_name: "L4" },
    GpuCatalogEntry { id: "NVIDIA L40", display_name: "L40" },
    GpuCatalogEntry { id: "NVIDIA L40S", display_name: "L40S" },
    GpuCatalogEntry { id: "NVIDIA RTX 2000 Ada Generation", display_name: "RTX 2000 Ada" },
    GpuCatalogEntry { id: "NVIDIA RTX 4000 Ada Generation", display_name: "RTX 4000 Ada" },
    GpuCatalogEntry { id: "NVIDIA RTX 5000 Ada Generation", display_name: "RTX 5000 Ada" },
    GpuCatalogEntry { id: "NVIDIA RTX 6000 Ada Generation", display_name: "RTX 6000 Ada" },
    GpuCatalogEntry { id: "NVIDIA RTX A2000", display_name: "RTX A2000" },
    GpuCatalogEntry { id: "NVIDIA RTX A4000", display_name: "RTX A4000" },
    GpuCatalogEntry { id: "NVIDIA RTX A4500", display_name: "RTX A4500" },
    GpuCatalogEntry { id: "NVIDIA RTX A5000", display_name: "RTX A5000" },
    GpuCatalogEntry { id: "NVIDIA RTX A6000", display_name: "RTX A6000" },
    GpuCatalogEntry {
        id: "NVIDIA RTX PRO 6000 Blackwell Workstation Edition",
        display_name: "RTX PRO 6000",
    },
    GpuCatalogEntry { id: "Tesla V100-FHHL-16GB", display_name: "V100 FHHL" },
    GpuCatalogEntry { id: "Tesla V100-PCIE-16GB", display_name: "Tesla V100" },
    GpuCatalogEntry { id: "Tesla V100-SXM2-16GB", display_name: "V100 SXM2" },
];

/// Resolve a user-supplied GPU name or id to its catalog entry.
///
/// Matching order:
/// 1. exact canonical id
/// 2. case-insensitive exact match on display name or id
/// 3. case-insensitive substring match, accepted only when unambiguous
pub fn resolve(name_or_id: &str) -> Result<&'static GpuCatalogEntry> {
    if let Some(entry) = GPU_CATALOG.iter().find(|e| e.id == name_or_id) {
        return Ok(entry);
    }

    let needle = name_or_id.to_lowercase();
    if let Some(entry) = GPU_CATALOG.iter().find(|e| {
        e.display_name.to_lowercase() == needle || e.id.to_lowercase() == needle
    }) {
        return Ok(entry);
    }

    let matches: Vec<&'static GpuCatalogEntry> = GPU_CATALOG
        .iter()
        .filter(|e| {
            e.display_name.to_lowercase().contains(&needle)
                || e.id.to_lowercase().contains(&needle)
        })
        .collect();

    match matches.as_slice() {
        [] => Err(Error::UnknownGpu(name_or_id.to_string())),
        [entry] => Ok(entry),
        many => Err(Error::AmbiguousGpuName {
            name: name_or_id.to_string(),
            matches: many.iter().map(|e| e.display_name.to_string()).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_alias_resolves_to_canonical_id() {
        let entry = resolve("RTX A4000").unwrap();
        assert_eq!(entry.id, "NVIDIA RTX A4000");
    }

    #[test]
    fn resolving_canonical_id_is_idempotent() {
        for entry in GPU_CATALOG {
            let by_id = resolve(entry.id).unwrap();
            let by_alias = resolve(entry.display_name).unwrap();
            assert_eq!(by_id.id, entry.id);
            assert_eq!(by_alias.id, entry.id);
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let lower = resolve("rtx a4000").unwrap();
        let upper = resolve("RTX A4000").unwrap();
        assert_eq!(lower.id, upper.id);
    }

    #[test]
    fn unambiguous_substring_matches() {
        let entry = resolve("a4500").unwrap();
        assert_eq!(entry.id, "NVIDIA RTX A4500");
    }

    #[test]
    fn ambiguous_substring_is_rejected() {
        match resolve("3080") {
            Err(Error::AmbiguousGpuName { matches, .. }) => {
                assert!(matches.len() >= 2);
                assert!(matches.contains(&"RTX 3080".to_string()));
                assert!(matches.contains(&"RTX 3080 Ti".to_string()));
            }
            other => panic!("expected AmbiguousGpuName, got {other:?}"),
        }
    }

    #[test]
    fn exact_alias_wins_over_substring_ambiguity() {
        // "RTX 3080" is a substring of "RTX 3080 Ti" but matches an alias exactly
        let entry = resolve("RTX 3080").unwrap();
        assert_eq!(entry.id, "NVIDIA GeForce RTX 3080");

        let entry = resolve("A100 PCIe").unwrap();
        assert_eq!(entry.id, "NVIDIA A100 80GB PCIe");
    }

    #[test]
    fn unknown_gpu_is_rejected() {
        match resolve("Quantum Accelerator 9000") {
            Err(Error::UnknownGpu(name)) => assert_eq!(name, "Quantum Accelerator 9000"),
            other => panic!("expected UnknownGpu, got {other:?}"),
        }
    }
}
