use std::path::{Path, PathBuf};

/// Canonical species identifier: lowercase, whitespace and underscores
/// collapsed into single `_` separators.
///
/// `"Quercus robur"`, `"quercus_robur"` and `"Quercus  Robur"` all map to
/// `"quercus_robur"`.
pub fn normalize_species(name: &str) -> String {
    name.split(|c: char| c.is_whitespace() || c == '_')
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Per-species output directory under `results_dir`.
pub fn species_dir(results_dir: &Path, species: &str) -> PathBuf { results_dir.join(normalize_species(species)) }

pub const CANDIDATES_FILE: &str = "candidates.geojson";
pub const OCCURRENCES_FILE: &str = "occurrences.geojson";
pub const MODEL_FILE: &str = "model.json";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spellings_collapse_to_one_slug() {
        for name in ["Quercus robur", "quercus_robur", "Quercus  Robur", "  QUERCUS \t robur ", "quercus__robur"] {
            assert_eq!(normalize_species(name), "quercus_robur", "{name:?}");
        }
    }

    #[test]
    fn species_dir_uses_slug() {
        assert_eq!(species_dir(Path::new("out"), "Adansonia digitata"), PathBuf::from("out/adansonia_digitata"));
    }
}
