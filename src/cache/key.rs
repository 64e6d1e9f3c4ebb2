//! Structured cache keys.
//!
//! A key renders as
//! `"{short}, SOM:{hash}, {width}x{height}, opac:{opacity}"` followed by one
//! `" >> "`-separated section per parameter group, fields inside a section
//! separated by `", "`. Two renders that could differ in any pixel must
//! differ in at least one field.

use std::fmt::{self, Display};

/// An ordered group of `name:value` fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySection {
    fields: Vec<(String, String)>,
}

impl KeySection {
    /// Empty section.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Display) -> Self {
        self.fields.push((name.to_string(), value.to_string()));
        self
    }

    /// Append a field in place.
    pub fn push(&mut self, name: &str, value: impl Display) {
        self.fields.push((name.to_string(), value.to_string()));
    }

    /// Fields in insertion order.
    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// True if no field was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Display for KeySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}:{value}")?;
        }
        Ok(())
    }
}

/// Identity of one cached rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheKey {
    short_name: String,
    som_hash: u64,
    width: u32,
    height: u32,
    opacity: f32,
    sections: Vec<KeySection>,
}

impl CacheKey {
    /// Key header for a visualizer, SOM and output size.
    #[must_use]
    pub fn new(short_name: &str, som_hash: u64, width: u32, height: u32, opacity: f32) -> Self {
        Self {
            short_name: short_name.to_string(),
            som_hash,
            width,
            height,
            opacity,
            sections: Vec::new(),
        }
    }

    /// Append a parameter section; empty sections are dropped.
    #[must_use]
    pub fn section(mut self, section: KeySection) -> Self {
        if !section.is_empty() {
            self.sections.push(section);
        }
        self
    }

    /// Append several sections.
    #[must_use]
    pub fn sections(self, sections: impl IntoIterator<Item = KeySection>) -> Self {
        sections.into_iter().fold(self, Self::section)
    }

    /// Visualizer short name.
    #[must_use]
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// Parameter sections.
    #[must_use]
    pub fn parameter_sections(&self) -> &[KeySection] {
        &self.sections
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}SOM:{:016x}, {}x{}, opac:{}",
            visualizer_prefix(&self.short_name),
            self.som_hash,
            self.width,
            self.height,
            self.opacity
        )?;
        for section in &self.sections {
            write!(f, " >> {section}")?;
        }
        Ok(())
    }
}

/// Join stringified parts with `", "`.
#[must_use]
pub fn build_key(parts: &[&dyn Display]) -> String {
    parts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prefix shared by every key of the visualizer named `short_name`.
#[must_use]
pub fn visualizer_prefix(short_name: &str) -> String {
    format!("{short_name}, ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let key = CacheKey::new("UMatrix", 0xabc, 400, 300, 1.0)
            .section(KeySection::new().with("variant", 0))
            .section(KeySection::new().with("palette", "grey").with("interp", true));
        assert_eq!(
            key.to_string(),
            "UMatrix, SOM:0000000000000abc, 400x300, opac:1 >> variant:0 >> palette:grey, interp:true"
        );
    }

    #[test]
    fn test_empty_sections_are_dropped() {
        let key = CacheKey::new("Hits", 1, 10, 10, 0.5).section(KeySection::new());
        assert!(key.parameter_sections().is_empty());
        assert!(key.to_string().ends_with("opac:0.5"));
    }

    #[test]
    fn test_prefix_matches_own_keys_only() {
        let a = CacheKey::new("U", 1, 1, 1, 1.0).to_string();
        let b = CacheKey::new("UStar", 1, 1, 1, 1.0).to_string();
        assert!(a.starts_with(&visualizer_prefix("U")));
        assert!(!b.starts_with(&visualizer_prefix("U")));
    }

    #[test]
    fn test_keys_differ_in_any_field() {
        let base = || CacheKey::new("MST", 7, 100, 100, 1.0);
        let k1 = base().section(KeySection::new().with("skip", 0)).to_string();
        let k2 = base().section(KeySection::new().with("skip", 1)).to_string();
        let k3 = CacheKey::new("MST", 7, 100, 101, 1.0)
            .section(KeySection::new().with("skip", 0))
            .to_string();
        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn test_build_key() {
        assert_eq!(build_key(&[&"a", &3, &1.5]), "a, 3, 1.5");
        assert_eq!(build_key(&[]), "");
    }
}
