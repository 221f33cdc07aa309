//! INI-style configuration documents
//!
//! A [`ConfigDocument`] is an ordered mapping of sections to ordered
//! options. Section order is preserved on read and write because
//! credential sections are matched to repeated form groups by position.

use indexmap::IndexMap;
use std::fmt;
use tracing::warn;

/// Options of one section, in file order
pub type Section = IndexMap<String, String>;

/// An INI-like section/option/value store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    sections: IndexMap<String, Section>,
}

impl ConfigDocument {
    /// Create an empty document
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse INI text
    ///
    /// Lines outside any section and lines without a `=` or `:` separator
    /// are skipped with a warning rather than rejected.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut document = Self::new();
        let mut current: Option<String> = None;

        for (number, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim().to_owned();
                document.sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }

            let Some(section) = current.as_ref() else {
                warn!("Ignoring option outside of a section on line {}", number + 1);
                continue;
            };

            let Some(split) = line.find(['=', ':']) else {
                warn!("Ignoring malformed line {} in section [{}]", number + 1, section);
                continue;
            };
            let (key, value) = line.split_at(split);
            document
                .sections
                .entry(section.clone())
                .or_default()
                .insert(key.trim().to_owned(), value[1..].trim().to_owned());
        }

        document
    }

    /// Check whether a section exists
    #[must_use]
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// Section names in document order
    #[must_use]
    pub fn sections(&self) -> Vec<&str> {
        self.sections.keys().map(String::as_str).collect()
    }

    /// Section name at a position
    #[must_use]
    pub fn section_at(&self, index: usize) -> Option<&str> {
        self.sections.get_index(index).map(|(name, _)| name.as_str())
    }

    /// Option names of a section in document order; empty when the section is missing
    #[must_use]
    pub fn keys(&self, section: &str) -> Vec<&str> {
        self.sections
            .get(section)
            .map(|options| options.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Value of an option, if both the section and the option exist
    #[must_use]
    pub fn get(&self, section: &str, option: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|options| options.get(option))
            .map(String::as_str)
    }

    /// Borrow a whole section
    #[must_use]
    pub fn section(&self, section: &str) -> Option<&Section> {
        self.sections.get(section)
    }

    /// Add an empty section at the end unless it already exists
    pub fn add_section(&mut self, section: &str) {
        self.sections.entry(section.to_owned()).or_default();
    }

    /// Remove a section, keeping the order of the remaining ones
    pub fn remove_section(&mut self, section: &str) -> Option<Section> {
        self.sections.shift_remove(section)
    }

    /// Remove a section and append a fresh empty one under the same name
    pub fn replace_section(&mut self, section: &str) {
        self.remove_section(section);
        self.add_section(section);
    }

    /// Append a section with its options, replacing any section of that name
    pub fn insert_section(&mut self, section: &str, options: Section) {
        self.remove_section(section);
        self.sections.insert(section.to_owned(), options);
    }

    /// Set an option, creating the section when needed
    pub fn set(&mut self, section: &str, option: &str, value: &str) {
        self.sections
            .entry(section.to_owned())
            .or_default()
            .insert(option.to_owned(), value.to_owned());
    }

    /// Remove an option; a missing section or option is not an error
    pub fn remove_key(&mut self, section: &str, option: &str) {
        if let Some(options) = self.sections.get_mut(section) {
            options.shift_remove(option);
        }
    }
}

impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (name, options)) in self.sections.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            writeln!(f, "[{name}]")?;
            for (key, value) in options {
                writeln!(f, "{key}={value}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_section_order() {
        let doc = ConfigDocument::parse(
            "[gitlab.example]\ntype=gitlab\n\n[jenkins.example]\ntype = jenkins\n[a.example]\n",
        );
        assert_eq!(
            doc.sections(),
            vec!["gitlab.example", "jenkins.example", "a.example"]
        );
        assert_eq!(doc.get("jenkins.example", "type"), Some("jenkins"));
        assert_eq!(doc.section_at(2), Some("a.example"));
        assert_eq!(doc.section_at(3), None);
    }

    #[test]
    fn test_parse_empty_value_and_colon_separator() {
        let doc = ConfigDocument::parse("[projects]\nABC=\nDEF: def-report\n");
        assert_eq!(doc.get("projects", "ABC"), Some(""));
        assert_eq!(doc.get("projects", "DEF"), Some("def-report"));
        assert_eq!(doc.keys("projects"), vec!["ABC", "DEF"]);
    }

    #[test]
    fn test_parse_skips_comments_and_orphans() {
        let doc = ConfigDocument::parse("orphan=1\n# comment\n; other\n[s]\nnoseparator\nk=v=w\n");
        assert_eq!(doc.sections(), vec!["s"]);
        assert_eq!(doc.keys("s"), vec!["k"]);
        assert_eq!(doc.get("s", "k"), Some("v=w"));
    }

    #[test]
    fn test_replace_section_moves_it_to_the_end() {
        let mut doc = ConfigDocument::parse("[a]\nx=1\n[b]\ny=2\n");
        doc.replace_section("a");
        assert_eq!(doc.sections(), vec!["b", "a"]);
        assert!(doc.keys("a").is_empty());
    }

    #[test]
    fn test_remove_key_on_missing_section() {
        let mut doc = ConfigDocument::new();
        doc.remove_key("definitions", "name");
        assert!(!doc.has_section("definitions"));

        doc.set("definitions", "name", "quality-report-data");
        doc.remove_key("definitions", "name");
        assert!(doc.has_section("definitions"));
        assert_eq!(doc.get("definitions", "name"), None);
    }

    #[test]
    fn test_display_round_trips() {
        let text = "[bigboat]\nhost=http://b.example\nkey=k\n\n[projects]\nABC=\n";
        let doc = ConfigDocument::parse(text);
        assert_eq!(doc.to_string(), text);
        assert_eq!(ConfigDocument::parse(&doc.to_string()), doc);
    }
}
