//! Native configuration syntaxes
//!
//! A [`ConfigDocument`] keeps every line of a subsystem's configuration and
//! rewrites only the entries for keys being tuned, so comments, ordering
//! and unrelated settings survive a merge unchanged.

use crate::profile::{Setting, Subsystem};
use serde::{Deserialize, Serialize};

/// Line-oriented key/value syntax of a configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigSyntax {
    /// `key value` (web server, object cache)
    SpaceSeparated,
    /// `key = value` (kernel parameters)
    KeyEquals,
    /// `key = value` inside a named `[section]` (database, runtime pool)
    Ini {
        /// Section that owns the tuned keys
        section: String,
    },
}

impl ConfigSyntax {
    fn format_entry(&self, key: &str, value: &str) -> String {
        match self {
            ConfigSyntax::SpaceSeparated => format!("{} {}", key, value),
            ConfigSyntax::KeyEquals | ConfigSyntax::Ini { .. } => format!("{} = {}", key, value),
        }
    }

    fn parse_entry<'a>(&self, line: &'a str) -> Option<(&'a str, &'a str)> {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with(';')
            || trimmed.starts_with('[')
        {
            return None;
        }

        match self {
            ConfigSyntax::SpaceSeparated => {
                let (key, value) = trimmed
                    .split_once(char::is_whitespace)
                    .unwrap_or((trimmed, ""));
                Some((key, value.trim()))
            }
            ConfigSyntax::KeyEquals | ConfigSyntax::Ini { .. } => {
                let (key, value) = trimmed.split_once('=')?;
                Some((key.trim(), value.trim()))
            }
        }
    }
}

fn section_header(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .map(str::trim)
}

/// Parsed configuration file that supports in-place key updates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDocument {
    syntax: ConfigSyntax,
    lines: Vec<String>,
}

impl ConfigDocument {
    /// Parse configuration text
    pub fn parse(syntax: ConfigSyntax, text: &str) -> Self {
        Self {
            syntax,
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    /// Line range the tuned keys live in, or `None` if the section is absent
    fn scope(&self) -> Option<(usize, usize)> {
        let ConfigSyntax::Ini { section } = &self.syntax else {
            return Some((0, self.lines.len()));
        };

        let start = self
            .lines
            .iter()
            .position(|l| section_header(l) == Some(section.as_str()))?;
        let end = self.lines[start + 1..]
            .iter()
            .position(|l| section_header(l).is_some())
            .map(|offset| start + 1 + offset)
            .unwrap_or(self.lines.len());

        Some((start + 1, end))
    }

    /// Current value of a key within scope (last occurrence wins)
    pub fn get(&self, key: &str) -> Option<&str> {
        let (start, end) = self.scope()?;
        self.lines[start..end]
            .iter()
            .filter_map(|l| self.syntax.parse_entry(l))
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| v)
            .last()
    }

    /// Set a key, returning whether the document changed
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let scope = match self.scope() {
            Some(scope) => scope,
            None => {
                // Section absent: append it
                if let ConfigSyntax::Ini { section } = &self.syntax {
                    if self.lines.last().map_or(false, |l| !l.trim().is_empty()) {
                        self.lines.push(String::new());
                    }
                    self.lines.push(format!("[{}]", section));
                }
                (self.lines.len(), self.lines.len())
            }
        };

        let (start, end) = scope;
        let mut found = false;
        let mut changed = false;

        for line in &mut self.lines[start..end] {
            let Some((existing_key, existing_value)) = self.syntax.parse_entry(line) else {
                continue;
            };
            if existing_key != key {
                continue;
            }
            found = true;
            if existing_value != value {
                let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
                *line = format!("{}{}", indent, self.syntax.format_entry(key, value));
                changed = true;
            }
        }

        if !found {
            // Insert after the last non-blank line of the scope
            let mut insert_at = end;
            while insert_at > start && self.lines[insert_at - 1].trim().is_empty() {
                insert_at -= 1;
            }
            self.lines
                .insert(insert_at, self.syntax.format_entry(key, value));
            changed = true;
        }

        changed
    }

    /// Merge a subsystem's settings, returning the keys that changed
    pub fn merge(&mut self, subsystem: Subsystem, settings: &[Setting]) -> Vec<String> {
        settings
            .iter()
            .filter_map(|setting| {
                let rendered = subsystem.render_value(&setting.value);
                self.set(&setting.key, &rendered)
                    .then(|| setting.key.clone())
            })
            .collect()
    }

    /// Render back to text with a trailing newline
    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::SettingValue;

    #[test]
    fn test_space_separated_replace_in_place() {
        let text = "# cache config\nport 6379\nmaxmemory 100mb\nappendonly no\n";
        let mut doc = ConfigDocument::parse(ConfigSyntax::SpaceSeparated, text);

        assert!(doc.set("maxmemory", "1638mb"));
        assert_eq!(
            doc.render(),
            "# cache config\nport 6379\nmaxmemory 1638mb\nappendonly no\n"
        );
    }

    #[test]
    fn test_set_same_value_is_noop() {
        let text = "net.core.somaxconn = 10000\n";
        let mut doc = ConfigDocument::parse(ConfigSyntax::KeyEquals, text);
        assert!(!doc.set("net.core.somaxconn", "10000"));
        assert_eq!(doc.render(), text);
    }

    #[test]
    fn test_append_missing_key() {
        let mut doc = ConfigDocument::parse(ConfigSyntax::KeyEquals, "vm.swappiness = 60\n\n");
        assert!(doc.set("net.core.somaxconn", "4096"));
        assert_eq!(doc.render(), "vm.swappiness = 60\nnet.core.somaxconn = 4096\n\n");
    }

    #[test]
    fn test_empty_document() {
        let mut doc = ConfigDocument::parse(ConfigSyntax::KeyEquals, "");
        doc.set("vm.swappiness", "10");
        assert_eq!(doc.render(), "vm.swappiness = 10\n");
    }

    #[test]
    fn test_ini_only_touches_target_section() {
        let text = "[client]\nmax_connections = 1\n\n[mysqld]\nuser = mysql\nmax_connections = 151\n\n[mysqldump]\nquick\n";
        let mut doc = ConfigDocument::parse(
            ConfigSyntax::Ini { section: "mysqld".into() },
            text,
        );

        assert!(doc.set("max_connections", "682"));
        assert!(doc.set("innodb_buffer_pool_size", "5734M"));

        assert_eq!(
            doc.render(),
            "[client]\nmax_connections = 1\n\n[mysqld]\nuser = mysql\nmax_connections = 682\ninnodb_buffer_pool_size = 5734M\n\n[mysqldump]\nquick\n"
        );
        assert_eq!(doc.get("max_connections"), Some("682"));
    }

    #[test]
    fn test_ini_appends_missing_section() {
        let mut doc = ConfigDocument::parse(
            ConfigSyntax::Ini { section: "www".into() },
            "; pool\n",
        );
        doc.set("pm.max_children", "100");
        assert_eq!(doc.render(), "; pool\n\n[www]\npm.max_children = 100\n");
    }

    #[test]
    fn test_preserves_indentation_and_comments() {
        let text = "[www]\n  ; tuned below\n  pm.max_children = 5\n";
        let mut doc = ConfigDocument::parse(ConfigSyntax::Ini { section: "www".into() }, text);
        doc.set("pm.max_children", "100");
        assert_eq!(doc.render(), "[www]\n  ; tuned below\n  pm.max_children = 100\n");
    }

    #[test]
    fn test_merge_reports_changed_keys_and_is_idempotent() {
        let settings = vec![
            Setting::new("maxmemory", SettingValue::Megabytes(1638)),
            Setting::new("maxmemory-policy", SettingValue::Text("allkeys-lru".into())),
        ];
        let mut doc = ConfigDocument::parse(
            ConfigSyntax::SpaceSeparated,
            "maxmemory-policy allkeys-lru\n",
        );

        let changed = doc.merge(Subsystem::Cache, &settings);
        assert_eq!(changed, vec!["maxmemory".to_string()]);

        let first = doc.render();
        let mut again = ConfigDocument::parse(ConfigSyntax::SpaceSeparated, &first);
        assert!(again.merge(Subsystem::Cache, &settings).is_empty());
        assert_eq!(again.render(), first);
    }

    #[test]
    fn test_duplicate_keys_all_updated() {
        let mut doc = ConfigDocument::parse(
            ConfigSyntax::SpaceSeparated,
            "maxConnections 100\nmaxConnections 200\n",
        );
        doc.set("maxConnections", "10000");
        assert_eq!(doc.render(), "maxConnections 10000\nmaxConnections 10000\n");
    }
}
