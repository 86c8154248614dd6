use std::fmt;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid probe table name '{0}'")]
pub struct InvalidTableName(pub String);

/// A table identifier that is safe to splice into SQL.
///
/// Accepts `table` or `schema.table`, each segment made of ASCII letters,
/// digits and underscores and not starting with a digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProbeTable(String);

impl ProbeTable {
    pub fn new(name: &str) -> Result<Self, InvalidTableName> {
        let name = name.trim();
        let segments: Vec<&str> = name.split('.').collect();
        if segments.is_empty() || segments.len() > 2 || !segments.iter().all(|s| valid_segment(s)) {
            return Err(InvalidTableName(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The unqualified table name, e.g. `port1` for `public.port1`.
    pub fn table_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

fn valid_segment(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for ProbeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_schema_qualified_names() {
        assert_eq!(ProbeTable::new("port1").unwrap().as_str(), "port1");
        let qualified = ProbeTable::new("public.port3").unwrap();
        assert_eq!(qualified.table_name(), "port3");
    }

    #[test]
    fn rejects_injection_and_malformed_names() {
        for bad in ["", "port1; DROP TABLE port1", "a.b.c", "1port", "port-1", "public."] {
            assert!(ProbeTable::new(bad).is_err(), "accepted {bad:?}");
        }
    }
}
