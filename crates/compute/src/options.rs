//! Algorithm options arrive as untyped query-string pairs and are parsed
//! into typed parameters before a job is created.

use std::collections::BTreeMap;
use std::str::FromStr;

use netjobs_core::PayloadError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlgorithmOptions(BTreeMap<String, String>);

impl AlgorithmOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse `name` as `T`, falling back to `default` when absent.
    pub fn parse_or<T: FromStr>(
        &self,
        name: &str,
        default: T,
        expected: &str,
    ) -> Result<T, PayloadError> {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| invalid(name, raw, expected)),
        }
    }

    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize, PayloadError> {
        self.parse_or(name, default, "a non-negative integer")
    }

    pub fn positive_usize_or(&self, name: &str, default: usize) -> Result<usize, PayloadError> {
        let value = self.usize_or(name, default)?;
        if value == 0 {
            return Err(invalid(name, "0", "a positive integer"));
        }
        Ok(value)
    }

    pub fn u64_or(&self, name: &str, default: u64) -> Result<u64, PayloadError> {
        self.parse_or(name, default, "a non-negative integer")
    }

    /// Finite, non-negative float.
    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64, PayloadError> {
        let value: f64 = self.parse_or(name, default, "a non-negative number")?;
        if !value.is_finite() || value < 0.0 {
            return Err(invalid(name, &value.to_string(), "a non-negative number"));
        }
        Ok(value)
    }

    /// One of `allowed` (case-insensitive), returned lowercased.
    pub fn choice_or(
        &self,
        name: &str,
        allowed: &[&str],
        default: &str,
    ) -> Result<String, PayloadError> {
        match self.get(name) {
            None => Ok(default.to_string()),
            Some(raw) => {
                let lowered = raw.to_ascii_lowercase();
                if allowed.contains(&lowered.as_str()) {
                    Ok(lowered)
                } else {
                    Err(invalid(name, raw, &format!("one of {}", allowed.join(", "))))
                }
            }
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AlgorithmOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn invalid(name: &str, value: &str, expected: &str) -> PayloadError {
    PayloadError::InvalidOption {
        name: name.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(pairs: &[(&str, &str)]) -> AlgorithmOptions {
        pairs.iter().copied().collect()
    }

    #[test]
    fn absent_options_use_defaults() {
        let o = AlgorithmOptions::new();
        assert_eq!(o.usize_or("iterations", 5).unwrap(), 5);
        assert_eq!(o.f64_or("resolution", 1.0).unwrap(), 1.0);
        assert_eq!(o.choice_or("objective_function", &["cpm", "modularity"], "modularity").unwrap(), "modularity");
    }

    #[test]
    fn blank_values_count_as_absent() {
        let o = opts(&[("seed", "  ")]);
        assert_eq!(o.u64_or("seed", 9).unwrap(), 9);
    }

    #[test]
    fn parses_typed_values() {
        let o = opts(&[("iterations", "12"), ("resolution", "0.5"), ("objective_function", "CPM")]);
        assert_eq!(o.usize_or("iterations", 1).unwrap(), 12);
        assert_eq!(o.f64_or("resolution", 1.0).unwrap(), 0.5);
        assert_eq!(o.choice_or("objective_function", &["cpm", "modularity"], "modularity").unwrap(), "cpm");
    }

    #[test]
    fn rejects_bad_values() {
        let o = opts(&[("iterations", "many"), ("resolution", "-1"), ("beta", "NaN"), ("trials", "0")]);
        assert!(matches!(
            o.usize_or("iterations", 1),
            Err(PayloadError::InvalidOption { ref name, .. }) if name == "iterations"
        ));
        assert!(o.f64_or("resolution", 1.0).is_err());
        assert!(o.f64_or("beta", 0.01).is_err());
        assert!(o.positive_usize_or("trials", 1).is_err());
        assert!(o.choice_or("objective_function", &["cpm"], "cpm").is_ok());
        assert!(opts(&[("objective_function", "surprise")])
            .choice_or("objective_function", &["cpm", "modularity"], "cpm")
            .is_err());
    }
}
