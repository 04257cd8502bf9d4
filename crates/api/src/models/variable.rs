//! Variable definitions used to generate product variants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::VariableId;

use super::pickup::default_true;

/// A named variation axis such as "Size" with its allowed values.
#[derive(Debug, Clone, Serialize)]
pub struct Variable {
    pub id: VariableId,
    pub code: String,
    pub variable_name: String,
    pub variable_types: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewVariable {
    pub variable_name: String,
    #[serde(default)]
    pub variable_types: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariableUpdate {
    pub variable_name: Option<String>,
    pub variable_types: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

/// Trim values and drop blanks and repeats, keeping first-seen order.
#[must_use]
pub fn normalize_types(types: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    types
        .into_iter()
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_types() {
        let types = vec![
            " S ".to_string(),
            "M".to_string(),
            String::new(),
            "s".to_string(),
            "XL".to_string(),
        ];
        assert_eq!(normalize_types(types), vec!["S", "M", "XL"]);
    }
}
