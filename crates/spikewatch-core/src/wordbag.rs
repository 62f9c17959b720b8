//! Wordbag (category → keywords) and keyword-list configuration files.
//!
//! The wordbag maps alert categories to the keywords that count toward them;
//! the keyword list is the set of search terms fanned out to collection
//! workers. Both are loaded once at startup and validated eagerly so
//! misconfiguration fails the run before any scraping happens.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct WordbagFile {
    pub categories: Vec<CategoryConfig>,
}

impl WordbagFile {
    /// Iterates `(category, keyword)` pairs with keywords lowercased.
    pub fn entries(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        self.categories.iter().flat_map(|c| {
            c.keywords
                .iter()
                .map(move |k| (c.name.as_str(), k.to_lowercase()))
        })
    }
}

/// Load and validate the wordbag configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_wordbag(path: &Path) -> Result<WordbagFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::WordbagIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let wordbag: WordbagFile = serde_yaml::from_str(&content).map_err(ConfigError::WordbagParse)?;

    validate_wordbag(&wordbag)?;

    Ok(wordbag)
}

fn validate_wordbag(wordbag: &WordbagFile) -> Result<(), ConfigError> {
    if wordbag.categories.is_empty() {
        return Err(ConfigError::Validation(
            "wordbag must define at least one category".to_string(),
        ));
    }

    let mut seen_categories = HashSet::new();
    for category in &wordbag.categories {
        if category.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "category name must be non-empty".to_string(),
            ));
        }

        if !seen_categories.insert(category.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate category name: '{}'",
                category.name
            )));
        }

        if category.keywords.is_empty() {
            return Err(ConfigError::Validation(format!(
                "category '{}' has no keywords",
                category.name
            )));
        }

        for keyword in &category.keywords {
            if keyword.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "category '{}' has an empty keyword",
                    category.name
                )));
            }
        }
    }

    Ok(())
}

/// Load the newline-delimited keyword list used to fan out collection workers.
///
/// Blank lines and surrounding whitespace are ignored.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or contains no keywords.
pub fn load_keywords(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::KeywordsIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let keywords: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if keywords.is_empty() {
        return Err(ConfigError::Validation(format!(
            "keywords file {} contains no keywords",
            path.display()
        )));
    }

    Ok(keywords)
}
