use crate::domain::category::CategoryRule;
use crate::error::{LedgerError, Result};
use chrono::Utc;
use serde::Deserialize;
use std::io::Read;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct RawRule {
    category: String,
    sub_category: String,
    /// Semicolon-separated keyword list.
    keywords: String,
    priority: f64,
    active: bool,
}

/// Reads categorization rules from a CSV source, one rule per row with a
/// `;`-separated keyword column.
pub struct RuleReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RuleReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    pub fn rules(self) -> Result<Vec<CategoryRule>> {
        let mut rules = Vec::new();
        for row in self.reader.into_deserialize::<RawRule>() {
            let raw = row?;
            let keywords: Vec<String> = raw
                .keywords
                .split(';')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
            if keywords.is_empty() {
                return Err(LedgerError::Validation(format!(
                    "Rule '{}' has no keywords",
                    raw.category
                )));
            }
            rules.push(CategoryRule {
                id: Uuid::new_v4(),
                category: raw.category,
                sub_category: raw.sub_category,
                keywords,
                priority: raw.priority,
                active: raw.active,
                created_at: Utc::now(),
            });
        }
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_rules_with_keyword_lists() {
        let data = "\
category, sub_category, keywords, priority, active
Food & Dining, Restaurants, pizza;burger;cafe, 10.0, true
Transport, Taxi & Rideshare, uber; lyft, 9.0, false";
        let rules = RuleReader::new(data.as_bytes()).rules().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].keywords, vec!["pizza", "burger", "cafe"]);
        assert_eq!(rules[1].keywords, vec!["uber", "lyft"]);
        assert!(!rules[1].active);
    }

    #[test]
    fn test_empty_keywords_rejected() {
        let data = "category, sub_category, keywords, priority, active\nFood, Other, ;;, 1.0, true";
        let err = RuleReader::new(data.as_bytes()).rules();
        assert!(matches!(err, Err(LedgerError::Validation(_))));
    }
}
