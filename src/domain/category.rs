//! Rule-based expense categorization.
//!
//! The matcher is a pure function over the active rule set: rules are scanned
//! in descending priority order and the first rule with a keyword contained
//! in the case-folded description wins.

use crate::domain::events::CategorizationMethod;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MATCH_CONFIDENCE: f64 = 0.9;
const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub id: Uuid,
    pub category: String,
    pub sub_category: String,
    /// Keywords matched against the lowercased transaction description.
    pub keywords: Vec<String>,
    /// Higher priority rules are checked first.
    pub priority: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl CategoryRule {
    pub fn new(
        category: &str,
        sub_category: &str,
        keywords: &[&str],
        priority: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            category: category.to_string(),
            sub_category: sub_category.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            priority,
            active: true,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Categorization {
    pub category: String,
    pub sub_category: String,
    pub confidence_score: f64,
    pub method: CategorizationMethod,
}

impl Categorization {
    fn uncategorized() -> Self {
        Self {
            category: "Uncategorized".to_string(),
            sub_category: "Other".to_string(),
            confidence_score: DEFAULT_CONFIDENCE,
            method: CategorizationMethod::RuleBased,
        }
    }
}

/// Categorizes a transaction description against the given rules.
///
/// First match wins, scanning active rules by descending priority. Returns
/// the uncategorized default when no keyword matches or the description is
/// absent.
pub fn categorize(description: Option<&str>, rules: &[CategoryRule]) -> Categorization {
    let description = match description {
        Some(d) => d.to_lowercase(),
        None => return Categorization::uncategorized(),
    };

    let mut ordered: Vec<&CategoryRule> = rules.iter().filter(|r| r.active).collect();
    ordered.sort_by(|a, b| b.priority.total_cmp(&a.priority));

    for rule in ordered {
        let matched = rule
            .keywords
            .iter()
            .any(|keyword| description.contains(&keyword.to_lowercase()));
        if matched {
            return Categorization {
                category: rule.category.clone(),
                sub_category: rule.sub_category.clone(),
                confidence_score: MATCH_CONFIDENCE,
                method: CategorizationMethod::RuleBased,
            };
        }
    }

    Categorization::uncategorized()
}

/// The rule set seeded when no rules file is configured.
pub fn default_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new(
            "Food & Dining",
            "Restaurants",
            &["restaurant", "cafe", "pizza", "burger", "food"],
            10.0,
        ),
        CategoryRule::new(
            "Transport",
            "Taxi & Rideshare",
            &["uber", "lyft", "taxi", "cab"],
            10.0,
        ),
        CategoryRule::new(
            "Shopping",
            "Online Shopping",
            &["amazon", "ebay", "shop", "store"],
            8.0,
        ),
        CategoryRule::new(
            "Bills & Utilities",
            "Internet",
            &["internet", "broadband", "wifi"],
            9.0,
        ),
        CategoryRule::new(
            "Entertainment",
            "Streaming",
            &["netflix", "spotify", "hulu", "streaming"],
            9.0,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins_by_priority() {
        let rules = vec![
            CategoryRule::new("Generic", "Other", &["pizza"], 1.0),
            CategoryRule::new("Food & Dining", "Restaurants", &["pizza"], 10.0),
        ];
        let result = categorize(Some("Pizza Hut dinner"), &rules);
        assert_eq!(result.category, "Food & Dining");
        assert_eq!(result.sub_category, "Restaurants");
        assert_eq!(result.confidence_score, 0.9);
        assert_eq!(result.method, CategorizationMethod::RuleBased);
    }

    #[test]
    fn test_case_folded_match() {
        let rules = default_rules();
        let result = categorize(Some("NETFLIX subscription"), &rules);
        assert_eq!(result.category, "Entertainment");
    }

    #[test]
    fn test_no_match_returns_default() {
        let result = categorize(Some("quarterly tax payment"), &default_rules());
        assert_eq!(result.category, "Uncategorized");
        assert_eq!(result.sub_category, "Other");
        assert_eq!(result.confidence_score, 0.5);
    }

    #[test]
    fn test_missing_description_returns_default() {
        let result = categorize(None, &default_rules());
        assert_eq!(result.category, "Uncategorized");
    }

    #[test]
    fn test_inactive_rules_skipped() {
        let mut rules = vec![CategoryRule::new("Food & Dining", "Restaurants", &["pizza"], 10.0)];
        rules[0].active = false;
        let result = categorize(Some("pizza"), &rules);
        assert_eq!(result.category, "Uncategorized");
    }

    #[test]
    fn test_categorization_is_stateless() {
        let rules = default_rules();
        let first = categorize(Some("uber ride home"), &rules);
        let second = categorize(Some("uber ride home"), &rules);
        assert_eq!(first, second);
        assert_eq!(first.category, "Transport");
    }
}
