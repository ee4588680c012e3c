//! Extraction Engine
//!
//! Applies a table of named field rules to a page and produces a flat mapping
//! of field name to value. Rules are data, so the engine carries no
//! site-specific selectors.

mod rule;
mod value;

pub use rule::{FieldRule, MatchMode};
pub use value::{ExtractedRecord, FieldValue};

use crate::crawler::PageModel;
use std::collections::BTreeMap;

/// Applies every rule to the page, in rule order
///
/// Every rule name appears in the result; fields whose selectors matched
/// nothing are `FieldValue::Absent`. When two rules share a name the later
/// one wins.
pub fn extract<P: PageModel + ?Sized>(page: &P, rules: &[FieldRule]) -> BTreeMap<String, FieldValue> {
    let mut fields = BTreeMap::new();

    for rule in rules {
        let value = apply_rule(page, rule);
        tracing::trace!("{} -> {:?}", rule.name, value);
        fields.insert(rule.name.clone(), value);
    }

    fields
}

/// Evaluates a single rule against the page
pub fn apply_rule<P: PageModel + ?Sized>(page: &P, rule: &FieldRule) -> FieldValue {
    match &rule.mode {
        MatchMode::FirstMatch(selector) => page
            .evaluate(selector)
            .into_iter()
            .next()
            .map(FieldValue::Text)
            .unwrap_or(FieldValue::Absent),

        MatchMode::AllMatches { selector, skip } => {
            let values = page.evaluate(selector);
            if values.is_empty() {
                FieldValue::Absent
            } else {
                FieldValue::List(values.into_iter().skip(*skip).collect())
            }
        }

        MatchMode::FirstNonEmptyOf(selectors) => selectors
            .iter()
            .find_map(|selector| {
                page.evaluate(selector)
                    .into_iter()
                    .find(|v| !v.trim().is_empty())
            })
            .map(FieldValue::Text)
            .unwrap_or(FieldValue::Absent),
    }
}
