use serde::Deserialize;
use std::convert::TryFrom;

/// Match policy of a field rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchMode {
    /// First result of the selector, or absent
    FirstMatch(String),

    /// Every result of the selector in document order, minus the first `skip`
    AllMatches { selector: String, skip: usize },

    /// First selector in the list that yields a non-blank value
    FirstNonEmptyOf(Vec<String>),
}

impl MatchMode {
    /// All selector expressions this mode evaluates
    pub fn selectors(&self) -> Vec<&str> {
        match self {
            Self::FirstMatch(selector) | Self::AllMatches { selector, .. } => {
                vec![selector.as_str()]
            }
            Self::FirstNonEmptyOf(selectors) => selectors.iter().map(String::as_str).collect(),
        }
    }
}

/// A named extraction instruction
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawFieldRule")]
pub struct FieldRule {
    pub name: String,
    pub mode: MatchMode,
}

impl FieldRule {
    pub fn first_match(name: &str, selector: &str) -> Self {
        Self {
            name: name.to_string(),
            mode: MatchMode::FirstMatch(selector.to_string()),
        }
    }

    pub fn all_matches(name: &str, selector: &str, skip: usize) -> Self {
        Self {
            name: name.to_string(),
            mode: MatchMode::AllMatches {
                selector: selector.to_string(),
                skip,
            },
        }
    }

    pub fn first_non_empty_of(name: &str, selectors: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            mode: MatchMode::FirstNonEmptyOf(selectors.iter().map(|s| s.to_string()).collect()),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
enum RawMode {
    #[default]
    FirstMatch,
    AllMatches,
    FirstNonEmptyOf,
}

/// Field rule as written in TOML
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawFieldRule {
    name: String,

    #[serde(default)]
    mode: RawMode,

    selector: Option<String>,

    selectors: Option<Vec<String>>,

    skip: Option<usize>,
}

impl TryFrom<RawFieldRule> for FieldRule {
    type Error = String;

    fn try_from(raw: RawFieldRule) -> Result<Self, Self::Error> {
        let name = raw.name;

        if raw.skip.is_some() && !matches!(raw.mode, RawMode::AllMatches) {
            return Err(format!(
                "rule '{}': skip is only valid with mode = \"all-matches\"",
                name
            ));
        }

        let mode = match raw.mode {
            RawMode::FirstMatch | RawMode::AllMatches => {
                if raw.selectors.is_some() {
                    return Err(format!(
                        "rule '{}': use 'selector', not 'selectors', for this mode",
                        name
                    ));
                }
                let selector = raw
                    .selector
                    .ok_or_else(|| format!("rule '{}': missing 'selector'", name))?;
                if matches!(raw.mode, RawMode::FirstMatch) {
                    MatchMode::FirstMatch(selector)
                } else {
                    MatchMode::AllMatches {
                        selector,
                        skip: raw.skip.unwrap_or(0),
                    }
                }
            }
            RawMode::FirstNonEmptyOf => {
                if raw.selector.is_some() {
                    return Err(format!(
                        "rule '{}': first-non-empty-of takes 'selectors', not 'selector'",
                        name
                    ));
                }
                let selectors = raw
                    .selectors
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| format!("rule '{}': 'selectors' must not be empty", name))?;
                MatchMode::FirstNonEmptyOf(selectors)
            }
        };

        Ok(FieldRule { name, mode })
    }
}
