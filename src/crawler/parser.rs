//! Page Model and Selector Adapter
//!
//! Pages are parsed with `scraper`. Selector expressions are CSS selectors
//! with an optional suffix choosing what each matched node yields:
//!
//! - `div.quote a::attr(href)` yields the `href` attribute
//! - `p.partial_entry::text` yields the node's own text, from its direct
//!   child text nodes only
//! - `p.partial_entry` with no suffix yields all text beneath the node
//!
//! Each matched node yields one value; its text nodes are joined and the
//! whitespace collapsed.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A parsed page the extraction engine can query
pub trait PageModel {
    /// Final URL of the page, after redirects
    fn url(&self) -> &str;

    /// Evaluates a selector expression, returning one string per matched node
    ///
    /// Returns an empty vector if nothing matched.
    fn evaluate(&self, expr: &str) -> Vec<String>;

    /// Resolves a link found on the page to an absolute http(s) URL
    fn resolve_url(&self, href: &str) -> Option<String>;
}

/// What a selector expression yields for each matched node
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    /// Text of the node and all its descendants
    Text,
    /// Direct child text nodes only
    OwnText,
    Attr(String),
}

/// A compiled selector expression
#[derive(Debug, Clone)]
pub struct SelectorExpr {
    selector: Selector,
    target: Target,
}

impl SelectorExpr {
    /// Compiles a selector expression
    ///
    /// # Returns
    ///
    /// * `Ok(SelectorExpr)` - The compiled expression
    /// * `Err(String)` - The CSS part is invalid or the suffix is malformed
    pub fn parse(expr: &str) -> Result<Self, String> {
        let expr = expr.trim();

        let (css, target) = if let Some(css) = expr.strip_suffix("::text") {
            (css, Target::OwnText)
        } else if let Some(idx) = expr.rfind("::attr(") {
            let rest = &expr[idx + "::attr(".len()..];
            let name = rest
                .strip_suffix(')')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| format!("malformed ::attr() suffix in '{}'", expr))?;
            (&expr[..idx], Target::Attr(name.to_string()))
        } else {
            (expr, Target::Text)
        };

        let selector = Selector::parse(css.trim())
            .map_err(|e| format!("invalid CSS selector '{}': {}", css.trim(), e))?;

        Ok(Self { selector, target })
    }

    fn value_of(&self, element: ElementRef<'_>) -> Option<String> {
        match &self.target {
            Target::Text => Some(collapse_whitespace(&element.text().collect::<String>())),
            Target::OwnText => {
                let own: String = element
                    .children()
                    .filter_map(|node| node.value().as_text().map(|text| &**text))
                    .collect();
                Some(collapse_whitespace(&own))
            }
            Target::Attr(name) => element.value().attr(name).map(|v| v.trim().to_string()),
        }
    }

    /// Evaluates the expression against a parsed document
    pub fn select(&self, document: &Html) -> Vec<String> {
        document
            .select(&self.selector)
            .filter_map(|element| self.value_of(element))
            .collect()
    }
}

/// An HTML page held in memory
///
/// `Html` is not `Send`, so an `HtmlPage` lives only inside the synchronous
/// part of a worker and is dropped before the next await.
pub struct HtmlPage {
    url: Url,
    document: Html,
}

impl HtmlPage {
    pub fn parse(body: &str, url: &str) -> Result<Self, crate::UrlError> {
        let url = Url::parse(url).map_err(|e| crate::UrlError::Parse(e.to_string()))?;
        Ok(Self {
            url,
            document: Html::parse_document(body),
        })
    }
}

impl PageModel for HtmlPage {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    fn evaluate(&self, expr: &str) -> Vec<String> {
        match SelectorExpr::parse(expr) {
            Ok(compiled) => compiled.select(&self.document),
            Err(e) => {
                tracing::warn!("Skipping selector on {}: {}", self.url, e);
                Vec::new()
            }
        }
    }

    fn resolve_url(&self, href: &str) -> Option<String> {
        resolve_link(href, &self.url)
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
        Some(absolute_url.to_string())
    } else {
        None
    }
}
