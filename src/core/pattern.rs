//! Route pattern compilation and parameter extraction.
//!
//! A route template is a path with three kinds of placeholder:
//! `:name` (one segment), `(optional)` (a skippable stretch) and `*name`
//! (greedy splat capturing the rest of the path). Templates compile to an
//! anchored regex matching whole fragments. Matching is case-insensitive
//! unless the navigation session was built case-sensitive; the flag never
//! retroactively affects already-compiled patterns.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\-{}\[\]+?.,\\^$|#\s]").unwrap());
static OPTIONAL_PARAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((.*?)\)").unwrap());
static NAMED_PARAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\(\?)?:\w+").unwrap());
static SPLAT_PARAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\w+").unwrap());

/// A route template failed to compile.
#[derive(Debug)]
pub struct PatternError {
    pub route: String,
    pub message: String,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid route pattern {:?}: {}", self.route, self.message)
    }
}

impl std::error::Error for PatternError {}

/// One query-string value: a scalar, or an ordered list once the key repeats.
/// A value-less key (`?flag`) carries `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    Scalar(Option<String>),
    List(Vec<Option<String>>),
}

impl QueryValue {
    /// Convenience accessor for the scalar case.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Scalar(value) => value.as_deref(),
            QueryValue::List(_) => None,
        }
    }
}

pub type QueryParams = BTreeMap<String, QueryValue>;

/// Everything extracted from a matched fragment, handed to activation hooks.
///
/// Positional captures come in declaration order; an empty or unmatched
/// optional capture is `None`, never an empty string. The query map is empty
/// when the fragment carried no query string.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ActivationParams {
    pub positional: Vec<Option<String>>,
    pub query: QueryParams,
}

impl ActivationParams {
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.query.is_empty()
    }
}

/// A compiled route template. Immutable once built.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    source: String,
    regex: Regex,
}

impl RoutePattern {
    /// Compiles a route template. `case_sensitive` must reflect the session
    /// setting at compile time — patterns never change sensitivity later.
    pub fn compile(route: &str, case_sensitive: bool) -> Result<Self, PatternError> {
        let escaped = ESCAPE.replace_all(route, |caps: &regex::Captures| format!("\\{}", &caps[0]));
        let optional = OPTIONAL_PARAM.replace_all(&escaped, "(?:$1)?");
        let named = NAMED_PARAM.replace_all(&optional, |caps: &regex::Captures| {
            if caps.get(1).is_some() {
                caps[0].to_string()
            } else {
                "([^/]+)".to_string()
            }
        });
        let splat = SPLAT_PARAM.replace_all(&named, "(.*?)");

        let flags = if case_sensitive { "" } else { "(?i)" };
        let anchored = format!("{flags}^{splat}$");

        let regex = Regex::new(&anchored).map_err(|e| PatternError {
            route: route.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            source: route.to_string(),
            regex,
        })
    }

    /// The original template string.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, fragment: &str) -> bool {
        self.regex.is_match(fragment)
    }

    /// Extracts decoded positional params (declaration order, unmatched
    /// optionals as `None`) plus the parsed query map. The query map is
    /// populated only when the query string is non-empty.
    pub fn extract_params(&self, fragment: &str, query_string: Option<&str>) -> ActivationParams {
        let mut positional = Vec::new();

        if let Some(caps) = self.regex.captures(fragment) {
            for i in 1..caps.len() {
                let value = caps
                    .get(i)
                    .map(|m| m.as_str())
                    .filter(|s| !s.is_empty())
                    .map(|s| percent_decode(s, false));
                positional.push(value);
            }
        }

        let query = match query_string {
            Some(q) if !q.is_empty() => parse_query_string(q),
            _ => QueryParams::new(),
        };

        ActivationParams { positional, query }
    }
}

/// Parses a query string: pairs split on `&`, key/value on the first `=`.
/// A value-less key maps to `None`; values are percent-decoded with `+` as
/// space; repeated keys collapse into an ordered list.
pub fn parse_query_string(query: &str) -> QueryParams {
    let mut params = QueryParams::new();

    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }

        let (key, value) = match pair.find('=') {
            Some(index) => (
                pair[..index].to_string(),
                Some(percent_decode(&pair[index + 1..], true)),
            ),
            None => (pair.to_string(), None),
        };

        match params.get_mut(&key) {
            Some(QueryValue::List(values)) => values.push(value),
            Some(existing @ QueryValue::Scalar(_)) => {
                // First collision: the scalar becomes a two-element list.
                let QueryValue::Scalar(first) = existing.clone() else {
                    unreachable!()
                };
                *existing = QueryValue::List(vec![first, value]);
            }
            None => {
                params.insert(key, QueryValue::Scalar(value));
            }
        }
    }

    params
}

/// Substitutes positional values back into a route template, producing the
/// concrete hash for the current navigation. Named params consume values in
/// order; splat tails and optional-group markers are dropped.
pub fn fill_params(route: &str, positional: &[Option<String>]) -> String {
    let mut values = positional.iter();
    let filled = NAMED_PARAM.replace_all(route, |caps: &regex::Captures| {
        if caps.get(1).is_some() {
            return caps[0].to_string();
        }
        match values.next() {
            Some(Some(value)) => value.clone(),
            _ => String::new(),
        }
    });
    let without_splat = SPLAT_PARAM.replace_all(&filled, "");
    without_splat
        .replace(['(', ')'], "")
        .trim_end_matches('/')
        .to_string()
}

/// Minimal percent decoder. Malformed escapes pass through untouched, and
/// `+` becomes a space only in query values.
fn percent_decode(input: &str, plus_as_space: bool) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hi = (bytes[i + 1] as char).to_digit(16);
                let lo = (bytes[i + 2] as char).to_digit(16);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    out.push((hi * 16 + lo) as u8);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            b'+' if plus_as_space => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(route: &str) -> RoutePattern {
        RoutePattern::compile(route, false).unwrap()
    }

    #[test]
    fn test_static_route_matches_whole_fragment() {
        let pattern = compile("customers");
        assert!(pattern.is_match("customers"));
        assert!(!pattern.is_match("customers/42"));
        assert!(!pattern.is_match("a/customers"));
    }

    #[test]
    fn test_named_param_extraction() {
        let pattern = compile("customer/:id");
        assert!(pattern.is_match("customer/42"));
        let params = pattern.extract_params("customer/42", None);
        assert_eq!(params.positional, vec![Some("42".to_string())]);
        assert!(params.query.is_empty());
    }

    #[test]
    fn test_params_in_declaration_order() {
        let pattern = compile("orders/:year/:month/:day");
        let params = pattern.extract_params("orders/2024/06/15", None);
        assert_eq!(
            params.positional,
            vec![
                Some("2024".to_string()),
                Some("06".to_string()),
                Some("15".to_string())
            ]
        );
    }

    #[test]
    fn test_unmatched_optional_is_none() {
        let pattern = compile("customer(/:id)");
        assert!(pattern.is_match("customer"));
        assert!(pattern.is_match("customer/42"));

        let params = pattern.extract_params("customer", None);
        assert_eq!(params.positional, vec![None]);

        let params = pattern.extract_params("customer/42", None);
        assert_eq!(params.positional, vec![Some("42".to_string())]);
    }

    #[test]
    fn test_splat_captures_remainder() {
        let pattern = compile("files/*path");
        let params = pattern.extract_params("files/docs/readme.txt", None);
        assert_eq!(params.positional, vec![Some("docs/readme.txt".to_string())]);
    }

    #[test]
    fn test_child_route_suffix_splat_allows_empty_tail() {
        // A parent route with child routes gets "*childRoutes" appended.
        let pattern = compile("shell*childRoutes");
        assert!(pattern.is_match("shell"));
        assert!(pattern.is_match("shell/inbox/42"));
        let params = pattern.extract_params("shell/inbox/42", None);
        assert_eq!(params.positional, vec![Some("/inbox/42".to_string())]);
    }

    #[test]
    fn test_case_insensitive_by_default() {
        let pattern = compile("Customer/:id");
        assert!(pattern.is_match("customer/42"));
        assert!(pattern.is_match("CUSTOMER/42"));
    }

    #[test]
    fn test_case_sensitive_when_requested() {
        let pattern = RoutePattern::compile("Customer/:id", true).unwrap();
        assert!(pattern.is_match("Customer/42"));
        assert!(!pattern.is_match("customer/42"));
    }

    #[test]
    fn test_percent_decoding_of_positional_params() {
        let pattern = compile("search/:term");
        let params = pattern.extract_params("search/caf%C3%A9", None);
        assert_eq!(params.positional, vec![Some("café".to_string())]);
    }

    #[test]
    fn test_query_appended_only_when_non_empty() {
        let pattern = compile("customer/:id");
        let params = pattern.extract_params("customer/42", Some(""));
        assert!(params.query.is_empty());

        let params = pattern.extract_params("customer/42", Some("tab=info"));
        assert_eq!(
            params.query.get("tab").and_then(|v| v.as_str()),
            Some("info")
        );
    }

    #[test]
    fn test_query_value_less_key_is_null() {
        let params = parse_query_string("flag&x=1");
        assert_eq!(params.get("flag"), Some(&QueryValue::Scalar(None)));
        assert_eq!(params.get("x").and_then(|v| v.as_str()), Some("1"));
    }

    #[test]
    fn test_query_plus_decodes_to_space() {
        let params = parse_query_string("q=hello+world%21");
        assert_eq!(
            params.get("q").and_then(|v| v.as_str()),
            Some("hello world!")
        );
    }

    #[test]
    fn test_repeated_query_keys_collapse_to_list() {
        let params = parse_query_string("a=1&a=2");
        assert_eq!(
            params.get("a"),
            Some(&QueryValue::List(vec![
                Some("1".to_string()),
                Some("2".to_string())
            ]))
        );

        let params = parse_query_string("a=1&a=2&a=3");
        assert_eq!(
            params.get("a"),
            Some(&QueryValue::List(vec![
                Some("1".to_string()),
                Some("2".to_string()),
                Some("3".to_string())
            ]))
        );
    }

    #[test]
    fn test_customer_tab_scenario() {
        // "customer/:id" + "customer/42?tab=info" => ["42"], {tab: "info"}
        let pattern = compile("customer/:id");
        let params = pattern.extract_params("customer/42", Some("tab=info"));
        assert_eq!(params.positional, vec![Some("42".to_string())]);
        assert_eq!(
            params.query.get("tab").and_then(|v| v.as_str()),
            Some("info")
        );
    }

    #[test]
    fn test_fill_params_substitutes_in_order() {
        assert_eq!(
            fill_params("customer/:id/orders/:year", &[
                Some("42".to_string()),
                Some("2024".to_string())
            ]),
            "customer/42/orders/2024"
        );
        assert_eq!(fill_params("customer(/:id)", &[None]), "customer");
        assert_eq!(
            fill_params("shell/:tenant*childRoutes", &[Some("acme".to_string()), None]),
            "shell/acme"
        );
    }

    #[test]
    fn test_regex_metacharacters_in_routes_are_literal() {
        let pattern = compile("docs/v1.2");
        assert!(pattern.is_match("docs/v1.2"));
        assert!(!pattern.is_match("docs/v1x2"));
    }
}
