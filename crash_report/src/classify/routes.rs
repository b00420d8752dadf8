//! Route table and near-match search for not-found errors

use crate::config::compile_time::classifier::{MAX_ROUTE_CANDIDATES, MAX_ROUTE_DISTANCE};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Route {
    pub method: String,
    pub path: String,
    pub handler: String,
}

impl Route {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            handler: String::new(),
        }
    }
}

/// Routes registered with the host router, in registration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Up to `MAX_ROUTE_CANDIDATES` routes near `requested`, closest first
    pub fn similar_to(&self, requested: &str) -> Vec<RouteMatch> {
        let mut matches: Vec<RouteMatch> = self
            .routes
            .iter()
            .filter(|route| !route.path.is_empty())
            .filter_map(|route| {
                let distance = levenshtein(requested, &route.path);
                let related = distance <= MAX_ROUTE_DISTANCE
                    || contains_path(&route.path, requested)
                    || contains_path(requested, &route.path);
                related.then(|| RouteMatch {
                    method: route.method.clone(),
                    path: route.path.clone(),
                    distance,
                })
            })
            .collect();

        // Stable: equal distances keep registration order
        matches.sort_by_key(|m| m.distance);
        matches.truncate(MAX_ROUTE_CANDIDATES);
        matches
    }
}

/// Containment only counts for needles of at least two characters; `/` is in
/// every path
fn contains_path(haystack: &str, needle: &str) -> bool {
    needle.chars().count() >= 2 && haystack.contains(needle)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteMatch {
    pub method: String,
    pub path: String,
    pub distance: usize,
}

static URL_REGEX: OnceLock<Regex> = OnceLock::new();

fn url_regex() -> &'static Regex {
    URL_REGEX.get_or_init(|| {
        Regex::new(r#"(?:^|[\s'"(:=])(?:https?://[^/\s'"<>]+)?(/[^\s'"<>?#,;)]*)"#).expect("Failed to compile URL regex")
    })
}

/// First URL path mentioned in a message
pub fn extract_url(message: &str) -> Option<String> {
    url_regex()
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches('.').to_string())
}

/// Edit distance between two strings, by characters
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        current[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            current[j] = (previous[j] + 1)
                .min(current[j - 1] + 1)
                .min(previous[j - 1] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("/user", "/users"), 1);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_route_suggestion_determinism() {
        let table = RouteTable::new(vec![Route::new("GET", "/users"), Route::new("GET", "/users/{id}")]);
        let matches = table.similar_to("/user");
        assert_eq!(matches[0].path, "/users");
        assert_eq!(matches[0].distance, 1);
        assert!(matches.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(table.similar_to("/user"), matches);
    }

    #[test]
    fn test_containment_and_cap() {
        let table = RouteTable::new(vec![
            Route::new("GET", "/admin/reports/monthly"),
            Route::new("GET", "/a"),
            Route::new("GET", "/b"),
            Route::new("GET", "/c"),
            Route::new("GET", "/d"),
        ]);
        let matches = table.similar_to("/admin/reports");
        assert_eq!(matches[0].path, "/admin/reports/monthly");

        let short = table.similar_to("/x");
        assert_eq!(short.len(), MAX_ROUTE_CANDIDATES);
        assert_eq!(short[0].path, "/a");
    }

    #[test]
    fn test_root_path_does_not_match_by_containment() {
        let table = RouteTable::new(vec![
            Route::new("GET", "/users"),
            Route::new("GET", "/orders/{id}/items"),
            Route::new("GET", "/"),
            Route::new("GET", "/settings/profile"),
        ]);
        let matches = table.similar_to("/");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, "/");

        let deep = table.similar_to("/reports/weekly/summary");
        assert!(deep.iter().all(|m| m.path != "/"));
    }

    #[test]
    fn test_extract_url() {
        assert_eq!(extract_url("Route not found: /user").as_deref(), Some("/user"));
        assert_eq!(
            extract_url("404 Not Found for https://shop.test/cart/items?x=1").as_deref(),
            Some("/cart/items")
        );
        assert_eq!(extract_url("The route admin/users could not be found."), None);
    }

    #[test]
    fn test_route_table_from_json() {
        let table: RouteTable =
            serde_json::from_str(r#"[{"method":"GET","path":"/users","handler":"UserController@index"}]"#).unwrap();
        assert_eq!(table.routes()[0].handler, "UserController@index");
    }
}
