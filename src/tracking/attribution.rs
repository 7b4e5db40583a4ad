//! Attribution extraction from the page query string

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Campaign reported to analytics tags when the page carries no `utm_campaign`
pub const DIRECT_CAMPAIGN: &str = "direct";

/// Marketing-source parameters present on the page URL.
///
/// The key set is open-ended (utm_*, gclid, fbclid, msclkid, ...). A key is
/// present only if the page URL supplied it; a parameter supplied with an
/// empty value is kept as an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attribution(BTreeMap<String, String>);

impl Attribution {
    /// Read every query parameter of `page_url`. Duplicate keys keep the last value.
    pub fn from_url(page_url: &Url) -> Self {
        let mut params = BTreeMap::new();
        for (key, value) in page_url.query_pairs() {
            params.insert(key.into_owned(), value.into_owned());
        }
        Self(params)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn campaign(&self) -> Option<&str> {
        self.get("utm_campaign").filter(|c| !c.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy of this mapping without the given keys
    pub(crate) fn without(&self, reserved: &[&str]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| !reserved.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl FromIterator<(String, String)> for Attribution {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attribution(url: &str) -> Attribution {
        Attribution::from_url(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_extracts_exactly_the_supplied_keys() {
        let attr = attribution(
            "https://site.example/sleep/supplements/?utm_source=newsletter&utm_campaign=fall",
        );
        let expected: Attribution = [
            ("utm_source".to_string(), "newsletter".to_string()),
            ("utm_campaign".to_string(), "fall".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(attr, expected);
        assert_eq!(attr.get("utm_medium"), None);
    }

    #[test]
    fn test_no_query_yields_empty_mapping() {
        let attr = attribution("https://site.example/sleep/devices/");
        assert!(attr.is_empty());
        assert_eq!(attr.campaign(), None);
    }

    #[test]
    fn test_duplicate_keys_last_value_wins() {
        let attr = attribution("https://site.example/?gclid=first&gclid=second");
        assert_eq!(attr.get("gclid"), Some("second"));
        assert_eq!(attr.len(), 1);
    }

    #[test]
    fn test_empty_value_is_distinct_from_absent() {
        let attr = attribution("https://site.example/?utm_term=&fbclid=abc%20def");
        assert_eq!(attr.get("utm_term"), Some(""));
        assert_eq!(attr.get("fbclid"), Some("abc def"));
        assert_eq!(attr.get("utm_content"), None);
    }

    #[test]
    fn test_campaign_ignores_empty_value() {
        let attr = attribution("https://site.example/?utm_campaign=");
        assert_eq!(attr.campaign(), None);
    }
}
