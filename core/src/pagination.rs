//! RFC 5988 `Link` header parsing.

use std::collections::BTreeMap;

use url::Url;

/// Relation name (`next`, `prev`, `first`, `last`, ...) to absolute URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pagination {
    links: BTreeMap<String, String>,
}

impl Pagination {
    /// Parse a `Link` header value: comma-separated `<url>; rel="name"`
    /// entries. Malformed entries are skipped; a space-separated `rel` names
    /// several relations for one URL.
    pub fn parse(header: &str) -> Self {
        let mut links = BTreeMap::new();
        let mut rest = header;

        while let Some(open) = rest.find('<') {
            let Some(close) = rest[open..].find('>') else {
                break;
            };
            let url = rest[open + 1..open + close].trim();
            rest = &rest[open + close + 1..];

            let params_end = rest.find('<').unwrap_or(rest.len());
            let params = rest[..params_end].trim().trim_end_matches(',');
            for param in params.split(';') {
                let Some((key, value)) = param.split_once('=') else {
                    continue;
                };
                if !key.trim().eq_ignore_ascii_case("rel") {
                    continue;
                }
                for rel in value.trim().trim_matches('"').split_whitespace() {
                    links
                        .entry(rel.to_ascii_lowercase())
                        .or_insert_with(|| url.to_string());
                }
            }
            rest = &rest[params_end..];
        }

        Self { links }
    }

    pub fn get(&self, rel: &str) -> Option<&str> {
        self.links.get(rel).map(String::as_str)
    }

    pub fn next(&self) -> Option<&str> {
        self.get("next")
    }

    pub fn prev(&self) -> Option<&str> {
        self.get("prev")
    }

    pub fn first(&self) -> Option<&str> {
        self.get("first")
    }

    pub fn last(&self) -> Option<&str> {
        self.get("last")
    }

    pub fn has_next(&self) -> bool {
        self.links.contains_key("next")
    }

    /// The `page` query value of a relation's URL, for callers that reissue
    /// the same logical call with an overridden page argument.
    pub fn page_number(&self, rel: &str) -> Option<u64> {
        let url = Url::parse(self.get(rel)?).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok())
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.links.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
