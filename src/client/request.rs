//! Query-string construction for list requests and parsing of paging headers.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Sort parameters for one predicate: `["<predicate>,<asc|desc>", "id"]`.
/// The `id` tiebreaker is left out when sorting by `id`; an empty predicate yields nothing.
pub fn sort_param(predicate: &str, ascending: bool) -> Vec<String> {
    if predicate.is_empty() {
        return Vec::new();
    }
    let mut out = vec![format!("{},{}", predicate, if ascending { "asc" } else { "desc" })];
    if predicate != "id" {
        out.push("id".to_string());
    }
    out
}

/// Ordered criteria filters, e.g. `title.contains -> ["matrix"]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterOptions {
    options: Vec<(String, Vec<String>)>,
}

impl FilterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds values to the named filter, creating it if needed. Returns whether anything changed.
    pub fn add<I, S>(&mut self, name: &str, values: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).filter(|v| !v.is_empty()).collect();
        match self.options.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => {
                let before = existing.len();
                for v in values {
                    if !existing.contains(&v) {
                        existing.push(v);
                    }
                }
                existing.len() != before
            }
            None if values.is_empty() => false,
            None => {
                self.options.push((name.to_string(), values));
                true
            }
        }
    }

    /// Removes one value; the filter disappears with its last value.
    pub fn remove(&mut self, name: &str, value: &str) -> bool {
        let Some(pos) = self.options.iter().position(|(n, _)| n == name) else {
            return false;
        };
        let values = &mut self.options[pos].1;
        let before = values.len();
        values.retain(|v| v != value);
        let changed = values.len() != before;
        if values.is_empty() {
            self.options.remove(pos);
        }
        changed
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.options.is_empty();
        self.options.clear();
        changed
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.options.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }
}

/// Paging, sorting and filtering options of a list request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Vec<String>,
    pub filter: FilterOptions,
    pub eagerload: Option<bool>,
}

impl RequestOptions {
    /// Query pairs: page, size, eagerload, one pair per filter value, then one per sort entry.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(size) = self.size {
            pairs.push(("size".to_string(), size.to_string()));
        }
        if let Some(eager) = self.eagerload {
            pairs.push(("eagerload".to_string(), eager.to_string()));
        }
        for (name, values) in self.filter.iter() {
            for v in values {
                pairs.push((name.to_string(), v.clone()));
            }
        }
        for s in &self.sort {
            pairs.push(("sort".to_string(), s.clone()));
        }
        pairs
    }
}

fn link_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<([^>]*)>\s*;\s*rel="([^"]+)""#).ok())
        .as_ref()
}

/// Page number per relation (`next`, `prev`, `last`, `first`) from a `Link` header.
/// Sections without a `page` query parameter are skipped.
pub fn parse_links(header: &str) -> BTreeMap<String, u64> {
    let Some(re) = link_regex() else {
        return BTreeMap::new();
    };
    re.captures_iter(header)
        .filter_map(|c| {
            let url = c.get(1)?.as_str();
            let rel = c.get(2)?.as_str();
            let query = url.split_once('?').map(|(_, q)| q).unwrap_or_default();
            let page = url::form_urlencoded::parse(query.as_bytes())
                .find(|(k, _)| k == "page")
                .and_then(|(_, v)| v.parse().ok())?;
            Some((rel.to_string(), page))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_param_adds_id_tiebreaker() {
        assert_eq!(sort_param("title", true), vec!["title,asc", "id"]);
        assert_eq!(sort_param("id", false), vec!["id,desc"]);
        assert!(sort_param("", true).is_empty());
    }

    #[test]
    fn filters_dedupe_values() {
        let mut f = FilterOptions::new();
        assert!(f.add("gender.in", ["DRAMA", "COMEDY"]));
        assert!(!f.add("gender.in", ["DRAMA"]));
        assert!(f.add("title.contains", ["war"]));
        assert!(f.remove("gender.in", "DRAMA"));
        assert!(f.remove("title.contains", "war"));
        assert_eq!(f.iter().count(), 1);
        assert!(f.clear());
        assert!(f.is_empty());
    }

    #[test]
    fn request_options_to_query() {
        let mut filter = FilterOptions::new();
        filter.add("gender.in", ["DRAMA", "COMEDY"]);
        let opts = RequestOptions {
            page: Some(2),
            size: Some(10),
            sort: sort_param("title", false),
            filter,
            eagerload: Some(true),
        };
        let query = opts.to_query();
        let q: Vec<(&str, &str)> = query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(
            q,
            vec![
                ("page", "2"),
                ("size", "10"),
                ("eagerload", "true"),
                ("gender.in", "DRAMA"),
                ("gender.in", "COMEDY"),
                ("sort", "title,desc"),
                ("sort", "id"),
            ]
        );
    }

    #[test]
    fn parses_link_header() {
        let links = parse_links(
            "</api/films?sort=id%2Casc&page=2&size=10>; rel=\"next\",</api/films?page=0&size=10>; rel=\"prev\",\
             </api/films?page=3&size=10>; rel=\"last\",</api/films?page=0&size=10>; rel=\"first\"",
        );
        assert_eq!(links.get("next"), Some(&2));
        assert_eq!(links.get("last"), Some(&3));
        assert_eq!(links.len(), 4);
        assert!(parse_links("garbage").is_empty());
    }
}
