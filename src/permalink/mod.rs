//! The viewer URL: `https://host/?<legacy query>#/map?<canonical params>`

pub mod legacy;
pub mod params;
pub mod sync;

use crate::permalink::params::QueryParams;
use crate::Result;
use std::fmt;
use std::str::FromStr;

pub use legacy::{translate, LegacyTranslation};
pub use params::PermalinkState;

pub const DEFAULT_ROUTE: &str = "/map";

/// A viewer URL split into its legacy query and its hash route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermalinkUrl {
    /// Scheme, host and path, without query or fragment
    pub base: String,
    pub legacy: QueryParams,
    pub route: String,
    pub params: QueryParams,
}

impl PermalinkUrl {
    pub fn new(base: impl Into<String>, params: QueryParams) -> Self {
        Self {
            base: base.into(),
            legacy: QueryParams::new(),
            route: DEFAULT_ROUTE.to_string(),
            params,
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let url = url::Url::parse(input.trim())?;

        let mut base = url.clone();
        base.set_query(None);
        base.set_fragment(None);

        let legacy = url.query().map(QueryParams::parse).unwrap_or_default();
        let (route, params) = match url.fragment() {
            Some(fragment) => {
                let (route, query) = fragment.split_once('?').unwrap_or((fragment, ""));
                (route.to_string(), QueryParams::parse(query))
            }
            None => (DEFAULT_ROUTE.to_string(), QueryParams::new()),
        };

        Ok(Self {
            base: base.to_string(),
            legacy,
            route: if route.is_empty() {
                DEFAULT_ROUTE.to_string()
            } else {
                route
            },
            params,
        })
    }

    /// Same URL below another hash route
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        let route = route.into();
        if !route.is_empty() {
            self.route = route;
        }
        self
    }

    /// Same URL carrying `legacy` in its query
    pub fn with_legacy(mut self, legacy: QueryParams) -> Self {
        self.legacy = legacy;
        self
    }

    pub fn has_legacy(&self) -> bool {
        !self.legacy.is_empty()
    }

    /// Same URL with the given legacy keys removed
    pub fn without_legacy<'a, I>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        for key in keys {
            self.legacy.remove(key);
        }
        self
    }
}

impl fmt::Display for PermalinkUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        if !self.legacy.is_empty() {
            write!(f, "?{}", self.legacy)?;
        }
        write!(f, "#{}", self.route)?;
        if !self.params.is_empty() {
            write!(f, "?{}", self.params)?;
        }
        Ok(())
    }
}

impl FromStr for PermalinkUrl {
    type Err = Box<dyn std::error::Error + Send + Sync>;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_legacy_and_hash() {
        let url = PermalinkUrl::parse(
            "https://map.geo.admin.ch/?lang=fr&E=2600000&N=1200000#/map?topic=ech&layers=a,f",
        )
        .unwrap();

        assert_eq!(url.base, "https://map.geo.admin.ch/");
        assert_eq!(url.legacy.get("E"), Some("2600000"));
        assert_eq!(url.route, "/map");
        assert_eq!(url.params.get("layers"), Some("a,f"));
    }

    #[test]
    fn test_display_drops_empty_parts() {
        let mut params = QueryParams::new();
        params.insert("lang", "de");
        let url = PermalinkUrl::new("https://map.geo.admin.ch/", params);

        assert_eq!(url.to_string(), "https://map.geo.admin.ch/#/map?lang=de");
        assert_eq!(url.clone().to_string().parse::<PermalinkUrl>().unwrap(), url);
    }

    #[test]
    fn test_custom_route_and_query() {
        let mut params = QueryParams::new();
        params.insert("lang", "de");
        let mut legacy = QueryParams::new();
        legacy.insert("utm_source", "mail");

        let url = PermalinkUrl::new("https://map.geo.admin.ch/", params)
            .with_route("/embed")
            .with_legacy(legacy);
        assert_eq!(
            url.to_string(),
            "https://map.geo.admin.ch/?utm_source=mail#/embed?lang=de"
        );
        assert_eq!(PermalinkUrl::parse(&url.to_string()).unwrap(), url);
    }

    #[test]
    fn test_strip_consumed_keys() {
        let url = PermalinkUrl::parse("https://map.geo.admin.ch/?E=1&N=2&utm=x")
            .unwrap()
            .without_legacy(["E", "N"]);

        assert_eq!(url.to_string(), "https://map.geo.admin.ch/?utm=x#/map");
    }

    #[test]
    fn test_invalid_url() {
        assert!(PermalinkUrl::parse("not a url").is_err());
    }
}
