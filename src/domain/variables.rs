// Grafana template variables forwarded with a report request
use std::collections::BTreeMap;

pub const VARIABLE_PREFIX: &str = "var-";

/// `var-<name>=<value>` pairs, keys sorted, values in the order received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables(BTreeMap<String, Vec<String>>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the `var-` prefixed parameters of a query string.
    pub fn from_query<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut variables = Self::new();
        for (key, value) in params {
            let key = key.into();
            if key.starts_with(VARIABLE_PREFIX) {
                variables.add(key, value);
            }
        }
        variables
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flattened `(key, value)` pairs, ready for a query string.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Every value joined with ", ", used as the report subtitle.
    pub fn summary(&self) -> String {
        self.0
            .values()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// One `(name, values)` entry per variable, the name without its `var-`
    /// prefix and the values joined with ", ".
    pub fn entries(&self) -> impl Iterator<Item = (&str, String)> {
        self.0.iter().map(|(k, values)| {
            let name = k.strip_prefix(VARIABLE_PREFIX).unwrap_or(k);
            (name, values.join(", "))
        })
    }

    pub fn to_query_string(&self) -> String {
        self.pairs()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}
