//! Ordered key/value query strings with explicit escaping.
//!
//! Keys and values are form-urlencoded. Composite values keep their structural
//! separators literal: `list` joins items with `,` and `nested` renders
//! `key=value;key=value` as used by WPS `datainputs`.
use url::form_urlencoded::byte_serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Plain(String),
    List(Vec<String>),
    Nested(Vec<(String, String)>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBuilder {
    pairs: Vec<(String, Value)>,
}

fn escape(s: &str) -> String {
    byte_serialize(s.as_bytes()).collect()
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pair(mut self, key: &str, value: impl ToString) -> Self {
        self.pairs
            .push((key.to_string(), Value::Plain(value.to_string())));
        self
    }

    pub fn opt_pair(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.pair(key, v),
            None => self,
        }
    }

    pub fn list<T: ToString>(mut self, key: &str, items: &[T]) -> Self {
        let items = items.iter().map(|i| i.to_string()).collect();
        self.pairs.push((key.to_string(), Value::List(items)));
        self
    }

    pub fn nested(mut self, key: &str, inner: Vec<(String, String)>) -> Self {
        self.pairs.push((key.to_string(), Value::Nested(inner)));
        self
    }

    pub fn render(self: &Self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::Plain(s) => escape(s),
                    Value::List(items) => items
                        .iter()
                        .map(|i| escape(i))
                        .collect::<Vec<_>>()
                        .join(","),
                    Value::Nested(inner) => inner
                        .iter()
                        .map(|(ik, iv)| format!("{}={}", escape(ik), escape(iv)))
                        .collect::<Vec<_>>()
                        .join(";"),
                };
                format!("{}={}", escape(k), value)
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Appends the rendered query to `base` with a `?` separator.
    pub fn to_url(self: &Self, base: &str) -> String {
        format!("{}?{}", base, self.render())
    }
}
