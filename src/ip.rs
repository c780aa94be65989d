use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

/// Read-only view over request headers.
///
/// `header` returns the first value recorded for `name`. Whether lookups are
/// case-insensitive depends on the source: `http::HeaderMap` is, plain maps
/// match keys exactly.
pub trait HeaderSource {
    fn header(&self, name: &str) -> Option<&str>;
}

/// A value stored in a plain header map.
pub trait HeaderField {
    fn first_value(&self) -> Option<&str>;
}

impl HeaderField for String {
    fn first_value(&self) -> Option<&str> {
        Some(self.as_str())
    }
}

impl HeaderField for &str {
    fn first_value(&self) -> Option<&str> {
        Some(*self)
    }
}

impl<T: HeaderField> HeaderField for Vec<T> {
    fn first_value(&self) -> Option<&str> {
        self.first().and_then(HeaderField::first_value)
    }
}

impl<T: HeaderField> HeaderField for Option<T> {
    fn first_value(&self) -> Option<&str> {
        self.as_ref().and_then(HeaderField::first_value)
    }
}

impl HeaderSource for http::HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        // Keep UTF-8 values; `to_str` only accepts visible ASCII
        self.get(name)
            .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
    }
}

impl<K, V, S> HeaderSource for HashMap<K, V, S>
where
    K: Borrow<str> + Eq + Hash,
    V: HeaderField,
    S: BuildHasher,
{
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(HeaderField::first_value)
    }
}

impl<K, V> HeaderSource for BTreeMap<K, V>
where
    K: Borrow<str> + Ord,
    V: HeaderField,
{
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(HeaderField::first_value)
    }
}

/// Extract the client IP from proxy headers.
///
/// Priority:
///   1. `x-forwarded-for` (first comma-separated entry, trimmed)
///   2. `x-real-ip`
///   3. `cf-connecting-ip`
///
/// Empty values fall through to the next header.
pub fn extract_ip<H>(headers: &H) -> Option<String>
where
    H: HeaderSource + ?Sized,
{
    let forwarded = headers
        .header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim);

    non_empty(forwarded)
        .or_else(|| non_empty(headers.header("x-real-ip")))
        .or_else(|| non_empty(headers.header("cf-connecting-ip")))
        .map(str::to_string)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
