//! Helpers for reading and rewriting the URI query string.

use std::collections::BTreeMap;

use log::trace;
use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes left untouched when form-urlencoding a key or value.
const FORM_UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Mapping of decoded query string keys to their decoded values, keys kept sorted for stable
/// re-encoding.
///
/// Keys and values are raw bytes, so pairs which are not valid UTF-8 once decoded survive a
/// split and encode round trip.
pub(crate) type QueryStringMapping = BTreeMap<Vec<u8>, Vec<Vec<u8>>>;

/// Splits a query string into decoded pairs, in order of appearance.
///
/// A key with no `=` maps to an empty value.
pub(crate) fn pairs(query: Option<&str>) -> impl Iterator<Item = (Vec<u8>, Vec<u8>)> + '_ {
    query
        .into_iter()
        .flat_map(|q| q.split(is_separator))
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let mut sp = pair.splitn(2, '=');
            let k = sp.next().unwrap_or_default();
            let v = sp.next().unwrap_or_default();
            (form_url_decode(k), form_url_decode(v))
        })
}

/// The first decoded value for `name`.
///
/// Bytes which are not valid UTF-8 are replaced with `U+FFFD`.
pub(crate) fn first(query: Option<&str>, name: &str) -> Option<String> {
    pairs(query)
        .find(|(k, _)| k.as_slice() == name.as_bytes())
        .map(|(_, v)| match String::from_utf8(v) {
            Ok(value) => value,
            Err(e) => {
                trace!(" query value for `{}` is not valid UTF-8", name);
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        })
}

/// Collects the pairs of a query string into a `QueryStringMapping`.
pub(crate) fn split(query: Option<&str>) -> QueryStringMapping {
    pairs(query).fold(QueryStringMapping::new(), |mut mapping, (k, v)| {
        mapping.entry(k).or_insert_with(Vec::new).push(v);
        mapping
    })
}

/// Encodes a mapping back into a query string, sorted by key.
pub(crate) fn encode(mapping: &QueryStringMapping) -> String {
    mapping
        .iter()
        .flat_map(|(k, values)| {
            values
                .iter()
                .map(move |v| format!("{}={}", form_url_encode(k), form_url_encode(v)))
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn is_separator(c: char) -> bool {
    c == '&' || c == ';'
}

fn form_url_decode(raw: &str) -> Vec<u8> {
    percent_decode_str(&raw.replace('+', " ")).collect()
}

fn form_url_encode(raw: &[u8]) -> String {
    percent_encode(raw, FORM_UNRESERVED)
        .to_string()
        .replace("%20", "+")
}
