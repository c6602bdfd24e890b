//! Validation logic for label and metric names.
//!
//! Names follow the Prometheus data model (`[a-zA-Z_][a-zA-Z0-9_]*`). Upper-case chars are allowed
//! since some established label names (e.g., `adminState`) use them.

use crate::descriptors::MetricDescriptor;

const fn is_valid_start_name_char(ch: u8) -> bool {
    ch == b'_' || ch.is_ascii_alphabetic()
}

const fn is_valid_name_char(ch: u8) -> bool {
    ch == b'_' || ch.is_ascii_alphanumeric()
}

pub(crate) const fn validate_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name cannot be empty");
    }

    let name_bytes = name.as_bytes();
    let mut idx = 0;
    while idx < name.len() {
        if name_bytes[idx] > 127 {
            return Err("name contains non-ASCII chars");
        }
        if idx == 0 && !is_valid_start_name_char(name_bytes[idx]) {
            return Err("name starts with disallowed char (allowed chars: [_a-zA-Z])");
        } else if !is_valid_name_char(name_bytes[idx]) {
            return Err("name contains disallowed char (allowed chars: [_a-zA-Z0-9])");
        }
        idx += 1;
    }
    Ok(())
}

/// Checks that a label name is valid. Names starting with `__` are reserved by Prometheus.
pub(crate) const fn validate_label_name(name: &str) -> Result<(), &'static str> {
    let name_bytes = name.as_bytes();
    if name_bytes.len() >= 2 && name_bytes[0] == b'_' && name_bytes[1] == b'_' {
        return Err("label names starting with `__` are reserved");
    }
    validate_name(name)
}

const fn str_eq(lhs: &str, rhs: &str) -> bool {
    let (lhs, rhs) = (lhs.as_bytes(), rhs.as_bytes());
    if lhs.len() != rhs.len() {
        return false;
    }
    let mut idx = 0;
    while idx < lhs.len() {
        if lhs[idx] != rhs[idx] {
            return false;
        }
        idx += 1;
    }
    true
}

/// Returns the first label name repeated in `labels`, if any.
pub(crate) const fn find_duplicate_label(labels: &[&'static str]) -> Option<&'static str> {
    let mut i = 0;
    while i < labels.len() {
        let mut j = i + 1;
        while j < labels.len() {
            if str_eq(labels[i], labels[j]) {
                return Some(labels[i]);
            }
            j += 1;
        }
        i += 1;
    }
    None
}

/// Checks that a label name is valid.
#[track_caller]
pub const fn assert_label_name(name: &str) {
    if let Err(err) = validate_label_name(name) {
        panic!("{}", err);
    }
}

/// Same as [`assert_label_name()`], but for multiple names. Also checks that names are unique.
#[track_caller]
pub const fn assert_label_names(names: &[&'static str]) {
    let mut idx = 0;
    while idx < names.len() {
        assert_label_name(names[idx]);
        idx += 1;
    }
    if find_duplicate_label(names).is_some() {
        panic!("label names must be unique within a metric");
    }
}

/// Checks that a metric name is valid.
#[track_caller]
pub const fn assert_metric_name(name: &str) {
    if let Err(err) = validate_name(name) {
        panic!("{}", err);
    }
}

/// Checks names of all metrics in a catalog and that metric names are unique. Intended to be used
/// in `const` context so that a malformed catalog fails compilation.
#[track_caller]
pub const fn assert_catalog(catalog: &[MetricDescriptor]) {
    let mut i = 0;
    while i < catalog.len() {
        assert_metric_name(catalog[i].name);
        assert_label_names(catalog[i].labels);

        let mut j = i + 1;
        while j < catalog.len() {
            if str_eq(catalog[i].name, catalog[j].name) {
                panic!("metric names must be unique within a catalog");
            }
            j += 1;
        }
        i += 1;
    }
}
