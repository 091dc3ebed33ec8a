//! Version resolution for FHIR package dependencies
//!
//! Follows the FHIR package specification rules for version references:
//! - https://confluence.hl7.org/spaces/FHIR/pages/35718629/NPM+Package+Specification
//! - https://build.fhir.org/ig/FHIR/ig-guidance/versions.html

use std::cmp::Ordering;

/// Select the best matching version for a version reference.
///
/// - missing, `current`, `latest`, `dev`: most recent release, unlabeled preferred
/// - `1.5.x`: highest patch of 1.5, unlabeled preferred
/// - `1.2`: treated as `1.2.x`
/// - `1.2.3`: exact match, else `1.2.3-<label>`; `1.2.3-ballot` falls back to `1.2.3`
pub fn select_version(versions: &[String], version_range: Option<&str>) -> Option<String> {
    if versions.is_empty() {
        return None;
    }

    match version_range.unwrap_or("") {
        "" | "current" | "latest" | "dev" => highest(versions.iter()),
        range if range.ends_with(".x") => select_x_range(versions, range.trim_end_matches(".x")),
        range if is_major_minor_only(range) => select_x_range(versions, range),
        range => select_exact_version(versions, range),
    }
}

/// Highest version, preferring releases without a label.
fn highest<'a>(versions: impl Iterator<Item = &'a String>) -> Option<String> {
    let (labeled, unlabeled): (Vec<&String>, Vec<&String>) =
        versions.partition(|v| v.contains('-'));
    let candidates = if unlabeled.is_empty() {
        labeled
    } else {
        unlabeled
    };

    candidates
        .into_iter()
        .max_by(|a, b| compare(a, b))
        .cloned()
}

fn select_x_range(versions: &[String], prefix: &str) -> Option<String> {
    let prefix_parts = numeric_parts(prefix)?;

    let matching = versions.iter().filter(|version| {
        let base = version.split('-').next().unwrap_or(version.as_str());
        numeric_parts(base).is_some_and(|parts| {
            parts.len() == prefix_parts.len() + 1 && parts.starts_with(&prefix_parts)
        })
    });

    highest(matching)
}

fn select_exact_version(versions: &[String], requested: &str) -> Option<String> {
    if let Some(exact) = versions.iter().find(|v| *v == requested) {
        return Some(exact.clone());
    }

    if let Some((unlabeled, _)) = requested.split_once('-') {
        if let Some(v) = versions.iter().find(|v| *v == unlabeled) {
            return Some(v.clone());
        }
    }

    let labeled_prefix = format!("{}-", requested);
    versions
        .iter()
        .filter(|v| v.starts_with(&labeled_prefix))
        .max_by(|a, b| compare(a, b))
        .cloned()
}

fn is_major_minor_only(version: &str) -> bool {
    numeric_parts(version).is_some_and(|parts| parts.len() == 2)
}

fn numeric_parts(version: &str) -> Option<Vec<u32>> {
    version.split('.').map(|p| p.parse().ok()).collect()
}

/// Compare dotted versions part by part, numerically where both parts are numbers.
fn compare(a: &str, b: &str) -> Ordering {
    let mut left = a.split(['.', '-']);
    let mut right = b.split(['.', '-']);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u32>(), r.parse::<u32>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}
