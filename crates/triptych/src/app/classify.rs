//! Path classification over configured extension sets.

use std::path::Path;

use crate::domain::model::FragmentKind;
use crate::infra::config::Config;

/// Decide which fragment kind a path belongs to, if any.
///
/// Matching is case-insensitive and suffix-based. The longest configured
/// suffix wins, so a compound pseudo-extension such as `.css.vue` claims the
/// file before the inner `.vue` can; ties between kinds fall to the fixed
/// priority script > style > template.
pub fn classify(config: &Config, path: &Path) -> Option<FragmentKind> {
    let name = lowercase_file_name(path)?;
    let mut best: Option<(usize, FragmentKind)> = None;

    for kind in FragmentKind::ALL {
        if let Some(len) = longest_suffix(&name, &config.exts_for(kind))
            && best.map(|(max, _)| len > max).unwrap_or(true)
        {
            best = Some((len, kind));
        }
    }

    best.map(|(_, kind)| kind)
}

/// Whether the path is a single combined document.
///
/// A combined suffix only counts when no per-kind suffix matches at least as
/// specifically: `comp.css.vue` is a style aggregate, not a combined
/// document, even though it ends in `.vue`.
pub fn is_combined(config: &Config, path: &Path) -> bool {
    let Some(name) = lowercase_file_name(path) else {
        return false;
    };
    let Some(combined_len) = longest_suffix(&name, &config.combined_exts()) else {
        return false;
    };

    FragmentKind::ALL
        .into_iter()
        .filter_map(|kind| longest_suffix(&name, &config.exts_for(kind)))
        .all(|kind_len| kind_len < combined_len)
}

fn lowercase_file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_ascii_lowercase)
}

/// Length of the longest matching suffix, requiring a non-empty stem in
/// front of it.
fn longest_suffix(name: &str, exts: &[String]) -> Option<usize> {
    exts.iter()
        .filter(|ext| !ext.is_empty() && name.len() > ext.len() && name.ends_with(ext.as_str()))
        .map(|ext| ext.len())
        .max()
}
