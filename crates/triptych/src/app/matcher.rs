//! Naming-similarity ranking for ambiguous member candidates.

use std::path::{Path, PathBuf};

use crate::domain::model::FragmentKind;

/// Path pieces the tiers compare on.
#[derive(Debug, Clone, Default)]
struct PathParts {
    /// File name without its final extension, lowercased.
    stem: String,
    /// Full file name, lowercased.
    base: String,
    /// Name of the containing directory, lowercased.
    folder: String,
}

impl PathParts {
    fn of(path: &Path) -> Self {
        let base = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .and_then(|n| n.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let folder = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        Self { stem, base, folder }
    }
}

/// Rank candidates of one kind by naming similarity to the anchor file,
/// best match first.
///
/// Tier 1: candidate stem equals the anchor stem and the anchor is the
/// self-titled file of its directory (`button/button.js` seen from
/// `button/button.html`). Tier 2: stems match without the directory-name
/// coincidence. Tier 3: the anchor is an `index.*` entry point and the
/// candidate's base name starts with the kind name or the candidate's folder
/// name, optionally pluralized. Candidates matching no tier are dropped;
/// within a tier, input order is preserved.
pub fn rank(kind: FragmentKind, candidates: &[PathBuf], anchor: &Path) -> Vec<PathBuf> {
    if candidates.len() < 2 {
        return candidates.to_vec();
    }

    let anchor_parts = PathParts::of(anchor);
    let mut tiers: [Vec<PathBuf>; 3] = [Vec::new(), Vec::new(), Vec::new()];

    for candidate in candidates {
        let parts = PathParts::of(candidate);
        if let Some(tier) = tier_of(kind, &anchor_parts, &parts) {
            tiers[usize::from(tier) - 1].push(candidate.clone());
        }
    }

    let [mut ranked, tier2, tier3] = tiers;
    ranked.extend(tier2);
    ranked.extend(tier3);
    ranked
}

/// Whether two ranked candidates are equally plausible matches for the
/// anchor, landing in the same tier. Only then is there real ambiguity worth
/// surfacing to the host; a clear tier winner is taken silently.
pub fn is_tied(kind: FragmentKind, first: &Path, second: &Path, anchor: &Path) -> bool {
    let anchor_parts = PathParts::of(anchor);
    let first = tier_of(kind, &anchor_parts, &PathParts::of(first));
    let second = tier_of(kind, &anchor_parts, &PathParts::of(second));
    first.is_some() && first == second
}

fn tier_of(kind: FragmentKind, anchor: &PathParts, candidate: &PathParts) -> Option<u8> {
    if anchor.stem == candidate.stem {
        if anchor.stem == anchor.folder {
            Some(1)
        } else {
            Some(2)
        }
    } else if anchor.stem == "index"
        && (base_matches(&candidate.base, kind.name())
            || base_matches(&candidate.base, &candidate.folder))
    {
        Some(3)
    } else {
        None
    }
}

/// Whether `base` is `prefix` or `prefix + "s"` followed by an extension.
fn base_matches(base: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    let Some(rest) = base.strip_prefix(prefix) else {
        return false;
    };
    let rest = rest.strip_prefix('s').unwrap_or(rest);
    rest.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(raw: &[&str]) -> Vec<PathBuf> {
        raw.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn single_candidate_is_returned_unchanged() {
        let candidates = paths(&["a/whatever.css"]);
        let ranked = rank(
            FragmentKind::Style,
            &candidates,
            Path::new("a/button.js"),
        );
        assert_eq!(ranked, candidates);
    }

    #[test]
    fn self_titled_directory_outranks_plain_stem_match() {
        let candidates = paths(&["x/button/other.js", "x/button/button.js"]);
        let ranked = rank(
            FragmentKind::Script,
            &candidates,
            Path::new("x/button/button.html"),
        );
        // button.js hits tier 1, other.js matches no tier and is dropped.
        assert_eq!(ranked, paths(&["x/button/button.js"]));
    }

    #[test]
    fn stem_match_without_folder_coincidence_is_tier_two() {
        let candidates = paths(&["src/widgets/card.css", "src/widgets/list.css"]);
        let ranked = rank(
            FragmentKind::Style,
            &candidates,
            Path::new("src/widgets/card.js"),
        );
        assert_eq!(ranked, paths(&["src/widgets/card.css"]));
    }

    #[test]
    fn index_anchor_prefers_folder_or_kind_named_siblings() {
        let candidates = paths(&["widget/widget.html", "widget/other.html"]);
        let ranked = rank(
            FragmentKind::Template,
            &candidates,
            Path::new("widget/index.js"),
        );
        assert_eq!(ranked, paths(&["widget/widget.html"]));

        let candidates = paths(&["widget/templates.html", "widget/other.html"]);
        let ranked = rank(
            FragmentKind::Template,
            &candidates,
            Path::new("widget/index.js"),
        );
        // "templates" is the pluralized kind name.
        assert_eq!(ranked, paths(&["widget/templates.html"]));
    }

    #[test]
    fn output_is_a_stable_partition_by_tier() {
        let candidates = paths(&[
            "btn/extra.js",
            "btn/btns.js",
            "btn/btn.js",
            "btn/more.js",
        ]);
        let ranked = rank(FragmentKind::Script, &candidates, Path::new("btn/btn.css"));
        // Tier 1 first; unmatched names dropped; ties keep listing order.
        assert_eq!(ranked, paths(&["btn/btn.js"]));

        let candidates = paths(&["w/a.html", "w/w.html", "w/ws.html"]);
        let ranked = rank(FragmentKind::Template, &candidates, Path::new("w/index.ts"));
        assert_eq!(ranked, paths(&["w/w.html", "w/ws.html"]));
    }

    #[test]
    fn candidates_in_the_same_tier_are_tied() {
        // Two folder-named matches for an index anchor: real ambiguity.
        assert!(is_tied(
            FragmentKind::Style,
            Path::new("panel/panel.css"),
            Path::new("panel/styles.css"),
            Path::new("panel/index.js"),
        ));
        // A stem match against a folder-name match: the stem match wins
        // outright.
        assert!(!is_tied(
            FragmentKind::Style,
            Path::new("panel/index.css"),
            Path::new("panel/panel.css"),
            Path::new("panel/index.js"),
        ));
    }
}
