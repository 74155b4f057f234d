//! Domain models for fragments, member sets, and component identity.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The three parts a component is made of.
///
/// Ordering is significant: it is the fixed processing priority used to break
/// classification ties and the order member kinds are visited everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    Script,
    Style,
    Template,
}

impl FragmentKind {
    /// All kinds, in processing priority order.
    pub const ALL: [FragmentKind; 3] = [
        FragmentKind::Script,
        FragmentKind::Style,
        FragmentKind::Template,
    ];

    /// Stable lowercase name, matching the tag used in combined documents.
    pub fn name(&self) -> &'static str {
        match self {
            FragmentKind::Script => "script",
            FragmentKind::Style => "style",
            FragmentKind::Template => "template",
        }
    }

    /// Language hint used when a block carries no `lang` attribute.
    pub fn default_lang(&self) -> &'static str {
        match self {
            FragmentKind::Script => "js",
            FragmentKind::Style => "css",
            FragmentKind::Template => "html",
        }
    }

    /// Wrapper pair used when a kind is absent from the source document and a
    /// stub fragment has to be synthesized.
    pub fn default_wrappers(&self) -> (String, String) {
        (format!("<{}>", self.name()), format!("</{}>", self.name()))
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed three-slot mapping indexed by [`FragmentKind`].
///
/// Replaces the dynamic keyed-object access the problem invites: every lookup
/// is an exhaustive match, so a new kind cannot be half-supported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindMap<T> {
    script: T,
    style: T,
    template: T,
}

impl<T> KindMap<T> {
    pub fn get(&self, kind: FragmentKind) -> &T {
        match kind {
            FragmentKind::Script => &self.script,
            FragmentKind::Style => &self.style,
            FragmentKind::Template => &self.template,
        }
    }

    pub fn get_mut(&mut self, kind: FragmentKind) -> &mut T {
        match kind {
            FragmentKind::Script => &mut self.script,
            FragmentKind::Style => &mut self.style,
            FragmentKind::Template => &mut self.template,
        }
    }

    pub fn set(&mut self, kind: FragmentKind, value: T) {
        *self.get_mut(kind) = value;
    }

    /// Iterate slots in processing priority order.
    pub fn iter(&self) -> impl Iterator<Item = (FragmentKind, &T)> {
        FragmentKind::ALL.into_iter().map(move |k| (k, self.get(k)))
    }

    /// Build a map by evaluating `f` once per kind.
    pub fn from_fn(mut f: impl FnMut(FragmentKind) -> T) -> Self {
        Self {
            script: f(FragmentKind::Script),
            style: f(FragmentKind::Style),
            template: f(FragmentKind::Template),
        }
    }
}

/// One typed piece of a component.
///
/// `open_wrapper`/`close_wrapper` hold the verbatim tag text captured from
/// the combined document (attributes included); `content` is the inner text
/// with boundary whitespace trimmed. The same trim is applied on merge, so
/// the normalization cancels out across a round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub lang: String,
    pub content: String,
    pub open_wrapper: String,
    pub close_wrapper: String,
    /// Set once the fragment has been materialized on disk.
    pub path: Option<PathBuf>,
    /// Style-only `scoped`/`scope` attribute.
    pub scoped: bool,
}

impl Fragment {
    /// Synthesize the placeholder fragment used when a kind is entirely
    /// absent from the source document.
    pub fn stub(kind: FragmentKind) -> Self {
        let (open, close) = kind.default_wrappers();
        Self {
            kind,
            lang: kind.default_lang().to_owned(),
            content: String::new(),
            open_wrapper: open,
            close_wrapper: close,
            path: None,
            scoped: false,
        }
    }

    /// Reconstitute wrapper + content + wrapper as it appears in the
    /// combined document.
    pub fn to_block(&self) -> String {
        format!(
            "{}\n{}\n{}",
            self.open_wrapper, self.content, self.close_wrapper
        )
    }
}

/// Stable identifier for a component, derived from its canonical main path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentId(String);

impl ComponentId {
    /// Fingerprint a path. The path is canonicalized first (falling back to
    /// the given spelling when it does not exist yet), so a file reached
    /// through a symlink or a relative spelling maps to the same id
    /// everywhere.
    pub fn of_path(path: &Path) -> Self {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
        let mut hex = String::with_capacity(32);
        for byte in &digest[..16] {
            use fmt::Write;
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved member files for one component, best candidate first per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberSet {
    pub candidates: KindMap<Vec<PathBuf>>,
    /// Produced by the project-wide discovery strategy.
    pub cross_mode: bool,
    /// Produced by decomposing a combined document.
    pub split_mode: bool,
}

impl MemberSet {
    /// Best candidate for a kind, if any.
    pub fn primary(&self, kind: FragmentKind) -> Option<&Path> {
        self.candidates.get(kind).first().map(PathBuf::as_path)
    }

    /// Number of kinds with no candidate at all.
    pub fn missing_kinds(&self) -> usize {
        self.candidates.iter().filter(|(_, c)| c.is_empty()).count()
    }

    /// Whether `path` is one of the resolved primaries.
    pub fn contains_primary(&self, path: &Path) -> bool {
        FragmentKind::ALL
            .into_iter()
            .any(|kind| self.primary(kind) == Some(path))
    }
}
