//! Component/session tracking.
//!
//! Owns the fingerprint-to-member-set map, the single active component, and
//! the debounced work queue. All state is caller-owned: construct a
//! [`Session`] per project root, feed it host notifications, and drain due
//! work with [`Session::poll_due`] from the host's event loop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::app::classify::{classify, is_combined};
use crate::app::matcher;
use crate::app::resolve::Resolver;
use crate::app::split::SplitEngine;
use crate::domain::errors::ComponentError;
use crate::domain::model::{ComponentId, FragmentKind, MemberSet};
use crate::infra::config::Config;
use crate::infra::host::EditorHost;

/// One known component: its canonical main path and resolved members.
#[derive(Debug, Clone)]
pub struct ComponentRecord {
    pub id: ComponentId,
    pub main: PathBuf,
    pub members: MemberSet,
    /// Fragment paths the host reported closed. Closing a fragment does not
    /// discard the cached member set.
    pub closed: Vec<PathBuf>,
    /// Bumped whenever the component's state is superseded; stale pending
    /// work detects the mismatch and no-ops.
    pub generation: u64,
}

#[derive(Debug)]
enum PendingAction {
    Resplit { main: PathBuf },
    Reresolve { path: PathBuf },
}

#[derive(Debug)]
struct Pending {
    due: Instant,
    generation: u64,
    id: Option<ComponentId>,
    action: PendingAction,
}

/// Session-scoped component tracker.
pub struct Session {
    root: PathBuf,
    config: Config,
    engine: SplitEngine,
    components: HashMap<ComponentId, ComponentRecord>,
    /// Fingerprint of every member path, pointing at the owning component.
    index: HashMap<ComponentId, ComponentId>,
    active: Option<ComponentId>,
    pending: Vec<Pending>,
    /// Supersession counter for activation-triggered re-resolution.
    activation_generation: u64,
}

impl Session {
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
            engine: SplitEngine::new(),
            components: HashMap::new(),
            index: HashMap::new(),
            active: None,
            pending: Vec::new(),
            activation_generation: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The currently active component, if any.
    pub fn active(&self) -> Option<&ComponentRecord> {
        self.active.as_ref().and_then(|id| self.components.get(id))
    }

    /// O(1) reverse lookup from any member path to its owning component.
    pub fn record_for(&self, path: &Path) -> Option<&ComponentRecord> {
        let id = ComponentId::of_path(path);
        self.index
            .get(&id)
            .and_then(|owner| self.components.get(owner))
    }

    /// Fast-reject gate run before any resolution work.
    ///
    /// A path is supported when it classifies (or is a combined document),
    /// its display column is enabled, and it is neither under an excluded
    /// directory nor outside recognized component territory. Materialized
    /// split fragments are always supported: they already belong to a
    /// component.
    pub fn is_supported(&self, path: &Path) -> bool {
        let kind = classify(&self.config, path);
        let combined = is_combined(&self.config, path);
        if kind.is_none() && !combined {
            return false;
        }
        if let Some(kind) = kind
            && self.config.column_of(kind).is_none()
        {
            return false;
        }
        if SplitEngine::is_split_file(&self.config, path) {
            return true;
        }

        let resolver = Resolver::new(&self.config, &self.root);
        !resolver.is_excluded(path) && resolver.in_component_dirs(path)
    }

    /// A file was opened: resolve its component and ask the host to display
    /// every member.
    pub fn notify_opened(
        &mut self,
        host: &mut dyn EditorHost,
        path: &Path,
    ) -> Result<Option<ComponentId>, ComponentError> {
        if !self.is_supported(path) {
            tracing::debug!(path = %path.display(), "unsupported path, skipping");
            return Ok(None);
        }
        self.resolve_and_open(host, path).map(Some)
    }

    /// A file became the focused editor. If it is not already the active
    /// component's fragment of its kind, schedule a debounced re-resolution;
    /// this guards against feedback loops when the host activates a fragment
    /// the tracker itself just opened.
    pub fn notify_activated(&mut self, path: &Path, now: Instant) {
        if let Some(record) = self.active()
            && let Some(kind) = classify(&self.config, path)
            && record.members.primary(kind) == Some(path)
        {
            return;
        }
        if !self.is_supported(path) {
            return;
        }

        self.activation_generation += 1;
        self.pending.push(Pending {
            due: now + self.config.resolve_delay(),
            generation: self.activation_generation,
            id: None,
            action: PendingAction::Reresolve {
                path: path.to_path_buf(),
            },
        });
    }

    /// A file was closed. The fragment is marked closed but the component's
    /// member set stays cached so reopening is cheap.
    pub fn notify_closed(&mut self, path: &Path) {
        let id = ComponentId::of_path(path);
        if let Some(owner) = self.index.get(&id).cloned()
            && let Some(record) = self.components.get_mut(&owner)
            && !record.closed.iter().any(|p| p == path)
        {
            record.closed.push(path.to_path_buf());
        }
    }

    /// A file was saved. Saving a materialized fragment merges immediately
    /// and returns the reassembled document's path; saving a combined
    /// document schedules a debounced re-split.
    pub fn notify_saved(
        &mut self,
        path: &Path,
        now: Instant,
    ) -> Result<Option<PathBuf>, ComponentError> {
        if self.engine.owner_of(path).is_some() {
            let main = self.engine.merge(path)?;
            return Ok(Some(main));
        }

        if is_combined(&self.config, path)
            && !SplitEngine::is_split_file(&self.config, path)
            && self.engine.component_for_main(path).is_some()
        {
            let id = ComponentId::of_path(path);
            let generation = match self.components.get_mut(&id) {
                Some(record) => {
                    record.generation += 1;
                    record.generation
                }
                None => 0,
            };
            self.pending.push(Pending {
                due: now + self.config.resplit_delay(),
                generation,
                id: Some(id),
                action: PendingAction::Resplit {
                    main: path.to_path_buf(),
                },
            });
        }
        Ok(None)
    }

    /// Execute every pending debounced action whose deadline has passed.
    /// Superseded actions (generation mismatch) are dropped silently.
    pub fn poll_due(
        &mut self,
        host: &mut dyn EditorHost,
        now: Instant,
    ) -> Result<(), ComponentError> {
        while let Some(idx) = self.pending.iter().position(|p| p.due <= now) {
            let pending = self.pending.remove(idx);
            if self.is_stale(&pending) {
                tracing::debug!("dropping superseded pending action");
                continue;
            }
            match pending.action {
                PendingAction::Resplit { main } => self.run_resplit(host, &main)?,
                PendingAction::Reresolve { path } => {
                    self.resolve_and_open(host, &path)?;
                }
            }
        }
        Ok(())
    }

    fn is_stale(&self, pending: &Pending) -> bool {
        match (&pending.id, &pending.action) {
            (Some(id), _) => self
                .components
                .get(id)
                .map(|record| record.generation != pending.generation)
                .unwrap_or(true),
            (None, PendingAction::Reresolve { .. }) => {
                pending.generation != self.activation_generation
            }
            _ => false,
        }
    }

    fn resolve_and_open(
        &mut self,
        host: &mut dyn EditorHost,
        path: &Path,
    ) -> Result<ComponentId, ComponentError> {
        // A materialized fragment maps straight back to its component.
        if let Some(component) = self.engine.owner_of(path) {
            let id = component.id.clone();
            if let Some(record) = self.components.get(&id) {
                let record = record.clone();
                self.active = Some(id.clone());
                self.display(host, &record);
                return Ok(id);
            }
        }

        let resolver = Resolver::new(&self.config, &self.root);
        let members = resolver.resolve(path, &mut self.engine)?;

        // The clicked path is the canonical main file: the combined document
        // in split mode, the anchor member otherwise.
        let main = path.to_path_buf();
        let id = ComponentId::of_path(&main);

        let mut record = ComponentRecord {
            id: id.clone(),
            main,
            members,
            closed: Vec::new(),
            generation: self
                .components
                .get(&id)
                .map(|r| r.generation)
                .unwrap_or_default(),
        };

        // Let the host arbitrate real ambiguity: only when the two best
        // candidates matched in the same tier. The promoted choice becomes
        // the recorded primary.
        for kind in FragmentKind::ALL {
            let candidates = record.members.candidates.get_mut(kind);
            if candidates.len() > 1
                && matcher::is_tied(kind, &candidates[0], &candidates[1], path)
                && let Some(chosen) = host.prompt_choice(candidates)
                && let Some(pos) = candidates.iter().position(|c| *c == chosen)
            {
                candidates.swap(0, pos);
            }
        }

        self.register(&record);
        self.active = Some(id.clone());
        self.display(host, &record);
        self.components.insert(id.clone(), record);
        tracing::debug!(component = %id, path = %path.display(), "component activated");
        Ok(id)
    }

    /// Register the fingerprint of the main path and of every resolved
    /// primary, all pointing at the same component record.
    fn register(&mut self, record: &ComponentRecord) {
        self.index.insert(record.id.clone(), record.id.clone());
        for kind in FragmentKind::ALL {
            if let Some(primary) = record.members.primary(kind) {
                self.index
                    .insert(ComponentId::of_path(primary), record.id.clone());
            }
        }
    }

    fn display(&self, host: &mut dyn EditorHost, record: &ComponentRecord) {
        for kind in FragmentKind::ALL {
            let Some(column) = self.config.column_of(kind) else {
                continue;
            };
            if let Some(primary) = record.members.primary(kind) {
                host.display_fragment(primary, column);
            }
        }
    }

    fn run_resplit(
        &mut self,
        host: &mut dyn EditorHost,
        main: &Path,
    ) -> Result<(), ComponentError> {
        let id = ComponentId::of_path(main);
        let previous: Vec<PathBuf> = self
            .engine
            .component_for_main(main)
            .map(|c| c.files.iter().map(|(_, p)| p.clone()).collect())
            .unwrap_or_default();

        // The host must confirm the old fragments are closed before their
        // files are replaced; an unconfirmed close aborts the swap and the
        // previous member set stays in force.
        for stale in &previous {
            if !host.close_fragment(stale) {
                return Err(ComponentError::Timeout {
                    waited: self.config.close_wait(),
                });
            }
        }

        let files = self.engine.resplit(&self.config, &self.root, main)?;

        if let Some(record) = self.components.get_mut(&id) {
            for kind in FragmentKind::ALL {
                record
                    .members
                    .candidates
                    .set(kind, vec![files.get(kind).clone()]);
            }
            record.closed.clear();
            let record = record.clone();
            self.register(&record);
            self.display(host, &record);
        }
        Ok(())
    }
}
