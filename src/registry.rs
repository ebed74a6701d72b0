//! # Model Registry
//!
//! Loads models from a [`DocumentStore`] and keeps them in memory by location.
//!
//! - A model's behavioral and visual documents are fetched as one concurrent
//!   pair.
//! - External links are loaded as a concurrent fan-out and instantiated into
//!   their groups before the importing model is handed out.
//! - A location is never fetched twice. A load in flight is shared by every
//!   caller asking for the same location, including importers in the same
//!   batch.
//! - A link that would wait on its own importer is a
//!   [`LinkCycle`](LoadError::LinkCycle); the group degrades to a broken link.

use crate::blueprint::Blueprint;
use crate::compiler::{self, Compilation};
use crate::config::CompilerOptions;
use crate::diagnostics::DiagnosticKind;
use crate::error::{LoadError, StoreError};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Behavioral,
    Visual,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Behavioral => write!(f, "behavioral"),
            Self::Visual => write!(f, "visual"),
        }
    }
}

/// Storage collaborator. Locations are compared as plain strings.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, location: &str, kind: DocumentKind) -> Result<String, StoreError>;

    async fn save(&self, location: &str, kind: DocumentKind, text: String) -> Result<(), StoreError>;
}

/// Document store kept in memory, counting fetches per location
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: DashMap<(String, DocumentKind), String>,
    fetches: DashMap<String, usize>,
    total: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, location: impl Into<String>, kind: DocumentKind, text: impl Into<String>) {
        self.documents.insert((location.into(), kind), text.into());
    }

    pub fn document(&self, location: &str, kind: DocumentKind) -> Option<String> {
        self.documents
            .get(&(location.to_string(), kind))
            .map(|text| text.clone())
    }

    /// Documents fetched from `location` so far
    pub fn fetch_count(&self, location: &str) -> usize {
        self.fetches.get(location).map(|count| *count).unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, location: &str, kind: DocumentKind) -> Result<String, StoreError> {
        *self.fetches.entry(location.to_string()).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::SeqCst);
        self.document(location, kind).ok_or_else(|| StoreError::NotFound {
            location: location.to_string(),
            kind: kind.to_string(),
        })
    }

    async fn save(&self, location: &str, kind: DocumentKind, text: String) -> Result<(), StoreError> {
        self.insert(location, kind, text);
        Ok(())
    }
}

type SharedLoad = Shared<BoxFuture<'static, Result<Arc<Blueprint>, LoadError>>>;

#[derive(Clone)]
pub struct ModelRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn DocumentStore>,
    /// Layout for geometry missing from loaded documents, and compile settings
    options: CompilerOptions,
    models: DashMap<String, Arc<Blueprint>>,
    pending: DashMap<String, SharedLoad>,
    /// importer location -> link locations it is currently waiting on
    waits: Mutex<HashMap<String, Vec<String>>>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_options(store, CompilerOptions::default())
    }

    pub fn with_options(store: Arc<dyn DocumentStore>, options: CompilerOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                options,
                models: DashMap::new(),
                pending: DashMap::new(),
                waits: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Registered model, without fetching
    pub fn get(&self, location: &str) -> Option<Arc<Blueprint>> {
        self.inner.models.get(location).map(|model| model.clone())
    }

    pub fn contains(&self, location: &str) -> bool {
        self.inner.models.contains_key(location)
    }

    pub fn len(&self) -> usize {
        self.inner.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.models.is_empty()
    }

    /// Forget a model so the next load fetches it again
    pub fn evict(&self, location: &str) -> Option<Arc<Blueprint>> {
        self.inner.models.remove(location).map(|(_, model)| model)
    }

    /// Load a model and everything it links to
    pub async fn load(&self, location: &str) -> Result<Arc<Blueprint>, LoadError> {
        if let Some(model) = self.get(location) {
            tracing::debug!("[REGISTRY] '{}' already registered", location);
            return Ok(model);
        }
        let (load, _) = self.pending_load(location);
        load.await
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.inner.options
    }

    /// Load a model and compile it with the registry's options
    pub async fn compile(&self, location: &str) -> Result<Compilation, LoadError> {
        let model = self.load(location).await?;
        Ok(compiler::compile_blueprint(&model, &self.inner.options))
    }

    /// Split a model, write both documents and register it
    pub async fn save(&self, location: &str, blueprint: Blueprint) -> Result<Arc<Blueprint>, LoadError> {
        let (behavioral, visual) = blueprint.save()?;
        let store = &self.inner.store;
        futures::try_join!(
            store.save(location, DocumentKind::Behavioral, behavioral),
            store.save(location, DocumentKind::Visual, visual),
        )?;

        let model = Arc::new(blueprint);
        self.inner.models.insert(location.to_string(), model.clone());
        tracing::info!("[REGISTRY] Saved '{}'", location);
        Ok(model)
    }

    /// The in-flight load of `location`, started if there is none. The flag
    /// tells whether this call started it.
    fn pending_load(&self, location: &str) -> (SharedLoad, bool) {
        match self.inner.pending.entry(location.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let load = self.clone().fetch(location.to_string()).shared();
                entry.insert(load.clone());
                (load, true)
            }
        }
    }

    /// Load a model linked from `importer`
    async fn load_link(&self, importer: &str, location: &str) -> Result<Arc<Blueprint>, LoadError> {
        if let Some(model) = self.get(location) {
            return Ok(model);
        }

        let (load, started) = self.pending_load(location);
        if !self.start_waiting(importer, location, !started) {
            return Err(LoadError::LinkCycle {
                location: location.to_string(),
            });
        }

        let result = load.await;
        self.stop_waiting(importer, location);
        result
    }

    fn waits(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<String>>> {
        self.inner
            .waits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record that `importer` waits on `location`. When the load of
    /// `location` was already running, refuse if it waits on `importer`
    /// itself, directly or through other links.
    fn start_waiting(&self, importer: &str, location: &str, check: bool) -> bool {
        let mut waits = self.waits();
        if check && waits_on(&waits, location, importer) {
            return false;
        }
        waits
            .entry(importer.to_string())
            .or_default()
            .push(location.to_string());
        true
    }

    fn stop_waiting(&self, importer: &str, location: &str) {
        let mut waits = self.waits();
        if let Some(targets) = waits.get_mut(importer) {
            if let Some(index) = targets.iter().position(|target| target == location) {
                targets.remove(index);
            }
            if targets.is_empty() {
                waits.remove(importer);
            }
        }
    }

    fn fetch(self, location: String) -> BoxFuture<'static, Result<Arc<Blueprint>, LoadError>> {
        async move {
            let result = self.fetch_model(&location).await;
            match &result {
                Ok(model) => {
                    self.inner.models.insert(location.clone(), model.clone());
                    tracing::info!("[REGISTRY] Registered '{}'", location);
                }
                Err(err) => tracing::warn!("[REGISTRY] Failed to load '{}': {}", location, err),
            }
            self.inner.pending.remove(&location);
            result
        }
        .boxed()
    }

    async fn fetch_model(&self, location: &str) -> Result<Arc<Blueprint>, LoadError> {
        tracing::info!("[REGISTRY] Fetching '{}'", location);
        let store = &self.inner.store;
        let (behavioral, visual) = futures::join!(
            store.get(location, DocumentKind::Behavioral),
            store.get(location, DocumentKind::Visual),
        );

        let behavioral = behavioral.map_err(|err| LoadError::BehavioralLoadFailure {
            location: location.to_string(),
            reason: err.to_string(),
        })?;
        let (visual, visual_error) = match visual {
            Ok(text) => (Some(text), None),
            Err(err) => (None, Some(err)),
        };

        let mut blueprint =
            Blueprint::load(location, &behavioral, visual.as_deref(), &self.inner.options.layout)?;
        if let Some(err) = visual_error {
            blueprint
                .diagnostics
                .warn(DiagnosticKind::VisualLoadFailure, None, err.to_string());
        }

        let links = blueprint.pending_links();
        if !links.is_empty() {
            tracing::info!("[REGISTRY] '{}' links {} model(s)", location, links.len());
            let loads = links
                .iter()
                .map(|(_, link)| self.load_link(location, link));
            let results = futures::future::join_all(loads).await;

            for ((group, link), result) in links.iter().zip(results) {
                let outcome = match result {
                    Ok(linked) => blueprint
                        .expand_link(*group, &linked)
                        .map_err(|err| err.to_string()),
                    Err(err) => Err(err.to_string()),
                };
                if let Err(reason) = outcome {
                    blueprint.mark_link_broken(*group, format!("'{}': {}", link, reason))?;
                }
            }
        }

        Ok(Arc::new(blueprint))
    }
}

/// Whether `from` is, or transitively waits on, `to`
fn waits_on(waits: &HashMap<String, Vec<String>>, from: &str, to: &str) -> bool {
    let mut stack = vec![from];
    let mut seen = Vec::new();
    while let Some(current) = stack.pop() {
        if current == to {
            return true;
        }
        if seen.contains(&current) {
            continue;
        }
        seen.push(current);
        if let Some(targets) = waits.get(current) {
            stack.extend(targets.iter().map(String::as_str));
        }
    }
    false
}
