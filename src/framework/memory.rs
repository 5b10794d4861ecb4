//! In-process reference framework
//!
//! A small thread-safe module runtime that the binary, the tests and the
//! criterion benches install into. Artifact loading is simulated with a
//! configurable cost so that the locking difference between the two install
//! paths shows up in the measurements.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info};

use super::{BundleContext, Framework, InstalledBundle};
use crate::{BenchError, Result};

/// Set of identifiers the framework is able to resolve
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    numbered: Option<(String, usize)>,
    named: HashMap<String, Duration>,
    directory: Option<PathBuf>,
    load_cost: Duration,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog resolving `{prefix}1` through `{prefix}{count}`
    pub fn numbered(prefix: impl Into<String>, count: usize) -> Self {
        Self::new().with_numbered(prefix, count)
    }

    pub fn with_numbered(mut self, prefix: impl Into<String>, count: usize) -> Self {
        self.numbered = Some((prefix.into(), count));
        self
    }

    pub fn with_named(self, name: impl Into<String>) -> Self {
        self.with_named_cost(name, Duration::ZERO)
    }

    /// Add a named artifact that costs `extra` on top of the base load cost
    pub fn with_named_cost(mut self, name: impl Into<String>, extra: Duration) -> Self {
        self.named.insert(name.into(), extra);
        self
    }

    /// Simulated cost of loading any artifact of this catalog
    pub fn with_load_cost(mut self, cost: Duration) -> Self {
        self.load_cost = cost;
        self
    }

    pub fn load_cost(&self) -> Duration {
        self.load_cost
    }

    /// Resolve identifiers as files relative to `dir`
    pub fn with_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directory = Some(dir.into());
        self
    }

    /// Resolve an identifier, returning the extra load cost of its artifact
    pub fn resolve(&self, identifier: &str) -> Result<Duration> {
        if let Some(extra) = self.named.get(identifier) {
            return Ok(*extra);
        }

        if let Some((prefix, count)) = &self.numbered {
            let number = identifier
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.parse::<usize>().ok());
            if matches!(number, Some(n) if n >= 1 && n <= *count) {
                return Ok(Duration::ZERO);
            }
        }

        if let Some(dir) = &self.directory {
            if dir.join(identifier).is_file() {
                return Ok(Duration::ZERO);
            }
        }

        Err(BenchError::install(identifier, "no artifact found"))
    }
}

/// Lifecycle of the framework itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameworkState {
    Created,
    Starting,
    Active,
    Stopping,
    Stopped,
}

/// Install calls seen by each path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallCalls {
    pub legacy: usize,
    pub revised: usize,
}

impl InstallCalls {
    pub fn total(&self) -> usize {
        self.legacy + self.revised
    }
}

#[derive(Debug)]
struct Registry {
    bundles: HashMap<String, InstalledBundle>,
    next_id: u64,
}

#[derive(Debug)]
struct Inner {
    catalog: Catalog,
    state: Mutex<FrameworkState>,
    state_changed: Condvar,
    install_lock: Mutex<()>,
    registry: Mutex<Registry>,
    legacy_calls: AtomicUsize,
    revised_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| BenchError::FrameworkError("framework lock poisoned".to_string()))
}

impl Inner {
    fn ensure_active(&self) -> Result<()> {
        let state = *lock(&self.state)?;
        if state != FrameworkState::Active {
            return Err(BenchError::FrameworkError(format!(
                "cannot install while framework is {:?}",
                state
            )));
        }
        Ok(())
    }

    fn lookup(&self, identifier: &str) -> Result<Option<InstalledBundle>> {
        Ok(lock(&self.registry)?.bundles.get(identifier).cloned())
    }

    fn load(&self, extra: Duration) {
        let cost = self.catalog.load_cost + extra;
        if !cost.is_zero() {
            std::thread::sleep(cost);
        }
    }

    /// Register a loaded artifact. A concurrent install of the same
    /// identifier that registered first wins.
    fn register(&self, identifier: &str) -> Result<InstalledBundle> {
        let mut registry = lock(&self.registry)?;
        let Registry { bundles, next_id } = &mut *registry;
        let bundle = bundles
            .entry(identifier.to_string())
            .or_insert_with(|| {
                let bundle = InstalledBundle {
                    id: *next_id,
                    location: identifier.to_string(),
                };
                *next_id += 1;
                bundle
            })
            .clone();
        Ok(bundle)
    }

    fn transition(&self, from: &[FrameworkState], to: FrameworkState) -> Result<()> {
        let mut state = lock(&self.state)?;
        if !from.contains(&*state) {
            return Err(BenchError::FrameworkError(format!(
                "invalid transition {:?} -> {:?}",
                *state, to
            )));
        }
        *state = to;
        self.state_changed.notify_all();
        Ok(())
    }
}

impl BundleContext for Inner {
    fn install_legacy(&self, identifier: &str) -> Result<InstalledBundle> {
        self.legacy_calls.fetch_add(1, Ordering::Relaxed);
        let _serialized = lock(&self.install_lock)?;
        self.ensure_active()?;
        if let Some(existing) = self.lookup(identifier)? {
            return Ok(existing);
        }
        let extra = self.catalog.resolve(identifier)?;
        self.load(extra);
        self.register(identifier)
    }

    fn install_revised(&self, identifier: &str) -> Result<InstalledBundle> {
        self.revised_calls.fetch_add(1, Ordering::Relaxed);
        self.ensure_active()?;
        if let Some(existing) = self.lookup(identifier)? {
            return Ok(existing);
        }
        let extra = self.catalog.resolve(identifier)?;
        self.load(extra);
        self.register(identifier)
    }

    fn uninstall(&self, bundle: &InstalledBundle) -> Result<()> {
        let mut registry = lock(&self.registry)?;
        match registry.bundles.get(&bundle.location) {
            Some(installed) if installed.id == bundle.id => {
                registry.bundles.remove(&bundle.location);
                Ok(())
            }
            _ => Err(BenchError::FrameworkError(format!(
                "bundle {} ({}) is not installed",
                bundle.id, bundle.location
            ))),
        }
    }
}

/// Thread-safe in-process framework; clones share the same instance
#[derive(Debug, Clone)]
pub struct MemoryFramework {
    inner: Arc<Inner>,
}

impl MemoryFramework {
    /// Create a framework resolving identifiers against `catalog`
    pub fn new(catalog: Catalog) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog,
                state: Mutex::new(FrameworkState::Created),
                state_changed: Condvar::new(),
                install_lock: Mutex::new(()),
                registry: Mutex::new(Registry {
                    bundles: HashMap::new(),
                    next_id: 1,
                }),
                legacy_calls: AtomicUsize::new(0),
                revised_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Base load cost, fixed by the catalog at construction
    pub fn load_cost(&self) -> Duration {
        self.inner.catalog.load_cost()
    }

    pub fn state(&self) -> FrameworkState {
        self.inner
            .state
            .lock()
            .map(|state| *state)
            .unwrap_or(FrameworkState::Stopped)
    }

    /// Number of bundles currently installed
    pub fn installed_count(&self) -> usize {
        self.inner
            .registry
            .lock()
            .map(|registry| registry.bundles.len())
            .unwrap_or(0)
    }

    pub fn install_calls(&self) -> InstallCalls {
        InstallCalls {
            legacy: self.inner.legacy_calls.load(Ordering::Relaxed),
            revised: self.inner.revised_calls.load(Ordering::Relaxed),
        }
    }
}

impl Framework for MemoryFramework {
    fn start(&self) -> Result<()> {
        if self.state() == FrameworkState::Active {
            return Ok(());
        }
        self.inner.transition(
            &[FrameworkState::Created, FrameworkState::Stopped],
            FrameworkState::Starting,
        )?;
        self.inner
            .transition(&[FrameworkState::Starting], FrameworkState::Active)?;
        info!("framework started");
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        match self.state() {
            FrameworkState::Active => {
                self.inner
                    .transition(&[FrameworkState::Active], FrameworkState::Stopping)?;
                let installed = self.installed_count();
                self.inner
                    .transition(&[FrameworkState::Stopping], FrameworkState::Stopped)?;
                info!(installed, "framework stopped");
                Ok(())
            }
            FrameworkState::Created | FrameworkState::Stopped => self.inner.transition(
                &[FrameworkState::Created, FrameworkState::Stopped],
                FrameworkState::Stopped,
            ),
            other => Err(BenchError::FrameworkError(format!(
                "cannot stop framework while {:?}",
                other
            ))),
        }
    }

    fn wait_for_stop(&self, timeout: Duration) -> Result<()> {
        let state = lock(&self.inner.state)?;
        let running = |s: &mut FrameworkState| {
            !matches!(s, FrameworkState::Stopped | FrameworkState::Created)
        };

        if timeout.is_zero() {
            let _state = self
                .inner
                .state_changed
                .wait_while(state, running)
                .map_err(|_| BenchError::FrameworkError("framework lock poisoned".to_string()))?;
            return Ok(());
        }

        let (state, waited) = self
            .inner
            .state_changed
            .wait_timeout_while(state, timeout, running)
            .map_err(|_| BenchError::FrameworkError("framework lock poisoned".to_string()))?;
        if waited.timed_out() {
            return Err(BenchError::FrameworkError(format!(
                "framework still {:?} after {:?}",
                *state, timeout
            )));
        }
        debug!("framework stop observed");
        Ok(())
    }

    fn context(&self) -> Arc<dyn BundleContext> {
        self.inner.clone()
    }
}
