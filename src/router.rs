//! Translation routing over the offline language package graph.
//!
//! Language packages are directed edges (a package translates one language
//! into one other language), so routing text between two languages is a path
//! search. The router answers path queries over the installed and available
//! inventories, installs the packages a route needs, and executes a resolved
//! route against the translation engine, chaining intermediate hops.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::engines::{PackageStore, TranslationEngine};
use crate::types::{LanguagePackage, TranslationPath, TranslationSettings};

/// Longest route considered, counted in languages end to end
pub const MAX_PATH_NODES: usize = 4;

/// Which package inventory a path query runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inventory {
    /// Packages installed and usable right now
    Installed,
    /// Packages that could be installed on demand
    Available,
}

/// Outcome of installing the packages along a translation route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Packages the route needed installing, in traversal order
    pub requested: Vec<LanguagePackage>,
    /// How many of them installed successfully
    pub installed: usize,
    /// How many of them failed
    pub failed: usize,
    /// Whether the language pair is translatable now
    pub success: bool,
}

/// Classified answer to "can the current settings produce translations"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationReadiness {
    /// Translation is switched off
    Disabled,
    /// An installed route exists
    Ready { path: TranslationPath },
    /// A route exists once the missing packages are installed
    NeedsInstall {
        path: TranslationPath,
        missing: Vec<LanguagePackage>,
    },
    /// No route even over the available inventory
    Unavailable,
}

impl TranslationReadiness {
    /// Short human-readable description for status displays
    pub fn message(&self) -> String {
        match self {
            TranslationReadiness::Disabled => "Translation disabled".to_string(),
            TranslationReadiness::Ready { path } => {
                format!("Ready: {}", path.nodes().join(" -> "))
            }
            TranslationReadiness::NeedsInstall { path, missing } => format!(
                "Need {} package(s) for: {}",
                missing.len(),
                path.nodes().join(" -> ")
            ),
            TranslationReadiness::Unavailable => "No translation route available".to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct PackageInventory {
    installed: HashSet<LanguagePackage>,
    available: HashSet<LanguagePackage>,
}

/// Routes text between languages across the package graph
pub struct TranslationRouter {
    /// Package inventories, refreshed from the store
    packages: RwLock<PackageInventory>,
    /// Preferred intermediate language for multi-hop routes
    pivot_language: String,
    /// Translation backend
    engine: Arc<dyn TranslationEngine>,
    /// Package install/download backend
    store: Arc<dyn PackageStore>,
}

impl TranslationRouter {
    /// Create a router and load both inventories from the store
    pub async fn new(
        engine: Arc<dyn TranslationEngine>,
        store: Arc<dyn PackageStore>,
        pivot_language: &str,
    ) -> Self {
        let router = Self {
            packages: RwLock::new(PackageInventory::default()),
            pivot_language: pivot_language.to_string(),
            engine,
            store,
        };
        router.reload_packages().await;
        router
    }

    /// Re-pull both inventories from the package store
    pub async fn reload_packages(&self) {
        let installed: HashSet<LanguagePackage> =
            self.store.list_installed().await.into_iter().collect();
        let available: HashSet<LanguagePackage> =
            self.store.list_available().await.into_iter().collect();

        debug!(
            "Package inventory: {} installed, {} available",
            installed.len(),
            available.len()
        );

        let mut guard = self.inventory_mut();
        guard.installed = installed;
        guard.available = available;
    }

    pub fn pivot_language(&self) -> &str {
        &self.pivot_language
    }

    /// Whether a direct package for this pair is installed
    pub fn is_installed(&self, from_code: &str, to_code: &str) -> bool {
        self.inventory()
            .installed
            .contains(&LanguagePackage::new(from_code, to_code))
    }

    /// Whether a direct package for this pair is available for download
    pub fn is_available(&self, from_code: &str, to_code: &str) -> bool {
        self.inventory()
            .available
            .contains(&LanguagePackage::new(from_code, to_code))
    }

    /// Find a translation route over the chosen inventory.
    ///
    /// Route preference: identity, then a direct package, then the route
    /// through the pivot language, then the shortest chain breadth-first
    /// search finds. Returns the empty path when the pair is unroutable.
    pub fn find_path(
        &self,
        from_code: &str,
        to_code: &str,
        inventory: Inventory,
    ) -> TranslationPath {
        let guard = self.inventory();
        let packages = match inventory {
            Inventory::Installed => &guard.installed,
            Inventory::Available => &guard.available,
        };
        search_path(from_code, to_code, &self.pivot_language, packages)
    }

    /// Whether the pair is translatable with installed packages
    pub fn can_translate(&self, from_code: &str, to_code: &str) -> bool {
        if from_code == to_code {
            return true;
        }
        self.find_path(from_code, to_code, Inventory::Installed).hops() >= 1
    }

    /// Whether the pair would be translatable after installing packages
    pub fn can_translate_if_installed(&self, from_code: &str, to_code: &str) -> bool {
        if from_code == to_code {
            return true;
        }
        self.find_path(from_code, to_code, Inventory::Available).hops() >= 1
    }

    /// Packages that still need installing to route this pair, in the order
    /// the route traverses them. Empty when the pair already routes over
    /// installed packages or no route exists at all.
    pub fn required_packages(&self, from_code: &str, to_code: &str) -> Vec<LanguagePackage> {
        let guard = self.inventory();
        let path = search_path(from_code, to_code, &self.pivot_language, &guard.available);
        path.pairs()
            .into_iter()
            .filter(|package| !guard.installed.contains(package))
            .collect()
    }

    /// Install every package the route for this pair still needs.
    ///
    /// Packages install one at a time in route order. A failure does not roll
    /// back earlier installs, and running this again only attempts what is
    /// still missing.
    pub async fn install_path(&self, from_code: &str, to_code: &str) -> InstallReport {
        let required = self.required_packages(from_code, to_code);

        if required.is_empty() {
            let success = self.can_translate(from_code, to_code);
            if success {
                debug!("Route {} -> {} already installed", from_code, to_code);
            } else {
                warn!("No installable route for {} -> {}", from_code, to_code);
            }
            return InstallReport {
                requested: required,
                installed: 0,
                failed: 0,
                success,
            };
        }

        info!(
            "Installing {} package(s) for {} -> {}",
            required.len(),
            from_code,
            to_code
        );

        let mut installed = 0;
        let mut failed = 0;
        for package in &required {
            if self.store.install(&package.from_code, &package.to_code).await {
                info!("Installed {} -> {}", package.from_code, package.to_code);
                installed += 1;
            } else {
                warn!(
                    "Failed to install {} -> {}",
                    package.from_code, package.to_code
                );
                failed += 1;
            }
        }

        self.reload_packages().await;
        let success = failed == 0 && self.can_translate(from_code, to_code);

        InstallReport {
            requested: required,
            installed,
            failed,
            success,
        }
    }

    /// Translate `text` along the best installed route.
    ///
    /// Never fails: identity pairs and blank text pass through untouched, and
    /// when no route exists or the engine errors mid-chain the original text
    /// comes back unchanged.
    pub async fn translate(&self, text: &str, from_code: &str, to_code: &str) -> String {
        if text.trim().is_empty() || from_code == to_code {
            return text.to_string();
        }

        let path = self.find_path(from_code, to_code, Inventory::Installed);
        if path.hops() < 1 {
            debug!(
                "No installed route for {} -> {}, passing text through",
                from_code, to_code
            );
            return text.to_string();
        }

        if path.hops() > 1 {
            debug!("Pivot translation: {}", path.nodes().join(" -> "));
        }

        let mut current = text.to_string();
        for step in path.pairs() {
            match self
                .engine
                .translate(&current, &step.from_code, &step.to_code)
                .await
            {
                Ok(translated) => current = translated,
                Err(e) => {
                    warn!(
                        "Translation {} -> {} failed: {}, passing text through",
                        step.from_code, step.to_code, e
                    );
                    return text.to_string();
                }
            }
        }
        current
    }

    /// Classify whether `settings` can produce translations right now
    pub fn readiness(&self, settings: &TranslationSettings) -> TranslationReadiness {
        if !settings.enabled {
            return TranslationReadiness::Disabled;
        }

        let from = settings.source_language.as_str();
        let to = settings.target_language.as_str();

        if self.can_translate(from, to) {
            return TranslationReadiness::Ready {
                path: self.find_path(from, to, Inventory::Installed),
            };
        }

        let available_path = self.find_path(from, to, Inventory::Available);
        if available_path.hops() >= 1 {
            let missing = self.required_packages(from, to);
            return TranslationReadiness::NeedsInstall {
                path: available_path,
                missing,
            };
        }

        TranslationReadiness::Unavailable
    }

    fn inventory(&self) -> RwLockReadGuard<'_, PackageInventory> {
        match self.packages.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn inventory_mut(&self) -> RwLockWriteGuard<'_, PackageInventory> {
        match self.packages.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Search for a route from `from_code` to `to_code` over `packages`
fn search_path(
    from_code: &str,
    to_code: &str,
    pivot: &str,
    packages: &HashSet<LanguagePackage>,
) -> TranslationPath {
    if from_code == to_code {
        return TranslationPath::identity(from_code);
    }

    if packages.contains(&LanguagePackage::new(from_code, to_code)) {
        return TranslationPath::new(vec![from_code.to_string(), to_code.to_string()]);
    }

    // The pivot route wins over anything the search below would find
    if from_code != pivot
        && to_code != pivot
        && packages.contains(&LanguagePackage::new(from_code, pivot))
        && packages.contains(&LanguagePackage::new(pivot, to_code))
    {
        return TranslationPath::new(vec![
            from_code.to_string(),
            pivot.to_string(),
            to_code.to_string(),
        ]);
    }

    bfs_path(from_code, to_code, packages)
}

/// Breadth-first search, shortest chain first, capped at `MAX_PATH_NODES`
fn bfs_path(
    from_code: &str,
    to_code: &str,
    packages: &HashSet<LanguagePackage>,
) -> TranslationPath {
    let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
    for package in packages {
        edges
            .entry(package.from_code.as_str())
            .or_default()
            .push(package.to_code.as_str());
    }
    // Deterministic expansion order regardless of set iteration
    for targets in edges.values_mut() {
        targets.sort_unstable();
    }

    let mut queue: VecDeque<(String, Vec<String>)> = VecDeque::new();
    let mut visited: HashSet<String> = HashSet::new();
    queue.push_back((from_code.to_string(), vec![from_code.to_string()]));
    visited.insert(from_code.to_string());

    while let Some((current, path)) = queue.pop_front() {
        if current == to_code {
            return TranslationPath::new(path);
        }

        if path.len() >= MAX_PATH_NODES {
            continue;
        }

        if let Some(targets) = edges.get(current.as_str()) {
            for &next in targets {
                if !visited.contains(next) {
                    visited.insert(next.to_string());
                    let mut extended = path.clone();
                    extended.push(next.to_string());
                    queue.push_back((next.to_string(), extended));
                }
            }
        }
    }

    TranslationPath::empty()
}
