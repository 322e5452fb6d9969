use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A versioned unit of source distribution.
///
/// The module under scan has no version and is flagged as the main module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Module {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub main: bool,
}

impl Module {
    pub fn new(path: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version: Some(version.into()),
            main: false,
        }
    }

    pub fn main(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version: None,
            main: true,
        }
    }
}

/// A loaded package.
///
/// `id` is unique per loaded node and may name a synthetic test variant
/// (`"p [p.test]"`); `path` is the import path shared by all variants of a
/// package and is what dependency counting keys on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<Module>,
    #[serde(default)]
    pub top_level: bool,
}

impl Package {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: path.clone(),
            path,
            imports: Vec::new(),
            module: None,
            top_level: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_imports<I, S>(mut self, imports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.imports = imports.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_module(mut self, module: Module) -> Self {
        self.module = Some(module);
        self
    }

    pub fn top_level(mut self) -> Self {
        self.top_level = true;
        self
    }
}

/// All modules and packages loaded for one scan session.
///
/// Built once by the orchestrator and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct PackageGraph {
    go_version: Option<String>,
    modules: Vec<Module>,
    packages: HashMap<String, Package>,
    // load order of package ids, so top-level iteration is deterministic
    order: Vec<String>,
}

impl PackageGraph {
    pub fn new(go_version: Option<String>) -> Self {
        Self {
            go_version,
            ..Self::default()
        }
    }

    pub fn go_version(&self) -> Option<&str> {
        self.go_version.as_deref()
    }

    /// Adds modules, ignoring any whose identity is already present.
    pub fn insert_modules(&mut self, modules: impl IntoIterator<Item = Module>) {
        for module in modules {
            let known = self
                .modules
                .iter()
                .any(|m| m.path == module.path && m.version == module.version);
            if !known {
                self.modules.push(module);
            }
        }
    }

    /// Adds packages keyed by id. A later package with the same id replaces
    /// the earlier one.
    pub fn insert_packages(&mut self, packages: impl IntoIterator<Item = Package>) {
        for package in packages {
            if !self.packages.contains_key(&package.id) {
                self.order.push(package.id.clone());
            }
            self.packages.insert(package.id.clone(), package);
        }
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn main_module(&self) -> Option<&Module> {
        self.modules.iter().find(|m| m.main)
    }

    pub fn package(&self, id: &str) -> Option<&Package> {
        self.packages.get(id)
    }

    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.order.iter().filter_map(|id| self.packages.get(id))
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// The scan targets, in load order.
    pub fn top_level(&self) -> Vec<&Package> {
        self.packages().filter(|p| p.top_level).collect()
    }

    /// Number of distinct packages reachable from `tops` through import
    /// edges. Packages in `tops` are never counted, even when one top-level
    /// package imports another.
    pub fn dependency_count(&self, tops: &[&Package]) -> usize {
        let top_paths: HashSet<&str> = tops.iter().map(|p| p.path.as_str()).collect();
        let mut counted = HashSet::new();

        for top in tops {
            self.visit(top, true, &top_paths, &mut counted);
        }

        counted.len()
    }

    // Each non-top package is descended into at most once: it is counted
    // on first visit and every later visit returns early.
    fn visit(
        &self,
        package: &Package,
        top: bool,
        top_paths: &HashSet<&str>,
        counted: &mut HashSet<String>,
    ) {
        let path = package.path.as_str();
        if counted.contains(path) {
            return;
        }
        let is_top = top_paths.contains(path);
        if is_top && !top {
            // visited as a target on its own
            return;
        }
        if !is_top {
            counted.insert(path.to_string());
        }

        for import in &package.imports {
            match self.packages.get(import) {
                Some(dep) => self.visit(dep, false, top_paths, counted),
                None => {
                    // edge to a package the loader did not return
                    if !top_paths.contains(import.as_str()) {
                        counted.insert(import.clone());
                    }
                }
            }
        }
    }
}
