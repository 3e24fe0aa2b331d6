//! Plugin catalog: identifier + version lookup and resolution.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use libloading::{Library, Symbol};
use log::{debug, info, warn};

use crate::error::CoreError;
use crate::plugin::traits::{NodePlugin, NodePluginCreateFn};

/// Identity of one concrete plugin registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub id: String,
    pub major: u32,
    pub minor: u32,
}

/// Outcome of a successful resolution.
#[derive(Clone)]
pub struct ResolvedPlugin {
    pub descriptor: PluginDescriptor,
    pub plugin: Arc<dyn NodePlugin>,
}

impl std::fmt::Debug for ResolvedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedPlugin")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Maps plugin identifier -> major -> minor -> factory. Minors are kept in
/// ascending order by the BTreeMap. The catalog is populated once at startup
/// and shared read-only afterwards.
#[derive(Default)]
pub struct PluginCatalog {
    plugins: HashMap<String, BTreeMap<u32, BTreeMap<u32, Arc<dyn NodePlugin>>>>,
    dynamic_libraries: Vec<Library>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn NodePlugin>) {
        let (major, minor) = plugin.version();
        let id = plugin.id().to_string();
        debug!("registering plugin '{}' v{}.{}", id, major, minor);
        self.plugins
            .entry(id)
            .or_default()
            .entry(major)
            .or_default()
            .insert(minor, plugin);
    }

    /// All registered `(major, minor)` versions for `id`, ascending.
    pub fn lookup(&self, id: &str) -> Option<Vec<(u32, u32)>> {
        let majors = self.plugins.get(id)?;
        let mut versions = Vec::new();
        for (major, minors) in majors {
            for minor in minors.keys() {
                versions.push((*major, *minor));
            }
        }
        Some(versions)
    }

    pub fn plugin_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.plugins.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Resolve a requested identifier + version against the catalog.
    ///
    /// `major == -1` picks the greatest registered major; an explicit major
    /// with no registration fails with `PluginNotFound`. `minor == -1` picks
    /// the greatest minor of the chosen major; an explicit minor picks the
    /// smallest registered minor >= the request, failing with
    /// `PluginVersionNotFound` when none qualifies.
    pub fn resolve(&self, id: &str, major: i32, minor: i32) -> Result<ResolvedPlugin, CoreError> {
        let majors = self
            .plugins
            .get(id)
            .ok_or_else(|| CoreError::PluginNotFound(id.to_string()))?;

        let (resolved_major, minors) = if major < 0 {
            majors
                .last_key_value()
                .ok_or_else(|| CoreError::PluginNotFound(id.to_string()))?
        } else {
            majors
                .get_key_value(&(major as u32))
                .ok_or_else(|| CoreError::PluginNotFound(id.to_string()))?
        };

        let (resolved_minor, plugin) = if minor < 0 {
            minors
                .last_key_value()
                .ok_or(CoreError::PluginVersionNotFound {
                    id: id.to_string(),
                    major,
                    minor,
                })?
        } else {
            minors
                .range(minor as u32..)
                .next()
                .ok_or(CoreError::PluginVersionNotFound {
                    id: id.to_string(),
                    major,
                    minor,
                })?
        };

        Ok(ResolvedPlugin {
            descriptor: PluginDescriptor {
                id: id.to_string(),
                major: *resolved_major,
                minor: *resolved_minor,
            },
            plugin: Arc::clone(plugin),
        })
    }

    /// `resolve`, retrying case-insensitively when `legacy_lower_case` is
    /// set. Projects authored by the 1.0 series stored lower-cased plugin
    /// identifiers; the retry maps those onto today's registrations.
    pub fn resolve_with_fallback(
        &self,
        id: &str,
        major: i32,
        minor: i32,
        legacy_lower_case: bool,
    ) -> Result<ResolvedPlugin, CoreError> {
        match self.resolve(id, major, minor) {
            Ok(resolved) => Ok(resolved),
            Err(first_err) if legacy_lower_case => {
                let wanted = id.to_lowercase();
                let Some(actual) = self
                    .plugins
                    .keys()
                    .find(|registered| registered.to_lowercase() == wanted)
                    .cloned()
                else {
                    return Err(first_err);
                };
                debug!("legacy id fallback: '{}' -> '{}'", id, actual);
                self.resolve(&actual, major, minor).map_err(|_| first_err)
            }
            Err(err) => Err(err),
        }
    }

    /// Load every `.so`/`.dll` in `dir` exporting a `create_node_plugin`
    /// constructor. Library handles are retained for the catalog's lifetime.
    /// Returns the number of plugins registered.
    pub fn load_plugins_from_directory<P: AsRef<Path>>(
        &mut self,
        dir: P,
    ) -> Result<usize, CoreError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            warn!("plugin directory not found: {}", dir.display());
            return Ok(0);
        }

        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let extension = path.extension().and_then(|s| s.to_str());
            if !matches!(extension, Some("dll") | Some("so") | Some("dylib")) {
                continue;
            }
            match self.load_plugin_from_file(&path) {
                Ok(id) => {
                    info!("loaded plugin '{}' from {}", id, path.display());
                    loaded += 1;
                }
                Err(e) => warn!("skipping {}: {}", path.display(), e),
            }
        }
        Ok(loaded)
    }

    fn load_plugin_from_file(&mut self, path: &Path) -> Result<String, CoreError> {
        let library = unsafe { Library::new(path)? };
        let constructor: Symbol<NodePluginCreateFn> =
            unsafe { library.get(b"create_node_plugin")? };
        let raw = unsafe { constructor() };
        if raw.is_null() {
            return Err(CoreError::Project(format!(
                "plugin constructor in {} returned null",
                path.display()
            )));
        }
        let plugin: Arc<dyn NodePlugin> = unsafe { Arc::from(Box::from_raw(raw)) };
        let id = plugin.id().to_string();
        self.register(plugin);
        self.dynamic_libraries.push(library);
        Ok(id)
    }
}
