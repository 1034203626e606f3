//! Definition sources.
//!
//! The session asks a [`DefinitionManager`] for the definition of every class it
//! touches. Managers compose: a [`CacheManager`] memoizes another manager and a
//! [`MultiManager`] consults several in order.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::definition::ObjectDefinition;
use crate::error::{Error, Result};
use crate::identifiers::is_valid_identifier;

/// Source of persistent object definitions.
pub trait DefinitionManager {
    /// Definition of `class`, or [`Error::DefinitionNotFound`].
    fn fetch_definition(&self, class: &str) -> Result<Arc<ObjectDefinition>>;
}

impl<M: DefinitionManager + ?Sized> DefinitionManager for Box<M> {
    fn fetch_definition(&self, class: &str) -> Result<Arc<ObjectDefinition>> {
        (**self).fetch_definition(class)
    }
}

impl<M: DefinitionManager + ?Sized> DefinitionManager for Arc<M> {
    fn fetch_definition(&self, class: &str) -> Result<Arc<ObjectDefinition>> {
        (**self).fetch_definition(class)
    }
}

// ============================================================================
// Static registry
// ============================================================================

/// In-memory registry of definitions built in code.
#[derive(Debug, Default, Clone)]
pub struct StaticManager {
    definitions: HashMap<String, Arc<ObjectDefinition>>,
}

impl StaticManager {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a definition, replacing any previous one for its class.
    pub fn register(&mut self, definition: ObjectDefinition) -> Result<()> {
        definition.validate()?;
        tracing::debug!(class = %definition.class, table = %definition.table, "Registered definition");
        self.definitions
            .insert(definition.class.clone(), Arc::new(definition));
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, definition: ObjectDefinition) -> Result<Self> {
        self.register(definition)?;
        Ok(self)
    }

    /// Registered class names.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }
}

impl DefinitionManager for StaticManager {
    fn fetch_definition(&self, class: &str) -> Result<Arc<ObjectDefinition>> {
        self.definitions
            .get(class)
            .cloned()
            .ok_or_else(|| Error::definition_not_found(class, "class is not registered"))
    }
}

// ============================================================================
// JSON files
// ============================================================================

/// Reads `<dir>/<lowercased class>.json` on every fetch.
///
/// Wrap it in a [`CacheManager`] to parse each file only once.
#[derive(Debug, Clone)]
pub struct JsonDirectoryManager {
    dir: PathBuf,
}

impl JsonDirectoryManager {
    /// Read definitions from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory definitions are read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, class: &str) -> PathBuf {
        self.dir.join(format!("{}.json", class.to_lowercase()))
    }
}

impl DefinitionManager for JsonDirectoryManager {
    fn fetch_definition(&self, class: &str) -> Result<Arc<ObjectDefinition>> {
        if !is_valid_identifier(class) {
            return Err(Error::definition_not_found(
                class,
                "class name is not a valid identifier",
            ));
        }
        let path = self.path_for(class);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| Error::definition_not_found(class, format!("{}: {e}", path.display())))?;
        let definition: ObjectDefinition = serde_json::from_str(&text)
            .map_err(|e| Error::definition_not_found(class, format!("{}: {e}", path.display())))?;
        if definition.class != class {
            return Err(Error::definition_not_found(
                class,
                format!("{} defines class '{}'", path.display(), definition.class),
            ));
        }
        definition.validate()?;
        tracing::debug!(class, path = %path.display(), "Loaded definition file");
        Ok(Arc::new(definition))
    }
}

// ============================================================================
// Composition
// ============================================================================

/// Memoizes the definitions returned by another manager.
///
/// Failures are not cached; a class that was missing is looked up again next time.
#[derive(Debug)]
pub struct CacheManager<M> {
    inner: M,
    cache: RefCell<HashMap<String, Arc<ObjectDefinition>>>,
}

impl<M: DefinitionManager> CacheManager<M> {
    /// Cache definitions fetched from `inner`.
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Number of cached definitions.
    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }

    /// The wrapped manager.
    pub fn inner(&self) -> &M {
        &self.inner
    }
}

impl<M: DefinitionManager> DefinitionManager for CacheManager<M> {
    fn fetch_definition(&self, class: &str) -> Result<Arc<ObjectDefinition>> {
        if let Some(definition) = self.cache.borrow().get(class) {
            tracing::trace!(class, "Definition cache hit");
            return Ok(Arc::clone(definition));
        }
        let definition = self.inner.fetch_definition(class)?;
        self.cache
            .borrow_mut()
            .insert(class.to_string(), Arc::clone(&definition));
        Ok(definition)
    }
}

/// Consults several managers in order and returns the first definition found.
#[derive(Default)]
pub struct MultiManager {
    managers: Vec<Box<dyn DefinitionManager>>,
}

impl MultiManager {
    /// Create a manager with no sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source.
    #[must_use]
    pub fn with(mut self, manager: impl DefinitionManager + 'static) -> Self {
        self.managers.push(Box::new(manager));
        self
    }
}

impl std::fmt::Debug for MultiManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiManager")
            .field("managers", &self.managers.len())
            .finish()
    }
}

impl DefinitionManager for MultiManager {
    fn fetch_definition(&self, class: &str) -> Result<Arc<ObjectDefinition>> {
        for manager in &self.managers {
            match manager.fetch_definition(class) {
                Err(Error::DefinitionNotFound { .. }) => {}
                found => return found,
            }
        }
        Err(Error::definition_not_found(
            class,
            format!("none of {} definition sources knows the class", self.managers.len()),
        ))
    }
}
