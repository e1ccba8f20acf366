//! Model identifier → key map registrations.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

use crate::model::Model;

/// Translation from a model field name to the result column that feeds it.
///
/// Fields with no explicit entry map to the column of the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMap {
    entries: HashMap<String, String>,
}

impl KeyMap {
    /// The identity mapping.
    #[must_use]
    pub fn identity() -> Self {
        Self::default()
    }

    /// Add or replace the column for `field`.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        self.entries.insert(field.into(), column.into());
        self
    }

    /// Column that feeds `field`.
    #[must_use]
    pub fn column_for<'a>(&'a self, field: &'a str) -> &'a str {
        self.entries.get(field).map_or(field, String::as_str)
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.entries.iter().all(|(field, column)| field == column)
    }
}

impl<F, C> FromIterator<(F, C)> for KeyMap
where
    F: Into<String>,
    C: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (F, C)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(field, column)| (field.into(), column.into()))
                .collect(),
        }
    }
}

static IDENTITY: LazyLock<Arc<KeyMap>> = LazyLock::new(|| Arc::new(KeyMap::identity()));

/// Registry of key maps, shared by every engine that maps rows to models.
///
/// Meant to be filled at start-up, but registration stays safe while other threads read.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    maps: RwLock<HashMap<String, Arc<KeyMap>>>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Store `key_map` for `identifier`, replacing any earlier registration.
    pub fn register(&self, identifier: impl Into<String>, key_map: KeyMap) {
        let identifier = identifier.into();
        tracing::debug!(model = %identifier, "registering key map");
        let mut maps = match self.maps.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        maps.insert(identifier, Arc::new(key_map));
    }

    /// Register `M` under its own name with the key map it declares.
    pub fn register_model<M: Model>(&self) {
        self.register(M::NAME, M::key_map());
    }

    /// Key map for `identifier`, or the identity map when nothing is registered.
    #[must_use]
    pub fn lookup(&self, identifier: &str) -> Arc<KeyMap> {
        let maps = match self.maps.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        maps.get(identifier)
            .map_or_else(|| Arc::clone(&*IDENTITY), Arc::clone)
    }

    #[must_use]
    pub fn is_registered(&self, identifier: &str) -> bool {
        let maps = match self.maps.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        maps.contains_key(identifier)
    }
}
