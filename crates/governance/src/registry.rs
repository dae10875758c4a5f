//! Delegation registry and pattern-only resolution.

use crate::error::{GovernanceError, GovernanceResult};
use crate::pattern::{CommandPattern, DEFAULT_MAX_PATTERN_LEN};
use crate::types::DelegationClass;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Supplies the known delegation classes.
///
/// Implementations return a snapshot; resolution works against that
/// snapshot for the duration of one call.
pub trait DelegationRegistry: Send + Sync {
    fn classes(&self) -> Vec<DelegationClass>;
}

/// Registry held in memory, optionally loaded from a TOML file.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    classes: RwLock<Vec<DelegationClass>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default, rename = "delegation")]
    delegations: Vec<DelegationClass>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classes(classes: impl IntoIterator<Item = DelegationClass>) -> Self {
        Self {
            classes: RwLock::new(classes.into_iter().collect()),
        }
    }

    /// Load a registry file of `[[delegation]]` tables.
    ///
    /// A missing file yields an empty registry. Duplicate `class_id`s are
    /// rejected.
    pub fn load(path: impl AsRef<Path>) -> GovernanceResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GovernanceError::Registry(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> GovernanceResult<Self> {
        let file: RegistryFile =
            toml::from_str(contents).map_err(|e| GovernanceError::Registry(e.to_string()))?;

        let mut seen = HashSet::new();
        for class in &file.delegations {
            if !seen.insert(class.class_id.as_str()) {
                return Err(GovernanceError::Registry(format!(
                    "duplicate delegation class {}",
                    class.class_id
                )));
            }
        }

        Ok(Self::with_classes(file.delegations))
    }

    pub fn register(&self, class: DelegationClass) {
        if let Ok(mut guard) = self.classes.write() {
            guard.retain(|c| c.class_id != class.class_id);
            guard.push(class);
        }
    }

    pub fn len(&self) -> usize {
        self.classes.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DelegationRegistry for StaticRegistry {
    fn classes(&self) -> Vec<DelegationClass> {
        match self.classes.read() {
            Ok(guard) => guard.clone(),
            Err(_) => Vec::new(),
        }
    }
}

/// Finds the delegation classes whose patterns match a command.
///
/// Suspension state is not consulted here.
#[derive(Clone)]
pub struct DelegationResolver {
    registry: Arc<dyn DelegationRegistry>,
    max_pattern_len: usize,
}

impl DelegationResolver {
    pub fn new(registry: Arc<dyn DelegationRegistry>) -> Self {
        Self {
            registry,
            max_pattern_len: DEFAULT_MAX_PATTERN_LEN,
        }
    }

    pub fn with_max_pattern_len(mut self, limit: usize) -> Self {
        self.max_pattern_len = limit;
        self
    }

    pub fn registry(&self) -> &Arc<dyn DelegationRegistry> {
        &self.registry
    }

    /// Every registered class whose pattern matches, in registry order.
    pub fn resolve(&self, command: &str) -> Vec<DelegationClass> {
        self.registry
            .classes()
            .into_iter()
            .filter(|class| {
                match CommandPattern::parse_with_limit(&class.pattern, self.max_pattern_len) {
                    Ok(pattern) => pattern.matches(command),
                    Err(e) => {
                        debug!(class_id = %class.class_id, error = %e, "delegation pattern malformed, matches nothing");
                        false
                    }
                }
            })
            .collect()
    }
}
