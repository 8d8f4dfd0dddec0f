use std::collections::BTreeMap;
use std::sync::Arc;

/// A process environment under preparation.
///
/// The starting variables live in a shared, never-mutated base map. Every
/// change made while preparing goes into an overlay, and the two are only
/// merged when a final map is needed (see [`Environment::to_map`]). The map a
/// caller hands in is therefore never touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// Variables as they were when preparation started
    base: Arc<BTreeMap<String, String>>,
    /// Changes on top of `base`; `None` marks a removed variable
    overlay: BTreeMap<String, Option<String>>,
}

impl Environment {
    /// Create an environment whose base is the given map
    pub fn new(base: BTreeMap<String, String>) -> Self {
        Self {
            base: Arc::new(base),
            overlay: BTreeMap::new(),
        }
    }

    /// Create an environment from a borrowed map, leaving the map untouched
    pub fn from_map(base: &BTreeMap<String, String>) -> Self {
        Self::new(base.clone())
    }

    /// Snapshot the current process environment.
    /// Variables whose name or value is not valid Unicode are skipped.
    pub fn from_os_environ() -> Self {
        let base = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self::new(base)
    }

    /// Get a variable's current value
    pub fn get(&self, key: &str) -> Option<&str> {
        match self.overlay.get(key) {
            Some(Some(value)) => Some(value.as_str()),
            Some(None) => None,
            None => self.base.get(key).map(String::as_str),
        }
    }

    /// Whether the variable is present at all, even if empty
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Whether the variable has a non-empty value.
    /// An empty string counts as unset.
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some_and(|value| !value.is_empty())
    }

    /// Set a variable
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.overlay.insert(key.into(), Some(value.into()));
    }

    /// Remove a variable
    pub fn remove(&mut self, key: &str) {
        if self.base.contains_key(key) {
            self.overlay.insert(key.to_string(), None);
        } else {
            self.overlay.remove(key);
        }
    }

    /// The unmodified starting variables
    pub fn base(&self) -> &BTreeMap<String, String> {
        &self.base
    }

    /// Changes made on top of the base
    pub fn overlay(&self) -> &BTreeMap<String, Option<String>> {
        &self.overlay
    }

    /// Whether anything was changed since the base was captured
    pub fn is_modified(&self) -> bool {
        !self.overlay.is_empty()
    }

    /// Merge base and overlay into a plain map
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut merged = (*self.base).clone();
        for (key, value) in &self.overlay {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        merged
    }
}

impl FromIterator<(String, String)> for Environment {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Copy added or changed variables from `src` into `dest`.
///
/// Never removes anything from `dest`: callers may carry variables the
/// preparation knows nothing about. Returns how many keys were written.
pub fn update_environ(dest: &mut BTreeMap<String, String>, src: &BTreeMap<String, String>) -> usize {
    let mut updated = 0;
    for (key, value) in src {
        if dest.get(key) != Some(value) {
            dest.insert(key.clone(), value.clone());
            updated += 1;
        }
    }
    updated
}
