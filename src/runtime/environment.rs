use crate::language::token::Location;
use crate::runtime::{
    cell::CellRef,
    error::{RuntimeError, RuntimeResult},
};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub type Env = Arc<Environment>;

/// One lexical scope. Lookups fall through to the parent chain; the nearest
/// binding wins.
#[derive(Default)]
pub struct Environment {
    bindings: RwLock<HashMap<String, CellRef>>,
    parent: Option<Env>,
    packages: Mutex<HashSet<String>>,
}

impl Environment {
    pub fn new() -> Env {
        Arc::new(Self::default())
    }

    pub fn child(parent: &Env) -> Env {
        Arc::new(Self {
            bindings: RwLock::new(HashMap::new()),
            parent: Some(Arc::clone(parent)),
            packages: Mutex::new(HashSet::new()),
        })
    }

    /// Bind `name` in this scope, shadowing any outer binding.
    pub fn set(&self, name: impl Into<String>, cell: CellRef) {
        self.bindings.write().insert(name.into(), cell);
    }

    /// Local lookup, without consulting parents.
    pub fn get(&self, name: &str) -> Option<CellRef> {
        self.bindings.read().get(name).cloned()
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.bindings.read().contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Option<CellRef> {
        if let Some(cell) = self.get(name) {
            return Some(cell);
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    /// The scope that owns `name`.
    pub fn find(self: &Arc<Self>, name: &str, location: Option<&Location>) -> RuntimeResult<Env> {
        let mut current = Arc::clone(self);
        loop {
            if current.contains_local(name) {
                return Ok(current);
            }
            let next = match &current.parent {
                Some(parent) => Arc::clone(parent),
                None => return Err(RuntimeError::unknown(name, location)),
            };
            current = next;
        }
    }

    /// Rebind an existing name in whichever scope owns it.
    pub fn assign(
        self: &Arc<Self>,
        name: &str,
        cell: CellRef,
        location: Option<&Location>,
    ) -> RuntimeResult<()> {
        let owner = self.find(name, location)?;
        owner.set(name, cell);
        Ok(())
    }

    pub fn package_loaded(&self, name: &str) -> bool {
        if self.packages.lock().contains(name) {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.package_loaded(name),
            None => false,
        }
    }

    pub fn mark_package_loaded(&self, name: &str) {
        self.packages.lock().insert(name.to_string());
    }
}
