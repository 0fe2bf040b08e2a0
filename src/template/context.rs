// ABOUTME: Initial variable environment handed to the compiler and the executor
// ABOUTME: Stores user variables by value or as live shared handles plus plugin-instance data

use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::value::Value;

/// Live handle to a value owned by the host application
pub type SharedValue = Rc<RefCell<Value>>;

#[derive(Debug, Clone)]
enum Binding {
    Owned(Value),
    Shared(SharedValue),
}

#[derive(Debug, Clone, Default)]
pub struct Variables {
    bindings: IndexMap<String, Binding>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a copy of a value under a name
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.bindings
            .insert(name.into(), Binding::Owned(value.into()));
    }

    /// Store a shared handle; reads see the handle's value at access time
    pub fn share(&mut self, name: impl Into<String>, value: SharedValue) {
        self.bindings.insert(name.into(), Binding::Shared(value));
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.bindings.get(name).map(|binding| match binding {
            Binding::Owned(value) => value.clone(),
            Binding::Shared(shared) => shared.borrow().clone(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

/// Plugin-instance storage keyed by compilation unit and plugin name
#[derive(Debug, Clone, Default)]
pub struct PluginStore {
    entries: HashMap<(u32, String), Value>,
}

impl PluginStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, unit: u32, name: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert((unit, name.into()), value.into());
    }

    pub fn get(&self, unit: u32, name: &str) -> Value {
        self.entries
            .get(&(unit, name.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}
