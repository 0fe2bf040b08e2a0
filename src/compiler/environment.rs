// ABOUTME: Compile environment threaded through every parsing and compilation step of one request
// ABOUTME: Owns the process manager, alias scopes, resource handler cache, recursion guard and active loop ids

use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::debug;

use super::error::{Result, TemplateError};
use super::plugins::PluginManager;
use super::process::{Creator, ProcessHandle, ProcessKind, ProcessManager};
use super::scope::VariableRegistry;
use crate::engine::config::EngineConfig;
use crate::plugins::ModifierRegistry;
use crate::resource::{ProviderRegistry, ResourceProvider};
use crate::template::program::LoopKind;
use crate::template::Variables;

pub struct CompileEnvironment<'a> {
    pub config: &'a EngineConfig,
    /// Initial variables used by compile-time evaluation
    pub values: &'a Variables,
    pub processes: ProcessManager,
    pub variables: VariableRegistry,
    pub modifiers: PluginManager<'a>,
    providers: &'a ProviderRegistry,
    handlers: HashMap<String, Rc<dyn ResourceProvider>>,
    open_resources: HashSet<String>,
    active_loops: HashMap<u32, HashMap<String, LoopKind>>,
}

impl<'a> CompileEnvironment<'a> {
    pub fn new(
        config: &'a EngineConfig,
        values: &'a Variables,
        modifiers: &'a ModifierRegistry,
        providers: &'a ProviderRegistry,
    ) -> Self {
        Self {
            config,
            values,
            processes: ProcessManager::new(),
            variables: VariableRegistry::new(),
            modifiers: PluginManager::new(modifiers),
            providers,
            handlers: HashMap::new(),
            open_resources: HashSet::new(),
            active_loops: HashMap::new(),
        }
    }

    pub fn enter(&mut self, kind: ProcessKind, creator: Creator) -> Result<ProcessHandle> {
        self.processes.enter(kind, creator, &mut self.variables)
    }

    pub fn terminate(&mut self, handle: ProcessHandle) {
        self.processes.terminate(handle);
    }

    pub fn leave(&mut self, handle: ProcessHandle) -> Result<()> {
        self.processes.leave(handle, &mut self.variables)
    }

    /// Id of the compilation unit being compiled
    pub fn current_unit(&self) -> u32 {
        self.processes.current_unit()
    }

    pub fn is_system_var(&self, name: &str) -> bool {
        self.config.is_system_var(name)
    }

    /// Provider for a resource dsn, built once per request
    pub fn resource_handler(&mut self, dsn: &str, line: u32) -> Result<Rc<dyn ResourceProvider>> {
        if let Some(handler) = self.handlers.get(dsn) {
            return Ok(Rc::clone(handler));
        }

        let kind = self.config.resources.get(dsn).ok_or_else(|| {
            TemplateError::existence(line, format!("unknown resource name: {}", dsn))
        })?;
        let provider = self.providers.create(kind, self.config).ok_or_else(|| {
            TemplateError::existence(line, format!("unresolvable resource provider: {}", kind))
        })?;

        debug!("Created {} resource provider for dsn {}", kind, dsn);
        let handler: Rc<dyn ResourceProvider> = Rc::from(provider);
        self.handlers.insert(dsn.to_string(), Rc::clone(&handler));
        Ok(handler)
    }

    /// Mark a resource as being compiled, failing if it is already open higher in the chain
    pub fn open_resource(&mut self, dsn: &str, path: &str, line: u32) -> Result<()> {
        let key = format!("{}%{}", dsn, path);
        if !self.open_resources.insert(key) {
            return Err(TemplateError::Recursion {
                line,
                resource: format!("{}[{}]", dsn, path),
            });
        }
        Ok(())
    }

    pub fn close_resource(&mut self, dsn: &str, path: &str) {
        self.open_resources.remove(&format!("{}%{}", dsn, path));
    }

    /// Register a section or foreach id in the current unit
    pub fn open_loop(&mut self, kind: LoopKind, id: &str, line: u32) -> Result<()> {
        let unit = self.current_unit();
        let ids = self.active_loops.entry(unit).or_default();
        if ids.contains_key(id) {
            return Err(TemplateError::process(
                line,
                format!("{} id already in use: {}", kind.as_str(), id),
            ));
        }
        ids.insert(id.to_string(), kind);
        Ok(())
    }

    pub fn close_loop(&mut self, id: &str) {
        let unit = self.current_unit();
        if let Some(ids) = self.active_loops.get_mut(&unit) {
            ids.remove(id);
        }
    }

    /// Kind of the active loop named `id` in the current unit
    pub fn active_loop(&self, id: &str) -> Option<LoopKind> {
        self.active_loops
            .get(&self.current_unit())
            .and_then(|ids| ids.get(id))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::error::ErrorKind;

    struct Fixture {
        config: EngineConfig,
        values: Variables,
        modifiers: ModifierRegistry,
        providers: ProviderRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                config: EngineConfig::default(),
                values: Variables::new(),
                modifiers: ModifierRegistry::new(),
                providers: ProviderRegistry::new(),
            }
        }

        fn env(&self) -> CompileEnvironment<'_> {
            CompileEnvironment::new(&self.config, &self.values, &self.modifiers, &self.providers)
        }
    }

    #[test]
    fn test_recursion_guard() {
        let fixture = Fixture::new();
        let mut env = fixture.env();
        env.open_resource("file", "a.tpl", 1).unwrap();
        env.open_resource("file", "b.tpl", 2).unwrap();

        let err = env.open_resource("file", "a.tpl", 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Recursion);
        assert_eq!(err.line(), 3);

        env.close_resource("file", "a.tpl");
        env.open_resource("file", "a.tpl", 4).unwrap();
    }

    #[test]
    fn test_loop_ids_are_per_unit() {
        let fixture = Fixture::new();
        let mut env = fixture.env();
        env.enter(ProcessKind::Root, Creator::new("page.tpl", 1))
            .unwrap();
        env.open_loop(LoopKind::Section, "i", 1).unwrap();
        assert_eq!(env.active_loop("i"), Some(LoopKind::Section));

        let err = env.open_loop(LoopKind::Foreach, "i", 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Process);
        assert!(err.to_string().contains("id already in use"));

        let included = env
            .enter(ProcessKind::External, Creator::new("file[a.tpl]", 3))
            .unwrap();
        assert_eq!(env.active_loop("i"), None);
        env.open_loop(LoopKind::Section, "i", 3).unwrap();
        env.close_loop("i");
        env.terminate(included);
        env.leave(included).unwrap();

        assert_eq!(env.active_loop("i"), Some(LoopKind::Section));
        env.close_loop("i");
        assert_eq!(env.active_loop("i"), None);
    }

    #[test]
    fn test_resource_handlers() {
        let fixture = Fixture::new();
        let mut env = fixture.env();
        let first = env.resource_handler("file", 1).unwrap();
        let second = env.resource_handler("file", 1).unwrap();
        assert!(Rc::ptr_eq(&first, &second));

        let err = env.resource_handler("db", 5).err().expect("expected error");
        assert_eq!(err.kind(), ErrorKind::Existence);
        assert!(err.to_string().contains("unknown resource name"));
    }

    #[test]
    fn test_unresolvable_provider() {
        let mut fixture = Fixture::new();
        fixture.config.set_resource_assoc("db", "mysql").unwrap();
        let mut env = fixture.env();
        let err = env.resource_handler("db", 2).err().expect("expected error");
        assert!(err.to_string().contains("unresolvable resource provider: mysql"));
    }
}
