// ABOUTME: Process manager tracking nested compilation units as a state machine
// ABOUTME: Handles root, included, inline and block processes with parent rules, flags and forced closes

use tracing::debug;

use super::error::{Result, TemplateError};
use super::scope::VariableRegistry;

/// Id given to the outermost template
pub const PID_ROOT: u32 = 1;

/// Variables of this template were checked by the including template
pub const FLAG_VARS_CHECKED: u32 = 1;

/// Index of a process inside the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessHandle(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessKind {
    Root,
    /// A template included through a resource reference
    External,
    /// Dynamic content compiled inside the enclosing template's unit
    Inline,
    /// A structural tag body such as `if` or `section`
    Block,
}

impl ProcessKind {
    pub fn is_template(self) -> bool {
        !matches!(self, ProcessKind::Block)
    }

    fn owns_scope(self) -> bool {
        matches!(self, ProcessKind::Root | ProcessKind::External)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Open,
    Suspended,
    Closed,
}

/// What opened a process, used in error reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creator {
    pub label: String,
    pub line: u32,
}

impl Creator {
    pub fn new(label: impl Into<String>, line: u32) -> Self {
        Self {
            label: label.into(),
            line,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Process {
    pub id: u32,
    pub kind: ProcessKind,
    pub parent: Option<ProcessHandle>,
    pub creator: Creator,
    pub state: ProcessState,
    flags: u32,
    terminated: bool,
}

impl Process {
    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag == flag
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

#[derive(Debug)]
pub struct ProcessManager {
    processes: Vec<Process>,
    current: Option<ProcessHandle>,
    current_template: Option<ProcessHandle>,
    /// Template processes suspended by a nested template
    templates: Vec<ProcessHandle>,
    next_id: u32,
}

impl ProcessManager {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            current: None,
            current_template: None,
            templates: Vec::new(),
            next_id: PID_ROOT,
        }
    }

    /// Open a process below the current one and make it current
    pub fn enter(
        &mut self,
        kind: ProcessKind,
        creator: Creator,
        variables: &mut VariableRegistry,
    ) -> Result<ProcessHandle> {
        let parent = self.current;
        match (kind, parent) {
            (ProcessKind::Root, Some(_)) => {
                return Err(TemplateError::process(
                    creator.line,
                    "root template process cannot have any parents",
                ))
            }
            (ProcessKind::Root, None) => {}
            (_, None) => {
                return Err(TemplateError::process(
                    creator.line,
                    format!("{}: parent process required", creator.label),
                ))
            }
            (_, Some(_)) => {}
        }

        let (id, flags) = match kind {
            ProcessKind::Inline => {
                let template = self.template_process().ok_or_else(|| {
                    TemplateError::process(creator.line, "inline template requires an enclosing template")
                })?;
                (template.id, template.flags)
            }
            ProcessKind::External => {
                let flags = self.template_process().map_or(0, |t| t.flags);
                (self.allocate_id(), flags)
            }
            _ => (self.allocate_id(), 0),
        };

        if let Some(parent) = parent {
            self.processes[parent.0].state = ProcessState::Suspended;
        }

        let handle = ProcessHandle(self.processes.len());
        debug!(
            "Entering {:?} process #{} ({} at line {})",
            kind, id, creator.label, creator.line
        );
        self.processes.push(Process {
            id,
            kind,
            parent,
            creator,
            state: ProcessState::Open,
            flags,
            terminated: false,
        });

        if kind.is_template() {
            if let Some(previous) = self.current_template.replace(handle) {
                self.templates.push(previous);
            }
        }
        if kind.owns_scope() {
            variables.push_scope();
        }

        self.current = Some(handle);
        Ok(handle)
    }

    /// Record that the process received its terminating construct
    pub fn terminate(&mut self, handle: ProcessHandle) {
        if let Some(process) = self.processes.get_mut(handle.0) {
            process.terminated = true;
        }
    }

    /// Close every process from the current one up to and including `target`
    pub fn leave(&mut self, target: ProcessHandle, variables: &mut VariableRegistry) -> Result<()> {
        let current = self
            .current
            .ok_or_else(|| TemplateError::process(0, "no process to leave"))?;

        let mut chain = Vec::new();
        let mut cursor = Some(current);
        while let Some(handle) = cursor {
            chain.push(handle);
            if handle == target {
                break;
            }
            cursor = self.processes[handle.0].parent;
        }

        if chain.last() != Some(&target) {
            let id = self.processes.get(target.0).map_or(0, |p| p.id);
            return Err(TemplateError::process(0, format!("process #{} not found", id)));
        }

        for handle in chain {
            self.close(handle, variables)?;
            let parent = self.processes[handle.0].parent;
            if let Some(parent) = parent {
                self.processes[parent.0].state = ProcessState::Open;
            }
            self.current = parent;
        }

        Ok(())
    }

    fn close(&mut self, handle: ProcessHandle, variables: &mut VariableRegistry) -> Result<()> {
        let process = &self.processes[handle.0];
        if process.state == ProcessState::Closed {
            return Err(TemplateError::process(
                process.creator.line,
                "cannot close process twice",
            ));
        }

        if !process.terminated {
            let message = match process.kind {
                ProcessKind::Block => format!("{}: missing end tag", process.creator.label),
                ProcessKind::Inline | ProcessKind::External => {
                    "illegal close of inline/external template process".to_string()
                }
                ProcessKind::Root => "illegal close of root template process".to_string(),
            };
            return Err(TemplateError::process(process.creator.line, message));
        }

        let kind = process.kind;
        debug!("Closing {:?} process #{}", kind, process.id);
        self.processes[handle.0].state = ProcessState::Closed;

        if kind.is_template() {
            self.current_template = self.templates.pop();
        }
        if kind.owns_scope() {
            variables.pop_scope();
        }
        if kind == ProcessKind::Root {
            self.next_id = PID_ROOT;
            self.templates.clear();
        }

        Ok(())
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn current(&self) -> Option<&Process> {
        self.current.map(|handle| &self.processes[handle.0])
    }

    pub fn current_handle(&self) -> Option<ProcessHandle> {
        self.current
    }

    pub fn get(&self, handle: ProcessHandle) -> Option<&Process> {
        self.processes.get(handle.0)
    }

    /// The innermost template-kind process
    pub fn template_process(&self) -> Option<&Process> {
        self.current_template.map(|handle| &self.processes[handle.0])
    }

    /// Id of the compilation unit currently being compiled
    pub fn current_unit(&self) -> u32 {
        self.template_process().map_or(PID_ROOT, |process| process.id)
    }

    /// Set a flag on the current template, returning whether it was newly set
    pub fn set_flag(&mut self, flag: u32) -> bool {
        match self.current_template {
            Some(handle) => {
                let process = &mut self.processes[handle.0];
                let newly_set = process.flags & flag != flag;
                process.flags |= flag;
                newly_set
            }
            None => false,
        }
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.template_process()
            .is_some_and(|process| process.has_flag(flag))
    }

    /// Next id a non-inline process would receive
    pub fn next_id(&self) -> u32 {
        self.next_id
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}
