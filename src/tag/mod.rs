// ABOUTME: Tag handlers recognized by the compiler driver and the blocks they open
// ABOUTME: Each handler inspects one tag and either declines it or emits output or a block

pub mod attribute;
pub mod comment;
pub mod conditional;
pub mod foreach;
pub mod literal;
pub mod print;
pub mod section;

pub use attribute::Attribute;
pub use conditional::IfBlock;
pub use foreach::ForeachBlock;
pub use literal::LiteralBlock;
pub use section::SectionBlock;

use crate::compiler::environment::CompileEnvironment;
use crate::compiler::error::Result;
use crate::compiler::process::ProcessHandle;
use crate::expression::Expression;
use crate::parser::TagCursor;
use crate::template::program::Node;

/// Handler trying to claim a tag; `None` passes it to the next handler
pub type TagFn = fn(&mut TagCursor, &mut CompileEnvironment) -> Result<Option<Emitted>>;

/// Handlers for full templates, in trial order
pub const TEMPLATE_TAGS: &[TagFn] = &[
    comment::open,
    literal::open,
    conditional::open,
    section::open,
    foreach::open,
    print::open,
];

/// Handlers for dynamic strings
pub const INLINE_TAGS: &[TagFn] = &[comment::open, print::open];

#[derive(Debug)]
pub enum Emitted {
    Nothing,
    Print(Expression),
    Open(Block),
}

/// What an open block did with a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Not for this block
    Pass,
    /// Consumed, such as `else`
    Handled,
    /// The block's end tag
    Close,
    /// Copy the tag to the body as text
    Verbatim,
}

#[derive(Debug)]
pub enum Block {
    If(IfBlock),
    Section(SectionBlock),
    Foreach(ForeachBlock),
    Literal(LiteralBlock),
}

impl Block {
    pub fn on_tag(&mut self, cursor: &mut TagCursor, env: &mut CompileEnvironment) -> Result<Step> {
        match self {
            Block::If(block) => block.on_tag(cursor, env),
            Block::Section(block) => block.on_tag(cursor),
            Block::Foreach(block) => block.on_tag(cursor),
            Block::Literal(block) => Ok(block.on_tag(cursor)),
        }
    }

    /// Whether the tag is this block's end tag
    pub fn is_end_tag(&self, cursor: &TagCursor) -> bool {
        let end = match self {
            Block::If(_) => "/if",
            Block::Section(_) => "/section",
            Block::Foreach(_) => "/foreach",
            Block::Literal(_) => "/literal",
        };
        cursor.is_word(end)
    }

    pub fn handle(&self) -> ProcessHandle {
        match self {
            Block::If(block) => block.handle(),
            Block::Section(block) => block.handle(),
            Block::Foreach(block) => block.handle(),
            Block::Literal(block) => block.handle(),
        }
    }

    pub fn body_mut(&mut self) -> &mut Vec<Node> {
        match self {
            Block::If(block) => block.body_mut(),
            Block::Section(block) => block.body_mut(),
            Block::Foreach(block) => block.body_mut(),
            Block::Literal(block) => block.body_mut(),
        }
    }

    pub fn close(self, env: &mut CompileEnvironment) -> Result<Vec<Node>> {
        match self {
            Block::If(block) => block.close(env),
            Block::Section(block) => block.close(env),
            Block::Foreach(block) => block.close(env),
            Block::Literal(block) => block.close(env),
        }
    }
}
