//! # LexForge codegen: DFA to lexer program
//!
//! The code generation core of the LexForge lexer generator. Given an
//! annotated DFA (states, tag commands, accept tables, fallback transitions,
//! end-of-input semantics), it emits a lexer program as an abstract code
//! tree in one of three control-flow shapes:
//!
//! - **goto/label**: states as labeled blocks connected by direct jumps
//! - **loop/switch**: states as numbered cases in a dispatch loop
//! - **rec/func**: states as mutually tail-calling functions
//!
//! ## Architecture
//!
//! ```text
//!  annotated DFAs (upstream construction + optimization passes)
//!        │
//!        ▼
//!  ┌──────────────────────────────────────────────────────┐
//!  │ codegen crate                                        │
//!  │                                                      │
//!  │  per block:  block shape ─→ states ─→ dispatch       │
//!  │              ─→ transitions ─→ tags / YYFILL         │
//!  │                                                      │
//!  │  then:       directive expansion across blocks       │
//!  │              (cond enums, tag lists, state dispatch) │
//!  └──────────────────────────────────────────────────────┘
//!        │
//!        ▼
//!  abstract code tree (rendered to target text elsewhere)
//! ```
//!
//! All three shapes produce lexers with identical observable semantics on
//! equal inputs; the choice is a target-language fit, not a feature switch.

pub mod code;
pub mod codegen;
pub mod dfa;
pub mod options;
pub mod output;
pub mod syntax;

#[cfg(test)]
mod tests;

use thiserror::Error;

use crate::dfa::Loc;

/// Errors surfaced by code generation. The first failure aborts the current
/// pass; partially generated blocks are not committed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodegenError {
    /// A directive lists a block name that does not exist.
    #[error("cannot find block '{name}' listed in `{directive}` directive")]
    UnknownBlock { name: String, directive: &'static str },

    /// A listed block generates no code, so there is nothing to dispatch to.
    #[error("block '{name}' does not generate code, so it should not be listed in `{directive}` directive")]
    BlockWithoutCode { name: String, directive: &'static str },

    /// No block in the directive's scope generates any code.
    #[error("none of the blocks in `{directive}` generate any code")]
    EmptyDirectiveTarget { directive: &'static str },

    /// Two blocks define the same prefixed condition name with different
    /// numbers.
    #[error(
        "cannot generate condition enumeration: condition '{cond}' has different numbers \
         in blocks '{first_block}' and '{second_block}' (set a per-block enum prefix)"
    )]
    CondEnumCollision {
        cond: String,
        first_block: String,
        second_block: String,
    },
}

/// Warnings collected on the output; the driver decides how to report them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Warning {
    /// Generated condition dispatch depends on condition numbering and no
    /// external header pins the enum down; user code hardcoding numbers may
    /// break when numbering changes.
    #[error("{}:{}: generated condition dispatch assumes condition order", .loc.file, .loc.line)]
    ConditionOrder { loc: Loc },
}

pub use crate::codegen::codegen_generate;
pub use crate::options::{Api, ApiStyle, CodeModel, Opts};
pub use crate::output::{BlockKind, FnCommon, Output, OutputBlock};
