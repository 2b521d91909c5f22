//! Output blocks and cross-block bookkeeping.
//!
//! The front end accumulates one `OutputBlock` per input block (two ordered
//! lists: source blocks, then header blocks), each pre-seeded with a code
//! list of placeholders. Codegen freezes a block, replaces its `Dfas`
//! placeholder with the generated program, and records the plain data the
//! directive expander aggregates afterwards: tag names, conditions, fill
//! resumption fragments, maxima.

use std::collections::{BTreeMap, BTreeSet};

use crate::code::{Code, CodeList, Param};
use crate::dfa::{Adfa, Label, Loc, StartCond};
use crate::options::Opts;
use crate::Warning;

/// Kind of an input block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Ordinary block that generates code in place.
    Code,
    /// Reusable block instantiated elsewhere; gets a block-local state
    /// switch under an autogenerated name.
    Use,
}

/// Common signature of the generated state functions in rec/func mode:
/// parameter and argument lists, with and without the `yych` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnCommon {
    pub name: String,
    pub ret_type: Option<String>,
    pub params: Vec<Param>,
    pub params_yych: Vec<Param>,
    pub args: Vec<String>,
    pub args_yych: Vec<String>,
}

impl FnCommon {
    /// The standard signature: every state function takes the lexer record;
    /// peek-less functions additionally take the current character.
    pub fn from_opts(opts: &Opts) -> Self {
        let record = Param {
            name: opts.var_record.clone(),
            param_type: Some(opts.api_record_type.clone()),
        };
        let yych = Param {
            name: opts.var_char.clone(),
            param_type: Some(opts.api_char_type.clone()),
        };
        FnCommon {
            name: opts.fn_name.clone(),
            ret_type: if opts.fn_return_type.is_empty() {
                None
            } else {
                Some(opts.fn_return_type.clone())
            },
            params: vec![record.clone()],
            params_yych: vec![record, yych],
            args: vec![opts.var_record.clone()],
            args_yych: vec![opts.var_record.clone(), opts.var_char.clone()],
        }
    }
}

/// One input block with its options, DFAs and accumulated directive data.
#[derive(Debug, Clone)]
pub struct OutputBlock {
    pub name: String,
    pub kind: BlockKind,
    pub loc: Loc,
    pub opts: Opts,
    /// DFAs of this block (one per condition); discarded after codegen.
    pub dfas: Vec<Adfa>,
    /// Code list seeded by the front end: directive placeholders around a
    /// `Dfas` placeholder. Codegen rewrites the placeholders in place.
    pub code: CodeList,

    pub stags: BTreeSet<String>,
    pub mtags: BTreeSet<String>,
    pub conds: Vec<StartCond>,
    /// Fill resumption fragments keyed by fill label index; feeds the state
    /// dispatch switch.
    pub fill_goto: BTreeMap<u32, CodeList>,
    /// Block-level start label (storable state and condition dispatch jump
    /// here). Allocated by the upstream label pass.
    pub start_label: Option<Label>,
    pub used_yyaccept: bool,
    pub max_fill: usize,
    pub max_nmatch: usize,
    pub fn_common: Option<FnCommon>,
}

impl OutputBlock {
    /// A fresh block whose code list holds a single `Dfas` placeholder.
    pub fn new(name: &str, opts: Opts) -> Self {
        OutputBlock {
            name: name.to_string(),
            kind: BlockKind::Code,
            loc: Loc { file: String::new(), line: 0 },
            opts,
            dfas: Vec::new(),
            code: vec![Code::Dfas],
            stags: BTreeSet::new(),
            mtags: BTreeSet::new(),
            conds: Vec::new(),
            fill_goto: BTreeMap::new(),
            start_label: None,
            used_yyaccept: false,
            max_fill: 1,
            max_nmatch: 1,
            fn_common: None,
        }
    }
}

/// The whole output: source blocks, header blocks, global options and the
/// warning sink. Blocks are processed in order, source file first.
#[derive(Debug)]
pub struct Output {
    pub cblocks: Vec<OutputBlock>,
    pub hblocks: Vec<OutputBlock>,
    /// Options accumulated across the whole program; used by directives that
    /// span several blocks.
    pub total_opts: Opts,
    pub warnings: Vec<Warning>,
    /// An explicit state-dispatch directive exists somewhere, so no implicit
    /// global one should be generated.
    pub explicit_state_goto: bool,
    /// The implicit global state switch has been generated already.
    pub state_goto_done: bool,
    /// A condition-type directive exists, so dispatch order is not a user
    /// assumption.
    pub cond_type_defined: bool,
}

impl Output {
    pub fn new(total_opts: Opts) -> Self {
        Output {
            cblocks: Vec::new(),
            hblocks: Vec::new(),
            total_opts,
            warnings: Vec::new(),
            explicit_state_goto: false,
            state_goto_done: false,
            cond_type_defined: false,
        }
    }

    /// Look up a block by name, source blocks first.
    pub fn find_block(&self, name: &str) -> Option<&OutputBlock> {
        self.cblocks
            .iter()
            .chain(self.hblocks.iter())
            .find(|b| b.name == name)
    }
}
