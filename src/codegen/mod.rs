//! Code generation pipeline.
//!
//! Two passes over the output:
//! 1. **Per-block**: each block's DFAs are lowered into the block's code
//!    list in the configured control-flow shape (`block` module, fanning out
//!    to the state/dispatch/transition/tag emitters).
//! 2. **Cross-block**: directive placeholders (condition enums, tag lists,
//!    maxima, state dispatch) are rewritten in place once all blocks have
//!    contributed their data (`directives` module).
//!
//! Blocks are processed in order: source blocks, then header blocks. A
//! block's DFAs are discarded after its code has been generated.

pub mod action;
pub mod block;
pub mod directives;
pub mod dispatch;
pub mod tags;
pub mod transition;

use crate::output::{FnCommon, Output};
use crate::options::Opts;
use crate::syntax::Scratch;
use crate::CodegenError;

/// Per-block emitter context: the block's options, the shared scratch
/// buffer, and the rec/func signature when that mode is active.
pub(crate) struct Ctxt<'a> {
    pub opts: &'a Opts,
    pub buf: &'a mut Scratch,
    pub fn_common: Option<&'a FnCommon>,
}

/// Run code generation over all blocks, then expand cross-block directives.
///
/// On failure the current pass is aborted and the error is returned
/// verbatim; partially rewritten placeholders of other blocks are left
/// untouched (the caller discards the output on error).
pub fn codegen_generate(output: &mut Output) -> Result<(), CodegenError> {
    let mut buf = Scratch::new();

    let Output {
        cblocks,
        hblocks,
        warnings,
        explicit_state_goto,
        state_goto_done,
        cond_type_defined,
        ..
    } = output;

    for b in cblocks.iter_mut().chain(hblocks.iter_mut()) {
        block::generate_block(
            b,
            &mut buf,
            warnings,
            *cond_type_defined,
            *explicit_state_goto,
            state_goto_done,
        )?;
        // DFAs are no longer used after this phase.
        b.dfas.clear();
    }

    directives::expand_directives(output)
}
