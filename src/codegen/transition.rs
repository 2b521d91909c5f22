//! Transition and YYFILL emission.
//!
//! `gen_goto` emits one DFA transition: tag operations, skip, the jump in
//! the active control-flow shape, and the end-of-input envelope when the
//! transition is marked with `eof`. `gen_fill` is the heart of end-of-input
//! handling: it wires YYSETSTATE, the YYFILL invocation, the fallback
//! transition under the end-of-input rule, and the `YYLESSTHAN` check.

use crate::code::{Code, CodeList};
use crate::codegen::tags::gen_settags;
use crate::codegen::Ctxt;
use crate::dfa::{need_yych_arg, Adfa, Jump, State, TCID0};
use crate::options::{Api, ApiStyle, CodeModel};
use crate::syntax::argsubst;

/// Name of a YYFILL resumption label.
pub(crate) fn fill_label_name(ctx: &mut Ctxt, index: u32) -> String {
    ctx.buf.str(&ctx.opts.label_fill).u32(index).flush()
}

/// Name of the per-condition entry function in rec/func mode.
pub(crate) fn fn_name_for_cond(ctx: &mut Ctxt, cond: &str) -> String {
    ctx.buf.str("yyfn").str(cond).flush()
}

pub(crate) fn gen_abort() -> CodeList {
    vec![Code::Abort]
}

pub(crate) fn gen_state_set(ctx: &mut Ctxt, stmts: &mut CodeList, fillidx: &str) {
    let opts = ctx.opts;
    let text = argsubst(&opts.api_state_set, &opts.state_set_param, "state", true, fillidx);
    if opts.state_set_naked {
        stmts.push(Code::text(text));
    } else {
        stmts.push(Code::stmt(format!("{}({})", text, fillidx)));
    }
}

pub(crate) fn gen_cond_set(ctx: &mut Ctxt, stmts: &mut CodeList, cond: &str) {
    let opts = ctx.opts;
    let text = argsubst(&opts.api_cond_set, &opts.cond_set_param, "cond", true, cond);
    if opts.cond_set_naked {
        stmts.push(Code::text(text));
    } else {
        stmts.push(Code::stmt(format!("{}({})", text, cond)));
    }
}

/// Condition text checking that fewer than `n` bytes of input are left.
pub(crate) fn gen_less_than(ctx: &mut Ctxt, n: usize) -> String {
    let opts = ctx.opts;
    if opts.api == Api::Custom {
        ctx.buf.str(&opts.api_less_than);
        if opts.api_style == ApiStyle::Functions {
            ctx.buf.str("(").u64(n as u64).str(")");
            ctx.buf.flush()
        } else {
            let text = ctx.buf.flush();
            argsubst(&text, &opts.api_sigil, "len", true, &n.to_string())
        }
    } else if n == 1 {
        ctx.buf
            .str(&opts.api_limit)
            .str(" <= ")
            .str(&opts.api_cursor)
            .flush()
    } else {
        ctx.buf
            .str("(")
            .str(&opts.api_limit)
            .str(" - ")
            .str(&opts.api_cursor)
            .str(") < ")
            .u64(n as u64)
            .flush()
    }
}

/// Set `yystate` and continue to the head of the dispatch loop.
pub(crate) fn gen_continue_yyloop(ctx: &mut Ctxt, stmts: &mut CodeList, next: &str) {
    stmts.push(Code::assign(ctx.opts.var_state.clone(), next));
    ctx.buf.str("continue");
    if !ctx.opts.label_loop.is_empty() {
        ctx.buf.str(" ").str(&ctx.opts.label_loop);
    }
    stmts.push(Code::stmt(ctx.buf.flush()));
}

/// Attach a two-way branch. In rec/func mode this must be a single if/else
/// (both branches are expressions ending in tail calls; the else may still
/// be empty for YYFILL without the end-of-input rule). In the other modes
/// the second branch follows the `if` unbraced, so it can be elided.
fn gen_if(ctx: &Ctxt, cond: &str, trans1: CodeList, trans2: CodeList, code: &mut CodeList) {
    if ctx.opts.code_model == CodeModel::RecFunc {
        code.push(Code::if_then_else(cond, trans1, trans2));
    } else {
        code.push(Code::if_then_else(cond, trans1, Vec::new()));
        code.extend(trans2);
    }
}

/// The transition taken when YYFILL fails under the end-of-input rule.
pub(crate) fn gen_fill_fallback(
    ctx: &mut Ctxt,
    dfa: &Adfa,
    from: &State,
    jump: Option<&Jump>,
) -> CodeList {
    debug_assert!(ctx.opts.fill_eof);

    let fb = from
        .fallback
        .expect("state with end-of-input rule has no fallback transition");
    let mut falltags = fb.tags;

    if from.go.tags != TCID0 {
        // Tags have been hoisted out of transitions into the state (tags on
        // all transitions coincide, the fallback included). Do not duplicate
        // them on the fallback transition.
        debug_assert!(from.go.tags == falltags);
        falltags = TCID0;
    }

    let mut fallback_trans: CodeList = Vec::new();
    let elide = match jump {
        Some(j) => {
            fb.to == j.to
                && falltags == j.tags
                && !j.skip
                // The fallback transition is one arm of an if/else. In
                // rec/func mode both arms must end in a tail call, so
                // elision is forbidden unless YYFILL is disabled (then the
                // whole if/else collapses into a tail call to the to-state).
                && !(ctx.opts.code_model == CodeModel::RecFunc && ctx.opts.fill_enable)
        },
        None => false,
    };

    if !elide {
        gen_settags(ctx, &mut fallback_trans, dfa, falltags);

        let fb_label = &dfa.state(fb.to).label;
        match ctx.opts.code_model {
            CodeModel::GotoLabel => {
                let label = ctx.buf.str(&ctx.opts.label_prefix).u32(fb_label.index).flush();
                fallback_trans.push(Code::goto(label));
            },
            CodeModel::LoopSwitch => {
                let next = ctx.buf.u32(fb_label.index).flush();
                gen_continue_yyloop(ctx, &mut fallback_trans, &next);
            },
            CodeModel::RecFunc => {
                let fn_common = ctx.fn_common.expect("rec/func mode without fn_common");
                let name = ctx.buf.str(&ctx.opts.label_prefix).u32(fb_label.index).flush();
                fallback_trans.push(Code::TailCall {
                    name,
                    args: fn_common.args.clone(),
                    returns_value: fn_common.ret_type.is_some(),
                });
            },
        }
    }
    // Otherwise the transition is elided: control flow falls through to
    // another transition with the same destination, tags and no YYSKIP.

    fallback_trans
}

/// Transition to the resumption point, from the initial state dispatch or
/// after YYFILL on a transition.
pub(crate) fn gen_goto_after_fill(
    ctx: &mut Ctxt,
    dfa: &Adfa,
    from: &State,
    jump: Option<&Jump>,
) -> CodeList {
    let eof_rule = ctx.opts.fill_eof;
    debug_assert!(ctx.opts.fill_enable);

    let mut resume: CodeList = Vec::new();
    let s = dfa.state(from.fill_state.expect("fill without a fill state"));
    match ctx.opts.code_model {
        CodeModel::GotoLabel => {
            if ctx.opts.storable_state || eof_rule {
                let index = s.fill_label.expect("fill state without a fill label");
                let label = fill_label_name(ctx, index);
                resume.push(Code::goto(label));
            }
        },
        CodeModel::LoopSwitch => {
            let next = ctx.buf.u32(s.label.index).flush();
            gen_continue_yyloop(ctx, &mut resume, &next);
        },
        CodeModel::RecFunc => {
            let fn_common = ctx.fn_common.expect("rec/func mode without fn_common");
            let name = ctx.buf.str(&ctx.opts.label_prefix).u32(s.label.index).flush();
            resume.push(Code::TailCall {
                name,
                args: fn_common.args.clone(),
                returns_value: fn_common.ret_type.is_some(),
            });
        },
    }

    if ctx.opts.storable_state && eof_rule {
        // With storable state and the end-of-input rule, the initial state
        // dispatch must resolve a YYFILL failure itself: if there is still
        // not enough input, it follows the fallback transition of the state
        // that triggered YYFILL. The fallback is inlined here rather than
        // jumping into the middle of a DFA state, which not all target
        // languages can express.
        let mut fallback_or_resume: CodeList = Vec::new();
        let fallback = gen_fill_fallback(ctx, dfa, from, jump);
        let less_than = gen_less_than(ctx, 1);
        gen_if(ctx, &less_than, fallback, resume, &mut fallback_or_resume);
        fallback_or_resume
    } else {
        resume
    }
}

/// Emit the YYFILL envelope for a state, with `tail` appended inside or
/// after the check depending on `fill_check`.
pub(crate) fn gen_fill(
    ctx: &mut Ctxt,
    stmts: &mut CodeList,
    tail: CodeList,
    dfa: &Adfa,
    from: &State,
    jump: Option<&Jump>,
) {
    let opts = ctx.opts;
    let eof_rule = opts.fill_eof;
    let need = if eof_rule { 1 } else { from.fill };

    let mut fill: CodeList = Vec::new();
    if opts.fill_enable {
        if opts.storable_state {
            let fill_state = dfa.state(from.fill_state.expect("fill without a fill state"));
            let index = fill_state.fill_label.expect("fill state without a fill label");
            let idx = ctx.buf.u32(index).flush();
            gen_state_set(ctx, &mut fill, &idx);
        }

        // With the end-of-input rule there is no YYFILL argument and no
        // parameter to replace.
        let opts = ctx.opts;
        let mut call = opts.api_fill.clone();
        if !eof_rule {
            call = argsubst(&call, &opts.fill_param, "len", true, &need.to_string());
        }
        if opts.fill_param_enable {
            call.push('(');
            if !eof_rule {
                call.push_str(&need.to_string());
            }
            call.push(')');
        }

        if eof_rule && !opts.storable_state {
            // End-of-input rule without a storable state: check the YYFILL
            // return value. On success (zero) go to the fill label and
            // rematch.
            let mut cond = call;
            if !opts.fill_naked {
                cond.push_str(" == 0");
            }
            if !opts.var_fill.is_empty() {
                let naked = opts.fill_naked;
                fill.push(if naked { Code::text(cond) } else { Code::stmt(cond) });
                cond = opts.var_fill.clone(); // branch on the stored result
            }
            let rematch = gen_goto_after_fill(ctx, dfa, from, jump);
            let fallback = gen_fill_fallback(ctx, dfa, from, jump);
            gen_if(ctx, &cond, rematch, fallback, &mut fill);
        } else {
            // Otherwise don't check the YYFILL return value: assume that it
            // does not return on failure.
            fill.push(if opts.fill_naked { Code::text(call) } else { Code::stmt(call) });
        }
    } else if eof_rule && !opts.storable_state {
        fill.extend(gen_fill_fallback(ctx, dfa, from, jump));
    }

    if ctx.opts.fill_check && !fill.is_empty() {
        let less_than = gen_less_than(ctx, need);
        gen_if(ctx, &less_than, fill, tail, stmts);
    } else {
        stmts.extend(fill);
        stmts.extend(tail);
    }
}

/// Emit one transition: tag operations, skip, jump, fill envelope.
pub(crate) fn gen_goto(
    ctx: &mut Ctxt,
    dfa: &Adfa,
    stmts: &mut CodeList,
    from: Option<&State>,
    jump: &Jump,
) {
    let mut transition: CodeList = Vec::new();

    gen_settags(ctx, &mut transition, dfa, jump.tags);

    if jump.skip {
        transition.push(Code::Skip);
    }

    let to = dfa.state(jump.to);
    if !jump.elide && to.label.used {
        match ctx.opts.code_model {
            CodeModel::GotoLabel => {
                let label = ctx.buf.str(&ctx.opts.label_prefix).u32(to.label.index).flush();
                transition.push(Code::goto(label));
            },
            CodeModel::LoopSwitch => {
                let next = ctx.buf.u32(to.label.index).flush();
                gen_continue_yyloop(ctx, &mut transition, &next);
            },
            CodeModel::RecFunc => {
                let fn_common = ctx.fn_common.expect("rec/func mode without fn_common");
                let args = if need_yych_arg(dfa, to) {
                    fn_common.args_yych.clone()
                } else {
                    fn_common.args.clone()
                };
                let name = ctx.buf.str(&ctx.opts.label_prefix).u32(to.label.index).flush();
                transition.push(Code::TailCall {
                    name,
                    args,
                    returns_value: fn_common.ret_type.is_some(),
                });
            },
        }
    }
    // Otherwise the goto is elided: control flow falls through to the right
    // DFA state. This is the last statement in a sequence of linear ifs, or
    // a split state added by the tunneling optimization (the latter happens
    // even in rec/func mode).

    if jump.eof {
        let from = from.expect("end-of-input transition without a source state");
        gen_fill(ctx, stmts, transition, dfa, from, Some(jump));
    } else {
        stmts.extend(transition);
    }
}

/// Per-state fill and resumption label, emitted in the state prologue.
pub(crate) fn gen_fill_and_label(ctx: &mut Ctxt, stmts: &mut CodeList, dfa: &Adfa, s: &State) {
    let opts = ctx.opts;

    if opts.fill_enable && !crate::dfa::end_state(dfa, s) && !opts.fill_eof && s.fill > 0 {
        gen_fill(ctx, stmts, Vec::new(), dfa, s, None);
    }

    if ctx.opts.fill_eof {
        // With the end-of-input rule the lexer may jump back to the fill
        // label to rescan the current character. Tag operations go before
        // the label so they are not applied twice (re-application would be
        // wrong for non-idempotent operations).
        gen_settags(ctx, stmts, dfa, s.go.tags);
    }

    if let Some(index) = s.fill_label {
        if ctx.opts.code_model == CodeModel::GotoLabel {
            let name = fill_label_name(ctx, index);
            stmts.push(Code::SLabel { name });
        }
    }
}
