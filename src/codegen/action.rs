//! Per-state prologue and action emission.
//!
//! `emit_action` selects the prologue for a state by its action kind (skip,
//! fill, backup, peek, debug hook), `emit_accept` dispatches on the backed-up
//! accept register, and `emit_rule` finalizes tags and emits the semantic
//! action (user text or the autogenerated condition transition).

use crate::code::{Code, CodeList};
use crate::codegen::tags::gen_fintags;
use crate::codegen::transition::{
    fn_name_for_cond, gen_cond_set, gen_continue_yyloop, gen_fill_and_label, gen_goto,
    gen_state_set,
};
use crate::codegen::Ctxt;
use crate::dfa::{omit_peek, AcceptTrans, Action, Adfa, Jump, State, NOSAVE, TCID0};
use crate::options::{Api, ApiStyle, CodeModel};
use crate::syntax::{argsubst, cond_enum_elem};

fn gen_peek(dfa: &Adfa, s: &State, stmts: &mut CodeList) {
    if !omit_peek(dfa, s) {
        stmts.push(Code::Peek);
    }
}

/// Debug hook. The label may be unused but still valid (the initial label in
/// goto/label mode is one such case); it still gets a hook.
pub(crate) fn gen_debug(ctx: &mut Ctxt, label_index: u32, stmts: &mut CodeList) {
    if !ctx.opts.debug {
        return;
    }

    if ctx.opts.api == Api::Default {
        stmts.push(Code::Debug { state: label_index });
    } else if ctx.opts.api_style == ApiStyle::Freeform {
        let opts = ctx.opts;
        let mut text = argsubst(
            &opts.api_debug,
            &opts.api_sigil,
            "state",
            false,
            &label_index.to_string(),
        );
        text = argsubst(&text, &opts.api_sigil, "char", false, &opts.var_char);
        stmts.push(Code::text(text));
    } else {
        let text = ctx.buf.str(&ctx.opts.api_debug).str("()").flush();
        stmts.push(Code::stmt(text));
    }
}

/// Restore the cursor from the backup marker.
fn gen_restore(ctx: &mut Ctxt, stmts: &mut CodeList) {
    let opts = ctx.opts;
    if opts.api == Api::Default {
        stmts.push(Code::assign(opts.api_cursor.clone(), opts.api_marker.clone()));
    } else if opts.api_style == ApiStyle::Functions {
        let text = ctx.buf.str(&ctx.opts.api_restore).str("()").flush();
        stmts.push(Code::stmt(text));
    } else {
        stmts.push(Code::text(opts.api_restore.clone()));
    }
}

fn emit_accept_binary(
    ctx: &mut Ctxt,
    dfa: &Adfa,
    acc: &[AcceptTrans],
    l: usize,
    r: usize,
) -> CodeList {
    let mut stmts: CodeList = Vec::new();
    if l < r {
        let m = (l + r) >> 1;
        let cmp = if r == l + 1 { " == " } else { " <= " };
        let if_cond = ctx.buf.str(&ctx.opts.var_accept).str(cmp).u64(m as u64).flush();
        let if_then = emit_accept_binary(ctx, dfa, acc, l, m);
        let if_else = emit_accept_binary(ctx, dfa, acc, m + 1, r);
        stmts.push(Code::if_then_else(&if_cond, if_then, if_else));
    } else {
        let jump = Jump { to: acc[l].state, tags: acc[l].tags, skip: false, eof: false, elide: false };
        gen_goto(ctx, dfa, &mut stmts, None, &jump);
    }
    stmts
}

/// Dispatch on the `yyaccept` register after restoring the cursor.
pub(crate) fn emit_accept(ctx: &mut Ctxt, stmts: &mut CodeList, dfa: &Adfa, acc: &[AcceptTrans]) {
    let nacc = acc.len();

    if nacc == 0 {
        return;
    }

    gen_restore(ctx, stmts);

    // Only one possible value: unconditional jump.
    if nacc == 1 {
        let jump = Jump { to: acc[0].state, tags: acc[0].tags, skip: false, eof: false, elide: false };
        gen_goto(ctx, dfa, stmts, None, &jump);
        return;
    }

    let have_tags = acc.iter().any(|a| a.tags != TCID0);

    // Jump table (tag-carrying entries inhibit it: the tag operations need a
    // place to go in each branch).
    if ctx.opts.computed_gotos && nacc >= ctx.opts.computed_gotos_threshold && !have_tags {
        let mut block: CodeList = Vec::new();

        let mut elems = Vec::with_capacity(nacc);
        for a in acc {
            let label = dfa.state(a.state).label.index;
            elems.push(ctx.buf.str("&&").str(&ctx.opts.label_prefix).u32(label).flush());
        }
        block.push(Code::Array {
            name: ctx.opts.var_computed_gotos_table.clone(),
            elem_type: ctx.opts.stx_type_yytarget.clone(),
            elems,
            tabulate: false,
        });

        let label = ctx
            .buf
            .str("*")
            .str(&ctx.opts.var_computed_gotos_table)
            .str("[")
            .str(&ctx.opts.var_accept)
            .str("]")
            .flush();
        block.push(Code::goto(label));

        stmts.push(Code::Block { stmts: block, kind: crate::code::BlockKind::Wrapped });
        return;
    }

    // Nested ifs.
    if ctx.opts.nested_ifs || nacc == 2 {
        stmts.extend(emit_accept_binary(ctx, dfa, acc, 0, nacc - 1));
        return;
    }

    // Switch; the last case doubles as the default.
    let mut cases = Vec::with_capacity(nacc);
    for (i, a) in acc.iter().enumerate() {
        let mut body: CodeList = Vec::new();
        let jump = Jump { to: a.state, tags: a.tags, skip: false, eof: false, elide: false };
        gen_goto(ctx, dfa, &mut body, None, &jump);
        if i == nacc - 1 {
            cases.push(Code::case_default(body));
        } else {
            cases.push(Code::case_number(i as i32, body));
        }
    }
    stmts.push(Code::Switch { expr: ctx.opts.var_accept.clone(), cases });
}

/// Emit a fired rule: tag finalization, then the semantic action.
fn emit_rule(ctx: &mut Ctxt, stmts: &mut CodeList, dfa: &Adfa, rule_idx: usize) {
    let rule = &dfa.rules[rule_idx];
    let semact = &rule.semact;

    gen_fintags(ctx, stmts, dfa, rule);

    // Condition in the semantic action is the one set with => or :=> rules.
    let cond = semact.cond.as_deref().unwrap_or(&dfa.cond);
    let next_cond = cond_enum_elem(ctx.opts, cond);

    if ctx.opts.storable_state {
        // The final state must set the stored state: a user loop around the
        // lexer re-enters through the state dispatch, which should land in
        // the initial DFA state on the next iteration. Normally that is the
        // distinguished -1 state; in loop/switch mode conditions and
        // storable states share `yystate`, so it is the next condition.
        let next_state =
            if dfa.cond.is_empty() || ctx.opts.code_model != CodeModel::LoopSwitch {
                "-1".to_string()
            } else {
                next_cond.clone()
            };
        gen_state_set(ctx, stmts, &next_state);
    }

    let cond_changed = semact.cond.as_deref().is_some_and(|c| c != dfa.cond);
    if cond_changed
        && !(ctx.opts.code_model == CodeModel::LoopSwitch && ctx.opts.storable_state)
    {
        // Omit YYSETCONDITION when the condition does not change. Also omit
        // it when storable state subsumes conditions: only one of YYGETSTATE
        // and YYGETCONDITION can initialize `yystate`, and it must be
        // YYGETSTATE because the lexer may be re-entered after YYFILL, so
        // the final states use YYSETSTATE instead.
        gen_cond_set(ctx, stmts, &next_cond);
    }

    if !semact.autogen {
        // User-defined semantic action.
        if !dfa.setup.is_empty() {
            stmts.push(Code::text(dfa.setup.clone()));
        }
        if ctx.opts.line_dirs {
            stmts.push(Code::LineInfoInput { loc: semact.loc.clone() });
        }
        if ctx.opts.indentation_sensitive {
            for line in semact.text.split('\n') {
                stmts.push(Code::text(line));
            }
        } else {
            stmts.push(Code::text(semact.text.clone()));
        }
        if ctx.opts.line_dirs {
            stmts.push(Code::LineInfoOutput);
        }
    } else {
        // Autogenerated action for the :=> rule.
        match ctx.opts.code_model {
            CodeModel::GotoLabel => {
                let opts = ctx.opts;
                let label = format!("{}{}", opts.cond_label_prefix, cond);
                let text = argsubst(&opts.cond_goto, &opts.cond_goto_param, "cond", true, &label);
                stmts.push(Code::text(text));
            },
            CodeModel::LoopSwitch => {
                gen_continue_yyloop(ctx, stmts, &next_cond);
            },
            CodeModel::RecFunc => {
                let fn_common = ctx.fn_common.expect("rec/func mode without fn_common");
                let name = fn_name_for_cond(ctx, cond);
                stmts.push(Code::TailCall {
                    name,
                    args: fn_common.args.clone(),
                    returns_value: fn_common.ret_type.is_some(),
                });
            },
        }
    }
}

/// Per-state prologue and action, keyed on the action kind.
pub(crate) fn emit_action(ctx: &mut Ctxt, dfa: &Adfa, s: &State, stmts: &mut CodeList) {
    match &s.action {
        Action::Match => {
            if !ctx.opts.eager_skip {
                stmts.push(Code::Skip);
            }
            gen_fill_and_label(ctx, stmts, dfa, s);
            gen_peek(dfa, s, stmts);
        },
        Action::Initial { save } => {
            let backup = *save != NOSAVE;
            let ul1 = s.label.used;

            if ul1 && dfa.accepts.len() > 1 && backup {
                stmts.push(Code::assign(ctx.opts.var_accept.clone(), save.to_string()));
            }
            if ul1 && !ctx.opts.eager_skip {
                stmts.push(Code::Skip);
            }
            stmts.push(Code::NLabel { index: dfa.initial_label.index });
            gen_fill_and_label(ctx, stmts, dfa, s);
            if backup {
                stmts.push(Code::Backup);
            }
            gen_peek(dfa, s, stmts);
            gen_debug(ctx, dfa.initial_label.index, stmts);
        },
        Action::Save { save } => {
            if dfa.accepts.len() > 1 {
                stmts.push(Code::Accept { save: *save as u32 });
            }
            if !ctx.opts.eager_skip {
                stmts.push(Code::Skip);
            }
            stmts.push(Code::Backup);
            gen_fill_and_label(ctx, stmts, dfa, s);
            gen_peek(dfa, s, stmts);
        },
        Action::Move => {},
        Action::Accept => {
            emit_accept(ctx, stmts, dfa, &dfa.accepts);
        },
        Action::Rule { rule } => {
            emit_rule(ctx, stmts, dfa, *rule);
        },
    }
}

/// State label and debug hook; nothing is emitted for unused labels (there
/// is no state number to pass to the hook either).
pub(crate) fn emit_state(ctx: &mut Ctxt, s: &State, stmts: &mut CodeList) {
    if !s.label.used {
        return;
    }

    if ctx.opts.code_model == CodeModel::GotoLabel {
        stmts.push(Code::NLabel { index: s.label.index });
    }
    if !matches!(s.action, Action::Initial { .. }) {
        gen_debug(ctx, s.label.index, stmts);
    }
}
