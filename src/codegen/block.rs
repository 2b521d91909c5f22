//! Per-block assembly.
//!
//! Lowers one block's DFAs into the configured control-flow shape:
//!
//! - goto/label: states as labeled code blocks with `goto` transitions;
//! - loop/switch: all DFAs merged into one `yystate` switch inside an
//!   infinite loop, consecutive unused-label states folded into one case;
//! - rec/func: one function per reachable state, a per-condition entry
//!   function, and a top-level entry.
//!
//! Block-local declarations (`yych`, `yyaccept`, condition and bitmap
//! tables, the state dispatch) precede the states.

use crate::code::{Code, CodeCase, CodeList, DirectiveArgs, VarType};
use crate::codegen::action::{emit_action, emit_state};
use crate::codegen::dispatch::{gen_bitmap, gen_go};
use crate::codegen::transition::{fn_name_for_cond, gen_abort, gen_goto_after_fill};
use crate::codegen::Ctxt;
use crate::dfa::{need_yych_arg, Adfa, Label, Loc, StartCond};
use crate::options::CodeModel;
use crate::output::{BlockKind, FnCommon, OutputBlock};
use crate::syntax::{argsubst, cond_enum_elem, Scratch};
use crate::{CodegenError, Warning};

/// Generate one block: replace its `Dfas` placeholder with the program.
pub(crate) fn generate_block(
    block: &mut OutputBlock,
    buf: &mut Scratch,
    warnings: &mut Vec<Warning>,
    cond_type_defined: bool,
    explicit_state_goto: bool,
    state_goto_done: &mut bool,
) -> Result<(), CodegenError> {
    let dfas = std::mem::take(&mut block.dfas);

    let mut program = if dfas.is_empty() {
        None
    } else {
        Some(gen_block_code(
            block,
            &dfas,
            buf,
            warnings,
            cond_type_defined,
            explicit_state_goto,
            state_goto_done,
        )?)
    };

    for code in &mut block.code {
        if matches!(code, Code::Dfas) {
            *code = match program.take() {
                Some(stmts) => Code::Block { stmts, kind: crate::code::BlockKind::Raw },
                None => Code::Empty,
            };
        }
    }

    Ok(())
}

fn gen_block_code(
    block: &mut OutputBlock,
    dfas: &[Adfa],
    buf: &mut Scratch,
    warnings: &mut Vec<Warning>,
    cond_type_defined: bool,
    explicit_state_goto: bool,
    state_goto_done: &mut bool,
) -> Result<CodeList, CodegenError> {
    // All conditions are named, so it suffices to check the first DFA.
    let is_cond_block = !dfas[0].cond.is_empty();

    block.used_yyaccept = dfas.iter().any(|d| {
        d.accepts.len() > 1
            && d.states
                .iter()
                .any(|s| matches!(s.action, crate::dfa::Action::Save { .. }))
    });
    if block.opts.code_model == CodeModel::RecFunc && block.fn_common.is_none() {
        block.fn_common = Some(FnCommon::from_opts(&block.opts));
    }
    let used_yyaccept = block.used_yyaccept;

    let OutputBlock {
        opts,
        fill_goto,
        start_label,
        conds,
        fn_common,
        name: block_name,
        kind,
        loc,
        ..
    } = &mut *block;
    let opts = &*opts;
    let mut ctx = Ctxt { opts, buf, fn_common: fn_common.as_ref() };

    // Record the fill resumption fragment of every state that owns a fill
    // label; the state dispatch switch is built from these.
    if opts.storable_state && opts.fill_enable {
        for dfa in dfas {
            for s in &dfa.states {
                if let Some(idx) = s.fill_label {
                    let frag = gen_goto_after_fill(&mut ctx, dfa, s, None);
                    fill_goto.insert(idx, frag);
                }
            }
        }
    }

    // The following line info must start at zero indent.
    let mut program: CodeList = vec![Code::Newline];
    if opts.line_dirs {
        program.push(Code::LineInfoOutput);
    }

    let mut code: CodeList = Vec::new();
    let mut local_decls = false;

    if !opts.storable_state && opts.char_emit && opts.code_model != CodeModel::RecFunc {
        local_decls = true;
        code.push(Code::Var {
            var_type: VarType::YyCType,
            name: opts.var_char.clone(),
            init: None,
        });
    }
    if !opts.storable_state && used_yyaccept && opts.code_model != CodeModel::RecFunc {
        local_decls = true;
        code.push(Code::Var {
            var_type: VarType::Uint,
            name: opts.var_accept.clone(),
            init: Some("0".to_string()),
        });
    }

    match opts.code_model {
        CodeModel::GotoLabel => {
            if opts.computed_gotos && is_cond_block {
                local_decls = true;
                code.extend(gen_cond_table(&mut ctx, conds));
            }
            if opts.bitmaps {
                for dfa in dfas {
                    if let Some(bm) = &dfa.bitmap {
                        if let Some(tables) = gen_bitmap(&mut ctx, bm, dfa, &dfa.cond) {
                            local_decls = true;
                            code.extend(tables);
                        }
                    }
                }
            }
            if opts.storable_state {
                gen_state_goto_implicit(
                    &mut code,
                    *kind,
                    block_name,
                    explicit_state_goto,
                    state_goto_done,
                );
            }
            if !opts.label_start.is_empty() {
                // User-defined start label for user code to jump to.
                code.push(Code::SLabel { name: opts.label_start.clone() });
            }
            if let Some(l) = start_label {
                // Numeric start label used by the generated code (the
                // user-defined one may not exist).
                code.push(Code::NLabel { index: l.index });
            }
            if is_cond_block {
                code.extend(gen_cond_goto(&mut ctx, conds, warnings, cond_type_defined, loc));
            }
            for dfa in dfas {
                if is_cond_block {
                    if !opts.cond_div.is_empty() {
                        let div =
                            argsubst(&opts.cond_div, &opts.cond_div_param, "cond", true, &dfa.cond);
                        code.push(Code::TextRaw(div));
                    }
                    code.push(Code::SLabel {
                        name: format!("{}{}", opts.cond_label_prefix, dfa.cond),
                    });
                }
                gen_dfa_as_blocks_with_labels(&mut ctx, dfa, &mut code);
            }
        },
        CodeModel::LoopSwitch => {
            // All DFA states become cases of the `yystate` switch; DFAs for
            // different conditions are merged into the same switch.
            local_decls = true;
            code.push(gen_yystate_def(&mut ctx));

            let mut cases: Vec<CodeCase> = Vec::new();
            for dfa in dfas {
                gen_dfa_as_switch_cases(&mut ctx, dfa, &mut cases);
            }
            wrap_dfas_in_loop_switch(&mut ctx, fill_goto, &mut code, cases);
        },
        CodeModel::RecFunc => {
            // DFA states are co-recursive functions that tail-call each
            // other or themselves.
            let mut funcs: CodeList = Vec::new();
            for dfa in dfas {
                gen_dfa_as_recursive_functions(&mut ctx, dfa, &mut funcs);
            }
            gen_start_function(
                &mut ctx,
                &dfas[0],
                start_label.as_ref(),
                conds,
                *kind,
                block_name,
                explicit_state_goto,
                state_goto_done,
                &mut funcs,
            );
            code.push(Code::RecFns { fns: funcs });
        },
    }

    // Wrap the block in braces when it holds local declarations, so they get
    // their own scope.
    debug_assert!(!local_decls || opts.code_model != CodeModel::RecFunc);
    let kind = if local_decls && opts.wrap_blocks_in_braces {
        crate::code::BlockKind::Wrapped
    } else if opts.indent_top > 0 || opts.code_model == CodeModel::RecFunc {
        crate::code::BlockKind::Raw
    } else {
        crate::code::BlockKind::Indented
    };
    program.push(Code::Block { stmts: code, kind });

    Ok(program)
}

/// States as labeled blocks of code with `goto` transitions between them.
fn gen_dfa_as_blocks_with_labels(ctx: &mut Ctxt, dfa: &Adfa, stmts: &mut CodeList) {
    debug_assert!(ctx.opts.code_model == CodeModel::GotoLabel);

    // When the DFA has transitions into the initial state and eager skip is
    // off, the initial state carries a YYSKIP that the first entry must
    // bypass.
    if dfa.initial_label.used {
        let label = ctx
            .buf
            .str(&ctx.opts.label_prefix)
            .u32(dfa.initial_label.index)
            .flush();
        stmts.push(Code::goto(label));
    }

    for s in &dfa.states {
        emit_state(ctx, s, stmts);
        emit_action(ctx, dfa, s, stmts);
        gen_go(ctx, dfa, &s.go, s, stmts);
    }
}

/// States as cases of the `yystate` switch.
fn gen_dfa_as_switch_cases(ctx: &mut Ctxt, dfa: &Adfa, cases: &mut Vec<CodeCase>) {
    debug_assert!(ctx.opts.code_model != CodeModel::GotoLabel);

    let mut i = 0;
    while i < dfa.states.len() {
        let s = &dfa.states[i];
        let label = s.label.index;

        let mut body: CodeList = Vec::new();
        emit_state(ctx, s, &mut body);
        emit_action(ctx, dfa, s, &mut body);
        gen_go(ctx, dfa, &s.go, s, &mut body);
        i += 1;

        // As long as the following state has no incoming transitions (its
        // label is unused), generate it as a continuation of the current
        // case. This avoids looping through the `yystate` switch only to
        // return to the next case.
        while i < dfa.states.len() && !dfa.states[i].label.used {
            let s = &dfa.states[i];
            emit_state(ctx, s, &mut body);
            emit_action(ctx, dfa, s, &mut body);
            gen_go(ctx, dfa, &s.go, s, &mut body);
            i += 1;
        }

        cases.push(Code::case_number(label as i32, body));
    }
}

/// Storable-state resumption cases of the `yystate` switch, plus the merged
/// `-1 | 0` case for the initial dispatch.
fn gen_storable_state_cases(
    ctx: &Ctxt,
    fill_goto: &std::collections::BTreeMap<u32, CodeList>,
    cases: &mut Vec<CodeCase>,
) {
    if !ctx.opts.storable_state || ctx.opts.code_model == CodeModel::GotoLabel {
        return;
    }

    for (idx, frag) in fill_goto {
        cases.push(Code::case_number(*idx as i32, frag.clone()));
    }

    // Replace the first case 0 with a range case covering both `yystate =
    // -1` (fresh start) and `yystate = 0`.
    let first = cases.first_mut().expect("loop/switch block with no states");
    debug_assert!(first.label == crate::code::CaseLabel::Number(0));
    first.label = crate::code::CaseLabel::Ranges(vec![(-1, 1)]);
}

/// Wrap the merged state cases into `loop { switch (yystate) { ... } }`.
fn wrap_dfas_in_loop_switch(
    ctx: &mut Ctxt,
    fill_goto: &std::collections::BTreeMap<u32, CodeList>,
    stmts: &mut CodeList,
    mut cases: Vec<CodeCase>,
) {
    debug_assert!(ctx.opts.code_model != CodeModel::GotoLabel);

    gen_storable_state_cases(ctx, fill_goto, &mut cases);
    if ctx.opts.state_abort {
        cases.push(Code::case_default(gen_abort()));
    }
    let switch = Code::Switch { expr: ctx.opts.var_state.clone(), cases };
    stmts.push(Code::Loop { body: vec![switch] });
}

/// `yystate` declaration: type and initializer depend on what the variable
/// multiplexes.
fn gen_yystate_def(ctx: &mut Ctxt) -> Code {
    debug_assert!(ctx.opts.code_model == CodeModel::LoopSwitch);

    let opts = ctx.opts;
    if opts.storable_state {
        // With storable state `yystate` is initialized to YYGETSTATE. There
        // is a -1 case, so the type must be signed. When conditions are also
        // used, YYGETSTATE takes priority over YYGETCONDITION because the
        // lexer may be re-entered after a YYFILL invocation.
        Code::Var {
            var_type: VarType::Int,
            name: opts.var_state.clone(),
            init: Some(opts.state_get_expr()),
        }
    } else if opts.start_conditions {
        Code::Var {
            var_type: VarType::Uint,
            name: opts.var_state.clone(),
            init: Some(opts.cond_get_expr()),
        }
    } else {
        // The start DFA state is always case 0.
        Code::Var {
            var_type: VarType::Uint,
            name: opts.var_state.clone(),
            init: Some("0".to_string()),
        }
    }
}

/// States as co-recursive functions. A state with unused-label followers
/// absorbs them into its body, like the case merging in loop/switch mode.
fn gen_dfa_as_recursive_functions(ctx: &mut Ctxt, dfa: &Adfa, code: &mut CodeList) {
    let fn_common = ctx.fn_common.expect("rec/func mode without fn_common");
    let ret_type = fn_common.ret_type.clone();

    let mut i = 0;
    while i < dfa.states.len() {
        let s = &dfa.states[i];
        let name = ctx.buf.str(&ctx.opts.label_prefix).u32(s.label.index).flush();
        let params = if need_yych_arg(dfa, s) {
            fn_common.params_yych.clone()
        } else {
            fn_common.params.clone()
        };

        let mut body: CodeList = Vec::new();
        loop {
            let s = &dfa.states[i];
            emit_state(ctx, s, &mut body);
            emit_action(ctx, dfa, s, &mut body);
            gen_go(ctx, dfa, &s.go, s, &mut body);
            i += 1;
            if i >= dfa.states.len() || dfa.states[i].label.used {
                break;
            }
        }

        code.push(Code::FnDef { name, ret_type: ret_type.clone(), params, body });
    }

    if !dfa.cond.is_empty() {
        // Per-condition entry function tail-calling the condition's start
        // state.
        let fn_common = ctx.fn_common.expect("rec/func mode without fn_common");
        let args = fn_common.args.clone();
        let returns_value = fn_common.ret_type.is_some();
        let params = fn_common.params.clone();
        let name = fn_name_for_cond(ctx, &dfa.cond);

        let head_label = dfa.states[0].label.index;
        let f0 = ctx.buf.str(&ctx.opts.label_prefix).u32(head_label).flush();
        let body = vec![Code::TailCall { name: f0, args, returns_value }];

        code.push(Code::FnDef { name, ret_type: ret_type.clone(), params, body });
    }
}

/// Entry function dispatching on the current condition (rec/func mode).
fn gen_cond_func(ctx: &mut Ctxt, conds: &[StartCond], start_label: &Label) -> Code {
    debug_assert!(ctx.opts.code_model == CodeModel::RecFunc);

    let fn_common = ctx.fn_common.expect("rec/func mode without fn_common");
    let args = fn_common.args.clone();
    let returns_value = fn_common.ret_type.is_some();
    let params = fn_common.params.clone();
    let ret_type = fn_common.ret_type.clone();

    let mut cases = Vec::with_capacity(conds.len() + 1);
    for cond in conds {
        let name = fn_name_for_cond(ctx, &cond.name);
        let body = vec![Code::TailCall { name, args: args.clone(), returns_value }];
        cases.push(Code::case_string(cond_enum_elem(ctx.opts, &cond.name), body));
    }
    if ctx.opts.cond_abort {
        cases.push(Code::case_default(gen_abort()));
    }
    let body = vec![Code::Switch { expr: ctx.opts.cond_get_expr(), cases }];

    let name = ctx.buf.str(&ctx.opts.label_prefix).u32(start_label.index).flush();
    Code::FnDef { name, ret_type, params, body }
}

/// Top-level entry in rec/func mode: the condition dispatch function, the
/// state dispatch (storable state), or a direct tail call to the start.
#[allow(clippy::too_many_arguments)]
fn gen_start_function(
    ctx: &mut Ctxt,
    dfa: &Adfa,
    start_label: Option<&Label>,
    conds: &[StartCond],
    kind: BlockKind,
    block_name: &str,
    explicit_state_goto: bool,
    state_goto_done: &mut bool,
    code: &mut CodeList,
) {
    let is_cond_block = !dfa.cond.is_empty();

    if is_cond_block {
        let start = start_label.expect("condition block without a start label");
        let f = gen_cond_func(ctx, conds, start);
        code.push(f);
    }

    if ctx.opts.storable_state {
        gen_state_goto_implicit(code, kind, block_name, explicit_state_goto, state_goto_done);
    } else {
        let fn_common = ctx.fn_common.expect("rec/func mode without fn_common");
        let index = if is_cond_block {
            start_label.expect("condition block without a start label").index
        } else {
            dfa.states[0].label.index
        };
        let target = ctx.buf.str(&ctx.opts.label_prefix).u32(index).flush();
        let body = vec![Code::TailCall {
            name: target,
            args: fn_common.args.clone(),
            returns_value: fn_common.ret_type.is_some(),
        }];
        code.push(Code::FnDef {
            name: fn_common.name.clone(),
            ret_type: fn_common.ret_type.clone(),
            params: fn_common.params.clone(),
            body,
        });
    }
}

/// Leave a state-dispatch placeholder for the directive expander: a local
/// one for a `use` block (linked by the autogenerated block name), a global
/// one the first time an ordinary block needs it, nothing when an explicit
/// directive exists elsewhere.
fn gen_state_goto_implicit(
    code: &mut CodeList,
    kind: BlockKind,
    block_name: &str,
    explicit_state_goto: bool,
    state_goto_done: &mut bool,
) {
    let block_names = if kind == BlockKind::Use {
        Some(vec![block_name.to_string()])
    } else if !explicit_state_goto && !*state_goto_done {
        *state_goto_done = true;
        None
    } else {
        return;
    };
    code.push(Code::StateGoto(DirectiveArgs {
        block_names,
        format: None,
        separator: None,
    }));
}

/// Condition dispatch at the start of a goto/label block.
fn gen_cond_goto(
    ctx: &mut Ctxt,
    conds: &[StartCond],
    warnings: &mut Vec<Warning>,
    cond_type_defined: bool,
    loc: &Loc,
) -> CodeList {
    debug_assert!(ctx.opts.code_model == CodeModel::GotoLabel);

    let ncond = conds.len();
    let mut warn_cond_ord = !cond_type_defined;
    let mut stmts: CodeList = Vec::new();

    if ctx.opts.computed_gotos {
        let label = ctx
            .buf
            .str("*")
            .str(&ctx.opts.var_cond_table)
            .str("[")
            .str(&ctx.opts.cond_get_expr())
            .str("]")
            .flush();
        stmts.push(Code::goto(label));
    } else if ctx.opts.nested_ifs {
        warn_cond_ord &= ncond > 1;
        stmts.extend(gen_cond_goto_binary(ctx, conds, 0, ncond - 1));
    } else {
        warn_cond_ord = false;

        let mut cases = Vec::with_capacity(ncond + 1);
        for cond in conds {
            let label = format!("{}{}", ctx.opts.cond_label_prefix, cond.name);
            let body = vec![Code::goto(label)];
            cases.push(Code::case_string(cond_enum_elem(ctx.opts, &cond.name), body));
        }
        if ctx.opts.cond_abort {
            cases.push(Code::case_default(gen_abort()));
        }
        stmts.push(Code::Switch { expr: ctx.opts.cond_get_expr(), cases });
    }

    // Dispatch that hardcodes condition numbers is order-sensitive; warn
    // unless an external header pins the enum down.
    warn_cond_ord &= ctx.opts.header_file.is_empty();
    if warn_cond_ord {
        warnings.push(Warning::ConditionOrder { loc: loc.clone() });
    }

    stmts
}

fn gen_cond_goto_binary(ctx: &mut Ctxt, conds: &[StartCond], lower: usize, upper: usize) -> CodeList {
    let mut stmts: CodeList = Vec::new();
    if lower == upper {
        let label = format!("{}{}", ctx.opts.cond_label_prefix, conds[lower].name);
        stmts.push(Code::goto(label));
    } else {
        let middle = lower + (upper - lower + 1) / 2;
        let if_then = gen_cond_goto_binary(ctx, conds, lower, middle - 1);
        let if_else = gen_cond_goto_binary(ctx, conds, middle, upper);
        let cond = ctx
            .buf
            .str(&ctx.opts.cond_get_expr())
            .str(" < ")
            .u64(middle as u64)
            .flush();
        stmts.push(Code::if_then_else(&cond, if_then, if_else));
    }
    stmts
}

/// Condition table for computed-goto dispatch.
fn gen_cond_table(ctx: &mut Ctxt, conds: &[StartCond]) -> CodeList {
    let mut elems = Vec::with_capacity(conds.len());
    for cond in conds {
        elems.push(
            ctx.buf
                .str("&&")
                .str(&ctx.opts.cond_label_prefix)
                .str(&cond.name)
                .flush(),
        );
    }
    vec![Code::Array {
        name: ctx.opts.var_cond_table.clone(),
        elem_type: ctx.opts.stx_type_yytarget.clone(),
        elems,
        tabulate: false,
    }]
}
