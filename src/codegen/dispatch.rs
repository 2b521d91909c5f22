//! Dispatch emission.
//!
//! A state's outgoing dispatch arrives from the optimizer in one of five
//! prepared forms: a switch over character ranges, linear ifs, binary
//! (bisection) ifs, a bitmap test against a pre-analyzed table, or a
//! computed-goto table. This module lowers each form into code, plus the
//! bitmap tables themselves (emitted once per DFA in the block prologue).

use crate::code::{Code, CodeList};
use crate::codegen::transition::gen_goto;
use crate::codegen::Ctxt;
use crate::dfa::{
    Adfa, CharCmp, CodeBitmap, Go, GoBitmap, GoCpGoto, GoCpTable, GoIf, GoIfB, GoIfL, GoKind,
    GoSw, GoSwIf, Jump, State,
};
use crate::options::Opts;
use crate::syntax::{print_bitmap_elem, print_char_or_hex};

/// Name of the bitmap table, suffixed with the condition when present.
pub fn bitmap_name(opts: &Opts, cond: &str) -> String {
    if cond.is_empty() {
        opts.var_bitmaps.clone()
    } else {
        format!("{}_{}", opts.var_bitmaps, cond)
    }
}

/// Comparison of the current character against a literal.
fn gen_cmp(ctx: &mut Ctxt, cond: &CharCmp) -> String {
    ctx.buf.str(&ctx.opts.var_char).str(" ").str(cond.op).str(" ");
    print_char_or_hex(ctx.buf, cond.val, ctx.opts);
    ctx.buf.flush()
}

fn gen_gosw(ctx: &mut Ctxt, dfa: &Adfa, go: &GoSw, from: &State) -> CodeList {
    let expr = ctx.opts.var_char.clone();

    let mut cases = Vec::new();
    let mut defcase = None;
    for (i, c) in go.cases.iter().enumerate() {
        let mut body: CodeList = Vec::new();
        gen_goto(ctx, dfa, &mut body, Some(from), &c.jump);
        if i == go.defcase {
            defcase = Some(Code::case_default(body));
        } else {
            let ranges = c.ranges.iter().map(|&(lb, ub)| (lb as i64, ub as i64)).collect();
            cases.push(Code::case_ranges(ranges, body));
        }
    }
    cases.extend(defcase);

    vec![Code::Switch { expr, cases }]
}

fn gen_goifb(ctx: &mut Ctxt, dfa: &Adfa, go: &GoIfB, from: &State) -> CodeList {
    let if_cond = gen_cmp(ctx, &go.cond);
    let if_then = gen_goif(ctx, dfa, &go.gothen, from);
    let if_else = gen_goif(ctx, dfa, &go.goelse, from);
    vec![Code::if_then_else(&if_cond, if_then, if_else)]
}

fn gen_goifl(ctx: &mut Ctxt, dfa: &Adfa, go: &GoIfL, from: &State) -> CodeList {
    let mut stmts: CodeList = Vec::new();

    if ctx.opts.code_model != crate::options::CodeModel::RecFunc {
        // Generate a sequence of IF statements rather than a single
        // IF/ELSE-IF/ELSE: an unbraced last branch lets the renderer fold
        // YYSKIP with the following YYPEEK, as in `yych = *++YYCURSOR`.
        for (i, b) in go.branches.iter().enumerate() {
            match &b.cond {
                Some(cond) => {
                    let cond = gen_cmp(ctx, cond);
                    let mut then: CodeList = Vec::new();
                    gen_goto(ctx, dfa, &mut then, Some(from), &b.jump);
                    stmts.push(Code::if_then_else(&cond, then, Vec::new()));
                },
                None => {
                    debug_assert!(i + 1 == go.branches.len());
                    gen_goto(ctx, dfa, &mut stmts, Some(from), &b.jump);
                },
            }
        }
    } else {
        // One IF/ELSE-IF/ELSE chain: in functional languages if/else is an
        // expression whose branches must all terminate the function.
        if go.branches.len() == 1 && go.branches[0].cond.is_none() {
            gen_goto(ctx, dfa, &mut stmts, Some(from), &go.branches[0].jump);
        } else {
            let mut branches = Vec::with_capacity(go.branches.len());
            for b in &go.branches {
                let cond = b.cond.as_ref().map(|c| gen_cmp(ctx, c));
                let mut then: CodeList = Vec::new();
                gen_goto(ctx, dfa, &mut then, Some(from), &b.jump);
                branches.push(crate::code::CodeBranch { cond, body: then });
            }
            stmts.push(Code::If { branches });
        }
    }

    stmts
}

fn gen_goif(ctx: &mut Ctxt, dfa: &Adfa, go: &GoIf, from: &State) -> CodeList {
    match go {
        GoIf::Binary(b) => gen_goifb(ctx, dfa, b, from),
        GoIf::Linear(l) => gen_goifl(ctx, dfa, l, from),
    }
}

fn gen_goswif(ctx: &mut Ctxt, dfa: &Adfa, go: &GoSwIf, from: &State) -> CodeList {
    match go {
        GoSwIf::Switch(sw) => gen_gosw(ctx, dfa, sw, from),
        GoSwIf::If(i) => gen_goif(ctx, dfa, i, from),
    }
}

fn gen_gobm(ctx: &mut Ctxt, dfa: &Adfa, go: &GoBitmap, from: &State) -> CodeList {
    let bitmap = dfa.bitmap.as_ref().expect("bitmap dispatch without a bitmap");
    let bm = &bitmap.states[go.bitmap];

    let need_compare = !ctx.opts.implicit_bool_conversion;
    if need_compare {
        ctx.buf.str("(");
    }
    let name = bitmap_name(ctx.opts, &dfa.cond);
    ctx.buf
        .str(&name)
        .str("[")
        .u32(bm.offset.get())
        .str("+")
        .str(&ctx.opts.var_char)
        .str("] & ");
    print_bitmap_elem(ctx.buf, bm.mask.get(), ctx.opts);
    if need_compare {
        ctx.buf.str(") != 0");
    }
    let elif_cond = ctx.buf.flush();

    let mut if_else: CodeList = Vec::new();
    let jump = Jump::to(bm.state);
    gen_goto(ctx, dfa, &mut if_else, Some(from), &jump);

    let mut stmts: CodeList = Vec::new();
    if let Some(hgo) = &go.hgo {
        if need_compare {
            ctx.buf.str("(");
        }
        ctx.buf.str(&ctx.opts.var_char).str(" & ~0xFF");
        if need_compare {
            ctx.buf.str(") != 0");
        }
        let if_cond = ctx.buf.flush();
        let if_then = gen_goswif(ctx, dfa, hgo, from);
        stmts.push(Code::if_then_elif(&if_cond, if_then, &elif_cond, if_else));
    } else {
        stmts.push(Code::if_then_else(&elif_cond, if_else, Vec::new()));
    }
    if let Some(lgo) = &go.lgo {
        stmts.extend(gen_goswif(ctx, dfa, lgo, from));
    }

    stmts
}

fn gen_gocp_table(ctx: &mut Ctxt, dfa: &Adfa, go: &GoCpTable) -> CodeList {
    debug_assert!(go.table.len() == GoCpTable::TABLE_SIZE);

    let mut elems = Vec::with_capacity(GoCpTable::TABLE_SIZE);
    for &to in &go.table {
        let label = dfa.state(to).label.index;
        elems.push(ctx.buf.str("&&").str(&ctx.opts.label_prefix).u32(label).flush());
    }

    vec![Code::Array {
        name: ctx.opts.var_computed_gotos_table.clone(),
        elem_type: ctx.opts.stx_type_yytarget.clone(),
        elems,
        tabulate: true,
    }]
}

fn gen_gocp(ctx: &mut Ctxt, dfa: &Adfa, go: &GoCpGoto, from: &State) -> CodeList {
    let mut if_else = gen_gocp_table(ctx, dfa, &go.table);
    let label = ctx
        .buf
        .str("*")
        .str(&ctx.opts.var_computed_gotos_table)
        .str("[")
        .str(&ctx.opts.var_char)
        .str("]")
        .flush();
    if_else.push(Code::goto(label));

    let mut stmts: CodeList = Vec::new();
    if let Some(hgo) = &go.hgo {
        let cond = ctx.buf.str(&ctx.opts.var_char).str(" & ~0xFF").flush();
        let if_then = gen_goswif(ctx, dfa, hgo, from);
        stmts.push(Code::if_then_else(&cond, if_then, if_else));
    } else {
        stmts.push(Code::Block {
            stmts: if_else,
            kind: crate::code::BlockKind::Wrapped,
        });
    }

    stmts
}

/// Lower a state's dispatch into `stmts`.
pub(crate) fn gen_go(ctx: &mut Ctxt, dfa: &Adfa, go: &Go, from: &State, stmts: &mut CodeList) {
    if !ctx.opts.fill_eof {
        // With the end-of-input rule, hoisted tag operations must go before
        // the fill label (handled in the state prologue). Without it there
        // is no strict requirement, but generating them here lets the
        // renderer fuse skip and peek into one statement.
        crate::codegen::tags::gen_settags(ctx, stmts, dfa, go.tags);
    }

    if go.skip {
        stmts.push(Code::Skip);
    }

    match &go.kind {
        GoKind::SwitchIf(swif) => stmts.extend(gen_goswif(ctx, dfa, swif, from)),
        GoKind::Bitmap(bm) => stmts.extend(gen_gobm(ctx, dfa, bm, from)),
        GoKind::CpGoto(cp) => stmts.extend(gen_gocp(ctx, dfa, cp, from)),
    }
}

/// Emit the bitmap tables for one DFA.
///
/// Tables for up to 8 destination states are overlaid into one row of
/// bitmaps, one bit per character; offsets and masks are assigned to the
/// bitmap cells here, before the dispatch emitters read them.
pub(crate) fn gen_bitmap(
    ctx: &mut Ctxt,
    bitmap: &CodeBitmap,
    dfa: &Adfa,
    cond: &str,
) -> Option<CodeList> {
    if bitmap.states.is_empty() || !bitmap.used {
        return None;
    }

    const WIDTH: usize = 8;
    let nchars = bitmap.nchars as usize;
    let nmaps = bitmap.states.len();
    let nelems = nchars * ((nmaps + WIDTH - 1) / WIDTH);

    let mut elems = vec![String::new(); nelems];
    let mut tmpbuf = vec![0u32; nchars];

    for (bmidx, chunk) in bitmap.states.chunks(WIDTH).enumerate() {
        let offset = (bmidx * nchars) as u32;

        tmpbuf.iter_mut().for_each(|x| *x = 0);
        let mut mask = 0x80u32;
        for b in chunk {
            b.offset.set(offset);
            b.mask.set(mask);

            let mut c = 0usize;
            for span in &dfa.state(b.owner).go.spans {
                let ub = (span.ub as usize).min(nchars);
                if span.to == b.state {
                    for slot in tmpbuf.iter_mut().take(ub).skip(c) {
                        *slot |= mask;
                    }
                }
                c = span.ub as usize;
            }
            mask >>= 1;
        }

        for (i, &val) in tmpbuf.iter().enumerate() {
            print_bitmap_elem(ctx.buf, val, ctx.opts);
            elems[bmidx * nchars + i] = ctx.buf.flush();
        }
    }

    Some(vec![Code::Array {
        name: bitmap_name(ctx.opts, cond),
        elem_type: ctx.opts.stx_type_yybm.clone(),
        elems,
        tabulate: true,
    }])
}
