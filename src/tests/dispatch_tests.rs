//! Tests for dispatch forms and the accept dispatcher.

use std::cell::Cell;

use crate::code::{CaseLabel, Code};
use crate::codegen::action::emit_accept;
use crate::codegen::dispatch::{gen_bitmap, gen_go};
use crate::codegen::Ctxt;
use crate::dfa::{
    AcceptTrans, Action, Adfa, BmState, CodeBitmap, Go, GoBitmap, GoCase, GoCpGoto, GoCpTable,
    GoIf, GoIfB, GoIfL, GoIfLBranch, GoKind, GoSw, GoSwIf, Jump, Label, Rule, SemAct, TagCmd,
    TcId, TAGVER_CURSOR, TCID0,
};
use crate::options::CodeModel;
use crate::syntax::Scratch;
use crate::tests::helpers::{eq, go_none, opts_for, render, span, state};

fn three_state_dfa() -> Adfa {
    let q0 = state(
        0,
        true,
        Action::Match,
        crate::tests::helpers::go_linear(vec![(None, Jump::to(1))], vec![span(256, 1)]),
    );
    let q1 = state(1, true, Action::Rule { rule: 0 }, go_none(1));
    let q2 = state(2, true, Action::Rule { rule: 0 }, go_none(2));
    let mut dfa = Adfa::new("", vec![q0, q1, q2], Label::new(3, false));
    dfa.rules.push(Rule { ltag: 0, htag: 0, ncap: 0, semact: SemAct::user("") });
    dfa
}

#[test]
fn switch_dispatch_emits_range_cases_and_default() {
    let dfa = three_state_dfa();
    let go = Go {
        spans: vec![span(b'a' as u32, 1), span(256, 2)],
        tags: TCID0,
        skip: false,
        kind: GoKind::SwitchIf(GoSwIf::Switch(GoSw {
            cases: vec![
                GoCase { ranges: vec![(b'a' as u32, b'b' as u32)], jump: Jump::to(1) },
                GoCase { ranges: vec![], jump: Jump::to(2) },
            ],
            defcase: 1,
        })),
    };
    let opts = opts_for(CodeModel::GotoLabel);
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let mut stmts = Vec::new();
    gen_go(&mut ctx, &dfa, &go, dfa.state(0), &mut stmts);

    let text = render(&stmts);
    assert!(text.contains("switch (yych) {"), "{}", text);
    assert!(text.contains("case 97..98:"), "{}", text);
    assert!(text.contains("default:"), "{}", text);
    assert!(text.contains("goto yy1;"), "{}", text);
    assert!(text.contains("goto yy2;"), "{}", text);
}

#[test]
fn linear_if_dispatch_falls_through_on_last_branch() {
    let dfa = three_state_dfa();
    let go = Go {
        spans: vec![span(b'a' as u32, 1), span(256, 2)],
        tags: TCID0,
        skip: false,
        kind: GoKind::SwitchIf(GoSwIf::If(GoIf::Linear(GoIfL {
            branches: vec![
                GoIfLBranch { cond: Some(eq(b'a' as u32)), jump: Jump::to(1) },
                GoIfLBranch { cond: None, jump: Jump { elide: true, ..Jump::to(2) } },
            ],
        }))),
    };
    let opts = opts_for(CodeModel::GotoLabel);
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let mut stmts = Vec::new();
    gen_go(&mut ctx, &dfa, &go, dfa.state(0), &mut stmts);

    assert_eq!(render(&stmts), "if (yych == 'a') {\n    goto yy1;\n}\n");
}

#[test]
fn binary_if_dispatch_bisects() {
    let dfa = three_state_dfa();
    let leaf = |to: usize| {
        GoIf::Linear(GoIfL {
            branches: vec![GoIfLBranch { cond: None, jump: Jump::to(to) }],
        })
    };
    let go = Go {
        spans: vec![span(b'm' as u32, 1), span(256, 2)],
        tags: TCID0,
        skip: false,
        kind: GoKind::SwitchIf(GoSwIf::If(GoIf::Binary(GoIfB {
            cond: crate::dfa::CharCmp { op: "<=", val: b'm' as u32 },
            gothen: Box::new(leaf(1)),
            goelse: Box::new(leaf(2)),
        }))),
    };
    let opts = opts_for(CodeModel::GotoLabel);
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let mut stmts = Vec::new();
    gen_go(&mut ctx, &dfa, &go, dfa.state(0), &mut stmts);

    assert_eq!(
        render(&stmts),
        "if (yych <= 'm') {\n    goto yy1;\n} else {\n    goto yy2;\n}\n"
    );
}

fn bitmap_dfa() -> Adfa {
    let mut dfa = three_state_dfa();
    dfa.bitmap = Some(CodeBitmap {
        states: vec![BmState {
            owner: 0,
            state: 1,
            offset: Cell::new(0),
            mask: Cell::new(0),
        }],
        nchars: 256,
        used: true,
    });
    dfa
}

#[test]
fn bitmap_dispatch_tests_table_and_falls_back() {
    let mut dfa = bitmap_dfa();
    dfa.states[0].go = Go {
        spans: vec![span(b'a' as u32, 1), span(256, 2)],
        tags: TCID0,
        skip: false,
        kind: GoKind::Bitmap(GoBitmap {
            bitmap: 0,
            hgo: None,
            lgo: Some(Box::new(GoSwIf::If(GoIf::Linear(GoIfL {
                branches: vec![GoIfLBranch { cond: None, jump: Jump::to(2) }],
            })))),
        }),
    };
    let opts = opts_for(CodeModel::GotoLabel);
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    // Lay out the tables first (assigns offset and mask), then dispatch.
    let tables = gen_bitmap(&mut ctx, dfa.bitmap.as_ref().unwrap(), &dfa, "").unwrap();
    let table_text = render(&tables);
    assert!(table_text.contains("static unsigned char yybm[] = {"), "{}", table_text);

    let go = dfa.states[0].go.clone();
    let mut stmts = Vec::new();
    gen_go(&mut ctx, &dfa, &go, dfa.state(0), &mut stmts);

    let text = render(&stmts);
    assert!(text.contains("if ((yybm[0+yych] & 128) != 0) {"), "{}", text);
    assert!(text.contains("goto yy1;"), "{}", text);
    assert!(text.contains("goto yy2;"), "{}", text);
}

#[test]
fn bitmap_test_honors_implicit_bool_conversion() {
    let dfa = bitmap_dfa();
    let go = Go {
        spans: vec![span(b'a' as u32, 1), span(256, 2)],
        tags: TCID0,
        skip: false,
        kind: GoKind::Bitmap(GoBitmap { bitmap: 0, hgo: None, lgo: None }),
    };
    let mut opts = opts_for(CodeModel::GotoLabel);
    opts.implicit_bool_conversion = true;
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let _ = gen_bitmap(&mut ctx, dfa.bitmap.as_ref().unwrap(), &dfa, "").unwrap();
    let mut stmts = Vec::new();
    gen_go(&mut ctx, &dfa, &go, dfa.state(0), &mut stmts);

    let text = render(&stmts);
    assert!(text.contains("if (yybm[0+yych] & 128) {"), "{}", text);
    assert!(!text.contains("!= 0"), "{}", text);
}

#[test]
fn computed_goto_dispatch_emits_address_table() {
    let mut dfa = three_state_dfa();
    dfa.states[0].go = Go {
        spans: vec![span(256, 1)],
        tags: TCID0,
        skip: false,
        kind: GoKind::CpGoto(GoCpGoto {
            table: GoCpTable { table: vec![1; GoCpTable::TABLE_SIZE] },
            hgo: None,
        }),
    };
    let opts = opts_for(CodeModel::GotoLabel);
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let go = dfa.states[0].go.clone();
    let mut stmts = Vec::new();
    gen_go(&mut ctx, &dfa, &go, dfa.state(0), &mut stmts);

    let flat = crate::tests::helpers::flatten(&stmts);
    let array = flat.iter().find_map(|c| match c {
        Code::Array { name, elems, .. } if name == "yytarget" => Some(elems),
        _ => None,
    });
    let elems = array.expect("missing computed-goto table");
    assert_eq!(elems.len(), 256);
    assert!(elems.iter().all(|e| e == "&&yy1"));
    assert!(render(&stmts).contains("goto *yytarget[yych];"));
}

// ── accept dispatch ────────────────────────────────────────────────────────

fn accept_dfa(tags: &[TcId]) -> Adfa {
    let mut dfa = three_state_dfa();
    // One more target so up to three accept entries have distinct states.
    dfa.states.push(state(3, true, Action::Rule { rule: 0 }, go_none(3)));
    for (i, &t) in tags.iter().enumerate() {
        dfa.accepts.push(AcceptTrans { state: 1 + (i % 3), tags: t });
    }
    dfa
}

#[test]
fn accept_single_entry_is_unconditional() {
    let dfa = accept_dfa(&[TCID0]);
    let opts = opts_for(CodeModel::GotoLabel);
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let mut stmts = Vec::new();
    emit_accept(&mut ctx, &mut stmts, &dfa, &dfa.accepts);

    assert_eq!(render(&stmts), "YYCURSOR = YYMARKER;\ngoto yy1;\n");
}

#[test]
fn accept_two_entries_use_binary_if() {
    let dfa = accept_dfa(&[TCID0, TCID0]);
    let opts = opts_for(CodeModel::GotoLabel);
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let mut stmts = Vec::new();
    emit_accept(&mut ctx, &mut stmts, &dfa, &dfa.accepts);

    let text = render(&stmts);
    assert!(text.contains("if (yyaccept == 0) {"), "{}", text);
    assert!(!text.contains("switch"), "{}", text);
}

#[test]
fn accept_many_entries_use_switch_with_trailing_default() {
    let dfa = accept_dfa(&[TCID0, TCID0, TCID0]);
    let opts = opts_for(CodeModel::GotoLabel);
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let mut stmts = Vec::new();
    emit_accept(&mut ctx, &mut stmts, &dfa, &dfa.accepts);

    let switch = stmts.iter().find_map(|c| match c {
        Code::Switch { expr, cases } if expr == "yyaccept" => Some(cases),
        _ => None,
    });
    let cases = switch.expect("missing yyaccept switch");
    assert_eq!(cases.len(), 3);
    assert_eq!(cases[0].label, CaseLabel::Number(0));
    assert_eq!(cases[1].label, CaseLabel::Number(1));
    assert_eq!(cases[2].label, CaseLabel::Default);
}

#[test]
fn accept_table_requires_tagless_entries() {
    // With computed gotos enabled and enough entries, a tag-carrying entry
    // still inhibits the address table.
    let mut dfa = accept_dfa(&[]);
    let tagged = dfa.tcpool.insert(vec![TagCmd::set(1, vec![TAGVER_CURSOR])]);
    dfa.accepts = vec![
        AcceptTrans { state: 1, tags: TCID0 },
        AcceptTrans { state: 2, tags: tagged },
        AcceptTrans { state: 3, tags: TCID0 },
    ];
    let mut opts = opts_for(CodeModel::GotoLabel);
    opts.computed_gotos = true;
    opts.computed_gotos_threshold = 2;
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let mut stmts = Vec::new();
    emit_accept(&mut ctx, &mut stmts, &dfa, &dfa.accepts);

    let text = render(&stmts);
    assert!(!text.contains("yytarget"), "{}", text);
    assert!(text.contains("switch (yyaccept) {"), "{}", text);

    // Without tags the table comes back.
    dfa.accepts[1].tags = TCID0;
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };
    let mut stmts = Vec::new();
    emit_accept(&mut ctx, &mut stmts, &dfa, &dfa.accepts);
    let text = render(&stmts);
    assert!(text.contains("yytarget"), "{}", text);
    assert!(text.contains("goto *yytarget[yyaccept];"), "{}", text);
}
