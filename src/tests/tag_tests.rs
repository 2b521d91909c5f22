//! Tests for tag command emission and tag finalization.

use crate::code::Code;
use crate::codegen::tags::{gen_fintags, gen_settags};
use crate::codegen::Ctxt;
use crate::dfa::{
    Adfa, Label, Rule, SemAct, Tag, TagCmd, TAGVER_BOTTOM, TAGVER_CURSOR,
};
use crate::options::{Api, ApiStyle, Opts};
use crate::syntax::Scratch;
use crate::tests::helpers::render;

fn empty_dfa() -> Adfa {
    Adfa::new("", Vec::new(), Label::new(0, false))
}

#[test]
fn settags_copy() {
    let dfa = {
        let mut d = empty_dfa();
        d.tcpool.insert(vec![TagCmd::copy(1, 2)]);
        d
    };
    let opts = Opts::default();
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let mut stmts = Vec::new();
    gen_settags(&mut ctx, &mut stmts, &dfa, crate::dfa::TcId(1));

    assert_eq!(render(&stmts), "yyt1 = yyt2;\n");
}

#[test]
fn settags_batches_negatives_before_positives() {
    // Adjacent set commands under the default API collapse into two group
    // assignments: negatives to NULL first, then positives to the cursor,
    // preserving source order within each group.
    let dfa = {
        let mut d = empty_dfa();
        d.tcpool.insert(vec![
            TagCmd::set(1, vec![TAGVER_CURSOR]),
            TagCmd::set(2, vec![TAGVER_BOTTOM]),
            TagCmd::set(3, vec![TAGVER_CURSOR]),
        ]);
        d
    };
    let opts = Opts::default();
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let mut stmts = Vec::new();
    gen_settags(&mut ctx, &mut stmts, &dfa, crate::dfa::TcId(1));

    assert_eq!(render(&stmts), "yyt2 = NULL;\nyyt1 = yyt3 = YYCURSOR;\n");
}

#[test]
fn settags_custom_api_one_primitive_per_set() {
    let dfa = {
        let mut d = empty_dfa();
        d.tcpool.insert(vec![
            TagCmd::set(1, vec![TAGVER_CURSOR]),
            TagCmd::set(2, vec![TAGVER_BOTTOM]),
        ]);
        d
    };
    let opts = Opts { api: Api::Custom, api_style: ApiStyle::Functions, ..Opts::default() };
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let mut stmts = Vec::new();
    gen_settags(&mut ctx, &mut stmts, &dfa, crate::dfa::TcId(1));

    assert_eq!(render(&stmts), "YYSTAGP(yyt1);\nYYSTAGN(yyt2);\n");
}

#[test]
fn settags_add_emits_history_in_chronological_order() {
    // History is stored in reverse; emission walks it backwards, so the
    // appends come out oldest-first.
    let dfa = {
        let mut d = empty_dfa();
        d.mtagvers.insert(1);
        d.mtagvers.insert(2);
        d.tcpool
            .insert(vec![TagCmd::add(1, 2, vec![TAGVER_CURSOR, TAGVER_BOTTOM])]);
        d
    };
    let opts = Opts { api: Api::Custom, api_style: ApiStyle::Functions, ..Opts::default() };
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let mut stmts = Vec::new();
    gen_settags(&mut ctx, &mut stmts, &dfa, crate::dfa::TcId(1));

    assert_eq!(
        render(&stmts),
        "yytm1 = yytm2;\nYYMTAGN(yytm1);\nYYMTAGP(yytm1);\n"
    );
}

#[test]
fn settags_oldstyle_context_marker() {
    let dfa = {
        let mut d = empty_dfa();
        d.oldstyle_ctxmarker = true;
        d.tcpool.insert(vec![TagCmd::set(1, vec![TAGVER_CURSOR])]);
        d
    };
    let opts = Opts::default();
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let mut stmts = Vec::new();
    gen_settags(&mut ctx, &mut stmts, &dfa, crate::dfa::TcId(1));

    assert_eq!(render(&stmts), "YYCTXMARKER = YYCURSOR;\n");
}

fn fintag_dfa(tags: Vec<Tag>, finvers: Vec<i32>, ncap: usize) -> Adfa {
    let mut d = empty_dfa();
    let htag = tags.len();
    d.tags = tags;
    d.finvers = finvers;
    d.rules.push(Rule {
        ltag: 0,
        htag,
        ncap,
        semact: SemAct::user(""),
    });
    d
}

#[test]
fn fintags_yynmatch_first_then_var_fixed_trailing() {
    let dfa = fintag_dfa(
        vec![
            Tag::fixed_on("f", 1, 1),
            Tag::var("v"),
            Tag::trailing(),
        ],
        vec![0, 2, 3],
        2,
    );
    let opts = Opts::default();
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let mut stmts = Vec::new();
    gen_fintags(&mut ctx, &mut stmts, &dfa, &dfa.rules[0]);

    // Even though the fixed tag comes first in the tag range, variable tags
    // are finalized first and the trailing cursor update goes last.
    assert_eq!(
        render(&stmts),
        "yynmatch = 2;\nv = yyt2;\nf = yyt2 - 1;\nYYCURSOR = yyt3;\n"
    );
}

#[test]
fn fintags_capture_expands_to_pmatch_range() {
    let dfa = fintag_dfa(vec![Tag::capture(2, 4)], vec![1], 0);
    let opts = Opts::default();
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let mut stmts = Vec::new();
    gen_fintags(&mut ctx, &mut stmts, &dfa, &dfa.rules[0]);

    assert_eq!(render(&stmts), "yypmatch[2] = yypmatch[4] = yyt1;\n");
}

#[test]
fn fintags_fictive_tags_are_skipped() {
    let mut fictive = Tag::var("ghost");
    fictive.fictive = true;
    let dfa = fintag_dfa(vec![fictive], vec![1], 0);
    let opts = Opts::default();
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let mut stmts = Vec::new();
    gen_fintags(&mut ctx, &mut stmts, &dfa, &dfa.rules[0]);

    assert!(stmts.is_empty());
}

#[test]
fn fintags_nested_fixed_default_api_guards_null_base() {
    let mut nested = Tag::fixed_on("f", 0, 2);
    nested.toplevel = false;
    let dfa = fintag_dfa(vec![Tag::var("v"), nested], vec![1, 2], 0);
    let opts = Opts::default();
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let mut stmts = Vec::new();
    gen_fintags(&mut ctx, &mut stmts, &dfa, &dfa.rules[0]);

    assert_eq!(
        render(&stmts),
        "v = yyt1;\nf = yyt1;\nif (yyt1 != NULL) {\n    f -= 2;\n}\n"
    );
}

#[test]
fn fintags_nested_fixed_custom_api_uses_negtag_fixpost() {
    // Two nested fixed tags on the same base: the first nested base seen
    // becomes the sentinel; the shifts are deferred past a single YYSTAGN.
    let mut f1 = Tag::fixed_on("f1", 0, 2);
    f1.toplevel = false;
    let mut f2 = Tag::fixed_on("f2", 0, 3);
    f2.toplevel = false;
    let dfa = fintag_dfa(vec![Tag::var("v"), f1, f2], vec![1, 2, 3], 0);
    let opts = Opts { api: Api::Custom, api_style: ApiStyle::Functions, ..Opts::default() };
    let mut buf = Scratch::new();
    let mut ctx = Ctxt { opts: &opts, buf: &mut buf, fn_common: None };

    let mut stmts = Vec::new();
    gen_fintags(&mut ctx, &mut stmts, &dfa, &dfa.rules[0]);

    let text = render(&stmts);
    // (a) each fixed tag is first assigned its base
    assert!(text.contains("f1 = yyt1;"), "{}", text);
    assert!(text.contains("f2 = yyt1;"), "{}", text);
    // (b) deferred guarded shifts compare against the sentinel
    assert!(text.contains("if (f1 != yyt1) {"), "{}", text);
    assert!(text.contains("YYSHIFTSTAG(f1, -2);"), "{}", text);
    assert!(text.contains("if (f2 != yyt1) {"), "{}", text);
    assert!(text.contains("YYSHIFTSTAG(f2, -3);"), "{}", text);
    // (c) a single sentinel materialization precedes the fixpost bucket
    let stagn = text.matches("YYSTAGN(yyt1);").count();
    assert_eq!(stagn, 1, "{}", text);
    let stagn_pos = text.find("YYSTAGN(yyt1);").unwrap();
    let shift_pos = text.find("YYSHIFTSTAG(f1").unwrap();
    assert!(stagn_pos < shift_pos, "{}", text);
    // (d) the sentinel is the first nested base in iteration order
    let count_code = stmts
        .iter()
        .filter(|c| matches!(c, Code::If { .. }))
        .count();
    assert_eq!(count_code, 2);
}
