//! Shared test builders and a small text renderer.
//!
//! The renderer is a C-flavored stand-in for the real rendering backend,
//! just enough to make assertions about emitted code readable. It assumes
//! the default identifier options (`yy` label prefix and friends).

use crate::code::{BlockKind, CaseLabel, Code, CodeList, VarType};
use crate::dfa::{
    Action, Adfa, CharCmp, Go, GoIf, GoIfL, GoIfLBranch, GoKind, GoSwIf, Jump, Label, Span,
    State, NOSAVE, TCID0,
};
use crate::options::{CodeModel, Opts};
use crate::output::{Output, OutputBlock};

/// Options for a given control-flow shape, other switches at defaults.
pub fn opts_for(model: CodeModel) -> Opts {
    Opts { code_model: model, ..Opts::default() }
}

pub fn span(ub: u32, to: usize) -> Span {
    Span { ub, to, tags: TCID0 }
}

/// A linear-if dispatch from (condition, jump) pairs; the raw spans are
/// provided separately (predicates look at them, emission at the branches).
pub fn go_linear(branches: Vec<(Option<CharCmp>, Jump)>, spans: Vec<Span>) -> Go {
    Go {
        spans,
        tags: TCID0,
        skip: false,
        kind: GoKind::SwitchIf(GoSwIf::If(GoIf::Linear(GoIfL {
            branches: branches
                .into_iter()
                .map(|(cond, jump)| GoIfLBranch { cond, jump })
                .collect(),
        }))),
    }
}

/// Dispatch of a terminal state: a single elided self-span, emits nothing.
pub fn go_none(this: usize) -> Go {
    let jump = Jump { elide: true, ..Jump::to(this) };
    go_linear(vec![(None, jump)], vec![span(256, this)])
}

pub fn state(index: u32, used: bool, action: Action, go: Go) -> State {
    State {
        label: Label::new(index, used),
        action,
        go,
        fill: 1,
        fill_label: None,
        fill_state: None,
        fallback: None,
    }
}

pub fn eq(val: u32) -> CharCmp {
    CharCmp { op: "==", val }
}

/// The `/a+/` lexer: initial state, a matching state looping on `'a'`, and
/// a rule state.
pub fn single_rule_dfa() -> Adfa {
    let q0 = state(
        0,
        false,
        Action::Initial { save: NOSAVE },
        go_linear(
            vec![
                (Some(eq(b'a' as u32)), Jump { skip: true, ..Jump::to(1) }),
                (None, Jump::to(2)),
            ],
            vec![span(b'a' as u32, 2), span(b'a' as u32 + 1, 1), span(256, 2)],
        ),
    );
    let q1 = state(
        1,
        true,
        Action::Match,
        go_linear(
            vec![
                (Some(eq(b'a' as u32)), Jump::to(1)),
                (None, Jump::to(2)),
            ],
            vec![span(b'a' as u32, 2), span(b'a' as u32 + 1, 1), span(256, 2)],
        ),
    );
    let q2 = state(2, true, Action::Rule { rule: 0 }, go_none(2));

    let mut dfa = Adfa::new("", vec![q0, q1, q2], Label::new(3, false));
    dfa.rules.push(crate::dfa::Rule {
        ltag: 0,
        htag: 0,
        ncap: 0,
        semact: crate::dfa::SemAct::user("return A;"),
    });
    dfa
}

/// A block holding the given DFAs, with a start label when requested.
pub fn block_with(name: &str, opts: Opts, dfas: Vec<Adfa>) -> OutputBlock {
    let mut b = OutputBlock::new(name, opts);
    b.dfas = dfas;
    b
}

pub fn output_with(blocks: Vec<OutputBlock>) -> Output {
    let total_opts = blocks
        .first()
        .map(|b| b.opts.clone())
        .unwrap_or_default();
    let mut o = Output::new(total_opts);
    o.cblocks = blocks;
    o
}

// ── mini renderer ──────────────────────────────────────────────────────────

/// Render a code list to C-flavored text for assertions.
pub fn render(list: &CodeList) -> String {
    let mut out = String::new();
    render_list(list, 0, &mut out);
    out
}

fn line(out: &mut String, indent: usize, text: &str) {
    for _ in 0..indent {
        out.push_str("    ");
    }
    out.push_str(text);
    out.push('\n');
}

fn render_list(list: &CodeList, indent: usize, out: &mut String) {
    for code in list {
        render_code(code, indent, out);
    }
}

fn render_code(code: &Code, ind: usize, out: &mut String) {
    match code {
        Code::Stmt(t) => line(out, ind, &format!("{};", t)),
        Code::Text(t) => line(out, ind, t),
        Code::TextRaw(t) => line(out, 0, t),
        Code::Newline => out.push('\n'),
        Code::Raw(t) => out.push_str(t),
        Code::Empty | Code::Dfas => {},
        Code::Assign { lhs, rhs, op } => {
            let joined = lhs.join(" = ");
            match op {
                Some(op) => line(out, ind, &format!("{} {}= {};", joined, op, rhs)),
                None => line(out, ind, &format!("{} = {};", joined, rhs)),
            }
        },
        Code::Goto { label } => line(out, ind, &format!("goto {};", label)),
        Code::SLabel { name } => line(out, 0, &format!("{}:", name)),
        Code::NLabel { index } => line(out, 0, &format!("yy{}:", index)),
        Code::If { branches } => {
            for (i, b) in branches.iter().enumerate() {
                match (&b.cond, i) {
                    (Some(c), 0) => line(out, ind, &format!("if ({}) {{", c)),
                    (Some(c), _) => line(out, ind, &format!("}} else if ({}) {{", c)),
                    (None, _) => line(out, ind, "} else {"),
                }
                render_list(&b.body, ind + 1, out);
            }
            line(out, ind, "}");
        },
        Code::Switch { expr, cases } => {
            line(out, ind, &format!("switch ({}) {{", expr));
            for c in cases {
                match &c.label {
                    CaseLabel::Number(n) => line(out, ind, &format!("case {}:", n)),
                    CaseLabel::Ranges(rs) => {
                        for (lb, ub) in rs {
                            line(out, ind, &format!("case {}..{}:", lb, ub));
                        }
                    },
                    CaseLabel::Str(s) => line(out, ind, &format!("case {}:", s)),
                    CaseLabel::Default => line(out, ind, "default:"),
                }
                render_list(&c.body, ind + 1, out);
            }
            line(out, ind, "}");
        },
        Code::Loop { body } => {
            line(out, ind, "for (;;) {");
            render_list(body, ind + 1, out);
            line(out, ind, "}");
        },
        Code::Block { stmts, kind } => match kind {
            BlockKind::Wrapped => {
                line(out, ind, "{");
                render_list(stmts, ind + 1, out);
                line(out, ind, "}");
            },
            BlockKind::Indented => render_list(stmts, ind + 1, out),
            BlockKind::Raw => render_list(stmts, ind, out),
        },
        Code::FnDef { name, ret_type, params, body } => {
            let params = params
                .iter()
                .map(|p| match &p.param_type {
                    Some(t) => format!("{} {}", t, p.name),
                    None => p.name.clone(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            let ret = ret_type.as_deref().unwrap_or("void");
            line(out, ind, &format!("{} {}({}) {{", ret, name, params));
            render_list(body, ind + 1, out);
            line(out, ind, "}");
        },
        Code::TailCall { name, args, returns_value } => {
            if *returns_value {
                line(out, ind, &format!("return {}({});", name, args.join(", ")));
            } else {
                line(out, ind, &format!("{}({}); return;", name, args.join(", ")));
            }
        },
        Code::RecFns { fns } => render_list(fns, ind, out),
        Code::Var { var_type, name, init } => {
            let ty = type_name(*var_type);
            match init {
                Some(i) => line(out, ind, &format!("{} {} = {};", ty, name, i)),
                None => line(out, ind, &format!("{} {};", ty, name)),
            }
        },
        Code::Const { var_type, name, value } => {
            line(out, ind, &format!("const {} {} = {};", type_name(*var_type), name, value));
        },
        Code::Array { name, elem_type, elems, .. } => {
            line(
                out,
                ind,
                &format!("static {} {}[] = {{ {} }};", elem_type, name, elems.join(", ")),
            );
        },
        Code::Enum { type_name, members } => {
            let members = members
                .iter()
                .map(|m| match m.number {
                    Some(n) => format!("{} = {}", m.name, n),
                    None => m.name.clone(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            line(out, ind, &format!("enum {} {{ {} }};", type_name, members));
        },
        Code::LineInfoInput { loc } => {
            line(out, 0, &format!("#line {} \"{}\"", loc.line, loc.file));
        },
        Code::LineInfoOutput => line(out, 0, "#line"),
        Code::Debug { state } => line(out, ind, &format!("YYDEBUG({}, yych);", state)),
        Code::Skip => line(out, ind, "++YYCURSOR;"),
        Code::Peek => line(out, ind, "yych = *YYCURSOR;"),
        Code::Backup => line(out, ind, "YYMARKER = YYCURSOR;"),
        Code::Abort => line(out, ind, "abort();"),
        Code::Accept { save } => line(out, ind, &format!("yyaccept = {};", save)),
        Code::StateGoto(_)
        | Code::STags(_)
        | Code::MTags(_)
        | Code::CondEnum(_)
        | Code::MaxFill(_)
        | Code::MaxNMatch(_) => line(out, ind, "<placeholder>"),
    }
}

fn type_name(t: VarType) -> &'static str {
    match t {
        VarType::Int => "int",
        VarType::Uint => "unsigned int",
        VarType::YyCType => "YYCTYPE",
    }
}

/// Collect every node of a code list (preorder), for structural assertions.
pub fn flatten(list: &CodeList) -> Vec<&Code> {
    let mut acc = Vec::new();
    fn walk<'a>(list: &'a CodeList, acc: &mut Vec<&'a Code>) {
        for code in list {
            acc.push(code);
            match code {
                Code::Block { stmts, .. } => walk(stmts, acc),
                Code::Loop { body } => walk(body, acc),
                Code::RecFns { fns } => walk(fns, acc),
                Code::FnDef { body, .. } => walk(body, acc),
                Code::If { branches } => {
                    for b in branches {
                        walk(&b.body, acc);
                    }
                },
                Code::Switch { cases, .. } => {
                    for c in cases {
                        walk(&c.body, acc);
                    }
                },
                _ => {},
            }
        }
    }
    walk(list, &mut acc);
    acc
}
