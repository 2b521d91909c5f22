//! Abstract code tree.
//!
//! Codegen produces a tree of `Code` nodes per output block; a rendering
//! backend (out of scope here) turns the tree into target-language text.
//! Nodes are immutable once linked, with one exception: the placeholder
//! kinds (`StateGoto`, `STags`, `MTags`, `CondEnum`, `MaxFill`, `MaxNMatch`,
//! `Dfas`) are rewritten in place by the directive expander after all blocks
//! have been generated. Only leaves are rewritten, never linkage.

use crate::dfa::Loc;

/// A sequence of code nodes, appended in emission order.
pub type CodeList = Vec<Code>;

/// Scalar type of a generated variable or constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Int,
    Uint,
    /// The `YYCTYPE` character type.
    YyCType,
}

/// One branch of an if/elif/else chain. `cond == None` is the else branch
/// (or an unconditional trailing branch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBranch {
    pub cond: Option<String>,
    pub body: CodeList,
}

/// Case label of a switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseLabel {
    Number(i32),
    /// Half-open `[lb, ub)` ranges over case values.
    Ranges(Vec<(i64, i64)>),
    Str(String),
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeCase {
    pub label: CaseLabel,
    pub body: CodeList,
}

/// Parameter of a generated state function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub param_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    pub name: String,
    /// Explicit numeric value; `None` lets the target language number
    /// members sequentially.
    pub number: Option<u32>,
}

/// How a block of statements is framed by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Braces around the statements (own scope).
    Wrapped,
    /// Statements at one extra indent level, no braces.
    Indented,
    /// Statements as-is.
    Raw,
}

/// Arguments of a cross-block directive placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveArgs {
    /// Restrict to named blocks; `None` means all blocks.
    pub block_names: Option<Vec<String>>,
    /// Per-element format template ("" handling is up to the directive).
    pub format: Option<String>,
    pub separator: Option<String>,
}

/// A node of the abstract code tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Code {
    /// Statement text; the renderer appends the statement terminator.
    Stmt(String),
    /// Free text at the current indent level.
    Text(String),
    /// Free text at column zero.
    TextRaw(String),
    Newline,
    /// `lhs[0] = lhs[1] = ... = rhs;` with an optional compound operator
    /// applied to a single lhs (`cursor -= n`).
    Assign {
        lhs: Vec<String>,
        rhs: String,
        op: Option<&'static str>,
    },
    Goto {
        label: String,
    },
    /// Text label (user start label, fill labels, condition labels).
    SLabel {
        name: String,
    },
    /// Numeric state label, printed as `{label_prefix}{index}`.
    NLabel {
        index: u32,
    },
    /// If/elif/else chain.
    If {
        branches: Vec<CodeBranch>,
    },
    Switch {
        expr: String,
        cases: Vec<CodeCase>,
    },
    /// Infinite dispatch loop (labeled per options).
    Loop {
        body: CodeList,
    },
    Block {
        stmts: CodeList,
        kind: BlockKind,
    },
    FnDef {
        name: String,
        ret_type: Option<String>,
        params: Vec<Param>,
        body: CodeList,
    },
    TailCall {
        name: String,
        args: Vec<String>,
        /// The callee returns a value that must be returned by the caller.
        returns_value: bool,
    },
    /// Group of mutually recursive functions (some targets need forward
    /// declarations around the whole group).
    RecFns {
        fns: CodeList,
    },
    Var {
        var_type: VarType,
        name: String,
        init: Option<String>,
    },
    Const {
        var_type: VarType,
        name: String,
        value: String,
    },
    Array {
        name: String,
        elem_type: String,
        elems: Vec<String>,
        /// Lay elements out in aligned rows.
        tabulate: bool,
    },
    Enum {
        type_name: String,
        members: Vec<EnumMember>,
    },
    /// `#line` directive pointing into user source.
    LineInfoInput {
        loc: Loc,
    },
    /// `#line` directive pointing back into the generated file.
    LineInfoOutput,
    /// Debug hook invocation for the default API.
    Debug {
        state: u32,
    },
    Skip,
    Peek,
    Backup,
    Abort,
    /// Store into the accept register: `yyaccept = save`.
    Accept {
        save: u32,
    },
    /// Pre-rendered text produced by directive expansion.
    Raw(String),
    Empty,

    // ── placeholders rewritten by the directive expander ──
    /// The block's DFAs; replaced with the generated program.
    Dfas,
    StateGoto(DirectiveArgs),
    STags(DirectiveArgs),
    MTags(DirectiveArgs),
    CondEnum(DirectiveArgs),
    MaxFill(DirectiveArgs),
    MaxNMatch(DirectiveArgs),
}

impl Code {
    /// `if (cond) { then } else { else }`; an empty else list is omitted.
    pub fn if_then_else(cond: &str, then: CodeList, else_: CodeList) -> Code {
        let mut branches = vec![CodeBranch { cond: Some(cond.to_string()), body: then }];
        if !else_.is_empty() {
            branches.push(CodeBranch { cond: None, body: else_ });
        }
        Code::If { branches }
    }

    /// `if (cond1) { then } else if (cond2) { elif_body }`.
    pub fn if_then_elif(cond1: &str, then: CodeList, cond2: &str, elif_body: CodeList) -> Code {
        Code::If {
            branches: vec![
                CodeBranch { cond: Some(cond1.to_string()), body: then },
                CodeBranch { cond: Some(cond2.to_string()), body: elif_body },
            ],
        }
    }

    pub fn stmt(text: impl Into<String>) -> Code {
        Code::Stmt(text.into())
    }

    pub fn text(text: impl Into<String>) -> Code {
        Code::Text(text.into())
    }

    pub fn assign(lhs: impl Into<String>, rhs: impl Into<String>) -> Code {
        Code::Assign { lhs: vec![lhs.into()], rhs: rhs.into(), op: None }
    }

    pub fn goto(label: impl Into<String>) -> Code {
        Code::Goto { label: label.into() }
    }

    pub fn case_number(number: i32, body: CodeList) -> CodeCase {
        CodeCase { label: CaseLabel::Number(number), body }
    }

    pub fn case_ranges(ranges: Vec<(i64, i64)>, body: CodeList) -> CodeCase {
        CodeCase { label: CaseLabel::Ranges(ranges), body }
    }

    pub fn case_string(name: impl Into<String>, body: CodeList) -> CodeCase {
        CodeCase { label: CaseLabel::Str(name.into()), body }
    }

    pub fn case_default(body: CodeList) -> CodeCase {
        CodeCase { label: CaseLabel::Default, body }
    }
}
