//! Input DFA model.
//!
//! The annotated DFA consumed by codegen: states with actions, prepared
//! dispatch shapes, tag commands, accept tables, rules and semantic actions.
//! Everything here is produced by the upstream construction/optimization
//! passes; codegen only reads it (bitmap cells are the one exception, their
//! layout is assigned when the tables are emitted).
//!
//! References between states are plain indices into the state vector; tag
//! command lists are indices into a per-DFA command pool. This keeps the
//! cyclic transition graph representable without back-pointers.

use std::cell::Cell;
use std::collections::BTreeSet;

/// Index of a state in `Adfa::states`.
pub type StateId = usize;

/// Tag version number. Real versions are positive; the reserved values below
/// mark history entries and terminators.
pub type TagVer = i32;

/// History terminator (no entry).
pub const TAGVER_ZERO: TagVer = 0;
/// Negative (null) history entry: the tag did not match.
pub const TAGVER_BOTTOM: TagVer = -1;
/// Positive history entry: the tag matched at the current position.
pub const TAGVER_CURSOR: TagVer = -2;

/// `save` value of initial/save actions that do not back up an accept index.
pub const NOSAVE: usize = usize::MAX;

/// Base marker for fixed tags measured from the cursor.
pub const RIGHTMOST: usize = usize::MAX;

/// Source location of a semantic action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loc {
    pub file: String,
    pub line: u32,
}

/// A state label: stable numeric index plus a use flag computed by the
/// upstream label analysis (a label is used iff some transition targets it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub index: u32,
    pub used: bool,
}

impl Label {
    pub fn new(index: u32, used: bool) -> Self {
        Label { index, used }
    }
}

// ── tag commands ───────────────────────────────────────────────────────────

/// Identifier of a tag command list in the pool. `TCID0` is the empty list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcId(pub u32);

pub const TCID0: TcId = TcId(0);

/// One tag command. Classified by shape:
/// - *copy*: no history, `lhs = rhs`.
/// - *set*: history and no rhs, write cursor or null into `lhs`.
/// - *add*: history and rhs, optional copy, then append history.
///
/// History is stored in reverse and iterated backwards at emission, so the
/// generated appends happen in chronological order. Entries are
/// `TAGVER_BOTTOM` (null) or `TAGVER_CURSOR` (current position).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCmd {
    pub lhs: TagVer,
    pub rhs: TagVer,
    pub history: Vec<TagVer>,
}

impl TagCmd {
    pub fn copy(lhs: TagVer, rhs: TagVer) -> Self {
        TagCmd { lhs, rhs, history: Vec::new() }
    }

    pub fn set(lhs: TagVer, history: Vec<TagVer>) -> Self {
        TagCmd { lhs, rhs: TAGVER_ZERO, history }
    }

    pub fn add(lhs: TagVer, rhs: TagVer, history: Vec<TagVer>) -> Self {
        TagCmd { lhs, rhs, history }
    }

    pub fn is_copy(&self) -> bool {
        self.history.is_empty()
    }

    pub fn is_set(&self) -> bool {
        !self.history.is_empty() && self.rhs == TAGVER_ZERO
    }

    pub fn is_add(&self) -> bool {
        !self.history.is_empty() && self.rhs != TAGVER_ZERO
    }
}

/// Pool of tag command lists. Index 0 is always the empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TcPool {
    lists: Vec<Vec<TagCmd>>,
}

impl TcPool {
    pub fn new() -> Self {
        TcPool { lists: vec![Vec::new()] }
    }

    pub fn insert(&mut self, cmds: Vec<TagCmd>) -> TcId {
        let id = TcId(self.lists.len() as u32);
        self.lists.push(cmds);
        id
    }

    pub fn get(&self, id: TcId) -> &[TagCmd] {
        &self.lists[id.0 as usize]
    }
}

// ── tags and rules ─────────────────────────────────────────────────────────

/// A submatch tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// User-visible name (empty for captures and the trailing-context tag).
    pub name: String,
    /// Fixed tag: equals `base - dist` instead of having its own variable.
    pub fixed: bool,
    /// Base of a fixed tag: another tag index, or `RIGHTMOST` for the cursor.
    pub base: usize,
    /// Distance of a fixed tag from its base.
    pub dist: u32,
    /// Multi-valued tag (keeps a history).
    pub history: bool,
    /// Capture tag: expands to a range of `yypmatch` slots.
    pub capture: bool,
    /// No nested base shift applies.
    pub toplevel: bool,
    /// Disambiguation-only tag, skipped in finalization.
    pub fictive: bool,
    /// Trailing-context tag: updates the cursor, not a named variable.
    pub trailing: bool,
    /// Capture subscript range `[lsub, hsub]`, stepped by 2.
    pub lsub: usize,
    pub hsub: usize,
}

impl Tag {
    /// A named variable tag.
    pub fn var(name: &str) -> Self {
        Tag {
            name: name.to_string(),
            fixed: false,
            base: RIGHTMOST,
            dist: 0,
            history: false,
            capture: false,
            toplevel: true,
            fictive: false,
            trailing: false,
            lsub: 0,
            hsub: 0,
        }
    }

    /// A fixed tag at `base - dist`.
    pub fn fixed_on(name: &str, base: usize, dist: u32) -> Self {
        Tag { fixed: true, base, dist, ..Tag::var(name) }
    }

    /// The trailing-context tag.
    pub fn trailing() -> Self {
        Tag { trailing: true, ..Tag::var("") }
    }

    /// A capture tag covering `yypmatch` slots `lsub..=hsub`.
    pub fn capture(lsub: usize, hsub: usize) -> Self {
        Tag { capture: true, lsub, hsub, ..Tag::var("") }
    }
}

/// Semantic action attached to a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemAct {
    pub text: String,
    /// Condition to switch to (`=>`/`:=>` rules); `None` keeps the current.
    pub cond: Option<String>,
    /// Autogenerated `:=>` action: a bare transition to the next condition.
    pub autogen: bool,
    pub loc: Loc,
}

impl SemAct {
    pub fn user(text: &str) -> Self {
        SemAct {
            text: text.to_string(),
            cond: None,
            autogen: false,
            loc: Loc { file: String::new(), line: 0 },
        }
    }
}

/// A lexer rule: its tag range, capture count and semantic action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub ltag: usize,
    pub htag: usize,
    pub ncap: usize,
    pub semact: SemAct,
}

/// One entry of the accept table, indexed by the `yyaccept` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptTrans {
    pub state: StateId,
    pub tags: TcId,
}

/// A named start condition with a globally unique number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCond {
    pub name: String,
    pub number: u32,
}

// ── dispatch shapes ────────────────────────────────────────────────────────

/// One transition of the generated code: destination plus the operations
/// performed on the way (tags, skip, fill envelope, elision).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jump {
    pub to: StateId,
    pub tags: TcId,
    pub skip: bool,
    /// Wrap the transition in an end-of-input check.
    pub eof: bool,
    /// Control flow falls through; no jump statement is emitted.
    pub elide: bool,
}

impl Jump {
    /// A plain jump with no tags, skip, fill or elision.
    pub fn to(to: StateId) -> Self {
        Jump { to, tags: TCID0, skip: false, eof: false, elide: false }
    }
}

/// Comparison against the current character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharCmp {
    /// Comparison operator text (`"<="`, `"=="`, ...).
    pub op: &'static str,
    pub val: u32,
}

/// One case of a dispatch switch: character ranges sharing a jump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoCase {
    /// Half-open `[lb, ub)` character ranges.
    pub ranges: Vec<(u32, u32)>,
    pub jump: Jump,
}

/// Switch dispatch over `yych`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoSw {
    pub cases: Vec<GoCase>,
    /// Index of the default case in `cases`.
    pub defcase: usize,
}

/// Recursive bisection dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoIfB {
    pub cond: CharCmp,
    pub gothen: Box<GoIf>,
    pub goelse: Box<GoIf>,
}

/// One branch of a linear-if dispatch; the last branch has no condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoIfLBranch {
    pub cond: Option<CharCmp>,
    pub jump: Jump,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoIfL {
    pub branches: Vec<GoIfLBranch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoIf {
    Binary(GoIfB),
    Linear(GoIfL),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoSwIf {
    Switch(GoSw),
    If(GoIf),
}

/// Bitmap dispatch: a bit test against a pre-analyzed table, with optional
/// high-byte and leftover dispatches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoBitmap {
    /// Index of this state's cell in `CodeBitmap::states`.
    pub bitmap: usize,
    /// Dispatch for characters above `0xFF` (`yych & ~0xFF`).
    pub hgo: Option<Box<GoSwIf>>,
    /// Dispatch for low characters not covered by the bitmap.
    pub lgo: Option<Box<GoSwIf>>,
}

/// Computed-goto dispatch: a 256-entry table of label addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoCpTable {
    pub table: Vec<StateId>,
}

impl GoCpTable {
    pub const TABLE_SIZE: usize = 256;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoCpGoto {
    pub table: GoCpTable,
    pub hgo: Option<Box<GoSwIf>>,
}

/// Dispatch shape selected by the optimizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoKind {
    SwitchIf(GoSwIf),
    Bitmap(GoBitmap),
    CpGoto(GoCpGoto),
}

/// A state's outgoing dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Go {
    /// Raw spans: half-open character ranges with destinations. Every state
    /// has at least one span.
    pub spans: Vec<Span>,
    /// Tag commands hoisted out of individual transitions (they coincide on
    /// all of them, the fallback included).
    pub tags: TcId,
    /// Cursor advance hoisted out of individual transitions.
    pub skip: bool,
    pub kind: GoKind,
}

/// Half-open character range `[prev.ub, ub)` with a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub ub: u32,
    pub to: StateId,
    pub tags: TcId,
}

// ── states ─────────────────────────────────────────────────────────────────

/// What a state does before dispatching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Ordinary matching state: skip, fill, peek.
    Match,
    /// Entry state of the DFA.
    Initial {
        /// Accept index to back up, or `NOSAVE`.
        save: usize,
    },
    /// State that backs up an accepted rule before going on.
    Save { save: usize },
    /// Tunneling artifact: relies on the previous `yych`, emits nothing.
    Move,
    /// Dispatch on the backed-up accept index (reads `Adfa::accepts`).
    Accept,
    /// Terminal state of a rule.
    Rule { rule: usize },
}

/// Fallback transition taken when YYFILL fails under the end-of-input rule,
/// precomputed by the upstream fallback pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fallback {
    pub to: StateId,
    pub tags: TcId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub label: Label,
    pub action: Action,
    pub go: Go,
    /// Bytes of lookahead this state needs from YYFILL.
    pub fill: usize,
    /// Resumption point index, for states that own a fill label.
    pub fill_label: Option<u32>,
    /// State owning this state's YYFILL invocation.
    pub fill_state: Option<StateId>,
    pub fallback: Option<Fallback>,
}

// ── bitmaps ────────────────────────────────────────────────────────────────

/// One bitmap cell: a destination state reachable from `owner` that the
/// bitmap test covers. Offset and mask are assigned during table emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BmState {
    /// State whose dispatch uses this cell.
    pub owner: StateId,
    /// Destination state the bit test jumps to.
    pub state: StateId,
    pub offset: Cell<u32>,
    pub mask: Cell<u32>,
}

/// Pre-analyzed bitmap covering up to 8 overlaid states per table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBitmap {
    pub states: Vec<BmState>,
    /// Width of one table row (alphabet size covered by the bitmap).
    pub nchars: u32,
    pub used: bool,
}

// ── the DFA ────────────────────────────────────────────────────────────────

/// An annotated DFA for one condition (or the whole block when conditions
/// are not used).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adfa {
    /// Condition name; empty for unconditioned blocks.
    pub cond: String,
    /// States in emission order; the first one is the head.
    pub states: Vec<State>,
    pub initial_label: Label,
    pub tags: Vec<Tag>,
    /// Final tag version per tag index.
    pub finvers: Vec<TagVer>,
    /// Versions that belong to multi-valued tags.
    pub mtagvers: BTreeSet<TagVer>,
    pub tcpool: TcPool,
    pub rules: Vec<Rule>,
    /// Accept table indexed by the `yyaccept` register.
    pub accepts: Vec<AcceptTrans>,
    /// Single-tag lexer predating tag variables: use the context marker.
    pub oldstyle_ctxmarker: bool,
    /// Per-condition setup code emitted before user actions.
    pub setup: String,
    pub bitmap: Option<CodeBitmap>,
}

impl Adfa {
    /// A bare DFA with no tags, rules or accepts.
    pub fn new(cond: &str, states: Vec<State>, initial_label: Label) -> Self {
        Adfa {
            cond: cond.to_string(),
            states,
            initial_label,
            tags: Vec::new(),
            finvers: Vec::new(),
            mtagvers: BTreeSet::new(),
            tcpool: TcPool::new(),
            rules: Vec::new(),
            accepts: Vec::new(),
            oldstyle_ctxmarker: false,
            setup: String::new(),
            bitmap: None,
        }
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id]
    }

    /// Add an accept entry, reusing an existing identical one.
    pub fn push_accept(&mut self, accept: AcceptTrans) -> usize {
        if let Some(i) = self.accepts.iter().position(|a| *a == accept) {
            i
        } else {
            self.accepts.push(accept);
            self.accepts.len() - 1
        }
    }
}

/// An `end` state has no outgoing transitions on symbols: a single span into
/// a rule or accept state. Usually a final state, but it can also be an
/// initial non-accepting state (rule `[]`).
pub fn end_state(dfa: &Adfa, s: &State) -> bool {
    debug_assert!(!s.go.spans.is_empty());
    if s.go.spans.len() != 1 {
        return false;
    }
    matches!(
        dfa.state(s.go.spans[0].to).action,
        Action::Rule { .. } | Action::Accept
    )
}

/// YYPEEK is omitted when `yych` would be overwritten before use: in a move
/// state (which relies on the previous `yych`), or when a single transition
/// goes to a non-move state (no match on `yych` is needed). Such states come
/// from the tunneling optimization.
pub fn omit_peek(dfa: &Adfa, s: &State) -> bool {
    s.action == Action::Move
        || (s.go.spans.len() == 1 && dfa.state(s.go.spans[0].to).action != Action::Move)
}

/// In rec/func mode `yych` is passed as an argument only to state functions
/// without their own YYPEEK (otherwise YYPEEK would overwrite the argument).
pub fn need_yych_arg(dfa: &Adfa, s: &State) -> bool {
    omit_peek(dfa, s) && s.go.spans.len() > 1 && !end_state(dfa, s)
}
