//! Code generation options.
//!
//! `Opts` is the full set of switches that affect codegen: the control-flow
//! shape, the user API flavor, YYFILL wiring, storable-state and condition
//! dispatch, dispatch-shape tuning, and the identifier policy (every name the
//! generated lexer mentions is configurable). Options are plain data: the
//! front end fills them in, codegen only reads them.

/// Control-flow shape of the generated lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeModel {
    /// States as labeled blocks connected by direct jumps.
    GotoLabel,
    /// States as numbered cases inside a dispatch loop over a `state` variable.
    LoopSwitch,
    /// States as mutually tail-calling functions (functional targets).
    RecFunc,
}

/// User API flavor: pointer-based cursor primitives or free-form macros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Api {
    /// Pointer API: cursor/marker/limit are assignable expressions.
    Default,
    /// Custom (generic) API: all primitives go through user-defined macros.
    Custom,
}

/// How custom-API primitives are invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStyle {
    /// Parenthesized calls: `YYSKIP()`, `YYSTAGP(t)`.
    Functions,
    /// Free-form macro substitution with named sigil placeholders.
    Freeform,
}

/// All switches recognized by the code generator.
///
/// Field groups follow the option table of the front end. Identifier fields
/// hold the exact text emitted into the generated lexer; template fields hold
/// free-form text with `api_sigil` placeholders.
#[derive(Debug, Clone)]
pub struct Opts {
    pub code_model: CodeModel,
    pub api: Api,
    pub api_style: ApiStyle,

    // ── YYFILL wiring ──
    pub fill_enable: bool,
    /// End-of-input rule `$` in use: YYFILL reports EOF instead of aborting.
    pub fill_eof: bool,
    pub fill_check: bool,
    pub fill_naked: bool,
    pub fill_param_enable: bool,

    // ── storable state ──
    pub storable_state: bool,
    pub state_next: bool,
    pub state_abort: bool,
    pub state_set_naked: bool,
    pub state_get_naked: bool,

    // ── start conditions ──
    pub start_conditions: bool,
    pub cond_abort: bool,
    pub cond_get_naked: bool,
    pub cond_set_naked: bool,
    pub cond_enum_prefix: String,
    pub cond_label_prefix: String,
    /// Autogenerated `:=>` transition template (goto/label mode).
    pub cond_goto: String,
    pub cond_goto_param: String,
    /// Divider comment emitted between condition sub-automata ("" = none).
    pub cond_div: String,
    pub cond_div_param: String,

    // ── dispatch shape ──
    pub eager_skip: bool,
    /// Emit the `yych` declaration and print printable bytes as char literals.
    pub char_emit: bool,
    pub bitmaps: bool,
    pub bitmaps_hex: bool,
    pub computed_gotos: bool,
    pub computed_gotos_threshold: usize,
    pub nested_ifs: bool,
    /// Target language converts integers to booleans implicitly, so bit tests
    /// need no trailing `!= 0`.
    pub implicit_bool_conversion: bool,

    // ── emission modifiers ──
    pub line_dirs: bool,
    pub indentation_sensitive: bool,
    pub debug: bool,

    // ── labels ──
    pub label_prefix: String,
    /// User-visible start label ("" = none).
    pub label_start: String,
    /// Prefix of YYFILL resumption labels.
    pub label_fill: String,
    /// Label of the dispatch loop ("" = plain `continue`).
    pub label_loop: String,
    /// Label emitted after the state-dispatch switch when `state_next` is on.
    pub label_next: String,

    // ── variables ──
    pub var_char: String,
    pub var_accept: String,
    pub var_state: String,
    /// Variable holding the YYFILL result ("" = use the call inline).
    pub var_fill: String,
    pub var_record: String,
    pub var_bitmaps: String,
    pub var_cond_table: String,
    pub var_computed_gotos_table: String,

    // ── API primitives ──
    pub api_sigil: String,
    pub api_cursor: String,
    pub api_marker: String,
    pub api_ctxmarker: String,
    pub api_limit: String,
    pub api_fill: String,
    pub fill_param: String,
    pub api_less_than: String,
    pub api_shift: String,
    pub api_stag_shift: String,
    pub api_mtag_shift: String,
    pub api_stag_set_pos: String,
    pub api_stag_set_neg: String,
    pub api_mtag_set_pos: String,
    pub api_mtag_set_neg: String,
    pub api_restore: String,
    pub api_restore_ctx: String,
    pub api_restore_tag: String,
    pub api_backup_ctx: String,
    pub api_debug: String,
    pub api_state_get: String,
    pub api_state_set: String,
    pub state_set_param: String,
    pub api_cond_get: String,
    pub api_cond_set: String,
    pub cond_set_param: String,
    pub api_cond_type: String,
    pub api_char_type: String,
    pub api_record_type: String,
    pub api_maxfill: String,
    pub api_maxnmatch: String,

    // ── tag variables ──
    /// Template wrapping a tag variable name (rec/func mode stores tags in
    /// the record passed between state functions).
    pub tags_expression: String,
    pub tags_prefix: String,

    // ── block framing ──
    pub wrap_blocks_in_braces: bool,
    pub indent_top: u32,

    /// Header file configured for type definitions ("" = none). Gates the
    /// condition-order warning.
    pub header_file: String,

    // ── render templates (target-syntax fragments) ──
    pub stx_array_elem: String,
    pub stx_enum_elem: String,
    pub stx_type_yytarget: String,
    pub stx_type_yybm: String,

    // ── rec/func entry ──
    pub fn_name: String,
    /// Return type of state functions ("" = none / unit).
    pub fn_return_type: String,
}

impl Default for Opts {
    fn default() -> Self {
        Opts {
            code_model: CodeModel::GotoLabel,
            api: Api::Default,
            api_style: ApiStyle::Functions,

            fill_enable: true,
            fill_eof: false,
            fill_check: true,
            fill_naked: false,
            fill_param_enable: true,

            storable_state: false,
            state_next: false,
            state_abort: false,
            state_set_naked: false,
            state_get_naked: false,

            start_conditions: false,
            cond_abort: false,
            cond_get_naked: false,
            cond_set_naked: false,
            cond_enum_prefix: "yyc".to_string(),
            cond_label_prefix: "yyc_".to_string(),
            cond_goto: "goto @@;".to_string(),
            cond_goto_param: "@@".to_string(),
            cond_div: String::new(),
            cond_div_param: "@@".to_string(),

            eager_skip: false,
            char_emit: true,
            bitmaps: false,
            bitmaps_hex: false,
            computed_gotos: false,
            computed_gotos_threshold: 9,
            nested_ifs: false,
            implicit_bool_conversion: false,

            line_dirs: false,
            indentation_sensitive: false,
            debug: false,

            label_prefix: "yy".to_string(),
            label_start: String::new(),
            label_fill: "yyFillLabel".to_string(),
            label_loop: String::new(),
            label_next: "yyNext".to_string(),

            var_char: "yych".to_string(),
            var_accept: "yyaccept".to_string(),
            var_state: "yystate".to_string(),
            var_fill: String::new(),
            var_record: "yyrecord".to_string(),
            var_bitmaps: "yybm".to_string(),
            var_cond_table: "yyctable".to_string(),
            var_computed_gotos_table: "yytarget".to_string(),

            api_sigil: "@@".to_string(),
            api_cursor: "YYCURSOR".to_string(),
            api_marker: "YYMARKER".to_string(),
            api_ctxmarker: "YYCTXMARKER".to_string(),
            api_limit: "YYLIMIT".to_string(),
            api_fill: "YYFILL".to_string(),
            fill_param: "@@".to_string(),
            api_less_than: "YYLESSTHAN".to_string(),
            api_shift: "YYSHIFT".to_string(),
            api_stag_shift: "YYSHIFTSTAG".to_string(),
            api_mtag_shift: "YYSHIFTMTAG".to_string(),
            api_stag_set_pos: "YYSTAGP".to_string(),
            api_stag_set_neg: "YYSTAGN".to_string(),
            api_mtag_set_pos: "YYMTAGP".to_string(),
            api_mtag_set_neg: "YYMTAGN".to_string(),
            api_restore: "YYRESTORE".to_string(),
            api_restore_ctx: "YYRESTORECTX".to_string(),
            api_restore_tag: "YYRESTORETAG".to_string(),
            api_backup_ctx: "YYBACKUPCTX".to_string(),
            api_debug: "YYDEBUG".to_string(),
            api_state_get: "YYGETSTATE".to_string(),
            api_state_set: "YYSETSTATE".to_string(),
            state_set_param: "@@".to_string(),
            api_cond_get: "YYGETCONDITION".to_string(),
            api_cond_set: "YYSETCONDITION".to_string(),
            cond_set_param: "@@".to_string(),
            api_cond_type: "YYCONDTYPE".to_string(),
            api_char_type: "YYCTYPE".to_string(),
            api_record_type: "YYRECORD".to_string(),
            api_maxfill: "YYMAXFILL".to_string(),
            api_maxnmatch: "YYMAXNMATCH".to_string(),

            tags_expression: "@@{tag}".to_string(),
            tags_prefix: "yyt".to_string(),

            wrap_blocks_in_braces: false,
            indent_top: 0,

            header_file: String::new(),

            stx_array_elem: "@@{array}[@@{index}]".to_string(),
            stx_enum_elem: "@@{name}".to_string(),
            stx_type_yytarget: "void*".to_string(),
            stx_type_yybm: "unsigned char".to_string(),

            fn_name: "yylex".to_string(),
            fn_return_type: String::new(),
        }
    }
}

impl Opts {
    /// YYGETCONDITION invocation text.
    pub fn cond_get_expr(&self) -> String {
        if self.cond_get_naked {
            self.api_cond_get.clone()
        } else {
            format!("{}()", self.api_cond_get)
        }
    }

    /// YYGETSTATE invocation text.
    pub fn state_get_expr(&self) -> String {
        if self.state_get_naked {
            self.api_state_get.clone()
        } else {
            format!("{}()", self.api_state_get)
        }
    }
}
