//! Cross-block directive expansion.
//!
//! After every block has been generated, placeholder nodes are rewritten in
//! place with data aggregated across blocks: the state-dispatch switch
//! (`getstate`), tag name listings (`stags`/`mtags`), the condition enum
//! (`types`), and the YYFILL/match maxima (`max`/`maxnmatch`). Aggregation
//! works on a snapshot of plain per-block data; only placeholder leaves are
//! rewritten, never the tree linkage.

use std::collections::{BTreeMap, BTreeSet};

use crate::code::{Code, CodeCase, CodeList, DirectiveArgs, EnumMember, VarType};
use crate::codegen::transition::gen_abort;
use crate::dfa::{Label, StartCond};
use crate::options::{CodeModel, Opts};
use crate::output::{BlockKind, FnCommon, Output, OutputBlock};
use crate::syntax::argsubst;
use crate::CodegenError;

/// Per-block snapshot of the data directives aggregate.
struct BlockAgg {
    name: String,
    kind: BlockKind,
    opts: Opts,
    stags: BTreeSet<String>,
    mtags: BTreeSet<String>,
    conds: Vec<StartCond>,
    fill_goto: BTreeMap<u32, CodeList>,
    start_label: Option<Label>,
    fn_common: Option<FnCommon>,
    max_fill: usize,
    max_nmatch: usize,
}

impl BlockAgg {
    fn from_block(b: &OutputBlock) -> Self {
        BlockAgg {
            name: b.name.clone(),
            kind: b.kind,
            opts: b.opts.clone(),
            stags: b.stags.clone(),
            mtags: b.mtags.clone(),
            conds: b.conds.clone(),
            fill_goto: b.fill_goto.clone(),
            start_label: b.start_label.clone(),
            fn_common: b.fn_common.clone(),
            max_fill: b.max_fill,
            max_nmatch: b.max_nmatch,
        }
    }
}

/// Rewrite every directive placeholder across all blocks.
pub(crate) fn expand_directives(output: &mut Output) -> Result<(), CodegenError> {
    let aggs: Vec<BlockAgg> = output
        .cblocks
        .iter()
        .chain(output.hblocks.iter())
        .map(BlockAgg::from_block)
        .collect();
    let total_opts = output.total_opts.clone();

    for b in output.cblocks.iter_mut().chain(output.hblocks.iter_mut()) {
        let block_opts = b.opts.clone();
        expand_list(&mut b.code, &aggs, &block_opts, &total_opts)?;
    }
    Ok(())
}

fn expand_list(
    list: &mut CodeList,
    aggs: &[BlockAgg],
    block_opts: &Opts,
    total_opts: &Opts,
) -> Result<(), CodegenError> {
    for code in list.iter_mut() {
        match code {
            Code::StateGoto(args) => {
                let args = args.clone();
                *code = gen_state_goto(aggs, total_opts, &args)?;
            },
            Code::STags(args) => {
                let args = args.clone();
                *code = expand_tags_directive(aggs, block_opts, &args, false)?;
            },
            Code::MTags(args) => {
                let args = args.clone();
                *code = expand_tags_directive(aggs, block_opts, &args, true)?;
            },
            Code::CondEnum(args) => {
                let args = args.clone();
                *code = expand_cond_enum(aggs, total_opts, &args)?;
            },
            Code::MaxFill(args) => {
                let args = args.clone();
                *code = gen_yymax(aggs, block_opts, &args, true)?;
            },
            Code::MaxNMatch(args) => {
                let args = args.clone();
                *code = gen_yymax(aggs, block_opts, &args, false)?;
            },

            // The implicit state dispatch is nested inside the generated
            // program; recurse into compound nodes to reach it.
            Code::Block { stmts, .. } => expand_list(stmts, aggs, block_opts, total_opts)?,
            Code::Loop { body } => expand_list(body, aggs, block_opts, total_opts)?,
            Code::RecFns { fns } => expand_list(fns, aggs, block_opts, total_opts)?,
            Code::FnDef { body, .. } => expand_list(body, aggs, block_opts, total_opts)?,
            Code::If { branches } => {
                for b in branches.iter_mut() {
                    expand_list(&mut b.body, aggs, block_opts, total_opts)?;
                }
            },
            Code::Switch { cases, .. } => {
                for c in cases.iter_mut() {
                    expand_list(&mut c.body, aggs, block_opts, total_opts)?;
                }
            },
            _ => {},
        }
    }
    Ok(())
}

fn find_blocks<'a>(
    aggs: &'a [BlockAgg],
    names: &[String],
    directive: &'static str,
) -> Result<Vec<&'a BlockAgg>, CodegenError> {
    let mut blocks = Vec::with_capacity(names.len());
    for name in names {
        match aggs.iter().find(|b| &b.name == name) {
            Some(b) => blocks.push(b),
            None => {
                return Err(CodegenError::UnknownBlock { name: name.clone(), directive });
            },
        }
    }
    Ok(blocks)
}

/// Construct the state-dispatch switch keyed on YYGETSTATE.
///
/// Two possibilities: an explicit list of block names (user directive or the
/// autogenerated local switch of a `use` block), or a global switch over all
/// non-`use` blocks. The initial transition gets its own case: the start
/// state number is an autogenerated detail users must not depend on, so a
/// distinguished `-1` (or the default case) jumps to the start label.
fn gen_state_goto(
    aggs: &[BlockAgg],
    total_opts: &Opts,
    args: &DirectiveArgs,
) -> Result<Code, CodegenError> {
    // The code model is a constant option, same in every block.
    let code_model = total_opts.code_model;

    let mut cases: Vec<CodeCase> = Vec::new();
    let mut bstart: Option<&BlockAgg> = None;

    match &args.block_names {
        None => {
            // Global switch: all blocks except `use` ones (those have a
            // local switch). A block that generates no code contributes no
            // cases.
            for b in aggs.iter().filter(|b| b.kind != BlockKind::Use) {
                for (idx, frag) in &b.fill_goto {
                    cases.push(Code::case_number(*idx as i32, frag.clone()));
                }
                if bstart.is_none() && b.start_label.is_some() {
                    bstart = Some(b);
                }
            }
        },
        Some(names) => {
            for b in find_blocks(aggs, names, "getstate")? {
                if b.start_label.is_none() {
                    return Err(CodegenError::BlockWithoutCode {
                        name: b.name.clone(),
                        directive: "getstate",
                    });
                }
                if bstart.is_none() {
                    bstart = Some(b);
                }
                for (idx, frag) in &b.fill_goto {
                    cases.push(Code::case_number(*idx as i32, frag.clone()));
                }
            }
        },
    }

    let Some(bstart) = bstart else {
        return Err(CodegenError::EmptyDirectiveTarget { directive: "getstate" });
    };
    let lstart = bstart.start_label.as_ref().expect("start block without a start label");

    // For a global switch use options accumulated over the whole program;
    // for an explicit list use the options of the first listed block.
    let opts = if args.block_names.is_none() { total_opts } else { &bstart.opts };

    // The start label is a block-level entity, so its prefix always comes
    // from the start block's options.
    let mut goto_start: CodeList = Vec::new();
    match code_model {
        CodeModel::GotoLabel => {
            goto_start.push(Code::goto(format!(
                "{}{}",
                bstart.opts.label_prefix, lstart.index
            )));
        },
        CodeModel::RecFunc => {
            let fnc = bstart
                .fn_common
                .clone()
                .unwrap_or_else(|| FnCommon::from_opts(&bstart.opts));
            goto_start.push(Code::TailCall {
                name: format!("{}{}", bstart.opts.label_prefix, lstart.index),
                args: fnc.args,
                returns_value: fnc.ret_type.is_some(),
            });
        },
        CodeModel::LoopSwitch => {
            // The special cases live in the main `yystate` switch instead.
        },
    }

    if opts.state_abort {
        cases.insert(0, Code::case_number(-1, goto_start));
        cases.push(Code::case_default(gen_abort()));
    } else {
        cases.push(Code::case_default(goto_start));
    }

    let mut stmts: CodeList = Vec::new();
    stmts.push(Code::Switch { expr: opts.state_get_expr(), cases });

    if opts.state_next {
        stmts.push(Code::TextRaw(format!("{}:", opts.label_next)));
    }

    if code_model == CodeModel::RecFunc {
        // The state dispatch is itself a function that tail-calls state
        // functions.
        let fnc = if args.block_names.is_none() {
            FnCommon::from_opts(total_opts)
        } else {
            bstart
                .fn_common
                .clone()
                .unwrap_or_else(|| FnCommon::from_opts(&bstart.opts))
        };
        Ok(Code::FnDef {
            name: fnc.name,
            ret_type: fnc.ret_type,
            params: fnc.params,
            body: stmts,
        })
    } else {
        Ok(Code::Block { stmts, kind: crate::code::BlockKind::Raw })
    }
}

/// Expand an `stags`/`mtags` listing into pre-rendered text.
fn expand_tags_directive(
    aggs: &[BlockAgg],
    block_opts: &Opts,
    args: &DirectiveArgs,
    multival: bool,
) -> Result<Code, CodegenError> {
    let directive = if multival { "mtags" } else { "stags" };

    let mut tags: BTreeSet<String> = BTreeSet::new();
    let selected: Vec<&BlockAgg> = match &args.block_names {
        None => aggs.iter().collect(),
        Some(names) => find_blocks(aggs, names, directive)?,
    };
    for b in selected {
        let set = if multival { &b.mtags } else { &b.stags };
        tags.extend(set.iter().cloned());
    }

    Ok(gen_tags(block_opts, args, &tags))
}

fn gen_tags(opts: &Opts, args: &DirectiveArgs, tags: &BTreeSet<String>) -> Code {
    let mut text = String::new();
    let mut first = true;
    for tag in tags {
        if first {
            first = false;
        } else if let Some(sep) = &args.separator {
            text.push_str(sep);
        }
        if let Some(fmt) = &args.format {
            text.push_str(&argsubst(fmt, &opts.api_sigil, "tag", true, tag));
        }
    }
    if opts.line_dirs && !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    Code::Raw(text)
}

/// Aggregate conditions across blocks, applying each block's enum prefix.
/// Duplicate names are fine when the numbers agree; a number clash is an
/// error naming both blocks.
fn add_conditions_from_blocks<'a>(
    blocks: impl Iterator<Item = &'a BlockAgg>,
    conds: &mut Vec<(StartCond, String)>,
) -> Result<(), CodegenError> {
    for b in blocks {
        for cond in &b.conds {
            let name = format!("{}{}", b.opts.cond_enum_prefix, cond.name);
            match conds.iter().find(|(c, _)| c.name == name) {
                Some((c, _)) if c.number == cond.number => {},
                Some((_, first_block)) => {
                    return Err(CodegenError::CondEnumCollision {
                        cond: name,
                        first_block: first_block.clone(),
                        second_block: b.name.clone(),
                    });
                },
                None => {
                    conds.push((StartCond { name, number: cond.number }, b.name.clone()));
                },
            }
        }
    }
    Ok(())
}

/// Expand the condition enum: a formatted list or a structured enum whose
/// numbering depends on the code model (sequential in goto/label mode,
/// condition numbers otherwise, because `yystate` multiplexes them there).
fn expand_cond_enum(
    aggs: &[BlockAgg],
    total_opts: &Opts,
    args: &DirectiveArgs,
) -> Result<Code, CodegenError> {
    let mut conds: Vec<(StartCond, String)> = Vec::new();
    match &args.block_names {
        None => add_conditions_from_blocks(aggs.iter(), &mut conds)?,
        Some(names) => {
            let blocks = find_blocks(aggs, names, "types")?;
            add_conditions_from_blocks(blocks.into_iter(), &mut conds)?;
        },
    }

    // An empty condition enum is more likely an error in user code than a
    // deliberate construct; generate nothing.
    if conds.is_empty() {
        return Ok(Code::Empty);
    }

    if let Some(fmt) = &args.format {
        let mut text = String::new();
        for (cond_number, (cond, _)) in conds.iter().enumerate() {
            if cond_number > 0 {
                if let Some(sep) = &args.separator {
                    text.push_str(sep);
                }
            }
            let cid = if total_opts.code_model == CodeModel::GotoLabel {
                cond_number as u32
            } else {
                cond.number
            };
            // The main substitution (the one allowing an unnamed sigil)
            // must go last, or it would swallow the named ones.
            let s = argsubst(fmt, &total_opts.api_sigil, "num", false, &cid.to_string());
            let s = argsubst(&s, &total_opts.api_sigil, "cond", true, &cond.name);
            text.push_str(&s);
        }
        text.push('\n');
        Ok(Code::Raw(text))
    } else {
        let numbered = total_opts.code_model != CodeModel::GotoLabel;
        let members = conds
            .into_iter()
            .map(|(cond, _)| EnumMember {
                name: cond.name,
                number: if numbered { Some(cond.number) } else { None },
            })
            .collect();
        Ok(Code::Enum { type_name: total_opts.api_cond_type.clone(), members })
    }
}

/// Expand a `max`/`maxnmatch` directive to the maximum across the selected
/// blocks.
fn gen_yymax(
    aggs: &[BlockAgg],
    block_opts: &Opts,
    args: &DirectiveArgs,
    fill: bool,
) -> Result<Code, CodegenError> {
    let directive = if fill { "max" } else { "maxnmatch" };
    let varname = if fill { &block_opts.api_maxfill } else { &block_opts.api_maxnmatch };

    let selected: Vec<&BlockAgg> = match &args.block_names {
        None => aggs.iter().collect(),
        Some(names) => find_blocks(aggs, names, directive)?,
    };
    let mut max = 1usize;
    for b in selected {
        max = max.max(if fill { b.max_fill } else { b.max_nmatch });
    }

    if let Some(fmt) = &args.format {
        let text = argsubst(fmt, &block_opts.api_sigil, "max", true, &max.to_string());
        Ok(Code::Text(text))
    } else {
        Ok(Code::Const {
            var_type: VarType::Uint,
            name: varname.clone(),
            value: max.to_string(),
        })
    }
}
