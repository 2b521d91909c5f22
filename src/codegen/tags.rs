//! Tag operation emission.
//!
//! Two entry points: `gen_settags` emits the effects of a tag-command list
//! on a transition, `gen_fintags` finalizes tag variables into user-visible
//! names and captures when a rule fires. Finalization order matters:
//! variable tags are written before the fixed tags that read them, and
//! trailing-context cursor updates go last so that fixed tags can still use
//! the rightmost position.

use crate::code::{Code, CodeList};
use crate::codegen::Ctxt;
use crate::dfa::{Adfa, Rule, Tag, TagVer, TcId, RIGHTMOST, TAGVER_BOTTOM};
use crate::options::{Api, ApiStyle, CodeModel, Opts};
use crate::syntax::{argsubst, render_array_elem};

/// Name of a tag variable. S-tags and m-tags must not overlap, so m-tags get
/// an extra "m" (tag variables in different conditions may share numbers).
pub fn vartag_name(ver: TagVer, prefix: &str, is_mtag: bool) -> String {
    format!("{}{}{}", prefix, if is_mtag { "m" } else { "" }, ver)
}

/// Expression accessing a tag variable, routed through the configured tag
/// expression template.
pub fn vartag_expr(ver: TagVer, opts: &Opts, is_mtag: bool) -> String {
    let name = vartag_name(ver, &opts.tags_prefix, is_mtag);
    argsubst(&opts.tags_expression, &opts.api_sigil, "tag", true, &name)
}

/// Final tags are normally local variables defined by the user around the
/// lexer. In rec/func mode each state is a separate function, so final tags
/// live in the record passed between them.
fn fintag_expr(name: &str, opts: &Opts) -> String {
    if opts.code_model == CodeModel::RecFunc {
        argsubst(&opts.tags_expression, &opts.api_sigil, "tag", true, name)
    } else {
        name.to_string()
    }
}

fn gen_settag(ctx: &mut Ctxt, stmts: &mut CodeList, tag: &str, negative: bool, history: bool) {
    let opts = ctx.opts;
    let api = match (history, negative) {
        (true, true) => &opts.api_mtag_set_neg,
        (true, false) => &opts.api_mtag_set_pos,
        (false, true) => &opts.api_stag_set_neg,
        (false, false) => &opts.api_stag_set_pos,
    };
    if opts.api_style == ApiStyle::Functions {
        stmts.push(Code::stmt(ctx.buf.str(api).str("(").str(tag).str(")").flush()));
    } else {
        stmts.push(Code::text(argsubst(api, &opts.api_sigil, "tag", true, tag)));
    }
}

fn gen_shift(ctx: &mut Ctxt, stmts: &mut CodeList, shift: i32, tag: &str, history: bool) {
    if shift == 0 {
        return;
    }
    let opts = ctx.opts;
    let notag = tag.is_empty();
    let api = if notag {
        &opts.api_shift
    } else if history {
        &opts.api_mtag_shift
    } else {
        &opts.api_stag_shift
    };
    if opts.api_style == ApiStyle::Functions {
        ctx.buf.str(api).str("(");
        if !notag {
            ctx.buf.str(tag).str(", ");
        }
        ctx.buf.i32(shift).str(")");
        stmts.push(Code::stmt(ctx.buf.flush()));
    } else {
        // Single-argument YYSHIFT allows short-form unnamed substitution;
        // multi-argument YYSHIFTSTAG / YYSHIFTMTAG require named placeholders.
        let mut text = api.clone();
        if !notag {
            text = argsubst(&text, &opts.api_sigil, "tag", false, tag);
        }
        text = argsubst(&text, &opts.api_sigil, "shift", notag, &shift.to_string());
        stmts.push(Code::text(text));
    }
}

fn gen_restore_ctx(ctx: &mut Ctxt, stmts: &mut CodeList, tag: &str) {
    let opts = ctx.opts;
    let notag = tag.is_empty();
    let api = if notag { &opts.api_restore_ctx } else { &opts.api_restore_tag };
    if opts.api_style == ApiStyle::Functions {
        stmts.push(Code::stmt(ctx.buf.str(api).str("(").str(tag).str(")").flush()));
    } else {
        let text = if notag {
            api.clone()
        } else {
            argsubst(api, &opts.api_sigil, "tag", true, tag)
        };
        stmts.push(Code::text(text));
    }
}

fn gen_assign_many(stmts: &mut CodeList, many: &[String], rhs: &str) {
    stmts.push(Code::Assign { lhs: many.to_vec(), rhs: rhs.to_string(), op: None });
}

fn gen_assign_many_to_first(stmts: &mut CodeList, many: &[String]) {
    if many.len() <= 1 {
        return;
    }
    stmts.push(Code::Assign {
        lhs: many[1..].to_vec(),
        rhs: many[0].clone(),
        op: None,
    });
}

/// Emit the effects of the tag-command list `tcid`.
pub(crate) fn gen_settags(ctx: &mut Ctxt, tag_actions: &mut CodeList, dfa: &Adfa, tcid: TcId) {
    let generic = ctx.opts.api == Api::Custom;
    let cmds = dfa.tcpool.get(tcid);

    // Single tag, backwards compatibility: use the context marker.
    if !cmds.is_empty() && dfa.oldstyle_ctxmarker {
        if generic {
            if ctx.opts.api_style == ApiStyle::Functions {
                let text = ctx.buf.str(&ctx.opts.api_backup_ctx).str("()").flush();
                tag_actions.push(Code::stmt(text));
            } else {
                tag_actions.push(Code::text(ctx.opts.api_backup_ctx.clone()));
            }
        } else {
            tag_actions.push(Code::assign(
                ctx.opts.api_ctxmarker.clone(),
                ctx.opts.api_cursor.clone(),
            ));
        }
        return;
    }

    let mut i = 0;
    while i < cmds.len() {
        let p = &cmds[i];
        let is_mtag = dfa.mtagvers.contains(&p.lhs);
        let le = vartag_expr(p.lhs, ctx.opts, is_mtag);
        let re = vartag_expr(p.rhs, ctx.opts, is_mtag);

        if p.is_copy() {
            tag_actions.push(Code::assign(le, re));
            i += 1;
        } else if p.is_add() {
            // "save" command with history
            if p.lhs != p.rhs {
                tag_actions.push(Code::assign(le.clone(), re));
            }
            // History is stored in reverse; iterate backwards so that the
            // generated appends happen in chronological order.
            for h in p.history.iter().rev() {
                gen_settag(ctx, tag_actions, &le, *h == TAGVER_BOTTOM, true);
            }
            i += 1;
        } else if generic {
            // "save" command, custom API: one primitive per command.
            gen_settag(ctx, tag_actions, &le, p.history[0] == TAGVER_BOTTOM, false);
            i += 1;
        } else {
            // "save" command, default API: batch adjacent set-commands into
            // negative and positive groups and emit one assignment per group.
            let mut neg: Vec<String> = Vec::new();
            let mut pos: Vec<String> = Vec::new();
            while i < cmds.len() && cmds[i].is_set() {
                let q = &cmds[i];
                let qm = dfa.mtagvers.contains(&q.lhs);
                let e = vartag_expr(q.lhs, ctx.opts, qm);
                if q.history[0] == TAGVER_BOTTOM {
                    neg.push(e);
                } else {
                    pos.push(e);
                }
                i += 1;
            }
            if !neg.is_empty() {
                gen_assign_many(tag_actions, &neg, "NULL");
            }
            if !pos.is_empty() {
                let cursor = ctx.opts.api_cursor.clone();
                gen_assign_many(tag_actions, &pos, &cursor);
            }
        }
    }
}

/// Expand a tag into the user-visible expressions it finalizes to: nothing
/// for trailing context, the (possibly record-wrapped) name for a named tag,
/// or a range of `yypmatch` slots for a capture tag.
pub(crate) fn expand_fintags(ctx: &mut Ctxt, tag: &Tag, fintags: &mut Vec<String>) {
    fintags.clear();
    if tag.trailing {
        // Empty list: trailing context updates the cursor instead.
    } else if !tag.capture {
        fintags.push(fintag_expr(&tag.name, ctx.opts));
    } else {
        let yypmatch = fintag_expr("yypmatch", ctx.opts);
        let mut i = tag.lsub;
        while i <= tag.hsub {
            fintags.push(render_array_elem(ctx.opts, &yypmatch, i));
            i += 2;
        }
    }
}

/// Finalize tag variables for a fired rule.
pub(crate) fn gen_fintags(ctx: &mut Ctxt, stmts: &mut CodeList, dfa: &Adfa, rule: &Rule) {
    let generic = ctx.opts.api == Api::Custom;
    let mut fintags: Vec<String> = Vec::new();

    if rule.ncap > 0 {
        let lhs = fintag_expr("yynmatch", ctx.opts);
        stmts.push(Code::assign(lhs, rule.ncap.to_string()));
    }

    let mut varops: CodeList = Vec::new();
    let mut fixops: CodeList = Vec::new();
    let mut trailops: CodeList = Vec::new();
    let mut fixpostops: CodeList = Vec::new();
    let mut negtag = String::new();

    for t in rule.ltag..rule.htag {
        let tag = &dfa.tags[t];

        // Structural tag that is only needed for disambiguation.
        if tag.fictive {
            continue;
        }

        expand_fintags(ctx, tag, &mut fintags);

        if !tag.fixed {
            // variable tag
            let expr = vartag_expr(dfa.finvers[t], ctx.opts, tag.history);
            if tag.trailing {
                let notag = dfa.oldstyle_ctxmarker;
                if generic {
                    gen_restore_ctx(ctx, &mut trailops, if notag { "" } else { &expr });
                } else {
                    let rhs = if notag { ctx.opts.api_ctxmarker.clone() } else { expr };
                    trailops.push(Code::assign(ctx.opts.api_cursor.clone(), rhs));
                }
            } else {
                gen_assign_many(&mut varops, &fintags, &expr);
            }
        } else {
            debug_assert!(!tag.history);

            // Fixed tag based on either another tag or the cursor.
            let dist = tag.dist as i32;
            let fixed_on_cursor = tag.base == RIGHTMOST;
            let base = if fixed_on_cursor {
                ctx.opts.api_cursor.clone()
            } else {
                vartag_expr(dfa.finvers[tag.base], ctx.opts, false)
            };

            if tag.trailing {
                debug_assert!(tag.toplevel);
                if generic {
                    if !fixed_on_cursor {
                        gen_restore_ctx(ctx, &mut trailops, &base);
                    }
                    gen_shift(ctx, &mut trailops, -dist, "", false);
                } else if !fixed_on_cursor {
                    let rhs = if dist > 0 {
                        format!("{} - {}", base, dist)
                    } else {
                        base
                    };
                    trailops.push(Code::assign(ctx.opts.api_cursor.clone(), rhs));
                } else {
                    trailops.push(Code::Assign {
                        lhs: vec![ctx.opts.api_cursor.clone()],
                        rhs: dist.to_string(),
                        op: Some("-"),
                    });
                }
            } else {
                debug_assert!(!fintags.is_empty());
                let first = fintags[0].clone();

                if generic {
                    if fixed_on_cursor {
                        gen_settag(ctx, &mut fixops, &first, false, false);
                        gen_shift(ctx, &mut fixops, -dist, &first, false);
                        gen_assign_many_to_first(&mut fixops, &fintags);
                    } else if dist == 0 {
                        gen_assign_many(&mut fixops, &fintags, &base);
                    } else if tag.toplevel {
                        fixops.push(Code::assign(first.clone(), base));
                        gen_shift(ctx, &mut fixops, -dist, &first, false);
                        gen_assign_many_to_first(&mut fixops, &fintags);
                    } else {
                        // Split in two parts. First, set the fixed tag to its
                        // base. Second, pick one base tag to hold the no-match
                        // sentinel (the custom API has no NULL constant) and
                        // compare against it before shifting; the shift must
                        // run after all uses of that base tag.
                        if negtag.is_empty() {
                            negtag = base.clone();
                        }
                        fixops.push(Code::assign(first.clone(), base));
                        let cond = format!("{} != {}", first, negtag);
                        let mut then: CodeList = Vec::new();
                        gen_shift(ctx, &mut then, -dist, &first, false);
                        fixpostops.push(Code::if_then_else(&cond, then, Vec::new()));
                    }
                } else if dist == 0 {
                    gen_assign_many(&mut fixops, &fintags, &base);
                } else if tag.toplevel {
                    let rhs = format!("{} - {}", base, dist);
                    gen_assign_many(&mut fixops, &fintags, &rhs);
                } else {
                    // If the base tag is NULL the fixed tag is also NULL,
                    // otherwise it equals the base tag minus the offset.
                    fixops.push(Code::assign(first.clone(), base.clone()));
                    let cond = format!("{} != NULL", base);
                    let then = vec![Code::stmt(format!("{} -= {}", first, dist))];
                    fixops.push(Code::if_then_else(&cond, then, Vec::new()));
                    gen_assign_many_to_first(&mut fixops, &fintags);
                }
            }
        }
    }

    // Variable tags must be set before the fixed tags that depend on them;
    // trailing context is updated after all tags, because fixed tags may
    // depend on the rightmost position.
    stmts.append(&mut varops);
    stmts.append(&mut fixops);
    stmts.append(&mut trailops);

    if !negtag.is_empty() {
        debug_assert!(generic);
        stmts.push(Code::text("/* materialize no-match value */"));
        gen_settag(ctx, stmts, &negtag, true, false);
        stmts.append(&mut fixpostops);
    }
}
