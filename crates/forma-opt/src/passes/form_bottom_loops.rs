/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */

//! Rewrites top-tested loops into bottom-tested ones.
//!
//! A top-tested loop evaluates its continuation condition in the header,
//! before every body execution. This pass duplicates the header into a new
//! block behind the back edge, so the recurring test happens at the bottom
//! of the loop and the code generator drops one compare-and-branch from the
//! common path:
//!
//! ```text
//!   preheader                 preheader
//!      v                         v
//!   header <-------.          header (runs once)
//!    |    \        |           |    \
//!    v     \       |           v     \
//!   body    \      |          body <------.
//!    |      exit   |           |     \    |
//!    `-------------'           v     exit |
//!                           new_header    |
//!                              |    \_____|
//!                              v
//!                             exit
//! ```
//!
//! Every value defined in the old header afterwards exists twice (the
//! original, executed once on entry, and its clone, executed per
//! iteration), so every phi and every def-use or env-use edge that crossed
//! the old header is repaired through merge phis ("fixups") placed at the
//! two join points.

use ahash::{AHashMap, AHashSet};
use cfgir::{inst::Op, BlockRef, Graph, InstRef, LoopRef};

use crate::{OptimizationPass, StatsSink};

///Everything the rewrite needs to know about one validated loop. Derived
/// fresh per loop and discarded afterwards.
struct FblContext {
    preheader: BlockRef,
    header: BlockRef,
    ///First block of the loop body (the header's in-loop successor).
    first_block: BlockRef,
    ///Source block of the single back edge.
    back_block: BlockRef,
    ///The header's out-of-loop successor.
    exit_block: BlockRef,
    ///Membership snapshot of the loop, header included.
    loop_blocks: AHashSet<BlockRef>,
    ///Header phi -> (entry value, loop-carried value), snapshotted before
    /// the CFG is touched; the back-edge inputs disappear during rewiring.
    phi_inputs: AHashMap<InstRef, (InstRef, InstRef)>,
    header_phis: Vec<InstRef>,
}

pub struct FormBottomLoops {
    verbose: bool,
    stats: Option<StatsSink>,

    //Maps phi on phi', the value the phi carries at the cloned test.
    phi_fixup: AHashMap<InstRef, InstRef>,
    //Maps phi on Phi(phi(0), phi') for uses inside the rewritten loop.
    interlace_phi_fixup_inside: AHashMap<InstRef, InstRef>,
    //Maps phi on Phi(phi(0), phi') for uses past the loop exit.
    interlace_phi_fixup_outside: AHashMap<InstRef, InstRef>,
    //Maps header insn on Phi(insn, clone), inside/outside flavors.
    header_fixup_inside: AHashMap<InstRef, InstRef>,
    header_fixup_outside: AHashMap<InstRef, InstRef>,
    //All clones of the current loop's header instructions.
    clones: AHashSet<InstRef>,
    //All merge phis this pass created for the current loop. Their reads of
    //the original header values are intentional and must not be redirected.
    fixup_phis: AHashSet<InstRef>,
}

impl FormBottomLoops {
    pub const PASS_NAME: &'static str = "form_bottom_loops";

    pub fn new(stats: Option<StatsSink>) -> Self {
        FormBottomLoops {
            verbose: false,
            stats,
            phi_fixup: AHashMap::default(),
            interlace_phi_fixup_inside: AHashMap::default(),
            interlace_phi_fixup_outside: AHashMap::default(),
            header_fixup_inside: AHashMap::default(),
            header_fixup_outside: AHashMap::default(),
            clones: AHashSet::default(),
            fixup_phis: AHashSet::default(),
        }
    }

    ///Clears the per-loop state. A fixup computed for one loop must never
    /// leak into the next one; the keys look alike but mean different
    /// instructions.
    fn prepare_for_new_loop(&mut self) {
        self.phi_fixup.clear();
        self.interlace_phi_fixup_inside.clear();
        self.interlace_phi_fixup_outside.clear();
        self.header_fixup_inside.clear();
        self.header_fixup_outside.clear();
        self.clones.clear();
        self.fixup_phis.clear();
    }

    ///Is the loop header safe to duplicate? Phis and the terminator are
    /// handled structurally; everything else must be repeatable without
    /// observable effect.
    fn check_loop_header(&self, graph: &Graph, header: BlockRef) -> bool {
        let term = graph[header].terminator();
        for inst in graph[header].insts() {
            if Some(*inst) == term {
                continue;
            }
            if !graph[*inst].op.is_safe_to_duplicate() {
                #[cfg(feature = "log")]
                if self.verbose {
                    log::debug!(
                        "{}: header {header:?} holds {inst:?}, unsafe to duplicate",
                        Self::PASS_NAME
                    );
                }
                return false;
            }
        }
        true
    }

    ///Should this loop be rewritten as a bottom-tested loop? Any violation
    /// is a silent skip; the pass simply does not apply here.
    fn should_transform_loop(&self, graph: &Graph, lref: LoopRef) -> Option<FblContext> {
        let info = graph.loop_info(lref);
        let header = info.header;

        let back_block = info.single_back_edge()?;
        if back_block == header {
            //single-block loops already test at the bottom
            return None;
        }
        let preheader = graph.loop_preheader(lref)?;

        //the header must end in the exit-testing branch
        let term = graph[header].terminator()?;
        if graph[term].op != Op::Branch {
            return None;
        }
        let succs = graph[header].succs();
        if succs.len() != 2 {
            return None;
        }
        let (first_block, exit_block) = match (info.contains(succs[0]), info.contains(succs[1])) {
            (true, false) => (succs[0], succs[1]),
            (false, true) => (succs[1], succs[0]),
            _ => return None,
        };

        //the header's test must be the only way out of the loop, otherwise
        //the exit fixups would not cover every leaving path
        for member in info.blocks.iter() {
            if *member == header {
                continue;
            }
            for succ in graph[*member].succs() {
                if !info.contains(*succ) {
                    return None;
                }
            }
        }

        //both join points must be ours alone: single predecessor (the
        //header) and no phis yet
        if graph[first_block].preds().len() != 1 || !graph[first_block].phis().is_empty() {
            return None;
        }
        if graph[exit_block].preds().len() != 1 || !graph[exit_block].phis().is_empty() {
            return None;
        }

        if !self.check_loop_header(graph, header) {
            return None;
        }

        let pre_idx = graph[header].pred_index(preheader)?;
        let back_idx = graph[header].pred_index(back_block)?;
        let header_phis = graph[header].phis().to_vec();
        let mut phi_inputs = AHashMap::with_capacity(header_phis.len());
        for phi in &header_phis {
            let p = graph.inst(*phi);
            if p.inputs().len() != 2 {
                return None;
            }
            phi_inputs.insert(*phi, (p.input(pre_idx), p.input(back_idx)));
        }

        Some(FblContext {
            preheader,
            header,
            first_block,
            back_block,
            exit_block,
            loop_blocks: info.blocks.clone(),
            phi_inputs,
            header_phis,
        })
    }

    ///Moves the recurring test behind the back edge: `back_block` now jumps
    /// into the cloned header, which repeats the original branch with
    /// identical polarity. The original header keeps the preheader as its
    /// only predecessor; its phis degenerate to single-input phis.
    fn do_cfg_transformation(&mut self, graph: &mut Graph, ctx: &FblContext, new_header: BlockRef) {
        graph
            .redirect_successor(ctx.back_block, ctx.header, new_header)
            .expect("back edge vanished mid-transformation");
        assert_eq!(
            graph[ctx.header].preds(),
            &[ctx.preheader],
            "old header must be loop-entry-only after rewiring"
        );
        for succ in graph[ctx.header].succs().to_vec() {
            graph.connect_blocks(new_header, succ);
        }
        #[cfg(feature = "log")]
        if self.verbose {
            log::debug!(
                "{}: loop {:?} (preheader {:?}): back edge {:?} now tests in {new_header:?}",
                Self::PASS_NAME,
                ctx.header,
                ctx.preheader,
                ctx.back_block
            );
        }
    }

    ///Returns phi', the value `phi` carries at the cloned test:
    /// - the loop-carried input itself, if it comes from outside the old
    ///   header (old back edge or old preheader),
    /// - `Phi(input, clone(input))`, if the input is an ordinary old-header
    ///   instruction,
    /// - `Phi(input(0), input')`, if the input is itself an old-header phi.
    ///
    /// The map is populated before it is queried a second time for the same
    /// phi, so mutually referencing header phis terminate.
    fn get_phi_fixup(
        &mut self,
        graph: &mut Graph,
        ctx: &FblContext,
        clone_map: &AHashMap<InstRef, InstRef>,
        phi: InstRef,
    ) -> InstRef {
        if let Some(fixup) = self.phi_fixup.get(&phi) {
            return *fixup;
        }
        let (_, loop_in) = ctx.phi_inputs[&phi];
        let def_block = graph[loop_in]
            .block()
            .expect("loop-carried value is not attached to any block");

        if def_block != ctx.header {
            self.phi_fixup.insert(phi, loop_in);
            return loop_in;
        }

        if graph[loop_in].is_phi() {
            let (inner_entry, _) = ctx.phi_inputs[&loop_in];
            let ty = graph[loop_in].ty;
            //register the partial merge before recursing; phi cycles hit
            //the map instead of recursing forever
            let partial = graph.create_inst(Op::Phi, ty, &[inner_entry]);
            self.fixup_phis.insert(partial);
            self.phi_fixup.insert(phi, partial);
            let inner_fixup = self.get_phi_fixup(graph, ctx, clone_map, loop_in);
            graph.add_phi_input(partial, inner_fixup);
            graph.attach_phi(ctx.first_block, partial);
            return partial;
        }

        let clone = *clone_map
            .get(&loop_in)
            .expect("header instruction was not cloned");
        let ty = graph[loop_in].ty;
        let merge = graph.append_phi(ctx.first_block, ty, &[loop_in, clone]);
        self.fixup_phis.insert(merge);
        self.phi_fixup.insert(phi, merge);
        merge
    }

    ///Returns the `Phi(insn, clone)` merge serving uses in `block`-flavor
    /// position: `first_block` for uses still inside the rewritten loop,
    /// `exit_block` for uses past the exit.
    fn get_header_fixup(
        &mut self,
        graph: &mut Graph,
        ctx: &FblContext,
        insn: InstRef,
        clone: InstRef,
        inside: bool,
    ) -> InstRef {
        let cached = if inside {
            self.header_fixup_inside.get(&insn)
        } else {
            self.header_fixup_outside.get(&insn)
        };
        if let Some(fixup) = cached {
            return *fixup;
        }

        let block = if inside { ctx.first_block } else { ctx.exit_block };
        let ty = graph[insn].ty;
        let merge = graph.append_phi(block, ty, &[insn, clone]);
        self.fixup_phis.insert(merge);
        if inside {
            self.header_fixup_inside.insert(insn, merge);
        } else {
            self.header_fixup_outside.insert(insn, merge);
        }
        merge
    }

    ///Returns the interlace merge `Phi(phi(0), phi')` serving uses of a
    /// header phi, in inside/outside flavor like [Self::get_header_fixup].
    fn get_interlace_fixup(
        &mut self,
        graph: &mut Graph,
        ctx: &FblContext,
        phi: InstRef,
        inside: bool,
    ) -> InstRef {
        let cached = if inside {
            self.interlace_phi_fixup_inside.get(&phi)
        } else {
            self.interlace_phi_fixup_outside.get(&phi)
        };
        if let Some(fixup) = cached {
            return *fixup;
        }

        let (entry_value, _) = ctx.phi_inputs[&phi];
        let phi_prime = self.phi_fixup[&phi];
        let block = if inside { ctx.first_block } else { ctx.exit_block };
        let ty = graph[phi].ty;
        let merge = graph.append_phi(block, ty, &[entry_value, phi_prime]);
        self.fixup_phis.insert(merge);
        if inside {
            self.interlace_phi_fixup_inside.insert(phi, merge);
        } else {
            self.interlace_phi_fixup_outside.insert(phi, merge);
        }
        merge
    }

    ///Users whose reads of old-header values are already correct: the
    /// clones (remapped separately), the merge phis themselves, and the
    /// old header's own instructions (they only run on the entry pass).
    fn keeps_original(&self, graph: &Graph, ctx: &FblContext, user: InstRef) -> bool {
        if self.clones.contains(&user) || self.fixup_phis.contains(&user) {
            return true;
        }
        graph[user].block() == Some(ctx.header)
    }

    ///Redirects every remaining use of an old header instruction to the
    /// matching inside/outside merge.
    fn fix_header_insn_uses(
        &mut self,
        graph: &mut Graph,
        ctx: &FblContext,
        insn: InstRef,
        clone: InstRef,
    ) {
        for u in graph[insn].uses().to_vec() {
            if self.keeps_original(graph, ctx, u.user) {
                continue;
            }
            let user_block = graph[u.user].block().expect("user is not attached");
            let inside = ctx.loop_blocks.contains(&user_block);
            let fixup = self.get_header_fixup(graph, ctx, insn, clone, inside);
            graph.replace_input(u.user, u.index, fixup);
        }
        for u in graph[insn].env_uses().to_vec() {
            if self.keeps_original(graph, ctx, u.user) {
                continue;
            }
            let user_block = graph[u.user].block().expect("env user is not attached");
            let inside = ctx.loop_blocks.contains(&user_block);
            let fixup = self.get_header_fixup(graph, ctx, insn, clone, inside);
            graph.replace_env_input(u.user, u.index, fixup);
        }
    }

    ///Redirects every remaining use of an old header phi to the matching
    /// interlace merge.
    fn fix_header_phi_uses(&mut self, graph: &mut Graph, ctx: &FblContext, phi: InstRef) {
        for u in graph[phi].uses().to_vec() {
            if self.keeps_original(graph, ctx, u.user) {
                continue;
            }
            let user_block = graph[u.user].block().expect("user is not attached");
            let inside = ctx.loop_blocks.contains(&user_block);
            let fixup = self.get_interlace_fixup(graph, ctx, phi, inside);
            graph.replace_input(u.user, u.index, fixup);
        }
        for u in graph[phi].env_uses().to_vec() {
            if self.keeps_original(graph, ctx, u.user) {
                continue;
            }
            let user_block = graph[u.user].block().expect("env user is not attached");
            let inside = ctx.loop_blocks.contains(&user_block);
            let fixup = self.get_interlace_fixup(graph, ctx, phi, inside);
            graph.replace_env_input(u.user, u.index, fixup);
        }
    }

    ///Rewrites one validated loop.
    fn rewrite_loop(&mut self, graph: &mut Graph, ctx: &FblContext) {
        //1. clone the header's instructions (terminator included) into the
        //   block that will carry the recurring test
        let new_header = graph.new_block();
        let originals = graph[ctx.header].insts().to_vec();
        let mut clone_map: AHashMap<InstRef, InstRef> =
            AHashMap::with_capacity(originals.len());
        for inst in &originals {
            let clone = graph.clone_inst(*inst);
            graph.attach_inst(new_header, clone);
            clone_map.insert(*inst, clone);
            self.clones.insert(clone);
        }

        //2. rewire the CFG around the clone
        self.do_cfg_transformation(graph, ctx, new_header);

        //3. compute phi' for every header phi; the merges land in
        //   first_block and must exist before any use is redirected
        for phi in &ctx.header_phis {
            self.get_phi_fixup(graph, ctx, &clone_map, *phi);
        }

        //4. the clones still read the originals; remap them onto their
        //   sibling clones and the phi fixups
        for clone in clone_map.values().copied().collect::<Vec<_>>() {
            for (index, input) in graph[clone].inputs().to_vec().into_iter().enumerate() {
                if let Some(sibling) = clone_map.get(&input) {
                    graph.replace_input(clone, index, *sibling);
                } else if ctx.phi_inputs.contains_key(&input) {
                    let fixup = self.phi_fixup[&input];
                    graph.replace_input(clone, index, fixup);
                }
            }
            for (index, value) in graph[clone].env().to_vec().into_iter().enumerate() {
                if let Some(sibling) = clone_map.get(&value) {
                    graph.replace_env_input(clone, index, *sibling);
                } else if ctx.phi_inputs.contains_key(&value) {
                    let fixup = self.phi_fixup[&value];
                    graph.replace_env_input(clone, index, fixup);
                }
            }
        }

        //5. redirect every other use of old-header values through the
        //   merge phis
        for inst in &originals {
            let clone = clone_map[inst];
            self.fix_header_insn_uses(graph, ctx, *inst, clone);
        }
        for phi in &ctx.header_phis {
            self.fix_header_phi_uses(graph, ctx, *phi);
        }
    }
}

impl OptimizationPass for FormBottomLoops {
    fn name(&self) -> &str {
        Self::PASS_NAME
    }

    fn run(&mut self, graph: &mut Graph) {
        let mut formed = 0usize;
        graph.compute_loop_info();
        loop {
            self.prepare_for_new_loop();
            let mut context = None;
            for lref in graph.loop_refs().collect::<Vec<_>>() {
                if let Some(ctx) = self.should_transform_loop(graph, lref) {
                    context = Some(ctx);
                    break;
                }
            }
            let ctx = match context {
                Some(ctx) => ctx,
                //no top-tested loop left that the gate accepts
                None => break,
            };
            self.rewrite_loop(graph, &ctx);
            formed += 1;
            //the rewrite restructured the region; refresh before looking at
            //the next candidate
            graph.compute_loop_info();
        }

        if formed > 0 {
            if let Some(stats) = &self.stats {
                stats.borrow_mut().add("bottom_loops_formed", formed as u64);
            }
            #[cfg(feature = "log")]
            if self.verbose {
                log::debug!("{}: rewrote {formed} loops", Self::PASS_NAME);
            }
        }
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}
