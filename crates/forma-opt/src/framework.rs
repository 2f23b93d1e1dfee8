/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */

//! The pipeline machinery: custom pass placement, disable filtering,
//! verbosity assignment and the sequential execution driver.
//!
//! A pipeline is built once per compilation unit from a curated base order
//! and a table of placement directives, filtered against the configured
//! disable set, and then executed front to back. Filtered slots stay in the
//! list as `None` so phase indices remain stable for diagnostics.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use ahash::{AHashMap, AHashSet};
use cfgir::Graph;
use lazy_static::lazy_static;

use crate::{
    observer::{PassObserver, PassPoint},
    OptError, OptimizationPass,
};

///How a directive places its pass relative to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPlacement {
    InsertBefore,
    InsertAfter,
    Replace,
}

///Directive for custom pass placement. The anchor must already be in the
/// list when the directive is applied; base order and directive table are
/// curated together, so a missing anchor is a configuration bug.
#[derive(Debug, Clone, Copy)]
pub struct CustomPassPlacement {
    pub pass_to_place: &'static str,
    pub pass_relative_to: &'static str,
    pub directive: PassPlacement,
}

///The executable plan: execution-ordered slots, `None` marking a filtered
/// pass.
pub type PassList = Vec<Option<Box<dyn OptimizationPass>>>;

///Sentinel for a stop-after bound that was requested with an invalid value.
/// Execution then halts before the first pass, which makes the breakage
/// visible instead of silently optimizing everything.
pub const STOP_AFTER_DISABLED: u32 = u32::MAX;

///Builds the final ordered pass list from `base_order` and `placements`.
///
/// Passes without a directive keep their base-order position. A directive
/// relocates its pass relative to the anchor's current slot: `Replace`
/// overwrites the anchor, the insert variants shift everything at/after the
/// insertion point one slot to the right (stable).
pub fn build_pass_list(
    base_order: Vec<Box<dyn OptimizationPass>>,
    placements: &[CustomPassPlacement],
) -> Result<PassList, OptError> {
    let mut table: AHashMap<&str, &CustomPassPlacement> = AHashMap::default();
    for placement in placements {
        //later directives for the same pass overwrite earlier ones
        table.insert(placement.pass_to_place, placement);
    }

    let mut list: PassList = Vec::with_capacity(base_order.len());
    for pass in base_order {
        if list
            .iter()
            .flatten()
            .any(|existing| existing.name() == pass.name())
        {
            return Err(OptError::DuplicatePassName(pass.name().to_owned()));
        }
        let placement = match table.get(pass.name()) {
            None => {
                list.push(Some(pass));
                continue;
            }
            Some(p) => **p,
        };

        let anchor = list
            .iter()
            .position(|slot| {
                slot.as_ref()
                    .map(|p| p.name() == placement.pass_relative_to)
                    .unwrap_or(false)
            })
            .ok_or_else(|| OptError::PlacementAnchorNotFound {
                pass: pass.name().to_owned(),
                anchor: placement.pass_relative_to.to_owned(),
            })?;

        match placement.directive {
            PassPlacement::Replace => list[anchor] = Some(pass),
            PassPlacement::InsertBefore => list.insert(anchor, Some(pass)),
            PassPlacement::InsertAfter => list.insert(anchor + 1, Some(pass)),
        }
    }
    Ok(list)
}

///Nulls every pass whose name is in `disabled`. Slots are kept (not
/// removed) so phase indices stay meaningful. Unknown names simply never
/// match; configuration may reference passes that are not compiled in.
pub fn remove_disabled(list: &mut PassList, disabled: &AHashSet<String>) {
    //bail before touching anything if there is nothing to disable
    if disabled.is_empty() {
        return;
    }
    for slot in list.iter_mut() {
        let matches = slot
            .as_ref()
            .map(|pass| disabled.contains(pass.name()))
            .unwrap_or(false);
        if matches {
            *slot = None;
        }
    }
}

///Marks passes verbose: all of them if `print_all` is set, otherwise the
/// ones named in `print_passes`. With neither, the stage is skipped.
pub fn fill_verbose(list: &mut PassList, print_all: bool, print_passes: &AHashSet<String>) {
    if !print_all && print_passes.is_empty() {
        return;
    }
    for pass in list.iter_mut().flatten() {
        if print_all || print_passes.contains(pass.name()) {
            pass.set_verbose(true);
        }
    }
}

///Prints the executable plan.
pub fn print_pass_list(list: &PassList) {
    println!("Pass List:");
    if list.is_empty() {
        println!("\t<Empty>");
    }
    for pass in list.iter().flatten() {
        println!("\t- {}", pass.name());
    }
}

//Flags that the pass list has already been printed in this process.
static PASS_NAMES_PRINTED: AtomicBool = AtomicBool::new(false);

lazy_static! {
    ///Lock guarding the commit on [PASS_NAMES_PRINTED]. Scoped to that flag
    /// only; compilation units never synchronize on anything else.
    static ref PRINT_PASSES_LOCK: Mutex<()> = Mutex::new(());
}

///Prints the plan at most once per process, no matter how many compilation
/// units (on however many threads) request it. Returns whether this call
/// performed the print.
pub fn print_pass_list_once(list: &PassList, need_print: bool) -> bool {
    if !need_print {
        return false;
    }

    //cheap unsynchronized check first
    if PASS_NAMES_PRINTED.load(Ordering::Relaxed) {
        return false;
    }
    {
        //re-check under the lock before committing
        let _guard = PRINT_PASSES_LOCK.lock().unwrap();
        if PASS_NAMES_PRINTED.load(Ordering::Relaxed) {
            return false;
        }
        PASS_NAMES_PRINTED.store(true, Ordering::Relaxed);
    }

    print_pass_list(list);
    true
}

///Runs the plan over `graph`, skipping filtered slots.
///
/// `stop_after` is the pass-bisection debug aid: once the phase counter
/// reaches the bound (or the bound is [STOP_AFTER_DISABLED]), execution
/// halts before the current pass and everything after it is skipped. The
/// observer is invoked immediately before and after every executed pass.
pub fn run_optimizations(
    graph: &mut Graph,
    list: &mut PassList,
    stop_after: Option<u32>,
    observer: &mut dyn PassObserver,
) {
    let mut phase_id: u32 = 0;
    for slot in list.iter_mut() {
        if let Some(pass) = slot {
            if let Some(bound) = stop_after {
                if phase_id >= bound || bound == STOP_AFTER_DISABLED {
                    #[cfg(feature = "log")]
                    log::info!(
                        "stopping optimization before {} (phase_id = {phase_id})",
                        pass.name()
                    );
                    break;
                }
                #[cfg(feature = "log")]
                log::debug!("applying {}, phase_id = {phase_id}", pass.name());
            }

            let valid = graph.structure_valid();
            observer.pass_boundary(graph, pass.name(), PassPoint::Before, valid);
            pass.run(graph);
            let valid = graph.structure_valid();
            observer.pass_boundary(graph, pass.name(), PassPoint::After, valid);
            debug_assert!(valid, "pass {} left an invalid graph", pass.name());

            phase_id += 1;
        }
    }
}
