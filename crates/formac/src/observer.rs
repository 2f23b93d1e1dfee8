/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */

//! The debug observer: turns pass boundaries into log records and, on
//! request, dot dumps of the graph.
//!
//! Dumping follows the usual env-var convention: `FORMA_DUMP_ALL` dumps
//! around every pass, `FORMA_DUMP_<PASS_NAME>` around a single one.

use cfgir::Graph;
use forma_opt::observer::{PassObserver, PassPoint};

pub struct DumpObserver {
    dump_all: bool,
    ///Running boundary counter, so dump files sort in execution order.
    sequence: usize,
}

impl DumpObserver {
    pub fn from_env() -> Self {
        DumpObserver {
            dump_all: std::env::var("FORMA_DUMP_ALL").is_ok(),
            sequence: 0,
        }
    }

    fn wants_dump(&self, pass_name: &str) -> bool {
        self.dump_all
            || std::env::var(format!("FORMA_DUMP_{}", pass_name.to_uppercase())).is_ok()
    }
}

impl PassObserver for DumpObserver {
    fn pass_boundary(&mut self, graph: &Graph, pass_name: &str, point: PassPoint, graph_valid: bool) {
        let point_name = match point {
            PassPoint::Before => "before",
            PassPoint::After => "after",
        };
        log::debug!("{point_name} {pass_name}: graph valid: {graph_valid}");
        if !graph_valid {
            log::error!("graph invalid {point_name} {pass_name}");
        }

        if self.wants_dump(pass_name) {
            #[cfg(feature = "dot")]
            {
                let file = format!("{:03}_{pass_name}_{point_name}.dot", self.sequence);
                std::fs::write(&file, graph.to_dot(pass_name)).unwrap();
                log::info!("dumped {file}");
            }
            #[cfg(not(feature = "dot"))]
            let _ = graph;
        }
        self.sequence += 1;
    }
}
