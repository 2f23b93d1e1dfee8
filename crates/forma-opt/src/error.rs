/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
use cfgir::err::GraphError;
use forma_common::thiserror::{self, Error};

///Errors of the pass framework. These are configuration-time failures: the
/// curated base order and the placement table drifted apart, or a pass name
/// was registered twice. A validated build never produces them, which is
/// why the driver treats them as fatal.
#[derive(Debug, Error, Clone)]
pub enum OptError {
    #[error("Could not place pass \"{pass}\": anchor \"{anchor}\" is not in the pass list")]
    PlacementAnchorNotFound { pass: String, anchor: String },

    #[error("Pass name \"{0}\" registered twice in one pipeline")]
    DuplicatePassName(String),

    #[error("Internal graph error: {0}")]
    InternalGraphError(#[from] GraphError),
}
