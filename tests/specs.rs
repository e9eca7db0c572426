// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace integration specs.
//!
//! End-to-end scenarios across the wire, mux, and devices crates, driven
//! against the in-process fake mux daemon.

mod specs {
    mod prelude;
    mod selection;
    mod transport;
}
