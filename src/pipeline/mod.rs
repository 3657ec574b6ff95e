//! Pipeline stages for the image transformation session.
//!
//! Each submodule implements exactly one concern. Keeping stages separate
//! makes each independently testable and lets us swap implementations
//! (e.g. point the remover at a different matting service) without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ session ──┬──▶ remote ──▶ (decode check) ──▶ artifact + download
//! (validate)  (guard)  │    (matting HTTP call)
//!                      └──▶ codec ───────────────────────▶ artifact + download
//!                           (decode → draw → encode)
//! ```
//!
//! 1. [`intake`] — validate the declared media type and package the upload
//! 2. [`remote`] — the background-removal HTTP capability; the only stage
//!    with network I/O
//! 3. [`codec`]  — decode/draw/encode for the re-encode operation; runs in
//!    `spawn_blocking` because it is CPU-bound

pub mod codec;
pub mod intake;
pub mod remote;
