//! Pipeline stages for Markdown-to-PDF builds.
//!
//! Each submodule implements exactly one step. Keeping them separate makes
//! each independently testable and keeps the container plumbing
//! ([`runtime`]) out of the ordering logic ([`typeset`]).
//!
//! ## Data Flow
//!
//! ```text
//! probe ──▶ aggregate ──▶ bibliography ──▶ materialize ──▶ typeset ──▶ finalize
//! (docker)   (walk .md)     (Zotero/.bib)    (workdir)       (pandoc,     (qpdf,
//!                                                             xelatex,     copy out)
//!                                                             biber)
//! ```
//!
//! 1. [`probe`]        - runtime reachable, image present (built on demand)
//! 2. [`aggregate`]    - concatenate Markdown in deterministic order; front
//!    matter is read by [`metadata`]
//! 3. [`bibliography`] - the only stage with network I/O; failures degrade
//!    to a warning
//! 4. [`materialize`]  - fill the per-run [`workdir`]
//! 5. [`typeset`]      - the fixed external-tool sequence
//! 6. [`finalize`]     - optional encryption, then promote the PDF

pub mod aggregate;
pub mod bibliography;
pub mod finalize;
pub mod materialize;
pub mod metadata;
pub mod probe;
pub mod runtime;
pub mod typeset;
pub mod workdir;
