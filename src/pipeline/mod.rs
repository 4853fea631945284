//! Pipeline stages for paper-to-post generation.
//!
//! Each submodule implements exactly one step. Stages take the model
//! backend as a trait object and report a [`StageOutcome`](crate::outcome::StageOutcome)
//! or a plain `Result`, leaving the run policy to [`crate::run`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ figures ──▶ metadata ──▶ summarize ──▶ translate ──▶ review
//! (path)    (pdfium)    (title…)     (uni→hs→kid)  (per tier)    (critique)
//!                                                        │
//!                                post ◀── select ◀───────┘
//!                                (markdown, assets, sidecar)
//! ```
//!
//! 1. [`input`]    : validate the PDF, derive the paper name and post path
//! 2. [`figures`]  : extract embedded figures off the runtime and stage them
//! 3. [`metadata`] : title, authors, date with deterministic fallbacks
//! 4. [`summarize`]: three summaries, each derived from the one before
//! 5. [`translate`]: each tier into the target language
//! 6. [`review`]   : quality critique, logged only
//! 7. [`select`]   : one figure per tier, or none
//! 8. [`post`]     : render and write the post, figure assets and sidecar
//!
//! [`postprocess`] cleans every generated summary before it is used.

pub mod figures;
pub mod input;
pub mod metadata;
pub mod post;
pub mod postprocess;
pub mod review;
pub mod select;
pub mod summarize;
pub mod translate;
