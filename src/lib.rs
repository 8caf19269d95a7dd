//! pixelsieve - resumable batch image pipeline.
//!
//! Takes a source of images (a directory tree or a list of URLs), pushes
//! every item through six phases - extract, rename, analyze, filter,
//! convert, package - and lands the survivors in an output directory with
//! fixed-width sequential names and a manifest. Runs are resumable: progress
//! is checkpointed, and re-invoking the same command continues where the
//! previous invocation stopped.
//!
//! # Module map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | Phases, item statuses, run results |
//! | [`config`] | `pixelsieve.toml` loading, validation, fingerprint |
//! | [`source`] | Where items come from (directory walk, URL lists) |
//! | [`fetch`] | Retrying network acquisition with backoff |
//! | [`codec`] | Probe and transcode behind the `Codec` trait |
//! | [`catalog`] | Durable per-item state and the rename sequence |
//! | [`checkpoint`] | Durable run progress for resume |
//! | [`governor`] | In-flight memory bounds |
//! | [`runner`] | Bounded parallel phase execution |
//! | [`phases`] | The six phase transforms |
//! | [`package`] | Output placement and the package manifest |
//! | [`orchestrator`] | Run identity, sequencing, resume, cleanup |
//! | [`output`] | Progress lines, summaries, JSON report |

pub mod catalog;
pub mod checkpoint;
pub mod codec;
pub mod config;
pub mod fetch;
pub mod governor;
pub mod orchestrator;
pub mod output;
pub mod package;
pub mod phases;
pub mod runner;
pub mod source;
pub mod types;
