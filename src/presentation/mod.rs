//! Presentation layer — the CLI front end. Thin plumbing over the core's
//! public `Volume` API; not part of the core's tested contract.

pub mod cli;
