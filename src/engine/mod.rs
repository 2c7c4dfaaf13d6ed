//! Core engine: the sweep → fetch → match → dedup → notify loop, plus the
//! command surface that front ends call.

pub mod commands;
pub mod evaluator;
pub mod fingerprint;
pub mod scheduler;
