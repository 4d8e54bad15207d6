//! Public API for allocsite.
//!
//! This module contains all user-facing types and functions.
//! Most users should only interact with types from this module.

pub mod callsite;
pub mod config;
pub mod context;
pub mod error;
pub mod kind;
pub mod stats;
