#![doc = "weekly-digest-core: core logic library for weekly-digest."]

//! This crate holds the normalization and weekly merge engine: everything that decides
//! *what* ends up in a weekly document, independent of how the document store is reached.
//! Transport (the Ghost Admin API client), the webhook server and configuration loading
//! live in the `weekly-digest` crate.
//!
//! # Usage
//! Build a [`merge::WeeklyMergeEngine`] around any [`store::DocumentStore`] and call
//! [`merge::WeeklyMergeEngine::submit`] for each incoming post URL.

pub mod config;
pub mod embed;
pub mod merge;
pub mod normalize;
pub mod store;
pub mod week;
