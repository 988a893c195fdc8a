#![doc = "regen-derivatives: batch regeneration of digital object derivatives."]

//! Selective, resumable maintenance job that deletes stale derivatives and
//! transcript properties for each scoped master object, then recreates the
//! requested renditions through the media-processing collaborator.
//!
//! The collaborator boundaries (record store, media processing, search
//! index) live in [`contract`]; the batch core is [`select`], [`confirm`],
//! [`regenerate`] and [`run`].

pub mod cli;
pub mod confirm;
pub mod contract;
pub mod error;
pub mod index;
pub mod media;
pub mod regenerate;
pub mod run;
pub mod scope;
pub mod select;
pub mod store;
