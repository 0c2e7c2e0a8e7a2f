//! Core records for the World Game engine

pub mod challenge;
pub mod community;
pub mod geo;
pub mod governance;
pub mod ids;
pub mod need;
pub mod plan;
pub mod resource;
