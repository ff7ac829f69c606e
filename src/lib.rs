// src/lib.rs

//! Tender feed library
//!
//! Normalizes BOAMP, marches-publics.info and Maximilien notices into one
//! schema, merges cross-source duplicates and publishes the result as a
//! JSON feed.

pub mod error;
pub mod models;
pub mod observer;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
