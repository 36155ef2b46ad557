// src/lib.rs
pub mod calibration;
pub mod config;
pub mod data;
pub mod error;
pub mod geometry;
pub mod landmarks;
pub mod programming;
pub mod session;
pub mod simulation;
pub mod storage;
pub mod tracking;
pub mod validators;

pub use error::{CoachError, Result};
