//! munidata - personnel compensation extraction from the Chilean
//! Portal Transparencia.
//!
//! Pulls honorarium, contract and staff payroll tables out of hundreds of
//! municipal portal sites whose layout, column names and rendering differ,
//! and turns them into canonical records.

pub mod candidates;
pub mod cli;
pub mod config;
pub mod error;
pub mod mapping;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod schema;
pub mod scrapers;
pub mod values;
