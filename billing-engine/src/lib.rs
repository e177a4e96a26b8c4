//! Recurring membership billing-cycle engine.
//!
//! A periodic background process that revokes plans on overdue unpaid
//! invoices and rolls paid invoices into the next billing period, plus the
//! member- and admin-facing commands that interact with that state.
pub mod config;
pub mod engine;
pub mod models;
pub mod routes;
pub mod services;
pub mod startup;
pub mod store;
pub mod util;
