//! HTTP handlers, grouped by resource.

pub mod auth;
pub mod clover;
pub mod customers;
pub mod invoices;
pub mod profile;
