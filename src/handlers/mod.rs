//! HTTP handlers for table CRUD and admin accounts.

pub mod admin;
pub mod table;
