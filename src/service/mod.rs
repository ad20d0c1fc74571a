//! CrudService: generic CRUD using the safe SQL builder. Query-string parsing and admin account access.

mod admin;
mod crud;
pub mod query;
mod validation;
pub use admin::AdminService;
pub use crud::CrudService;
pub use query::parse_list_query;
pub use validation::{query_value_for_column, RequestValidator};
