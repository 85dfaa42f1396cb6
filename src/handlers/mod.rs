pub mod delete_handler;
pub mod get_handler;

pub use delete_handler::*;
pub use get_handler::*;
