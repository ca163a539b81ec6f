pub mod errors;
pub mod migrations;
pub mod postgres_connection;
pub mod schema;
pub mod sql_functions;
