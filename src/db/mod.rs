pub mod models;
pub mod postgres;
pub mod statements;

pub use postgres::PostgresClient;
pub use statements::{distinct_actors, Statement, StatementBuilder, StatementKind};
