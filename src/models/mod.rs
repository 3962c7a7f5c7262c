pub mod namespace;
pub mod query;
pub mod schema;

pub use namespace::*;
pub use query::*;
pub use schema::*;
