//! CLI command implementations

pub mod cache;
pub mod generate;
pub mod probe;
pub mod tools;

pub use cache::execute as cache;
pub use generate::execute as generate;
pub use probe::execute as probe;
pub use tools::execute as tools;
