pub mod error;
pub mod operator;

pub use error::StorageError;
pub use operator::Operator;
