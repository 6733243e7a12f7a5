// Parser module: dialect detection, CREATE TABLE columns, INSERT decomposition,
// literal scanning and value decoding. Nothing in here touches files.

pub mod decode;
pub mod dialect;
pub mod insert;
pub mod scanner;
pub mod schema;

pub use decode::LogicalValue;
pub use dialect::{Detection, Dialect, DialectRecognizer};
pub use insert::{InsertParser, InsertStatement};
pub use scanner::{SplitStrategy, TupleIter, TupleSplitter};
pub use schema::SchemaParser;
