pub mod message;
pub mod response;
pub mod table;

pub use message::{ActivityRow, Message};
pub use response::ErrorResponse;
pub use table::{ColumnSpec, FilterKind, FilterSpec, SelectOption, TableSpec};
