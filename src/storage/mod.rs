pub mod btree;
pub mod cursor;
pub mod debug;
pub mod pager;
pub mod row;
pub mod table;

pub use cursor::Cursor;
pub use row::SchemaRow;
pub use table::{insert_schema_row, select_rows, Table};
