//! Row representations accepted by bulk operations.

mod bag;
mod cell;
mod entity;
mod row;
mod table;

pub use bag::FieldBag;
pub use cell::Cell;
pub use entity::BulkEntity;
pub use row::Row;
pub use table::{DataRow, DataTable};
