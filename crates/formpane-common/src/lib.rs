pub mod address;
pub mod coord;
pub mod range;
pub mod value;

pub use address::*;
pub use coord::{A1ParseError, MAX_COLUMNS, MAX_ROWS, column_to_letters, letters_to_column};
pub use range::*;
pub use value::*;
