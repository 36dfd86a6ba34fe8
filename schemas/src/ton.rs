//! TON cells.

use wireform_codec::{Field, Scalar, Schema};

pub const CELL: &str = "ton.Cell";
pub const CELL_REF: &str = "ton.CellRef";

pub(crate) fn schemas() -> Vec<Schema> {
    vec![
        Schema::new(CELL)
            .field(Field::scalar(1, "data", Scalar::Bytes))
            .field(Field::scalar(2, "bits", Scalar::Uint32))
            .field(Field::message(3, "refs", CELL_REF).repeated()),
        Schema::new(CELL_REF)
            .field(Field::scalar(1, "hash", Scalar::Bytes))
            .field(Field::message(2, "cell", CELL).optional()),
    ]
}
