pub mod fs;
pub mod serde;

use rust_decimal::Decimal;

const DECIMAL_PRECISION: u32 = 10;

pub fn are_close(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= Decimal::new(1, DECIMAL_PRECISION)
}

pub fn assert_are_close(a: Decimal, b: Decimal) {
    assert!(are_close(a, b), "{} and {} are not close", a, b);
}
