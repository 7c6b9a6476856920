pub mod repayment;
pub mod utils;
