pub mod check;
pub mod process;
pub mod validate;
