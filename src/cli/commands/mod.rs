pub mod check;
pub mod jwt;
