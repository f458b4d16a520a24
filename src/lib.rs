pub mod error;
pub mod sm2;
pub mod sm3;
