pub mod demo;
pub mod deploy;
pub mod offset;
pub mod pricing;
pub mod seed;
pub mod tokens;
