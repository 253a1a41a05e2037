pub mod trailing;

pub use trailing::*;
