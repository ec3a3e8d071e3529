pub mod serve;
pub mod simulate;
