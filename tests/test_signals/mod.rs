pub mod generate;

#[allow(unused_imports)]
pub use generate::{gain_db, interleave, rms, sine};
