pub mod constants;
pub mod factories;

#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use factories::*;
