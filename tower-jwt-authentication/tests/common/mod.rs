pub mod jwt;
pub mod util;
