pub mod cli;

pub const NAME: &str = "freightguard";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
