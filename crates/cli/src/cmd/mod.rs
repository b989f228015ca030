mod generate;
mod validate;

pub use generate::{GenerateOptions, cmd_generate, load_config};
pub use validate::cmd_validate;
