mod load;
mod parse;

pub use load::{load_config, load_history};
