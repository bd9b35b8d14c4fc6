pub mod config;
pub mod presets;
pub mod process_probe;
pub mod store;
pub mod supervisor;
pub mod utils;
