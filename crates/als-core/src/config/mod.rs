mod dirs;
mod settings;
mod validation;

pub use dirs::Directories;
pub use settings::{
    Config, DEFAULT_CAPTURE_TIMEOUT_MS, DEFAULT_DISPLAY_HEIGHT, DEFAULT_DISPLAY_WIDTH,
    DEFAULT_RADIUS,
};
pub use validation::warn_unknown_fields;
