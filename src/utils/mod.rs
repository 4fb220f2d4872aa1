pub mod logging;

pub use logging::{percentage, truncate_text};
