pub mod archive;

pub use harmonia_utils_test::{arb_byte_string, arb_filename, arb_symlink_target};
