/// Attach / replace / delete of single images
pub mod image_tests;

/// Record create / update / delete cascading to images
pub mod record_tests;
