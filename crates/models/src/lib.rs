//! SeaORM entities and row-level helpers for service history records and
//! their image attachments.

pub mod errors;
pub mod db;
pub mod service_history;
pub mod service_history_image;

#[cfg(test)]
mod tests;
