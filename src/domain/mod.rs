pub mod delay_format;
pub mod duplicates;
pub mod merge;
pub mod models;
pub mod reputation;
