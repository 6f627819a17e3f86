pub mod commands;
pub mod harp;
pub mod output;
pub mod registers;
pub mod values;
