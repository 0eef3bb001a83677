pub mod info;
pub mod rebuild;
