pub mod achievement;
pub mod profile;
