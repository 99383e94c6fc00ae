pub mod claims;
pub mod resolver;
