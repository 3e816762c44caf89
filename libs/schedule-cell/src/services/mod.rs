pub mod resolver;
pub mod slots;
