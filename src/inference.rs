pub mod compiler;
pub mod definition;
pub mod pathway;
pub mod pipeline;
pub mod rules;

pub use compiler::compile_way;
