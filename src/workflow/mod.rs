pub mod engine;
pub mod error;
pub mod queue;
pub mod restock;
pub mod transitions;
