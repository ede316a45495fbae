pub mod ask;
pub mod personas;

pub use ask::AskCommand;
pub use personas::PersonasCommand;
