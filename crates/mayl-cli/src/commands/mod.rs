pub mod worker;

pub use worker::WorkerCommand;
