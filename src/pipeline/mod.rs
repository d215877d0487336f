pub mod cancel;
pub mod chain;
pub mod limiter;
pub mod orchestrator;
pub mod pipe;
pub mod pool;
pub mod processor;
pub mod runtime;
