pub mod call;
pub mod delay;
pub mod log;
