pub mod args;
pub mod diff;
pub mod push;
