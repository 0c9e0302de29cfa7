mod common;
mod policy;
mod scoping;
