pub mod web;

#[cfg(test)]
mod tests;

pub use web::{Task, child_depth, run};
