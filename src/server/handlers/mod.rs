pub mod ai;
pub mod health;
