pub mod audit;
pub mod comment;
pub mod expense;
pub mod group;
pub mod settlement;
