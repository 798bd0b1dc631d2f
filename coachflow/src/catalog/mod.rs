//! Default stage catalogs.
//!
//! Each chain is an ordered [`StageRegistry`](crate::contracts::StageRegistry)
//! whose stages only read stages that run before them.

mod nutrition;
mod training;

pub use nutrition::{ids as nutrition_ids, nutrition_chain};
pub use training::{ids as training_ids, training_chain};
