//! The K1 training plan: taxonomies, typed model, output shape and domain
//! rules.

mod model;
mod rules;
mod scales;
mod schema;

pub use model::{
    BlockB, CoreMobilityBlock, Exercise, K1Decisions, Session, TrainingPlan, TrainingPlanOutput,
    BLOCK_B_ID, K1_WEEKS,
};
pub use rules::{CoverageRules, K1Validator, Severity, WARNING_PREFIX};
pub use scales::{Densidad, MetodoEntrenamiento, Nivel, Patron, Tipo, TrainingType, UnknownLabel};
pub use schema::{block_b, exercise, k1_decisions, session, training_plan, training_plan_output};
