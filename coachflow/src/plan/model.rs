//! Typed model of the training-plan stage output (K1 variant).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::scales::{Densidad, MetodoEntrenamiento, Nivel, Patron, Tipo, TrainingType};

/// Number of weeks in a K1 cycle.
pub const K1_WEEKS: u32 = 4;

/// Id of the only agent-generated block.
pub const BLOCK_B_ID: &str = "B";

/// Full output of the training-plan stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingPlanOutput {
    /// The plan itself.
    pub training_plan: TrainingPlan,
    /// Audit trail of the rules and methods behind the plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k1_decisions: Option<K1Decisions>,
}

/// A four-week training plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingPlan {
    /// Orientation of the plan.
    pub training_type: TrainingType,
    /// Training days per week.
    pub days_per_week: u32,
    /// Target session length in minutes.
    pub session_duration_min: u32,
    /// Always [`K1_WEEKS`].
    pub weeks: u32,
    /// Client goal in their own words.
    pub goal: String,
    /// Sessions of a week, in order.
    pub sessions: Vec<Session>,
    /// Free-form coach notes.
    pub general_notes: String,
}

impl TrainingPlan {
    /// Every pattern used anywhere in the plan.
    #[must_use]
    pub fn patterns(&self) -> BTreeSet<Patron> {
        self.sessions.iter().flat_map(Session::patterns).collect()
    }

    /// Total number of exercises across sessions.
    #[must_use]
    pub fn exercise_count(&self) -> usize {
        self.sessions
            .iter()
            .flat_map(|s| &s.blocks)
            .map(|b| b.exercises.len())
            .sum()
    }
}

/// One training session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique within the plan.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Focus tags.
    pub focus: Vec<String>,
    /// Blocks of the session.
    pub blocks: Vec<BlockB>,
    /// Free-form session notes.
    pub session_notes: String,
    /// Deprecated; kept for schema compatibility and always disabled.
    pub core_mobility_block: CoreMobilityBlock,
}

impl Session {
    /// Distinct patterns used in the session's blocks.
    #[must_use]
    pub fn patterns(&self) -> BTreeSet<Patron> {
        self.blocks
            .iter()
            .flat_map(|b| &b.exercises)
            .map(|e| e.patron)
            .collect()
    }
}

/// The deprecated core/mobility switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreMobilityBlock {
    /// Always false.
    pub include: bool,
}

/// Block B, the main agent-generated block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockB {
    /// Always [`BLOCK_B_ID`].
    pub id: String,
    /// Display name.
    pub block_name: String,
    /// Main muscles worked.
    pub primary_muscles: Vec<String>,
    /// Assisting muscles.
    pub secondary_muscles: Vec<String>,
    /// Exercises in order.
    pub exercises: Vec<Exercise>,
    /// Total block volume.
    pub volumen_total_bloque: Nivel,
    /// Work-to-rest density.
    pub densidad: Densidad,
    /// Method applied to the block.
    pub metodo_entrenamiento: MetodoEntrenamiento,
}

/// One exercise slot in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    /// 1-based position in the block.
    pub order: u32,
    /// Reference into the external exercise catalog.
    pub exercise_id: String,
    /// Movement pattern.
    pub patron: Patron,
    /// Exercise category.
    pub tipo: Tipo,
    /// Volume level; numbers are assigned by a later stage.
    pub volumen_abstracto: Nivel,
    /// Series level.
    pub series_abstracto: Nivel,
    /// Repetition level.
    pub reps_abstracto: Nivel,
    /// Intensity level.
    pub intensidad_abstracta: Nivel,
    /// Proximity-to-failure level.
    pub proximidad_fallo_abstracta: Nivel,
    /// Technique cues.
    pub notas_tecnicas: String,
}

/// Audit trail produced alongside Block B.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct K1Decisions {
    /// Every rule that fired, including recorded coverage warnings.
    pub reglas_aplicadas: Vec<String>,
    /// Every training method used.
    pub metodos_usados: Vec<MetodoEntrenamiento>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::TypedOutput;
    use crate::testing::k1_output;

    #[test]
    fn test_fixture_reads_as_typed_plan() {
        let typed: TypedOutput<TrainingPlanOutput> = TypedOutput::new();
        let output = typed.from_json(k1_output()).unwrap();
        let plan = &output.training_plan;

        assert_eq!(plan.weeks, K1_WEEKS);
        assert_eq!(plan.sessions[0].blocks[0].id, BLOCK_B_ID);
        assert!(!plan.sessions[0].core_mobility_block.include);
        assert_eq!(plan.exercise_count(), 8);
        assert!(output.k1_decisions.is_some());
    }

    #[test]
    fn test_pattern_sets() {
        let typed: TypedOutput<TrainingPlanOutput> = TypedOutput::new();
        let output = typed.from_json(k1_output()).unwrap();

        let session_patterns = output.training_plan.sessions[0].patterns();
        assert!(session_patterns.len() >= 3);
        assert!(output.training_plan.patterns().is_superset(&session_patterns));
    }
}
