//! E1..E9: the training chain.

use std::sync::Arc;

use crate::contracts::{Chain, Field, Shape, StageDefinition, StageRegistry};
use crate::errors::RegistryError;
use crate::plan::{self, CoverageRules, K1Validator, Nivel, Patron, TrainingType, K1_WEEKS};

/// Stage ids of the training chain.
pub mod ids {
    /// E1.
    pub const CLIENT_PROFILE: &str = "client-profile";
    /// E2.
    pub const OBJECTIVES: &str = "objectives";
    /// E3.
    pub const CONSTRAINTS: &str = "constraints";
    /// E4.
    pub const SPLIT_DESIGN: &str = "split-design";
    /// E5, the K1 block generator.
    pub const TRAINING_PLAN: &str = "training-plan";
    /// E6.
    pub const PROGRESSION: &str = "progression";
    /// E7, maps abstract levels to concrete numbers.
    pub const LOAD_MAPPING: &str = "load-mapping";
    /// E8, resolves exercise references against the catalog.
    pub const EXERCISE_RESOLUTION: &str = "exercise-resolution";
    /// E9.
    pub const PROGRAM_ASSEMBLY: &str = "program-assembly";
}

use self::ids::{
    CLIENT_PROFILE, CONSTRAINTS, EXERCISE_RESOLUTION, LOAD_MAPPING, OBJECTIVES,
    PROGRAM_ASSEMBLY, PROGRESSION, SPLIT_DESIGN, TRAINING_PLAN,
};

const SEX: &[&str] = &["hombre", "mujer", "otro", "no_indicado"];
const EXPERIENCE: &[&str] = &["principiante", "intermedio", "avanzado"];

/// Builds the E1..E9 registry.
pub fn training_chain(coverage: &CoverageRules) -> Result<StageRegistry, RegistryError> {
    StageRegistry::builder()
        .stage(
            StageDefinition::new(CLIENT_PROFILE, "E1", Chain::Training, client_profile())
                .with_description("Extracts a structured client profile from the questionnaire")
                .reads_questionnaire(),
        )
        .stage(
            StageDefinition::new(OBJECTIVES, "E2", Chain::Training, objectives())
                .with_description("Ranks goals and picks the training orientation")
                .reads_questionnaire()
                .reads([CLIENT_PROFILE]),
        )
        .stage(
            StageDefinition::new(CONSTRAINTS, "E3", Chain::Training, constraints())
                .with_description("Lists injuries, contraindicated patterns and limits")
                .reads([CLIENT_PROFILE]),
        )
        .stage(
            StageDefinition::new(SPLIT_DESIGN, "E4", Chain::Training, split_design())
                .with_description("Distributes weekly sessions and their focus")
                .reads([CLIENT_PROFILE, OBJECTIVES, CONSTRAINTS]),
        )
        .stage(
            StageDefinition::new(
                TRAINING_PLAN,
                "E5",
                Chain::Training,
                plan::training_plan_output(),
            )
            .with_description("Generates Block B of every session with abstract levels")
            .reads([CLIENT_PROFILE, OBJECTIVES, CONSTRAINTS, SPLIT_DESIGN])
            .with_semantic(Arc::new(K1Validator::new(coverage.clone()))),
        )
        .stage(
            StageDefinition::new(PROGRESSION, "E6", Chain::Training, progression())
                .with_description("Shapes the four-week progression")
                .reads([TRAINING_PLAN]),
        )
        .stage(
            StageDefinition::new(LOAD_MAPPING, "E7", Chain::Training, load_mapping())
                .with_description("Maps abstract levels to concrete sets, reps and RIR")
                .reads([CLIENT_PROFILE, TRAINING_PLAN, PROGRESSION]),
        )
        .stage(
            StageDefinition::new(
                EXERCISE_RESOLUTION,
                "E8",
                Chain::Training,
                exercise_resolution(),
            )
            .with_description("Resolves exercise references against the exercise catalog")
            .reads([TRAINING_PLAN]),
        )
        .stage(
            StageDefinition::new(PROGRAM_ASSEMBLY, "E9", Chain::Training, program_assembly())
                .with_description("Writes the client-facing program summary")
                .reads([
                    CLIENT_PROFILE,
                    OBJECTIVES,
                    TRAINING_PLAN,
                    PROGRESSION,
                    LOAD_MAPPING,
                    EXERCISE_RESOLUTION,
                ]),
        )
        .build()
}

fn client_profile() -> Shape {
    Shape::object([Field::required(
        "client_profile",
        Shape::object([
            Field::optional("name", Shape::text()),
            Field::optional("age", Shape::integer_range(12, 100)),
            Field::required("sex", Shape::Enum(SEX)),
            Field::required("experience_level", Shape::Enum(EXPERIENCE)),
            Field::required("goals", Shape::non_empty_array(Shape::non_empty_text())),
            Field::required("injuries", Shape::array(Shape::non_empty_text())),
            Field::required("available_days", Shape::integer_range(1, 7)),
            Field::required("session_duration_min", Shape::integer_min(1)),
            Field::required("equipment", Shape::array(Shape::non_empty_text())),
            Field::required("language", Shape::non_empty_text()),
        ]),
    )])
}

fn objectives() -> Shape {
    Shape::object([Field::required(
        "objectives",
        Shape::object([
            Field::required("primary_goal", Shape::non_empty_text()),
            Field::required("secondary_goals", Shape::array(Shape::non_empty_text())),
            Field::required("training_type", Shape::Enum(TrainingType::LABELS)),
            Field::required("priorities", Shape::array(Shape::non_empty_text())),
        ]),
    )])
}

fn constraints() -> Shape {
    Shape::object([Field::required(
        "constraints",
        Shape::object([
            Field::required(
                "contraindicated_patterns",
                Shape::array(Shape::Enum(Patron::LABELS)),
            ),
            Field::required("limitations", Shape::array(Shape::non_empty_text())),
            Field::required("notes", Shape::text()),
        ]),
    )])
}

fn split_design() -> Shape {
    Shape::object([Field::required(
        "split",
        Shape::object([
            Field::required("days_per_week", Shape::integer_range(1, 7)),
            Field::required(
                "sessions",
                Shape::non_empty_array(Shape::object([
                    Field::required("id", Shape::non_empty_text()),
                    Field::required("name", Shape::non_empty_text()),
                    Field::required("focus", Shape::array(Shape::non_empty_text())),
                ])),
            ),
        ]),
    )])
}

fn progression() -> Shape {
    Shape::object([Field::required(
        "progression",
        Shape::object([Field::required(
            "weeks",
            Shape::non_empty_array(Shape::object([
                Field::required("week", Shape::integer_range(1, i64::from(K1_WEEKS))),
                Field::required("volume_trend", Shape::Scale(Nivel::LABELS)),
                Field::required("intensity_trend", Shape::Scale(Nivel::LABELS)),
                Field::required("deload", Shape::Boolean),
                Field::required("notes", Shape::text()),
            ])),
        )]),
    )])
}

fn load_mapping() -> Shape {
    Shape::object([Field::required(
        "load_mapping",
        Shape::object([Field::required(
            "levels",
            Shape::non_empty_array(Shape::object([
                Field::required("level", Shape::Enum(Nivel::LABELS)),
                Field::required("series_min", Shape::integer_min(1)),
                Field::required("series_max", Shape::integer_min(1)),
                Field::required("reps_min", Shape::integer_min(1)),
                Field::required("reps_max", Shape::integer_min(1)),
                Field::required("rir", Shape::integer_range(0, 5)),
            ])),
        )]),
    )])
}

fn exercise_resolution() -> Shape {
    Shape::object([Field::required(
        "resolved_exercises",
        Shape::non_empty_array(Shape::object([
            Field::required("exercise_id", Shape::non_empty_text()),
            Field::required("catalog_name", Shape::text()),
            Field::required("found", Shape::Boolean),
        ])),
    )])
}

fn program_assembly() -> Shape {
    Shape::object([Field::required(
        "program_summary",
        Shape::object([
            Field::required("title", Shape::non_empty_text()),
            Field::required("overview", Shape::text()),
            Field::required("weeks", Shape::literal(K1_WEEKS)),
            Field::required("coach_notes", Shape::array(Shape::text())),
        ]),
    )])
}
