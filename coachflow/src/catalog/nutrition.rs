//! N0..N8: the nutrition chain.

use crate::contracts::{Chain, Field, Shape, StageDefinition, StageRegistry};
use crate::errors::RegistryError;

/// Stage ids of the nutrition chain.
pub mod ids {
    /// N0.
    pub const NUTRITION_INTAKE: &str = "nutrition-intake";
    /// N1.
    pub const ENERGY_NEEDS: &str = "energy-needs";
    /// N2.
    pub const MACRO_TARGETS: &str = "macro-targets";
    /// N3.
    pub const MEAL_STRUCTURE: &str = "meal-structure";
    /// N4.
    pub const FOOD_PREFERENCES: &str = "food-preferences";
    /// N5.
    pub const MEAL_PLAN: &str = "meal-plan";
    /// N6.
    pub const SUPPLEMENTATION: &str = "supplementation";
    /// N7.
    pub const SHOPPING_LIST: &str = "shopping-list";
    /// N8.
    pub const NUTRITION_ASSEMBLY: &str = "nutrition-assembly";
}

use self::ids::{
    ENERGY_NEEDS, FOOD_PREFERENCES, MACRO_TARGETS, MEAL_PLAN, MEAL_STRUCTURE,
    NUTRITION_ASSEMBLY, NUTRITION_INTAKE, SHOPPING_LIST, SUPPLEMENTATION,
};

const SEX: &[&str] = &["hombre", "mujer", "otro", "no_indicado"];
const ACTIVITY: &[&str] = &["sedentario", "ligero", "moderado", "alto", "muy_alto"];
const GOAL: &[&str] = &["perder_grasa", "mantener", "ganar_musculo"];

/// Builds the N0..N8 registry.
pub fn nutrition_chain() -> Result<StageRegistry, RegistryError> {
    StageRegistry::builder()
        .stage(
            StageDefinition::new(NUTRITION_INTAKE, "N0", Chain::Nutrition, intake())
                .with_description("Extracts body data, activity and dietary restrictions")
                .reads_questionnaire(),
        )
        .stage(
            StageDefinition::new(ENERGY_NEEDS, "N1", Chain::Nutrition, energy())
                .with_description("Estimates basal and target energy expenditure")
                .reads([NUTRITION_INTAKE]),
        )
        .stage(
            StageDefinition::new(MACRO_TARGETS, "N2", Chain::Nutrition, macros())
                .with_description("Splits the energy target into macronutrients")
                .reads([NUTRITION_INTAKE, ENERGY_NEEDS]),
        )
        .stage(
            StageDefinition::new(MEAL_STRUCTURE, "N3", Chain::Nutrition, meal_structure())
                .with_description("Decides meal count and energy share per meal")
                .reads([NUTRITION_INTAKE, MACRO_TARGETS]),
        )
        .stage(
            StageDefinition::new(FOOD_PREFERENCES, "N4", Chain::Nutrition, food_preferences())
                .with_description("Collects preferred and avoided foods")
                .reads_questionnaire()
                .reads([NUTRITION_INTAKE]),
        )
        .stage(
            StageDefinition::new(MEAL_PLAN, "N5", Chain::Nutrition, meal_plan())
                .with_description("Builds the weekly meal plan")
                .reads([MACRO_TARGETS, MEAL_STRUCTURE, FOOD_PREFERENCES]),
        )
        .stage(
            StageDefinition::new(SUPPLEMENTATION, "N6", Chain::Nutrition, supplementation())
                .with_description("Suggests supplements where justified")
                .reads([NUTRITION_INTAKE, MACRO_TARGETS]),
        )
        .stage(
            StageDefinition::new(SHOPPING_LIST, "N7", Chain::Nutrition, shopping_list())
                .with_description("Aggregates the meal plan into a shopping list")
                .reads([MEAL_PLAN]),
        )
        .stage(
            StageDefinition::new(NUTRITION_ASSEMBLY, "N8", Chain::Nutrition, assembly())
                .with_description("Writes the client-facing nutrition summary")
                .reads([
                    NUTRITION_INTAKE,
                    ENERGY_NEEDS,
                    MACRO_TARGETS,
                    MEAL_PLAN,
                    SUPPLEMENTATION,
                    SHOPPING_LIST,
                ]),
        )
        .build()
}

fn intake() -> Shape {
    Shape::object([Field::required(
        "nutrition_profile",
        Shape::object([
            Field::required("weight_kg", Shape::Number),
            Field::required("height_cm", Shape::Number),
            Field::required("age", Shape::integer_range(12, 100)),
            Field::required("sex", Shape::Enum(SEX)),
            Field::required("activity_level", Shape::Enum(ACTIVITY)),
            Field::required("goal", Shape::Enum(GOAL)),
            Field::required("dietary_restrictions", Shape::array(Shape::non_empty_text())),
            Field::required("allergies", Shape::array(Shape::non_empty_text())),
        ]),
    )])
}

fn energy() -> Shape {
    Shape::object([Field::required(
        "energy",
        Shape::object([
            Field::required("bmr_kcal", Shape::integer_min(0)),
            Field::required("tdee_kcal", Shape::integer_min(0)),
            Field::required("target_kcal", Shape::integer_min(0)),
            Field::required("method", Shape::non_empty_text()),
        ]),
    )])
}

fn macros() -> Shape {
    Shape::object([Field::required(
        "macros",
        Shape::object([
            Field::required("protein_g", Shape::integer_min(0)),
            Field::required("carbs_g", Shape::integer_min(0)),
            Field::required("fat_g", Shape::integer_min(0)),
            Field::required("fiber_g", Shape::integer_min(0)),
        ]),
    )])
}

fn meal_structure() -> Shape {
    Shape::object([Field::required(
        "meal_structure",
        Shape::object([
            Field::required("meals_per_day", Shape::integer_range(1, 8)),
            Field::required(
                "meals",
                Shape::non_empty_array(Shape::object([
                    Field::required("name", Shape::non_empty_text()),
                    Field::required("time_hint", Shape::text()),
                    Field::required("kcal_share", Shape::Number),
                ])),
            ),
        ]),
    )])
}

fn food_preferences() -> Shape {
    Shape::object([Field::required(
        "food_preferences",
        Shape::object([
            Field::required("preferred", Shape::array(Shape::non_empty_text())),
            Field::required("avoided", Shape::array(Shape::non_empty_text())),
            Field::required("cuisine", Shape::array(Shape::non_empty_text())),
        ]),
    )])
}

fn meal_plan() -> Shape {
    let food = Shape::object([
        Field::required("food", Shape::non_empty_text()),
        Field::required("quantity_g", Shape::Number),
    ]);
    let meal = Shape::object([
        Field::required("name", Shape::non_empty_text()),
        Field::required("foods", Shape::non_empty_array(food)),
        Field::required("kcal", Shape::integer_min(0)),
    ]);

    Shape::object([Field::required(
        "meal_plan",
        Shape::object([Field::required(
            "days",
            Shape::non_empty_array(Shape::object([
                Field::required("day", Shape::integer_range(1, 7)),
                Field::required("meals", Shape::non_empty_array(meal)),
            ])),
        )]),
    )])
}

fn supplementation() -> Shape {
    Shape::object([Field::required(
        "supplementation",
        Shape::object([Field::required(
            "items",
            Shape::array(Shape::object([
                Field::required("name", Shape::non_empty_text()),
                Field::required("dose", Shape::non_empty_text()),
                Field::required("timing", Shape::text()),
                Field::required("rationale", Shape::text()),
            ])),
        )]),
    )])
}

fn shopping_list() -> Shape {
    Shape::object([Field::required(
        "shopping_list",
        Shape::object([Field::required(
            "items",
            Shape::non_empty_array(Shape::object([
                Field::required("food", Shape::non_empty_text()),
                Field::required("quantity_g", Shape::Number),
                Field::required("category", Shape::text()),
            ])),
        )]),
    )])
}

fn assembly() -> Shape {
    Shape::object([Field::required(
        "nutrition_summary",
        Shape::object([
            Field::required("title", Shape::non_empty_text()),
            Field::required("overview", Shape::text()),
            Field::required("coach_notes", Shape::array(Shape::text())),
        ]),
    )])
}
