//! Output shape of the training-plan stage.

use crate::contracts::{Field, Shape};

use super::model::{BLOCK_B_ID, K1_WEEKS};
use super::scales::{Densidad, MetodoEntrenamiento, Nivel, Patron, Tipo, TrainingType};

/// Strict shape of the training-plan stage output.
///
/// `k1_decisions` is optional at this level; its presence and content are
/// checked by [`K1Validator`](super::rules::K1Validator).
#[must_use]
pub fn training_plan_output() -> Shape {
    Shape::object([
        Field::required("training_plan", training_plan()),
        Field::optional("k1_decisions", k1_decisions()),
    ])
}

/// Shape of `training_plan`.
#[must_use]
pub fn training_plan() -> Shape {
    Shape::object([
        Field::required("training_type", Shape::Enum(TrainingType::LABELS)),
        Field::required("days_per_week", Shape::integer_range(1, 7)),
        Field::required("session_duration_min", Shape::integer_min(1)),
        Field::required("weeks", Shape::literal(K1_WEEKS)),
        Field::required("goal", Shape::non_empty_text()),
        Field::required("sessions", Shape::non_empty_array(session())),
        Field::required("general_notes", Shape::text()),
    ])
}

/// Shape of one session.
#[must_use]
pub fn session() -> Shape {
    Shape::object([
        Field::required("id", Shape::non_empty_text()),
        Field::required("name", Shape::non_empty_text()),
        Field::required("focus", Shape::array(Shape::non_empty_text())),
        Field::required("blocks", Shape::non_empty_array(block_b())),
        Field::required("session_notes", Shape::text()),
        Field::required(
            "core_mobility_block",
            Shape::object([Field::required("include", Shape::literal(false))]),
        ),
    ])
}

/// Shape of Block B.
#[must_use]
pub fn block_b() -> Shape {
    Shape::object([
        Field::required("id", Shape::literal(BLOCK_B_ID)),
        Field::required("block_name", Shape::non_empty_text()),
        Field::required("primary_muscles", Shape::array(Shape::non_empty_text())),
        Field::required("secondary_muscles", Shape::array(Shape::non_empty_text())),
        Field::required("exercises", Shape::non_empty_array(exercise())),
        Field::required("volumen_total_bloque", Shape::Scale(Nivel::LABELS)),
        Field::required("densidad", Shape::Scale(Densidad::LABELS)),
        Field::required(
            "metodo_entrenamiento",
            Shape::Enum(MetodoEntrenamiento::LABELS),
        ),
    ])
}

/// Shape of one exercise.
#[must_use]
pub fn exercise() -> Shape {
    Shape::object([
        Field::required("order", Shape::integer_min(1)),
        Field::required("exercise_id", Shape::non_empty_text()),
        Field::required("patron", Shape::Enum(Patron::LABELS)),
        Field::required("tipo", Shape::Enum(Tipo::LABELS)),
        Field::required("volumen_abstracto", Shape::Scale(Nivel::LABELS)),
        Field::required("series_abstracto", Shape::Scale(Nivel::LABELS)),
        Field::required("reps_abstracto", Shape::Scale(Nivel::LABELS)),
        Field::required("intensidad_abstracta", Shape::Scale(Nivel::LABELS)),
        Field::required("proximidad_fallo_abstracta", Shape::Scale(Nivel::LABELS)),
        Field::required("notas_tecnicas", Shape::text()),
    ])
}

/// Shape of the audit trail.
#[must_use]
pub fn k1_decisions() -> Shape {
    Shape::object([
        Field::required("reglas_aplicadas", Shape::array(Shape::non_empty_text())),
        Field::required(
            "metodos_usados",
            Shape::array(Shape::Enum(MetodoEntrenamiento::LABELS)),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::testing::k1_output;
    use serde_json::json;

    #[test]
    fn test_fixture_conforms() {
        let errors = training_plan_output().validate(&k1_output());
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn test_fixed_literals() {
        let mut weeks = k1_output();
        weeks["training_plan"]["weeks"] = json!(6);
        let errors = training_plan_output().validate(&weeks);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "training_plan.weeks");

        let mut block = k1_output();
        block["training_plan"]["sessions"][0]["blocks"][0]["id"] = json!("A");
        let errors = training_plan_output().validate(&block);
        assert_eq!(errors[0].path, "training_plan.sessions[0].blocks[0].id");

        let mut mobility = k1_output();
        mobility["training_plan"]["sessions"][0]["core_mobility_block"]["include"] = json!(true);
        let errors = training_plan_output().validate(&mobility);
        assert_eq!(
            errors[0].path,
            "training_plan.sessions[0].core_mobility_block.include"
        );
        assert!(errors.iter().all(|e| e.kind == ErrorKind::StructuralValidation));
    }

    #[test]
    fn test_closed_enums() {
        let mut value = k1_output();
        value["training_plan"]["sessions"][0]["blocks"][0]["exercises"][0]["patron"] =
            json!("press_banca");
        value["training_plan"]["sessions"][0]["blocks"][0]["exercises"][1]["tipo"] =
            json!("maquina");
        let errors = training_plan_output().validate(&value);

        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind == ErrorKind::StructuralValidation));
    }

    #[test]
    fn test_abstract_scale_number_is_semantic() {
        let mut value = k1_output();
        value["training_plan"]["sessions"][0]["blocks"][0]["exercises"][0]["volumen_abstracto"] =
            json!(3);
        let errors = training_plan_output().validate(&value);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::SemanticValidation);
    }

    #[test]
    fn test_schema_lists_every_taxonomy() {
        let schema = training_plan_output().to_json_schema();
        let exercise = &schema["properties"]["training_plan"]["properties"]["sessions"]["items"]
            ["properties"]["blocks"]["items"]["properties"]["exercises"]["items"];

        assert_eq!(exercise["properties"]["patron"]["enum"].as_array().unwrap().len(), 11);
        assert_eq!(exercise["properties"]["tipo"]["enum"].as_array().unwrap().len(), 7);
        assert_eq!(schema["properties"]["training_plan"]["properties"]["weeks"]["const"], 4);
    }
}
