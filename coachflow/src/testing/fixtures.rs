//! Canned questionnaires and stage outputs.

use serde_json::{json, Value};

use crate::catalog::{nutrition_ids, training_ids};

/// A free-text questionnaire as the client form submits it.
#[must_use]
pub fn questionnaire() -> Value {
    json!({
        "nombre": "Lucia",
        "edad": 34,
        "sexo": "mujer",
        "objetivo": "ganar masa muscular y mejorar la postura",
        "experiencia": "intermedio",
        "dias_disponibles": 2,
        "duracion_sesion": "60 minutos",
        "lesiones": "molestias leves en el hombro derecho",
        "material": ["barra", "mancuernas", "poleas"],
        "idioma": "es"
    })
}

/// A conforming training-plan output: two sessions of four exercises with
/// eight distinct patterns and a complete audit trail.
#[must_use]
pub fn k1_output() -> Value {
    json!({
        "training_plan": {
            "training_type": "hipertrofia",
            "days_per_week": 2,
            "session_duration_min": 60,
            "weeks": 4,
            "goal": "ganar masa muscular y mejorar la postura",
            "sessions": [
                {
                    "id": "s1",
                    "name": "Torso",
                    "focus": ["pecho", "espalda", "hombros"],
                    "blocks": [{
                        "id": "B",
                        "block_name": "Bloque principal torso",
                        "primary_muscles": ["pectoral", "dorsal"],
                        "secondary_muscles": ["triceps", "biceps"],
                        "exercises": [
                            exercise(1, "press_banca_barra", "empuje_horizontal", "multiarticular"),
                            exercise(2, "jalon_pecho", "traccion_vertical", "multiarticular"),
                            exercise(3, "press_militar_mancuernas", "empuje_vertical", "multiarticular"),
                            exercise(4, "remo_mancuerna", "traccion_horizontal", "unilateral")
                        ],
                        "volumen_total_bloque": "alto",
                        "densidad": "media",
                        "metodo_entrenamiento": "superseries"
                    }],
                    "session_notes": "Calentar el hombro derecho antes del press.",
                    "core_mobility_block": { "include": false }
                },
                {
                    "id": "s2",
                    "name": "Pierna",
                    "focus": ["cuadriceps", "gluteo", "isquiotibiales"],
                    "blocks": [{
                        "id": "B",
                        "block_name": "Bloque principal pierna",
                        "primary_muscles": ["cuadriceps", "gluteo"],
                        "secondary_muscles": ["isquiotibiales", "core"],
                        "exercises": [
                            exercise(1, "paseo_granjero", "acarreo", "multiarticular"),
                            exercise(2, "sentadilla_goblet", "sentadilla", "multiarticular"),
                            exercise(3, "peso_muerto_rumano", "bisagra_cadera", "multiarticular"),
                            exercise(4, "zancada_atras", "zancada", "unilateral")
                        ],
                        "volumen_total_bloque": "medio",
                        "densidad": "baja",
                        "metodo_entrenamiento": "series_rectas"
                    }],
                    "session_notes": "",
                    "core_mobility_block": { "include": false }
                }
            ],
            "general_notes": "Mantener dos repeticiones en reserva la primera semana."
        },
        "k1_decisions": {
            "reglas_aplicadas": [
                "bloque_b_unico",
                "escalas_abstractas",
                "superseries_antagonistas_torso"
            ],
            "metodos_usados": ["series_rectas", "superseries"]
        }
    })
}

fn exercise(order: u32, id: &str, patron: &str, tipo: &str) -> Value {
    json!({
        "order": order,
        "exercise_id": id,
        "patron": patron,
        "tipo": tipo,
        "volumen_abstracto": "medio",
        "series_abstracto": "medio",
        "reps_abstracto": "alto",
        "intensidad_abstracta": "medio",
        "proximidad_fallo_abstracta": "bajo",
        "notas_tecnicas": "Controlar la fase excentrica."
    })
}

/// A conforming output for any catalog stage. Unknown ids get an empty
/// object.
#[must_use]
pub fn stub_output(stage_id: &str) -> Value {
    match stage_id {
        training_ids::CLIENT_PROFILE => json!({
            "client_profile": {
                "name": "Lucia",
                "age": 34,
                "sex": "mujer",
                "experience_level": "intermedio",
                "goals": ["ganar masa muscular", "mejorar la postura"],
                "injuries": ["molestias hombro derecho"],
                "available_days": 2,
                "session_duration_min": 60,
                "equipment": ["barra", "mancuernas", "poleas"],
                "language": "es"
            }
        }),
        training_ids::OBJECTIVES => json!({
            "objectives": {
                "primary_goal": "ganar masa muscular",
                "secondary_goals": ["mejorar la postura"],
                "training_type": "hipertrofia",
                "priorities": ["espalda alta", "pierna"]
            }
        }),
        training_ids::CONSTRAINTS => json!({
            "constraints": {
                "contraindicated_patterns": [],
                "limitations": ["evitar rango completo en press por encima de la cabeza"],
                "notes": "Molestias leves, sin diagnostico."
            }
        }),
        training_ids::SPLIT_DESIGN => json!({
            "split": {
                "days_per_week": 2,
                "sessions": [
                    { "id": "s1", "name": "Torso", "focus": ["pecho", "espalda", "hombros"] },
                    { "id": "s2", "name": "Pierna", "focus": ["cuadriceps", "gluteo"] }
                ]
            }
        }),
        training_ids::TRAINING_PLAN => k1_output(),
        training_ids::PROGRESSION => json!({
            "progression": {
                "weeks": [
                    week(1, "medio", "medio", false),
                    week(2, "alto", "medio", false),
                    week(3, "alto", "alto", false),
                    week(4, "bajo", "medio", true)
                ]
            }
        }),
        training_ids::LOAD_MAPPING => json!({
            "load_mapping": {
                "levels": [
                    { "level": "bajo", "series_min": 2, "series_max": 3, "reps_min": 12, "reps_max": 15, "rir": 4 },
                    { "level": "medio", "series_min": 3, "series_max": 4, "reps_min": 8, "reps_max": 12, "rir": 2 },
                    { "level": "alto", "series_min": 4, "series_max": 5, "reps_min": 6, "reps_max": 10, "rir": 1 }
                ]
            }
        }),
        training_ids::EXERCISE_RESOLUTION => json!({
            "resolved_exercises": [
                { "exercise_id": "press_banca_barra", "catalog_name": "Press de banca con barra", "found": true },
                { "exercise_id": "paseo_granjero", "catalog_name": "", "found": false }
            ]
        }),
        training_ids::PROGRAM_ASSEMBLY => json!({
            "program_summary": {
                "title": "Hipertrofia torso-pierna, 4 semanas",
                "overview": "Dos sesiones semanales con descarga en la cuarta semana.",
                "weeks": 4,
                "coach_notes": ["Revisar el hombro derecho tras la semana 2."]
            }
        }),
        nutrition_ids::NUTRITION_INTAKE => json!({
            "nutrition_profile": {
                "weight_kg": 61.5,
                "height_cm": 166,
                "age": 34,
                "sex": "mujer",
                "activity_level": "moderado",
                "goal": "ganar_musculo",
                "dietary_restrictions": [],
                "allergies": ["frutos secos"]
            }
        }),
        nutrition_ids::ENERGY_NEEDS => json!({
            "energy": {
                "bmr_kcal": 1370,
                "tdee_kcal": 2120,
                "target_kcal": 2350,
                "method": "mifflin_st_jeor"
            }
        }),
        nutrition_ids::MACRO_TARGETS => json!({
            "macros": { "protein_g": 125, "carbs_g": 290, "fat_g": 75, "fiber_g": 30 }
        }),
        nutrition_ids::MEAL_STRUCTURE => json!({
            "meal_structure": {
                "meals_per_day": 3,
                "meals": [
                    { "name": "desayuno", "time_hint": "08:00", "kcal_share": 0.3 },
                    { "name": "comida", "time_hint": "14:00", "kcal_share": 0.4 },
                    { "name": "cena", "time_hint": "21:00", "kcal_share": 0.3 }
                ]
            }
        }),
        nutrition_ids::FOOD_PREFERENCES => json!({
            "food_preferences": {
                "preferred": ["arroz", "pollo", "yogur"],
                "avoided": ["frutos secos"],
                "cuisine": ["mediterranea"]
            }
        }),
        nutrition_ids::MEAL_PLAN => json!({
            "meal_plan": {
                "days": [{
                    "day": 1,
                    "meals": [
                        {
                            "name": "desayuno",
                            "foods": [
                                { "food": "yogur", "quantity_g": 250 },
                                { "food": "avena", "quantity_g": 60 }
                            ],
                            "kcal": 700
                        },
                        {
                            "name": "comida",
                            "foods": [
                                { "food": "arroz", "quantity_g": 120 },
                                { "food": "pollo", "quantity_g": 180 }
                            ],
                            "kcal": 950
                        }
                    ]
                }]
            }
        }),
        nutrition_ids::SUPPLEMENTATION => json!({
            "supplementation": {
                "items": [{
                    "name": "creatina monohidrato",
                    "dose": "3 g/dia",
                    "timing": "cualquier momento",
                    "rationale": "apoyo a la ganancia de fuerza"
                }]
            }
        }),
        nutrition_ids::SHOPPING_LIST => json!({
            "shopping_list": {
                "items": [
                    { "food": "arroz", "quantity_g": 840, "category": "cereales" },
                    { "food": "pollo", "quantity_g": 1260, "category": "proteina" }
                ]
            }
        }),
        nutrition_ids::NUTRITION_ASSEMBLY => json!({
            "nutrition_summary": {
                "title": "Plan de ganancia muscular",
                "overview": "Superavit moderado con tres comidas al dia.",
                "coach_notes": ["Sin frutos secos en ninguna receta."]
            }
        }),
        _ => json!({}),
    }
}

fn week(week: u32, volume: &str, intensity: &str, deload: bool) -> Value {
    json!({
        "week": week,
        "volume_trend": volume,
        "intensity_trend": intensity,
        "deload": deload,
        "notes": ""
    })
}
