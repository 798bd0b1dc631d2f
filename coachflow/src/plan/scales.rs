//! Closed taxonomies and abstract ordinal scales of the K1 training block.
//!
//! Every training parameter is a qualitative label. Mapping labels to
//! concrete sets, reps or loads happens in a later stage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! label_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[allow(missing_docs)]
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            /// Every label, in declaration order.
            pub const LABELS: &'static [&'static str] = &[$($label),+];

            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The wire label.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    other => Err(UnknownLabel {
                        taxonomy: stringify!($name),
                        label: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// A label that is not part of a taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{label}' is not a valid {taxonomy}")]
pub struct UnknownLabel {
    /// Taxonomy name.
    pub taxonomy: &'static str,
    /// The rejected label.
    pub label: String,
}

label_enum! {
    /// Movement pattern of an exercise (11 fixed patterns).
    Patron {
        EmpujeHorizontal => "empuje_horizontal",
        EmpujeVertical => "empuje_vertical",
        TraccionHorizontal => "traccion_horizontal",
        TraccionVertical => "traccion_vertical",
        Sentadilla => "sentadilla",
        BisagraCadera => "bisagra_cadera",
        Zancada => "zancada",
        Rotacion => "rotacion",
        Antirotacion => "antirotacion",
        Acarreo => "acarreo",
        Aislamiento => "aislamiento",
    }
}

label_enum! {
    /// Exercise-type category (7 fixed categories).
    Tipo {
        Multiarticular => "multiarticular",
        Monoarticular => "monoarticular",
        Unilateral => "unilateral",
        Isometrico => "isometrico",
        Pliometrico => "pliometrico",
        Metabolico => "metabolico",
        Movilidad => "movilidad",
    }
}

label_enum! {
    /// Five-level abstract scale for volume, series, reps, intensity and
    /// proximity to failure.
    Nivel {
        MuyBajo => "muy_bajo",
        Bajo => "bajo",
        Medio => "medio",
        Alto => "alto",
        MuyAlto => "muy_alto",
    }
}

label_enum! {
    /// Three-level abstract density scale.
    Densidad {
        Baja => "baja",
        Media => "media",
        Alta => "alta",
    }
}

label_enum! {
    /// Training method of a block (6 fixed methods).
    MetodoEntrenamiento {
        SeriesRectas => "series_rectas",
        Superseries => "superseries",
        Circuito => "circuito",
        Piramidal => "piramidal",
        DropSet => "drop_set",
        RestPause => "rest_pause",
    }
}

label_enum! {
    /// Overall orientation of a training plan.
    TrainingType {
        Fuerza => "fuerza",
        Hipertrofia => "hipertrofia",
        Resistencia => "resistencia",
        PerdidaGrasa => "perdida_grasa",
        Recomposicion => "recomposicion",
        SaludGeneral => "salud_general",
    }
}
