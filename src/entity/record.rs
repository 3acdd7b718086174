//! Canonical entity record
//!
//! A record is assembled from several partial extractions. Enumerated fields
//! accept loose model output ("Phase 2", "phase_2", "PHASE II" all land on
//! the same variant) and fall back to `Unknown` rather than failing.

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::llm::StructuredOutput;

/// Declares a closed vocabulary with lenient parsing.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => $text:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[derive(Serialize, Deserialize)]
        #[serde(into = "String", from = "String")]
        pub enum $name {
            $($variant,)+
            #[default]
            Unknown,
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                    $name::Unknown => "unknown",
                }
            }

            /// Every accepted value, `unknown` last.
            pub fn values() -> Vec<&'static str> {
                vec![$($text,)+ "unknown"]
            }

            pub fn is_known(&self) -> bool {
                *self != $name::Unknown
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                match normalize_token(&raw).as_str() {
                    $($text $(| $alias)* => $name::$variant,)+
                    _ => $name::Unknown,
                }
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// Market / lifecycle status
    EntityStatus {
        Approved => "approved" | "marketed" | "launched",
        Investigational => "investigational" | "in_development" | "active",
        Discontinued => "discontinued" | "terminated" | "halted",
        Withdrawn => "withdrawn",
    }
}

vocabulary! {
    /// Modality of the entity
    EntityClassification {
        SmallMolecule => "small_molecule",
        Biologic => "biologic" | "antibody" | "monoclonal_antibody" | "protein",
        CellTherapy => "cell_therapy",
        GeneTherapy => "gene_therapy",
        Vaccine => "vaccine",
        Device => "device" | "medical_device",
        Other => "other",
    }
}

vocabulary! {
    /// Furthest development phase reached
    DevelopmentPhase {
        Preclinical => "preclinical" | "discovery",
        Phase1 => "phase_1" | "phase1" | "phase_i",
        Phase2 => "phase_2" | "phase2" | "phase_ii",
        Phase3 => "phase_3" | "phase3" | "phase_iii",
        Filed => "filed" | "submitted" | "under_review",
        Approved => "approved" | "marketed",
    }
}

vocabulary! {
    /// How the entity is administered
    AdministrationRoute {
        Oral => "oral",
        Intravenous => "intravenous" | "iv",
        Subcutaneous => "subcutaneous" | "sc",
        Intramuscular => "intramuscular" | "im",
        Topical => "topical",
        Inhaled => "inhaled" | "inhalation",
        Intranasal => "intranasal" | "nasal",
        Other => "other",
    }
}

/// Lowercase, collapse separators to `_`: "Phase II" → "phase_ii".
fn normalize_token(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// A dated development
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordEvent {
    pub text: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Everything known about one entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: EntityStatus,
    #[serde(default)]
    pub classification: EntityClassification,
    #[serde(default, deserialize_with = "lenient_text")]
    pub organization: Option<String>,
    #[serde(default)]
    pub phase: DevelopmentPhase,
    #[serde(default)]
    pub administration_route: AdministrationRoute,
    #[serde(default, deserialize_with = "lenient_text")]
    pub mechanism: Option<String>,
    #[serde(default)]
    pub events: Vec<RecordEvent>,
    #[serde(default)]
    pub references: Vec<String>,
}

/// Treat empty strings and "unknown"/"n/a" as absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|text| {
        let trimmed = text.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "unknown" | "n/a" | "none" | "null" => None,
            _ => Some(trimmed.to_string()),
        }
    }))
}

impl Record {
    /// A record carrying only a name.
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Deterministic reconciliation used when the merge call fails.
    ///
    /// Enumerations take the first known value (phase takes the furthest),
    /// text fields the first present value, events and references are unioned
    /// in fragment order.
    pub fn merge_fragments(name: &str, fragments: &[Record]) -> Record {
        let mut merged = Record::unknown(name);

        let first_known = |pick: fn(&Record) -> bool| fragments.iter().find(|f| pick(f));
        if let Some(f) = first_known(|f| f.status.is_known()) {
            merged.status = f.status;
        }
        if let Some(f) = first_known(|f| f.classification.is_known()) {
            merged.classification = f.classification;
        }
        if let Some(f) = first_known(|f| f.administration_route.is_known()) {
            merged.administration_route = f.administration_route;
        }
        merged.phase = fragments
            .iter()
            .map(|f| f.phase)
            .filter(DevelopmentPhase::is_known)
            .max()
            .unwrap_or_default();
        merged.organization = fragments.iter().find_map(|f| f.organization.clone());
        merged.mechanism = fragments.iter().find_map(|f| f.mechanism.clone());

        let events: IndexSet<RecordEvent> =
            fragments.iter().flat_map(|f| f.events.iter().cloned()).collect();
        merged.events = events.into_iter().collect();
        merged.add_references(fragments.iter().flat_map(|f| f.references.iter().cloned()));

        merged
    }

    /// Append references not already present.
    pub fn add_references(&mut self, urls: impl IntoIterator<Item = String>) {
        let mut all: IndexSet<String> = self.references.drain(..).collect();
        all.extend(urls.into_iter().filter(|url| !url.trim().is_empty()));
        self.references = all.into_iter().collect();
    }

    /// Number of populated fields beyond the name.
    pub fn known_fields(&self) -> usize {
        [
            self.status.is_known(),
            self.classification.is_known(),
            self.organization.is_some(),
            self.phase.is_known(),
            self.administration_route.is_known(),
            self.mechanism.is_some(),
            !self.events.is_empty(),
            !self.references.is_empty(),
        ]
        .iter()
        .filter(|known| **known)
        .count()
    }
}

impl StructuredOutput for Record {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "status": { "type": "string", "enum": EntityStatus::values() },
                "classification": { "type": "string", "enum": EntityClassification::values() },
                "organization": {
                    "type": "string",
                    "description": "Company or institution developing the entity, or \"unknown\""
                },
                "phase": { "type": "string", "enum": DevelopmentPhase::values() },
                "administration_route": { "type": "string", "enum": AdministrationRoute::values() },
                "mechanism": {
                    "type": "string",
                    "description": "Mechanism of action in one or two sentences, or \"unknown\""
                },
                "events": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "text": { "type": "string" },
                            "date": {
                                "type": "string",
                                "description": "ISO date or year if known"
                            },
                            "source": {
                                "type": "string",
                                "description": "URL supporting the event"
                            }
                        },
                        "required": ["text"]
                    }
                },
                "references": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["name", "status", "classification", "phase", "administration_route"]
        })
    }
}

/// Named entities found in discovery results
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityList {
    #[serde(default)]
    pub entities: Vec<String>,
}

impl StructuredOutput for EntityList {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "entities": {
                    "type": "array",
                    "description": "Names of distinct entities exactly as written in the sources",
                    "items": { "type": "string" }
                }
            },
            "required": ["entities"]
        })
    }
}
