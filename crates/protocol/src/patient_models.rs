//! Subject input models.
//!
//! Vitals are kept as the strings the subject reported ("200/100", "95")
//! so the reasoning stages see exactly what was entered.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A single historical vitals reading.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct VitalsReading {
    /// Reading time, formatted `YYYY-MM-DD HH:MM`.
    pub date: String,
    pub bp: String,
    pub hr: String,
    pub sugar: String,
}

/// Patient health data fed into the first stage.
///
/// # Example
///
/// ```yaml
/// name: Jane Doe
/// age: 55
/// gender: Female
/// blood_pressure: "200/100"
/// heart_rate: "95"
/// blood_sugar: "100"
/// meds_taken: false
/// known_conditions: history of high BP
/// reported_symptoms: difficulties in breathing
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct PatientData {
    pub name: String,

    #[serde(default)]
    pub age: Option<u32>,

    #[serde(default)]
    pub gender: Option<String>,

    #[serde(default)]
    pub blood_pressure: Option<String>,

    #[serde(default)]
    pub heart_rate: Option<String>,

    #[serde(default)]
    pub blood_sugar: Option<String>,

    #[serde(default)]
    pub meds_taken: Option<bool>,

    #[serde(default)]
    pub known_conditions: Option<String>,

    #[serde(default, alias = "initial_symptoms")]
    pub reported_symptoms: Option<String>,

    #[serde(default, alias = "recent_vitals_history")]
    pub history: Vec<VitalsReading>,
}

impl PatientData {
    /// True when the subject reported no symptoms at all.
    pub fn has_no_symptoms(&self) -> bool {
        match self.reported_symptoms.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(s) => s.eq_ignore_ascii_case("none"),
        }
    }

    /// Render the data block every stage receives.
    ///
    /// Missing values are written as `None` so the stage instructions can
    /// tell the model to report them as not provided.
    pub fn to_prompt_block(&self) -> String {
        fn field<T: ToString>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "None".to_string())
        }

        let history = serde_json::to_string_pretty(&self.history)
            .unwrap_or_else(|_| "[]".to_string());

        format!(
            "Analyze this PATIENT DATA:\n\n\
             [CURRENT VITALS]\n\
             Name: {}\n\
             Age: {}\n\
             Gender: {}\n\
             Blood Pressure: {}\n\
             Heart Rate: {}\n\
             Blood Sugar: {}\n\
             Meds Taken: {}\n\
             Known Conditions: {}\n\
             Reported Symptoms: {}\n\n\
             [RECENT VITALS HISTORY]\n\
             {}",
            self.name,
            field(&self.age),
            field(&self.gender),
            field(&self.blood_pressure),
            field(&self.heart_rate),
            field(&self.blood_sugar),
            field(&self.meds_taken),
            field(&self.known_conditions),
            field(&self.reported_symptoms),
            history,
        )
    }
}
