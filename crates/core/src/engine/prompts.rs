//! Built-in stage instructions and prompt assembly.

use vf_protocol::patient_models::PatientData;
use vf_protocol::run_models::{Stage, StageResult};

/// Appended to every stage instruction.
pub const BASELINE_POLICY: &str = "BASELINE POLICY: If the patient reports no symptoms \
and every vital sign in [CURRENT VITALS] is within normal limits, the patient is healthy. \
Do not ask the patient any questions, the risk level is LOW and the action is MONITOR. \
Use only values present in [ORIGINAL PATIENT DATA]; never invent readings or history.";

/// Appended to every stage instruction after the baseline policy.
pub const OUTPUT_RULE: &str = "OUTPUT FORMAT RULE: Return only the raw JSON object described \
above. Use \\n for newlines inside strings.";

/// Label of the block carrying the subject's data.
pub const ORIGINAL_DATA_LABEL: &str = "ORIGINAL PATIENT DATA";

/// Instruction used when no agent definition supplies one.
pub fn default_instruction(stage: Stage) -> &'static str {
    match stage {
        Stage::VitalAnalysis => {
            "Compare the [CURRENT VITALS] against standard medical thresholds \
(BP 120/80, HR 60-100, fasting blood sugar 70-100).\n\
1. Use only the numbers provided. If a field is empty or 'None', state 'NOT PROVIDED'.\n\
2. If [RECENT VITALS HISTORY] is empty, assume no history and do not invent one.\n\
3. Compare current vitals to history only if history exists.\n\
4. Determine severity (NORMAL, WARNING, CRITICAL) strictly from the provided numbers.\n\
Return a JSON object: {\"status\": \"NORMAL | WARNING | CRITICAL\", \
\"abnormal_findings\": [], \"trend_analysis\": \"...\", \"requires_symptom_check\": true}"
        }
        Stage::SymptomInquiry => {
            "Based on the vital analysis and any reported symptoms, decide whether follow-up \
questions are needed.\n\
1. If [CONTEXT - VITAL ANALYSIS] is NORMAL and no symptoms are reported, do not ask questions \
and return \"symptom_summary\": \"No symptoms reported, patient healthy\".\n\
2. If there are reported symptoms or abnormal vitals, use the ask_patient tool to verify their \
severity. Do not ask about anything [ORIGINAL PATIENT DATA] already answers.\n\
3. Stop after at most 3 questions, or immediately for a clear emergency.\n\
Return a JSON object: {\"symptom_summary\": \"...\", \"follow_up_questions_asked\": [], \
\"patient_responses\": []}"
        }
        Stage::ContextAggregation => {
            "Combine the vital analysis and the symptom inquiry into one clinical summary. \
Highlight correlations between vitals and symptoms and list the key risk factors.\n\
1. If the inquiry found no symptoms and vitals are NORMAL, the summary must describe a healthy patient.\n\
2. Never invent vitals reported as NOT PROVIDED.\n\
Return a JSON object: {\"clinical_summary\": \"...\", \"key_risk_factors\": [], \
\"trend\": \"Stable | Worsening | Improving\"}"
        }
        Stage::RiskAssessment => {
            "Evaluate the aggregated clinical context and determine the overall health risk.\n\
1. If the aggregation reports no symptoms and NORMAL vitals, the risk level must be LOW.\n\
2. If BP is below 130/85, the risk cannot be HIGH unless severe symptoms exist.\n\
3. The justification must cover patient context, history, symptoms, a vital signs evaluation \
citing the numbers, potential conditions and the rationale for the level.\n\
Return a JSON object: {\"risk_level\": \"LOW | MODERATE | HIGH | CRITICAL\", \
\"risk_score\": 0, \"justification\": \"...\", \"requires_immediate_action\": false}"
        }
        Stage::DecisionAction => {
            "Based on the risk assessment, decide the next operational step. The doctor_note \
must be a standalone briefing with patient demographics, chief complaint, history, exact vitals, \
the suspected condition and the recommended action.\n\
Return a JSON object: {\"action\": \"MONITOR | ALERT_DOCTOR | EMERGENCY\", \
\"urgency\": \"Normal | High | Critical\", \"doctor_note\": \"...\"}"
        }
    }
}

/// Full instruction for a stage: the stage text followed by the shared rules.
pub fn stage_instruction(stage_text: &str) -> String {
    format!("{}\n\n{}\n\n{}", stage_text.trim_end(), BASELINE_POLICY, OUTPUT_RULE)
}

/// Context handed to a stage: the original data followed by every prior
/// stage's raw output, verbatim, each in a labelled block.
pub fn build_context(patient: &PatientData, prior: &[StageResult]) -> String {
    let mut context = format!("[{}]:\n{}", ORIGINAL_DATA_LABEL, patient.to_prompt_block());

    for result in prior {
        context.push_str(&format!(
            "\n\n[{}]:\n{}",
            result.stage.context_label(),
            result.raw
        ));
    }

    context
}
