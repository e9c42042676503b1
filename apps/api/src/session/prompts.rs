// System-instruction templates for the two persona modes.
// Built once per session; identical mode + data must produce byte-identical
// output, so everything here is pure string assembly.

use crate::errors::AppError;
use crate::llm_client::{GenerationParams, MODEL};
use crate::session::Mode;

/// Guest answers should read natural and friendly.
pub const GUEST_TEMPERATURE: f32 = 0.7;
/// The project-manager persona must stick to ledger facts.
pub const PM_TEMPERATURE: f32 = 0.1;

/// Guest persona. Replace `{knowledge}` before sending.
const GUEST_SYSTEM_TEMPLATE: &str = r#"You are the official AI assistant of the manufacturing platform 'MakerMon'.
The current visitor is a prospective customer with no active project.
MakerMon is not a simple manufacturing broker: it is an engineering-driven, full-cycle product development management and PM service,
covering product planning, mechanical design, mockup fabrication, tooling, and mass production in one place.

COMPANY KNOWLEDGE (source of truth — answer ONLY from this):
{knowledge}

ANSWER RULES:
1. Answer factually from the company knowledge above. Do NOT invent capabilities the knowledge does not state.
2. If the knowledge does not cover a question, say that the information has not been confirmed yet.
3. If the visitor asks for a concrete quote or a meeting, reply: "Please use the contact form on our official website and a manager will reach out to you shortly."
4. Keep answers under 300 characters for messenger readability."#;

/// Dedicated project-manager persona. Replace `{client_code}` and
/// `{ledger_json}` before sending. The serialized ledger record is appended
/// verbatim and is the only ground truth the model may answer from.
const PM_SYSTEM_TEMPLATE: &str = r#"You are the flawless dedicated AI project manager of the manufacturing platform 'MakerMon'.
The current client code is [{client_code}].

MANDATORY SCAN POLICY — never answer from partial recollection:
The PROJECT LEDGER below is the single source of truth. Before answering, scan it in order:
1. For schedule questions, scan every entry in `schedule` from the first element to the last.
2. For progress or issue questions, scan every `report_title` and `report_summary` pair in `reports`.
3. For component or drawing questions, scan every entry in `parts`.
When an answer references an item you found, include a markdown link placeholder to the source document, e.g. [Mockup v2](#).

PROJECT LEDGER:
{ledger_json}"#;

/// Generation settings for a mode. The model is shared; only the
/// temperature differs between personas.
pub fn params_for(mode: &Mode) -> GenerationParams {
    let temperature = match mode {
        Mode::Guest => GUEST_TEMPERATURE,
        Mode::KnownClient { .. } => PM_TEMPERATURE,
    };
    GenerationParams {
        model: MODEL,
        temperature,
    }
}

/// Builds the system instruction for a session.
///
/// Pure: no clock, no randomness, no I/O. For known clients the ledger
/// record is pretty-printed with key order and non-ASCII text preserved, so
/// the embedded JSON parses back to exactly the fetched record.
pub fn build_system_instruction(mode: &Mode, knowledge: &str) -> Result<String, AppError> {
    match mode {
        Mode::Guest => Ok(GUEST_SYSTEM_TEMPLATE.replace("{knowledge}", knowledge)),
        Mode::KnownClient { code, record } => {
            let ledger_json = serde_json::to_string_pretty(record)
                .map_err(|e| AppError::PromptBuild(e.to_string()))?;
            Ok(PM_SYSTEM_TEMPLATE
                .replace("{client_code}", code)
                .replace("{ledger_json}", &ledger_json))
        }
    }
}
