/// Instruction sent with the PDF to the vision model. Asks for a faithful
/// transcription; structuring happens in the second stage.
pub const OCR_PROMPT: &str = "\
You are given a credit card statement as a PDF. Transcribe its full content \
faithfully. Keep every table row, preserve dates, merchant names, coupon \
numbers, installment markers (e.g. 03/06) and amounts exactly as printed, \
including currency indicators (ARS, $, USD, U$S). Do not summarize, do not \
skip rows, do not invent values. Output plain text only.";

/// Builds the second-stage prompt that turns a transcription into statement
/// JSON. The schema mirrors the structured statement type field for field.
pub fn statement_prompt(ocr_text: &str) -> String {
    format!(
        "Below is the transcribed text of a credit card statement. Convert it \
into a single JSON object with exactly this shape:\n\
{{\n\
  \"statement_id\": string,\n\
  \"card\": {{\"last_four\": string, \"holder_name\": string}} | null,\n\
  \"period\": {{\"start\": \"YYYY-MM-DD\", \"end\": \"YYYY-MM-DD\", \"due_date\": \"YYYY-MM-DD\", \"next_cycle_start\": \"YYYY-MM-DD\" | null}},\n\
  \"previous_balance\": [{{\"amount\": string, \"currency\": \"ARS\"|\"USD\"}}],\n\
  \"current_balance\": [{{\"amount\": string, \"currency\": \"ARS\"|\"USD\"}}],\n\
  \"minimum_payment\": [{{\"amount\": string, \"currency\": \"ARS\"|\"USD\"}}],\n\
  \"credit_limit\": {{\"amount\": string, \"currency\": string}} | null,\n\
  \"transactions\": [{{\"date\": \"YYYY-MM-DD\", \"merchant\": string, \"coupon\": string | null, \"amount\": {{\"amount\": string, \"currency\": string}}, \"installment\": {{\"current\": int, \"total\": int}} | null}}]\n\
}}\n\
Rules: amounts use '.' as decimal separator with no thousands separators; \
negative amounts keep their sign; statements usually carry one balance per \
currency; omit transactions you cannot read rather than guessing. Respond \
with the JSON object only, no commentary.\n\n\
Transcription:\n{ocr_text}"
    )
}

/// Drops a surrounding markdown code fence, if present. Models often wrap
/// JSON in ```json fences despite instructions.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}
