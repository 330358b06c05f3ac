//! Prompt templates for the vision-language model

/// Instruction used to caption every sampled frame when the user gives none
pub const DEFAULT_FRAME_PROMPT: &str = "\
You are an intelligent traffic monitoring assistant. Analyze this traffic scene image and identify:
1. Vehicle movements (e.g., turning left/right, going straight, waiting at signal).
2. Pedestrian activities (e.g., crossing the road, waiting at zebra crossing).
3. Traffic light status (red, yellow, green) and its position.
4. Any traffic rule violations, such as:
   - Vehicle running a red light
   - Pedestrian crossing on red signal
   - Vehicle blocking a pedestrian crossing
   - Illegal U-turns

Describe each finding clearly and mention the timestamp or frame number (if available). Your response should be structured as:
- **Timestamp/frame**: [e.g., 00:01:30]
  - **Vehicle Activity**: ...
  - **Pedestrian Activity**: ...
  - **Traffic Light**: ...
  - **Violations**: ...

Be concise and accurate.";

/// Message shown when retrieval finds nothing
pub const NO_RELEVANT_FRAME: &str = "No relevant frame found.";

/// Follow-up prompt asking for a safety analysis of a retrieved frame
pub fn safety_analysis_prompt(caption: &str) -> String {
    format!(
        "This scene shows: {caption}\n\n\
         Please summarize this situation, identify safety concerns, and explain possible outcomes."
    )
}
