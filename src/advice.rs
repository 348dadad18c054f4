//! Static next-steps guidance keyed by body-part label

use crate::render::escape_html;

const DEFAULT_ADVICE: &str = "
1. **Consult a Professional:** See a qualified doctor for an accurate diagnosis.
2. **Immobilize:** Try to keep the injured area still.
3. **Manage Swelling:** Applying a cold pack can help.";

const WRIST_ADVICE: &str = "
1. **Consult a Professional:** It's crucial to see an orthopedic specialist.
2. **Immobilize:** A temporary splint can help stabilize the wrist. Avoid moving your wrist or gripping objects.
3. **Elevate:** Keep your hand elevated above your heart to reduce swelling.";

const FINGER_ADVICE: &str = "
1. **Consult a Professional:** See a doctor to ensure proper healing.
2. **Buddy Taping:** You can gently tape the injured finger to an adjacent healthy finger to provide support.
3. **Ice:** Apply a cold pack for 15-20 minutes at a time.";

const SHOULDER_ADVICE: &str = "
1. **Consult a Professional:** Shoulder injuries can be complex; see a specialist.
2. **Immobilize:** Use a sling to keep your arm and shoulder from moving.
3. **Do Not Lift:** Avoid lifting any heavy objects or reaching overhead.";

const ELBOW_ADVICE: &str = "
1. **Consult a Professional:** Elbow injuries require careful evaluation.
2. **Immobilize:** Keep the arm stable in a comfortable position, possibly with a sling.
3. **Ice:** Apply a cold pack to the area to help with swelling and pain.";

/// Appended to every advice message.
pub const DISCLAIMER: &str = "<strong>Disclaimer:</strong> I am an AI assistant and not a medical professional. This is not a substitute for professional medical advice.";

/// Look up the guidance for a body part.
///
/// Labels match exactly and case-sensitively; anything unknown (including
/// `N/A`) falls back to the default guidance.
pub fn lookup(body_part: &str) -> &'static str {
    match body_part {
        "WRIST" => WRIST_ADVICE,
        "FINGER" => FINGER_ADVICE,
        "SHOULDER" => SHOULDER_ADVICE,
        "ELBOW" => ELBOW_ADVICE,
        _ => DEFAULT_ADVICE,
    }
}

/// The default guidance text
#[allow(dead_code)] // Used in tests
pub fn default_advice() -> &'static str {
    DEFAULT_ADVICE
}

/// Build the markup message shown after "What should I do next?".
///
/// The result is rendered as trusted markup, so the label is escaped.
pub fn next_steps_message(body_part: &str) -> String {
    format!(
        "**General Advice for a {} Injury:**<br>{}<br><br>{DISCLAIMER}",
        escape_html(body_part),
        lookup(body_part)
    )
}
