//! Classifier label post-processing.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::runtime::LabelScore;

pub const UNKNOWN_TONE: &str = "Unknown";

/// Map a raw classifier label such as `LABEL_2` to its tone name.
///
/// The class id is the integer after the last `_` (the whole label when
/// there is none). Any integer absent from `labels`, negative or too large
/// included, becomes [`UNKNOWN_TONE`].
pub fn translate_tone_label(raw: &str, labels: &BTreeMap<String, String>) -> Result<String> {
    let suffix = raw.rsplit('_').next().unwrap_or(raw).trim();
    let id = match suffix.parse::<i64>() {
        Ok(id) => id,
        Err(_) if is_integer(suffix) => return Ok(UNKNOWN_TONE.to_string()),
        Err(_) => {
            return Err(Error::InferenceError(format!(
                "Unexpected tone label '{}'",
                raw
            )))
        }
    };

    Ok(labels
        .get(&id.to_string())
        .cloned()
        .unwrap_or_else(|| UNKNOWN_TONE.to_string()))
}

fn is_integer(s: &str) -> bool {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Translate every label of a tone prediction, keeping order and scores.
pub fn translate_tones(
    predictions: Vec<LabelScore>,
    labels: &BTreeMap<String, String>,
) -> Result<Vec<LabelScore>> {
    predictions
        .into_iter()
        .map(|p| {
            Ok(LabelScore {
                label: translate_tone_label(&p.label, labels)?,
                score: p.score,
            })
        })
        .collect()
}

/// Fold OCEAN predictions into a trait name to score map.
pub fn ocean_scores(predictions: &[LabelScore]) -> BTreeMap<String, f32> {
    predictions
        .iter()
        .map(|p| (p.label.clone(), p.score))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_tone_labels;

    #[test]
    fn translates_known_and_unknown_ids() {
        let labels = default_tone_labels();
        assert_eq!(translate_tone_label("LABEL_3", &labels).unwrap(), "Casual");
        assert_eq!(translate_tone_label("LABEL_0", &labels).unwrap(), "Positive");
        assert_eq!(translate_tone_label("LABEL_9", &labels).unwrap(), "Unknown");
        assert_eq!(translate_tone_label("2", &labels).unwrap(), "Inquisitive");
    }

    #[test]
    fn leading_zeros_resolve_to_the_same_id() {
        let labels = default_tone_labels();
        assert_eq!(translate_tone_label("LABEL_01", &labels).unwrap(), "Agitated");
    }

    #[test]
    fn negative_and_oversized_ids_are_unknown() {
        let labels = default_tone_labels();
        assert_eq!(translate_tone_label("LABEL_-1", &labels).unwrap(), "Unknown");
        assert_eq!(
            translate_tone_label("LABEL_99999999999999999999999", &labels).unwrap(),
            "Unknown"
        );
    }

    #[test]
    fn non_numeric_label_is_an_error() {
        let labels = default_tone_labels();
        let err = translate_tone_label("POSITIVE", &labels).unwrap_err();
        assert!(matches!(err, Error::InferenceError(_)));
    }

    #[test]
    fn translate_tones_keeps_order_and_scores() {
        let labels = default_tone_labels();
        let translated = translate_tones(
            vec![
                LabelScore { label: "LABEL_1".into(), score: 0.8 },
                LabelScore { label: "LABEL_3".into(), score: 0.2 },
            ],
            &labels,
        )
        .unwrap();
        assert_eq!(translated[0].label, "Agitated");
        assert_eq!(translated[1].label, "Casual");
        assert_eq!(translated[1].score, 0.2);
    }

    #[test]
    fn ocean_scores_has_one_entry_per_trait() {
        let traits = ocean_scores(&[
            LabelScore { label: "Openness".into(), score: 0.4 },
            LabelScore { label: "Neuroticism".into(), score: 0.1 },
        ]);
        assert_eq!(traits.len(), 2);
        assert_eq!(traits["Openness"], 0.4);
    }
}
