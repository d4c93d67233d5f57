use std::collections::BTreeMap;

use crate::matcher::MatchResult;

pub const INCONCLUSIVE: &str = "Classification inconclusive or unknown. Check the image quality.";

pub fn defaults() -> BTreeMap<String, Vec<String>> {
    let entries: [(&str, &[&str]); 3] = [
        (
            "healthy",
            &[
                "The leaf appears healthy. Continue normal watering and maintenance.",
                "Suggestion: Monitor regularly for new spots or changes.",
            ],
        ),
        (
            "rust",
            &[
                "Rust disease detected. This is often caused by fungus.",
                "Action: Remove infected leaves immediately. Apply a fungicidal spray containing copper or sulfur.",
            ],
        ),
        (
            "blight",
            &[
                "Blight disease detected. This can be fungal or bacterial.",
                "Action: Apply appropriate fungicide (if fungal) or bactericide. Improve air circulation and reduce overhead watering.",
            ],
        ),
    ];
    entries
        .iter()
        .map(|(label, lines)| {
            (
                label.to_string(),
                lines.iter().map(|l| l.to_string()).collect(),
            )
        })
        .collect()
}

/// Remedy text for a result, falling back to the inconclusive message.
pub fn lines<'a>(remedies: &'a BTreeMap<String, Vec<String>>, result: &MatchResult) -> Vec<&'a str> {
    result
        .category()
        .and_then(|c| remedies.get(c.as_str()))
        .filter(|text| !text.is_empty())
        .map(|text| text.iter().map(String::as_str).collect())
        .unwrap_or_else(|| vec![INCONCLUSIVE])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_category_has_remedy() {
        let remedies = defaults();
        let result = MatchResult::Matched {
            category: "rust".into(),
            score: 0.2,
        };
        let text = lines(&remedies, &result);
        assert_eq!(text.len(), 2);
        assert!(text[1].contains("copper or sulfur"));
    }

    #[test]
    fn unknown_and_unlisted_are_inconclusive() {
        let remedies = defaults();
        assert_eq!(lines(&remedies, &MatchResult::Unknown), vec![INCONCLUSIVE]);
        let result = MatchResult::Matched {
            category: "mildew".into(),
            score: 0.2,
        };
        assert_eq!(lines(&remedies, &result), vec![INCONCLUSIVE]);
    }
}
