use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmojiStyle {
    None,
    Minimal,
    Moderate,
    Enthusiastic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Professional,
    Casual,
    Enthusiastic,
    Conversational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtaStyle {
    Direct,
    Question,
    Intriguing,
    BenefitFocused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthTarget {
    Concise,
    Medium,
    Full,
}

impl LengthTarget {
    pub fn chars(&self) -> usize {
        match self {
            LengthTarget::Concise => 180,
            LengthTarget::Medium => 220,
            LengthTarget::Full => 280,
        }
    }
}

/// The per-run bag of style choices fed into the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleParams {
    pub emoji: EmojiStyle,
    pub tone: Tone,
    pub cta: CtaStyle,
    pub length: LengthTarget,
    pub include_hashtags: bool,
}

fn pick<T: Copy, R: Rng + ?Sized>(rng: &mut R, options: &[T]) -> T {
    options[rng.random_range(0..options.len())]
}

impl StyleParams {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        StyleParams {
            emoji: pick(
                rng,
                &[EmojiStyle::None, EmojiStyle::Minimal, EmojiStyle::Moderate, EmojiStyle::Enthusiastic],
            ),
            tone: pick(
                rng,
                &[Tone::Professional, Tone::Casual, Tone::Enthusiastic, Tone::Conversational],
            ),
            cta: pick(
                rng,
                &[CtaStyle::Direct, CtaStyle::Question, CtaStyle::Intriguing, CtaStyle::BenefitFocused],
            ),
            length: pick(rng, &[LengthTarget::Concise, LengthTarget::Medium, LengthTarget::Full]),
            include_hashtags: rng.random_bool(0.5),
        }
    }

    /// Prompt directives, one per line.
    pub fn instructions(&self) -> Vec<String> {
        let emoji = match self.emoji {
            EmojiStyle::None => "- Use no emojis",
            EmojiStyle::Minimal => "- Use exactly 1 emoji, placed naturally",
            EmojiStyle::Moderate => "- Use 2-3 emojis maximum, placed naturally",
            EmojiStyle::Enthusiastic => "- Use 3+ emojis to show enthusiasm",
        };

        let tone = match self.tone {
            Tone::Professional => "- Professional, authoritative tone",
            Tone::Casual => "- Casual, friendly tone",
            Tone::Enthusiastic => "- Enthusiastic, energetic tone",
            Tone::Conversational => "- Conversational, approachable tone",
        };

        let cta = match self.cta {
            CtaStyle::Direct => "- Direct call-to-action (e.g., 'Read more:', 'Check it out:')",
            CtaStyle::Question => "- Use a question to create curiosity",
            CtaStyle::Intriguing => "- Create intrigue without giving everything away",
            CtaStyle::BenefitFocused => "- Focus on the benefit/value to the reader",
        };

        let length = match self.length {
            LengthTarget::Concise => "- Keep it concise, under 180 characters".to_string(),
            LengthTarget::Medium => "- Aim for around 220 characters".to_string(),
            LengthTarget::Full => format!("- Use the full {} character limit if needed", self.length.chars()),
        };

        let hashtags = if self.include_hashtags {
            "- Include 1-2 relevant hashtags"
        } else {
            "- No hashtags"
        };

        vec![emoji.to_string(), tone.to_string(), cta.to_string(), length, hashtags.to_string()]
    }

    pub fn to_json(&self) -> String {
        // Plain enums and a bool: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn same_seed_same_style() {
        let a = StyleParams::random(&mut StdRng::seed_from_u64(7));
        let b = StyleParams::random(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn random_styles_cover_every_length() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(StyleParams::random(&mut rng).length.chars());
        }
        assert_eq!(seen, [180, 220, 280].into_iter().collect());
    }

    #[test]
    fn instructions_follow_choices() {
        let style = StyleParams {
            emoji: EmojiStyle::None,
            tone: Tone::Casual,
            cta: CtaStyle::Question,
            length: LengthTarget::Concise,
            include_hashtags: false,
        };

        let lines = style.instructions();
        assert_eq!(lines.len(), 5);
        assert!(lines.contains(&"- Use no emojis".to_string()));
        assert!(lines.contains(&"- Casual, friendly tone".to_string()));
        assert!(lines.contains(&"- No hashtags".to_string()));
        assert!(lines.iter().any(|l| l.contains("180")));
    }

    #[test]
    fn json_uses_snake_case() {
        let style = StyleParams {
            emoji: EmojiStyle::Moderate,
            tone: Tone::Conversational,
            cta: CtaStyle::BenefitFocused,
            length: LengthTarget::Full,
            include_hashtags: true,
        };

        let json = style.to_json();
        assert!(json.contains("\"benefit_focused\""));
        let back: StyleParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, style);
    }
}
