use serde::{Deserialize, Serialize};

/// Generation capability offered by a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Translation,
    Emotion,
    Image,
    Video,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 4] = [
        CapabilityKind::Translation,
        CapabilityKind::Emotion,
        CapabilityKind::Image,
        CapabilityKind::Video,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Translation => "translation",
            Self::Emotion => "emotion",
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Whether failures on this card may show the raw provider text.
    pub fn shows_raw_diagnostics(self) -> bool {
        matches!(self, Self::Translation | Self::Emotion)
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Fr,
    Es,
    De,
    Ru,
    Zh,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::En,
        Language::Fr,
        Language::Es,
        Language::De,
        Language::Ru,
        Language::Zh,
    ];

    /// Intermediate language non-English targets are routed through.
    pub const PIVOT: Language = Language::En;

    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Fr => "fr",
            Self::Es => "es",
            Self::De => "de",
            Self::Ru => "ru",
            Self::Zh => "zh",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Fr => "French",
            Self::Es => "Spanish",
            Self::De => "German",
            Self::Ru => "Russian",
            Self::Zh => "Chinese",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let normalized = code.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|language| language.code() == normalized)
    }

    pub fn is_pivot(self) -> bool {
        self == Self::PIVOT
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::PIVOT
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::{CapabilityKind, Language};

    #[test]
    fn language_codes_round_trip_through_lookup() {
        for language in Language::ALL {
            assert_eq!(Language::from_code(language.code()), Some(language));
        }
        assert_eq!(Language::from_code(" FR "), Some(Language::Fr));
        assert_eq!(Language::from_code("pt"), None);
    }

    #[test]
    fn english_is_the_only_pivot() {
        let pivots: Vec<Language> = Language::ALL
            .into_iter()
            .filter(|language| language.is_pivot())
            .collect();
        assert_eq!(pivots, vec![Language::En]);
        assert_eq!(Language::default(), Language::En);
    }

    #[test]
    fn only_text_capabilities_show_raw_diagnostics() {
        assert!(CapabilityKind::Translation.shows_raw_diagnostics());
        assert!(CapabilityKind::Emotion.shows_raw_diagnostics());
        assert!(!CapabilityKind::Image.shows_raw_diagnostics());
        assert!(!CapabilityKind::Video.shows_raw_diagnostics());
        assert_eq!(CapabilityKind::Video.to_string(), "video");
    }
}
