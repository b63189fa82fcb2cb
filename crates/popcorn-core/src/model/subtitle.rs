use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Language of a subtitle, including the two special non-language values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubtitleLanguage {
    /// Subtitles are disabled.
    None,
    /// A subtitle file picked by the user.
    Custom,
    /// `ar`
    #[serde(rename = "ar")]
    Arabic,
    /// `bg`
    #[serde(rename = "bg")]
    Bulgarian,
    /// `cs`
    #[serde(rename = "cs")]
    Czech,
    /// `da`
    #[serde(rename = "da")]
    Danish,
    /// `de`
    #[serde(rename = "de")]
    German,
    /// `el`
    #[serde(rename = "el")]
    ModernGreek,
    /// `en`
    #[serde(rename = "en")]
    English,
    /// `es`
    #[serde(rename = "es")]
    Spanish,
    /// `fi`
    #[serde(rename = "fi")]
    Finnish,
    /// `fr`
    #[serde(rename = "fr")]
    French,
    /// `hu`
    #[serde(rename = "hu")]
    Hungarian,
    /// `it`
    #[serde(rename = "it")]
    Italian,
    /// `nl`
    #[serde(rename = "nl")]
    Dutch,
    /// `no`
    #[serde(rename = "no")]
    Norwegian,
    /// `pl`
    #[serde(rename = "pl")]
    Polish,
    /// `pt`
    #[serde(rename = "pt")]
    Portuguese,
    /// `pt-br`
    #[serde(rename = "pt-br")]
    PortugueseBrazil,
    /// `ro`
    #[serde(rename = "ro")]
    Romanian,
    /// `ru`
    #[serde(rename = "ru")]
    Russian,
    /// `sv`
    #[serde(rename = "sv")]
    Swedish,
    /// `tr`
    #[serde(rename = "tr")]
    Turkish,
    /// `uk`
    #[serde(rename = "uk")]
    Ukrainian,
}

impl SubtitleLanguage {
    /// Identifier code of the language (`none`, `custom` or an ISO 639-1 code).
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Custom => "custom",
            Self::Arabic => "ar",
            Self::Bulgarian => "bg",
            Self::Czech => "cs",
            Self::Danish => "da",
            Self::German => "de",
            Self::ModernGreek => "el",
            Self::English => "en",
            Self::Spanish => "es",
            Self::Finnish => "fi",
            Self::French => "fr",
            Self::Hungarian => "hu",
            Self::Italian => "it",
            Self::Dutch => "nl",
            Self::Norwegian => "no",
            Self::Polish => "pl",
            Self::Portuguese => "pt",
            Self::PortugueseBrazil => "pt-br",
            Self::Romanian => "ro",
            Self::Russian => "ru",
            Self::Swedish => "sv",
            Self::Turkish => "tr",
            Self::Ukrainian => "uk",
        }
    }
}

impl Display for SubtitleLanguage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Describes an available subtitle for a media item or file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubtitleInfo {
    /// IMDB identifier of the media the subtitle belongs to.
    pub imdb_id: Option<String>,
    /// Language of the subtitle.
    pub language: SubtitleLanguage,
}

impl SubtitleInfo {
    /// Subtitle info for the given media and language.
    pub fn new(imdb_id: impl Into<String>, language: SubtitleLanguage) -> Self {
        Self {
            imdb_id: Some(imdb_id.into()),
            language,
        }
    }

    /// The "no subtitle" sentinel.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            imdb_id: None,
            language: SubtitleLanguage::None,
        }
    }

    /// The "custom subtitle" sentinel.
    #[must_use]
    pub const fn custom() -> Self {
        Self {
            imdb_id: None,
            language: SubtitleLanguage::Custom,
        }
    }

    /// Whether this is the "no subtitle" sentinel.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.language == SubtitleLanguage::None
    }

    /// Whether this is one of the special non-language entries.
    #[must_use]
    pub fn is_special(&self) -> bool {
        matches!(
            self.language,
            SubtitleLanguage::None | SubtitleLanguage::Custom
        )
    }
}

/// Hints used to pick the best file of a subtitle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleMatcher {
    /// Name of the media file being played.
    pub name: Option<String>,
    /// Quality label such as `720p`.
    pub quality: Option<String>,
}

impl SubtitleMatcher {
    /// Matcher built from the torrent filename and an optional quality label.
    pub fn from_filename(filename: impl Into<String>, quality: Option<&str>) -> Self {
        Self {
            name: Some(filename.into()),
            quality: quality.map(str::to_string),
        }
    }
}

/// Parsed subtitle ready for playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtitle {
    /// Info the subtitle was downloaded for.
    pub info: SubtitleInfo,
    /// Local file holding the subtitle.
    pub file: String,
    /// Number of parsed cues.
    pub cue_count: usize,
}

impl Subtitle {
    /// The empty subtitle which disables subtitle rendering.
    #[must_use]
    pub fn none() -> Self {
        Self {
            info: SubtitleInfo::none(),
            file: String::new(),
            cue_count: 0,
        }
    }

    /// Whether this subtitle disables rendering.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.info.is_none()
    }
}

/// User preference applied when choosing a subtitle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "language", rename_all = "snake_case")]
pub enum SubtitlePreference {
    /// Prefer the given language.
    Language(SubtitleLanguage),
    /// Subtitles are disabled by the user.
    Disabled,
}

impl SubtitlePreference {
    /// Pick a subtitle from `available`.
    ///
    /// Order: the preferred language, then the default language, then the
    /// interface language. Special entries never match.
    #[must_use]
    pub fn select(
        self,
        available: &[SubtitleInfo],
        default_language: SubtitleLanguage,
        interface_language: SubtitleLanguage,
    ) -> SubtitleInfo {
        let Self::Language(preferred) = self else {
            return SubtitleInfo::none();
        };
        let find = |language: SubtitleLanguage| {
            available
                .iter()
                .filter(|info| !info.is_special())
                .find(|info| info.language == language)
        };

        find(preferred)
            .or_else(|| find(default_language))
            .or_else(|| find(interface_language))
            .cloned()
            .unwrap_or_else(SubtitleInfo::none)
    }
}
