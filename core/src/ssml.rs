//! Speech Synthesis Markup Language documents in the dialect the Azure speech service accepts.
//!
//! The object graph mirrors the vendor schema: a `<speak>` root with exactly one `<voice>`,
//! whose content is an ordered mix of raw text, `<prosody>` elements and
//! `<mstts:express-as>` elements. Serialization never writes an XML declaration and never
//! generates namespace prefixes other than `mstts`, the synthesis elements stay unprefixed
//! under the default namespace.
use std::fmt::{self, Write};

use oxilangtag::LanguageTag;

use crate::SpeechError;

pub const SYNTHESIS_NAMESPACE: &str = "http://www.w3.org/2001/10/synthesis";
pub const MSTTS_NAMESPACE: &str = "http://www.w3.org/2001/mstts";
pub const SSML_VERSION: &str = "1.0";

/// Build a serialized SSML document for one voice.
///
/// Segments with any prosody attribute become `<prosody>` elements, segments without are
/// written as raw text. A segment's `style` wraps it into `<mstts:express-as>`.
pub fn build(
    voice_name: &str,
    language: &str,
    segments: impl IntoIterator<Item = Segment>,
) -> Result<String, SpeechError> {
    Ok(Speak::new(voice_name, language, segments)?.to_string())
}

/// One piece of text to synthesize, optionally with prosody and an expressive style.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub pitch: Option<String>,
    pub rate: Option<String>,
    pub volume: Option<String>,
    pub style: Option<String>,
}

impl Segment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_pitch(mut self, pitch: impl Into<String>) -> Self {
        self.pitch = Some(pitch.into());
        self
    }

    #[must_use]
    pub fn with_rate(mut self, rate: impl Into<String>) -> Self {
        self.rate = Some(rate.into());
        self
    }

    #[must_use]
    pub fn with_volume(mut self, volume: impl Into<String>) -> Self {
        self.volume = Some(volume.into());
        self
    }

    #[must_use]
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn has_prosody(&self) -> bool {
        self.pitch.is_some() || self.rate.is_some() || self.volume.is_some()
    }

    fn into_content(self) -> VoiceContent {
        let has_prosody = self.has_prosody();
        let Segment {
            text,
            pitch,
            rate,
            volume,
            style,
        } = self;

        let inner = if has_prosody {
            VoiceContent::Prosody(Prosody {
                pitch,
                rate,
                volume,
                text,
            })
        } else {
            VoiceContent::Text(text)
        };

        match style {
            Some(style) => VoiceContent::ExpressAs(ExpressAs {
                style,
                content: vec![inner],
            }),
            None => inner,
        }
    }
}

/// The `<speak>` root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Speak {
    pub version: String,
    pub language: String,
    pub voice: Voice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    pub content: Vec<VoiceContent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceContent {
    Text(String),
    Prosody(Prosody),
    ExpressAs(ExpressAs),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prosody {
    pub pitch: Option<String>,
    pub rate: Option<String>,
    pub volume: Option<String>,
    pub text: String,
}

/// `<mstts:express-as style="…">`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressAs {
    pub style: String,
    pub content: Vec<VoiceContent>,
}

impl Speak {
    pub fn new(
        voice_name: impl Into<String>,
        language: impl Into<String>,
        segments: impl IntoIterator<Item = Segment>,
    ) -> Result<Self, SpeechError> {
        let voice_name = voice_name.into();
        let language = language.into();

        if voice_name.trim().is_empty() {
            return Err(SpeechError::validation("SSML: Voice name is empty"));
        }
        validate_language(&language)?;

        let content: Vec<VoiceContent> = segments
            .into_iter()
            .map(Segment::into_content)
            .collect();
        if content.is_empty() {
            return Err(SpeechError::validation("SSML: No segments to synthesize"));
        }

        Ok(Self {
            version: SSML_VERSION.into(),
            language,
            voice: Voice {
                name: voice_name,
                content,
            },
        })
    }

    fn uses_mstts(&self) -> bool {
        self.voice.content.iter().any(VoiceContent::uses_mstts)
    }
}

impl VoiceContent {
    fn uses_mstts(&self) -> bool {
        match self {
            VoiceContent::Text(_) | VoiceContent::Prosody(_) => false,
            VoiceContent::ExpressAs(_) => true,
        }
    }
}

/// Fails with a validation error if `language` is empty or not a well-formed BCP 47 tag.
pub fn validate_language(language: &str) -> Result<(), SpeechError> {
    if language.trim().is_empty() {
        return Err(SpeechError::validation("Language is empty"));
    }
    LanguageTag::parse(language)
        .map_err(|e| SpeechError::validation(format!("`{language}`: Invalid language tag: {e}")))?;
    Ok(())
}

impl fmt::Display for Speak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<speak xmlns=\"{SYNTHESIS_NAMESPACE}\"")?;
        if self.uses_mstts() {
            write!(f, " xmlns:mstts=\"{MSTTS_NAMESPACE}\"")?;
        }
        write!(
            f,
            " version=\"{}\" xml:lang=\"{}\">",
            Escaped(&self.version),
            Escaped(&self.language)
        )?;
        write!(f, "<voice name=\"{}\">", Escaped(&self.voice.name))?;
        write_content(f, &self.voice.content)?;
        f.write_str("</voice></speak>")
    }
}

fn write_content(f: &mut fmt::Formatter<'_>, content: &[VoiceContent]) -> fmt::Result {
    for item in content {
        match item {
            VoiceContent::Text(text) => write!(f, "{}", Escaped(text))?,
            VoiceContent::Prosody(prosody) => {
                f.write_str("<prosody")?;
                for (name, value) in [
                    ("pitch", &prosody.pitch),
                    ("rate", &prosody.rate),
                    ("volume", &prosody.volume),
                ] {
                    if let Some(value) = value {
                        write!(f, " {name}=\"{}\"", Escaped(value))?;
                    }
                }
                write!(f, ">{}</prosody>", Escaped(&prosody.text))?;
            }
            VoiceContent::ExpressAs(express_as) => {
                write!(
                    f,
                    "<mstts:express-as style=\"{}\">",
                    Escaped(&express_as.style)
                )?;
                write_content(f, &express_as.content)?;
                f.write_str("</mstts:express-as>")?;
            }
        }
    }
    Ok(())
}

/// Escapes text and attribute values.
struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '&' => f.write_str("&amp;")?,
                '<' => f.write_str("&lt;")?,
                '>' => f.write_str("&gt;")?,
                '"' => f.write_str("&quot;")?,
                '\'' => f.write_str("&apos;")?,
                c => f.write_char(c)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

    /// (style, pitch, rate, volume, text) per voice content item, as an independent parser sees
    /// them.
    type Recovered = (
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        String,
    );

    fn recover(xml: &str) -> (String, Vec<Recovered>) {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let speak = doc.root_element();
        let voice = speak
            .children()
            .find(|n| n.is_element() && n.tag_name().name() == "voice")
            .unwrap();

        let mut items = Vec::new();
        collect(voice, None, &mut items);
        (voice.attribute("name").unwrap().to_string(), items)
    }

    fn collect(node: roxmltree::Node, style: Option<String>, items: &mut Vec<Recovered>) {
        for child in node.children() {
            if child.is_text() {
                items.push((
                    style.clone(),
                    None,
                    None,
                    None,
                    child.text().unwrap().to_string(),
                ));
                continue;
            }
            match child.tag_name().name() {
                "prosody" => items.push((
                    style.clone(),
                    child.attribute("pitch").map(Into::into),
                    child.attribute("rate").map(Into::into),
                    child.attribute("volume").map(Into::into),
                    child.text().unwrap_or_default().to_string(),
                )),
                "express-as" => collect(
                    child,
                    child.attribute("style").map(Into::into),
                    items,
                ),
                other => panic!("Unexpected element: {other}"),
            }
        }
    }

    #[test]
    fn single_prosody_segment_renders_one_prosody_child() {
        let xml = build(
            "AriaNeural",
            "en-US",
            [Segment::new("Hi").with_rate("+10%")],
        )
        .unwrap();

        let doc = roxmltree::Document::parse(&xml).unwrap();
        let speak = doc.root_element();
        assert_eq!(speak.tag_name().name(), "speak");
        assert_eq!(speak.tag_name().namespace(), Some(SYNTHESIS_NAMESPACE));
        assert_eq!(speak.attribute("version"), Some("1.0"));
        assert_eq!(speak.attribute((XML_NAMESPACE, "lang")), Some("en-US"));

        let voices: Vec<_> = speak.children().filter(|n| n.is_element()).collect();
        assert_eq!(voices.len(), 1);
        let voice = voices[0];
        assert_eq!(voice.tag_name().name(), "voice");
        assert_eq!(voice.attribute("name"), Some("AriaNeural"));

        let children: Vec<_> = voice.children().collect();
        assert_eq!(children.len(), 1);
        let prosody = children[0];
        assert_eq!(prosody.tag_name().name(), "prosody");
        assert_eq!(prosody.tag_name().namespace(), Some(SYNTHESIS_NAMESPACE));
        assert_eq!(prosody.attribute("rate"), Some("+10%"));
        assert_eq!(prosody.attribute("pitch"), None);
        assert_eq!(prosody.text(), Some("Hi"));
    }

    #[test]
    fn output_has_no_declaration_and_no_generated_prefixes() {
        let xml = build(
            "en-US-JennyNeural",
            "en-US",
            [Segment::new("Hello"), Segment::new("there").with_pitch("high")],
        )
        .unwrap();

        assert!(xml.starts_with("<speak "));
        assert!(!xml.contains("<?xml"));
        assert!(!xml.contains("xmlns:xsi"));
        assert!(!xml.contains("xmlns:xsd"));
        assert!(!xml.contains("xmlns:mstts"));
        assert!(roxmltree::Document::parse(&xml).is_ok());
    }

    #[test]
    fn segment_without_prosody_renders_raw_text() {
        let xml = build("AriaNeural", "en-US", [Segment::new("Plain words")]).unwrap();
        assert!(!xml.contains("<prosody"));

        let (_, items) = recover(&xml);
        assert_eq!(
            items,
            vec![(None, None, None, None, "Plain words".to_string())]
        );
    }

    #[test]
    fn mixed_segments_round_trip_in_order() {
        let segments = vec![
            Segment::new("One"),
            Segment::new("Two").with_pitch("+5%").with_volume("loud"),
            Segment::new("Three"),
            Segment::new("Four").with_rate("slow"),
        ];

        let xml = build("GuyNeural", "en-GB", segments.clone()).unwrap();
        let (voice, items) = recover(&xml);

        assert_eq!(voice, "GuyNeural");
        let expected: Vec<Recovered> = segments
            .into_iter()
            .map(|s| (s.style, s.pitch, s.rate, s.volume, s.text))
            .collect();
        assert_eq!(items, expected);
    }

    #[test]
    fn style_wraps_segment_in_express_as() {
        let xml = build(
            "AriaNeural",
            "en-US",
            [
                Segment::new("Great news").with_style("cheerful").with_rate("fast"),
                Segment::new("Back to normal"),
            ],
        )
        .unwrap();

        assert!(xml.contains(&format!("xmlns:mstts=\"{MSTTS_NAMESPACE}\"")));

        let doc = roxmltree::Document::parse(&xml).unwrap();
        let express_as = doc
            .descendants()
            .find(|n| n.tag_name().name() == "express-as")
            .unwrap();
        assert_eq!(express_as.tag_name().namespace(), Some(MSTTS_NAMESPACE));
        assert_eq!(express_as.attribute("style"), Some("cheerful"));

        let (_, items) = recover(&xml);
        assert_eq!(
            items,
            vec![
                (
                    Some("cheerful".into()),
                    None,
                    Some("fast".into()),
                    None,
                    "Great news".into()
                ),
                (None, None, None, None, "Back to normal".into()),
            ]
        );
    }

    #[test]
    fn text_and_attributes_are_escaped() {
        let text = "Tom & Jerry <3 \"quotes\" 'apostrophes'";
        let xml = build(
            "Voice\"Name",
            "en-US",
            [Segment::new(text).with_pitch("a<b")],
        )
        .unwrap();

        let (voice, items) = recover(&xml);
        assert_eq!(voice, "Voice\"Name");
        assert_eq!(items[0].1.as_deref(), Some("a<b"));
        assert_eq!(items[0].4, text);
    }

    #[rstest]
    #[case("", "en-US")]
    #[case("   ", "en-US")]
    #[case("AriaNeural", "")]
    #[case("AriaNeural", "not a language")]
    fn invalid_voice_or_language_is_rejected(#[case] voice: &str, #[case] language: &str) {
        let result = build(voice, language, [Segment::new("Hi")]);
        assert!(matches!(result, Err(SpeechError::Validation { .. })));
    }

    #[test]
    fn no_segments_is_rejected() {
        let result = build("AriaNeural", "en-US", []);
        assert!(matches!(result, Err(SpeechError::Validation { .. })));
    }

    #[test]
    fn build_is_deterministic() {
        let segments = || [Segment::new("Same").with_rate("+1%")];
        assert_eq!(
            build("AriaNeural", "en-US", segments()).unwrap(),
            build("AriaNeural", "en-US", segments()).unwrap()
        );
    }
}
