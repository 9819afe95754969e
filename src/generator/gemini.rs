//! Gemini client
//!
//! Two `generateContent` calls per segment: one for the transcript, one
//! for multi-speaker speech of that transcript. The speech comes back as
//! base64 inline data holding raw s16le PCM.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::plan::transcript_prompt;
use super::ContentGenerator;
use crate::config::GenerationConfig;
use crate::constants::{DEFAULT_TTS_CHANNELS, DEFAULT_TTS_SAMPLE_RATE};
use crate::error::GenerationError;
use crate::station::{Segment, SegmentSpec, VoiceMap};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationSettings>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    response_modalities: Vec<&'static str>,
    speech_config: SpeechConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    multi_speaker_voice_config: MultiSpeakerVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MultiSpeakerVoiceConfig {
    speaker_voice_configs: Vec<SpeakerVoiceConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeakerVoiceConfig {
    speaker: String,
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// PCM layout announced by an inline data mime type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Parse `audio/L16;codec=pcm;rate=24000` style mime types.
///
/// A missing mime type is taken as the service default.
pub fn parse_pcm_mime(mime: Option<&str>) -> Result<PcmFormat, GenerationError> {
    let mut format = PcmFormat {
        sample_rate: DEFAULT_TTS_SAMPLE_RATE,
        channels: DEFAULT_TTS_CHANNELS,
    };
    let Some(mime) = mime else {
        return Ok(format);
    };

    let mut params = mime.split(';').map(str::trim);
    let essence = params.next().unwrap_or_default().to_ascii_lowercase();
    if essence != "audio/l16" && essence != "audio/pcm" {
        return Err(GenerationError::InvalidAudio(format!(
            "unsupported mime type {mime}"
        )));
    }

    for param in params {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "rate" => {
                format.sample_rate = value.trim().parse().map_err(|_| {
                    GenerationError::InvalidAudio(format!("bad sample rate in {mime}"))
                })?
            }
            "channels" => {
                format.channels = value.trim().parse().map_err(|_| {
                    GenerationError::InvalidAudio(format!("bad channel count in {mime}"))
                })?
            }
            _ => {}
        }
    }

    if format.sample_rate == 0 || format.channels == 0 {
        return Err(GenerationError::InvalidAudio(format!("degenerate format {mime}")));
    }
    Ok(format)
}

/// Gemini-backed segment generator
pub struct GeminiGenerator {
    http: reqwest::Client,
    config: GenerationConfig,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(config: GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(GenerationError::MissingApiKey)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, GenerationError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api { status, body });
        }

        let parsed: GenerateResponse = response.json().await?;
        if let Some(reason) = parsed
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            return Err(GenerationError::Blocked(reason));
        }
        Ok(parsed)
    }

    /// Ask the text model for a transcript
    pub async fn transcript(
        &self,
        spec: &SegmentSpec,
        voices: &VoiceMap,
    ) -> Result<String, GenerationError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![TextPart {
                    text: transcript_prompt(spec, voices),
                }],
            }],
            generation_config: None,
        };
        let response = self.generate_content(&self.config.text_model, &request).await?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::MissingTranscript);
        }
        Ok(text.to_string())
    }

    /// Synthesize `transcript` with one prebuilt voice per host
    pub async fn synthesize(
        &self,
        transcript: &str,
        voices: &VoiceMap,
    ) -> Result<(Bytes, PcmFormat), GenerationError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![TextPart {
                    text: transcript.to_string(),
                }],
            }],
            generation_config: Some(GenerationSettings {
                response_modalities: vec!["AUDIO"],
                speech_config: SpeechConfig {
                    multi_speaker_voice_config: MultiSpeakerVoiceConfig {
                        speaker_voice_configs: voices
                            .0
                            .iter()
                            .map(|sv| SpeakerVoiceConfig {
                                speaker: sv.speaker.clone(),
                                voice_config: VoiceConfig {
                                    prebuilt_voice_config: PrebuiltVoiceConfig {
                                        voice_name: sv.voice.clone(),
                                    },
                                },
                            })
                            .collect(),
                    },
                },
            }),
        };
        let response = self.generate_content(&self.config.tts_model, &request).await?;

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or(GenerationError::MissingAudio)?;
        let finish_reason = candidate.finish_reason;
        let inline = candidate
            .content
            .and_then(|c| c.parts.into_iter().find_map(|p| p.inline_data))
            .ok_or_else(|| {
                tracing::debug!(?finish_reason, "TTS response without inline data");
                GenerationError::MissingAudio
            })?;

        let format = parse_pcm_mime(inline.mime_type.as_deref())?;
        let pcm = general_purpose::STANDARD
            .decode(inline.data.as_bytes())
            .map_err(|e| GenerationError::InvalidAudio(format!("base64: {e}")))?;

        if pcm.is_empty() {
            return Err(GenerationError::MissingAudio);
        }
        let frame = 2 * format.channels as usize;
        if pcm.len() % frame != 0 {
            return Err(GenerationError::InvalidAudio(format!(
                "{} bytes is not a whole number of {}-channel s16 frames",
                pcm.len(),
                format.channels
            )));
        }
        Ok((Bytes::from(pcm), format))
    }
}

#[async_trait]
impl ContentGenerator for GeminiGenerator {
    async fn generate_segment(
        &self,
        spec: &SegmentSpec,
        voices: &VoiceMap,
    ) -> Result<Segment, GenerationError> {
        let transcript = self.transcript(spec, voices).await?;
        tracing::debug!(index = spec.index, kind = %spec.kind, "Transcript:\n{}", transcript);

        let (raw_audio, format) = self.synthesize(&transcript, voices).await?;
        tracing::info!(
            index = spec.index,
            kind = %spec.kind,
            bytes = raw_audio.len(),
            "Segment synthesized at {} Hz, {} channel(s)",
            format.sample_rate,
            format.channels
        );

        Ok(Segment {
            index: spec.index,
            kind: spec.kind,
            transcript,
            raw_audio,
            sample_rate: format.sample_rate,
            channels: format.channels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::SegmentKind;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEXT_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";
    const TTS_PATH: &str = "/v1beta/models/gemini-2.5-flash-preview-tts:generateContent";

    fn generator(server: &MockServer) -> GeminiGenerator {
        let config = GenerationConfig {
            api_key: Some("test-key".into()),
            base_url: server.uri(),
            ..GenerationConfig::default()
        };
        GeminiGenerator::new(config).unwrap()
    }

    fn text_response(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": text}]}, "finishReason": "STOP"}]
        }))
    }

    fn spec() -> SegmentSpec {
        SegmentSpec::new(0, SegmentKind::ColdOpen, "tide pools")
    }

    #[tokio::test]
    async fn test_generate_segment() {
        let server = MockServer::start().await;
        let pcm: Vec<u8> = (0..4800u32).map(|i| (i % 251) as u8).collect();

        Mock::given(method("POST"))
            .and(path(TEXT_PATH))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(text_response("Dr. Aman: Welcome!\nLiam: Hi all."))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(TTS_PATH))
            .and(body_partial_json(json!({
                "contents": [{"parts": [{"text": "Dr. Aman: Welcome!\nLiam: Hi all."}]}],
                "generationConfig": {
                    "responseModalities": ["AUDIO"],
                    "speechConfig": {"multiSpeakerVoiceConfig": {"speakerVoiceConfigs": [
                        {"speaker": "Dr. Aman", "voiceConfig": {"prebuiltVoiceConfig": {"voiceName": "Kore"}}},
                        {"speaker": "Liam", "voiceConfig": {"prebuiltVoiceConfig": {"voiceName": "Puck"}}}
                    ]}}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"inlineData": {
                    "mimeType": "audio/L16;codec=pcm;rate=24000",
                    "data": general_purpose::STANDARD.encode(&pcm)
                }}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let segment = generator(&server)
            .generate_segment(&spec(), &VoiceMap::default())
            .await
            .unwrap();

        assert_eq!(segment.kind, SegmentKind::ColdOpen);
        assert_eq!(segment.sample_rate, 24_000);
        assert_eq!(segment.channels, 1);
        assert_eq!(segment.raw_audio.as_ref(), pcm.as_slice());
        assert!(segment.transcript.starts_with("Dr. Aman:"));
    }

    #[tokio::test]
    async fn test_missing_inline_audio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TEXT_PATH))
            .respond_with(text_response("Liam: hello"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(TTS_PATH))
            .respond_with(text_response("I can only talk"))
            .mount(&server)
            .await;

        let err = generator(&server)
            .generate_segment(&spec(), &VoiceMap::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::MissingAudio));
    }

    #[tokio::test]
    async fn test_quota_error_is_surfaced_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TEXT_PATH))
            .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
            .expect(1)
            .mount(&server)
            .await;

        let err = generator(&server)
            .generate_segment(&spec(), &VoiceMap::default())
            .await
            .unwrap_err();
        match err {
            GenerationError::Api { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("RESOURCE_EXHAUSTED"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blocked_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TEXT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let err = generator(&server)
            .generate_segment(&spec(), &VoiceMap::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Blocked(reason) if reason == "SAFETY"));
    }

    #[test]
    fn test_missing_api_key() {
        assert!(matches!(
            GeminiGenerator::new(GenerationConfig::default()),
            Err(GenerationError::MissingApiKey)
        ));
    }

    #[test]
    fn test_parse_pcm_mime() {
        assert_eq!(
            parse_pcm_mime(Some("audio/L16;codec=pcm;rate=24000")).unwrap(),
            PcmFormat {
                sample_rate: 24_000,
                channels: 1
            }
        );
        assert_eq!(
            parse_pcm_mime(Some("audio/pcm; rate=12000; channels=2")).unwrap(),
            PcmFormat {
                sample_rate: 12_000,
                channels: 2
            }
        );
        assert_eq!(parse_pcm_mime(None).unwrap().sample_rate, 24_000);
        assert!(parse_pcm_mime(Some("audio/mpeg")).is_err());
        assert!(parse_pcm_mime(Some("audio/L16;rate=fast")).is_err());
    }
}
