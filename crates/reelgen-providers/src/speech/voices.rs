//! Abstract voice ids and their per-provider native names.

use reelgen_models::SpeechProviderKind;

/// Voice ids accepted in job options.
pub const VOICE_IDS: [&str; 6] = ["default", "female", "male", "narrator", "calm", "energetic"];

/// Native voice used when an id has no mapping.
pub fn default_voice(kind: SpeechProviderKind) -> &'static str {
    match kind {
        // "Rachel"
        SpeechProviderKind::Elevenlabs => "21m00Tcm4TlvDq8ikWAM",
        SpeechProviderKind::Openai => "alloy",
        SpeechProviderKind::GoogleTts => "en",
        SpeechProviderKind::Espeak => "en",
    }
}

fn table(kind: SpeechProviderKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        SpeechProviderKind::Elevenlabs => &[
            ("female", "EXAVITQu4vr4xnSDxMaL"),
            ("male", "ErXwobaYiN019PkySvjV"),
            ("narrator", "VR6AewLTigWG4xSOukaG"),
            ("calm", "pNInz6obpgDQGcFmaJgB"),
            ("energetic", "yoZ06aMxZJJ28mfd3POQ"),
        ],
        SpeechProviderKind::Openai => &[
            ("female", "nova"),
            ("male", "onyx"),
            ("narrator", "fable"),
            ("calm", "shimmer"),
            ("energetic", "echo"),
        ],
        SpeechProviderKind::GoogleTts => &[
            ("female", "en-US"),
            ("male", "en-GB"),
            ("narrator", "en-GB"),
            ("calm", "en-AU"),
            ("energetic", "en-US"),
        ],
        SpeechProviderKind::Espeak => &[
            ("female", "en+f3"),
            ("male", "en+m3"),
            ("narrator", "en+m1"),
            ("calm", "en+f2"),
            ("energetic", "en+m7"),
        ],
    }
}

/// Resolve an abstract voice id for `kind`.
pub fn resolve_voice(kind: SpeechProviderKind, voice_id: &str) -> &'static str {
    let id = voice_id.trim().to_lowercase();
    table(kind)
        .iter()
        .find(|(abstract_id, _)| *abstract_id == id)
        .map(|(_, native)| *native)
        .unwrap_or_else(|| default_voice(kind))
}
