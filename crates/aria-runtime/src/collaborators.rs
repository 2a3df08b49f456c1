//! Conversation collaborators - speech-to-text, dialogue, text-to-speech
//!
//! The renderer only consumes synthesized audio. These traits describe the
//! services around it, and [`ConversationPipeline`] wires one user turn
//! through all of them into a frame stream.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use aria_audio::AudioBuffer;
use aria_core::AriaResult;

use crate::service::{FrameStream, RenderingService};

/// Default number of turns kept as dialogue context
pub const DEFAULT_MAX_HISTORY: usize = 10;
/// Default number of synthesized replies kept in the voice cache
pub const DEFAULT_VOICE_CACHE_CAPACITY: usize = 64;

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &AudioBuffer) -> AriaResult<String>;
}

#[async_trait]
pub trait DialogueModel: Send + Sync {
    /// Reply to the last user turn in `history`
    async fn respond(&self, history: &[Turn]) -> AriaResult<String>;
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> AriaResult<AudioBuffer>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of the conversation history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VoiceKey {
    voice: String,
    text: String,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<VoiceKey, Arc<AudioBuffer>>,
    order: VecDeque<VoiceKey>,
    hits: u64,
    misses: u64,
}

/// Synthesized speech keyed by `(voice, text)`, bounded with FIFO eviction
pub struct VoiceCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl VoiceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn get(&self, voice: &str, text: &str) -> Option<Arc<AudioBuffer>> {
        let key = VoiceKey {
            voice: voice.to_string(),
            text: text.to_string(),
        };
        let mut inner = self.inner.lock();
        match inner.entries.get(&key).cloned() {
            Some(audio) => {
                inner.hits += 1;
                Some(audio)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    pub fn insert(&self, voice: &str, text: &str, audio: AudioBuffer) -> Arc<AudioBuffer> {
        let audio = Arc::new(audio);
        if self.capacity == 0 {
            return audio;
        }

        let key = VoiceKey {
            voice: voice.to_string(),
            text: text.to_string(),
        };
        let mut inner = self.inner.lock();
        if inner.entries.insert(key.clone(), Arc::clone(&audio)).is_none() {
            inner.order.push_back(key);
        }
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
        audio
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses)`
    pub fn hit_stats(&self) -> (u64, u64) {
        let inner = self.inner.lock();
        (inner.hits, inner.misses)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}

impl Default for VoiceCache {
    fn default() -> Self {
        Self::new(DEFAULT_VOICE_CACHE_CAPACITY)
    }
}

/// Result of one conversational turn
pub struct Reply {
    pub transcript: String,
    pub text: String,
    pub audio: Arc<AudioBuffer>,
    pub frames: FrameStream,
}

/// user audio -> transcript -> reply text -> speech -> avatar frames
pub struct ConversationPipeline {
    stt: Arc<dyn SpeechToText>,
    dialogue: Arc<dyn DialogueModel>,
    tts: Arc<dyn TextToSpeech>,
    voice: String,
    cache: VoiceCache,
    history: Mutex<Vec<Turn>>,
    max_history: usize,
}

impl ConversationPipeline {
    pub fn new(
        stt: Arc<dyn SpeechToText>,
        dialogue: Arc<dyn DialogueModel>,
        tts: Arc<dyn TextToSpeech>,
        voice: impl Into<String>,
    ) -> Self {
        Self {
            stt,
            dialogue,
            tts,
            voice: voice.into(),
            cache: VoiceCache::default(),
            history: Mutex::new(Vec::new()),
            max_history: DEFAULT_MAX_HISTORY,
        }
    }

    pub fn with_cache(mut self, cache: VoiceCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history.max(1);
        self
    }

    pub fn with_system_prompt(self, prompt: impl Into<String>) -> Self {
        self.history.lock().push(Turn::new(Role::System, prompt));
        self
    }

    pub fn cache(&self) -> &VoiceCache {
        &self.cache
    }

    pub fn history(&self) -> Vec<Turn> {
        self.history.lock().clone()
    }

    /// Forget everything but the system prompt
    pub fn reset_conversation(&self) {
        self.history.lock().retain(|t| t.role == Role::System);
    }

    /// Run one user turn and start rendering the spoken reply
    pub async fn respond(&self, service: &RenderingService, user_audio: &AudioBuffer) -> AriaResult<Reply> {
        let transcript = self.stt.transcribe(user_audio).await?;
        debug!(chars = transcript.len(), "Transcribed user audio");

        let context = {
            let mut history = self.history.lock();
            history.push(Turn::new(Role::User, transcript.clone()));
            self.trim(&mut history);
            history.clone()
        };

        let text = self.dialogue.respond(&context).await?;
        {
            let mut history = self.history.lock();
            history.push(Turn::new(Role::Assistant, text.clone()));
            self.trim(&mut history);
        }

        let audio = match self.cache.get(&self.voice, &text) {
            Some(audio) => audio,
            None => {
                let audio = self.tts.synthesize(&text, &self.voice).await?;
                self.cache.insert(&self.voice, &text, audio)
            }
        };

        let frames = service.render_frames(audio.as_ref().clone())?;
        info!(
            reply_chars = text.len(),
            frames = frames.total_frames(),
            "Conversation turn rendering"
        );

        Ok(Reply {
            transcript,
            text,
            audio,
            frames,
        })
    }

    /// Keep system turns plus the newest `max_history` others
    fn trim(&self, history: &mut Vec<Turn>) {
        let dialogue_turns = history.iter().filter(|t| t.role != Role::System).count();
        let mut excess = dialogue_turns.saturating_sub(self.max_history);
        history.retain(|t| {
            if excess > 0 && t.role != Role::System {
                excess -= 1;
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_cache_fifo() {
        let cache = VoiceCache::new(2);
        let clip = || AudioBuffer::silence(160, 16_000).unwrap();

        cache.insert("v", "a", clip());
        cache.insert("v", "b", clip());
        assert!(cache.get("v", "a").is_some());
        cache.insert("v", "c", clip());

        assert_eq!(cache.len(), 2);
        assert!(cache.get("v", "a").is_none());
        assert!(cache.get("v", "b").is_some());
        assert!(cache.get("v", "c").is_some());
        assert!(cache.get("other", "c").is_none());
        assert_eq!(cache.hit_stats(), (3, 2));
    }

    #[test]
    fn test_voice_cache_replace_and_disable() {
        let cache = VoiceCache::new(2);
        cache.insert("v", "a", AudioBuffer::silence(10, 16_000).unwrap());
        cache.insert("v", "a", AudioBuffer::silence(20, 16_000).unwrap());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("v", "a").unwrap().len(), 20);

        let off = VoiceCache::new(0);
        off.insert("v", "a", AudioBuffer::silence(10, 16_000).unwrap());
        assert!(off.is_empty());
    }
}
