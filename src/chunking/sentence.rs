//! Greedy, sentence-aware chunking.

use super::{Chunk, ChunkingConfig};
use crate::transcription::TranscriptSegment;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Terminal punctuation, optionally followed by closing quotes or brackets.
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[.!?…]["'”’)\]]*$"#).expect("valid sentence regex"));

/// Greedy chunker over transcript segments.
///
/// Segments accumulate into the open chunk, which closes after the segment
/// that brings it to `target_chars`, or after a segment ending a sentence
/// once the chunk holds at least `min_chars`. Segments are never split, so a
/// chunk overshoots the target by at most one segment.
#[derive(Debug, Clone, Default)]
pub struct SentenceChunker {
    config: ChunkingConfig,
}

impl SentenceChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Split an ordered segment sequence into chunks for `video_id`.
    pub fn chunk(&self, video_id: &str, segments: &[TranscriptSegment]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut open = OpenChunk::default();

        for segment in segments {
            open.push(segment);

            let full = open.chars >= self.config.target_chars;
            let at_boundary = ends_sentence(&segment.text) && open.chars >= self.config.min_chars;

            if full || at_boundary {
                chunks.push(open.take(video_id, chunks.len()));
            }
        }

        if !open.is_empty() {
            chunks.push(open.take(video_id, chunks.len()));
        }

        debug!("Cut {} segments into {} chunks", segments.len(), chunks.len());
        chunks
    }
}

/// Whether a segment's text ends a sentence.
pub(crate) fn ends_sentence(text: &str) -> bool {
    SENTENCE_END.is_match(text.trim_end())
}

#[derive(Default)]
struct OpenChunk {
    text: String,
    chars: usize,
    start: Option<f64>,
    end: f64,
}

impl OpenChunk {
    fn is_empty(&self) -> bool {
        self.start.is_none()
    }

    fn push(&mut self, segment: &TranscriptSegment) {
        if self.start.is_none() {
            self.start = Some(segment.start_seconds);
        }
        self.end = segment.end_seconds;

        let text = segment.text.trim();
        if text.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
            self.chars += 1;
        }
        self.text.push_str(text);
        self.chars += text.chars().count();
    }

    fn take(&mut self, video_id: &str, index: usize) -> Chunk {
        let open = std::mem::take(self);
        Chunk::new(
            video_id,
            index,
            open.text,
            open.start.unwrap_or(open.end),
            open.end,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment::new(start, end, text.to_string())
    }

    fn chunker(target_chars: usize, min_chars: usize) -> SentenceChunker {
        SentenceChunker::new(ChunkingConfig {
            target_chars,
            min_chars,
        })
    }

    /// Segments of varying length, some ending sentences.
    fn generated_segments(seed: u64, count: usize) -> Vec<TranscriptSegment> {
        let mut state = seed;
        let mut t = 0.0;
        (0..count)
            .map(|i| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let words = 1 + (state >> 33) as usize % 12;
                let mut text = vec!["word"; words].join(" ");
                if (state >> 20) % 3 == 0 {
                    text.push('.');
                }
                let start = t;
                t += 0.5 + words as f64 * 0.3;
                seg(start, t, &format!("{} {}", i, text))
            })
            .collect()
    }

    #[test]
    fn test_zero_segments_yield_zero_chunks() {
        assert!(chunker(100, 10).chunk("v", &[]).is_empty());
    }

    #[test]
    fn test_closes_at_sentence_boundary_after_min() {
        let segments = vec![
            seg(0.0, 2.0, "We choose to go to the moon."),
            seg(2.0, 4.0, "Not because it is easy"),
            seg(4.0, 6.0, "but because it is hard."),
        ];
        let chunks = chunker(1000, 10).chunk("v", &segments);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "We choose to go to the moon.");
        assert_eq!(chunks[1].text, "Not because it is easy but because it is hard.");
        assert_eq!(chunks[1].start_seconds, 2.0);
        assert_eq!(chunks[1].end_seconds, 6.0);
    }

    #[test]
    fn test_sentence_boundary_below_min_does_not_close() {
        let segments = vec![seg(0.0, 1.0, "Yes."), seg(1.0, 2.0, "And then we left.")];
        let chunks = chunker(1000, 10).chunk("v", &segments);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Yes. And then we left.");
    }

    #[test]
    fn test_overflowing_segment_stays_in_the_chunk_it_overflows() {
        let segments = vec![
            seg(0.0, 1.0, "aaaa"),
            seg(1.0, 2.0, "bbbbbbbbbbbbbbbbbbbb"),
            seg(2.0, 3.0, "cc"),
        ];
        let chunks = chunker(10, 5).chunk("v", &segments);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "aaaa bbbbbbbbbbbbbbbbbbbb");
        assert_eq!(chunks[1].text, "cc");
    }

    #[test]
    fn test_chunk_ids_follow_video_and_index() {
        let segments = vec![seg(0.0, 1.0, "One."), seg(1.0, 2.0, "Two.")];
        let chunks = chunker(1000, 1).chunk("abc", &segments);
        assert_eq!(chunks[0].chunk_id, "abc:0");
        assert_eq!(chunks[1].chunk_id, "abc:1");
        assert!(chunks.iter().all(|c| c.video_id == "abc"));
    }

    #[test]
    fn test_chunks_partition_segments_in_order() {
        for seed in 1..20 {
            let segments = generated_segments(seed, 60);
            let config = ChunkingConfig {
                target_chars: 80,
                min_chars: 30,
            };
            let chunks = SentenceChunker::new(config).chunk("v", &segments);

            // Rejoined chunk text is the transcript text, in order
            let joined = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" ");
            let expected = segments.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ");
            assert_eq!(joined, expected);

            // Time ranges tile the transcript without gaps or overlaps
            assert_eq!(chunks.first().unwrap().start_seconds, segments[0].start_seconds);
            assert_eq!(chunks.last().unwrap().end_seconds, segments.last().unwrap().end_seconds);
            for pair in chunks.windows(2) {
                assert_eq!(pair[0].end_seconds, pair[1].start_seconds);
                assert_eq!(pair[0].index + 1, pair[1].index);
            }

            // Overshoot is bounded by one segment
            let longest = segments.iter().map(|s| s.text.chars().count()).max().unwrap();
            for c in &chunks {
                assert!(c.text.chars().count() < config.target_chars + 1 + longest);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let segments = generated_segments(7, 40);
        let a = chunker(50, 20).chunk("v", &segments);
        let b = chunker(50, 20).chunk("v", &segments);
        assert_eq!(a, b);
    }

    #[test]
    fn test_ends_sentence() {
        assert!(ends_sentence("It is done."));
        assert!(ends_sentence("Really?\u{201d}"));
        assert!(ends_sentence("(as I said.) "));
        assert!(!ends_sentence("and so"));
        assert!(!ends_sentence(""));
    }
}
