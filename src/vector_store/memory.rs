//! In-memory vector store implementation.
//!
//! Useful for testing and for runs that do not need to persist an index.

use super::{
    check_dimension, prepare_upsert, rank, IndexedVideo, QueryFilter, QueryResult, StoredChunk, TranscriptRecord,
    VectorStore, VideoMetadata,
};
use crate::chunking::Chunk;
use crate::error::{Result, VidscribeError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

type RecordMap = HashMap<String, TranscriptRecord>;

/// In-memory vector store.
///
/// Each video is one record, so replacing a video is a single map insert
/// under the write lock.
pub struct MemoryVectorStore {
    videos: RwLock<RecordMap>,
    dimensions: usize,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store for vectors of `dimensions`.
    pub fn new(dimensions: usize) -> Self {
        Self {
            videos: RwLock::new(HashMap::new()),
            dimensions,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RecordMap>> {
        self.videos
            .read()
            .map_err(|e| VidscribeError::Store(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RecordMap>> {
        self.videos
            .write()
            .map_err(|e| VidscribeError::Store(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(
        &self,
        video_id: &str,
        metadata: &VideoMetadata,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<usize> {
        let record = prepare_upsert(video_id, metadata, chunks, embeddings, self.dimensions)?;
        let count = record.chunks.len();

        self.write()?.insert(video_id.to_string(), record);

        debug!("Stored {} chunks for video {}", count, video_id);
        Ok(count)
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&QueryFilter>,
    ) -> Result<Vec<QueryResult>> {
        check_dimension(vector, self.dimensions)?;
        let videos = self.read()?;

        let results = match filter.and_then(|f| f.video_id.as_deref()) {
            Some(video_id) => rank(
                vector,
                videos.get(video_id).into_iter().flat_map(|r| &r.chunks),
                top_k,
                filter,
            ),
            None => rank(vector, videos.values().flat_map(|r| &r.chunks), top_k, filter),
        };
        Ok(results)
    }

    async fn delete(&self, video_id: &str) -> Result<usize> {
        let mut videos = self.write()?;
        Ok(videos.remove(video_id).map_or(0, |record| record.chunks.len()))
    }

    async fn get_by_video_id(&self, video_id: &str) -> Result<Vec<StoredChunk>> {
        let videos = self.read()?;
        Ok(videos.get(video_id).map(|r| r.chunks.clone()).unwrap_or_default())
    }

    async fn get_video(&self, video_id: &str) -> Result<Option<TranscriptRecord>> {
        Ok(self.read()?.get(video_id).cloned())
    }

    async fn list_videos(&self) -> Result<Vec<IndexedVideo>> {
        let videos = self.read()?;

        let mut listed: Vec<IndexedVideo> = videos.values().map(|r| r.video.clone()).collect();
        listed.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at).then_with(|| a.video_id.cmp(&b.video_id)));
        Ok(listed)
    }

    async fn count(&self) -> Result<usize> {
        let videos = self.read()?;
        Ok(videos.values().map(|r| r.chunks.len()).sum())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn chunks(video_id: &str, count: usize) -> Vec<Chunk> {
        (0..count)
            .map(|i| Chunk::new(video_id, i, format!("{} part {}", video_id, i), i as f64 * 30.0, (i + 1) as f64 * 30.0))
            .collect()
    }

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot % dim] = 1.0;
        v
    }

    fn meta() -> VideoMetadata {
        VideoMetadata::new("/videos/talk.mp4", "whisper-1")
    }

    #[tokio::test]
    async fn test_memory_vector_store() {
        let store = MemoryVectorStore::new(3);

        let stored = store
            .upsert("video1", &meta(), &chunks("video1", 2), &[unit(3, 0), unit(3, 1)])
            .await
            .unwrap();
        assert_eq!(stored, 2);
        assert_eq!(store.count().await.unwrap(), 2);

        let results = store.query(&[1.0, 0.0, 0.0], 10, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score > results[1].score);
        assert_eq!(results[0].chunk_id, "video1:0");

        let videos = store.list_videos().await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].chunk_count, 2);
        assert_eq!(videos[0].total_duration_seconds, 60.0);
        assert_eq!(videos[0].metadata, meta());
    }

    #[tokio::test]
    async fn test_upsert_replaces_previous_chunks() {
        let store = MemoryVectorStore::new(2);
        store
            .upsert("v", &meta(), &chunks("v", 3), &[unit(2, 0), unit(2, 0), unit(2, 0)])
            .await
            .unwrap();
        store.upsert("v", &meta(), &chunks("v", 1), &[unit(2, 1)]).await.unwrap();

        let kept = store.get_by_video_id("v").await.unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].embedding, unit(2, 1));
    }

    #[tokio::test]
    async fn test_silent_video_keeps_a_record() {
        let store = MemoryVectorStore::new(2);
        store.upsert("v", &meta(), &chunks("v", 2), &[unit(2, 0), unit(2, 1)]).await.unwrap();

        assert_eq!(store.upsert("v", &meta(), &[], &[]).await.unwrap(), 0);
        assert!(store.get_by_video_id("v").await.unwrap().is_empty());

        let record = store.get_video("v").await.unwrap().unwrap();
        assert_eq!(record.video.chunk_count, 0);
        assert_eq!(record.video.metadata.model.as_deref(), Some("whisper-1"));
        assert_eq!(store.list_videos().await.unwrap().len(), 1);

        assert_eq!(store.delete("v").await.unwrap(), 0);
        assert!(store.get_video("v").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejected_upsert_leaves_store_untouched() {
        let store = MemoryVectorStore::new(2);
        store.upsert("v", &meta(), &chunks("v", 1), &[unit(2, 0)]).await.unwrap();

        let other = VideoMetadata::new("/videos/talk.mp4", "whisper-2");
        let err = store
            .upsert("v", &other, &chunks("v", 2), &[unit(2, 0), vec![1.0, 0.0, 0.0]])
            .await
            .unwrap_err();
        assert!(matches!(err, VidscribeError::Store(_)));
        assert_eq!(store.get_by_video_id("v").await.unwrap().len(), 1);
        assert_eq!(store.get_video("v").await.unwrap().unwrap().video.metadata, meta());
    }

    #[tokio::test]
    async fn test_query_filter_and_dimension_check() {
        let store = MemoryVectorStore::new(2);
        store.upsert("a", &meta(), &chunks("a", 2), &[unit(2, 0), unit(2, 1)]).await.unwrap();
        store.upsert("b", &meta(), &chunks("b", 1), &[unit(2, 0)]).await.unwrap();

        let hits = store
            .query(&[1.0, 0.0], 10, Some(&QueryFilter::video("a")))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.video_id == "a"));

        let missing = store
            .query(&[1.0, 0.0], 10, Some(&QueryFilter::video("nope")))
            .await
            .unwrap();
        assert!(missing.is_empty());

        assert!(store.query(&[1.0, 0.0, 0.0], 10, None).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryVectorStore::new(2);
        store.upsert("v", &meta(), &chunks("v", 2), &[unit(2, 0), unit(2, 1)]).await.unwrap();

        assert_eq!(store.delete("v").await.unwrap(), 2);
        assert_eq!(store.delete("v").await.unwrap(), 0);
        assert_eq!(store.delete("never").await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_readers_see_whole_sets() {
        let store = Arc::new(MemoryVectorStore::new(2));
        store
            .upsert("v", &meta(), &chunks("v", 4), &vec![unit(2, 0); 4])
            .await
            .unwrap();

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for round in 0..50 {
                    let n = if round % 2 == 0 { 2 } else { 4 };
                    store
                        .upsert("v", &meta(), &chunks("v", n), &vec![unit(2, round); n])
                        .await
                        .unwrap();
                }
            })
        };

        for _ in 0..50 {
            let seen = store.get_by_video_id("v").await.unwrap();
            assert!(seen.len() == 2 || seen.len() == 4);
            let first = &seen[0].embedding;
            assert!(seen.iter().all(|c| &c.embedding == first));
            tokio::task::yield_now().await;
        }

        writer.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queries_of_one_video_ignore_upserts_of_another() {
        let store = Arc::new(MemoryVectorStore::new(2));
        store
            .upsert("b", &meta(), &chunks("b", 3), &[unit(2, 0), vec![0.6, 0.8], unit(2, 1)])
            .await
            .unwrap();
        let only_b = QueryFilter::video("b");
        let expected = store.query(&[1.0, 0.0], 10, Some(&only_b)).await.unwrap();

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for round in 0..200 {
                    let n = round % 5 + 1;
                    store
                        .upsert("a", &meta(), &chunks("a", n), &vec![unit(2, round); n])
                        .await
                        .unwrap();
                }
            })
        };

        let reader = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for _ in 0..200 {
                    let hits = store.query(&[1.0, 0.0], 10, Some(&only_b)).await.unwrap();
                    let ids: Vec<_> = hits.iter().map(|h| (h.chunk_id.clone(), h.score)).collect();
                    let want: Vec<_> = expected.iter().map(|h| (h.chunk_id.clone(), h.score)).collect();
                    assert_eq!(ids, want);
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
        assert_eq!(store.get_by_video_id("b").await.unwrap().len(), 3);
    }
}
