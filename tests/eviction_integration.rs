//! Stealing across owner kinds: raw sample data, time-stretch caches and
//! percussion caches sharing one pool.

mod helpers;

use helpers::*;
use sostenuto::prelude::*;
use sostenuto::UNITY_PHASE_INCREMENT;
use std::sync::Arc;

/// Four chunks of mono 16-bit audio per file.
fn setup(num_chunks: usize, paths: &[&str]) -> (ChunkPool, Vec<Arc<Sample>>) {
    let loader = paths.iter().fold(MemoryLoader::new(), |loader, path| {
        loader.with_file(*path, file_bytes(0, 4 * TEST_CHUNK_SIZE))
    });
    let pool = test_pool(num_chunks, 2, loader.clone());
    let samples = paths
        .iter()
        .map(|path| mono_sample(&pool, &loader, path, 0))
        .collect();
    (pool, samples)
}

#[test]
fn test_victims_follow_tier_order() {
    init_tracing();
    let (pool, samples) = setup(4, &["live.wav", "unused.wav", "new.wav"]);
    let (live, unused, incoming) = (&samples[0], &samples[1], &samples[2]);
    let _song = live.add_reason();
    let cache = SampleCache::new(unused, UNITY_PHASE_INCREMENT * 2, UNITY_PHASE_INCREMENT);

    drop(pool.acquire(live, 0, LoadInstruction::LoadImmediately, &mut NoService).unwrap());
    drop(pool.acquire(unused, 0, LoadInstruction::LoadImmediately, &mut NoService).unwrap());
    drop(cache.write_chunk(&pool, 0).unwrap());
    drop(live.claim_perc_cache_chunk(&pool, 0, PlayDirection::Forward).unwrap());

    assert_eq!(pool.num_free(), 0);
    assert_eq!(pool.queued(StealableQueue::CurrentSongSampleData).len(), 1);
    assert_eq!(pool.queued(StealableQueue::NoSongSampleData).len(), 1);
    assert_eq!(pool.queued(StealableQueue::NoSongRepitchedCache).len(), 1);
    assert_eq!(pool.queued(StealableQueue::CurrentSongPercCache).len(), 1);

    let mut held = Vec::new();
    let mut claim = |index| {
        held.push(
            pool.acquire(incoming, index, LoadInstruction::DontLoad, &mut NoService)
                .unwrap(),
        );
    };

    claim(0);
    assert_eq!(unused.chunk_id(0), None);
    assert_eq!(cache.num_linked_chunks(), 1);

    claim(1);
    assert_eq!(cache.num_linked_chunks(), 0);
    assert!(live.perc_cache_chunk(0, PlayDirection::Forward).is_some());

    claim(2);
    assert_eq!(live.perc_cache_chunk(0, PlayDirection::Forward), None);
    assert!(live.chunk_id(0).is_some());

    claim(3);
    assert_eq!(live.chunk_id(0), None);

    assert_eq!(pool.metrics().snapshot().steals, 4);
    assert_eq!(incoming.num_linked_chunks(), 4);
}

#[test]
fn test_stolen_cache_chunk_drops_everything_after_it() {
    let (pool, samples) = setup(3, &["a.wav", "b.wav"]);
    let (a, b) = (&samples[0], &samples[1]);
    let cache = SampleCache::new(a, UNITY_PHASE_INCREMENT, UNITY_PHASE_INCREMENT);
    assert!(cache.is_unity());
    assert_eq!(cache.num_chunks(), 4);

    for index in 0..2 {
        let reason = cache.write_chunk(&pool, index).unwrap();
        reason.write(|data| data.fill(index as u8 + 1));
        cache.advance_write_byte_pos((index as u64 + 1) * TEST_CHUNK_SIZE as u64);
    }
    assert_eq!(cache.write_byte_pos(), 2 * TEST_CHUNK_SIZE as u64);

    let _first = pool.acquire(b, 0, LoadInstruction::DontLoad, &mut NoService).unwrap();
    let _second = pool.acquire(b, 1, LoadInstruction::DontLoad, &mut NoService).unwrap();

    // Cache chunk 0 was the victim; chunk 1 went with it to the free list
    assert_eq!(cache.write_byte_pos(), 0);
    assert_eq!(cache.num_linked_chunks(), 0);
    assert_eq!(pool.num_free(), 1);
    assert!(pool.queued(StealableQueue::NoSongRepitchedCache).is_empty());
}

#[test]
fn test_held_chunks_are_never_stolen() {
    let (pool, samples) = setup(2, &["a.wav", "b.wav"]);
    let (a, b) = (&samples[0], &samples[1]);

    let playing = pool.acquire(a, 0, LoadInstruction::LoadImmediately, &mut NoService).unwrap();
    let recording = pool.acquire(a, 1, LoadInstruction::DontLoad, &mut NoService).unwrap();
    let hold = recording.hold_for_recorder();
    drop(recording);

    assert!(pool.acquire(b, 0, LoadInstruction::DontLoad, &mut NoService).is_none());
    assert_eq!(pool.metrics().snapshot().allocation_failures, 1);
    assert_eq!(a.num_linked_chunks(), 2);

    drop(hold);
    let stolen = pool.acquire(b, 0, LoadInstruction::DontLoad, &mut NoService).unwrap();
    assert_eq!(a.chunk_id(1), None);
    assert_eq!(a.chunk_id(0), Some(playing.id()));
    assert_ne!(stolen.id(), playing.id());
}

#[test]
fn test_released_chunks_queue_by_song_membership() {
    let (pool, samples) = setup(8, &["a.wav"]);
    let a = &samples[0];

    let mut holder = SampleHolder::new();
    holder.set_audio_file(&pool, Some(a.clone()), false, true, LoadInstruction::LoadImmediately, &mut NoService);
    let ids: Vec<_> = holder.window().chunk_ids().into_iter().flatten().collect();

    // Window moves on while the file is still in use
    holder.claim_cluster_reasons_for_marker(
        &pool,
        2 * TEST_CHUNK_SIZE as u64,
        PlayDirection::Forward,
        LoadInstruction::LoadImmediately,
        &mut NoService,
    );
    assert_eq!(pool.queued(StealableQueue::CurrentSongSampleData), ids);

    // Dropping the file demotes them on the next steal scan
    holder.set_audio_file(&pool, None, false, false, LoadInstruction::DontLoad, &mut NoService);
    assert_eq!(a.num_reasons(), 0);
    assert_eq!(pool.queued(StealableQueue::NoSongSampleData).len(), 2);
    assert_eq!(pool.queued(StealableQueue::CurrentSongSampleData).len(), 2);
}

#[test]
fn test_dropped_sample_returns_chunks_to_free_list_on_steal() {
    let (pool, mut samples) = setup(2, &["a.wav", "b.wav"]);
    let b = samples.pop().unwrap();
    let a = samples.pop().unwrap();

    drop(pool.acquire(&a, 0, LoadInstruction::LoadImmediately, &mut NoService).unwrap());
    drop(pool.acquire(&a, 1, LoadInstruction::LoadImmediately, &mut NoService).unwrap());
    assert_eq!(pool.num_free(), 0);
    drop(a);

    let _reason = pool.acquire(&b, 0, LoadInstruction::DontLoad, &mut NoService).unwrap();
    assert_eq!(pool.num_free(), 1);
    assert_eq!(pool.metrics().snapshot().steals, 0);
}
