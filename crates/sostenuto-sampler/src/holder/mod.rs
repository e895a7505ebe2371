//! Per-playback sample holders.
//!
//! A [`SampleHolder`] binds one sample, a playback range within it, and a
//! [`ChunkWindow`] of chunks claimed near the range's start (or end, when
//! playing in reverse).

mod window;

pub use window::ChunkWindow;

use crate::pool::{ChunkPool, LoadInstruction};
use crate::sample::{Sample, SampleReason};
use sostenuto_core::{PlayDirection, RealtimeService, UNITY_PHASE_INCREMENT};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// End position meaning "the end of the file".
pub const END_POS_UNSET: u64 = u64::MAX;

#[derive(Debug)]
pub struct SampleHolder {
    pub file_path: PathBuf,
    start_pos: u64,
    end_pos: u64,
    audio_file: Option<SampleReason>,
    neutral_phase_increment: u32,
    window: ChunkWindow,
    pub waveform_view_scroll: i32,
    pub waveform_view_zoom: i32,
}

impl Default for SampleHolder {
    fn default() -> Self {
        Self {
            file_path: PathBuf::new(),
            start_pos: 0,
            end_pos: END_POS_UNSET,
            audio_file: None,
            neutral_phase_increment: UNITY_PHASE_INCREMENT,
            window: ChunkWindow::new(),
            waveform_view_scroll: 0,
            waveform_view_zoom: 0,
        }
    }
}

impl SampleHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&self) -> Option<&Arc<Sample>> {
        self.audio_file.as_ref().map(SampleReason::sample)
    }

    pub fn start_pos(&self) -> u64 {
        self.start_pos
    }

    /// Raw end position, possibly [`END_POS_UNSET`] or past the file's end.
    pub fn end_pos_raw(&self) -> u64 {
        self.end_pos
    }

    /// Set the playback range in frames. Takes effect at the next claim.
    pub fn set_range(&mut self, start_pos: u64, end_pos: u64) {
        self.start_pos = start_pos;
        self.end_pos = end_pos;
    }

    /// Sample rate relative to the system rate, 24-bit fixed point.
    pub fn neutral_phase_increment(&self) -> u32 {
        self.neutral_phase_increment
    }

    pub fn window(&self) -> &ChunkWindow {
        &self.window
    }

    /// Bind `file` (or nothing) and claim a fresh window.
    ///
    /// A manually selected file plays in full. Otherwise the existing range is
    /// kept, clamped to the file; an unset or zero end means the file's end,
    /// and an empty range restarts from the beginning.
    pub fn set_audio_file(
        &mut self,
        pool: &ChunkPool,
        file: Option<Arc<Sample>>,
        reversed: bool,
        manually_selected: bool,
        instruction: LoadInstruction,
        rt: &mut dyn RealtimeService,
    ) {
        // Reason on the new file before the old one goes, and the old file's
        // reason before its chunks, so they park in the tier it now belongs to
        let reason = file.as_ref().map(Sample::add_reason);
        self.audio_file = reason;
        self.window.release_all();

        let Some(sample) = file else {
            return;
        };

        let length = sample.length_in_samples();
        if manually_selected {
            self.start_pos = 0;
            self.end_pos = length;
        } else {
            self.start_pos = self.start_pos.min(length);
            if self.end_pos == 0 || self.end_pos == END_POS_UNSET {
                self.end_pos = length;
            }
            if self.end_pos <= self.start_pos {
                self.start_pos = 0;
            }
        }

        self.neutral_phase_increment = ((sample.sample_rate() as u64) << 24)
            .checked_div(pool.config().system_sample_rate as u64)
            .map_or(UNITY_PHASE_INCREMENT, |npi| npi.min(u32::MAX as u64) as u32);

        debug!(
            path = %sample.path().display(),
            start = self.start_pos,
            end = self.end_pos,
            "audio file set"
        );

        self.claim_cluster_reasons(pool, reversed, instruction, rt);
    }

    /// Claim the window at the point playback starts from.
    ///
    /// Forward play starts a margin before the start position; reverse play a
    /// margin after the last frame before the end position.
    pub fn claim_cluster_reasons(
        &mut self,
        pool: &ChunkPool,
        reversed: bool,
        instruction: LoadInstruction,
        rt: &mut dyn RealtimeService,
    ) {
        let Some(sample) = self.sample().cloned() else {
            debug!("no audio file to claim chunks for");
            return;
        };

        let margin = pool.config().marker_frames_before_claim;
        let frame = if reversed {
            let last = sample.length_in_samples() as i64 - 1;
            let from = self.get_end_pos(false) as i64 - 1 + margin as i64;
            from.min(last).max(0) as u64
        } else {
            self.start_pos.saturating_sub(margin)
        };

        let byte_offset = sample.frame_to_byte(frame);
        self.claim_cluster_reasons_for_marker(
            pool,
            byte_offset,
            PlayDirection::from_reversed(reversed),
            instruction,
            rt,
        );
    }

    /// Claim the window from the chunk containing `byte_offset`.
    pub fn claim_cluster_reasons_for_marker(
        &mut self,
        pool: &ChunkPool,
        byte_offset: u64,
        direction: PlayDirection,
        instruction: LoadInstruction,
        rt: &mut dyn RealtimeService,
    ) {
        let Some(sample) = self.sample().cloned() else {
            return;
        };
        self.window
            .claim_for_marker(pool, &sample, byte_offset, direction, instruction, rt);
    }

    /// Become a copy of `other`: same file and range, with a window of our own.
    ///
    /// An `other` with no audio file leaves this holder as it is.
    pub fn been_cloned_from(
        &mut self,
        pool: &ChunkPool,
        other: &SampleHolder,
        reversed: bool,
        rt: &mut dyn RealtimeService,
    ) {
        let Some(sample) = other.sample().cloned() else {
            return;
        };
        self.file_path = other.file_path.clone();
        self.start_pos = other.start_pos;
        self.end_pos = other.end_pos;
        self.waveform_view_scroll = other.waveform_view_scroll;
        self.waveform_view_zoom = other.waveform_view_zoom;
        self.set_audio_file(
            pool,
            Some(sample),
            reversed,
            false,
            LoadInstruction::Enqueue,
            rt,
        );
    }

    /// Release every chunk in the window. Returns how many were held.
    pub fn unassign_all_cluster_reasons(&mut self) -> usize {
        self.window.release_all()
    }

    /// End of the playback range.
    ///
    /// Time-stretch callers see the stored end as is; everyone else gets it
    /// clamped to the file's length.
    pub fn get_end_pos(&self, for_time_stretch: bool) -> u64 {
        if for_time_stretch {
            return self.end_pos;
        }
        let length = self.sample().map_or(0, |s| s.length_in_samples());
        self.end_pos.min(length)
    }

    pub fn get_duration_in_samples(&self, for_time_stretch: bool) -> u64 {
        self.get_end_pos(for_time_stretch)
            .saturating_sub(self.start_pos)
    }

    /// Duration converted to the system sample rate.
    pub fn get_length_in_samples_at_system_sample_rate(&self, for_time_stretch: bool) -> u64 {
        let duration = self.get_duration_in_samples(for_time_stretch);
        if self.neutral_phase_increment == UNITY_PHASE_INCREMENT {
            return duration;
        }
        let scaled = ((duration as u128) << 24) / self.neutral_phase_increment.max(1) as u128;
        scaled.min(u64::MAX as u128) as u64
    }
}
