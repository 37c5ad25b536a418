//! Polyphonic sampler.
//!
//! Plays instances of one source buffer, each with its own ADSR envelope,
//! speed follower (pitch), and volume follower, mixed on top of whatever
//! is already in the processed buffer. Reads go through the Lanczos bank
//! at a rate matched to the playback speed, so playing fast does not
//! alias and playing slow interpolates cleanly.
//!
//! The instance table is the one place where the realtime thread and
//! control threads meet: control calls ([`play`](Sampler::play),
//! [`stop`](Sampler::stop), speed/gain setters) take `&self` and lock a
//! mutex that [`Plugin::process`] also holds for the duration of a block.
//! Keep control-side work under the lock small.

use std::sync::{Arc, Mutex};

use cadena_core::{
    AdsrConfig, AdsrInstance, Buffer, BufferViewMut, LinearFollower, Meters, Plugin, PluginHeader,
    ProcessFlags, Result, amp_to_db, db_to_amp, default_lanczos, radius_for_rate,
    sample_view_with_kernel,
};
use libm::floorf;

/// Most instances that may sound at once; further `play` calls are
/// ignored.
pub const MAX_INSTANCES: usize = 128;

/// Largest bank radius the sampler will reach for.
const MAX_KERNEL_RADIUS: usize = 32;

/// Configuration for [`Sampler`].
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// The sound being played.
    pub buffer: Arc<Buffer>,
    /// How long a speed change takes to glide in, in ms.
    pub speed_transition_time_ms: f32,
    /// How long a volume change takes to glide in, in ms (the glide runs
    /// in amplitude space).
    pub volume_transition_time_ms: f32,
    /// Whether instances loop.
    pub loop_enabled: bool,
    /// At a loop point, reverse direction instead of wrapping (requires
    /// [`loop_enabled`](Self::loop_enabled)).
    pub pingpong: bool,
    /// First frame of the looping region; values past the buffer are
    /// treated as 0.
    pub loop_start: usize,
    /// One past the last frame of the looping region; values at or below
    /// `loop_start` are treated as the buffer length.
    pub loop_end: usize,
    /// Per-instance amplitude envelope.
    pub envelope: AdsrConfig,
}

impl SamplerConfig {
    /// Configuration playing `buffer` once per instance, no loop.
    pub fn one_shot(buffer: Arc<Buffer>) -> Self {
        Self {
            buffer,
            speed_transition_time_ms: 50.0,
            volume_transition_time_ms: 50.0,
            loop_enabled: false,
            pingpong: false,
            loop_start: 0,
            loop_end: 0,
            envelope: AdsrConfig::default(),
        }
    }

    /// Effective loop region after the fallback rules.
    fn loop_region(&self) -> (i64, i64) {
        let frames = self.buffer.frames() as i64;
        let start = if (self.loop_start as i64) >= frames {
            0
        } else {
            self.loop_start as i64
        };
        let end = if (self.loop_end as i64) <= start {
            frames
        } else {
            self.loop_end as i64
        };
        (start, end)
    }
}

/// One sounding voice.
#[derive(Debug, Clone)]
struct Instance {
    id: u32,
    frame: i64,
    fraction: f32,
    reverse: bool,
    envelope: AdsrInstance,
    speed: LinearFollower,
    volume: LinearFollower,
}

/// Control-shared state: the voice table and the id counter.
#[derive(Debug, Default)]
struct VoiceTable {
    instances: Vec<Instance>,
    next_id: u32,
}

impl VoiceTable {
    fn get_mut(&mut self, id: u32) -> Option<&mut Instance> {
        self.instances.iter_mut().find(|i| i.id == id)
    }
}

/// Polyphonic buffer player.
pub struct Sampler {
    header: PluginHeader,
    config: SamplerConfig,
    voices: Mutex<VoiceTable>,
    meters_output: Meters,
}

impl Sampler {
    /// Create with the given configuration.
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            header: PluginHeader::new("Sampler"),
            config,
            voices: Mutex::new(VoiceTable::default()),
            meters_output: Meters::new(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Replace the configuration. Running instances keep playing against
    /// the new source.
    pub fn set_config(&mut self, config: SamplerConfig) {
        self.config = config;
    }

    /// Start a new instance.
    ///
    /// `speed` scales playback rate (1.0 is native pitch; negative plays
    /// in reverse). `gain_db` sets the instance volume. Returns the
    /// instance id, or `None` when all [`MAX_INSTANCES`] voices are busy.
    pub fn play(&self, speed: f32, gain_db: f32) -> Option<u32> {
        let mut voices = self.voices.lock().unwrap_or_else(|e| e.into_inner());
        if voices.instances.len() >= MAX_INSTANCES {
            return None;
        }
        let id = voices.next_id;
        voices.next_id = voices.next_id.wrapping_add(1);
        let reverse = speed < 0.0;
        let start_frame = if reverse {
            self.config.buffer.frames().saturating_sub(1) as i64
        } else {
            0
        };
        let mut envelope = AdsrInstance::default();
        envelope.start();
        voices.instances.push(Instance {
            id,
            frame: start_frame,
            fraction: 0.0,
            reverse,
            envelope,
            speed: LinearFollower::at(speed.abs()),
            volume: LinearFollower::at(db_to_amp(gain_db)),
        });
        Some(id)
    }

    /// Trigger the release of one instance.
    pub fn stop(&self, id: u32) {
        let mut voices = self.voices.lock().unwrap_or_else(|e| e.into_inner());
        let envelope = self.config.envelope;
        if let Some(instance) = voices.get_mut(id) {
            instance.envelope.release(&envelope);
        }
    }

    /// Trigger the release of every instance.
    pub fn stop_all(&self) {
        let mut voices = self.voices.lock().unwrap_or_else(|e| e.into_inner());
        let envelope = self.config.envelope;
        for instance in &mut voices.instances {
            instance.envelope.release(&envelope);
        }
    }

    /// Retarget one instance's speed.
    pub fn set_speed(&self, id: u32, speed: f32) {
        let mut voices = self.voices.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(instance) = voices.get_mut(id) {
            instance.reverse = speed < 0.0;
            instance.speed.set_target(speed.abs());
        }
    }

    /// Current (glided) speed of one instance, or 0 if gone.
    pub fn speed_current(&self, id: u32) -> f32 {
        let mut voices = self.voices.lock().unwrap_or_else(|e| e.into_inner());
        voices.get_mut(id).map_or(0.0, |i| i.speed.value())
    }

    /// Retarget one instance's volume.
    pub fn set_gain(&self, id: u32, gain_db: f32) {
        let mut voices = self.voices.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(instance) = voices.get_mut(id) {
            instance.volume.set_target(db_to_amp(gain_db));
        }
    }

    /// Current (glided) volume of one instance in dB, or −inf if gone.
    pub fn gain_current(&self, id: u32) -> f32 {
        let mut voices = self.voices.lock().unwrap_or_else(|e| e.into_inner());
        voices
            .get_mut(id)
            .map_or(f32::NEG_INFINITY, |i| amp_to_db(i.volume.value()))
    }

    /// How many voices are sounding.
    pub fn active_voices(&self) -> usize {
        self.voices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .instances
            .len()
    }
}

impl Plugin for Sampler {
    fn header(&self) -> &PluginHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut PluginHeader {
        &mut self.header
    }

    fn process(&mut self, mut buffer: BufferViewMut<'_>, flags: ProcessFlags) -> Result<()> {
        if flags.contains(ProcessFlags::CUT) {
            self.reset();
        }

        let source = Arc::clone(&self.config.buffer);
        let src_view = source.view();
        let src_frames = source.frames() as i64;
        let src_channels = source.channels();
        if src_frames == 0 {
            return Ok(());
        }
        let (loop_start, loop_end) = self.config.loop_region();
        let envelope_config = self.config.envelope;
        let frame_ms = 1000.0 / buffer.samplerate() as f32;
        let speed_dt = if self.config.speed_transition_time_ms > 0.0 {
            frame_ms / self.config.speed_transition_time_ms
        } else {
            1.0
        };
        let volume_dt = if self.config.volume_transition_time_ms > 0.0 {
            frame_ms / self.config.volume_transition_time_ms
        } else {
            1.0
        };
        // Source and destination rates differ in general; native pitch
        // means stepping the source at this ratio.
        let rate_ratio = source.samplerate() as f32 / buffer.samplerate() as f32;
        let channels = buffer.channels();
        let frames = buffer.frames();
        let loop_enabled = self.config.loop_enabled;
        let pingpong = self.config.pingpong;

        let mut voices = self.voices.lock().unwrap_or_else(|e| e.into_inner());
        let mut frame_out = [0.0_f32; cadena_core::MAX_CHANNELS];
        for f in 0..frames {
            for instance in &mut voices.instances {
                let envelope_amp = instance.envelope.update(&envelope_config, frame_ms);
                if instance.envelope.is_stopped() {
                    continue;
                }
                let speed = instance.speed.update(speed_dt);
                let volume = instance.volume.update(volume_dt);
                let amp = envelope_amp * volume;

                let step = speed * rate_ratio;
                let rate = if step > 1.0 { 1.0 / step } else { 1.0 };
                let kernel = default_lanczos(radius_for_rate(rate, MAX_KERNEL_RADIUS));
                sample_view_with_kernel(
                    &mut frame_out[..src_channels],
                    kernel,
                    &src_view,
                    false,
                    instance.frame as isize,
                    instance.fraction,
                    rate,
                );
                for c in 0..channels {
                    let value = frame_out[c % src_channels] * amp;
                    let mixed = buffer.sample(f as isize, c) + value;
                    buffer.set_sample(f as isize, c, mixed);
                }

                // Advance the play head.
                let signed_step = if instance.reverse { -step } else { step };
                let pos = instance.frame as f32 + instance.fraction + signed_step;
                let mut frame = floorf(pos) as i64;
                let mut fraction = pos - floorf(pos);
                if loop_enabled {
                    if instance.reverse && frame < loop_start {
                        if pingpong {
                            instance.reverse = false;
                            frame = 2 * loop_start - frame;
                        } else {
                            frame += loop_end - loop_start;
                        }
                    } else if !instance.reverse && frame >= loop_end {
                        if pingpong {
                            instance.reverse = true;
                            frame = 2 * loop_end - frame - 1;
                            fraction = 1.0 - fraction;
                        } else {
                            frame -= loop_end - loop_start;
                        }
                    }
                } else if (instance.reverse && frame < -(kernel.length() as i64))
                    || (!instance.reverse && frame >= src_frames + kernel.length() as i64)
                {
                    // Ran off the sound (plus kernel tail): finish.
                    instance.envelope = AdsrInstance::default();
                }
                instance.frame = frame;
                instance.fraction = fraction;
            }
        }
        voices.instances.retain(|i| !i.envelope.is_stopped());
        drop(voices);

        if self.header.selected != 0 {
            self.meters_output.update(&buffer.as_view(), 1.0);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.voices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .instances
            .clear();
        self.meters_output.reset();
    }

    fn reset_channels(&mut self, first: usize, count: usize) {
        self.meters_output.reset_channels(first, count);
    }
}
