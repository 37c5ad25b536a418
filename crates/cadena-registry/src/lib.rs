//! Plugin catalog and factory for the cadena DSP engine.
//!
//! The registry enumerates every built-in plugin kind with metadata for
//! host UIs and a default-constructor for instantiating one at runtime.
//! It is populated once at construction and read-only afterwards, so the
//! realtime thread may consult it freely.
//!
//! # Example
//!
//! ```rust
//! use cadena_core::Plugin;
//! use cadena_registry::{PluginCategory, Registry};
//!
//! let registry = Registry::new();
//! for info in registry.all() {
//!     println!("{}: {}", info.name, info.description);
//! }
//! let limiter = registry.create("lookahead-limiter").unwrap();
//! let spec = limiter.specs(48000);
//! assert_eq!(spec.latency, 128);
//! ```

use std::sync::Arc;

use cadena_core::{Buffer, ChannelLayout, Plugin};
use cadena_plugins::{
    Compressor, CubicLimiter, Delay, DelayDynamic, Filter, Gate, LookaheadLimiter, LowPassFir,
    Reverb, Rms, Sampler, SamplerConfig, Spatialize,
};

/// Category of a plugin, for organization and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginCategory {
    /// Compressors, limiters, gates.
    Dynamics,
    /// IIR and FIR filters.
    Filter,
    /// Delays and reverbs.
    TimeBased,
    /// Sound sources.
    Generator,
    /// Spatial placement.
    Spatial,
    /// Meters and analysis taps.
    Monitoring,
}

impl PluginCategory {
    /// Human-readable category name.
    pub const fn name(&self) -> &'static str {
        match self {
            PluginCategory::Dynamics => "Dynamics",
            PluginCategory::Filter => "Filter",
            PluginCategory::TimeBased => "Time-Based",
            PluginCategory::Generator => "Generator",
            PluginCategory::Spatial => "Spatial",
            PluginCategory::Monitoring => "Monitoring",
        }
    }
}

/// Metadata describing one plugin kind.
#[derive(Debug, Clone, Copy)]
pub struct PluginInfo {
    /// Unique identifier (lowercase, hyphenated).
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Category for grouping.
    pub category: PluginCategory,
}

/// Factory producing a plugin with default configuration.
type PluginFactory = fn() -> Box<dyn Plugin>;

struct Entry {
    info: PluginInfo,
    factory: PluginFactory,
}

/// Catalog of every built-in plugin kind.
pub struct Registry {
    entries: Vec<Entry>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Registry with all built-in plugins registered.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::with_capacity(12),
        };
        registry.register_builtins();
        registry
    }

    fn register_builtins(&mut self) {
        self.register(
            PluginInfo {
                id: "cubic-limiter",
                name: "Cubic Limiter",
                description: "Stateless cubic soft clipper with gain compensation",
                category: PluginCategory::Dynamics,
            },
            || Box::new(CubicLimiter::default()),
        );
        self.register(
            PluginInfo {
                id: "lookahead-limiter",
                name: "Lookahead Limiter",
                description: "True-peak limiter with a 128-frame preview window",
                category: PluginCategory::Dynamics,
            },
            || Box::new(LookaheadLimiter::default()),
        );
        self.register(
            PluginInfo {
                id: "compressor",
                name: "Compressor",
                description: "RMS-sidechain compressor with dB-domain gain",
                category: PluginCategory::Dynamics,
            },
            || Box::new(Compressor::default()),
        );
        self.register(
            PluginInfo {
                id: "gate",
                name: "Gate",
                description: "Noise gate with optional sidechain effects",
                category: PluginCategory::Dynamics,
            },
            || Box::new(Gate::default()),
        );
        self.register(
            PluginInfo {
                id: "filter",
                name: "Filter",
                description: "Cascaded one-pole IIR low/high/band-pass",
                category: PluginCategory::Filter,
            },
            || Box::new(Filter::default()),
        );
        self.register(
            PluginInfo {
                id: "lowpass-fir",
                name: "FIR Low Pass",
                description: "Linear-phase windowed-sinc brick-wall low-pass",
                category: PluginCategory::Filter,
            },
            || Box::new(LowPassFir::default()),
        );
        self.register(
            PluginInfo {
                id: "delay",
                name: "Delay",
                description: "Feedback delay with ping-pong and a wet-path chain",
                category: PluginCategory::TimeBased,
            },
            || Box::new(Delay::default()),
        );
        self.register(
            PluginInfo {
                id: "delay-dynamic",
                name: "Dynamic Delay",
                description: "Follower-driven fractional delay with kernel reads",
                category: PluginCategory::TimeBased,
            },
            || Box::new(DelayDynamic::default()),
        );
        self.register(
            PluginInfo {
                id: "reverb",
                name: "Reverb",
                description: "Parallel feedback delay bank with damping",
                category: PluginCategory::TimeBased,
            },
            || Box::new(Reverb::default()),
        );
        self.register(
            PluginInfo {
                id: "sampler",
                name: "Sampler",
                description: "Polyphonic buffer player with ADSR voices",
                category: PluginCategory::Generator,
            },
            || {
                // Default instance plays silence until a source is set.
                let silent = Arc::new(Buffer::new(1, 0, 0, ChannelLayout::mono(), 48000));
                Box::new(Sampler::new(SamplerConfig::one_shot(silent)))
            },
        );
        self.register(
            PluginInfo {
                id: "spatialize",
                name: "Spatialize",
                description: "3D panner with doppler and distance filtering",
                category: PluginCategory::Spatial,
            },
            || Box::new(Spatialize::new(Default::default())),
        );
        self.register(
            PluginInfo {
                id: "rms",
                name: "RMS",
                description: "Windowed RMS monitor",
                category: PluginCategory::Monitoring,
            },
            || Box::new(Rms::default()),
        );
    }

    /// Register one entry.
    fn register(&mut self, info: PluginInfo, factory: PluginFactory) {
        self.entries.push(Entry { info, factory });
    }

    /// Metadata for every registered kind.
    pub fn all(&self) -> impl Iterator<Item = &PluginInfo> {
        self.entries.iter().map(|entry| &entry.info)
    }

    /// Metadata for the kinds in one category.
    pub fn in_category(&self, category: PluginCategory) -> impl Iterator<Item = &PluginInfo> {
        self.entries
            .iter()
            .filter(move |entry| entry.info.category == category)
            .map(|entry| &entry.info)
    }

    /// Metadata for one kind by id.
    pub fn get(&self, id: &str) -> Option<&PluginInfo> {
        self.entries
            .iter()
            .find(|entry| entry.info.id == id)
            .map(|entry| &entry.info)
    }

    /// Instantiate one kind by id with its default configuration.
    pub fn create(&self, id: &str) -> Option<Box<dyn Plugin>> {
        self.entries
            .iter()
            .find(|entry| entry.info.id == id)
            .map(|entry| (entry.factory)())
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
