use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::cache::WallSettings;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Number of image slots per ring store.
    pub ring_capacity: usize,
    /// Maximum slots per shard (array layers per GPU texture).
    pub shard_capacity: usize,
    /// Minimum time a tile shows an image before it may switch.
    #[serde(with = "humantime_serde")]
    pub switch_interval: Duration,
    /// Share of eligible tiles that actually switch per tick.
    pub random_switch_fraction: f32,
    /// Upload attempts per tick; 0 drains the queue every tick.
    pub max_uploads_per_tick: usize,
    /// Extra attempts for an image whose upload failed before it is dropped.
    pub upload_retries: u32,
    pub tile_grid: TileGrid,
    /// Canonical size every image is resampled to before it is queued.
    pub image_size: ImageSize,
    /// Pacing of the render tick loop.
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    /// Optional deterministic seed for tile switch shuffling.
    pub tile_shuffle_seed: Option<u64>,
    /// Feeders producing raw image bytes.
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TileGrid {
    pub columns: usize,
    pub rows: usize,
}

impl TileGrid {
    pub fn tile_count(&self) -> usize {
        self.columns * self.rows
    }
}

impl Default for TileGrid {
    fn default() -> Self {
        Self {
            columns: 4,
            rows: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ImageSize {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SourceConfig {
    /// Generated gradient cards, useful without any input at all.
    Synthetic {
        #[serde(
            default = "SourceConfig::default_synthetic_interval",
            with = "humantime_serde"
        )]
        interval: Duration,
    },
    /// Replays the images found in a directory, cycling forever.
    Directory {
        path: PathBuf,
        #[serde(
            default = "SourceConfig::default_directory_interval",
            with = "humantime_serde"
        )]
        interval: Duration,
    },
}

impl SourceConfig {
    const fn default_synthetic_interval() -> Duration {
        Duration::from_millis(500)
    }

    const fn default_directory_interval() -> Duration {
        Duration::from_secs(1)
    }

    pub fn interval(&self) -> Duration {
        match self {
            Self::Synthetic { interval } | Self::Directory { interval, .. } => *interval,
        }
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.interval() > Duration::ZERO,
            "source interval must be positive"
        );
        if let Self::Directory { path, .. } = self {
            ensure!(
                !path.as_os_str().is_empty(),
                "directory source requires a path"
            );
        }
        Ok(())
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.ring_capacity > 0,
            "ring-capacity must be greater than zero"
        );
        ensure!(
            self.shard_capacity > 0,
            "shard-capacity must be greater than zero"
        );
        ensure!(
            self.random_switch_fraction.is_finite()
                && (0.0..=1.0).contains(&self.random_switch_fraction),
            "random-switch-fraction must be within [0, 1]"
        );
        ensure!(
            self.switch_interval > Duration::ZERO,
            "switch-interval must be positive"
        );
        ensure!(
            self.tick_interval > Duration::ZERO,
            "tick-interval must be positive"
        );
        ensure!(
            self.tile_grid.columns > 0 && self.tile_grid.rows > 0,
            "tile-grid dimensions must be greater than zero"
        );
        ensure!(
            self.image_size.width > 0 && self.image_size.height > 0,
            "image-size dimensions must be greater than zero"
        );
        for (idx, source) in self.sources.iter().enumerate() {
            source
                .validate()
                .with_context(|| format!("invalid source #{idx}"))?;
        }
        Ok(self)
    }

    /// Cache settings, with the shard size clamped to a backend limit if one
    /// is known (e.g. the device's maximum texture array layers).
    pub fn wall_settings(&self, shard_limit: Option<usize>) -> WallSettings {
        let shard_capacity = match shard_limit {
            Some(limit) => self.shard_capacity.min(limit.max(1)),
            None => self.shard_capacity,
        };
        WallSettings {
            ring_capacity: self.ring_capacity,
            shard_capacity,
            max_uploads_per_tick: self.max_uploads_per_tick,
            upload_retries: self.upload_retries,
            switch_interval: self.switch_interval,
            random_switch_fraction: self.random_switch_fraction,
            tile_count: self.tile_grid.tile_count(),
            tile_shuffle_seed: self.tile_shuffle_seed,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        let wall = WallSettings::default();
        Self {
            ring_capacity: wall.ring_capacity,
            shard_capacity: wall.shard_capacity,
            switch_interval: wall.switch_interval,
            random_switch_fraction: wall.random_switch_fraction,
            max_uploads_per_tick: wall.max_uploads_per_tick,
            upload_retries: wall.upload_retries,
            tile_grid: TileGrid::default(),
            image_size: ImageSize::default(),
            tick_interval: Duration::from_millis(16),
            tile_shuffle_seed: None,
            sources: vec![SourceConfig::Synthetic {
                interval: SourceConfig::default_synthetic_interval(),
            }],
        }
    }
}
