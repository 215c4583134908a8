// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canvas tuning parameters.
//!
//! [`CanvasConfig`] gathers every knob of the redraw engine. All fields are
//! public and independent; [`CanvasConfig::validate`] checks the ranges the
//! engine relies on before a config is installed.

use core::fmt;
use core::time::Duration;

use crate::updater::Strategy;

/// Whether page and desk colours may be baked into the stores.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BackgroundPolicy {
    /// Bake the background in when both colours are opaque and the backend
    /// is not accelerated.
    #[default]
    Auto,
    /// Always keep the stores transparent and paint the background at
    /// composite time.
    Never,
}

/// Configuration for the redraw engine.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CanvasConfig {
    /// Target tile edge length in pixels.
    pub tile_size: i32,
    /// Margin around the viewport that is rendered ahead of time.
    pub prerender: i32,
    /// Extra margin allocated around the prerender margin so the store need
    /// not move on every small pan.
    pub padding: i32,
    /// Thin tiles at the edge of the area being painted are widened to this
    /// size, within the store.
    pub preempt: i32,
    /// Rectangles with a smaller minimum extent are merged with neighbours.
    pub coarsener_min_size: i32,
    /// How far the coarsener reaches for neighbours to merge.
    pub coarsener_glue_size: i32,
    /// Smallest fraction of a merged rectangle that must be real work.
    pub coarsener_min_fullness: f64,
    /// Wall-clock budget for the interruptible part of a cycle.
    pub render_time_limit: Duration,
    /// Worker thread count; `0` picks one less than the number of cores.
    pub num_threads: usize,
    /// Dirty-region strategy.
    pub update_strategy: Strategy,
    /// Background baking policy.
    pub background_in_stores: BackgroundPolicy,
    /// Paint the item being dragged before anything else, without a time
    /// budget.
    pub block_updates: bool,
    /// While decoupled, restart once the view is this many times more
    /// detailed than the store.
    pub restart_zoom_in_ratio: f64,
    /// While decoupled, restart once the view is this fraction as detailed
    /// as the store.
    pub restart_zoom_out_ratio: f64,
    /// Coefficient tolerance under which a snapshot paste counts as exact.
    pub snapshot_identity_tolerance: f64,
    /// Opacity of the white wash painted under outline overlays (0–1).
    pub outline_overlay_opacity: f64,
    /// Never leave or restart decoupled mode.
    pub debug_sticky_decoupled: bool,
    /// Skip painting entirely.
    pub debug_disable_redraw: bool,
    /// Sleep this long after every tile.
    pub debug_delay_redraw: Option<Duration>,
    /// Tint freshly painted tiles with a random translucent colour.
    pub debug_show_redraw: bool,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self::software()
    }
}

impl CanvasConfig {
    /// Defaults tuned for the software backend.
    #[must_use]
    pub const fn software() -> Self {
        Self {
            tile_size: 300,
            prerender: 100,
            padding: 350,
            preempt: 250,
            coarsener_min_size: 200,
            coarsener_glue_size: 80,
            coarsener_min_fullness: 0.3,
            render_time_limit: Duration::from_millis(80),
            num_threads: 0,
            update_strategy: Strategy::Multiscale,
            background_in_stores: BackgroundPolicy::Auto,
            block_updates: true,
            restart_zoom_in_ratio: 3.0,
            restart_zoom_out_ratio: 0.7,
            snapshot_identity_tolerance: 0.001,
            outline_overlay_opacity: 0.5,
            debug_sticky_decoupled: false,
            debug_disable_redraw: false,
            debug_delay_redraw: None,
            debug_show_redraw: false,
        }
    }

    /// Defaults for accelerated backends, which composite cheaply and so
    /// favour larger tiles.
    #[must_use]
    pub const fn accelerated() -> Self {
        Self {
            tile_size: 400,
            background_in_stores: BackgroundPolicy::Never,
            ..Self::software()
        }
    }

    /// Resolves [`num_threads`](Self::num_threads) to a concrete count.
    ///
    /// An explicit setting wins; otherwise one less than the available
    /// parallelism (at least one), falling back to four if unknown.
    #[must_use]
    pub fn resolved_num_threads(&self) -> usize {
        if self.num_threads > 0 {
            return self.num_threads;
        }
        match std::thread::available_parallelism() {
            Ok(n) => n.get().saturating_sub(1).max(1),
            Err(_) => 4,
        }
    }

    /// Checks that every field is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size <= 0 {
            return Err(ConfigError::NonPositive("tile_size"));
        }
        for (name, v) in [
            ("prerender", self.prerender),
            ("padding", self.padding),
            ("preempt", self.preempt),
            ("coarsener_min_size", self.coarsener_min_size),
            ("coarsener_glue_size", self.coarsener_glue_size),
        ] {
            if v < 0 {
                return Err(ConfigError::Negative(name));
            }
        }
        if !(0.0..=1.0).contains(&self.coarsener_min_fullness) {
            return Err(ConfigError::OutOfRange("coarsener_min_fullness"));
        }
        if !(0.0..=1.0).contains(&self.outline_overlay_opacity) {
            return Err(ConfigError::OutOfRange("outline_overlay_opacity"));
        }
        if self.render_time_limit.is_zero() {
            return Err(ConfigError::NonPositive("render_time_limit"));
        }
        if self.snapshot_identity_tolerance.partial_cmp(&0.0) != Some(core::cmp::Ordering::Greater) {
            return Err(ConfigError::NonPositive("snapshot_identity_tolerance"));
        }
        if !(self.restart_zoom_out_ratio > 0.0
            && self.restart_zoom_out_ratio < 1.0
            && self.restart_zoom_in_ratio > 1.0)
        {
            return Err(ConfigError::RestartThresholds {
                zoom_in: self.restart_zoom_in_ratio,
                zoom_out: self.restart_zoom_out_ratio,
            });
        }
        Ok(())
    }
}

/// Reason a [`CanvasConfig`] was rejected.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConfigError {
    /// The named field must be greater than zero.
    NonPositive(&'static str),
    /// The named field must not be negative.
    Negative(&'static str),
    /// The named field must lie in `[0, 1]`.
    OutOfRange(&'static str),
    /// The decoupled-mode restart thresholds must bracket 1.
    RestartThresholds {
        /// Configured zoom-in ratio.
        zoom_in: f64,
        /// Configured zoom-out ratio.
        zoom_out: f64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositive(name) => write!(f, "`{name}` must be greater than zero"),
            Self::Negative(name) => write!(f, "`{name}` must not be negative"),
            Self::OutOfRange(name) => write!(f, "`{name}` must be between 0 and 1"),
            Self::RestartThresholds { zoom_in, zoom_out } => write!(
                f,
                "restart thresholds must satisfy 0 < zoom_out ({zoom_out}) < 1 < zoom_in ({zoom_in})"
            ),
        }
    }
}

impl core::error::Error for ConfigError {}
