//! Playback rate application and re-assertion.
//!
//! The preferred rate lives on the video element as a data attribute, so it
//! outlives the controller: a rebuilt controller picks it up again.

use crate::Engine;
use crate::log_failure;
use vs_dom::DomHost;
use vs_dom::NodeId;
use vs_dom::TimerHost;

pub const PREFERRED_RATE_ATTR: &str = "data-vs-preferred-rate";

/// Value of the synthetic dropdown entry selected when no preset matches.
pub const CUSTOM_PRESET_VALUE: &str = "custom";

const RATE_EPSILON: f64 = 1e-9;

/// Shortest decimal form, e.g. `2`, `1.5`, `0.1`.
pub fn format_rate(rate: f64) -> String {
    rate.to_string()
}

/// Parses user input; non-numeric and non-finite text yields `None`.
pub fn parse_rate(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|rate| rate.is_finite())
}

pub fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

pub(crate) fn same_rate(left: f64, right: f64) -> bool {
    (left - right).abs() < RATE_EPSILON
}

impl<H: DomHost + TimerHost> Engine<H> {
    /// Sets `video` to `rate` and records it as the preferred rate.
    ///
    /// Returns `false` without touching anything when `rate` is not a positive
    /// finite number or the host refuses it.
    pub fn apply_rate(&mut self, video: NodeId, rate: f64) -> bool {
        if !is_valid_rate(rate) {
            log::trace!("ignoring invalid rate {rate} for video {video}");
            return false;
        }

        if let Err(error) = self.host.set_playback_rate(video, rate) {
            log::warn!("failed to set playback rate {rate} on video {video}: {error}");
            return false;
        }

        log_failure(
            "failed to store preferred rate",
            self.host
                .set_attribute(video, PREFERRED_RATE_ATTR, &format_rate(rate)),
        );
        self.reflect_rate(video, rate);
        log::debug!("video {video} playback rate set to {rate}");
        true
    }

    /// Stored preferred rate, if present and valid.
    pub fn preferred_rate(&self, video: NodeId) -> Option<f64> {
        self.host
            .attribute(video, PREFERRED_RATE_ATTR)
            .and_then(|value| parse_rate(&value))
            .filter(|rate| *rate > 0.0)
    }

    /// Dropdown value for `rate`: the matching preset or the custom marker.
    pub fn preset_value_for(&self, rate: f64) -> String {
        self.config
            .presets
            .iter()
            .find(|preset| same_rate(**preset, rate))
            .map(|preset| format_rate(*preset))
            .unwrap_or_else(|| CUSTOM_PRESET_VALUE.to_owned())
    }

    /// Forces the live rate back to the preferred rate when they differ.
    pub(crate) fn enforce(&mut self, video: NodeId) {
        let Some(preferred) = self.preferred_rate(video) else {
            return;
        };
        let Some(live) = self.host.playback_rate(video) else {
            return;
        };
        if same_rate(live, preferred) {
            return;
        }

        log::trace!("video {video} drifted to {live}; restoring {preferred}");
        log_failure(
            "failed to restore preferred rate",
            self.host.set_playback_rate(video, preferred),
        );
    }

    /// Adopts a rate that predates the controller: a stored preference first,
    /// then any non-default live rate set by the page.
    pub(crate) fn adopt_initial_rate(&mut self, video: NodeId) {
        if let Some(preferred) = self.preferred_rate(video) {
            self.apply_rate(video, preferred);
            return;
        }

        match self.host.playback_rate(video) {
            Some(live) if !same_rate(live, 1.0) => {
                self.apply_rate(video, live);
            }
            _ => {}
        }
    }

    pub(crate) fn on_play(&mut self, video: NodeId) {
        if self.registry.contains(video) {
            self.enforce(video);
        }
    }

    pub(crate) fn on_enforce_tick(&mut self, video: NodeId) {
        if self.host.is_paused(video) {
            return;
        }
        self.enforce(video);
    }

    fn reflect_rate(&mut self, video: NodeId, rate: f64) {
        let Some(registration) = self.registry.get(video) else {
            return;
        };
        let (select, input) = (registration.select, registration.input);

        let preset = self.preset_value_for(rate);
        log_failure(
            "failed to reflect rate into presets",
            self.host.set_value(select, &preset),
        );
        log_failure(
            "failed to reflect rate into input",
            self.host.set_value(input, &format_rate(rate)),
        );
    }
}
