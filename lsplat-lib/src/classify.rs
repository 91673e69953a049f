use serde::{Deserialize, Serialize};

use crate::common::{lerp_u8, SIMILARITY_THRESHOLD};
use crate::store::SplatData;
use crate::structures::Category;

/// Linear color ramp from `cold` at `value_min` to `hot` at `value_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HeatMap {
    pub value_min: f32,
    pub value_max: f32,
    pub cold: [u8; 3],
    pub hot: [u8; 3],
}

impl Default for HeatMap {
    fn default() -> Self {
        HeatMap {
            value_min: SIMILARITY_THRESHOLD,
            value_max: 1.0,
            cold: [0, 0, 255],
            hot: [255, 0, 0],
        }
    }
}

impl HeatMap {
    /// Values outside the range clamp to the nearest endpoint. An empty or inverted range acts
    /// as a step at `value_max`.
    pub fn color(&self, value: f32) -> [u8; 3] {
        let t = if self.value_max > self.value_min {
            ((value - self.value_min) / (self.value_max - self.value_min)).clamp(0.0, 1.0)
        } else if value >= self.value_max {
            1.0
        } else {
            0.0
        };
        [
            lerp_u8(self.cold[0], self.hot[0], t),
            lerp_u8(self.cold[1], self.hot[1], t),
            lerp_u8(self.cold[2], self.hot[2], t),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClassifierConfig {
    /// Splats scoring strictly above this are recolored.
    pub threshold: f32,
    pub heat: HeatMap,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            threshold: SIMILARITY_THRESHOLD,
            heat: HeatMap::default(),
        }
    }
}

impl SplatData {
    /// Highlights splats matching the named category with the default configuration.
    /// Unknown names fall back to "car".
    pub fn classify(&mut self, category: &str) -> usize {
        self.classify_with(Category::from_name(category), &ClassifierConfig::default())
    }

    /// Recolors every splat whose `category` score is above the threshold and restores every
    /// other splat to its baseline color. Alpha is kept on recolored splats.
    ///
    /// Returns how many splats were highlighted.
    pub fn classify_with(&mut self, category: Category, config: &ClassifierConfig) -> usize {
        let Some(similarity) = &self.similarity else {
            log::debug!("No similarity channels loaded, skipping '{}'", category);
            return 0;
        };
        let scores = similarity.channel(category);

        let mut highlighted = 0;
        for ((color, baseline), &score) in self
            .colors
            .chunks_exact_mut(4)
            .zip(self.baseline_colors.chunks_exact(4))
            .zip(scores)
        {
            if score > config.threshold {
                color[..3].copy_from_slice(&config.heat.color(score));
                highlighted += 1;
            } else {
                color.copy_from_slice(baseline);
            }
        }

        log::info!(
            "Highlighted {} of {} splats as '{}'",
            highlighted,
            self.vertex_count,
            category
        );
        self.changed = true;
        highlighted
    }
}
