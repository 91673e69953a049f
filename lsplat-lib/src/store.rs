use std::mem;

use glam::{Quat, Vec3};

use crate::common::{quat_from_wxyz, rotation_matrix, write_wxyz};
use crate::error::SplatError;
use crate::structures::{Category, SimilarityChannels, SplatColumns};

/// Columnar attributes for `vertex_count` splats.
///
/// Rotations are stored dequantized as (w, x, y, z). `baseline_colors` is the color column as it
/// was at construction and is what the classifier restores to.
#[derive(Debug, Default)]
pub struct SplatData {
    pub(crate) vertex_count: usize,
    pub(crate) positions: Vec<f32>,
    pub(crate) rotations: Vec<f32>,
    pub(crate) scales: Vec<f32>,
    pub(crate) colors: Vec<u8>,
    pub(crate) selection: Vec<u8>,
    pub(crate) baseline_colors: Vec<u8>,
    pub(crate) similarity: Option<SimilarityChannels>,
    /// Set by every mutation. Never cleared here, consumers reset it once they have caught up.
    pub changed: bool,
    detached: bool,
}

#[inline]
fn check_len(field: &'static str, expected: usize, actual: usize) -> Result<(), SplatError> {
    if expected != actual {
        return Err(SplatError::SizeMismatch {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_selection(selection: &[u8]) -> Result<(), SplatError> {
    match selection.iter().position(|&s| s > 1) {
        Some(index) => Err(SplatError::InvalidSelection {
            index,
            value: selection[index],
        }),
        None => Ok(()),
    }
}

fn f32s_from_le_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

impl SplatData {
    /// Builds a store from owned columns. The vertex count comes from `positions`; every other
    /// column, and each similarity channel if given, must agree with it.
    pub fn from_columns(
        columns: SplatColumns,
        similarity: Option<SimilarityChannels>,
    ) -> Result<Self, SplatError> {
        let n = columns.positions.len() / 3;
        check_len("positions", n * 12, columns.positions.len() * 4)?;
        check_len("rotations", n * 16, columns.rotations.len() * 4)?;
        check_len("scales", n * 12, columns.scales.len() * 4)?;
        check_len("colors", n * 4, columns.colors.len())?;
        check_len("selection", n, columns.selection.len())?;
        check_selection(&columns.selection)?;
        if let Some(sim) = &similarity {
            for category in Category::ALL {
                check_len(category.name(), n * 4, sim.channel(category).len() * 4)?;
            }
        }

        Ok(SplatData {
            vertex_count: n,
            baseline_colors: columns.colors.clone(),
            positions: columns.positions,
            rotations: columns.rotations,
            scales: columns.scales,
            colors: columns.colors,
            selection: columns.selection,
            similarity,
            changed: false,
            detached: false,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn rotations(&self) -> &[f32] {
        &self.rotations
    }

    pub fn scales(&self) -> &[f32] {
        &self.scales
    }

    pub fn colors(&self) -> &[u8] {
        &self.colors
    }

    pub fn baseline_colors(&self) -> &[u8] {
        &self.baseline_colors
    }

    pub fn selection(&self) -> &[u8] {
        &self.selection
    }

    pub fn similarity(&self) -> Option<&SimilarityChannels> {
        self.similarity.as_ref()
    }

    /// Scores for `category`, empty when no similarity channels are loaded.
    pub fn similarity_channel(&self, category: Category) -> &[f32] {
        match &self.similarity {
            Some(sim) => sim.channel(category),
            None => &[],
        }
    }

    pub fn mean_similarity(&self, category: Category) -> Option<f32> {
        let channel = self.similarity_channel(category);
        if channel.is_empty() {
            return None;
        }
        Some(channel.iter().sum::<f32>() / channel.len() as f32)
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn translate(&mut self, translation: Vec3) {
        for p in self.positions.chunks_exact_mut(3) {
            (Vec3::from_slice(p) + translation).write_to_slice(p);
        }
        self.changed = true;
    }

    /// Scales positions and splat extents together, component-wise.
    pub fn scale(&mut self, scale: Vec3) {
        for p in self.positions.chunks_exact_mut(3) {
            (Vec3::from_slice(p) * scale).write_to_slice(p);
        }
        for s in self.scales.chunks_exact_mut(3) {
            (Vec3::from_slice(s) * scale).write_to_slice(s);
        }
        self.changed = true;
    }

    /// Rotates positions about the origin and applies `rotation` on top of each orientation.
    pub fn rotate(&mut self, rotation: Quat) {
        let r = rotation_matrix(rotation);
        for (p, q) in self
            .positions
            .chunks_exact_mut(3)
            .zip(self.rotations.chunks_exact_mut(4))
        {
            let (x, y, z) = (p[0], p[1], p[2]);
            p[0] = r[0] * x + r[1] * y + r[2] * z;
            p[1] = r[3] * x + r[4] * y + r[5] * z;
            p[2] = r[6] * x + r[7] * y + r[8] * z;

            write_wxyz(rotation * quat_from_wxyz(q), q);
        }
        self.changed = true;
    }

    /// Hands the five required columns to an external owner. The store keeps its vertex count,
    /// baseline colors and similarity channels, and stays detached until [`Self::reattach`] or
    /// [`Self::reattach_columns`] succeeds.
    pub fn detach(&mut self) -> SplatColumns {
        self.detached = true;
        SplatColumns {
            positions: mem::take(&mut self.positions),
            rotations: mem::take(&mut self.rotations),
            scales: mem::take(&mut self.scales),
            colors: mem::take(&mut self.colors),
            selection: mem::take(&mut self.selection),
        }
    }

    /// Rebinds all five required columns from little-endian byte buffers.
    ///
    /// Every buffer is validated before anything is replaced, so on error the store is left
    /// exactly as it was.
    pub fn reattach(
        &mut self,
        positions: &[u8],
        rotations: &[u8],
        scales: &[u8],
        colors: &[u8],
        selection: &[u8],
    ) -> Result<(), SplatError> {
        let n = self.vertex_count;
        check_len("positions", n * 12, positions.len())?;
        check_len("rotations", n * 16, rotations.len())?;
        check_len("scales", n * 12, scales.len())?;
        check_len("colors", n * 4, colors.len())?;
        check_len("selection", n, selection.len())?;
        check_selection(selection)?;

        self.positions = f32s_from_le_bytes(positions);
        self.rotations = f32s_from_le_bytes(rotations);
        self.scales = f32s_from_le_bytes(scales);
        self.colors = colors.to_vec();
        self.selection = selection.to_vec();
        self.detached = false;
        Ok(())
    }

    /// Same as [`Self::reattach`] for columns that are already typed, e.g. from [`Self::detach`].
    pub fn reattach_columns(&mut self, columns: SplatColumns) -> Result<(), SplatError> {
        let n = self.vertex_count;
        check_len("positions", n * 12, columns.positions.len() * 4)?;
        check_len("rotations", n * 16, columns.rotations.len() * 4)?;
        check_len("scales", n * 12, columns.scales.len() * 4)?;
        check_len("colors", n * 4, columns.colors.len())?;
        check_len("selection", n, columns.selection.len())?;
        check_selection(&columns.selection)?;

        self.positions = columns.positions;
        self.rotations = columns.rotations;
        self.scales = columns.scales;
        self.colors = columns.colors;
        self.selection = columns.selection;
        self.detached = false;
        Ok(())
    }

    /// Copies positions, rotations, scales and colors into a new store.
    ///
    /// This is a partial copy on purpose: the selection comes back all zeros, similarity channels
    /// are not carried over and the copied colors become the new baseline.
    ///
    /// Cloning a detached store gives a detached copy with no columns bound; it keeps the vertex
    /// count and baseline colors so it can be reattached like the original.
    pub fn clone_partial(&self) -> SplatData {
        let (selection, baseline_colors) = if self.detached {
            (Vec::new(), self.baseline_colors.clone())
        } else {
            (vec![0; self.vertex_count], self.colors.clone())
        };
        SplatData {
            vertex_count: self.vertex_count,
            positions: self.positions.clone(),
            rotations: self.rotations.clone(),
            scales: self.scales.clone(),
            colors: self.colors.clone(),
            selection,
            baseline_colors,
            similarity: None,
            changed: false,
            detached: self.detached,
        }
    }

    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set_selected(&mut self, index: usize, selected: bool) {
        self.selection[index] = u8::from(selected);
    }

    pub fn clear_selection(&mut self) {
        self.selection.fill(0);
    }

    pub fn selected_count(&self) -> usize {
        self.selection.iter().filter(|&&s| s == 1).count()
    }

    /// Puts every color back to its baseline.
    pub fn restore_colors(&mut self) {
        for (c, b) in self.colors.iter_mut().zip(&self.baseline_colors) {
            *c = *b;
        }
        self.changed = true;
    }
}
