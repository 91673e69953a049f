use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use zerocopy::byteorder::little_endian::F32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

pub const STANDARD_ROW_LEN: usize = 3 * 4 + 3 * 4 + 4 + 4;
pub const NUM_SIMILARITY_CHANNELS: usize = 6;
pub const EXTENDED_ROW_LEN: usize = STANDARD_ROW_LEN + NUM_SIMILARITY_CHANNELS * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowLayout {
    /// Position, scale, color and rotation: 32 bytes.
    Standard,
    /// Standard fields followed by six similarity floats: 56 bytes.
    Extended,
}

impl RowLayout {
    pub const fn row_len(self) -> usize {
        match self {
            RowLayout::Standard => STANDARD_ROW_LEN,
            RowLayout::Extended => EXTENDED_ROW_LEN,
        }
    }
}

impl fmt::Display for RowLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowLayout::Standard => write!(f, "standard"),
            RowLayout::Extended => write!(f, "extended"),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub(crate) struct StandardRow {
    pub position: [F32; 3],
    pub scale: [F32; 3],
    pub color: [u8; 4],
    /// Quantized (w, x, y, z).
    pub rotation: [u8; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub(crate) struct ExtendedRow {
    pub base: StandardRow,
    /// car, house, tree, grass, road, lamp
    pub similarity: [F32; NUM_SIMILARITY_CHANNELS],
}

const _: () = assert!(size_of::<StandardRow>() == STANDARD_ROW_LEN);
const _: () = assert!(size_of::<ExtendedRow>() == EXTENDED_ROW_LEN);

/// Object category a similarity channel scores against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Category {
    #[default]
    Car,
    House,
    Tree,
    Grass,
    Road,
    Lamp,
}

impl Category {
    /// Channel order inside an extended row.
    pub const ALL: [Category; NUM_SIMILARITY_CHANNELS] = [
        Category::Car,
        Category::House,
        Category::Tree,
        Category::Grass,
        Category::Road,
        Category::Lamp,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Category::Car => "car",
            Category::House => "house",
            Category::Tree => "tree",
            Category::Grass => "grass",
            Category::Road => "road",
            Category::Lamp => "lamp",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Looks up a category by name. Unknown names fall back to [`Category::Car`].
    pub fn from_name(name: &str) -> Category {
        match Category::ALL.iter().find(|c| c.name() == name) {
            Some(&category) => category,
            None => {
                log::warn!("Unknown category '{}', falling back to 'car'", name);
                Category::Car
            }
        }
    }
}

impl FromStr for Category {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Category::from_name(s))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-splat similarity scores, one channel per [`Category`], each of length N.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SimilarityChannels {
    pub car: Vec<f32>,
    pub house: Vec<f32>,
    pub tree: Vec<f32>,
    pub grass: Vec<f32>,
    pub road: Vec<f32>,
    pub lamp: Vec<f32>,
}

impl SimilarityChannels {
    pub fn with_capacity(n: usize) -> Self {
        SimilarityChannels {
            car: Vec::with_capacity(n),
            house: Vec::with_capacity(n),
            tree: Vec::with_capacity(n),
            grass: Vec::with_capacity(n),
            road: Vec::with_capacity(n),
            lamp: Vec::with_capacity(n),
        }
    }

    pub fn channel(&self, category: Category) -> &[f32] {
        match category {
            Category::Car => &self.car,
            Category::House => &self.house,
            Category::Tree => &self.tree,
            Category::Grass => &self.grass,
            Category::Road => &self.road,
            Category::Lamp => &self.lamp,
        }
    }

    pub(crate) fn push_row(&mut self, row: [f32; NUM_SIMILARITY_CHANNELS]) {
        let [car, house, tree, grass, road, lamp] = row;
        self.car.push(car);
        self.house.push(house);
        self.tree.push(tree);
        self.grass.push(grass);
        self.road.push(road);
        self.lamp.push(lamp);
    }

    pub(crate) fn row(&self, i: usize) -> [f32; NUM_SIMILARITY_CHANNELS] {
        Category::ALL.map(|c| self.channel(c)[i])
    }
}

/// The five required columns of a store, owned outside of it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SplatColumns {
    pub positions: Vec<f32>,
    /// (w, x, y, z) per splat.
    pub rotations: Vec<f32>,
    pub scales: Vec<f32>,
    pub colors: Vec<u8>,
    pub selection: Vec<u8>,
}
