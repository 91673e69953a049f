pub mod classify;
pub mod common;
pub mod error;
pub mod store;
pub mod structures;

pub use classify::{ClassifierConfig, HeatMap};
pub use error::SplatError;
pub use store::SplatData;
pub use structures::{Category, RowLayout, SimilarityChannels, SplatColumns};

use common::dequantize;
use common::quantize;
use structures::ExtendedRow;
use structures::StandardRow;
use structures::NUM_SIMILARITY_CHANNELS;
use zerocopy::byteorder::little_endian::F32;
use zerocopy::{FromBytes, IntoBytes};

#[inline]
fn check_row_len(data: &[u8], layout: RowLayout) -> Result<usize, SplatError> {
    let row_len = layout.row_len();
    if data.len() % row_len != 0 {
        return Err(SplatError::LayoutMismatch {
            layout,
            len: data.len(),
            row_len,
        });
    }
    Ok(data.len() / row_len)
}

fn unpack_row(row: &StandardRow, columns: &mut SplatColumns) {
    columns
        .positions
        .extend(row.position.iter().map(|v| v.get()));
    columns.scales.extend(row.scale.iter().map(|v| v.get()));
    columns.colors.extend_from_slice(&row.color);
    columns
        .rotations
        .extend(row.rotation.iter().map(|&b| dequantize(b)));
}

fn pack_row(store: &SplatData, i: usize) -> StandardRow {
    let p = &store.positions[i * 3..i * 3 + 3];
    let s = &store.scales[i * 3..i * 3 + 3];
    let r = &store.rotations[i * 4..i * 4 + 4];
    let c = &store.colors[i * 4..i * 4 + 4];
    StandardRow {
        position: [F32::new(p[0]), F32::new(p[1]), F32::new(p[2])],
        scale: [F32::new(s[0]), F32::new(s[1]), F32::new(s[2])],
        color: [c[0], c[1], c[2], c[3]],
        rotation: [quantize(r[0]), quantize(r[1]), quantize(r[2]), quantize(r[3])],
    }
}

/// Number of rows to pack. A detached store has no columns bound to read from.
#[inline]
fn packable_rows(store: &SplatData) -> Result<usize, SplatError> {
    if store.is_detached() {
        return Err(SplatError::Detached);
    }
    Ok(store.vertex_count())
}

/// Decodes a buffer of fixed-size rows into a store.
///
/// The buffer length must be an exact multiple of the layout's row size. Similarity channels are
/// only read from [`RowLayout::Extended`] rows.
pub fn decode(data: &[u8], layout: RowLayout) -> Result<SplatData, SplatError> {
    let n = check_row_len(data, layout)?;
    let mut columns = SplatColumns {
        positions: Vec::with_capacity(n * 3),
        rotations: Vec::with_capacity(n * 4),
        scales: Vec::with_capacity(n * 3),
        colors: Vec::with_capacity(n * 4),
        selection: vec![0; n],
    };
    let layout_err = || SplatError::LayoutMismatch {
        layout,
        len: data.len(),
        row_len: layout.row_len(),
    };

    let similarity = match layout {
        RowLayout::Standard => {
            let rows = <[StandardRow]>::ref_from_bytes(data).map_err(|_| layout_err())?;
            rows.iter().for_each(|row| unpack_row(row, &mut columns));
            None
        }
        RowLayout::Extended => {
            let rows = <[ExtendedRow]>::ref_from_bytes(data).map_err(|_| layout_err())?;
            let mut similarity = SimilarityChannels::with_capacity(n);
            for row in rows {
                unpack_row(&row.base, &mut columns);
                similarity.push_row(row.similarity.map(|v| v.get()));
            }
            Some(similarity)
        }
    };

    log::debug!("Decoded {} {} rows ({} bytes)", n, layout, data.len());
    SplatData::from_columns(columns, similarity)
}

/// Encodes the store as [`RowLayout::Standard`] rows.
pub fn encode(store: &SplatData) -> Result<Vec<u8>, SplatError> {
    let rows: Vec<StandardRow> = (0..packable_rows(store)?)
        .map(|i| pack_row(store, i))
        .collect();
    log::debug!("Encoded {} standard rows", rows.len());
    Ok(rows.as_bytes().to_vec())
}

/// Encodes the store in the requested layout. [`RowLayout::Extended`] needs similarity channels.
pub fn encode_with_layout(store: &SplatData, layout: RowLayout) -> Result<Vec<u8>, SplatError> {
    match layout {
        RowLayout::Standard => encode(store),
        RowLayout::Extended => {
            let similarity = store
                .similarity()
                .ok_or(SplatError::MissingSimilarity { layout })?;
            let rows: Vec<ExtendedRow> = (0..packable_rows(store)?)
                .map(|i| ExtendedRow {
                    base: pack_row(store, i),
                    similarity: similarity.row(i).map(F32::new),
                })
                .collect();
            log::debug!(
                "Encoded {} extended rows with {} similarity channels",
                rows.len(),
                NUM_SIMILARITY_CHANNELS
            );
            Ok(rows.as_bytes().to_vec())
        }
    }
}

cfg_if::cfg_if! {
if #[cfg(feature = "async")] {
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    /// Reads `reader` to the end and decodes the whole buffer.
    #[inline(never)]
    pub async fn decode_async<R>(reader: &mut R, layout: RowLayout) -> Result<SplatData, SplatError>
    where
        R: AsyncRead + Unpin,
    {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        decode(&data, layout)
    }

    #[inline(never)]
    pub async fn encode_async<W>(
        store: &SplatData,
        layout: RowLayout,
        writer: &mut W,
    ) -> Result<(), SplatError>
    where
        W: AsyncWrite + Unpin,
    {
        let data = encode_with_layout(store, layout)?;
        writer.write_all(&data).await?;
        writer.flush().await?;
        Ok(())
    }
}
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use glam::{Quat, Vec3};

    fn create_test_rows(n: usize, extended: bool) -> Vec<u8> {
        let mut data = Vec::new();
        for i in 0..n {
            let f = i as f32;
            #[rustfmt::skip]
            let floats = [
                // x, y, z
                f, f + 0.5, -f,
                // scale_0, scale_1, scale_2
                0.01 * (f + 1.0), 0.02, 0.03,
            ];
            for v in floats {
                data.extend_from_slice(&v.to_le_bytes());
            }
            // r, g, b, a
            data.extend_from_slice(&[i as u8, 100, 200, 255]);
            // w, x, y, z quantized: 1.0 -> 255, 0.0 -> 128
            data.extend_from_slice(&[255, 128, 128, 128]);
            if extended {
                for s in [0.9, 0.1, 0.2, 0.3, 0.4, 0.5] {
                    data.extend_from_slice(&(s * (f + 1.0) / n as f32).to_le_bytes());
                }
            }
        }
        data
    }

    #[test]
    fn test_decode_standard_field_offsets() {
        let data = create_test_rows(3, false);
        assert_eq!(data.len(), 3 * 32);

        let store = decode(&data, RowLayout::Standard).expect("decode failed");
        assert_eq!(store.vertex_count(), 3);
        assert_eq!(&store.positions()[3..6], &[1.0, 1.5, -1.0]);
        assert_eq!(&store.scales()[6..9], &[0.01 * 3.0, 0.02, 0.03]);
        assert_eq!(&store.colors()[4..8], &[1, 100, 200, 255]);
        assert_approx_eq!(store.rotations()[0], 127.0 / 128.0);
        assert_eq!(&store.rotations()[1..4], &[0.0, 0.0, 0.0]);
        assert_eq!(store.selection(), &[0, 0, 0]);
        assert!(store.similarity().is_none());
        assert_eq!(store.baseline_colors(), store.colors());
    }

    #[test]
    fn test_decode_extended_reads_similarity() {
        let data = create_test_rows(2, true);
        assert_eq!(data.len(), 2 * 56);

        let store = decode(&data, RowLayout::Extended).expect("decode failed");
        assert_eq!(store.vertex_count(), 2);
        assert_eq!(&store.positions()[3..6], &[1.0, 1.5, -1.0]);
        assert_approx_eq!(store.similarity_channel(Category::Car)[1], 0.9);
        assert_approx_eq!(store.similarity_channel(Category::Lamp)[0], 0.25);
        assert_approx_eq!(store.similarity_channel(Category::Road)[1], 0.4);
    }

    #[test]
    fn test_decode_empty_buffer() {
        let store = decode(&[], RowLayout::Standard).expect("empty is valid");
        assert_eq!(store.vertex_count(), 0);
        assert!(encode(&store).unwrap().is_empty());
    }

    #[test]
    fn test_decode_layout_mismatch() {
        let mut data = create_test_rows(2, false);
        data.push(0);
        let err = decode(&data, RowLayout::Standard).unwrap_err();
        assert!(matches!(
            err,
            SplatError::LayoutMismatch {
                layout: RowLayout::Standard,
                len: 65,
                row_len: 32
            }
        ));

        // Two standard rows are not a whole number of extended rows.
        let data = create_test_rows(2, false);
        assert!(matches!(
            decode(&data, RowLayout::Extended),
            Err(SplatError::LayoutMismatch { row_len: 56, .. })
        ));
    }

    #[test]
    fn test_standard_round_trip() {
        #[rustfmt::skip]
        let columns = SplatColumns {
            positions: vec![0.1, -2.5, 1e6, 3.25, 0.0, -0.001],
            rotations: vec![0.7071, 0.0, 0.7071, 0.0, -0.5, 0.5, -0.5, 0.5],
            scales: vec![0.01, 0.2, 3.0, 1e-4, 5.5, 0.75],
            colors: vec![1, 2, 3, 4, 250, 251, 252, 253],
            selection: vec![1, 0],
        };
        let store = SplatData::from_columns(columns.clone(), None).unwrap();
        let data = encode(&store).unwrap();
        assert_eq!(data.len(), 2 * 32);

        let decoded = decode(&data, RowLayout::Standard).unwrap();
        assert_eq!(decoded.positions(), columns.positions.as_slice());
        assert_eq!(decoded.scales(), columns.scales.as_slice());
        assert_eq!(decoded.colors(), columns.colors.as_slice());
        for (a, b) in decoded.rotations().iter().zip(&columns.rotations) {
            assert!((a - b).abs() <= 1.0 / 128.0, "{a} vs {b}");
        }
    }

    #[test]
    fn test_round_trip_after_transforms() {
        let mut store = decode(&create_test_rows(4, false), RowLayout::Standard).unwrap();
        store.translate(Vec3::new(1.0, 2.0, 3.0));
        store.scale(Vec3::splat(2.0));
        store.rotate(Quat::from_rotation_y(0.3));

        let decoded = decode(&encode(&store).unwrap(), RowLayout::Standard).unwrap();
        assert_eq!(decoded.positions(), store.positions());
        assert_eq!(decoded.scales(), store.scales());
        for (a, b) in decoded.rotations().iter().zip(store.rotations()) {
            assert!((a - b).abs() <= 1.0 / 128.0, "{a} vs {b}");
        }
    }

    #[test]
    fn test_extended_round_trip() {
        let data = create_test_rows(3, true);
        let store = decode(&data, RowLayout::Extended).unwrap();
        let encoded = encode_with_layout(&store, RowLayout::Extended).unwrap();
        // Every rotation code in the fixture survives dequantize -> quantize unchanged.
        assert_eq!(encoded, data);
    }

    #[test]
    fn test_extended_encode_needs_similarity() {
        let store = decode(&create_test_rows(1, false), RowLayout::Standard).unwrap();
        assert!(matches!(
            encode_with_layout(&store, RowLayout::Extended),
            Err(SplatError::MissingSimilarity {
                layout: RowLayout::Extended
            })
        ));
        assert_eq!(
            encode_with_layout(&store, RowLayout::Standard).unwrap(),
            encode(&store).unwrap()
        );
    }

    #[test]
    fn test_extended_to_standard_drops_similarity() {
        let store = decode(&create_test_rows(2, true), RowLayout::Extended).unwrap();
        let standard = encode(&store).unwrap();
        assert_eq!(standard, create_test_rows(2, false));
    }

    #[test]
    fn test_encode_detached_store_fails() {
        let mut store = decode(&create_test_rows(2, true), RowLayout::Extended).unwrap();
        let columns = store.detach();
        assert!(matches!(encode(&store), Err(SplatError::Detached)));
        assert!(matches!(
            encode_with_layout(&store, RowLayout::Extended),
            Err(SplatError::Detached)
        ));
        store.reattach_columns(columns).unwrap();
        assert_eq!(encode(&store).unwrap(), create_test_rows(2, false));
    }

    #[test]
    fn test_encode_clone_of_detached_store() {
        let mut store = decode(&create_test_rows(2, false), RowLayout::Standard).unwrap();
        let columns = store.detach();

        let copy = store.clone_partial();
        assert!(copy.is_detached());
        assert!(matches!(encode(&copy), Err(SplatError::Detached)));

        store.reattach_columns(columns).unwrap();
        let copy = store.clone_partial();
        assert!(!copy.is_detached());
        assert_eq!(encode(&copy).unwrap(), create_test_rows(2, false));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_decode_encode_async() {
        let data = create_test_rows(3, true);

        let mut reader = data.as_slice();
        let store = decode_async(&mut reader, RowLayout::Extended)
            .await
            .expect("decode_async failed");
        assert_eq!(store.vertex_count(), 3);

        let mut out = Vec::new();
        encode_async(&store, RowLayout::Extended, &mut out)
            .await
            .expect("encode_async failed");
        assert_eq!(out, data);
    }
}
