use serde::{Deserialize, Serialize};

use crate::core::{
    errors::{ProvenanceError, ProvenanceResult},
    types::{ImageData, MAX_IMAGE_DIMENSION},
};

/// Image partitioned into fixed-size rectangular tiles, row-major.
///
/// Boundary tiles narrower or shorter than the tile size are zero-padded to
/// the full tile byte length, so the tile buffer for a given image and tile
/// size is reproducible byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSet {
    /// Tile width in pixels
    pub tile_width: u32,
    /// Tile height in pixels
    pub tile_height: u32,
    /// Tiles per row: ceil(image width / tile width)
    pub grid_width: u32,
    /// Tiles per column: ceil(image height / tile height)
    pub grid_height: u32,
    /// Bytes per pixel carried over from the source image
    pub bytes_per_pixel: u32,
    /// Tile byte buffers in row-major order, each tile_width * tile_height * bpp bytes
    pub tiles: Vec<Vec<u8>>,
}

impl TileSet {
    /// Partition an image into tiles
    pub fn from_image(
        image: &ImageData,
        tile_width: u32,
        tile_height: u32,
    ) -> ProvenanceResult<Self> {
        if tile_width == 0
            || tile_height == 0
            || tile_width > MAX_IMAGE_DIMENSION
            || tile_height > MAX_IMAGE_DIMENSION
        {
            return Err(ProvenanceError::InvalidTileSize {
                tile_width,
                tile_height,
            });
        }

        let grid_width = image.width.div_ceil(tile_width);
        let grid_height = image.height.div_ceil(tile_height);
        let bpp = image.bytes_per_pixel as usize;
        let row_stride = image.row_stride();
        let tile_row_bytes = tile_width as usize * bpp;
        let tile_bytes = tile_row_bytes * tile_height as usize;

        let mut tiles = Vec::with_capacity((grid_width * grid_height) as usize);
        for tile_row in 0..grid_height {
            for tile_col in 0..grid_width {
                let mut tile = vec![0u8; tile_bytes];
                let px_x = (tile_col * tile_width) as usize;
                let px_y = (tile_row * tile_height) as usize;

                let copy_cols = (image.width as usize - px_x).min(tile_width as usize);
                let copy_rows = (image.height as usize - px_y).min(tile_height as usize);

                for row in 0..copy_rows {
                    let src_start = (px_y + row) * row_stride + px_x * bpp;
                    let src_end = src_start + copy_cols * bpp;
                    let dst_start = row * tile_row_bytes;
                    tile[dst_start..dst_start + copy_cols * bpp]
                        .copy_from_slice(&image.pixels[src_start..src_end]);
                }
                tiles.push(tile);
            }
        }

        Ok(Self {
            tile_width,
            tile_height,
            grid_width,
            grid_height,
            bytes_per_pixel: image.bytes_per_pixel,
            tiles,
        })
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Byte length of every tile buffer
    pub fn tile_byte_len(&self) -> usize {
        self.tile_width as usize * self.tile_height as usize * self.bytes_per_pixel as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> ImageData {
        let pixels: Vec<u8> = (0..width as usize * height as usize)
            .map(|i| (i % 251) as u8)
            .collect();
        ImageData::new(width, height, 1, pixels).unwrap()
    }

    #[test]
    fn test_tile_count_matches_ceiling_grid() {
        let image = gradient_image(100, 70);
        let tiles = TileSet::from_image(&image, 32, 32).unwrap();
        // ceil(100/32) = 4, ceil(70/32) = 3
        assert_eq!(tiles.grid_width, 4);
        assert_eq!(tiles.grid_height, 3);
        assert_eq!(tiles.tile_count(), 12);
    }

    #[test]
    fn test_exact_grid_has_no_partial_tiles() {
        let image = gradient_image(64, 64);
        let tiles = TileSet::from_image(&image, 32, 32).unwrap();
        assert_eq!(tiles.tile_count(), 4);
        for tile in &tiles.tiles {
            assert_eq!(tile.len(), 32 * 32);
        }
    }

    #[test]
    fn test_boundary_tiles_are_zero_padded() {
        let image = ImageData::new(33, 33, 1, vec![0xffu8; 33 * 33]).unwrap();
        let tiles = TileSet::from_image(&image, 32, 32).unwrap();
        assert_eq!(tiles.tile_count(), 4);

        // Bottom-right tile holds a single pixel, rest is padding
        let corner = &tiles.tiles[3];
        assert_eq!(corner[0], 0xff);
        assert!(corner[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_tiling_is_deterministic() {
        let image = gradient_image(100, 70);
        let a = TileSet::from_image(&image, 32, 32).unwrap();
        let b = TileSet::from_image(&image, 32, 32).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_tile_size_rejected() {
        let image = gradient_image(8, 8);
        assert!(matches!(
            TileSet::from_image(&image, 0, 32),
            Err(ProvenanceError::InvalidTileSize { .. })
        ));
    }

    #[test]
    fn test_multibyte_pixels_preserved() {
        let mut pixels = vec![0u8; 4 * 4 * 3];
        pixels[0] = 10;
        pixels[1] = 20;
        pixels[2] = 30;
        let image = ImageData::new(4, 4, 3, pixels).unwrap();
        let tiles = TileSet::from_image(&image, 2, 2).unwrap();
        assert_eq!(tiles.tile_count(), 4);
        assert_eq!(&tiles.tiles[0][..3], &[10, 20, 30]);
    }
}
