//! Rendering markers to images.

use crate::Dictionary;
use fiducial_pose_core::GrayImage;

/// Render marker `id` with a one-cell black border and no quiet zone.
///
/// The image is `(marker_size + 2) * cell_px` pixels square, black = 0,
/// white = 255. Returns `None` for an unknown id or `cell_px == 0`.
pub fn draw_marker(dict: &Dictionary, id: u32, cell_px: usize) -> Option<GrayImage> {
    let code = dict.code(id)?;
    if cell_px == 0 {
        return None;
    }
    let bits = dict.marker_size;
    let cells = bits + 2;
    let side = cells * cell_px;
    let mut img = GrayImage::filled(side, side, 0);

    for by in 0..bits {
        for bx in 0..bits {
            if (code >> (by * bits + bx)) & 1 == 1 {
                continue;
            }
            let (x0, y0) = ((bx + 1) * cell_px, (by + 1) * cell_px);
            for y in y0..y0 + cell_px {
                for x in x0..x0 + cell_px {
                    img.set(x, y, 255);
                }
            }
        }
    }

    Some(img)
}

/// Marker cell colors, row-major over the full `(marker_size + 2)²` grid
/// including the border; `true` = black.
pub fn marker_cells(dict: &Dictionary, id: u32) -> Option<Vec<bool>> {
    let code = dict.code(id)?;
    let bits = dict.marker_size;
    let cells = bits + 2;
    let mut out = vec![true; cells * cells];
    for by in 0..bits {
        for bx in 0..bits {
            out[(by + 1) * cells + bx + 1] = (code >> (by * bits + bx)) & 1 == 1;
        }
    }
    Some(out)
}
