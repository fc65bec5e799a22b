use fiducial_pose_aruco::builtins::{builtin_dictionary, BUILTIN_DICTIONARY_NAMES};
use fiducial_pose_aruco::{
    draw_marker, CandidateExtractor, CandidateRejected, DecoderParams, Dictionary, SymbolDecoder,
};
use fiducial_pose_core::GrayImage;
use nalgebra::Point2;

const CELL_PX: usize = 6;
const PAD: usize = 8;

/// Rotate a square image by 90° clockwise `turns` times.
fn rotate_cw(img: &GrayImage, turns: usize) -> GrayImage {
    let mut out = img.clone();
    for _ in 0..turns % 4 {
        let n = out.width;
        let mut next = GrayImage::filled(n, n, 0);
        for y in 0..n {
            for x in 0..n {
                next.set(x, y, out.get(y, n - 1 - x));
            }
        }
        out = next;
    }
    out
}

fn scene(dict: &Dictionary, id: u32, turns: usize) -> GrayImage {
    let marker = rotate_cw(&draw_marker(dict, id, CELL_PX).expect("marker"), turns);
    let side = marker.width + 2 * PAD;
    let mut img = GrayImage::filled(side, side, 255);
    for y in 0..marker.height {
        for x in 0..marker.width {
            img.set(x + PAD, y + PAD, marker.get(x, y));
        }
    }
    img
}

/// Where the marker's own top-left corner lands after `turns` clockwise turns.
fn expected_top_left(dict: &Dictionary, turns: usize) -> Point2<f32> {
    let a = PAD as f32 - 0.5;
    let b = (PAD + (dict.marker_size + 2) * CELL_PX) as f32 - 0.5;
    match turns % 4 {
        0 => Point2::new(a, a),
        1 => Point2::new(b, a),
        2 => Point2::new(b, b),
        _ => Point2::new(a, b),
    }
}

#[test]
fn every_codeword_decodes_at_every_rotation() {
    let extractor = CandidateExtractor::default();
    for name in BUILTIN_DICTIONARY_NAMES {
        let dict = builtin_dictionary(name).expect("builtin");
        let decoder = SymbolDecoder::new(dict, DecoderParams::default());
        for id in 0..dict.len() as u32 {
            for turns in 0..4 {
                let img = scene(&dict, id, turns);
                let view = img.view();
                let decoded: Vec<_> = extractor
                    .candidates(view)
                    .filter_map(|q| decoder.decode(&view, &q).ok())
                    .collect();
                assert_eq!(decoded.len(), 1, "{name} id {id} turns {turns}");
                let m = decoded[0];
                assert_eq!(m.id, id, "{name} turns {turns}");
                assert_eq!(m.hamming, 0);

                let tl = expected_top_left(&dict, turns);
                let got = m.corners.corners[0];
                assert!(
                    (got - tl).norm() < 1.5,
                    "{name} id {id} turns {turns}: corner 0 at {got:?}, expected {tl:?}"
                );
                assert!(m.corners.is_clockwise());
            }
        }
    }
}

#[test]
fn builtin_dictionaries_honour_declared_distance() {
    for name in BUILTIN_DICTIONARY_NAMES {
        let dict = builtin_dictionary(name).expect("builtin");
        assert!(
            dict.measured_min_distance() >= dict.min_distance as u32,
            "{name}: measured {} < declared {}",
            dict.measured_min_distance(),
            dict.min_distance
        );
    }
}

#[test]
fn single_bit_errors_are_corrected() {
    let dict = builtin_dictionary("DICT_4X4_100").expect("builtin");
    let decoder = SymbolDecoder::new(dict, DecoderParams::default());
    let extractor = CandidateExtractor::default();

    let mut img = scene(&dict, 21, 0);
    // Flip inner cell (2, 3) of the 4x4 grid.
    let (bx, by) = (2usize, 3usize);
    let x0 = PAD + (bx + 1) * CELL_PX;
    let y0 = PAD + (by + 1) * CELL_PX;
    for y in y0..y0 + CELL_PX {
        for x in x0..x0 + CELL_PX {
            let v = img.get(x, y);
            img.set(x, y, 255 - v);
        }
    }

    let view = img.view();
    let decoded: Vec<_> = extractor
        .candidates(view)
        .filter_map(|q| decoder.decode(&view, &q).ok())
        .collect();
    assert_eq!(decoded.len(), 1);
    assert_eq!((decoded[0].id, decoded[0].hamming), (21, 1));
}

#[test]
fn tight_bound_rejects_corrupted_marker() {
    let dict = builtin_dictionary("DICT_4X4_50").expect("builtin");
    let params = DecoderParams {
        max_hamming: Some(0),
        ..DecoderParams::default()
    };
    let decoder = SymbolDecoder::new(dict, params);

    let mut img = scene(&dict, 4, 0);
    let x0 = PAD + 2 * CELL_PX;
    let y0 = PAD + 2 * CELL_PX;
    for y in y0..y0 + CELL_PX {
        for x in x0..x0 + CELL_PX {
            let v = img.get(x, y);
            img.set(x, y, 255 - v);
        }
    }

    let view = img.view();
    let quads = CandidateExtractor::default().extract(view);
    assert!(!quads.is_empty());
    let outcomes: Vec<_> = quads.iter().map(|q| decoder.decode(&view, q)).collect();
    assert!(outcomes.iter().all(|r| r.is_err()));
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(CandidateRejected::DistanceOverThreshold { nearest: 1 }))));
}

#[test]
fn opencv_marker_zero_decodes_as_id_zero() {
    // DICT_4X4_50 marker 0 as OpenCV draws it, inner rows with white = 1.
    let rows = ["1011", "0101", "0011", "0010"];
    let side = 6 * CELL_PX + 2 * PAD;
    let mut img = GrayImage::filled(side, side, 255);
    for cy in 0..6 {
        for cx in 0..6 {
            let border = cx == 0 || cy == 0 || cx == 5 || cy == 5;
            let black = border || rows[cy - 1].as_bytes()[cx - 1] == b'0';
            if !black {
                continue;
            }
            for y in 0..CELL_PX {
                for x in 0..CELL_PX {
                    img.set(PAD + cx * CELL_PX + x, PAD + cy * CELL_PX + y, 0);
                }
            }
        }
    }

    let dict = builtin_dictionary("DICT_4X4_50").expect("builtin");
    let decoder = SymbolDecoder::new(dict, DecoderParams::default());
    let view = img.view();
    let decoded: Vec<_> = CandidateExtractor::default()
        .candidates(view)
        .filter_map(|q| decoder.decode(&view, &q).ok())
        .collect();
    assert_eq!(decoded.len(), 1);
    assert_eq!((decoded[0].id, decoded[0].hamming), (0, 0));
}
