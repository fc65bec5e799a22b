//! Outer-boundary tracing and polygon approximation on binary masks.

use crate::threshold::BinaryImage;
use nalgebra::Point2;

// Clockwise on screen (y down), starting east.
const DIRS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];
const WEST: usize = 4;

#[inline]
fn dir_index(dx: i32, dy: i32) -> usize {
    match (dx, dy) {
        (1, 0) => 0,
        (1, 1) => 1,
        (0, 1) => 2,
        (-1, 1) => 3,
        (-1, 0) => 4,
        (-1, -1) => 5,
        (0, -1) => 6,
        _ => 7,
    }
}

/// Outer boundary of every 8-connected foreground component.
///
/// Each contour is the closed sequence of boundary pixel centers, starting at
/// the component's first pixel in raster order.
pub(crate) fn outer_contours(bin: &BinaryImage) -> Vec<Vec<Point2<i32>>> {
    let (w, h) = (bin.width, bin.height);
    let mut labels = vec![0u32; w * h];
    let mut stack: Vec<(i32, i32)> = Vec::new();
    let mut contours = Vec::new();
    let mut next_label = 1u32;

    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            if bin.data[idx] == 0 || labels[idx] != 0 {
                continue;
            }

            let label = next_label;
            next_label += 1;
            let mut area = 0usize;
            labels[idx] = label;
            stack.push((x as i32, y as i32));
            while let Some((cx, cy)) = stack.pop() {
                area += 1;
                for &(dx, dy) in &DIRS {
                    let (nx, ny) = (cx + dx, cy + dy);
                    if !bin.is_set(nx, ny) {
                        continue;
                    }
                    let nidx = ny as usize * w + nx as usize;
                    if labels[nidx] == 0 {
                        labels[nidx] = label;
                        stack.push((nx, ny));
                    }
                }
            }

            contours.push(trace_boundary(bin, Point2::new(x as i32, y as i32), area));
        }
    }

    contours
}

/// Moore-neighbour tracing with Jacob's stopping criterion.
///
/// The step budget is proportional to the component area. `start` must be
/// the raster-first pixel of its component so that its west neighbour is
/// background.
fn trace_boundary(bin: &BinaryImage, start: Point2<i32>, area: usize) -> Vec<Point2<i32>> {
    let mut contour = vec![start];
    let max_steps = 4 * area + 8;

    let mut p = start;
    let mut back = WEST;
    let mut first_move = None;
    for _ in 0..max_steps {
        let mut found = None;
        for i in 1..=8 {
            let d = (back + i) % 8;
            let (dx, dy) = DIRS[d];
            if bin.is_set(p.x + dx, p.y + dy) {
                found = Some(d);
                break;
            }
        }
        let Some(d) = found else {
            // Isolated pixel.
            break;
        };
        if p == start {
            // Leaving the start pixel the same way twice closes thin spurs
            // that Jacob's criterion alone never terminates.
            if first_move == Some(d) {
                break;
            }
            first_move.get_or_insert(d);
        }

        let q = Point2::new(p.x + DIRS[d].0, p.y + DIRS[d].1);
        // Last background cell examined before `q`, expressed relative to `q`.
        let (bx, by) = DIRS[(d + 7) % 8];
        let new_back = dir_index(p.x + bx - q.x, p.y + by - q.y);

        if q == start && new_back == WEST {
            break;
        }
        p = q;
        back = new_back;
        if p != start {
            contour.push(p);
        }
    }

    contour
}

/// Length of the closed polyline through `pts`.
pub(crate) fn closed_length(pts: &[Point2<i32>]) -> f32 {
    if pts.len() < 2 {
        return 0.0;
    }
    let mut len = 0.0f32;
    for i in 0..pts.len() {
        let a = pts[i];
        let b = pts[(i + 1) % pts.len()];
        len += (((b.x - a.x).pow(2) + (b.y - a.y).pow(2)) as f32).sqrt();
    }
    len
}

fn point_line_distance(p: Point2<i32>, a: Point2<i32>, b: Point2<i32>) -> f32 {
    let (px, py) = (p.x as f32, p.y as f32);
    let (ax, ay) = (a.x as f32, a.y as f32);
    let (bx, by) = (b.x as f32, b.y as f32);
    let (dx, dy) = (bx - ax, by - ay);
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-6 {
        return ((px - ax).powi(2) + (py - ay).powi(2)).sqrt();
    }
    ((px - ax) * dy - (py - ay) * dx).abs() / len
}

/// Ramer–Douglas–Peucker on the open chain `pts[first..=last]`, marking kept
/// indices in `keep`.
fn simplify_chain(pts: &[Point2<i32>], first: usize, last: usize, eps: f32, keep: &mut [bool]) {
    let n = pts.len();
    let mut stack = vec![(first, last)];
    while let Some((s, e)) = stack.pop() {
        // Chain indices wrap around the closed contour.
        let span = (e + n - s) % n;
        if span < 2 {
            continue;
        }
        let (a, b) = (pts[s], pts[e % n]);
        let mut best = (0.0f32, s);
        for k in 1..span {
            let i = (s + k) % n;
            let d = point_line_distance(pts[i], a, b);
            if d > best.0 {
                best = (d, i);
            }
        }
        if best.0 > eps {
            keep[best.1] = true;
            stack.push((s, best.1));
            stack.push((best.1, e));
        }
    }
}

/// Douglas–Peucker approximation of a closed contour.
///
/// The contour is split at its first point and the point farthest from it,
/// and each half is simplified independently.
pub(crate) fn approx_closed_polygon(pts: &[Point2<i32>], eps: f32) -> Vec<Point2<i32>> {
    let n = pts.len();
    if n < 3 {
        return pts.to_vec();
    }

    let p0 = pts[0];
    let far = (1..n)
        .max_by_key(|&i| (pts[i].x - p0.x).pow(2) + (pts[i].y - p0.y).pow(2))
        .unwrap_or(n / 2);

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[far] = true;
    simplify_chain(pts, 0, far, eps, &mut keep);
    simplify_chain(pts, far, 0, eps, &mut keep);

    pts.iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}
