//! Contour measurements and polygon simplification.

/// Area enclosed by a closed polygon (shoelace formula), always non-negative.
pub fn shoelace_area(points: &[[f64; 2]]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        twice_area += points[i][0] * points[j][1] - points[j][0] * points[i][1];
    }
    twice_area.abs() / 2.0
}

/// Length of a closed curve, including the segment from the last point back to the first.
pub fn closed_perimeter(points: &[[f64; 2]]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            (a[0] - b[0]).hypot(a[1] - b[1])
        })
        .sum()
}

/// Simplify a closed curve with Douglas–Peucker.
///
/// The curve is split at its first point and the point farthest from it;
/// each half is simplified independently so the split points always
/// survive. Returned vertices follow the input's winding and never repeat
/// the first point at the end.
///
/// # Arguments
///
/// * `points` - The closed curve, without a repeated end point
/// * `epsilon` - Largest distance a dropped point may lie from the result
///
/// # Returns
///
/// The kept vertices. Curves of fewer than three points come back as given.
pub fn approximate_closed_polygon(points: &[[f64; 2]], epsilon: f64) -> Vec<[f64; 2]> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let anchor = points[0];
    let far = (1..n)
        .max_by(|&a, &b| {
            squared_distance(points[a], anchor).total_cmp(&squared_distance(points[b], anchor))
        })
        .unwrap_or(1);

    let first_half = &points[..=far];
    let mut second_half: Vec<[f64; 2]> = points[far..].to_vec();
    second_half.push(anchor);

    let mut out = douglas_peucker(first_half, epsilon);
    out.pop();
    let mut tail = douglas_peucker(&second_half, epsilon);
    tail.pop();
    out.extend(tail);
    out
}

/// Open-curve Douglas–Peucker keeping both endpoints.
fn douglas_peucker(points: &[[f64; 2]], epsilon: f64) -> Vec<[f64; 2]> {
    let n = points.len();
    if n <= 2 {
        return points.to_vec();
    }

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;

    let mut stack = vec![(0usize, n - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let mut max_dist = 0.0;
        let mut index = start;
        for i in start + 1..end {
            let d = segment_distance(points[i], points[start], points[end]);
            if d > max_dist {
                max_dist = d;
                index = i;
            }
        }
        if max_dist > epsilon {
            keep[index] = true;
            stack.push((start, index));
            stack.push((index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

fn squared_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// Distance from `p` to the segment `a`–`b`.
fn segment_distance(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let len_sq = squared_distance(a, b);
    if len_sq == 0.0 {
        return squared_distance(p, a).sqrt();
    }
    let dot = (p[0] - a[0]) * (b[0] - a[0]) + (p[1] - a[1]) * (b[1] - a[1]);
    let t = (dot / len_sq).clamp(0.0, 1.0);
    let proj = [a[0] + t * (b[0] - a[0]), a[1] + t * (b[1] - a[1])];
    squared_distance(p, proj).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Trace a rectangle's boundary clockwise one pixel at a time, starting
    /// at the top-left corner, like a border-following contour.
    fn traced_rect(left: i32, top: i32, right: i32, bottom: i32) -> Vec<[f64; 2]> {
        let mut pts = Vec::new();
        for x in left..right {
            pts.push([x as f64, top as f64]);
        }
        for y in top..bottom {
            pts.push([right as f64, y as f64]);
        }
        for x in (left + 1..=right).rev() {
            pts.push([x as f64, bottom as f64]);
        }
        for y in (top + 1..=bottom).rev() {
            pts.push([left as f64, y as f64]);
        }
        pts
    }

    #[test]
    fn test_shoelace_rectangle() {
        let area = shoelace_area(&[[0.0, 0.0], [10.0, 0.0], [10.0, 5.0], [0.0, 5.0]]);
        assert!((area - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_shoelace_counter_clockwise_is_positive() {
        let area = shoelace_area(&[[0.0, 0.0], [0.0, 5.0], [10.0, 5.0], [10.0, 0.0]]);
        assert!((area - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_shoelace_degenerate() {
        assert_eq!(shoelace_area(&[[0.0, 0.0], [1.0, 1.0]]), 0.0);
    }

    #[test]
    fn test_closed_perimeter() {
        let p = closed_perimeter(&[[0.0, 0.0], [3.0, 0.0], [3.0, 4.0]]);
        assert!((p - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_traced_rectangle_simplifies_to_four_corners() {
        let contour = traced_rect(10, 20, 110, 80);
        let eps = 0.02 * closed_perimeter(&contour);
        let poly = approximate_closed_polygon(&contour, eps);
        assert_eq!(
            poly,
            vec![[10.0, 20.0], [110.0, 20.0], [110.0, 80.0], [10.0, 80.0]]
        );
    }

    #[test]
    fn test_noisy_edge_is_absorbed_by_tolerance() {
        let mut contour = traced_rect(0, 0, 200, 100);
        // One-pixel bump along the top edge.
        contour[50][1] = -1.0;
        contour[51][1] = -1.0;
        let eps = 0.02 * closed_perimeter(&contour);
        assert_eq!(approximate_closed_polygon(&contour, eps).len(), 4);
    }

    #[test]
    fn test_triangle_keeps_three_vertices() {
        let mut contour = Vec::new();
        for i in 0..50 {
            contour.push([i as f64, 0.0]);
        }
        for i in 0..50 {
            contour.push([50.0 - i as f64 * 0.5, i as f64]);
        }
        for i in 0..25 {
            contour.push([25.0 - i as f64, 50.0 - i as f64 * 2.0]);
        }
        let eps = 0.02 * closed_perimeter(&contour);
        assert_eq!(approximate_closed_polygon(&contour, eps).len(), 3);
    }

    #[test]
    fn test_short_curves_pass_through() {
        let pts = vec![[0.0, 0.0], [1.0, 0.0]];
        assert_eq!(approximate_closed_polygon(&pts, 1.0), pts);
    }
}
