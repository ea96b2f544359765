use super::Point2D;

/// Douglas-Peucker polyline simplification. Endpoints are always kept;
/// an interior point survives when its perpendicular distance to the
/// current chord exceeds `tolerance`. With a tolerance of zero only points
/// at literally zero distance (exact duplicates, exactly collinear points)
/// collapse.
pub fn simplify_polyline(points: &[Point2D], tolerance: f64) -> Vec<Point2D> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;
    mark_kept(points, 0, points.len() - 1, tolerance, &mut keep);
    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| if k { Some(*p) } else { None })
        .collect()
}

fn mark_kept(points: &[Point2D], first: usize, last: usize, tolerance: f64, keep: &mut [bool]) {
    if last <= first + 1 {
        return;
    }
    let mut max_dist = 0.0;
    let mut max_idx = first;
    for i in first + 1..last {
        let d = perpendicular_distance(&points[i], &points[first], &points[last]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }
    if max_dist > tolerance {
        keep[max_idx] = true;
        mark_kept(points, first, max_idx, tolerance, keep);
        mark_kept(points, max_idx, last, tolerance, keep);
    }
}

fn perpendicular_distance(p: &Point2D, a: &Point2D, b: &Point2D) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return p.distance_to(a);
    }
    ((p.x - a.x) * dy - (p.y - a.y) * dx).abs() / len
}

/// Chaikin corner cutting: every edge (p0, p1) is replaced by the points at
/// 1/4 and 3/4 along it, repeated `iterations` times. Open paths keep their
/// endpoints; closed rings cut across the wrap-around edge as well.
pub fn chaikin_smooth(points: &[Point2D], iterations: usize, closed: bool) -> Vec<Point2D> {
    if points.len() < 3 || iterations == 0 {
        return points.to_vec();
    }
    let mut current = points.to_vec();
    for _ in 0..iterations {
        current = chaikin_pass(&current, closed);
    }
    current
}

fn chaikin_pass(points: &[Point2D], closed: bool) -> Vec<Point2D> {
    let n = points.len();
    let edge_count = if closed { n } else { n - 1 };
    let mut out = Vec::with_capacity(2 * edge_count + 2);
    if !closed {
        out.push(points[0]);
    }
    for i in 0..edge_count {
        let p0 = &points[i];
        let p1 = &points[(i + 1) % n];
        out.push(Point2D::new(
            0.75 * p0.x + 0.25 * p1.x,
            0.75 * p0.y + 0.25 * p1.y,
        ));
        out.push(Point2D::new(
            0.25 * p0.x + 0.75 * p1.x,
            0.25 * p0.y + 0.75 * p1.y,
        ));
    }
    if !closed {
        out.push(points[n - 1]);
    }
    out
}
