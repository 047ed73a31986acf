use super::{BBox, Point3, Vec3};
use super::plane::Plane;

#[derive(Debug, Clone, Copy)]
struct BvhNode {
    bbox: BBox,
    left: u32,
    right: u32,
    start: u32,
    count: u32,
}

impl BvhNode {
    const fn leaf(bbox: BBox, start: u32, count: u32) -> Self {
        Self {
            bbox,
            left: u32::MAX,
            right: u32::MAX,
            start,
            count,
        }
    }

    const fn inner(bbox: BBox, left: u32, right: u32) -> Self {
        Self {
            bbox,
            left,
            right,
            start: 0,
            count: 0,
        }
    }

    const fn is_leaf(self) -> bool {
        self.count != 0
    }
}

/// Median-split bounding volume hierarchy over triangle boxes.
///
/// Used for pointer picking (ray queries) and for finding the triangles a
/// cut plane can touch (plane band queries).
#[derive(Debug, Clone)]
pub(crate) struct Bvh {
    nodes: Vec<BvhNode>,
    prim_indices: Vec<u32>,
    prim_bboxes: Vec<BBox>,
}

impl Bvh {
    const LEAF_SIZE: usize = 8;

    #[must_use]
    pub(crate) fn build(bboxes: &[BBox]) -> Option<Self> {
        if bboxes.is_empty() {
            return None;
        }

        let prim_indices: Vec<u32> = (0..bboxes.len() as u32).collect();
        let nodes = Vec::with_capacity(bboxes.len().saturating_mul(2));

        let mut bvh = Self {
            nodes,
            prim_indices,
            prim_bboxes: bboxes.to_vec(),
        };
        bvh.build_node(bboxes, 0, bboxes.len());
        Some(bvh)
    }

    fn build_node(&mut self, bboxes: &[BBox], start: usize, end: usize) -> u32 {
        let node_index = self.nodes.len() as u32;
        let bbox = self.range_bbox(bboxes, start, end);
        self.nodes.push(BvhNode::leaf(bbox, start as u32, (end - start) as u32));

        let count = end - start;
        if count <= Self::LEAF_SIZE {
            return node_index;
        }

        let axis = self.choose_split_axis(bboxes, start, end);
        let mid = start + count / 2;
        self.prim_indices[start..end].select_nth_unstable_by(mid - start, |a, b| {
            let ca = centroid_component(bboxes[*a as usize], axis);
            let cb = centroid_component(bboxes[*b as usize], axis);
            ca.total_cmp(&cb)
        });

        let left = self.build_node(bboxes, start, mid);
        let right = self.build_node(bboxes, mid, end);
        self.nodes[node_index as usize] = BvhNode::inner(bbox, left, right);
        node_index
    }

    fn range_bbox(&self, bboxes: &[BBox], start: usize, end: usize) -> BBox {
        self.prim_indices[(start + 1)..end]
            .iter()
            .fold(bboxes[self.prim_indices[start] as usize], |acc, &idx| {
                acc.union(bboxes[idx as usize])
            })
    }

    fn choose_split_axis(&self, bboxes: &[BBox], start: usize, end: usize) -> u8 {
        let centers: Vec<Point3> = self.prim_indices[start..end]
            .iter()
            .map(|&idx| bboxes[idx as usize].center())
            .collect();
        let Some(spread) = BBox::from_points(&centers).map(BBox::size) else {
            return 0;
        };

        if spread.x >= spread.y && spread.x >= spread.z {
            0
        } else if spread.y >= spread.z {
            1
        } else {
            2
        }
    }

    /// Depth-first walk; `enter` prunes nodes and primitives by box, `visit`
    /// returns `false` to stop early.
    fn traverse<E, F>(&self, mut enter: E, mut visit: F)
    where
        E: FnMut(BBox) -> bool,
        F: FnMut(usize) -> bool,
    {
        if self.nodes.is_empty() {
            return;
        }

        let mut stack = vec![0u32];
        while let Some(node_idx) = stack.pop() {
            let node = self.nodes[node_idx as usize];
            if !enter(node.bbox) {
                continue;
            }

            if node.is_leaf() {
                let start = node.start as usize;
                let end = start + node.count as usize;
                for &prim in &self.prim_indices[start..end] {
                    if !enter(self.prim_bboxes[prim as usize]) {
                        continue;
                    }
                    if !visit(prim as usize) {
                        return;
                    }
                }
                continue;
            }

            stack.push(node.left);
            stack.push(node.right);
        }
    }

    pub(crate) fn query_ray<F>(&self, origin: Point3, dir: Vec3, t_max: f64, visit: F)
    where
        F: FnMut(usize) -> bool,
    {
        self.traverse(
            |bbox| ray_intersects_bbox(origin, dir, bbox, 0.0, t_max),
            visit,
        );
    }

    /// Visits every primitive whose box reaches within `eps` of `plane`.
    pub(crate) fn query_plane<F>(&self, plane: Plane, eps: f64, visit: F)
    where
        F: FnMut(usize) -> bool,
    {
        self.traverse(|bbox| bbox_touches_plane(bbox, plane, eps), visit);
    }
}

fn centroid_component(bbox: BBox, axis: u8) -> f64 {
    let c = bbox.center();
    match axis {
        0 => c.x,
        1 => c.y,
        _ => c.z,
    }
}

fn bbox_touches_plane(bbox: BBox, plane: Plane, eps: f64) -> bool {
    let center = plane.signed_distance(bbox.center());
    let half = bbox.size() * 0.5;
    let n = plane.normal;
    let reach = half.x * n.x.abs() + half.y * n.y.abs() + half.z * n.z.abs();
    center.abs() <= reach + eps
}

fn ray_intersects_bbox(origin: Point3, dir: Vec3, bbox: BBox, t_min: f64, t_max: f64) -> bool {
    let mut tmin = t_min;
    let mut tmax = t_max;

    for axis in 0..3u8 {
        let (o, d, min, max) = match axis {
            0 => (origin.x, dir.x, bbox.min.x, bbox.max.x),
            1 => (origin.y, dir.y, bbox.min.y, bbox.max.y),
            _ => (origin.z, dir.z, bbox.min.z, bbox.max.z),
        };

        if !o.is_finite() || !d.is_finite() {
            return false;
        }

        if d.abs() <= 1e-15 {
            if o < min || o > max {
                return false;
            }
            continue;
        }

        let inv_d = 1.0 / d;
        let mut t0 = (min - o) * inv_d;
        let mut t1 = (max - o) * inv_d;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }

        tmin = tmin.max(t0);
        tmax = tmax.min(t1);
        if tmax < tmin {
            return false;
        }
    }

    true
}
