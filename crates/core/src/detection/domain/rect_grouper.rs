use crate::shared::region::Region;

/// Relative tolerance under which two raw hits count as the same face.
pub const DEFAULT_GROUP_EPS: f64 = 0.2;

/// Clusters overlapping raw detections into one box per face.
///
/// Sliding-window classifiers fire many times around a real face and only
/// sporadically on background, so cluster size is the confidence signal.
pub struct RectGrouper {
    eps: f64,
}

impl RectGrouper {
    pub fn new(eps: f64) -> Self {
        Self { eps }
    }

    /// Groups `hits`, keeping clusters with more than `min_neighbors` members.
    ///
    /// With `min_neighbors == 0` every hit is returned unchanged. Boxes are
    /// emitted in order of each cluster's first member.
    pub fn group(&self, hits: &[Region], min_neighbors: u32) -> Vec<Region> {
        if min_neighbors == 0 || hits.is_empty() {
            return hits.to_vec();
        }

        let labels = self.partition(hits);
        let n_classes = labels.iter().copied().max().map_or(0, |m| m + 1);

        let mut sums = vec![(0i64, 0i64, 0i64, 0i64); n_classes];
        let mut counts = vec![0u32; n_classes];
        for (r, &label) in hits.iter().zip(&labels) {
            let s = &mut sums[label];
            s.0 += r.x as i64;
            s.1 += r.y as i64;
            s.2 += r.width as i64;
            s.3 += r.height as i64;
            counts[label] += 1;
        }

        let averaged: Vec<Region> = sums
            .iter()
            .zip(&counts)
            .map(|(s, &n)| {
                let inv = 1.0 / n as f64;
                Region::new(
                    (s.0 as f64 * inv).round() as i32,
                    (s.1 as f64 * inv).round() as i32,
                    (s.2 as f64 * inv).round() as i32,
                    (s.3 as f64 * inv).round() as i32,
                )
            })
            .collect();

        let mut kept = Vec::new();
        for (i, r1) in averaged.iter().enumerate() {
            let n1 = counts[i];
            if n1 <= min_neighbors {
                continue;
            }

            let nested = averaged.iter().enumerate().any(|(j, r2)| {
                let n2 = counts[j];
                if j == i || n2 <= min_neighbors {
                    return false;
                }
                let dx = (r2.width as f64 * self.eps).round() as i32;
                let dy = (r2.height as f64 * self.eps).round() as i32;
                r1.x >= r2.x - dx
                    && r1.y >= r2.y - dy
                    && r1.right() <= r2.right() + dx
                    && r1.bottom() <= r2.bottom() + dy
                    && (n2 > n1.max(3) || n1 < 3)
            });

            if !nested {
                kept.push(*r1);
            }
        }
        kept
    }

    /// Labels hits by equivalence class, classes numbered in first-seen order.
    fn partition(&self, hits: &[Region]) -> Vec<usize> {
        let mut parent: Vec<usize> = (0..hits.len()).collect();

        for i in 0..hits.len() {
            for j in (i + 1)..hits.len() {
                if self.similar(&hits[i], &hits[j]) {
                    let ri = find(&mut parent, i);
                    let rj = find(&mut parent, j);
                    if ri != rj {
                        parent[rj] = ri;
                    }
                }
            }
        }

        let mut label_of_root = vec![usize::MAX; hits.len()];
        let mut next = 0;
        (0..hits.len())
            .map(|i| {
                let root = find(&mut parent, i);
                if label_of_root[root] == usize::MAX {
                    label_of_root[root] = next;
                    next += 1;
                }
                label_of_root[root]
            })
            .collect()
    }

    fn similar(&self, a: &Region, b: &Region) -> bool {
        let delta = self.eps
            * (a.width.min(b.width) as f64 + a.height.min(b.height) as f64)
            * 0.5;
        (a.x - b.x).abs() as f64 <= delta
            && (a.y - b.y).abs() as f64 <= delta
            && (a.right() - b.right()).abs() as f64 <= delta
            && (a.bottom() - b.bottom()).abs() as f64 <= delta
    }
}

impl Default for RectGrouper {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP_EPS)
    }
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}
