//! Hierarchical density-based clustering over 2D points.
//!
//! Mutual-reachability MST -> single-linkage hierarchy -> condensed tree ->
//! excess-of-mass selection. The root is never selected, so a batch either
//! splits into at least two groups or is entirely noise.

use std::collections::{HashMap, VecDeque};

use phylo_core::types::{Point2, NOISE};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Merge {
    left: usize,
    right: usize,
    distance: f64,
    size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CondensedRow {
    parent: usize,
    child: usize,
    lambda: f64,
    size: usize,
}

fn euclidean(a: &Point2, b: &Point2) -> f64 {
    let dx = f64::from(a[0]) - f64::from(b[0]);
    let dy = f64::from(a[1]) - f64::from(b[1]);
    (dx * dx + dy * dy).sqrt()
}

/// Distance to the `min_samples`-th nearest other point (clamped to n - 1).
pub fn core_distances(points: &[Point2], min_samples: usize) -> Vec<f64> {
    let n = points.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let k = min_samples.clamp(1, n - 1);
    (0..n)
        .map(|i| {
            let mut d: Vec<f64> = (0..n).filter(|&j| j != i).map(|j| euclidean(&points[i], &points[j])).collect();
            let (_, kth, _) = d.select_nth_unstable_by(k - 1, f64::total_cmp);
            *kth
        })
        .collect()
}

/// Prim's algorithm on the dense mutual-reachability graph.
fn mutual_reachability_mst(points: &[Point2], core: &[f64]) -> Vec<(usize, usize, f64)> {
    let n = points.len();
    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut best_from = vec![0usize; n];
    let mut edges = Vec::with_capacity(n.saturating_sub(1));

    let mut current = 0usize;
    in_tree[current] = true;
    for _ in 1..n {
        for j in 0..n {
            if in_tree[j] {
                continue;
            }
            let mr = euclidean(&points[current], &points[j]).max(core[current]).max(core[j]);
            if mr < best[j] {
                best[j] = mr;
                best_from[j] = current;
            }
        }
        let mut next = usize::MAX;
        for j in 0..n {
            if !in_tree[j] && (next == usize::MAX || best[j] < best[next]) {
                next = j;
            }
        }
        in_tree[next] = true;
        edges.push((best_from[next], next, best[next]));
        current = next;
    }
    edges
}

struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
    next_label: usize,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        let total = 2 * n - 1;
        let mut size = vec![0usize; total];
        for s in size.iter_mut().take(n) {
            *s = 1;
        }
        Self { parent: (0..total).collect(), size, next_label: n }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) -> usize {
        let label = self.next_label;
        self.parent[a] = label;
        self.parent[b] = label;
        self.size[label] = self.size[a] + self.size[b];
        self.next_label += 1;
        label
    }
}

/// Merge `k` of the result creates node `n + k`.
fn single_linkage(mut mst: Vec<(usize, usize, f64)>, n: usize) -> Vec<Merge> {
    mst.sort_by(|a, b| a.2.total_cmp(&b.2));
    let mut uf = UnionFind::new(n);
    mst.into_iter()
        .map(|(a, b, distance)| {
            let (ra, rb) = (uf.find(a), uf.find(b));
            let label = uf.union(ra, rb);
            Merge { left: ra, right: rb, distance, size: uf.size[label] }
        })
        .collect()
}

fn subtree_nodes(hierarchy: &[Merge], n: usize, start: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        out.push(node);
        if node >= n {
            let m = hierarchy[node - n];
            stack.push(m.right);
            stack.push(m.left);
        }
    }
    out
}

fn lambda_of(distance: f64) -> f64 {
    if distance > 0.0 { 1.0 / distance } else { f64::MAX }
}

/// Collapse the hierarchy so that only splits into two parts of at least
/// `min_cluster_size` create new clusters; smaller parts fall out as points.
/// Cluster labels start at `n` (the root).
fn condense(hierarchy: &[Merge], n: usize, min_cluster_size: usize) -> Vec<CondensedRow> {
    let root = 2 * n - 2;
    let mut relabel = vec![0usize; 2 * n - 1];
    relabel[root] = n;
    let mut next_label = n + 1;
    let mut ignore = vec![false; 2 * n - 1];
    let mut rows = Vec::new();

    let count = |node: usize| if node >= n { hierarchy[node - n].size } else { 1 };

    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        if node < n {
            continue;
        }
        let m = hierarchy[node - n];
        queue.push_back(m.left);
        queue.push_back(m.right);
        if ignore[node] {
            continue;
        }
        let lambda = lambda_of(m.distance);
        let (left_count, right_count) = (count(m.left), count(m.right));
        let parent = relabel[node];

        let fall_out = |side: usize, rows: &mut Vec<CondensedRow>, ignore: &mut [bool]| {
            for sub in subtree_nodes(hierarchy, n, side) {
                if sub < n {
                    rows.push(CondensedRow { parent, child: sub, lambda, size: 1 });
                }
                ignore[sub] = true;
            }
        };

        match (left_count >= min_cluster_size, right_count >= min_cluster_size) {
            (true, true) => {
                for (side, size) in [(m.left, left_count), (m.right, right_count)] {
                    relabel[side] = next_label;
                    rows.push(CondensedRow { parent, child: next_label, lambda, size });
                    next_label += 1;
                }
            }
            (false, false) => {
                fall_out(m.left, &mut rows, &mut ignore);
                fall_out(m.right, &mut rows, &mut ignore);
            }
            (false, true) => {
                relabel[m.right] = parent;
                fall_out(m.left, &mut rows, &mut ignore);
            }
            (true, false) => {
                relabel[m.left] = parent;
                fall_out(m.right, &mut rows, &mut ignore);
            }
        }
    }
    rows
}

/// Excess-of-mass stability per cluster label (index = label - n).
fn stabilities(tree: &[CondensedRow], n: usize, n_clusters: usize) -> Vec<f64> {
    let mut births = vec![0.0f64; n_clusters];
    for row in tree.iter().filter(|r| r.child >= n) {
        births[row.child - n] = row.lambda;
    }
    let mut stability = vec![0.0f64; n_clusters];
    for row in tree {
        let birth = births[row.parent - n];
        stability[row.parent - n] += (row.lambda - birth) * row.size as f64;
    }
    stability
}

fn child_clusters(tree: &[CondensedRow], n: usize, parent: usize) -> impl Iterator<Item = usize> + '_ {
    tree.iter().filter(move |r| r.parent == parent && r.child >= n).map(|r| r.child)
}

/// Pick the flat clustering: a cluster survives unless its descendants are
/// jointly more stable. Returns selected labels in ascending order.
fn select_clusters(tree: &[CondensedRow], n: usize) -> Vec<usize> {
    let n_clusters = tree
        .iter()
        .map(|r| if r.child >= n { r.child } else { r.parent })
        .max()
        .map_or(0, |max_label| max_label - n + 1);
    if n_clusters <= 1 {
        return Vec::new();
    }
    let mut stability = stabilities(tree, n, n_clusters);

    let mut selected = vec![true; n_clusters];
    selected[0] = false;
    for label in (n + 1..n + n_clusters).rev() {
        let subtree: f64 = child_clusters(tree, n, label).map(|c| stability[c - n]).sum();
        if subtree > stability[label - n] {
            selected[label - n] = false;
            stability[label - n] = subtree;
        } else {
            let mut stack: Vec<usize> = child_clusters(tree, n, label).collect();
            while let Some(c) = stack.pop() {
                selected[c - n] = false;
                stack.extend(child_clusters(tree, n, c));
            }
        }
    }
    (0..n_clusters).filter(|&i| selected[i]).map(|i| i + n).collect()
}

/// Flat labels per point: `0..k` for clusters (ascending condensed-tree
/// order), [`NOISE`] otherwise.
pub fn hdbscan(points: &[Point2], min_cluster_size: usize, min_samples: usize) -> Vec<i32> {
    let n = points.len();
    if n < 2 || n < min_cluster_size {
        return vec![NOISE; n];
    }
    let core = core_distances(points, min_samples);
    let mst = mutual_reachability_mst(points, &core);
    let hierarchy = single_linkage(mst, n);
    let tree = condense(&hierarchy, n, min_cluster_size.max(2));
    let selected = select_clusters(&tree, n);

    let cluster_parent: HashMap<usize, usize> =
        tree.iter().filter(|r| r.child >= n).map(|r| (r.child, r.parent)).collect();
    let flat: HashMap<usize, i32> =
        selected.iter().enumerate().map(|(i, &c)| (c, i as i32)).collect();

    let mut labels = vec![NOISE; n];
    for row in tree.iter().filter(|r| r.child < n) {
        let mut c = row.parent;
        labels[row.child] = loop {
            if let Some(&l) = flat.get(&c) {
                break l;
            }
            match cluster_parent.get(&c) {
                Some(&p) => c = p,
                None => break NOISE,
            }
        };
    }
    labels
}
