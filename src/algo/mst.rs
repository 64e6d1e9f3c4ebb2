//! Minimum spanning tree by Prim's algorithm over a dense distance function.

use crate::error::Result;

/// Undirected weighted edge between node indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// First endpoint.
    pub a: usize,
    /// Second endpoint.
    pub b: usize,
    /// Edge weight.
    pub weight: f64,
}

/// Minimum spanning tree of the complete graph on `n` nodes.
///
/// Edges are returned in the order Prim adds them, starting from node 0.
/// Distance errors abort the computation.
pub fn prim(n: usize, mut dist: impl FnMut(usize, usize) -> Result<f64>) -> Result<Vec<Edge>> {
    if n < 2 {
        return Ok(Vec::new());
    }
    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut link = vec![0usize; n];
    let mut edges = Vec::with_capacity(n - 1);

    in_tree[0] = true;
    for v in 1..n {
        best[v] = dist(0, v)?;
    }

    for _ in 1..n {
        let Some(next) = (0..n)
            .filter(|&v| !in_tree[v])
            .min_by(|&x, &y| best[x].total_cmp(&best[y]).then(x.cmp(&y)))
        else {
            break;
        };
        in_tree[next] = true;
        edges.push(Edge {
            a: link[next],
            b: next,
            weight: best[next],
        });
        for v in 0..n {
            if !in_tree[v] {
                let d = dist(next, v)?;
                if d < best[v] {
                    best[v] = d;
                    link[v] = next;
                }
            }
        }
    }
    Ok(edges)
}

/// Drop the `skip` heaviest edges, keeping the order of the rest.
#[must_use]
pub fn skip_worst_edges(edges: &[Edge], skip: usize) -> Vec<Edge> {
    if skip == 0 {
        return edges.to_vec();
    }
    let mut by_weight: Vec<usize> = (0..edges.len()).collect();
    by_weight.sort_by(|&x, &y| edges[y].weight.total_cmp(&edges[x].weight).then(x.cmp(&y)));
    let dropped: Vec<usize> = by_weight.into_iter().take(skip).collect();
    edges
        .iter()
        .enumerate()
        .filter(|(i, _)| !dropped.contains(i))
        .map(|(_, e)| *e)
        .collect()
}
