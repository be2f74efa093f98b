//! Max-flow / min-cut on a capacitated network (Dinic's algorithm).

use std::collections::VecDeque;

use crate::utils::EPSILON;

#[derive(Debug, Clone, Copy)]
struct Arc {
    to: usize,
    cap: f64,
}

/// Flow network with `n` inner nodes plus an implicit source and sink.
///
/// Arcs are stored in pairs: arc `2k` and its residual twin `2k + 1`.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    adj: Vec<Vec<usize>>,
    arcs: Vec<Arc>,
    source: usize,
    sink: usize,
    level: Vec<i32>,
    cursor: Vec<usize>,
}

impl FlowGraph {
    pub fn new(n: usize) -> Self {
        Self {
            adj: vec![Vec::new(); n + 2],
            arcs: Vec::new(),
            source: n,
            sink: n + 1,
            level: vec![-1; n + 2],
            cursor: vec![0; n + 2],
        }
    }

    fn push_arc(&mut self, from: usize, to: usize, cap: f64, rev_cap: f64) {
        self.adj[from].push(self.arcs.len());
        self.arcs.push(Arc { to, cap });
        self.adj[to].push(self.arcs.len());
        self.arcs.push(Arc { to: from, cap: rev_cap });
    }

    /// Adds `i -> j` with capacity `cap` and `j -> i` with `rev_cap`.
    pub fn add_edge(&mut self, i: usize, j: usize, cap: f64, rev_cap: f64) {
        if cap > 0.0 || rev_cap > 0.0 {
            self.push_arc(i, j, cap.max(0.0), rev_cap.max(0.0));
        }
    }

    /// Adds source -> `i` (`cap_source`) and `i` -> sink (`cap_sink`).
    ///
    /// The common part of both capacities is cancelled out; it does not
    /// change the cut, only the flow value.
    pub fn add_terminal_weights(&mut self, i: usize, cap_source: f64, cap_sink: f64) {
        let common = cap_source.min(cap_sink);
        let (s, t) = (cap_source - common, cap_sink - common);
        if s > 0.0 {
            self.push_arc(self.source, i, s, 0.0);
        }
        if t > 0.0 {
            self.push_arc(i, self.sink, t, 0.0);
        }
    }

    fn bfs(&mut self) -> bool {
        self.level.iter_mut().for_each(|l| *l = -1);
        let mut queue = VecDeque::new();
        self.level[self.source] = 0;
        queue.push_back(self.source);
        while let Some(u) = queue.pop_front() {
            for &a in &self.adj[u] {
                let arc = self.arcs[a];
                if arc.cap > EPSILON && self.level[arc.to] < 0 {
                    self.level[arc.to] = self.level[u] + 1;
                    queue.push_back(arc.to);
                }
            }
        }
        self.level[self.sink] >= 0
    }

    /// Finds one augmenting path in the level graph and pushes its
    /// bottleneck. The path is kept on an explicit stack of arcs, so long
    /// chains do not grow the call stack.
    fn augment(&mut self, path: &mut Vec<usize>) -> f64 {
        path.clear();
        let mut u = self.source;
        loop {
            if u == self.sink {
                let flow = path.iter().map(|&a| self.arcs[a].cap).fold(f64::INFINITY, f64::min);
                for &a in path.iter() {
                    self.arcs[a].cap -= flow;
                    self.arcs[a ^ 1].cap += flow;
                }
                return flow;
            }
            let mut advanced = false;
            while self.cursor[u] < self.adj[u].len() {
                let a = self.adj[u][self.cursor[u]];
                let Arc { to, cap } = self.arcs[a];
                if cap > EPSILON && self.level[to] == self.level[u] + 1 {
                    path.push(a);
                    u = to;
                    advanced = true;
                    break;
                }
                self.cursor[u] += 1;
            }
            if advanced {
                continue;
            }
            // dead end: retreat and skip the arc that led here
            let Some(a) = path.pop() else {
                return 0.0;
            };
            u = self.arcs[a ^ 1].to;
            self.cursor[u] += 1;
        }
    }

    /// Runs max-flow and returns its value.
    pub fn max_flow(&mut self) -> f64 {
        let mut total = 0.0;
        let mut path = Vec::new();
        while self.bfs() {
            self.cursor.iter_mut().for_each(|c| *c = 0);
            loop {
                let flow = self.augment(&mut path);
                if flow <= 0.0 {
                    break;
                }
                total += flow;
            }
        }
        total
    }

    /// After [`max_flow`](Self::max_flow): true if node `i` stays reachable
    /// from the source in the residual network.
    pub fn in_source_set(&self, i: usize) -> bool {
        self.level[i] >= 0
    }
}
