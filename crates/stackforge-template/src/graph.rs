//! Dependency graph over declared resources
//!
//! Edges run from a referenced resource to the resource that references it.
//! Parameter references carry no ordering constraint and are ignored here.

use crate::error::{Result, TemplateError};
use crate::model::Resource;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

pub(crate) struct DependencyGraph<'a> {
    ids: Vec<&'a str>,
    /// dependents[i] = resources that reference resource i
    dependents: Vec<Vec<usize>>,
    /// dependencies[i] = resources referenced by resource i
    dependencies: Vec<Vec<usize>>,
}

impl<'a> DependencyGraph<'a> {
    pub(crate) fn new(resources: &'a [Resource]) -> Self {
        let index: HashMap<&str, usize> = resources
            .iter()
            .enumerate()
            .map(|(i, r)| (r.logical_id.as_str(), i))
            .collect();

        let mut dependents = vec![Vec::new(); resources.len()];
        let mut dependencies = vec![Vec::new(); resources.len()];
        for (i, resource) in resources.iter().enumerate() {
            for dep in resource.dependencies() {
                if let Some(&j) = index.get(dep) {
                    dependents[j].push(i);
                    dependencies[i].push(j);
                }
            }
        }

        Self {
            ids: resources.iter().map(|r| r.logical_id.as_str()).collect(),
            dependents,
            dependencies,
        }
    }

    /// Creation order that keeps declaration order wherever dependencies allow
    pub(crate) fn topological_order(&self) -> Result<Vec<usize>> {
        let n = self.ids.len();
        let mut indegree: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = indegree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(i)) = ready.pop() {
            order.push(i);
            for &j in &self.dependents[i] {
                indegree[j] -= 1;
                if indegree[j] == 0 {
                    ready.push(Reverse(j));
                }
            }
        }

        if order.len() < n {
            let stuck: Vec<usize> = (0..n).filter(|i| indegree[*i] > 0).collect();
            return Err(TemplateError::CyclicReference(self.find_cycle(&stuck)));
        }
        Ok(order)
    }

    /// Walk dependency edges among unresolved nodes until one repeats
    fn find_cycle(&self, stuck: &[usize]) -> Vec<String> {
        let Some(&start) = stuck.first() else {
            return Vec::new();
        };
        let mut path = vec![start];
        let mut current = start;
        loop {
            let Some(&next) = self.dependencies[current]
                .iter()
                .find(|d| stuck.contains(d))
            else {
                break;
            };
            if let Some(pos) = path.iter().position(|p| *p == next) {
                let mut cycle: Vec<String> =
                    path[pos..].iter().map(|i| self.ids[*i].to_string()).collect();
                cycle.push(self.ids[next].to_string());
                return cycle;
            }
            path.push(next);
            current = next;
        }
        path.iter().map(|i| self.ids[*i].to_string()).collect()
    }
}
