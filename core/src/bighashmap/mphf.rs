//! Minimal perfect hash function over a fixed key set.
//!
//! CHM-style construction: every key is an edge between two vertices of a
//! random graph with `m ≈ 2.1 * n` vertices. If the graph is acyclic, vertex
//! labels `g` can be assigned so that `(g[h1] + g[h2]) mod n` reproduces each
//! key's position in the build order — a minimal perfect hash. Cyclic graphs
//! are rare at this density and are handled by retrying with fresh seeds.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::hash::seeded_hash64;
use crate::value::get_u32;

const GRAPH_RATIO_PERCENT: u64 = 209; // m = 2.09 * n
const MAX_BUILD_ATTEMPTS: u64 = 100;

#[derive(Debug, Clone)]
pub struct Mphf {
    n: u32,
    m: u32,
    seed1: u64,
    seed2: u64,
    g: Vec<u32>,
}

impl Mphf {
    /// Number of keys in the build set; also the table size of a minimal map.
    pub fn size(&self) -> u32 {
        self.n
    }

    /// Maps a key to `[0, size)`. Keys outside the build set map to an
    /// arbitrary slot; callers must guard lookups with a checksum.
    pub fn hash(&self, key: &[u8]) -> u32 {
        if self.n == 0 {
            return 0;
        }
        let (v1, v2) = self.vertices(key);
        let sum = self.g[v1 as usize].wrapping_add(self.g[v2 as usize]);
        sum % self.n
    }

    fn vertices(&self, key: &[u8]) -> (u32, u32) {
        let m = self.m as u64;
        let v1 = (seeded_hash64(self.seed1, key) % m) as u32;
        let mut v2 = (seeded_hash64(self.seed2, key) % m) as u32;
        if v1 == v2 {
            v2 = (v2 + 1) % self.m;
        }
        (v1, v2)
    }

    /// Builds a minimal perfect hash over `keys`. Keys must be distinct.
    pub fn build<K: AsRef<[u8]>>(keys: &[K]) -> Result<Mphf> {
        let n = keys.len() as u32;
        if n == 0 {
            return Ok(Mphf {
                n: 0,
                m: 0,
                seed1: 0,
                seed2: 0,
                g: Vec::new(),
            });
        }
        let m = ((n as u64 * GRAPH_RATIO_PERCENT) / 100 + 3) as u32;

        for attempt in 0..MAX_BUILD_ATTEMPTS {
            let seed1 = 0x9e3779b97f4a7c15u64.wrapping_mul(2 * attempt + 1);
            let seed2 = 0xc2b2ae3d27d4eb4fu64.wrapping_mul(2 * attempt + 2);
            let candidate = Mphf {
                n,
                m,
                seed1,
                seed2,
                g: Vec::new(),
            };
            if let Some(g) = candidate.try_assign(keys) {
                return Ok(Mphf {
                    n,
                    m,
                    seed1,
                    seed2,
                    g,
                });
            }
        }
        Err(Error::build(format!(
            "no acyclic graph found for {} keys after {} attempts",
            n, MAX_BUILD_ATTEMPTS
        )))
    }

    /// Attempts the label assignment; `None` means the graph was cyclic (or
    /// two keys collided on the same edge) and the caller must reseed.
    fn try_assign<K: AsRef<[u8]>>(&self, keys: &[K]) -> Option<Vec<u32>> {
        let m = self.m as usize;
        let n = self.n as usize;

        // adjacency lists: (neighbor vertex, edge index)
        let mut adj: Vec<Vec<(u32, u32)>> = vec![Vec::new(); m];
        for (i, key) in keys.iter().enumerate() {
            let (v1, v2) = self.vertices(key.as_ref());
            adj[v1 as usize].push((v2, i as u32));
            adj[v2 as usize].push((v1, i as u32));
        }

        // acyclicity check by peeling degree-1 vertices
        let mut degree: Vec<u32> = adj.iter().map(|a| a.len() as u32).collect();
        let mut removed_edge = vec![false; n];
        let mut queue: Vec<u32> = (0..m as u32).filter(|&v| degree[v as usize] == 1).collect();
        let mut peeled = 0usize;
        while let Some(v) = queue.pop() {
            if degree[v as usize] != 1 {
                continue;
            }
            if let Some(&(u, e)) = adj[v as usize]
                .iter()
                .find(|&&(_, e)| !removed_edge[e as usize])
            {
                removed_edge[e as usize] = true;
                peeled += 1;
                degree[v as usize] -= 1;
                degree[u as usize] -= 1;
                if degree[u as usize] == 1 {
                    queue.push(u);
                }
            }
        }
        if peeled != n {
            return None;
        }

        // assignment: walk each component, fixing g so that
        // (g[v1] + g[v2]) mod n equals the edge's key index
        let mut g = vec![0u32; m];
        let mut visited = vec![false; m];
        let mut edge_done = vec![false; n];
        let mut stack: Vec<u32> = Vec::new();
        for root in 0..m as u32 {
            if visited[root as usize] || adj[root as usize].is_empty() {
                visited[root as usize] = true;
                continue;
            }
            visited[root as usize] = true;
            stack.push(root);
            while let Some(v) = stack.pop() {
                for &(u, e) in &adj[v as usize] {
                    if edge_done[e as usize] {
                        continue;
                    }
                    edge_done[e as usize] = true;
                    if !visited[u as usize] {
                        visited[u as usize] = true;
                        let want = e % self.n;
                        g[u as usize] = (want + self.n - g[v as usize] % self.n) % self.n;
                        stack.push(u);
                    }
                }
            }
        }
        Some(g)
    }

    // --- persistence ---

    pub fn write_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::cannot_open(path, e))?;
        let mut w = BufWriter::new(file);
        w.write_all(&self.n.to_le_bytes())?;
        w.write_all(&self.m.to_le_bytes())?;
        w.write_all(&self.seed1.to_le_bytes())?;
        w.write_all(&self.seed2.to_le_bytes())?;
        for &x in &self.g {
            w.write_all(&x.to_le_bytes())?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn read_file(path: &Path) -> Result<Mphf> {
        let mut file = File::open(path).map_err(|e| Error::cannot_open(path, e))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        if buf.len() < 24 {
            return Err(Error::corrupt("mphf file too short"));
        }
        let n = get_u32(&buf, 0)?;
        let m = get_u32(&buf, 4)?;
        let seed1 = u64::from_le_bytes(buf[8..16].try_into().map_err(|_| Error::corrupt("mphf"))?);
        let seed2 = u64::from_le_bytes(buf[16..24].try_into().map_err(|_| Error::corrupt("mphf"))?);
        let expected = 24 + m as usize * 4;
        if buf.len() != expected {
            return Err(Error::corrupt(format!(
                "mphf file has {} bytes, expected {}",
                buf.len(),
                expected
            )));
        }
        let mut g = Vec::with_capacity(m as usize);
        for i in 0..m as usize {
            g.push(get_u32(&buf, 24 + i * 4)?);
        }
        Ok(Mphf {
            n,
            m,
            seed1,
            seed2,
            g,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn is_minimal_and_perfect() {
        let keys: Vec<String> = (0..5000).map(|i| format!("key-{}", i)).collect();
        let mphf = Mphf::build(&keys).unwrap();
        assert_eq!(mphf.size(), 5000);
        let slots: HashSet<u32> = keys.iter().map(|k| mphf.hash(k.as_bytes())).collect();
        assert_eq!(slots.len(), keys.len());
        assert!(slots.iter().all(|&s| s < 5000));
    }

    #[test]
    fn empty_key_set() {
        let mphf = Mphf::build::<&[u8]>(&[]).unwrap();
        assert_eq!(mphf.size(), 0);
        assert_eq!(mphf.hash(b"anything"), 0);
    }

    #[test]
    fn roundtrips_through_file() {
        let keys = ["alpha", "beta", "gamma", "delta"];
        let mphf = Mphf::build(&keys).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mph");
        mphf.write_file(&path).unwrap();
        let loaded = Mphf::read_file(&path).unwrap();
        for k in keys {
            assert_eq!(mphf.hash(k.as_bytes()), loaded.hash(k.as_bytes()));
        }
    }
}
