use std::collections::{BTreeMap, HashMap, VecDeque};

use bsp::bsp::{Visibility, VIS_PHS, VIS_PVS};
use log::debug;

use crate::portals::{Portal, PortalSide};

/// Which portals touch which clusters.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityState {
    pub num_clusters: usize,
    pub num_portals: usize,
    pub cluster_portals: BTreeMap<usize, Vec<usize>>,
    /// The two clusters of each portal, None when a side is solid or void.
    pub portal_clusters: Vec<Option<[usize; 2]>>,
}

pub fn create_bit_set(num_bits: usize) -> Vec<u8> {
    vec![0; (num_bits + 7) / 8]
}

pub fn set_bit(bits: &mut [u8], index: usize) {
    bits[index >> 3] |= 1 << (index & 7);
}

pub fn test_bit(bits: &[u8], index: usize) -> bool {
    bits.get(index >> 3)
        .map_or(false, |b| b & (1 << (index & 7)) != 0)
}

pub fn initialize_portal_flow(
    portals: &[Portal],
    element_clusters: &[i32],
    num_clusters: usize,
) -> VisibilityState {
    let cluster_of = |side: &PortalSide| -> Option<usize> {
        let leaf = side.leaf()?;
        match element_clusters.get(leaf) {
            Some(&c) if c >= 0 && (c as usize) < num_clusters => Some(c as usize),
            _ => None,
        }
    };

    let mut cluster_portals: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    let mut portal_clusters = Vec::with_capacity(portals.len());
    for (index, portal) in portals.iter().enumerate() {
        let pair = match (cluster_of(&portal.sides[0]), cluster_of(&portal.sides[1])) {
            (Some(a), Some(b)) => [a, b],
            _ => {
                portal_clusters.push(None);
                continue;
            }
        };
        cluster_portals.entry(pair[0]).or_insert_with(Vec::new).push(index);
        if pair[1] != pair[0] {
            cluster_portals.entry(pair[1]).or_insert_with(Vec::new).push(index);
        }
        portal_clusters.push(Some(pair));
    }

    VisibilityState {
        num_clusters,
        num_portals: portals.len(),
        cluster_portals,
        portal_clusters,
    }
}

/// Every cluster reachable from `start` through open portals, as a bit set.
pub fn flood_fill_visibility(state: &VisibilityState, start: usize) -> Vec<u8> {
    let mut visible = create_bit_set(state.num_clusters);
    if start >= state.num_clusters {
        return visible;
    }
    set_bit(&mut visible, start);

    let mut queue = VecDeque::new();
    queue.push_back(start);
    while let Some(cluster) = queue.pop_front() {
        let portals = match state.cluster_portals.get(&cluster) {
            Some(portals) => portals,
            None => continue,
        };
        for &portal in portals {
            let [a, b] = match state.portal_clusters[portal] {
                Some(pair) => pair,
                None => continue,
            };
            let other = if a == cluster { b } else { a };
            if !test_bit(&visible, other) {
                set_bit(&mut visible, other);
                queue.push_back(other);
            }
        }
    }
    visible
}

pub fn might_see_cluster(state: &VisibilityState, from: usize, to: usize) -> bool {
    test_bit(&flood_fill_visibility(state, from), to)
}

pub fn calculate_pvs(state: &VisibilityState) -> Vec<Vec<u8>> {
    (0..state.num_clusters)
        .map(|c| flood_fill_visibility(state, c))
        .collect()
}

/// Everything audible from a cluster: the union of what its visible
/// clusters can see.
pub fn calculate_phs(pvs: &[Vec<u8>], num_clusters: usize) -> Vec<Vec<u8>> {
    pvs.iter()
        .map(|row| {
            let mut hearable = create_bit_set(num_clusters);
            for other in (0..num_clusters).filter(|&c| test_bit(row, c)) {
                for (dst, src) in hearable.iter_mut().zip(&pvs[other]) {
                    *dst |= *src;
                }
            }
            hearable
        })
        .collect()
}

/// Run-length encode zero bytes: a zero is followed by how many zero bytes
/// it stands for.
pub fn compress_pvs(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(row.len());
    let mut i = 0;
    while i < row.len() {
        if row[i] != 0 {
            out.push(row[i]);
            i += 1;
            continue;
        }
        let mut count = 1;
        while i + count < row.len() && row[i + count] == 0 && count < 255 {
            count += 1;
        }
        out.push(0);
        out.push(count as u8);
        i += count;
    }
    out
}

pub fn decompress_pvs(data: &[u8], offset: usize, num_clusters: usize) -> Vec<u8> {
    let row_len = (num_clusters + 7) / 8;
    let mut out = Vec::with_capacity(row_len);
    let mut i = offset;
    while out.len() < row_len && i < data.len() {
        if data[i] != 0 {
            out.push(data[i]);
            i += 1;
            continue;
        }
        let count = match data.get(i + 1) {
            Some(&count) => count as usize,
            None => break,
        };
        out.extend(std::iter::repeat(0).take(count));
        i += 2;
    }
    out.resize(row_len, 0);
    out
}

/// Lay out the vis lump: the offset table, then each distinct compressed
/// row once.
pub fn build_visibility(pvs: &[Vec<u8>], phs: &[Vec<u8>]) -> Visibility {
    let num_clusters = pvs.len();
    let base = Visibility::table_size(num_clusters);
    let mut data = vec![];
    let mut offsets = vec![[0u32; 2]; num_clusters];
    let mut written: HashMap<Vec<u8>, u32> = HashMap::new();

    for (kind, rows) in [(VIS_PVS, pvs), (VIS_PHS, phs)].iter() {
        for (cluster, row) in rows.iter().enumerate() {
            let compressed = compress_pvs(row);
            let offset = *written.entry(compressed.clone()).or_insert_with(|| {
                let offset = (base + data.len()) as u32;
                data.extend_from_slice(&compressed);
                offset
            });
            offsets[cluster][*kind] = offset;
        }
    }

    Visibility {
        num_clusters: num_clusters as u32,
        offsets,
        data,
    }
}

pub fn compute_visibility(portals: &[Portal], element_clusters: &[i32], num_clusters: usize) -> Visibility {
    let state = initialize_portal_flow(portals, element_clusters, num_clusters);
    let pvs = calculate_pvs(&state);
    let phs = calculate_phs(&pvs, num_clusters);
    let vis = build_visibility(&pvs, &phs);
    debug!(
        "Visibility: {} clusters, {} portals, {} bytes",
        num_clusters,
        state.num_portals,
        vis.data.len()
    );
    vis
}

/// Everything sees everything.
pub fn generate_trivial_vis(num_clusters: usize) -> Visibility {
    let mut row = create_bit_set(num_clusters);
    for c in 0..num_clusters {
        set_bit(&mut row, c);
    }
    let rows = vec![row; num_clusters];
    build_visibility(&rows, &rows)
}
