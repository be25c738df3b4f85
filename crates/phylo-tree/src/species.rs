use std::collections::HashMap;

use phylo_core::types::{is_noise, Cluster, ClusteredItem, Species};

use crate::dates::month_range;

/// One species per cluster present among `items`, in order of first
/// appearance, then stably sorted by earliest member timestamp. Noise items
/// and assignments with no matching cluster record are skipped.
pub fn generate_species(items: &[ClusteredItem], clusters: &[Cluster]) -> Vec<Species> {
    let by_id: HashMap<i64, &Cluster> = clusters.iter().map(|c| (i64::from(c.id), c)).collect();

    let mut groups: Vec<(&Cluster, Vec<&ClusteredItem>)> = Vec::new();
    let mut slot: HashMap<i32, usize> = HashMap::new();
    for ci in items.iter().filter(|ci| !is_noise(ci.cluster)) {
        let Some(cluster) = by_id.get(&i64::from(ci.cluster)) else {
            continue;
        };
        let pos = *slot.entry(ci.cluster).or_insert_with(|| {
            groups.push((cluster, Vec::new()));
            groups.len() - 1
        });
        groups[pos].1.push(ci);
    }

    let mut species: Vec<Species> = groups
        .into_iter()
        .map(|(cluster, members)| {
            let min_ts = members.iter().map(|m| m.item.timestamp).min().unwrap_or_default();
            let max_ts = members.iter().map(|m| m.item.timestamp).max().unwrap_or_default();
            Species {
                id: format!("species_{}", cluster.id),
                cluster_id: cluster.id,
                name: cluster.label.clone(),
                date_range: month_range(min_ts, max_ts),
                min_timestamp: min_ts,
                max_timestamp: max_ts,
                centroid: cluster.centroid,
                count: members.len(),
                item_ids: members.iter().map(|m| m.item.id.clone()).collect(),
            }
        })
        .collect();
    species.sort_by_key(|s| s.min_timestamp);
    species
}
