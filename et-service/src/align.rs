use std::collections::HashMap;

use crate::{
    reading::{JoinedReading, Reading},
    timestamp::Timestamp,
};

/// Left-join probe streams onto the base stream by exact timestamp.
///
/// The output has one row per base reading, in base order. Column 0 is the base
/// probe's water content, column `i + 1` comes from `others[i]`. A probe with no
/// reading at a base timestamp contributes `None`; nearest-neighbour matching is
/// never attempted.
pub fn align(base: &[Reading], others: &[&[Reading]]) -> Vec<JoinedReading> {
    let lookups: Vec<HashMap<Timestamp, Option<f64>>> = others
        .iter()
        .map(|stream| {
            let mut by_ts = HashMap::with_capacity(stream.len());
            for r in stream.iter() {
                by_ts.entry(r.timestamp).or_insert(r.water_content);
            }
            by_ts
        })
        .collect();

    base.iter()
        .map(|r| {
            let mut values = Vec::with_capacity(lookups.len() + 1);
            values.push(r.water_content);
            values.extend(
                lookups
                    .iter()
                    .map(|by_ts| by_ts.get(&r.timestamp).copied().flatten()),
            );
            JoinedReading {
                timestamp: r.timestamp,
                values,
            }
        })
        .collect()
}
