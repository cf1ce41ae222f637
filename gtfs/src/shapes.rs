use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{read_rows, FeedError, LatLon, ShapeID};

pub fn load<R: std::io::Read>(
    reader: R,
    problems: &mut Vec<FeedError>,
) -> BTreeMap<ShapeID, Vec<LatLon>> {
    let mut pts_per_shape: BTreeMap<ShapeID, Vec<(u32, LatLon)>> = BTreeMap::new();
    for rec in read_rows::<_, Record>(reader, "shapes.txt", problems) {
        pts_per_shape
            .entry(rec.shape_id)
            .or_insert_with(Vec::new)
            .push((
                rec.shape_pt_sequence,
                LatLon::new(rec.shape_pt_lat, rec.shape_pt_lon),
            ));
    }

    // Sort by shape_pt_sequence, in case the file isn't in order
    let mut results = BTreeMap::new();
    for (shape_id, mut pts) in pts_per_shape {
        pts.sort_by_key(|(seq, _)| *seq);
        let mut deduped: Vec<LatLon> = Vec::with_capacity(pts.len());
        for (_, pt) in pts {
            if deduped.last() != Some(&pt) {
                deduped.push(pt);
            }
        }
        results.insert(shape_id, deduped);
    }
    results
}

#[derive(Deserialize)]
struct Record {
    shape_id: ShapeID,
    shape_pt_lat: f64,
    shape_pt_lon: f64,
    shape_pt_sequence: u32,
}
