use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};

use crate::{TrailCache, TrailSample};

impl TrailCache {
    /// One feature per trip: a LineString through its samples, with the matching `timestamps`
    /// as a property, the shape a trips-style playback layer wants.
    pub fn to_geojson(&self) -> GeoJson {
        let mut features = Vec::new();
        let mut start = 0;
        for idx in 1..=self.samples.len() {
            if idx == self.samples.len() || self.samples[idx].trip_id != self.samples[start].trip_id
            {
                features.push(trip_feature(&self.samples[start..idx]));
                start = idx;
            }
        }
        GeoJson::FeatureCollection(FeatureCollection {
            features,
            bbox: None,
            foreign_members: None,
        })
    }
}

fn trip_feature(samples: &[TrailSample]) -> Feature {
    let coords: Vec<Vec<f64>> = samples.iter().map(|s| vec![s.lon, s.lat]).collect();
    let value = if coords.len() == 1 {
        Value::Point(coords[0].clone())
    } else {
        Value::LineString(coords)
    };
    let mut feature = Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: None,
        foreign_members: None,
    };
    feature.set_property("trip_id", samples[0].trip_id.as_str());
    feature.set_property("route_id", samples[0].route_id.as_str());
    feature.set_property(
        "timestamps",
        samples.iter().map(|s| s.timestamp).collect::<Vec<u32>>(),
    );
    feature
}

#[cfg(test)]
mod tests {
    use gtfs::{RouteID, TripID};

    use super::*;
    use crate::tests::date;

    fn sample(trip: &str, timestamp: u32, lon: f64) -> TrailSample {
        TrailSample {
            trip_id: TripID::new(trip),
            timestamp,
            lat: 33.0,
            lon,
            route_id: RouteID::new("R1"),
        }
    }

    #[test]
    fn one_feature_per_trip() {
        let cache = TrailCache {
            date: date("2025-07-10"),
            samples: vec![
                sample("T1", 0, 132.0),
                sample("T1", 5, 132.1),
                sample("T2", 60, 132.5),
            ],
        };
        let features = match cache.to_geojson() {
            GeoJson::FeatureCollection(fc) => fc.features,
            _ => unreachable!(),
        };
        assert_eq!(features.len(), 2);

        let t1 = &features[0];
        assert_eq!(t1.property("trip_id").and_then(|x| x.as_str()), Some("T1"));
        assert_eq!(t1.property("timestamps"), Some(&serde_json::json!([0, 5])));
        assert_eq!(
            t1.geometry.as_ref().map(|g| g.value.clone()),
            Some(Value::LineString(vec![vec![132.0, 33.0], vec![132.1, 33.0]]))
        );
        assert!(matches!(
            features[1].geometry.as_ref().map(|g| &g.value),
            Some(Value::Point(_))
        ));
    }
}
