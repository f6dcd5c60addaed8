use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Returns `None` unless both components are finite and inside the WGS84 ranges.
    pub fn checked(lat: f64, lng: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);

        valid.then_some(Self { lat, lng })
    }
}

/// Campus service zones. `Other` is a wildcard that matches every zone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Region {
    North,
    South,
    East,
    West,
    Central,
    Other,
}

impl Region {
    pub fn matches(self, other: Region) -> bool {
        self == Region::Other || other == Region::Other || self == other
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub address: String,
    pub coords: Option<GeoPoint>,
    pub region: Region,
    pub map_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{GeoPoint, Region};

    const ALL: [Region; 6] = [
        Region::North,
        Region::South,
        Region::East,
        Region::West,
        Region::Central,
        Region::Other,
    ];

    #[test]
    fn other_matches_every_region_in_both_directions() {
        for region in ALL {
            assert!(Region::Other.matches(region));
            assert!(region.matches(Region::Other));
        }
    }

    #[test]
    fn named_regions_match_only_themselves() {
        for a in ALL {
            for b in ALL {
                if a != Region::Other && b != Region::Other {
                    assert_eq!(a.matches(b), a == b, "{a:?} vs {b:?}");
                }
            }
        }
    }

    #[test]
    fn out_of_range_points_are_rejected() {
        assert!(GeoPoint::checked(-6.2, 106.8).is_some());
        assert!(GeoPoint::checked(91.0, 0.0).is_none());
        assert!(GeoPoint::checked(0.0, -180.5).is_none());
        assert!(GeoPoint::checked(f64::NAN, 0.0).is_none());
    }
}
