//! Reader for the location CSV (`spec.md` §6):
//! `building_type,tag,longitude,latitude,sqm`. Grounded on
//! `examples/original_source/read_building_csv.py` for field semantics
//! (house rows seed household position, everything else becomes a venue)
//! and on `pydemic-covid-rs`'s `bin/sim.rs` `read_params_table` for the
//! `csv::Reader::from_path` + `serde` row struct idiom.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::location::Location;
use crate::params::{LocationKind, LocationParamsTable};

#[derive(Debug, Deserialize)]
struct Row {
    building_type: String,
    tag: String,
    longitude: f64,
    latitude: f64,
    sqm: f64,
}

/// A house row's position, to be matched to a household by the external
/// building-to-household assignment (out of scope here, `spec.md` §1).
pub type HousePosition = (f64, f64);

/// Parsed contents of a location CSV: every non-house row becomes a
/// [`Location`] (using the type's calibration constants from `params`);
/// house rows are returned separately as raw positions.
pub struct ParsedLocations {
    pub locations: Vec<Location>,
    pub houses: Vec<HousePosition>,
}

pub fn read_csv(path: impl AsRef<Path>, params: &LocationParamsTable) -> Result<ParsedLocations> {
    let reader = csv::Reader::from_path(path)?;
    read_csv_from(reader, params)
}

fn read_csv_from<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    params: &LocationParamsTable,
) -> Result<ParsedLocations> {
    let mut locations = Vec::new();
    let mut houses = Vec::new();

    for result in reader.deserialize() {
        let row: Row = result?;
        if row.building_type == "house" {
            houses.push((row.longitude, row.latitude));
            continue;
        }
        let kind = LocationKind::from_label(&row.building_type).ok_or_else(|| {
            Error::BuildingInputInvalid(format!("unrecognized building_type {:?}", row.building_type))
        })?;
        let loc_params = params.get(kind).copied().ok_or_else(|| {
            Error::BuildingInputInvalid(format!("no configured parameters for location type {:?}", kind))
        })?;
        locations.push(Location::new(kind, row.tag, row.longitude, row.latitude, row.sqm, loc_params));
    }

    Ok(ParsedLocations { locations, houses })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(contents: &str) -> csv::Reader<&[u8]> {
        csv::Reader::from_reader(contents.as_bytes())
    }

    #[test]
    fn parses_houses_and_locations_separately() {
        let csv = "building_type,tag,longitude,latitude,sqm\n\
                    house,,1.0,2.0,0\n\
                    supermarket,grocer,1.5,2.5,120\n";
        let table = LocationParamsTable::default();
        let parsed = read_csv_from(reader(csv), &table).unwrap();
        assert_eq!(parsed.houses.len(), 1);
        assert_eq!(parsed.locations.len(), 1);
        assert_eq!(parsed.locations[0].kind(), LocationKind::Supermarket);
    }

    #[test]
    fn rejects_unrecognized_building_type() {
        let csv = "building_type,tag,longitude,latitude,sqm\n\
                    warehouse,,1.0,2.0,0\n";
        let table = LocationParamsTable::default();
        assert!(read_csv_from(reader(csv), &table).is_err());
    }
}
