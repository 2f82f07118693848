// The editor of the neighborhood to regional mapping.

use std::collections::BTreeMap;

use crate::tally::store::*;
use crate::tally::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct NeighborhoodEntry {
    pub name: String,
    #[serde(rename = "regionalId")]
    pub regional_id: Option<u32>,
    #[serde(rename = "regionalName")]
    pub regional_name: Option<String>,
    /// Number of vote rows with this neighborhood.
    pub rows: usize,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct MappingSummary {
    pub city: String,
    pub regionals: usize,
    pub neighborhoods: usize,
    pub mapped: usize,
}

/// The cities found in the vote rows, sorted, each with its first spelling.
pub fn list_cities(store: &Store) -> Vec<String> {
    let mut cities: BTreeMap<String, String> = BTreeMap::new();
    let all = store
        .neighborhood_rows
        .iter()
        .map(|r| &r.city)
        .chain(store.section_rows.iter().map(|r| &r.city));
    for city in all {
        let key = normalize_key(city);
        if !key.is_empty() {
            cities.entry(key).or_insert_with(|| city.trim().to_string());
        }
    }
    cities.into_values().collect()
}

pub fn create_regional(
    store: &mut Store,
    name: &str,
    city: &str,
    code: Option<&str>,
) -> TallyResult<u32> {
    ensure_whatever!(!name.trim().is_empty(), "The name of a regional may not be empty");
    ensure_whatever!(!city.trim().is_empty(), "The city of a regional may not be empty");
    let name_key = normalize_key(name);
    let city_key = normalize_key(city);
    if store
        .regionals
        .iter()
        .any(|r| normalize_key(&r.name) == name_key && normalize_key(&r.city) == city_key)
    {
        whatever!("The regional {} already exists in {}", name, city)
    }
    let id = store.allocate_id();
    store.regionals.push(Regional {
        id,
        name: name.trim().to_string(),
        code: code.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        city: city.trim().to_string(),
        active: true,
    });
    info!("create_regional: {} {} ({})", id, name, city);
    Ok(id)
}

/// Renames a regional, or changes its code. Its city does not change.
pub fn update_regional(
    store: &mut Store,
    id: u32,
    name: &str,
    code: Option<&str>,
) -> TallyResult<()> {
    ensure_whatever!(!name.trim().is_empty(), "The name of a regional may not be empty");
    let city_key = normalize_key(&store.regional(id)?.city);
    let name_key = normalize_key(name);
    if store.regionals.iter().any(|r| {
        r.id != id && normalize_key(&r.name) == name_key && normalize_key(&r.city) == city_key
    }) {
        whatever!("Another regional of the same city is named {}", name)
    }
    let regional = store
        .regionals
        .iter_mut()
        .find(|r| r.id == id)
        .context(UnknownRegionalSnafu { id })?;
    regional.name = name.trim().to_string();
    regional.code = code.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
    info!("update_regional: {} {}", id, regional.name);
    Ok(())
}

/// Returns the new state of the regional.
pub fn toggle_regional(store: &mut Store, id: u32) -> TallyResult<bool> {
    let regional = store
        .regionals
        .iter_mut()
        .find(|r| r.id == id)
        .context(UnknownRegionalSnafu { id })?;
    regional.active = !regional.active;
    info!("toggle_regional: {} active: {}", id, regional.active);
    Ok(regional.active)
}

/// The regionals of a city (or of all the cities), sorted by name.
pub fn list_regionals<'a>(store: &'a Store, city: Option<&str>) -> Vec<&'a Regional> {
    let city_key = city.map(normalize_key);
    let mut res: Vec<&Regional> = store
        .regionals
        .iter()
        .filter(|r| match &city_key {
            Some(k) => normalize_key(&r.city) == *k,
            None => true,
        })
        .collect();
    res.sort_by_key(|r| normalize_key(&r.name));
    res
}

/// The neighborhoods of a city with their regional.
///
/// They come from the neighborhood rows, or from the section rows when the city
/// has no neighborhood row.
pub fn list_neighborhoods(store: &Store, city: &str) -> Vec<NeighborhoodEntry> {
    let city_key = normalize_key(city);
    let from_neighborhoods: Vec<&str> = store
        .neighborhood_rows
        .iter()
        .filter(|r| normalize_key(&r.city) == city_key)
        .map(|r| r.neighborhood.as_str())
        .collect();
    let names: Vec<&str> = if from_neighborhoods.is_empty() {
        debug!("list_neighborhoods: no neighborhood rows in {}, using the sections", city);
        store
            .section_rows
            .iter()
            .filter(|r| normalize_key(&r.city) == city_key)
            .map(|r| r.neighborhood.as_str())
            .collect()
    } else {
        from_neighborhoods
    };

    let mut entries: BTreeMap<String, NeighborhoodEntry> = BTreeMap::new();
    for name in names {
        let key = normalize_key(name);
        if key.is_empty() {
            continue;
        }
        let entry = entries.entry(key).or_insert_with(|| {
            let regional_id = store.regional_for(city, name);
            NeighborhoodEntry {
                name: name.trim().to_string(),
                regional_id,
                regional_name: regional_id
                    .and_then(|id| store.regional(id).ok())
                    .map(|r| r.name.clone()),
                rows: 0,
            }
        });
        entry.rows += 1;
    }
    entries.into_values().collect()
}

/// Assigns a neighborhood to a regional, or removes its assignment with `None`.
///
/// The regional must belong to the same city. The regional of the matching
/// neighborhood rows is updated; their number is returned.
pub fn assign(
    store: &mut Store,
    city: &str,
    neighborhood: &str,
    regional_id: Option<u32>,
) -> TallyResult<usize> {
    let city_key = normalize_key(city);
    let neighborhood_key = normalize_key(neighborhood);
    ensure_whatever!(
        !city_key.is_empty() && !neighborhood_key.is_empty(),
        "Both the city and the neighborhood are required"
    );
    if let Some(id) = regional_id {
        let regional = store.regional(id)?;
        ensure_whatever!(
            regional.active,
            "The regional {} is deactivated",
            regional.name
        );
        if normalize_key(&regional.city) != city_key {
            whatever!(
                "The regional {} belongs to {}, not to {}",
                regional.name,
                regional.city,
                city
            )
        }
    }

    let existing = store.assignments.iter().position(|a| {
        normalize_key(&a.city) == city_key && normalize_key(&a.neighborhood) == neighborhood_key
    });
    match (existing, regional_id) {
        (Some(idx), Some(id)) => store.assignments[idx].regional_id = id,
        (None, Some(id)) => store.assignments.push(RegionalAssignment {
            city: city.trim().to_string(),
            neighborhood: neighborhood.trim().to_string(),
            regional_id: id,
        }),
        (Some(idx), None) => {
            store.assignments.remove(idx);
        }
        (None, None) => debug!("assign: {} in {} was not assigned", neighborhood, city),
    }

    let mut updated: usize = 0;
    for row in store.neighborhood_rows.iter_mut().filter(|r| {
        normalize_key(&r.city) == city_key && normalize_key(&r.neighborhood) == neighborhood_key
    }) {
        row.regional_id = regional_id;
        updated += 1;
    }
    info!(
        "assign: {} in {} -> {:?} ({} rows)",
        neighborhood, city, regional_id, updated
    );
    Ok(updated)
}

pub fn mapping_summary(store: &Store, city: &str) -> MappingSummary {
    let neighborhoods = list_neighborhoods(store, city);
    MappingSummary {
        city: city.trim().to_string(),
        regionals: list_regionals(store, Some(city)).len(),
        neighborhoods: neighborhoods.len(),
        mapped: neighborhoods
            .iter()
            .filter(|n| n.regional_id.is_some())
            .count(),
    }
}
