// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;
use std::str::FromStr;

/// One tallied row, as loaded from the section or neighborhood tables.
///
/// Geographic fields that the source row does not carry are left empty:
/// neighborhood files have no zone or section, for instance.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteRecord {
    pub year: u32,
    pub city: Option<String>,
    pub zone: Option<String>,
    pub section: Option<String>,
    pub neighborhood: Option<String>,
    pub regional: Option<String>,
    pub votes: u64,
}

impl VoteRecord {
    /// A row from a per-section file.
    pub fn section(year: u32, zone: &str, section: &str, votes: u64) -> VoteRecord {
        VoteRecord {
            year,
            city: None,
            zone: Some(zone.to_string()),
            section: Some(section.to_string()),
            neighborhood: None,
            regional: None,
            votes,
        }
    }

    /// A row from a per-neighborhood file.
    pub fn neighborhood(year: u32, neighborhood: &str, votes: u64) -> VoteRecord {
        VoteRecord {
            year,
            city: None,
            zone: None,
            section: None,
            neighborhood: Some(neighborhood.to_string()),
            regional: None,
            votes,
        }
    }

    pub fn in_neighborhood(self, neighborhood: &str) -> VoteRecord {
        VoteRecord {
            neighborhood: Some(neighborhood.to_string()),
            ..self
        }
    }

    pub fn in_city(self, city: Option<&str>) -> VoteRecord {
        VoteRecord {
            city: city.map(|c| c.to_string()),
            ..self
        }
    }

    pub fn in_regional(self, regional: Option<&str>) -> VoteRecord {
        VoteRecord {
            regional: regional.map(|r| r.to_string()),
            ..self
        }
    }
}

/// The dimension used to group records before ranking them.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Dimension {
    Neighborhood,
    Zone,
    /// A zone-section pair. The neighborhood of the section is kept as detail.
    Section,
    Regional,
    Year,
    City,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Neighborhood,
        Dimension::Zone,
        Dimension::Section,
        Dimension::Regional,
        Dimension::Year,
        Dimension::City,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Neighborhood => "neighborhood",
            Dimension::Zone => "zone",
            Dimension::Section => "section",
            Dimension::Regional => "regional",
            Dimension::Year => "year",
            Dimension::City => "city",
        }
    }
}

impl FromStr for Dimension {
    type Err = TallyErrors;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match crate::normalize_key(s).as_str() {
            "bairro" | "bairros" | "neighborhood" | "neighborhoods" => Ok(Dimension::Neighborhood),
            "zona" | "zonas" | "zone" | "zones" => Ok(Dimension::Zone),
            "secao" | "secoes" | "section" | "sections" => Ok(Dimension::Section),
            "regional" | "regionais" | "regionals" => Ok(Dimension::Regional),
            "ano" | "anos" | "year" | "years" => Ok(Dimension::Year),
            "cidade" | "cidades" | "city" | "cities" => Ok(Dimension::City),
            _ => Err(TallyErrors::UnknownDimension(s.to_string())),
        }
    }
}

/// The filters of a dashboard view.
///
/// Empty lists mean "everything". Names are compared after key normalization
/// (see [crate::normalize_key]).
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteFilter {
    pub year: Option<u32>,
    pub cities: Vec<String>,
    pub regionals: Vec<String>,
    pub neighborhood: Option<String>,
    pub zone: Option<String>,
    /// Ranking entries below this total are dropped.
    pub min_votes: u64,
    /// Only the first entries of a ranking are kept.
    pub top_n: Option<usize>,
    /// Case-insensitive substring matched against zone, section and neighborhood.
    pub query: Option<String>,
}

impl VoteFilter {
    pub const EVERYTHING: VoteFilter = VoteFilter {
        year: None,
        cities: Vec::new(),
        regionals: Vec::new(),
        neighborhood: None,
        zone: None,
        min_votes: 0,
        top_n: None,
        query: None,
    };
}

// ******** Output data structures *********

#[derive(PartialEq, Debug, Clone)]
pub struct RankedEntry {
    /// 1-based position in the ranking.
    pub position: u32,
    pub key: String,
    pub votes: u64,
    /// Percentage of the total of the ranked selection.
    pub share: f64,
    pub detail: Option<String>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct Kpis {
    pub total_votes: u64,
    pub neighborhoods: usize,
    pub sections: usize,
    pub cities: usize,
    pub sections_with_votes: usize,
    pub top_neighborhood: Option<(String, u64)>,
    pub average_per_neighborhood: f64,
    /// Percentage of the votes held by the top 20% of the neighborhoods.
    pub concentration: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct CurvePoint {
    pub position: u32,
    pub cumulative_share: f64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TimelinePoint {
    pub year: u32,
    pub votes: u64,
}

/// Errors that prevent an aggregation from being computed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TallyErrors {
    UnknownDimension(String),
    EmptyDimension(Dimension),
}

impl Error for TallyErrors {}

impl Display for TallyErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TallyErrors::UnknownDimension(s) => {
                let expected: Vec<&str> = Dimension::ALL.iter().map(|d| d.label()).collect();
                write!(
                    f,
                    "unknown grouping dimension {:?}, expected one of: {}",
                    s,
                    expected.join(", ")
                )
            }
            TallyErrors::EmptyDimension(d) => {
                write!(f, "no record carries a value for {}", d.label())
            }
        }
    }
}
