use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use tally_core::*;

use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::*;
use crate::tally::config_reader::Settings;
use crate::tally::store::{Role, Store};

pub mod admin;
pub mod config_reader;
pub mod dashboard;
pub mod filters;
pub mod geography;
pub mod ingest;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod store;

#[derive(Debug, Snafu)]
pub enum TallyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error reading line {lineno} of a CSV file"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error writing CSV output"))]
    WritingCsv { source: csv::Error },
    #[snafu(display("Error writing CSV output"))]
    FlushingCsv { source: std::io::Error },
    #[snafu(display("The file {path} has no header row"))]
    MissingHeader { path: String },
    #[snafu(display("None of the columns of {path} is known: {header}"))]
    UnknownHeader { path: String, header: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The workbook {path} has no worksheet"))]
    EmptyExcel { path: String },
    #[snafu(display("Error opening JSON file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid JSON document"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid filter string {query:?}"))]
    InvalidFilter {
        source: serde_urlencoded::de::Error,
        query: String,
    },
    #[snafu(display("Could not encode the filters"))]
    EncodingFilter { source: serde_urlencoded::ser::Error },

    #[snafu(display("No party with id {id}"))]
    UnknownParty { id: u32 },
    #[snafu(display("No candidate with id {id}"))]
    UnknownCandidate { id: u32 },
    #[snafu(display("No regional with id {id}"))]
    UnknownRegional { id: u32 },
    #[snafu(display("No user with login {login}"))]
    UnknownUser { login: String },
    #[snafu(display("No user with id {id}"))]
    UnknownUserId { id: u32 },
    #[snafu(display("Unknown role {role:?}, expected admin, president or candidate"))]
    UnknownRole { role: String },
    #[snafu(display("Invalid login {login:?}: 3 to 32 letters, digits, '.', '-' or '_'"))]
    InvalidLogin { login: String },
    #[snafu(display("The login {login} is already taken"))]
    DuplicateLogin { login: String },
    #[snafu(display("User {login} may not see candidate {candidate_id}"))]
    AccessDenied { login: String, candidate_id: u32 },
    #[snafu(display("User {login} is deactivated"))]
    InactiveUser { login: String },

    #[snafu(display("Aggregation failed"))]
    Aggregation { source: TallyErrors },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type TallyResult<T> = Result<T, TallyError>;

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn ranking_to_json(entries: &[RankedEntry]) -> Vec<JSValue> {
    entries
        .iter()
        .map(|e| {
            let mut js = json!({
                "position": e.position,
                "key": e.key,
                "votes": e.votes,
                "share": round2(e.share),
            });
            if let Some(d) = &e.detail {
                js["detail"] = json!(d);
            }
            js
        })
        .collect()
}

fn kpis_to_json(kpis: &Kpis) -> JSValue {
    let top = match &kpis.top_neighborhood {
        Some((name, votes)) => json!({"name": name, "votes": votes}),
        None => JSValue::Null,
    };
    json!({
        "totalVotes": kpis.total_votes,
        "neighborhoods": kpis.neighborhoods,
        "sections": kpis.sections,
        "cities": kpis.cities,
        "sectionsWithVotes": kpis.sections_with_votes,
        "topNeighborhood": top,
        "averagePerNeighborhood": round2(kpis.average_per_neighborhood),
        "concentration": round2(kpis.concentration),
    })
}

fn curve_to_json(curve: &[CurvePoint]) -> Vec<JSValue> {
    curve
        .iter()
        .map(|p| json!({"position": p.position, "cumulativeShare": p.cumulative_share}))
        .collect()
}

fn timeline_to_json(points: &[TimelinePoint]) -> Vec<JSValue> {
    points
        .iter()
        .map(|p| json!({"year": p.year, "votes": p.votes}))
        .collect()
}

fn read_summary(path: &str) -> TallyResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

/// Prints the summary (or writes it to the requested file), then compares it
/// with the reference summary if one is given.
fn write_summary(js: &JSValue, output: &OutputArgs) -> TallyResult<()> {
    let pretty_js = serde_json::to_string_pretty(js).context(ParsingJsonSnafu {})?;
    match output.out.as_deref() {
        None | Some("") | Some("stdout") => println!("{}", pretty_js),
        Some(path) => {
            fs::write(path, &pretty_js).context(WritingFileSnafu { path })?;
            info!("write_summary: summary written to {}", path);
        }
    }

    if let Some(reference_p) = &output.reference {
        let summary_ref = read_summary(reference_p)?;
        let pretty_js_ref = serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_ref != pretty_js {
            warn!("Found differences with the reference summary");
            print_diff(pretty_js_ref.as_str(), pretty_js.as_str(), "\n");
            whatever!("Difference detected between calculated summary and reference summary")
        }
        info!("write_summary: identical to {}", reference_p);
    }
    Ok(())
}

fn print_js(js: &JSValue) -> TallyResult<()> {
    let pretty_js = serde_json::to_string_pretty(js).context(ParsingJsonSnafu {})?;
    println!("{}", pretty_js);
    Ok(())
}

fn to_js<T: Serialize>(x: &T) -> TallyResult<JSValue> {
    serde_json::to_value(x).context(ParsingJsonSnafu {})
}

/// Ranks all the rows of a candidate along one dimension. Zone and section
/// rankings use the section rows, the others the neighborhood rows.
fn rank_candidate(store: &Store, rank_args: &RankArgs) -> TallyResult<JSValue> {
    let candidate = store.candidate(rank_args.candidate)?;
    let dimension: Dimension = rank_args.by.parse().context(AggregationSnafu {})?;
    let records = match dimension {
        Dimension::Zone | Dimension::Section => store.section_records(candidate.id),
        _ => store.neighborhood_records(candidate.id),
    };
    let filter = VoteFilter {
        year: rank_args.year,
        top_n: rank_args.top,
        ..VoteFilter::EVERYTHING
    };
    let mut builder = builder::Builder::new(&filter);
    builder.extend(records);
    // Fails on the dimensions that no row carries (regional without any mapping).
    let ranking = builder.try_rank(dimension).context(AggregationSnafu {})?;
    debug!("rank_candidate: {:?}", ranking);
    Ok(json!({
        "candidate": candidate.name,
        "dimension": dimension.label(),
        "year": rank_args.year,
        "ranking": ranking_to_json(&ranking),
    }))
}

fn run_party(store: &mut Store, cmd: &PartyCommand) -> TallyResult<bool> {
    match cmd {
        PartyCommand::Add { name, code, number } => {
            let id = admin::create_party(store, name, code, *number)?;
            print_js(&json!({ "id": id }))?;
        }
        PartyCommand::Update {
            id,
            name,
            code,
            number,
        } => admin::update_party(store, *id, name, code, *number)?,
        PartyCommand::Toggle { id } => {
            let active = admin::toggle_party(store, *id)?;
            print_js(&json!({"id": id, "active": active}))?;
        }
        PartyCommand::List => {
            print_js(&to_js(&store.parties)?)?;
            return Ok(false);
        }
    }
    Ok(true)
}

fn run_candidate(store: &mut Store, cmd: &CandidateCommand) -> TallyResult<bool> {
    match cmd {
        CandidateCommand::Add {
            name,
            party,
            number,
            photo_url,
            no_regionals,
        } => {
            let id = admin::create_candidate(
                store,
                admin::CandidateFields {
                    name: name.clone(),
                    party_id: *party,
                    number: *number,
                    photo_url: photo_url.clone(),
                    uses_regionals: !no_regionals,
                },
            )?;
            print_js(&json!({ "id": id }))?;
        }
        CandidateCommand::Update {
            id,
            name,
            party,
            number,
            photo_url,
            no_regionals,
        } => admin::update_candidate(
            store,
            *id,
            admin::CandidateFields {
                name: name.clone(),
                party_id: *party,
                number: *number,
                photo_url: photo_url.clone(),
                uses_regionals: !no_regionals,
            },
        )?,
        CandidateCommand::Toggle { id } => {
            let active = admin::toggle_candidate(store, *id)?;
            print_js(&json!({"id": id, "active": active}))?;
        }
        CandidateCommand::Link { id, user } => admin::link_candidate_user(store, *id, *user)?,
        CandidateCommand::List => {
            print_js(&admin::list_candidates(store)?)?;
            return Ok(false);
        }
    }
    Ok(true)
}

fn run_regional(store: &mut Store, cmd: &RegionalCommand) -> TallyResult<bool> {
    match cmd {
        RegionalCommand::Add { name, city, code } => {
            let id = geography::create_regional(store, name, city, code.as_deref())?;
            print_js(&json!({ "id": id }))?;
            Ok(true)
        }
        RegionalCommand::Update { id, name, code } => {
            geography::update_regional(store, *id, name, code.as_deref())?;
            Ok(true)
        }
        RegionalCommand::Toggle { id } => {
            let active = geography::toggle_regional(store, *id)?;
            print_js(&json!({"id": id, "active": active}))?;
            Ok(true)
        }
        RegionalCommand::List { city } => {
            let regionals = geography::list_regionals(store, city.as_deref());
            print_js(&to_js(&regionals)?)?;
            Ok(false)
        }
    }
}

fn run_geo(store: &mut Store, cmd: &GeoCommand) -> TallyResult<bool> {
    match cmd {
        GeoCommand::Cities => {
            print_js(&json!(geography::list_cities(store)))?;
            Ok(false)
        }
        GeoCommand::Neighborhoods { city } => {
            let neighborhoods = geography::list_neighborhoods(store, city);
            let summary = geography::mapping_summary(store, city);
            print_js(&json!({
                "summary": to_js(&summary)?,
                "neighborhoods": to_js(&neighborhoods)?,
            }))?;
            Ok(false)
        }
        GeoCommand::Assign {
            city,
            neighborhood,
            regional,
        } => {
            let updated = geography::assign(store, city, neighborhood, Some(*regional))?;
            print_js(&json!({ "updatedRows": updated }))?;
            Ok(true)
        }
        GeoCommand::Clear { city, neighborhood } => {
            let updated = geography::assign(store, city, neighborhood, None)?;
            print_js(&json!({ "updatedRows": updated }))?;
            Ok(true)
        }
    }
}

fn run_user(store: &mut Store, settings: &Settings, cmd: &UserCommand) -> TallyResult<bool> {
    match cmd {
        UserCommand::Add {
            login,
            name,
            role,
            candidate,
            party,
        } => {
            let fields = admin::UserFields {
                login: login.clone(),
                name: name.clone(),
                role: role.parse::<Role>()?,
                candidate_id: *candidate,
                party_id: *party,
            };
            let id = admin::create_user(store, fields, &settings.email_domain)?;
            let user = store.user(id)?;
            print_js(&json!({"id": id, "email": user.email}))?;
        }
        UserCommand::Update { id, name, role } => {
            let role: Role = role.parse()?;
            admin::update_user(store, *id, name, role)?;
        }
        UserCommand::Toggle { id } => {
            let active = admin::toggle_user(store, *id)?;
            print_js(&json!({"id": id, "active": active}))?;
        }
        UserCommand::GrantCandidate { user, candidate } => {
            admin::grant_candidate(store, *user, *candidate)?
        }
        UserCommand::GrantParty { user, party } => admin::grant_party(store, *user, *party)?,
        UserCommand::List => {
            print_js(&to_js(&store.users)?)?;
            return Ok(false);
        }
    }
    Ok(true)
}

/// Runs one command against the store. The store is saved if the command
/// modified it.
pub fn run_command(args: &Args, settings: &Settings) -> TallyResult<()> {
    let mut store = Store::load(&settings.data_file)?;
    let modified = match &args.command {
        Command::Party(cmd) => run_party(&mut store, cmd)?,
        Command::Candidate(cmd) => run_candidate(&mut store, cmd)?,
        Command::Upload(upload) => {
            let report = ingest::upload_files(&mut store, settings, upload)?;
            print_js(&to_js(&report)?)?;
            !report.unchanged
        }
        Command::Regional(cmd) => run_regional(&mut store, cmd)?,
        Command::Geo(cmd) => run_geo(&mut store, cmd)?,
        Command::User(cmd) => run_user(&mut store, settings, cmd)?,
        Command::Dashboard(dash) => {
            let query = filters::parse_query(dash.query.as_deref().unwrap_or(""))?;
            let js = dashboard::dashboard_for(&store, settings, &dash.login, dash.candidate, &query)?;
            write_summary(&js, &dash.output)?;
            false
        }
        Command::Analytics(analytics) => {
            let query = filters::parse_query(analytics.query.as_deref().unwrap_or(""))?;
            let js = dashboard::candidate_analytics(&store, settings, analytics.candidate, &query)?;
            if let Some(path) = &analytics.export_csv {
                let filter = query.to_vote_filter(&store, settings, analytics.candidate)?;
                let file = fs::File::create(path).context(WritingFileSnafu { path })?;
                let num_rows =
                    dashboard::export_neighborhoods_csv(&store, analytics.candidate, &filter, file)?;
                info!("run_command: {} rows exported to {}", num_rows, path);
            }
            write_summary(&js, &analytics.output)?;
            false
        }
        Command::Rank(rank_args) => {
            let js = rank_candidate(&store, rank_args)?;
            write_summary(&js, &rank_args.output)?;
            false
        }
    };
    if modified {
        store.save(&settings.data_file)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tally::store::*;

    fn test_store() -> Store {
        let mut store = Store::default();
        store.candidates.push(Candidate {
            id: 1,
            name: "Maria".to_string(),
            number: Some(12345),
            photo_url: None,
            party_id: 2,
            active: true,
            uses_regionals: true,
            user_id: None,
        });
        for (zone, section, votes) in [("1", "10", 40), ("1", "11", 5), ("2", "7", 60)] {
            store.section_rows.push(SectionVoteRow {
                candidate_id: 1,
                year: 2024,
                city: "Fortaleza".to_string(),
                zone: zone.to_string(),
                section: section.to_string(),
                aggregated_sections: String::new(),
                votes,
                polling_place: String::new(),
                polling_address: String::new(),
                neighborhood: "Centro".to_string(),
            });
        }
        store
    }

    fn rank_args(by: &str, top: Option<usize>) -> RankArgs {
        RankArgs {
            candidate: 1,
            by: by.to_string(),
            year: Some(2024),
            top,
            output: OutputArgs {
                out: None,
                reference: None,
            },
        }
    }

    #[test]
    fn rank_zones_of_candidate() {
        let js = rank_candidate(&test_store(), &rank_args("zona", None)).unwrap();
        assert_eq!(js["dimension"], json!("zone"));
        assert_eq!(js["ranking"][0]["key"], json!("2"));
        assert_eq!(js["ranking"][1]["votes"], json!(45));
        assert_eq!(js["ranking"][0]["share"], json!(57.14));
    }

    #[test]
    fn rank_top_sections() {
        let js = rank_candidate(&test_store(), &rank_args("section", Some(1))).unwrap();
        let ranking = js["ranking"].as_array().unwrap();
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0]["key"], json!("2-7"));
        assert_eq!(ranking[0]["detail"], json!("Centro"));
    }

    #[test]
    fn rank_without_regionals_fails() {
        // The regional ranking uses the neighborhood rows, and there are none.
        assert!(rank_candidate(&test_store(), &rank_args("regional", None)).is_ok());
        let mut store = test_store();
        store.neighborhood_rows.push(NeighborhoodVoteRow {
            candidate_id: 1,
            year: 2024,
            city: "Fortaleza".to_string(),
            neighborhood: "Centro".to_string(),
            votes: 105,
            percentage: 1.5,
            regional_id: None,
        });
        let res = rank_candidate(&store, &rank_args("regional", None));
        assert!(matches!(res, Err(TallyError::Aggregation { .. })));
        assert!(rank_candidate(&store, &rank_args("planet", None)).is_err());
    }

    #[test]
    fn summary_matches_reference() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.json");
        let reference = dir.path().join("reference.json");
        let js = json!({"ranking": [{"key": "Centro", "votes": 10}]});
        fs::write(&reference, serde_json::to_string(&js).unwrap()).unwrap();
        let output = OutputArgs {
            out: Some(out.to_str().unwrap().to_string()),
            reference: Some(reference.to_str().unwrap().to_string()),
        };
        write_summary(&js, &output).unwrap();
        assert!(out.exists());

        let other = json!({"ranking": [{"key": "Centro", "votes": 11}]});
        assert!(write_summary(&other, &output).is_err());
    }
}
