// The dashboards of the three roles.

use std::io::Write;

use crate::tally::filters::*;
use crate::tally::store::*;
use crate::tally::*;

const TOP_CANDIDATES: usize = 5;

/// Whether a user may see the analytics of a candidate.
///
/// Admins see everything. Others see the candidates granted to them, the
/// candidate linked to their profile, and the candidates of their parties.
pub fn can_view_candidate(store: &Store, user: &UserProfile, candidate: &Candidate) -> bool {
    if !user.active {
        return false;
    }
    if user.role == Role::Admin {
        return true;
    }
    if candidate.user_id == Some(user.id) {
        return true;
    }
    if store
        .candidate_grants
        .iter()
        .any(|g| g.user_id == user.id && g.candidate_id == candidate.id)
    {
        return true;
    }
    store
        .party_grants
        .iter()
        .any(|g| g.user_id == user.id && g.party_id == candidate.party_id)
}

/// Counts over the whole store, and the candidates with the most votes.
pub fn admin_overview(store: &Store) -> JSValue {
    let mut totals: Vec<(&Candidate, u64)> = store
        .candidates
        .iter()
        .map(|c| (c, store.candidate_total_votes(c.id)))
        .collect();
    totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.name.cmp(&b.0.name)));
    let top: Vec<JSValue> = totals
        .iter()
        .take(TOP_CANDIDATES)
        .map(|(c, votes)| json!({"id": c.id, "name": c.name, "votes": votes}))
        .collect();
    let total_votes: u64 = totals.iter().map(|(_, v)| v).sum();
    json!({
        "parties": store.parties.len(),
        "activeParties": store.parties.iter().filter(|p| p.active).count(),
        "candidates": store.candidates.len(),
        "activeCandidates": store.candidates.iter().filter(|c| c.active).count(),
        "users": store.users.len(),
        "regionals": store.regionals.len(),
        "sectionRows": store.section_rows.len(),
        "neighborhoodRows": store.neighborhood_rows.len(),
        "totalVotes": total_votes,
        "topCandidates": top,
    })
}

/// The active candidates of a party, by ballot number, with their votes.
pub fn party_dashboard(store: &Store, party_id: u32) -> TallyResult<JSValue> {
    let party = store.party(party_id)?;
    let mut candidates: Vec<&Candidate> = store
        .candidates
        .iter()
        .filter(|c| c.party_id == party_id && c.active)
        .collect();
    // Candidates without a number come last.
    candidates.sort_by_key(|c| (c.number.is_none(), c.number, c.name.clone()));
    let rows: Vec<JSValue> = candidates
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.name,
                "number": c.number,
                "years": store.candidate_years_of(c.id),
                "votes": store.candidate_total_votes(c.id),
            })
        })
        .collect();
    let total_votes: u64 = candidates
        .iter()
        .map(|c| store.candidate_total_votes(c.id))
        .sum();
    debug!("party_dashboard: {} candidates for {}", rows.len(), party.code);
    Ok(json!({
        "id": party.id,
        "name": party.name,
        "code": party.code,
        "number": party.number,
        "active": party.active,
        "totalVotes": total_votes,
        "candidates": rows,
    }))
}

/// All the views of one candidate, with the filters of the query.
pub fn candidate_analytics(
    store: &Store,
    settings: &Settings,
    candidate_id: u32,
    query: &FilterQuery,
) -> TallyResult<JSValue> {
    let candidate = store.candidate(candidate_id)?;
    let filter = query.to_vote_filter(store, settings, candidate_id)?;
    let neighborhoods = store.neighborhood_records(candidate_id);
    let sections = store.section_records(candidate_id);

    let kpis = compute_kpis(&neighborhoods, &sections, &filter);
    let neighborhood_ranking = rank_filtered(&neighborhoods, Dimension::Neighborhood, &filter);
    let zone_ranking = rank_filtered(&sections, Dimension::Zone, &filter);
    let section_ranking = rank_filtered(&sections, Dimension::Section, &filter);
    let whole_ranking = rank_filtered(
        &neighborhoods,
        Dimension::Neighborhood,
        &VoteFilter {
            top_n: None,
            ..filter.clone()
        },
    );
    let curve = concentration_curve(&whole_ranking);
    let timeline_records = if neighborhoods.is_empty() {
        &sections
    } else {
        &neighborhoods
    };
    let years_series = timeline(timeline_records, &filter);

    let mut rankings = json!({
        "neighborhoods": ranking_to_json(&neighborhood_ranking),
        "zones": ranking_to_json(&zone_ranking),
        "sections": ranking_to_json(&section_ranking),
    });
    if candidate.uses_regionals {
        let regional_ranking = rank_filtered(&neighborhoods, Dimension::Regional, &filter);
        rankings["regionals"] = json!(ranking_to_json(&regional_ranking));
    }

    let party = store.party(candidate.party_id).map(|p| p.code.clone()).ok();
    let cities = distinct_values(neighborhoods.iter().chain(sections.iter()), Dimension::City);
    info!(
        "candidate_analytics: {} year {:?}: {} votes",
        candidate.name, filter.year, kpis.total_votes
    );
    Ok(json!({
        "candidate": {
            "id": candidate.id,
            "name": candidate.name,
            "number": candidate.number,
            "party": party,
        },
        "query": query.normalized(store, settings, candidate_id)?,
        "year": filter.year,
        "years": candidate_years(store, candidate_id),
        "cities": cities,
        "kpis": kpis_to_json(&kpis),
        "rankings": rankings,
        "timeline": timeline_to_json(&years_series),
        "concentrationCurve": curve_to_json(&curve),
    }))
}

/// Writes the neighborhood rows selected by the filter as CSV, by decreasing
/// votes. The ranking limits do not apply, except the minimum of votes.
pub fn export_neighborhoods_csv<W: Write>(
    store: &Store,
    candidate_id: u32,
    filter: &VoteFilter,
    writer: W,
) -> TallyResult<usize> {
    let rows = store
        .neighborhood_rows
        .iter()
        .filter(|r| r.candidate_id == candidate_id);
    // Same order as the rows: the records carry the regional names.
    let records = store.neighborhood_records(candidate_id);
    let mut selected: Vec<&NeighborhoodVoteRow> = rows
        .zip(records.iter())
        .filter(|(row, record)| filter.matches(record) && row.votes >= filter.min_votes)
        .map(|(row, _)| row)
        .collect();
    selected.sort_by(|a, b| {
        b.votes
            .cmp(&a.votes)
            .then_with(|| a.neighborhood.cmp(&b.neighborhood))
    });

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["Bairro", "Cidade", "Votos", "Percentual"])
        .context(WritingCsvSnafu {})?;
    for row in selected.iter() {
        wtr.write_record([
            row.neighborhood.clone(),
            row.city.clone(),
            row.votes.to_string(),
            row.percentage.to_string(),
        ])
        .context(WritingCsvSnafu {})?;
    }
    wtr.flush().context(FlushingCsvSnafu {})?;
    Ok(selected.len())
}

/// The candidate shown to a user who did not ask for one: the candidate linked
/// to the profile, then the first granted one.
fn own_candidate(store: &Store, user: &UserProfile) -> Option<u32> {
    store
        .candidates
        .iter()
        .find(|c| c.user_id == Some(user.id))
        .map(|c| c.id)
        .or_else(|| {
            store
                .candidate_grants
                .iter()
                .find(|g| g.user_id == user.id)
                .map(|g| g.candidate_id)
        })
}

/// The dashboard of a user, according to its role.
///
/// With a candidate, the analytics of that candidate, if the user may see it.
/// Without, admins get the overview, presidents the dashboard of their party,
/// and candidates their own analytics.
pub fn dashboard_for(
    store: &Store,
    settings: &Settings,
    login: &str,
    candidate_id: Option<u32>,
    query: &FilterQuery,
) -> TallyResult<JSValue> {
    let user = admin::find_user_by_login(store, login)?;
    ensure!(user.active, InactiveUserSnafu { login: &user.login });
    info!("dashboard_for: {} ({:?})", user.login, user.role);

    let candidate_id = match (candidate_id, user.role) {
        (Some(id), _) => Some(id),
        (None, Role::Candidate) => match own_candidate(store, user) {
            Some(id) => Some(id),
            None => {
                whatever!("No candidate is linked to the user {}", user.login)
            }
        },
        (None, _) => None,
    };

    let view = match (candidate_id, user.role) {
        (Some(id), _) => {
            let candidate = store.candidate(id)?;
            ensure!(
                can_view_candidate(store, user, candidate),
                AccessDeniedSnafu {
                    login: &user.login,
                    candidate_id: id
                }
            );
            json!({"analytics": candidate_analytics(store, settings, id, query)?})
        }
        (None, Role::Admin) => json!({ "overview": admin_overview(store) }),
        (None, _) => {
            let party_id = match store.party_grants.iter().find(|g| g.user_id == user.id) {
                Some(g) => g.party_id,
                None => {
                    whatever!("No party is granted to the user {}", user.login)
                }
            };
            json!({ "party": party_dashboard(store, party_id)? })
        }
    };
    let mut js = json!({
        "user": user.name,
        "role": to_js(&user.role)?,
    });
    if let (Some(target), Some(content)) = (js.as_object_mut(), view.as_object()) {
        for (k, v) in content.iter() {
            target.insert(k.clone(), v.clone());
        }
    }
    Ok(js)
}
