// Management of the parties, the candidates and the user profiles.

use regex::Regex;

use crate::tally::store::*;
use crate::tally::*;

// Applied to the normalized login.
const LOGIN_PATTERN: &str = r"^[a-z0-9._-]{3,32}$";

/// The editable fields of a candidate.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CandidateFields {
    pub name: String,
    pub party_id: u32,
    pub number: Option<u32>,
    pub photo_url: Option<String>,
    pub uses_regionals: bool,
}

/// A new user profile. Candidates need the candidate they will see, presidents
/// their party.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct UserFields {
    pub login: String,
    pub name: String,
    pub role: Role,
    pub candidate_id: Option<u32>,
    pub party_id: Option<u32>,
}

/// Normalizes a login handle: trimmed, lowercase, without any whitespace.
pub fn normalize_login(login: &str) -> String {
    login
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Logins have 3 to 32 letters, digits, dots, hyphens or underscores.
pub fn validate_login(login: &str) -> TallyResult<()> {
    let re = Regex::new(LOGIN_PATTERN).whatever_context("Invalid login pattern")?;
    ensure!(re.is_match(login), InvalidLoginSnafu { login });
    Ok(())
}

/// The synthetic email under which a login is registered.
pub fn login_to_email(login: &str, domain: &str) -> String {
    format!("{}@{}", normalize_login(login), domain)
}

pub fn create_party(
    store: &mut Store,
    name: &str,
    code: &str,
    number: Option<u32>,
) -> TallyResult<u32> {
    ensure_whatever!(!name.trim().is_empty(), "The name of a party may not be empty");
    ensure_whatever!(!code.trim().is_empty(), "The code of a party may not be empty");
    let id = store.allocate_id();
    store.parties.push(Party {
        id,
        name: name.trim().to_string(),
        code: code.trim().to_uppercase(),
        number,
        active: true,
    });
    info!("create_party: {} {}", id, name);
    Ok(id)
}

pub fn update_party(
    store: &mut Store,
    id: u32,
    name: &str,
    code: &str,
    number: Option<u32>,
) -> TallyResult<()> {
    ensure_whatever!(!name.trim().is_empty(), "The name of a party may not be empty");
    ensure_whatever!(!code.trim().is_empty(), "The code of a party may not be empty");
    let party = store.party_mut(id)?;
    party.name = name.trim().to_string();
    party.code = code.trim().to_uppercase();
    party.number = number;
    Ok(())
}

/// Returns the new state of the party.
pub fn toggle_party(store: &mut Store, id: u32) -> TallyResult<bool> {
    let party = store.party_mut(id)?;
    party.active = !party.active;
    info!("toggle_party: {} active: {}", id, party.active);
    Ok(party.active)
}

pub fn create_candidate(store: &mut Store, fields: CandidateFields) -> TallyResult<u32> {
    ensure_whatever!(
        !fields.name.trim().is_empty(),
        "The name of a candidate may not be empty"
    );
    store.party(fields.party_id)?;
    let id = store.allocate_id();
    store.candidates.push(Candidate {
        id,
        name: fields.name.trim().to_string(),
        number: fields.number,
        photo_url: fields.photo_url,
        party_id: fields.party_id,
        active: true,
        uses_regionals: fields.uses_regionals,
        user_id: None,
    });
    info!("create_candidate: {} {}", id, fields.name);
    Ok(id)
}

pub fn update_candidate(store: &mut Store, id: u32, fields: CandidateFields) -> TallyResult<()> {
    ensure_whatever!(
        !fields.name.trim().is_empty(),
        "The name of a candidate may not be empty"
    );
    store.party(fields.party_id)?;
    let candidate = store.candidate_mut(id)?;
    candidate.name = fields.name.trim().to_string();
    candidate.party_id = fields.party_id;
    candidate.number = fields.number;
    candidate.photo_url = fields.photo_url;
    candidate.uses_regionals = fields.uses_regionals;
    Ok(())
}

pub fn toggle_candidate(store: &mut Store, id: u32) -> TallyResult<bool> {
    let candidate = store.candidate_mut(id)?;
    candidate.active = !candidate.active;
    info!("toggle_candidate: {} active: {}", id, candidate.active);
    Ok(candidate.active)
}

/// Links a candidate to the profile of its user. `None` removes the link.
pub fn link_candidate_user(
    store: &mut Store,
    candidate_id: u32,
    user_id: Option<u32>,
) -> TallyResult<()> {
    if let Some(uid) = user_id {
        store.user(uid)?;
    }
    store.candidate_mut(candidate_id)?.user_id = user_id;
    Ok(())
}

/// The candidates with the name of their party and their uploaded years.
pub fn list_candidates(store: &Store) -> TallyResult<JSValue> {
    let mut res: Vec<JSValue> = Vec::new();
    for c in store.candidates.iter() {
        let party = store.party(c.party_id).map(|p| p.code.clone()).ok();
        let mut js = to_js(c)?;
        js["party"] = json!(party);
        js["years"] = json!(store.candidate_years_of(c.id));
        res.push(js);
    }
    Ok(JSValue::Array(res))
}

pub fn find_user_by_login<'a>(store: &'a Store, login: &str) -> TallyResult<&'a UserProfile> {
    let login = normalize_login(login);
    store
        .users
        .iter()
        .find(|u| u.login == login)
        .context(UnknownUserSnafu { login })
}

/// Creates a user, and the access its role needs.
pub fn create_user(store: &mut Store, fields: UserFields, domain: &str) -> TallyResult<u32> {
    let login = normalize_login(&fields.login);
    validate_login(&login)?;
    ensure!(
        store.users.iter().all(|u| u.login != login),
        DuplicateLoginSnafu { login }
    );
    match fields.role {
        Role::Candidate => {
            ensure_whatever!(
                fields.candidate_id.is_some(),
                "A candidate user needs the candidate it will see"
            );
        }
        Role::President => {
            ensure_whatever!(
                fields.party_id.is_some(),
                "A president needs the party it will see"
            );
        }
        Role::Admin => {}
    }
    if let Some(id) = fields.candidate_id {
        store.candidate(id)?;
    }
    if let Some(id) = fields.party_id {
        store.party(id)?;
    }

    let id = store.allocate_id();
    let email = login_to_email(&login, domain);
    info!("create_user: {} {} {:?}", id, email, fields.role);
    store.users.push(UserProfile {
        id,
        login,
        email,
        name: fields.name.trim().to_string(),
        role: fields.role,
        active: true,
    });
    if let Some(candidate_id) = fields.candidate_id {
        grant_candidate(store, id, candidate_id)?;
    }
    if let Some(party_id) = fields.party_id {
        grant_party(store, id, party_id)?;
    }
    Ok(id)
}

/// Changes the name and the role of a user. The login is not editable.
pub fn update_user(store: &mut Store, id: u32, name: &str, role: Role) -> TallyResult<()> {
    ensure_whatever!(!name.trim().is_empty(), "The name of a user may not be empty");
    let user = store.user_mut(id)?;
    user.name = name.trim().to_string();
    user.role = role;
    info!("update_user: {} {:?}", user.login, user.role);
    Ok(())
}

pub fn toggle_user(store: &mut Store, id: u32) -> TallyResult<bool> {
    let user = store.user_mut(id)?;
    user.active = !user.active;
    info!("toggle_user: {} active: {}", user.login, user.active);
    Ok(user.active)
}

pub fn grant_candidate(store: &mut Store, user_id: u32, candidate_id: u32) -> TallyResult<()> {
    store.user(user_id)?;
    store.candidate(candidate_id)?;
    let grant = CandidateGrant {
        user_id,
        candidate_id,
    };
    if !store.candidate_grants.contains(&grant) {
        store.candidate_grants.push(grant);
    }
    Ok(())
}

pub fn grant_party(store: &mut Store, user_id: u32, party_id: u32) -> TallyResult<()> {
    store.user(user_id)?;
    store.party(party_id)?;
    let grant = PartyGrant { user_id, party_id };
    if !store.party_grants.contains(&grant) {
        store.party_grants.push(grant);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(name: &str, party_id: u32) -> CandidateFields {
        CandidateFields {
            name: name.to_string(),
            party_id,
            number: Some(12345),
            photo_url: None,
            uses_regionals: true,
        }
    }

    #[test]
    fn login_normalization() {
        assert_eq!(login_to_email("  Maria Silva ", "example.com"), "mariasilva@example.com");
        assert_eq!(normalize_login("JOAO\t2"), "joao2");
    }

    #[test]
    fn parties_and_candidates() {
        let mut store = Store::default();
        let party = create_party(&mut store, "Partido Exemplo", "pex", Some(99)).unwrap();
        assert_eq!(store.party(party).unwrap().code, "PEX");
        let candidate = create_candidate(&mut store, fields("Maria", party)).unwrap();
        assert_ne!(party, candidate);
        assert!(create_candidate(&mut store, fields("Joao", party + 100)).is_err());
        assert!(create_candidate(&mut store, fields("  ", party)).is_err());

        update_candidate(&mut store, candidate, fields("Maria Silva", party)).unwrap();
        assert_eq!(store.candidate(candidate).unwrap().name, "Maria Silva");
        assert!(!toggle_candidate(&mut store, candidate).unwrap());
        assert!(toggle_candidate(&mut store, candidate).unwrap());
        assert!(!toggle_party(&mut store, party).unwrap());
        assert!(update_party(&mut store, party, "Partido", " ", None).is_err());
        assert_eq!(store.party(party).unwrap().code, "PEX");

        let js = list_candidates(&store).unwrap();
        assert_eq!(js[0]["party"], json!("PEX"));
        assert_eq!(js[0]["years"], json!([]));
    }

    fn user(login: &str, role: Role, candidate_id: Option<u32>, party_id: Option<u32>) -> UserFields {
        UserFields {
            login: login.to_string(),
            name: login.to_string(),
            role,
            candidate_id,
            party_id,
        }
    }

    #[test]
    fn duplicate_logins_are_rejected() {
        let mut store = Store::default();
        create_user(&mut store, user("maria", Role::Admin, None, None), "example.com").unwrap();
        let res = create_user(&mut store, user(" MARIA ", Role::Admin, None, None), "example.com");
        assert!(matches!(res, Err(TallyError::DuplicateLogin { .. })));
        let found = find_user_by_login(&store, "Maria").unwrap();
        assert_eq!(found.email, "maria@example.com");
        assert!(find_user_by_login(&store, "joao").is_err());
    }

    #[test]
    fn login_format() {
        assert!(validate_login("maria.silva_2-b").is_ok());
        let too_long = "a".repeat(33);
        for login in ["", "ab", "ü!", "maria@x", too_long.as_str()] {
            assert!(matches!(
                validate_login(login),
                Err(TallyError::InvalidLogin { .. })
            ));
        }
        let mut store = Store::default();
        let res = create_user(&mut store, user("ü!", Role::Admin, None, None), "example.com");
        assert!(matches!(res, Err(TallyError::InvalidLogin { .. })));
        // Spaces and case are normalized before the check.
        create_user(&mut store, user(" Maria Silva ", Role::Admin, None, None), "example.com").unwrap();
        assert_eq!(store.users[0].login, "mariasilva");
        assert_eq!(store.users.len(), 1);
    }

    #[test]
    fn roles_need_their_access() {
        let mut store = Store::default();
        let party = create_party(&mut store, "Partido", "P", None).unwrap();
        let candidate = create_candidate(&mut store, fields("Maria", party)).unwrap();

        let res = create_user(&mut store, user("maria", Role::Candidate, None, None), "example.com");
        assert!(res.is_err());
        let res = create_user(&mut store, user("pres", Role::President, None, None), "example.com");
        assert!(res.is_err());
        let res = create_user(
            &mut store,
            user("pres", Role::President, None, Some(party + 100)),
            "example.com",
        );
        assert!(matches!(res, Err(TallyError::UnknownParty { .. })));
        assert!(store.users.is_empty());

        let maria = create_user(
            &mut store,
            user("maria", Role::Candidate, Some(candidate), None),
            "example.com",
        )
        .unwrap();
        let pres = create_user(
            &mut store,
            user("pres", Role::President, None, Some(party)),
            "example.com",
        )
        .unwrap();
        assert_eq!(
            store.candidate_grants,
            vec![CandidateGrant {
                user_id: maria,
                candidate_id: candidate
            }]
        );
        assert_eq!(
            store.party_grants,
            vec![PartyGrant {
                user_id: pres,
                party_id: party
            }]
        );

        update_user(&mut store, pres, "Presidente", Role::Admin).unwrap();
        let updated = store.user(pres).unwrap();
        assert_eq!(updated.name, "Presidente");
        assert_eq!(updated.role, Role::Admin);
        assert_eq!(updated.login, "pres");
        assert!(update_user(&mut store, pres, " ", Role::Admin).is_err());
    }

    #[test]
    fn grants_and_links() {
        let mut store = Store::default();
        let party = create_party(&mut store, "Partido", "P", None).unwrap();
        let candidate = create_candidate(&mut store, fields("Maria", party)).unwrap();
        let user_id = create_user(&mut store, user("maria", Role::Admin, None, None), "example.com").unwrap();
        grant_candidate(&mut store, user_id, candidate).unwrap();
        grant_candidate(&mut store, user_id, candidate).unwrap();
        assert_eq!(store.candidate_grants.len(), 1);
        grant_party(&mut store, user_id, party).unwrap();
        assert!(grant_party(&mut store, user_id, party + 50).is_err());

        link_candidate_user(&mut store, candidate, Some(user_id)).unwrap();
        assert_eq!(store.candidate(candidate).unwrap().user_id, Some(user_id));
        assert!(link_candidate_user(&mut store, candidate, Some(user_id + 50)).is_err());
        link_candidate_user(&mut store, candidate, None).unwrap();
        assert_eq!(store.candidate(candidate).unwrap().user_id, None);
        assert!(!toggle_user(&mut store, user_id).unwrap());
    }
}
