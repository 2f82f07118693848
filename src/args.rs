use clap::{Parser, Subcommand};

/// Ingestion and geographic ranking of electoral vote tallies.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON document holding all the tables. Defaults to the
    /// GEOTALLY_DATA environment variable, then to the dataFile of the configuration, then to
    /// geotally.json.
    #[clap(short, long, value_parser)]
    pub data: Option<String>,

    /// (file path, optional) A JSON configuration file.
    /// For more information about the file format, read the manual of tally_core.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Manages the parties.
    #[clap(subcommand)]
    Party(PartyCommand),
    /// Manages the candidates.
    #[clap(subcommand)]
    Candidate(CandidateCommand),
    /// Uploads the two vote files of a candidate for one election year.
    Upload(UploadArgs),
    /// Manages the regionals (groups of neighborhoods).
    #[clap(subcommand)]
    Regional(RegionalCommand),
    /// Edits the assignment of neighborhoods to regionals.
    #[clap(subcommand)]
    Geo(GeoCommand),
    /// Manages the user profiles and their access.
    #[clap(subcommand)]
    User(UserCommand),
    /// Shows the dashboard of a user, according to its role.
    Dashboard(DashboardArgs),
    /// Shows the analytics of one candidate.
    Analytics(AnalyticsArgs),
    /// Ranks the votes of one candidate along one dimension.
    Rank(RankArgs),
}

#[derive(Subcommand, Debug, Clone)]
pub enum PartyCommand {
    Add {
        #[clap(long, value_parser)]
        name: String,
        /// Short code, for example PXX.
        #[clap(long, value_parser)]
        code: String,
        /// Ballot number.
        #[clap(long, value_parser)]
        number: Option<u32>,
    },
    Update {
        #[clap(value_parser)]
        id: u32,
        #[clap(long, value_parser)]
        name: String,
        #[clap(long, value_parser)]
        code: String,
        #[clap(long, value_parser)]
        number: Option<u32>,
    },
    /// Activates or deactivates a party.
    Toggle {
        #[clap(value_parser)]
        id: u32,
    },
    List,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CandidateCommand {
    Add {
        #[clap(long, value_parser)]
        name: String,
        /// Id of the party.
        #[clap(long, value_parser)]
        party: u32,
        #[clap(long, value_parser)]
        number: Option<u32>,
        #[clap(long, value_parser)]
        photo_url: Option<String>,
        /// The dashboards of this candidate do not group neighborhoods by regional.
        #[clap(long, takes_value = false)]
        no_regionals: bool,
    },
    Update {
        #[clap(value_parser)]
        id: u32,
        #[clap(long, value_parser)]
        name: String,
        #[clap(long, value_parser)]
        party: u32,
        #[clap(long, value_parser)]
        number: Option<u32>,
        #[clap(long, value_parser)]
        photo_url: Option<String>,
        #[clap(long, takes_value = false)]
        no_regionals: bool,
    },
    /// Activates or deactivates a candidate.
    Toggle {
        #[clap(value_parser)]
        id: u32,
    },
    /// Links the candidate to the profile of a user, or removes the link.
    Link {
        #[clap(value_parser)]
        id: u32,
        #[clap(long, value_parser)]
        user: Option<u32>,
    },
    List,
}

#[derive(clap::Args, Debug, Clone)]
pub struct UploadArgs {
    #[clap(long, value_parser)]
    pub candidate: u32,
    #[clap(long, value_parser)]
    pub year: u32,
    /// (file path) Votes per section: Zona, Seção, Seções Agregadas, Votos, Local de Votação,
    /// Endereço do Local de Votação, Bairro.
    #[clap(long, value_parser)]
    pub sections: String,
    /// (file path) Votes per neighborhood: Bairro, Votos, % Votos Obtidos.
    #[clap(long, value_parser)]
    pub neighborhoods: String,
    /// The city of the rows. Defaults to the defaultCity of the configuration.
    #[clap(long, value_parser)]
    pub city: Option<String>,
    /// Replaces the rows even if the files did not change since the last upload.
    #[clap(long, takes_value = false)]
    pub force: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RegionalCommand {
    Add {
        #[clap(long, value_parser)]
        name: String,
        #[clap(long, value_parser)]
        city: String,
        #[clap(long, value_parser)]
        code: Option<String>,
    },
    /// Renames a regional or changes its code.
    Update {
        #[clap(value_parser)]
        id: u32,
        #[clap(long, value_parser)]
        name: String,
        #[clap(long, value_parser)]
        code: Option<String>,
    },
    /// Activates or deactivates a regional. Inactive regionals take no new
    /// neighborhood.
    Toggle {
        #[clap(value_parser)]
        id: u32,
    },
    List {
        #[clap(long, value_parser)]
        city: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum GeoCommand {
    /// Lists the cities found in the vote rows.
    Cities,
    /// Lists the neighborhoods of a city with their regional.
    Neighborhoods {
        #[clap(long, value_parser)]
        city: String,
    },
    /// Assigns a neighborhood to a regional.
    Assign {
        #[clap(long, value_parser)]
        city: String,
        #[clap(long, value_parser)]
        neighborhood: String,
        /// Id of the regional.
        #[clap(long, value_parser)]
        regional: u32,
    },
    /// Removes the regional of a neighborhood.
    Clear {
        #[clap(long, value_parser)]
        city: String,
        #[clap(long, value_parser)]
        neighborhood: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    Add {
        #[clap(long, value_parser)]
        login: String,
        #[clap(long, value_parser)]
        name: String,
        /// admin, president or candidate
        #[clap(long, value_parser)]
        role: String,
        /// Id of the candidate a candidate user sees. Required for that role.
        #[clap(long, value_parser)]
        candidate: Option<u32>,
        /// Id of the party of a president. Required for that role.
        #[clap(long, value_parser)]
        party: Option<u32>,
    },
    /// Changes the name and the role of a user.
    Update {
        #[clap(value_parser)]
        id: u32,
        #[clap(long, value_parser)]
        name: String,
        #[clap(long, value_parser)]
        role: String,
    },
    /// Activates or deactivates a user.
    Toggle {
        #[clap(value_parser)]
        id: u32,
    },
    /// Lets a user see the dashboards of a candidate.
    GrantCandidate {
        #[clap(long, value_parser)]
        user: u32,
        #[clap(long, value_parser)]
        candidate: u32,
    },
    /// Lets a user see the dashboards of a party.
    GrantParty {
        #[clap(long, value_parser)]
        user: u32,
        #[clap(long, value_parser)]
        party: u32,
    },
    List,
}

#[derive(clap::Args, Debug, Clone)]
pub struct OutputArgs {
    /// (file path, 'stdout' or empty) If specified, the summary will be written in JSON format to the given
    /// location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing the expected summary in JSON format. If provided, geotally will
    /// check that the computed output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DashboardArgs {
    /// Login of the user.
    #[clap(long, value_parser)]
    pub login: String,
    /// Shows the analytics of this candidate instead, if the user may see it.
    #[clap(long, value_parser)]
    pub candidate: Option<u32>,
    /// Filters of the analytics view, as a query string (year=2024&topN=5).
    #[clap(long, value_parser)]
    pub query: Option<String>,
    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct AnalyticsArgs {
    #[clap(long, value_parser)]
    pub candidate: u32,
    /// Filters as a query string (year=2024&cidades=Fortaleza&minVotos=10&topN=5).
    #[clap(long, value_parser)]
    pub query: Option<String>,
    /// (file path) Also writes the filtered neighborhood rows in CSV format.
    #[clap(long, value_parser)]
    pub export_csv: Option<String>,
    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RankArgs {
    #[clap(long, value_parser)]
    pub candidate: u32,
    /// neighborhood, zone, section, regional, year or city (Portuguese names are accepted).
    #[clap(long, value_parser)]
    pub by: String,
    #[clap(long, value_parser)]
    pub year: Option<u32>,
    #[clap(long, value_parser)]
    pub top: Option<usize>,
    #[clap(flatten)]
    pub output: OutputArgs,
}
