use clap::{Args, Parser, Subcommand};
use geomatch::location::{
    CachedPlaceSource, EventFacts, GooglePlacesClient, LatLng, LocationError, LocationResolver,
    PlaceCache, PlacesConfig, ScoringParams, TeamFacts,
};
use geomatch::server::{self, AppState, DynPlaceSource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Geomatch: venue and team location resolver
///
/// Turns free-text venue addresses and team names into normalized places
/// using the Google Places API, scoring every candidate against what is
/// already known.
///
/// Examples:
///   geomatch event --venue "Lincoln High School" --location "Lincoln, NE, USA" --city Lincoln --state NE --country USA
///   geomatch event --json event.json
///   geomatch team --name "NASA/Acme & Lincoln High School" --location "Lincoln, NE, USA"
///   geomatch timezone --location "San Jose, CA"
///   geomatch serve --port 8080
#[derive(Parser)]
#[command(name = "geomatch", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    provider: ProviderArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ProviderArgs {
    /// Maps web service API key.
    #[arg(long, env = "GEOMATCH_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the Maps web services.
    #[arg(long, global = true, default_value = geomatch::location::providers::DEFAULT_BASE_URL)]
    base_url: String,

    /// JSON file overriding scoring parameters.
    #[arg(long, global = true)]
    params: Option<PathBuf>,

    /// Response cache file. Defaults to ~/.geomatch/places_cache.json.
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    /// Do not read or write the response cache.
    #[arg(long, global = true)]
    no_cache: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve an event venue.
    Event(EventArgs),
    /// Resolve a team's school or sponsor.
    Team(TeamArgs),
    /// Look up the IANA time zone for a location.
    Timezone(TimezoneArgs),
    /// Serve the resolver over HTTP.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Args)]
struct EventArgs {
    /// Read the event facts from a JSON file instead of flags.
    #[arg(long, conflicts_with_all = ["venue", "address", "city", "state", "country", "postal_code", "location"])]
    json: Option<PathBuf>,
    #[arg(long, default_value = "")]
    key: String,
    #[arg(long)]
    venue: Option<String>,
    /// Venue address; separate lines with "\n" or repeat the flag.
    #[arg(long)]
    address: Vec<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    postal_code: Option<String>,
    #[arg(long)]
    location: Option<String>,
    /// Print the update that would be applied (or nothing) instead of the raw resolution.
    #[arg(long)]
    apply: bool,
}

#[derive(Args)]
struct TeamArgs {
    #[arg(long, conflicts_with_all = ["name", "location"])]
    json: Option<PathBuf>,
    #[arg(long, default_value = "")]
    key: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    apply: bool,
}

#[derive(Args)]
struct TimezoneArgs {
    #[arg(long, default_value = "")]
    location: String,
    #[arg(long, allow_hyphen_values = true, requires = "lng")]
    lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lng: Option<f64>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), LocationError> {
    let resolver = build_resolver(&cli.provider)?;

    match cli.command {
        Command::Event(args) => {
            let facts = match &args.json {
                Some(path) => read_json::<EventFacts>(path)?,
                None => args.to_facts(),
            };
            if args.apply {
                print_json(&resolver.update_event_location(&facts))
            } else {
                print_json(&resolver.resolve_event_location(&facts))
            }
        }
        Command::Team(args) => {
            let facts = match &args.json {
                Some(path) => read_json::<TeamFacts>(path)?,
                None => TeamFacts {
                    key: args.key.clone(),
                    name: args.name.clone(),
                    location: args.location.clone(),
                },
            };
            if args.apply {
                print_json(&resolver.update_team_location(&facts))
            } else {
                print_json(&resolver.resolve_team_location(&facts))
            }
        }
        Command::Timezone(args) => {
            let lat_lng = args.lat.zip(args.lng).map(|(lat, lng)| LatLng::new(lat, lng));
            match resolver.timezone_id(&args.location, lat_lng) {
                Some(tz) => print_json(&serde_json::json!({ "tz": tz })),
                None => Err(LocationError::InvalidResponse("no time zone found".into())),
            }
        }
        Command::Serve { host, port } => {
            let state = Arc::new(AppState::new(resolver));
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::start(&host, port, state))?;
            Ok(())
        }
    }
}

impl EventArgs {
    fn to_facts(&self) -> EventFacts {
        let address = self
            .address
            .iter()
            .map(|line| line.replace("\\n", "\n"))
            .collect::<Vec<_>>()
            .join("\n");
        EventFacts {
            key: self.key.clone(),
            venue: self.venue.clone(),
            venue_address: if address.is_empty() { None } else { Some(address) },
            city: self.city.clone(),
            state_prov: self.state.clone(),
            country: self.country.clone(),
            postal_code: self.postal_code.clone(),
            location: self.location.clone(),
        }
    }
}

fn build_resolver(args: &ProviderArgs) -> Result<LocationResolver<DynPlaceSource>, LocationError> {
    let params = match &args.params {
        Some(path) => ScoringParams::load_from(path)?,
        None => ScoringParams::default(),
    };

    let config = PlacesConfig {
        api_key: args.api_key.clone(),
        ..PlacesConfig::default()
    }
    .base_url(args.base_url.clone());
    if config.api_key.is_none() {
        tracing::warn!("no API key given (--api-key or GEOMATCH_API_KEY); place searches will return nothing");
    }
    let client = GooglePlacesClient::new(config);

    let source: DynPlaceSource = if args.no_cache {
        Box::new(client)
    } else {
        let cache = match &args.cache {
            Some(path) => PlaceCache::load_from(path.clone()),
            None => PlaceCache::load(),
        };
        Box::new(CachedPlaceSource::new(client, cache))
    };

    Ok(LocationResolver::with_params(source, params))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LocationError> {
    let data = std::fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|e| LocationError::Config(format!("{}: {}", path.display(), e)))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), LocationError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| LocationError::InvalidResponse(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
