//! `catalog-admin`: list, inspect and edit catalog entities over the REST API.

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use std::path::PathBuf;
use streaming_catalog::blob::{decode_file, format_as_bytes, load_file, FileLoadError};
use streaming_catalog::client::{
    sort_param, AlertInfo, ApiResponse, CatalogClient, CatalogEntity, ClientError, Episode, FilterOptions,
    RequestOptions, ResourceClient,
};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "catalog-admin", version, about = "Admin client for the streaming catalog")]
struct Cli {
    /// Server root URL
    #[arg(long, env = "CATALOG_URL", default_value = "http://localhost:8080")]
    base_url: String,

    #[arg(short, long)]
    verbose: bool,

    #[arg(value_enum)]
    entity: EntityKind,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EntityKind {
    Films,
    Episodes,
    People,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One page of entities
    List {
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        size: u32,
        /// Field to sort by, id tiebreaker added
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        desc: bool,
        /// Criteria filter as `field.op=value`, repeatable
        #[arg(long = "filter", value_name = "FIELD.OP=VALUE")]
        filters: Vec<String>,
        /// Include many-to-many references
        #[arg(long)]
        eagerload: bool,
    },
    Count {
        #[arg(long = "filter", value_name = "FIELD.OP=VALUE")]
        filters: Vec<String>,
    },
    Get {
        id: i64,
    },
    Create {
        #[command(flatten)]
        payload: Payload,
    },
    /// Replace every field of an existing entity
    Update {
        id: i64,
        #[command(flatten)]
        payload: Payload,
    },
    /// Change only the fields present in the document
    Patch {
        id: i64,
        #[command(flatten)]
        payload: Payload,
    },
    Delete {
        id: i64,
    },
    /// Write the stored cover image to a file
    Cover {
        id: i64,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct Payload {
    /// JSON object, or `@path` to read it from a file
    #[arg(long)]
    json: String,
    /// Image to upload as the cover
    #[arg(long)]
    cover: Option<PathBuf>,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    File(#[from] FileLoadError),
    #[error("{path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("{0}")]
    Usage(String),
}

fn init_cli_logger(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("catalog_admin=debug,streaming_catalog=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("catalog_admin=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

/// Builds the request document: the JSON object plus the cover image, if any.
fn read_payload(payload: &Payload) -> Result<Map<String, Value>, CliError> {
    let text = match payload.json.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_string(),
            source,
        })?,
        None => payload.json.clone(),
    };
    let Value::Object(mut map) = serde_json::from_str(&text)? else {
        return Err(CliError::Usage("payload must be a JSON object".into()));
    };
    if let Some(image) = &payload.cover {
        load_file(image, true)?.apply_to(&mut map, "cover");
    }
    Ok(map)
}

fn parse_filters(filters: &[String]) -> Result<FilterOptions, CliError> {
    let mut options = FilterOptions::new();
    for f in filters {
        let (name, value) = f
            .split_once('=')
            .ok_or_else(|| CliError::Usage(format!("filter '{}' is not FIELD.OP=VALUE", f)))?;
        options.add(name.trim(), [value.to_string()]);
    }
    Ok(options)
}

fn with_id(mut map: Map<String, Value>, id: i64) -> Map<String, Value> {
    map.insert("id".into(), id.into());
    map
}

fn report_alert(alert: Option<&AlertInfo>) {
    if let Some(alert) = alert {
        let level = if alert.is_error { "error" } else { "ok" };
        match &alert.param {
            Some(p) => eprintln!("[{}] {} ({})", level, alert.key, p),
            None => eprintln!("[{}] {}", level, alert.key),
        }
    }
}

fn print_json<S: serde::Serialize>(value: &S) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_written<T: CatalogEntity>(response: ApiResponse<T>) -> Result<(), CliError> {
    report_alert(response.alert.as_ref());
    print_json(&response.body)
}

fn has_cover<T: CatalogEntity>() -> bool {
    T::RESOURCE != Episode::RESOURCE
}

async fn run_for<T: CatalogEntity>(client: &ResourceClient<T>, command: Command) -> Result<(), CliError> {
    let payload_of = |payload: &Payload| {
        if payload.cover.is_some() && !has_cover::<T>() {
            return Err(CliError::Usage(format!("{} have no cover", T::RESOURCE)));
        }
        read_payload(payload)
    };
    match command {
        Command::List {
            page,
            size,
            sort,
            desc,
            filters,
            eagerload,
        } => {
            let options = RequestOptions {
                page: Some(page),
                size: Some(size),
                sort: sort.as_deref().map(|s| sort_param(s, !desc)).unwrap_or_default(),
                filter: parse_filters(&filters)?,
                eagerload: eagerload.then_some(true),
            };
            let result = client.query(&options).await?;
            eprintln!("total: {}", result.total);
            for (rel, page) in &result.links {
                eprintln!("{}: page {}", rel, page);
            }
            print_json(&result.items)
        }
        Command::Count { filters } => {
            println!("{}", client.count(&parse_filters(&filters)?).await?);
            Ok(())
        }
        Command::Get { id } => print_json(&client.find(id).await?),
        Command::Create { payload } => {
            let entity: T = serde_json::from_value(Value::Object(payload_of(&payload)?))?;
            print_written(client.create(&entity).await?)
        }
        Command::Update { id, payload } => {
            let entity: T = serde_json::from_value(Value::Object(with_id(payload_of(&payload)?, id)))?;
            print_written(client.update(&entity).await?)
        }
        Command::Patch { id, payload } => {
            let entity: T = serde_json::from_value(Value::Object(with_id(payload_of(&payload)?, id)))?;
            print_written(client.partial_update(&entity).await?)
        }
        Command::Delete { id } => {
            let alert = client.delete(id).await?;
            report_alert(alert.as_ref());
            Ok(())
        }
        Command::Cover { id, out } => {
            if !has_cover::<T>() {
                return Err(CliError::Usage(format!("{} have no cover", T::RESOURCE)));
            }
            let entity = serde_json::to_value(client.find(id).await?)?;
            let data = entity
                .get("cover")
                .and_then(Value::as_str)
                .ok_or_else(|| CliError::Usage(format!("{} {} has no cover", T::RESOURCE, id)))?;
            let bytes = decode_file(data).map_err(|e| CliError::Usage(format!("stored cover is not base64: {}", e)))?;
            std::fs::write(&out, &bytes).map_err(|source| CliError::Io {
                path: out.display().to_string(),
                source,
            })?;
            eprintln!("wrote {} to {}", format_as_bytes(bytes.len()), out.display());
            Ok(())
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let catalog = CatalogClient::new(&cli.base_url);
    tracing::debug!(base_url = %cli.base_url, entity = ?cli.entity, "running");
    match cli.entity {
        EntityKind::Films => run_for(&catalog.films, cli.command).await,
        EntityKind::Episodes => run_for(&catalog.episodes, cli.command).await,
        EntityKind::People => run_for(&catalog.people, cli.command).await,
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_cli_logger(cli.verbose);

    if let Err(e) = run(cli).await {
        match &e {
            CliError::Client(ClientError::Http {
                problem: Some(problem), ..
            }) => {
                eprintln!("error: {} ({})", problem.title, problem.message);
                for fe in &problem.field_errors {
                    eprintln!("  {}: {}", fe.field, fe.message);
                }
            }
            CliError::File(f) => eprintln!("error.file.{}: {}", f.key(), f),
            _ => eprintln!("error: {}", e),
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_list_arguments() {
        let cli = Cli::try_parse_from([
            "catalog-admin",
            "films",
            "list",
            "--sort",
            "title",
            "--desc",
            "--filter",
            "gender.in=DRAMA",
        ])
        .unwrap();
        assert_eq!(cli.entity, EntityKind::Films);
        match cli.command {
            Command::List { sort, desc, filters, .. } => {
                assert_eq!(sort.as_deref(), Some("title"));
                assert!(desc);
                assert_eq!(filters, vec!["gender.in=DRAMA"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn payload_needs_json() {
        assert!(Cli::try_parse_from(["catalog-admin", "people", "create"]).is_err());
        let cli = Cli::try_parse_from(["catalog-admin", "people", "patch", "4", "--json", "{}", "--cover", "me.png"]).unwrap();
        match cli.command {
            Command::Patch { id, payload } => {
                assert_eq!(id, 4);
                assert_eq!(payload.cover, Some(PathBuf::from("me.png")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn filters_split_on_first_equals() {
        let f = parse_filters(&["title.contains=a=b".to_string(), "gender.in=DRAMA".to_string()]).unwrap();
        let items: Vec<_> = f.iter().map(|(n, v)| (n.to_string(), v.to_vec())).collect();
        assert_eq!(items[0], ("title.contains".to_string(), vec!["a=b".to_string()]));
        assert!(parse_filters(&["nope".to_string()]).is_err());
    }

    #[test]
    fn payload_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"name": "Sigourney Weaver"}}"#).unwrap();
        let payload = Payload {
            json: format!("@{}", file.path().display()),
            cover: None,
        };
        let map = with_id(read_payload(&payload).unwrap(), 4);
        assert_eq!(map["name"], "Sigourney Weaver");
        assert_eq!(map["id"], 4);

        let array = Payload {
            json: "[1]".into(),
            cover: None,
        };
        assert!(matches!(read_payload(&array), Err(CliError::Usage(_))));
    }

    #[test]
    fn payload_with_cover_image() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("poster.png");
        std::fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();
        let payload = Payload {
            json: r#"{"title": "Alien"}"#.into(),
            cover: Some(image),
        };
        let map = read_payload(&payload).unwrap();
        assert_eq!(map["title"], "Alien");
        assert_eq!(map["cover"], "iVBORw==");
        assert_eq!(map["coverContentType"], "image/png");

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "hi").unwrap();
        let payload = Payload {
            json: "{}".into(),
            cover: Some(text),
        };
        assert!(matches!(read_payload(&payload), Err(CliError::File(FileLoadError::NotImage { .. }))));
    }

    #[test]
    fn episodes_have_no_cover() {
        assert!(has_cover::<streaming_catalog::client::Film>());
        assert!(!has_cover::<Episode>());
    }
}
